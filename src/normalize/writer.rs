use crate::normalize::types::{Column, ExportConfig, HeaderLayout, NormalizedRecord};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

const DELIMITER: char = ',';
const LINE_TERMINATOR: &str = "\r\n";

fn needs_quotes(field: &str) -> bool {
    field.contains(DELIMITER) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Writes normalized records as CSV rows to any output
pub struct TableWriter<W: Write> {
    writer: W,
    config: ExportConfig,
}

impl<W: Write> TableWriter<W> {
    pub fn new(writer: W, config: ExportConfig) -> Self {
        TableWriter { writer, config }
    }

    fn columns(&self) -> &'static [Column] {
        self.config.layout.columns()
    }

    fn write_row<'a, I>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut first = true;
        for cell in cells {
            if !first {
                write!(self.writer, "{}", DELIMITER).context("Failed to write delimiter")?;
            }
            first = false;

            let rendered = self.config.encoding.render(cell);
            let written = if needs_quotes(&rendered) {
                write!(self.writer, "\"{}\"", rendered.replace('"', "\"\""))
            } else {
                write!(self.writer, "{}", rendered)
            };
            written.context("Failed to write field")?;
        }
        write!(self.writer, "{}", LINE_TERMINATOR).context("Failed to write row")
    }

    pub fn write_header(&mut self) -> Result<()> {
        let labels: Vec<&str> = self.columns().iter().map(|c| c.header()).collect();
        self.write_row(labels)
    }

    pub fn write_record(&mut self, record: &NormalizedRecord) -> Result<()> {
        let columns = self.columns();
        self.write_row(columns.iter().map(|&c| record.column(c)))
    }

    pub fn write_records(&mut self, records: &[NormalizedRecord]) -> Result<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }
}

/// Write `records` to a CSV file at `destination`.
///
/// Returns `false` without touching the filesystem when there is nothing to
/// write.
pub fn write_table<P: AsRef<Path>>(
    records: &[NormalizedRecord],
    destination: P,
    config: &ExportConfig,
) -> Result<bool> {
    let destination = destination.as_ref();
    if records.is_empty() {
        info!("No wine data to save!");
        return Ok(false);
    }

    if config.layout == HeaderLayout::Legacy
        && records.iter().any(|r| !r.bottle_image_url.is_empty())
    {
        warn!("legacy header has a single `image` column; bottle image paths are not exported");
    }

    let file = std::fs::File::create(destination)
        .with_context(|| format!("Failed to create file: {}", destination.display()))?;
    let mut writer = TableWriter::new(std::io::BufWriter::new(file), config.clone());
    writer.write_header()?;
    writer.write_records(records)?;
    writer.flush()?;

    info!("Saved {} wines to {}", records.len(), destination.display());
    Ok(true)
}
