use anyhow::{Context, Result};
use serde_json::Value;
use std::io::{BufReader, Read};
use std::path::Path;

/// Load raw items from a local JSON file instead of a remote dataset.
///
/// Accepts a JSON array of items, a single object, or newline-delimited JSON.
pub fn load_items<P: AsRef<Path>>(path: P) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    read_items(file)
}

/// Parse items from any reader, trying SIMD parsing first
pub fn read_items<R: Read>(reader: R) -> Result<Vec<Value>> {
    let mut content = Vec::new();
    BufReader::new(reader)
        .read_to_end(&mut content)
        .context("Failed to read input")?;

    // simd-json parses in place, so keep the original bytes for the fallback
    let mut scratch = content.clone();
    match simd_json::serde::from_slice::<Value>(&mut scratch) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(item) => Ok(vec![item]),
        Err(_) => read_ndjson(&content),
    }
}

/// Fallback for newline-delimited JSON
fn read_ndjson(content: &[u8]) -> Result<Vec<Value>> {
    let content_str = String::from_utf8_lossy(content);
    let mut items = Vec::new();

    for (line_no, line) in content_str.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse JSON on line {}", line_no + 1))?;
        items.push(value);
    }

    Ok(items)
}
