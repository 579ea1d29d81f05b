//! Wine listing normalization - flatten nested actor output into table rows
//!
//! Raw items are walked with total path lookups ([`extractor`]), list fields
//! are joined into single cells ([`flatten`]), each item becomes one
//! [`NormalizedRecord`] ([`record`]) and the records are written out as CSV
//! ([`writer`]).

pub mod types;
pub mod extractor;
pub mod flatten;
pub mod record;
pub mod writer;

pub use types::{Column, ExportConfig, HeaderLayout, NormalizedRecord, TextEncoding};
pub use extractor::{extract, lookup, Field};
pub use flatten::flatten;
pub use record::{NormalizeOutcome, NormalizeReport, Normalizer};
pub use writer::{write_table, TableWriter};
