//! # Locator Records
//!
//! Rows of the backing spreadsheet, validated into [`Record`] at the source boundary.
//!
//! ```rust
//! use locator_records::Record;
//! use serde_json::json;
//!
//! let record = Record::from_value(json!({"ZipCode": "1000, 75001", "AccessICAD": "TRUE"}), 0)?;
//! assert_eq!(record.zip_codes(), vec!["01000", "75001"]);
//! assert!(record.has_access());
//! # Ok::<(), locator_records::RecordError>(())
//! ```

mod error;
mod record;
mod source;

pub use error::{RecordError, Result};
pub use record::{parse_boolean_like, parse_records, Record};
pub use source::{HttpRecordSource, InMemoryRecordSource, RecordSource, SourceSelector};
