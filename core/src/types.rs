//! Domain types for reports calls: column values, rows, filters, import
//! payloads and import options.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ReportsError;

/// A scalar column value. Rendered as plain text on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Integer(n) => write!(f, "{n}"),
            CellValue::Float(x) => write!(f, "{x}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Integer(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Integer(n.into())
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        CellValue::Float(x)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

macro_rules! column_map {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(BTreeMap<String, CellValue>);

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            /// Builder-style insert.
            pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
                self.insert(column, value);
                self
            }

            pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
                self.0.insert(column.into(), value.into());
            }

            pub fn get(&self, column: &str) -> Option<&CellValue> {
                self.0.get(column)
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Columns in sorted order.
            pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
                self.0.iter().map(|(k, v)| (k.as_str(), v))
            }
        }

        impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for $name {
            fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
                Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
            }
        }
    };
}

column_map!(
    /// Column values for an inserted or updated row.
    RowData
);

column_map!(
    /// Equality filter: every column must equal its value. An empty filter
    /// matches every row.
    Filter
);

/// Data for a bulk import.
pub enum ImportPayload {
    /// Raw bytes read from `reader`. The file type is CSV when `filename`
    /// ends in `.csv`, JSON otherwise.
    Stream {
        filename: String,
        reader: Box<dyn Read + Send>,
    },
    /// Row objects, sent as a JSON array.
    Rows(Vec<Value>),
    /// Delimited text, sent verbatim as CSV.
    Text(String),
}

impl ImportPayload {
    pub fn stream(filename: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        ImportPayload::Stream {
            filename: filename.into(),
            reader: Box::new(reader),
        }
    }

    /// Open `path` as a stream named after its final component.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReportsError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::stream(filename, file))
    }

    /// Serialize each record to a JSON value.
    pub fn from_records<T: Serialize>(records: &[T]) -> Result<Self, ReportsError> {
        let rows = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ImportPayload::Rows(rows))
    }
}

impl fmt::Debug for ImportPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportPayload::Stream { filename, .. } => f
                .debug_struct("Stream")
                .field("filename", filename)
                .finish_non_exhaustive(),
            ImportPayload::Rows(rows) => f.debug_tuple("Rows").field(rows).finish(),
            ImportPayload::Text(text) => f.debug_tuple("Text").field(text).finish(),
        }
    }
}

/// Declared type of the uploaded file (`ZOHO_IMPORT_FILETYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Json,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Csv => "CSV",
            FileType::Json => "JSON",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            FileType::Csv => "text/csv",
            FileType::Json => "application/json",
        }
    }
}

/// How imported rows combine with existing rows (`ZOHO_IMPORT_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportType {
    #[default]
    Append,
    TruncateAdd,
    UpdateAdd,
}

impl ImportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportType::Append => "APPEND",
            ImportType::TruncateAdd => "TRUNCATEADD",
            ImportType::UpdateAdd => "UPDATEADD",
        }
    }
}

/// What the service does with a row it cannot import (`ZOHO_ON_IMPORT_ERROR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OnImportError {
    #[default]
    Abort,
    SkipRow,
    SetColumnEmpty,
}

impl OnImportError {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnImportError::Abort => "ABORT",
            OnImportError::SkipRow => "SKIPROW",
            OnImportError::SetColumnEmpty => "SETCOLUMNEMPTY",
        }
    }
}

/// Import settings. `Default` appends, auto-identifies columns, never
/// creates the table and aborts on the first bad row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub import_type: ImportType,
    pub auto_identify: bool,
    pub create_table: bool,
    pub on_error: OnImportError,
    /// Key columns for `ImportType::UpdateAdd`.
    pub matching_columns: Vec<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            import_type: ImportType::Append,
            auto_identify: true,
            create_table: false,
            on_error: OnImportError::Abort,
            matching_columns: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cell_values_render_as_plain_text() {
        assert_eq!(CellValue::from("Jane").to_string(), "Jane");
        assert_eq!(CellValue::from(42).to_string(), "42");
        assert_eq!(CellValue::from(2.5).to_string(), "2.5");
        assert_eq!(CellValue::from(true).to_string(), "true");
    }

    #[test]
    fn row_data_deserializes_from_json_object() {
        let row: RowData = serde_json::from_value(json!({"Name": "Jane", "Age": 31})).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("Age"), Some(&CellValue::Integer(31)));
        assert_eq!(row.get("Name"), Some(&CellValue::Text("Jane".to_string())));
    }

    #[test]
    fn filter_iterates_in_sorted_column_order() {
        let filter = Filter::new().with("b", 1).with("a", 2);
        let columns: Vec<&str> = filter.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["a", "b"]);
    }

    #[test]
    fn collect_into_row_data() {
        let row: RowData = [("Region", "East"), ("Sales", "100")].into_iter().collect();
        assert_eq!(row.len(), 2);
        assert!(!row.is_empty());
    }

    #[test]
    fn from_records_serializes_each_record() {
        #[derive(Serialize)]
        struct Sale {
            region: &'static str,
            amount: u32,
        }
        let payload = ImportPayload::from_records(&[Sale {
            region: "East",
            amount: 10,
        }])
        .unwrap();
        match payload {
            ImportPayload::Rows(rows) => {
                assert_eq!(rows, vec![json!({"region": "East", "amount": 10})])
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn from_path_missing_file_is_io_error() {
        let err = ImportPayload::from_path("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, ReportsError::Io(_)));
    }

    #[test]
    fn default_import_options() {
        let opts = ImportOptions::default();
        assert_eq!(opts.import_type.as_str(), "APPEND");
        assert!(opts.auto_identify);
        assert!(!opts.create_table);
        assert_eq!(opts.on_error.as_str(), "ABORT");
    }
}
