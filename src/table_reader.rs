//! Builds a `RawTable` from CSV/TSV files or JSON documents

use crate::error::{PcaError, Result};
use crate::structs::{CellValue, RawTable};
use csv::ReaderBuilder;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Column name given to the identifiers of a split-orientation JSON table
pub const SPLIT_INDEX_COLUMN: &str = "index";

impl RawTable {
    /// Load a table from disk, choosing the parser from the file extension.
    ///
    /// `.json` is parsed as JSON, `.tsv` as TSV, anything else as CSV
    /// (or TSV when `is_tsv` is set).
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path, is_tsv: bool) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("json") => {
                let content = std::fs::read_to_string(path)?;
                Self::from_json_str(&content)
            }
            Some("tsv") => Self::from_csv_reader(std::fs::File::open(path)?, true),
            _ => Self::from_csv_reader(std::fs::File::open(path)?, is_tsv),
        }
    }

    /// Parse CSV or TSV with a header row
    ///
    /// # Errors
    /// Returns error if the input is not valid delimited text
    pub fn from_csv_reader<R: Read>(reader: R, is_tsv: bool) -> Result<Self> {
        let delimiter = if is_tsv { b'\t' } else { b',' };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        // Bytes that are not UTF-8 become U+FFFD, so only the affected cell is unusable
        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        let mut table = Self::new(headers);
        for result in reader.byte_records() {
            let record = result?;
            let cells = record
                .iter()
                .map(|field| {
                    let s = String::from_utf8_lossy(field);
                    if s.trim().is_empty() {
                        CellValue::Missing
                    } else {
                        CellValue::Text(s.into_owned())
                    }
                })
                .collect();
            table.push_row(cells);
        }

        Ok(table)
    }

    /// Parse a JSON table in records orientation (`[{col: value}, ...]`)
    /// or split orientation (`{"index": [...], "columns": [...], "data": [[...]]}`)
    ///
    /// # Errors
    /// Returns error if the JSON is invalid or matches neither orientation
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json_value(value)
    }

    /// # Errors
    /// Returns error if the value matches neither supported orientation
    pub fn from_json_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(records) => from_records(records),
            Value::Object(mut obj) => {
                if obj.contains_key("columns") && obj.contains_key("data") {
                    let index = obj.remove("index").unwrap_or(Value::Null);
                    let columns = obj.remove("columns").unwrap_or(Value::Null);
                    let data = obj.remove("data").unwrap_or(Value::Null);
                    from_split(index, columns, data)
                } else if let Some(Value::Array(records)) = obj.remove("rows") {
                    from_records(records)
                } else {
                    Err(PcaError::MalformedInput(
                        "JSON table must be an array of records or have 'index'/'columns'/'data' fields"
                            .into(),
                    ))
                }
            }
            _ => Err(PcaError::MalformedInput(
                "JSON table must be an array or an object".into(),
            )),
        }
    }
}

fn cell_from_json(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Missing,
        Value::Number(n) => n.as_f64().map_or(CellValue::Missing, CellValue::Number),
        Value::String(s) if s.trim().is_empty() => CellValue::Missing,
        Value::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

fn from_records(records: Vec<Value>) -> Result<RawTable> {
    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (idx, record) in records.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            PcaError::MalformedInput(format!("Record {idx} is not a JSON object"))
        })?;
        for key in obj.keys() {
            if !positions.contains_key(key) {
                positions.insert(key.clone(), columns.len());
                columns.push(key.clone());
            }
        }
    }

    let mut table = RawTable::new(columns);
    for record in &records {
        let mut cells = vec![CellValue::Missing; table.col_count()];
        if let Some(obj) = record.as_object() {
            for (key, value) in obj {
                if let Some(&pos) = positions.get(key) {
                    cells[pos] = cell_from_json(value);
                }
            }
        }
        table.push_row(cells);
    }

    Ok(table)
}

fn from_split(index: Value, columns: Value, data: Value) -> Result<RawTable> {
    let Value::Array(columns) = columns else {
        return Err(PcaError::MalformedInput("'columns' must be an array".into()));
    };
    let Value::Array(data) = data else {
        return Err(PcaError::MalformedInput("'data' must be an array".into()));
    };

    let column_names: Vec<String> = columns.iter().map(json_label).collect();
    if column_names.iter().any(|c| c == SPLIT_INDEX_COLUMN) {
        return Err(PcaError::MalformedInput(format!(
            "Column name '{SPLIT_INDEX_COLUMN}' is reserved for the split index"
        )));
    }

    let index_labels: Vec<String> = match index {
        Value::Array(labels) => labels.iter().map(json_label).collect(),
        Value::Null => (0..data.len()).map(|i| i.to_string()).collect(),
        _ => return Err(PcaError::MalformedInput("'index' must be an array".into())),
    };
    if index_labels.len() != data.len() {
        return Err(PcaError::MalformedInput(format!(
            "'index' has {} labels but 'data' has {} rows",
            index_labels.len(),
            data.len()
        )));
    }

    let mut header = Vec::with_capacity(column_names.len() + 1);
    header.push(SPLIT_INDEX_COLUMN.to_string());
    header.extend(column_names);

    let mut table = RawTable::new(header);
    table.declared_identifier = Some(SPLIT_INDEX_COLUMN.to_string());

    for (label, row) in index_labels.into_iter().zip(data) {
        let Value::Array(values) = row else {
            return Err(PcaError::MalformedInput("Each 'data' row must be an array".into()));
        };
        let mut cells = Vec::with_capacity(values.len() + 1);
        cells.push(CellValue::Text(label));
        cells.extend(values.iter().map(cell_from_json));
        table.push_row(cells);
    }

    Ok(table)
}

fn json_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::{CleanedMatrix, IdentifierColumn};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("create temp file");
        file.write_all(content.as_bytes()).expect("write content");
        file
    }

    #[test]
    fn test_parse_csv() {
        let file = create_test_file("gene,s1,s2\ng1,1.5,2\ng2,\"3,5\",4\n", ".csv");
        let table = RawTable::from_file(file.path(), false).expect("parse csv");

        assert_eq!(table.columns, vec!["gene", "s1", "s2"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1][1], CellValue::Text("3,5".into()));
        assert_eq!(table.rows[1][1].to_number(), Some(3.5));
    }

    #[test]
    fn test_invalid_utf8_only_affects_its_cell() {
        let content = b"locus tag,product,s1,s2\nA1,kinase,1,2\nA2,Stra\xDFe,3,5\nA3,porin,4,\xB1\n";
        let table = RawTable::from_csv_reader(&content[..], false).expect("parse csv");

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows[1][1], CellValue::Text("Stra\u{FFFD}e".into()));

        let (cleaned, report) =
            CleanedMatrix::from_raw(&table, &IdentifierColumn::Infer).expect("clean");
        assert_eq!(cleaned.feature_ids, vec!["A1", "A2"]);
        assert_eq!(report.discarded_columns, vec!["product"]);
        assert_eq!(report.dropped_rows.len(), 1);
        assert_eq!(report.dropped_rows[0].feature_id, "A3");
    }

    #[test]
    fn test_parse_tsv_short_row_is_padded() {
        let file = create_test_file("gene\ts1\ts2\ng1\t1\n", ".txt");
        let table = RawTable::from_file(file.path(), true).expect("parse tsv");

        assert_eq!(table.col_count(), 3);
        assert_eq!(table.rows[0][2], CellValue::Missing);
    }

    #[test]
    fn test_parse_json_records_preserves_column_order() {
        let json = r#"[
            {"locus tag": "A", "s2": "1,5", "s1": 2},
            {"locus tag": "B", "s2": "2,5", "s1": null}
        ]"#;
        let table = RawTable::from_json_str(json).expect("parse records");

        assert_eq!(table.columns, vec!["locus tag", "s2", "s1"]);
        assert_eq!(table.rows[0][2], CellValue::Number(2.0));
        assert_eq!(table.rows[1][2], CellValue::Missing);
        assert!(table.declared_identifier.is_none());
    }

    #[test]
    fn test_parse_json_records_with_missing_keys() {
        let json = r#"[{"id": "a", "x": 1}, {"id": "b", "y": 2}]"#;
        let table = RawTable::from_json_str(json).expect("parse records");

        assert_eq!(table.columns, vec!["id", "x", "y"]);
        assert_eq!(table.rows[0][2], CellValue::Missing);
        assert_eq!(table.rows[1][1], CellValue::Missing);
    }

    #[test]
    fn test_parse_json_split() {
        let json = r#"{
            "index": ["g1", "g2"],
            "columns": ["s1", "s2"],
            "data": [[1.0, 2.0], [3.0, "4,5"]]
        }"#;
        let table = RawTable::from_json_str(json).expect("parse split");

        assert_eq!(table.columns, vec!["index", "s1", "s2"]);
        assert_eq!(table.declared_identifier.as_deref(), Some("index"));
        assert_eq!(table.rows[0][0], CellValue::Text("g1".into()));
        assert_eq!(table.rows[1][2].to_number(), Some(4.5));
    }

    #[test]
    fn test_parse_json_split_length_mismatch() {
        let json = r#"{"index": ["g1"], "columns": ["s1"], "data": [[1.0], [2.0]]}"#;
        assert!(matches!(
            RawTable::from_json_str(json),
            Err(PcaError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parse_json_rejects_scalar() {
        assert!(RawTable::from_json_str("42").is_err());
    }
}
