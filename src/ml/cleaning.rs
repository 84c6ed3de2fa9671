//! Turns a heterogeneous `RawTable` into a numeric feature x sample matrix

use crate::structs::{
    CellValue, CleanedMatrix, CleaningReport, DroppedRow, IdentifierColumn, PcaError, RawTable,
    Result,
};
use log::{debug, info, warn};
use ndarray::Array2;
use std::collections::HashSet;

impl CleanedMatrix {
    /// Clean a raw table.
    ///
    /// The identifier column is resolved from `identifier`, unless the table
    /// format declares one itself. Other columns whose first-row value is
    /// non-numeric are descriptive and discarded. Rows with any missing or
    /// unparseable sample value are dropped whole.
    ///
    /// # Errors
    /// `MalformedInput` if the table is empty or has no usable identifier column,
    /// `InsufficientData` if fewer than 2 rows or 2 sample columns survive
    pub fn from_raw(
        table: &RawTable,
        identifier: &IdentifierColumn,
    ) -> Result<(Self, CleaningReport)> {
        if table.is_empty() {
            return Err(PcaError::MalformedInput("Input table is empty".into()));
        }

        let identifier = match &table.declared_identifier {
            Some(name) => IdentifierColumn::Named(name.clone()),
            None => identifier.clone(),
        };

        let non_numeric = non_numeric_columns(table);
        let id_index = resolve_identifier(table, &identifier, &non_numeric)?;
        let id_column = id_index.map_or_else(|| "row".to_string(), |i| table.columns[i].clone());

        let mut report = CleaningReport {
            original_rows: table.row_count(),
            ..CleaningReport::default()
        };

        let mut sample_cols = Vec::new();
        for (i, name) in table.columns.iter().enumerate() {
            if Some(i) == id_index {
                continue;
            }
            if non_numeric.contains(&i) {
                info!("Discarding descriptive column '{name}'");
                report.discarded_columns.push(name.clone());
            } else {
                sample_cols.push(i);
            }
        }

        if sample_cols.len() < 2 {
            return Err(PcaError::InsufficientData {
                rows: table.row_count(),
                columns: sample_cols.len(),
            });
        }

        let mut feature_ids = Vec::new();
        let mut seen = HashSet::new();
        let mut flat = Vec::with_capacity(table.row_count() * sample_cols.len());
        let mut row_values = Vec::with_capacity(sample_cols.len());

        'rows: for (position, row) in table.rows.iter().enumerate() {
            let feature_id = match id_index {
                Some(i) => row[i].as_text().trim().to_string(),
                None => format!("row_{position}"),
            };
            if feature_id.is_empty() {
                debug!("Dropping row {position}: missing identifier");
                report.dropped_rows.push(DroppedRow {
                    position,
                    feature_id,
                    column: id_column.clone(),
                    value: String::new(),
                });
                continue;
            }

            row_values.clear();
            for &col in &sample_cols {
                match parse_cell(&table.columns[col], &row[col]) {
                    Ok(v) => row_values.push(v),
                    Err(PcaError::NumericConversion { column, value }) => {
                        debug!("Dropping row {position} ('{feature_id}'): column '{column}' has '{value}'");
                        report.dropped_rows.push(DroppedRow {
                            position,
                            feature_id,
                            column,
                            value,
                        });
                        continue 'rows;
                    }
                    Err(e) => return Err(e),
                }
            }

            if !seen.insert(feature_id.clone()) {
                debug!("Dropping row {position}: duplicate identifier '{feature_id}'");
                report.duplicate_ids.push(feature_id);
                continue;
            }

            feature_ids.push(feature_id);
            flat.extend_from_slice(&row_values);
        }

        if !report.dropped_rows.is_empty() || !report.duplicate_ids.is_empty() {
            warn!(
                "Dropped {} of {} rows, {} duplicate identifiers",
                report.dropped_rows.len(),
                report.original_rows,
                report.duplicate_ids.len()
            );
        }

        if feature_ids.len() < 2 {
            return Err(PcaError::InsufficientData {
                rows: feature_ids.len(),
                columns: sample_cols.len(),
            });
        }

        let values = Array2::from_shape_vec((feature_ids.len(), sample_cols.len()), flat)
            .map_err(|e| PcaError::MalformedInput(format!("Failed to build matrix: {e}")))?;
        let sample_ids = sample_cols
            .iter()
            .map(|&i| table.columns[i].clone())
            .collect();

        Ok((
            Self {
                id_column,
                feature_ids,
                sample_ids,
                values,
            },
            report,
        ))
    }
}

/// Columns whose first-row value is text that does not parse as a number.
///
/// A missing first-row value says nothing about the column's role and is
/// treated as numeric.
fn non_numeric_columns(table: &RawTable) -> Vec<usize> {
    let Some(first) = table.rows.first() else {
        return Vec::new();
    };
    first
        .iter()
        .enumerate()
        .filter(|(_, cell)| matches!(cell, CellValue::Text(_)) && cell.to_number().is_none())
        .map(|(i, _)| i)
        .collect()
}

fn resolve_identifier(
    table: &RawTable,
    identifier: &IdentifierColumn,
    non_numeric: &[usize],
) -> Result<Option<usize>> {
    match identifier {
        IdentifierColumn::Named(name) => table.column_index(name).map(Some).ok_or_else(|| {
            PcaError::MalformedInput(format!("Identifier column '{name}' not found"))
        }),
        IdentifierColumn::RowIndex => Ok(None),
        IdentifierColumn::Infer => match non_numeric.first() {
            Some(&i) => {
                if non_numeric.len() > 1 {
                    warn!(
                        "{} non-numeric columns found; using '{}' as identifier",
                        non_numeric.len(),
                        table.columns[i]
                    );
                }
                Ok(Some(i))
            }
            None => Err(PcaError::MalformedInput(
                "No non-numeric identifier column detected; declare one explicitly or use row indices"
                    .into(),
            )),
        },
    }
}

fn parse_cell(column: &str, cell: &CellValue) -> Result<f64> {
    cell.to_number().ok_or_else(|| PcaError::NumericConversion {
        column: column.to_string(),
        value: cell.as_text(),
    })
}
