//! Synthetic expression tables for trying the pipeline without real data

use crate::structs::{CellValue, PcaError, RawTable, Result};
use csv::WriterBuilder;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Write;

pub const DEMO_ID_COLUMN: &str = "locus tag";
pub const DEMO_PRODUCT_COLUMN: &str = "product";

const LOCUS_TAG_LEN: usize = 10;
const LOCUS_TAG_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PRODUCTS: &[&str] = &[
    "hypothetical protein",
    "ABC transporter permease",
    "DNA-binding response regulator",
    "30S ribosomal protein S12",
    "outer membrane porin",
    "serine/threonine protein kinase",
];

/// Parameters of the generated table
#[derive(Debug, Clone, Copy)]
pub struct DemoParams {
    pub features: usize,
    pub samples: usize,
    pub seed: u64,
}

/// Generate a feature x sample table with two sample groups.
///
/// Each feature gets a base level in [3, 7) and a group effect in [-2, 2),
/// so the first component separates the groups. Values are written with
/// two decimals and a comma decimal separator.
///
/// # Errors
/// `InvalidConfig` if fewer than 2 features or samples are requested
pub fn generate(params: DemoParams) -> Result<RawTable> {
    if params.features < 2 || params.samples < 2 {
        return Err(PcaError::InvalidConfig(format!(
            "Demo table needs at least 2 features and 2 samples, got {} x {}",
            params.features, params.samples
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

    let mut columns = vec![DEMO_ID_COLUMN.to_string(), DEMO_PRODUCT_COLUMN.to_string()];
    columns.extend((1..=params.samples).map(|i| format!("sample{i}")));
    let mut table = RawTable::new(columns);

    let half = params.samples / 2;
    for _ in 0..params.features {
        let base: f64 = rng.gen_range(3.0..7.0);
        let effect: f64 = rng.gen_range(-2.0..2.0);

        let mut cells = Vec::with_capacity(params.samples + 2);
        cells.push(CellValue::Text(locus_tag(&mut rng)));
        cells.push(CellValue::Text(
            PRODUCTS[rng.gen_range(0..PRODUCTS.len())].to_string(),
        ));
        for s in 0..params.samples {
            let shift = if s < half { effect } else { -effect };
            let noise: f64 = rng.gen_range(-0.5..0.5);
            cells.push(CellValue::Text(comma_decimal(base + shift + noise)));
        }
        table.push_row(cells);
    }

    Ok(table)
}

/// Write a table as CSV with a header row
///
/// # Errors
/// Returns error if writing fails
pub fn write_csv<W: Write>(table: &RawTable, writer: W) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(CellValue::as_text))?;
    }
    writer.flush()?;
    Ok(())
}

fn locus_tag(rng: &mut ChaCha8Rng) -> String {
    (0..LOCUS_TAG_LEN)
        .map(|_| char::from(LOCUS_TAG_CHARSET[rng.gen_range(0..LOCUS_TAG_CHARSET.len())]))
        .collect()
}

fn comma_decimal(value: f64) -> String {
    format!("{value:.2}").replace('.', ",")
}
