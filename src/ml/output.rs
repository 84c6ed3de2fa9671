//! Chart-ready result structures and their file writers
//!
//! The formatter only reshapes values. The one-decimal percentages of the scree
//! series come from `VarianceSummary`; the exact values travel alongside them.

use crate::structs::{
    CleaningReport, ComponentContributors, ContributorRanking, PcaError, PrincipalComponentSet,
    Result, VarianceSummary,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// One observation in a 2D/3D score plot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterPoint {
    /// Observation identifier: a sample id, or a feature id when features are
    /// the observations
    pub sample_id: String,
    pub coordinates: Vec<f64>,
}

/// Score plot data
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterPlot {
    pub points: Vec<ScatterPoint>,
    /// Explained-variance ratio of each plotted axis
    pub variance_ratios: Vec<f64>,
    /// `PC1 (42.17%)` style axis titles, two decimals
    pub axis_labels: Vec<String>,
}

/// Scree plot data
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeSeries {
    pub components: Vec<String>,
    /// Rounded to one decimal
    pub individual_variance_pct: Vec<f64>,
    /// Rounded to one decimal
    pub cumulative_variance_pct: Vec<f64>,
    pub threshold: f64,
    pub threshold_crossing_index: usize,
    pub exact: ScreeExact,
}

/// Full-precision scree values
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeExact {
    pub explained_variance_ratio: Vec<f64>,
    pub individual_variance_pct: Vec<f64>,
    pub cumulative_variance_pct: Vec<f64>,
}

/// Signed loadings, one row per feature
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingsTable {
    pub feature_column: String,
    pub components: Vec<String>,
    pub rows: Vec<LoadingsRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingsRow {
    pub feature_id: String,
    pub loadings: Vec<f64>,
}

impl LoadingsTable {
    /// Flat records keyed by the identifier column and component labels,
    /// e.g. `{"locus tag": "A1", "PC1": 0.04, "PC2": -0.2}`
    #[must_use]
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                record.insert(
                    self.feature_column.clone(),
                    Value::String(row.feature_id.clone()),
                );
                for (label, &loading) in self.components.iter().zip(&row.loadings) {
                    record.insert(label.clone(), serde_json::json!(loading));
                }
                record
            })
            .collect()
    }
}

/// One ranked contributor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorEntry {
    pub component: String,
    pub feature_id: String,
    pub loading: f64,
}

/// Top contributors, with bottom contributors when requested
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorsOutput {
    pub top: Vec<ContributorEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Vec<ContributorEntry>>,
}

/// Score coordinates on the first `dims` components
///
/// # Errors
/// `InvalidConfig` unless `dims` is 2 or 3, `InvalidComponentCount` if fewer
/// than `dims` components were computed
pub fn scatter_plot(pcs: &PrincipalComponentSet, dims: usize) -> Result<ScatterPlot> {
    if !(2..=3).contains(&dims) {
        return Err(PcaError::InvalidConfig(format!(
            "Scatter plots have 2 or 3 dimensions, got {dims}"
        )));
    }
    if pcs.len() < dims {
        return Err(PcaError::InvalidComponentCount {
            requested: dims,
            max: pcs.len(),
        });
    }

    let points = pcs
        .observation_ids
        .iter()
        .zip(pcs.coordinates(dims))
        .map(|(id, coordinates)| ScatterPoint {
            sample_id: id.clone(),
            coordinates,
        })
        .collect();

    let plotted = &pcs.components[..dims];
    Ok(ScatterPlot {
        points,
        variance_ratios: plotted.iter().map(|c| c.explained_variance_ratio).collect(),
        axis_labels: plotted
            .iter()
            .map(|c| format!("{} ({:.2}%)", c.label, c.explained_variance_ratio * 100.0))
            .collect(),
    })
}

#[must_use]
pub fn scree_series(summary: &VarianceSummary) -> ScreeSeries {
    ScreeSeries {
        components: summary.labels.clone(),
        individual_variance_pct: summary.individual_pct_display.clone(),
        cumulative_variance_pct: summary.cumulative_pct_display.clone(),
        threshold: summary.threshold,
        threshold_crossing_index: summary.crossing_index,
        exact: ScreeExact {
            explained_variance_ratio: summary.ratios.clone(),
            individual_variance_pct: summary.individual_pct.clone(),
            cumulative_variance_pct: summary.cumulative_pct.clone(),
        },
    }
}

#[must_use]
pub fn loadings_table(pcs: &PrincipalComponentSet) -> LoadingsTable {
    let rows = pcs
        .variable_ids
        .iter()
        .enumerate()
        .map(|(i, id)| LoadingsRow {
            feature_id: id.clone(),
            loadings: pcs.components.iter().map(|c| c.loadings[i]).collect(),
        })
        .collect();

    LoadingsTable {
        feature_column: pcs.variable_label.clone(),
        components: pcs.labels(),
        rows,
    }
}

/// Flatten per-component rankings into `(component, feature, loading)` entries
#[must_use]
pub fn contributor_list(ranked: &[ComponentContributors]) -> Vec<ContributorEntry> {
    ranked
        .iter()
        .flat_map(|c| {
            c.features.iter().map(move |f| ContributorEntry {
                component: c.component.clone(),
                feature_id: f.feature_id.clone(),
                loading: f.loading,
            })
        })
        .collect()
}

#[must_use]
pub fn contributors_output(ranking: &ContributorRanking) -> ContributorsOutput {
    ContributorsOutput {
        top: contributor_list(&ranking.top),
        bottom: ranking.bottom.as_deref().map(contributor_list),
    }
}

/// Write `summary.txt` - human readable overview
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_summary(output_dir: &Path, content: &str) -> Result<()> {
    fs::write(output_dir.join("summary.txt"), content)?;
    Ok(())
}

/// Write any serializable result as pretty JSON to `output_dir/file_name`
///
/// # Errors
/// Returns error if serialization or the write fails
pub fn write_json<T: Serialize + ?Sized>(output_dir: &Path, file_name: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(output_dir.join(file_name), json)?;
    Ok(())
}

/// Build the text overview written next to the JSON outputs
#[must_use]
pub fn build_summary(
    source: &str,
    report: &CleaningReport,
    pcs: &PrincipalComponentSet,
    variance: Option<&VarianceSummary>,
    ranking: &ContributorRanking,
) -> String {
    use std::fmt::Write as _;

    let mut s = format!("PCA summary for {source}\n");
    let _ = writeln!(s, "Cleaning: {}", report.summary());
    let _ = writeln!(
        s,
        "Matrix: {} observations x {} variables ({:?} solver), {} of {} components kept",
        pcs.observation_ids.len(),
        pcs.variable_ids.len(),
        pcs.solver,
        pcs.len(),
        pcs.max_components
    );

    match variance {
        Some(variance) => {
            let _ = writeln!(s, "\nExplained variance:");
            for i in 0..variance.labels.len() {
                let _ = writeln!(
                    s,
                    "  {}: {:.1}% (cumulative {:.1}%)",
                    variance.labels[i],
                    variance.individual_pct_display[i],
                    variance.cumulative_pct_display[i]
                );
            }
            let _ = writeln!(
                s,
                "{}% of variance reached at {}",
                variance.threshold, variance.labels[variance.crossing_index]
            );
        }
        None => {
            let _ = writeln!(
                s,
                "\nRetained components explain {:.1}% of variance, below the threshold",
                pcs.explained_total() * 100.0
            );
        }
    }

    let _ = writeln!(s, "\nTop {} contributors:", ranking.k);
    for component in &ranking.top {
        let names: Vec<String> = component
            .features
            .iter()
            .map(|f| format!("{} ({:+.4})", f.feature_id, f.loading))
            .collect();
        let _ = writeln!(s, "  {}: {}", component.component, names.join(", "));
    }

    s
}
