//! Analysis pipeline: clean, standardize, decompose, then derive metrics

use super::contributors::{rank_contributors, DEFAULT_TOP_K};
use super::pca::{run_pca, PcaParams, DEFAULT_MAX_CELLS};
use super::variance::{validate_threshold, variance_summary, DEFAULT_VARIANCE_THRESHOLD};
use crate::structs::{
    CleanedMatrix, CleaningReport, ContributorRanking, IdentifierColumn, Orientation, PcaError,
    PcaSolver, PrincipalComponentSet, RawTable, Result, StandardizedMatrix, VarianceSummary,
};
use log::{info, warn};
use serde::Deserialize;
use std::path::Path;

/// Configuration for the analysis pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub identifier: IdentifierColumn,
    pub orientation: Orientation,
    /// `None` keeps every component
    pub n_components: Option<usize>,
    /// Cumulative variance percentage for the scree crossing marker
    pub variance_threshold: f64,
    pub top_k: usize,
    pub include_bottom: bool,
    pub solver: PcaSolver,
    pub max_cells: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            identifier: IdentifierColumn::Infer,
            orientation: Orientation::SamplesAsObservations,
            n_components: None,
            variance_threshold: DEFAULT_VARIANCE_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            include_bottom: false,
            solver: PcaSolver::Auto,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration file; missing fields take their defaults
    ///
    /// # Errors
    /// Returns error if the file cannot be read or contains unknown or mistyped fields
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            PcaError::InvalidConfig(format!("Invalid config file {}: {e}", path.display()))
        })
    }

    /// # Errors
    /// `InvalidConfig` for out-of-range values
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.variance_threshold)?;
        if self.top_k == 0 {
            return Err(PcaError::InvalidConfig("top_k must be at least 1".into()));
        }
        if self.max_cells == 0 {
            return Err(PcaError::InvalidConfig("max_cells must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn pca_params(&self) -> PcaParams {
        PcaParams {
            n_components: self.n_components,
            solver: self.solver,
            max_cells: self.max_cells,
        }
    }
}

/// Everything one pipeline run produces
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub report: CleaningReport,
    pub standardized: StandardizedMatrix,
    pub components: PrincipalComponentSet,
    /// `None` when the retained components never reach the threshold
    pub variance: Option<VarianceSummary>,
    pub ranking: ContributorRanking,
}

impl PipelineResult {
    /// Root-mean-square error, in original units, of rebuilding the cleaned
    /// values from the retained components only
    ///
    /// # Errors
    /// Returns error if the component set does not match the standardized matrix
    #[allow(clippy::cast_precision_loss)]
    pub fn reconstruction_rmse(&self) -> Result<f64> {
        let data = &self.standardized.data;
        let scores = self.components.transform(data)?;
        let approx = self.components.inverse_transform(&scores)?;

        let original = self.standardized.inverse_transform(data);
        let rebuilt = self.standardized.inverse_transform(&approx);
        let sum_sq: f64 = original
            .iter()
            .zip(rebuilt.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Ok((sum_sq / original.len().max(1) as f64).sqrt())
    }
}

/// Clean, standardize and decompose a raw table
///
/// # Errors
/// Returns error for invalid configuration, unusable input or a failed decomposition
pub fn compute_components(
    table: &RawTable,
    config: &PipelineConfig,
) -> Result<(CleaningReport, StandardizedMatrix, PrincipalComponentSet)> {
    config.validate()?;

    let (cleaned, report) = CleanedMatrix::from_raw(table, &config.identifier)?;
    info!(
        "Cleaned matrix: {} features x {} samples ({} rows dropped)",
        cleaned.n_features(),
        cleaned.n_samples(),
        report.dropped_rows.len()
    );

    let standardized = StandardizedMatrix::from_cleaned(&cleaned, config.orientation);
    let components = run_pca(&standardized, &config.pca_params())?;
    info!(
        "Computed {} of {} components, {:.1}% of variance retained",
        components.len(),
        components.max_components,
        components.explained_total() * 100.0
    );

    Ok((report, standardized, components))
}

/// Run the full pipeline
///
/// # Errors
/// Returns error if cleaning, PCA or contributor ranking fails.
/// An unreachable variance threshold is non-fatal (logged and set to `None`).
pub fn run_pipeline(table: &RawTable, config: &PipelineConfig) -> Result<PipelineResult> {
    let (report, standardized, components) = compute_components(table, config)?;

    let variance = match variance_summary(&components, config.variance_threshold) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Scree summary skipped: {e}");
            None
        }
    };

    let ranking = rank_contributors(&components, config.top_k, config.include_bottom)?;

    Ok(PipelineResult {
        report,
        standardized,
        components,
        variance,
        ranking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_table() -> RawTable {
        let content = "locus tag,product,s1,s2,s3,s4\n\
                       A1,kinase,\"1,5\",2.0,3.1,4.2\n\
                       A2,ligase,2.0,4.5,6.1,8.0\n\
                       A3,unknown,9.0,3.0,1.0,0.5\n\
                       A4,kinase,1.0,n/a,1.0,1.0\n\
                       A5,porin,5.0,5.5,4.0,7.0\n\
                       A6,porin,3.3,3.3,3.3,3.3";
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("create");
        file.write_all(content.as_bytes()).expect("write");
        RawTable::from_file(file.path(), false).expect("parse")
    }

    #[test]
    fn test_full_pipeline() {
        let table = create_test_table();
        let result = run_pipeline(&table, &PipelineConfig::default()).expect("pipeline");

        assert_eq!(result.report.dropped_rows.len(), 1);
        assert_eq!(result.report.discarded_columns, vec!["product"]);
        // 4 samples: min(4 - 1, 5 features)
        assert_eq!(result.components.len(), 3);
        assert_eq!(result.standardized.zero_variance, vec![4]);
        assert!(result.variance.is_some());
        assert_eq!(result.ranking.top.len(), 3);
        assert_eq!(result.ranking.top[0].features.len(), 5);
        assert!((result.components.explained_total() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reconstruction_error_shrinks_with_components() {
        let table = create_test_table();
        let all = run_pipeline(&table, &PipelineConfig::default()).expect("pipeline");
        let one = run_pipeline(
            &table,
            &PipelineConfig {
                n_components: Some(1),
                ..PipelineConfig::default()
            },
        )
        .expect("pipeline");

        assert!(all.reconstruction_rmse().expect("rmse") < 1e-8);
        assert!(one.reconstruction_rmse().expect("rmse") > 1e-3);
    }

    #[test]
    fn test_features_as_observations_plots_feature_ids() {
        let table = create_test_table();
        let config = PipelineConfig {
            orientation: Orientation::FeaturesAsObservations,
            ..PipelineConfig::default()
        };
        let result = run_pipeline(&table, &config).expect("pipeline");

        let plot = crate::ml::output::scatter_plot(&result.components, 2).expect("scatter");
        let ids: Vec<&str> = plot.points.iter().map(|p| p.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2", "A3", "A5", "A6"]);
        assert_eq!(result.components.variable_label, "sample");
    }

    #[test]
    fn test_two_samples_comma_decimals() {
        let json = r#"[
            {"gene": "g1", "a": "1,5", "b": "2,5"},
            {"gene": "g2", "a": "3,0", "b": "1,0"},
            {"gene": "g3", "a": "0,5", "b": "0,7"}
        ]"#;
        let table = RawTable::from_json_str(json).expect("parse");
        let result = run_pipeline(&table, &PipelineConfig::default()).expect("pipeline");

        assert_eq!(result.components.len(), 1);
        let variance = result.variance.expect("variance");
        assert_eq!(variance.crossing_index, 0);
    }

    #[test]
    fn test_component_count_not_clamped() {
        let json = r#"[
            {"gene": "g1", "a": 1, "b": 2, "c": 4},
            {"gene": "g2", "a": 3, "b": 1, "c": 2},
            {"gene": "g3", "a": 5, "b": 5, "c": 1}
        ]"#;
        let table = RawTable::from_json_str(json).expect("parse");
        let config = PipelineConfig {
            n_components: Some(5),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            run_pipeline(&table, &config),
            Err(PcaError::InvalidComponentCount { requested: 5, max: 2 })
        ));
    }

    #[test]
    fn test_truncated_components_skip_scree() {
        let table = create_test_table();
        let config = PipelineConfig {
            n_components: Some(1),
            variance_threshold: 100.0,
            ..PipelineConfig::default()
        };
        let result = run_pipeline(&table, &config).expect("pipeline");
        assert!(result.variance.is_none());
        assert_eq!(result.ranking.top.len(), 1);
    }

    #[test]
    fn test_zero_variance_policy_is_shared() {
        let table = create_test_table();
        let result = run_pipeline(&table, &PipelineConfig::default()).expect("pipeline");

        // The constant feature A6 has zero loading on every component that carries variance
        for c in result.components.components.iter().filter(|c| c.eigenvalue > 1e-9) {
            assert!(c.loadings[4].abs() < 1e-9);
            assert!(c.scores.iter().all(|s| s.is_finite()));
        }
        let variance = result.variance.expect("variance");
        assert!(variance.cumulative_pct.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_config_file_defaults_and_validation() {
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(br#"{"top_k": 3, "identifier": {"named": "locus tag"}}"#)
            .expect("write");
        let config = PipelineConfig::from_file(file.path()).expect("load");

        assert_eq!(config.top_k, 3);
        assert_eq!(config.identifier, IdentifierColumn::Named("locus tag".into()));
        assert!((config.variance_threshold - 80.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());

        let bad = PipelineConfig {
            variance_threshold: 120.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(bad.validate(), Err(PcaError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_file_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(br#"{"topk": 3}"#).expect("write");
        assert!(matches!(
            PipelineConfig::from_file(file.path()),
            Err(PcaError::InvalidConfig(_))
        ));
    }
}
