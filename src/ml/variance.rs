//! Explained and cumulative variance, and the threshold-crossing component

use crate::structs::{PcaError, PrincipalComponentSet, Result, VarianceSummary};

/// Default cumulative-variance threshold, in percent
pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 80.0;

/// Slack on the threshold comparison so a full set summing to 99.9999999% still reaches 100%
const THRESHOLD_TOLERANCE: f64 = 1e-9;

/// Round half away from zero to one decimal place
#[must_use]
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Summarize explained variance per component.
///
/// # Errors
/// `InvalidConfig` if `threshold` is outside (0, 100], `ThresholdUnreachable`
/// if the cumulative percentage never reaches it
pub fn variance_summary(pcs: &PrincipalComponentSet, threshold: f64) -> Result<VarianceSummary> {
    validate_threshold(threshold)?;

    let ratios = pcs.ratios();
    let individual_pct: Vec<f64> = ratios.iter().map(|r| r * 100.0).collect();
    let cumulative_pct: Vec<f64> = individual_pct
        .iter()
        .scan(0.0, |running, pct| {
            *running += pct;
            Some(*running)
        })
        .collect();

    let crossing_index = cumulative_pct
        .iter()
        .position(|&c| c >= threshold - THRESHOLD_TOLERANCE)
        .ok_or_else(|| PcaError::ThresholdUnreachable {
            threshold,
            reached: cumulative_pct.last().copied().unwrap_or(0.0),
        })?;

    Ok(VarianceSummary {
        labels: pcs.labels(),
        individual_pct_display: individual_pct.iter().copied().map(round_one_decimal).collect(),
        cumulative_pct_display: cumulative_pct.iter().copied().map(round_one_decimal).collect(),
        ratios,
        individual_pct,
        cumulative_pct,
        threshold,
        crossing_index,
    })
}

/// # Errors
/// `InvalidConfig` if `threshold` is not a percentage in (0, 100]
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if threshold.is_finite() && threshold > 0.0 && threshold <= 100.0 {
        Ok(())
    } else {
        Err(PcaError::InvalidConfig(format!(
            "Variance threshold must be in (0, 100], got {threshold}"
        )))
    }
}
