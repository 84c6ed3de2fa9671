//! Z-scoring of each variable across observations

use crate::structs::{CleanedMatrix, Orientation, StandardizedMatrix};
use log::{debug, warn};
use ndarray::{Array2, ArrayView2, Axis};

/// Relative tolerance below which a standard deviation counts as zero
const ZERO_VARIANCE_EPS: f64 = 1e-12;

impl StandardizedMatrix {
    /// Standardize a cleaned matrix in the requested orientation.
    ///
    /// With `SamplesAsObservations` the feature x sample matrix is transposed so
    /// each feature is scaled by its distribution across samples.
    #[must_use]
    pub fn from_cleaned(matrix: &CleanedMatrix, orientation: Orientation) -> Self {
        match orientation {
            Orientation::SamplesAsObservations => Self::from_observations(
                matrix.values.t(),
                matrix.sample_ids.clone(),
                matrix.feature_ids.clone(),
                matrix.id_column.clone(),
                orientation,
            ),
            Orientation::FeaturesAsObservations => Self::from_observations(
                matrix.values.view(),
                matrix.feature_ids.clone(),
                matrix.sample_ids.clone(),
                "sample".to_string(),
                orientation,
            ),
        }
    }

    /// Standardize an (observations x variables) view with population variance.
    ///
    /// Constant variables become all zeros and are listed in `zero_variance`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_observations(
        data: ArrayView2<'_, f64>,
        observation_ids: Vec<String>,
        variable_ids: Vec<String>,
        variable_label: String,
        orientation: Orientation,
    ) -> Self {
        let n = data.nrows().max(1) as f64;
        let mut out = Array2::<f64>::zeros(data.raw_dim());
        let mut means = Vec::with_capacity(data.ncols());
        let mut std_devs = Vec::with_capacity(data.ncols());
        let mut zero_variance = Vec::new();

        for (j, column) in data.axis_iter(Axis(1)).enumerate() {
            let mean = column.sum() / n;
            let variance = column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let std_dev = variance.sqrt();

            if std_dev <= ZERO_VARIANCE_EPS * mean.abs().max(1.0) {
                debug!("Variable '{}' is constant; standardized to zero", variable_ids[j]);
                zero_variance.push(j);
                std_devs.push(0.0);
            } else {
                out.column_mut(j)
                    .iter_mut()
                    .zip(column.iter())
                    .for_each(|(o, &x)| *o = (x - mean) / std_dev);
                std_devs.push(std_dev);
            }
            means.push(mean);
        }

        if !zero_variance.is_empty() {
            warn!(
                "{} of {} variables have zero variance",
                zero_variance.len(),
                data.ncols()
            );
        }

        Self {
            data: out,
            observation_ids,
            variable_ids,
            variable_label,
            means,
            std_devs,
            zero_variance,
            orientation,
        }
    }

    /// Map an (observations x variables) standardized matrix back to original
    /// units, in the feature x sample layout of the `CleanedMatrix`.
    #[must_use]
    pub fn inverse_transform(&self, standardized: &Array2<f64>) -> Array2<f64> {
        let mut restored = standardized.clone();
        for (j, mut column) in restored.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, std_dev) = (self.means[j], self.std_devs[j]);
            column.mapv_inplace(|z| z * std_dev + mean);
        }
        match self.orientation {
            Orientation::SamplesAsObservations => restored.reversed_axes(),
            Orientation::FeaturesAsObservations => restored,
        }
    }
}
