//! Principal component computation on a standardized matrix
//!
//! Two decompositions are available. The covariance path eigendecomposes the
//! (variables x variables) covariance matrix and is cheap when there are few
//! variables. The SVD path factors the (observations x variables) data matrix
//! directly and is the one to use for wide expression tables, where genes far
//! outnumber samples. Both produce the same explained-variance ratios.

use crate::structs::{
    component_label, Orientation, PcaError, PcaSolver, PrincipalComponent, PrincipalComponentSet,
    Result, StandardizedMatrix,
};
use log::debug;
use nalgebra::{DMatrix, SymmetricEigen, SVD};
use ndarray::{Array1, Array2};

/// Loadings closer than this in magnitude count as tied for the sign convention
const SIGN_TIE_EPS: f64 = 1e-10;

/// Default upper bound on `n_observations * n_variables`
pub const DEFAULT_MAX_CELLS: usize = 20_000_000;

/// Parameters for a PCA run
#[derive(Debug, Clone, Copy)]
pub struct PcaParams {
    /// `None` keeps all `min(n - 1, p)` components
    pub n_components: Option<usize>,
    pub solver: PcaSolver,
    pub max_cells: usize,
}

impl Default for PcaParams {
    fn default() -> Self {
        Self {
            n_components: None,
            solver: PcaSolver::Auto,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

/// Run PCA on a standardized matrix
///
/// # Errors
/// `InputTooLarge` if the solver's working matrix exceeds `max_cells`, `InvalidComponentCount`
/// if the requested count is 0 or above `min(n - 1, p)`, `InsufficientData`
/// if there is no variance at all, `Linalg` if the decomposition fails to converge
#[allow(clippy::cast_precision_loss)]
pub fn run_pca(matrix: &StandardizedMatrix, params: &PcaParams) -> Result<PrincipalComponentSet> {
    let n = matrix.n_observations();
    let p = matrix.n_variables();

    if n < 2 || p == 0 {
        return Err(insufficient(matrix, p));
    }

    let solver = match params.solver {
        PcaSolver::Auto if p <= n => PcaSolver::Covariance,
        PcaSolver::Auto => PcaSolver::Svd,
        other => other,
    };

    // The covariance path materializes a p x p matrix on top of the data
    let cells = match solver {
        PcaSolver::Covariance | PcaSolver::Auto => n.saturating_mul(p).max(p.saturating_mul(p)),
        PcaSolver::Svd => n.saturating_mul(p),
    };
    if cells > params.max_cells {
        return Err(PcaError::InputTooLarge {
            cells,
            limit: params.max_cells,
        });
    }

    let max_components = (n - 1).min(p);
    let n_components = params.n_components.unwrap_or(max_components);
    if n_components == 0 || n_components > max_components {
        return Err(PcaError::InvalidComponentCount {
            requested: n_components,
            max: max_components,
        });
    }

    let denom = (n - 1) as f64;
    let total_variance = matrix.data.iter().map(|x| x * x).sum::<f64>() / denom;
    if total_variance <= f64::EPSILON {
        return Err(insufficient(matrix, p - matrix.zero_variance.len()));
    }
    debug!("PCA on {n} x {p} matrix with {solver:?} solver, {n_components} components");

    let axes = match solver {
        PcaSolver::Covariance | PcaSolver::Auto => covariance_axes(&matrix.data, denom)?,
        PcaSolver::Svd => svd_axes(&matrix.data, denom)?,
    };

    let components = axes
        .into_iter()
        .take(n_components)
        .enumerate()
        .map(|(i, (eigenvalue, axis))| {
            let mut loadings = normalized(axis);
            let mut scores = matrix.data.dot(&loadings);
            if loadings[dominant_index(&loadings)] < 0.0 {
                loadings.mapv_inplace(|v| -v);
                scores.mapv_inplace(|v| -v);
            }
            PrincipalComponent {
                label: component_label(i),
                eigenvalue,
                explained_variance_ratio: eigenvalue / total_variance,
                loadings: loadings.to_vec(),
                scores: scores.to_vec(),
            }
        })
        .collect();

    Ok(PrincipalComponentSet {
        components,
        observation_ids: matrix.observation_ids.clone(),
        variable_ids: matrix.variable_ids.clone(),
        variable_label: matrix.variable_label.clone(),
        total_variance,
        max_components,
        solver,
    })
}

/// `InsufficientData` in feature x sample terms, whatever the orientation
fn insufficient(matrix: &StandardizedMatrix, usable_variables: usize) -> PcaError {
    let observations = matrix.n_observations();
    match matrix.orientation {
        Orientation::SamplesAsObservations => PcaError::InsufficientData {
            rows: usable_variables,
            columns: observations,
        },
        Orientation::FeaturesAsObservations => PcaError::InsufficientData {
            rows: observations,
            columns: usable_variables,
        },
    }
}

/// Eigen-pairs of the covariance matrix, eigenvalue descending
fn covariance_axes(data: &Array2<f64>, denom: f64) -> Result<Vec<(f64, Array1<f64>)>> {
    let p = data.ncols();
    let cov = data.t().dot(data) / denom;
    let cov = DMatrix::from_fn(p, p, |i, j| cov[[i, j]]);

    let eigen = SymmetricEigen::try_new(cov, f64::EPSILON, 0).ok_or_else(|| {
        PcaError::Linalg("Eigen decomposition of covariance matrix did not converge".into())
    })?;

    let pairs = eigen
        .eigenvalues
        .iter()
        .zip(eigen.eigenvectors.column_iter())
        .map(|(&value, vector)| (value.max(0.0), vector.iter().copied().collect()))
        .collect();
    Ok(sorted_descending(pairs))
}

/// Right singular vectors of the data matrix, with eigenvalues `s^2 / (n - 1)`
fn svd_axes(data: &Array2<f64>, denom: f64) -> Result<Vec<(f64, Array1<f64>)>> {
    let (n, p) = data.dim();
    let x = DMatrix::from_fn(n, p, |i, j| data[[i, j]]);

    let svd = SVD::try_new(x, false, true, f64::EPSILON, 0)
        .ok_or_else(|| PcaError::Linalg("SVD of standardized matrix did not converge".into()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| PcaError::Linalg("SVD did not produce right singular vectors".into()))?;

    let pairs = svd
        .singular_values
        .iter()
        .zip(v_t.row_iter())
        .map(|(&s, row)| (s * s / denom, row.iter().copied().collect()))
        .collect();
    Ok(sorted_descending(pairs))
}

/// Stable sort, so equal eigenvalues keep decomposition order
fn sorted_descending(mut pairs: Vec<(f64, Array1<f64>)>) -> Vec<(f64, Array1<f64>)> {
    pairs.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    pairs
}

fn normalized(mut axis: Array1<f64>) -> Array1<f64> {
    let norm = axis.dot(&axis).sqrt();
    if norm > 0.0 {
        axis.mapv_inplace(|v| v / norm);
    }
    axis
}

/// Index of the largest-magnitude entry, first one on ties
fn dominant_index(loadings: &Array1<f64>) -> usize {
    let mut best = 0;
    let mut best_abs = f64::NEG_INFINITY;
    for (i, v) in loadings.iter().enumerate() {
        if v.abs() > best_abs + SIGN_TIE_EPS {
            best = i;
            best_abs = v.abs();
        }
    }
    best
}

impl PrincipalComponentSet {
    /// Loadings as a (variables x components) matrix
    #[must_use]
    pub fn loading_matrix(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.variable_ids.len(), self.len()));
        for (j, component) in self.components.iter().enumerate() {
            out.column_mut(j)
                .iter_mut()
                .zip(&component.loadings)
                .for_each(|(o, &v)| *o = v);
        }
        out
    }

    /// Scores as an (observations x components) matrix
    #[cfg(test)]
    pub fn score_matrix(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.observation_ids.len(), self.len()));
        for (j, component) in self.components.iter().enumerate() {
            out.column_mut(j)
                .iter_mut()
                .zip(&component.scores)
                .for_each(|(o, &v)| *o = v);
        }
        out
    }

    /// Project standardized (observations x variables) data onto the components
    ///
    /// # Errors
    /// Returns error if the variable count does not match
    pub fn transform(&self, standardized: &Array2<f64>) -> Result<Array2<f64>> {
        if standardized.ncols() != self.variable_ids.len() {
            return Err(PcaError::MalformedInput(format!(
                "Expected {} variables, got {}",
                self.variable_ids.len(),
                standardized.ncols()
            )));
        }
        Ok(standardized.dot(&self.loading_matrix()))
    }

    /// Map scores back to standardized variable space
    ///
    /// # Errors
    /// Returns error if the component count does not match
    pub fn inverse_transform(&self, scores: &Array2<f64>) -> Result<Array2<f64>> {
        if scores.ncols() != self.len() {
            return Err(PcaError::MalformedInput(format!(
                "Expected {} score columns, got {}",
                self.len(),
                scores.ncols()
            )));
        }
        Ok(scores.dot(&self.loading_matrix().t()))
    }

    /// Sum of explained-variance ratios over the returned components
    #[must_use]
    pub fn explained_total(&self) -> f64 {
        self.components
            .iter()
            .map(|c| c.explained_variance_ratio)
            .sum()
    }

    /// Score vectors of the first `dims` components, one row per observation
    #[must_use]
    pub fn coordinates(&self, dims: usize) -> Vec<Vec<f64>> {
        (0..self.observation_ids.len())
            .map(|i| {
                self.components
                    .iter()
                    .take(dims)
                    .map(|c| c.scores[i])
                    .collect()
            })
            .collect()
    }

    /// Variance of each returned component's scores
    #[cfg(test)]
    #[allow(clippy::cast_precision_loss)]
    pub fn score_variances(&self) -> Vec<f64> {
        let denom = (self.observation_ids.len().max(2) - 1) as f64;
        self.score_matrix()
            .axis_iter(ndarray::Axis(1))
            .map(|col| col.iter().map(|v| v * v).sum::<f64>() / denom)
            .collect()
    }
}
