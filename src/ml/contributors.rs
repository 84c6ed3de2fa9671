//! Ranking of features by absolute loading per component

use crate::structs::{
    ComponentContributors, ContributorRanking, PcaError, PrincipalComponent,
    PrincipalComponentSet, RankedFeature, Result,
};
use log::debug;
use std::cmp::Ordering;

/// Default number of contributors reported per component
pub const DEFAULT_TOP_K: usize = 5;

/// Rank the `k` strongest (and optionally weakest) contributors of every component.
///
/// Ties keep original feature order. When `k` exceeds the number of features
/// every feature is listed.
///
/// # Errors
/// `InvalidConfig` if `k` is zero
pub fn rank_contributors(
    pcs: &PrincipalComponentSet,
    k: usize,
    include_bottom: bool,
) -> Result<ContributorRanking> {
    if k == 0 {
        return Err(PcaError::InvalidConfig(
            "Contributor count must be at least 1".into(),
        ));
    }
    let n_features = pcs.variable_ids.len();
    if k > n_features {
        debug!("Contributor count {k} exceeds {n_features} features; listing all");
    }

    let rank = |descending: bool| -> Vec<ComponentContributors> {
        pcs.components
            .iter()
            .map(|c| ComponentContributors {
                component: c.label.clone(),
                features: ranked(c, &pcs.variable_ids, k, descending),
            })
            .collect()
    };

    Ok(ContributorRanking {
        k,
        top: rank(true),
        bottom: include_bottom.then(|| rank(false)),
    })
}

fn ranked(
    component: &PrincipalComponent,
    feature_ids: &[String],
    k: usize,
    descending: bool,
) -> Vec<RankedFeature> {
    let mut order: Vec<usize> = (0..component.loadings.len()).collect();
    order.sort_by(|&a, &b| {
        let (x, y) = (component.loadings[a].abs(), component.loadings[b].abs());
        let cmp = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        if descending {
            cmp.reverse()
        } else {
            cmp
        }
    });

    order
        .into_iter()
        .take(k)
        .map(|i| RankedFeature {
            feature_id: feature_ids[i].clone(),
            position: i,
            loading: component.loadings[i],
        })
        .collect()
}
