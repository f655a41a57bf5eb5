//! # Coverage tensors and the positional cluster map
//!
//! For one (pre-block scoped) readset and its projected clustering this
//! module computes which clusters cover which variant position, the absolute
//! and relative per-position coverage of every cluster, and every cluster's
//! position span. The per-position cluster sets are reduced to the largest
//! clusters so that tuple enumeration downstream stays bounded.
use ndarray::prelude::*;

use crate::clustering::Clustering;
use crate::readset::{PositionIndex, ReadSet};

#[derive(Debug)]
pub struct CoverageMap {
    /// Per position rank: sorted ids of the clusters retained for threading.
    covering: Vec<Vec<usize>>,
    /// Absolute read counts, positions x clusters.
    cov_abs: Array2<u32>,
    /// Fraction of the total read coverage at a position, clusters x positions.
    cov_rel: Array2<f64>,
    /// Per cluster: min and max position rank touched by its reads.
    spans: Vec<(usize, usize)>,
}

impl CoverageMap {
    /// Walk every cluster's reads once and accumulate the coverage tensors.
    /// At each position only the `max_clusters_per_position` largest clusters
    /// (by read count, ties to the smaller id) are retained in the covering
    /// set; the coverage tensors themselves stay complete.
    pub fn build(
        readset: &ReadSet,
        clustering: &Clustering,
        index: &PositionIndex,
        max_clusters_per_position: usize,
    ) -> Self {
        let num_vars = index.len();
        let num_clusters = clustering.len();

        let mut cov_abs = Array2::<u32>::zeros((num_vars, num_clusters));
        let mut spans = vec![(usize::MAX, 0usize); num_clusters];

        for (cluster_id, cluster) in clustering.iter().enumerate() {
            for &read_id in cluster {
                for var in readset.get(read_id).variants() {
                    let rank = index
                        .rank(var.position)
                        .expect("read position missing from position index");
                    cov_abs[[rank, cluster_id]] += 1;
                    let span = &mut spans[cluster_id];
                    span.0 = span.0.min(rank);
                    span.1 = span.1.max(rank);
                }
            }
        }

        let mut cov_rel = Array2::<f64>::zeros((num_clusters, num_vars));
        let mut covering: Vec<Vec<usize>> = vec![Vec::new(); num_vars];
        for rank in 0..num_vars {
            let total: u32 = cov_abs.row(rank).sum();
            if total == 0 {
                continue;
            }
            for cluster_id in 0..num_clusters {
                let count = cov_abs[[rank, cluster_id]];
                if count > 0 {
                    covering[rank].push(cluster_id);
                    cov_rel[[cluster_id, rank]] = f64::from(count) / f64::from(total);
                }
            }
            reduce_covering(&mut covering[rank], clustering, max_clusters_per_position);
        }

        CoverageMap {
            covering,
            cov_abs,
            cov_rel,
            spans,
        }
    }

    pub fn num_vars(&self) -> usize {
        self.cov_abs.nrows()
    }

    pub fn num_clusters(&self) -> usize {
        self.cov_abs.ncols()
    }

    /// Clusters retained for threading at `rank`, ascending by id.
    pub fn covering(&self, rank: usize) -> &[usize] {
        &self.covering[rank]
    }

    pub fn is_covering(&self, rank: usize, cluster_id: usize) -> bool {
        self.covering[rank].binary_search(&cluster_id).is_ok()
    }

    pub fn absolute(&self, rank: usize, cluster_id: usize) -> u32 {
        self.cov_abs[[rank, cluster_id]]
    }

    pub fn relative(&self, cluster_id: usize, rank: usize) -> f64 {
        self.cov_rel[[cluster_id, rank]]
    }

    /// Min and max position rank touched by reads of `cluster_id`. None for
    /// clusters without any variant observation.
    pub fn span(&self, cluster_id: usize) -> Option<(usize, usize)> {
        let span = self.spans[cluster_id];
        if span.0 == usize::MAX {
            None
        } else {
            Some(span)
        }
    }
}

/// Keep the `max_clusters` largest clusters in `covering`, ties broken by the
/// smaller cluster id. `covering` stays sorted by id afterwards.
fn reduce_covering(covering: &mut Vec<usize>, clustering: &Clustering, max_clusters: usize) {
    if covering.len() <= max_clusters {
        return;
    }
    let mut by_size = covering.clone();
    by_size.sort_by_key(|&cluster_id| {
        (std::cmp::Reverse(clustering.cluster(cluster_id).len()), cluster_id)
    });
    by_size.truncate(max_clusters);
    by_size.sort_unstable();
    *covering = by_size;
}
