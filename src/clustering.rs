//! # Clustering
//!
//! A [`Clustering`] is the output of the external cluster-editing solver:
//! groups of read ids hypothesized to originate from the same haplotype in a
//! local region. Clusters are nonempty and pairwise disjoint; their union
//! need not cover every read. The threading core consumes the clustering as
//! given and never alters cluster membership.
use anyhow::{bail, Result};

use crate::readset::ReadSet;

#[derive(Debug, Clone, Default)]
pub struct Clustering {
    clusters: Vec<Vec<usize>>,
}

impl Clustering {
    pub fn new(clusters: Vec<Vec<usize>>) -> Self {
        Clustering { clusters }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn cluster(&self, cluster_id: usize) -> &[usize] {
        &self.clusters[cluster_id]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vec<usize>> {
        self.clusters.iter()
    }

    /// Reject clusterings that violate the input contract: empty clusters,
    /// read ids outside the readset, and ids appearing in more than one
    /// cluster are fatal.
    pub fn validate(&self, readset: &ReadSet) -> Result<()> {
        let mut seen = vec![false; readset.len()];
        for (cluster_id, cluster) in self.clusters.iter().enumerate() {
            if cluster.is_empty() {
                bail!("Cluster {cluster_id} is empty");
            }
            for &read_id in cluster {
                if read_id >= readset.len() {
                    bail!(
                        "Cluster {cluster_id} references unknown read id {read_id}"
                    );
                }
                if seen[read_id] {
                    bail!("Read id {read_id} appears in more than one cluster");
                }
                seen[read_id] = true;
            }
        }
        Ok(())
    }

    /// Project the clustering onto a block readset. `origin[local_id]` is the
    /// id of the input read that the block-local read was sliced from.
    /// Cluster order is preserved; clusters that lose all their reads are
    /// dropped.
    pub fn project(&self, origin: &[usize]) -> Clustering {
        let max_read = origin.iter().copied().max().map_or(0, |m| m + 1);
        let mut cluster_of = vec![usize::MAX; max_read];
        for (cluster_id, cluster) in self.clusters.iter().enumerate() {
            for &read_id in cluster {
                if read_id < max_read {
                    cluster_of[read_id] = cluster_id;
                }
            }
        }

        let mut projected: Vec<Vec<usize>> = vec![Vec::new(); self.clusters.len()];
        for (local_id, &read_id) in origin.iter().enumerate() {
            let cluster_id = cluster_of[read_id];
            if cluster_id != usize::MAX {
                projected[cluster_id].push(local_id);
            }
        }
        projected.retain(|cluster| !cluster.is_empty());

        Clustering::new(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readset::Read;

    fn readset_of(n: usize) -> ReadSet {
        let mut readset = ReadSet::new();
        for i in 0..n {
            let mut read = Read::new(format!("r{i}"), i);
            read.add_variant(10 * (i as u32 + 1), 0, 30);
            readset.push(read);
        }
        readset
    }

    #[test]
    fn valid_clustering_passes() {
        let clustering = Clustering::new(vec![vec![0, 2], vec![1]]);
        assert!(clustering.validate(&readset_of(3)).is_ok());
    }

    #[test]
    fn overlapping_clusters_are_fatal() {
        let clustering = Clustering::new(vec![vec![0, 1], vec![1, 2]]);
        assert!(clustering.validate(&readset_of(3)).is_err());
    }

    #[test]
    fn unknown_read_id_is_fatal() {
        let clustering = Clustering::new(vec![vec![0, 5]]);
        assert!(clustering.validate(&readset_of(3)).is_err());
    }

    #[test]
    fn projection_remaps_and_drops_empty() {
        let clustering = Clustering::new(vec![vec![0, 3], vec![1], vec![2]]);
        // block contains slices of input reads 3, 1, 0; read 2 is absent
        let projected = clustering.project(&[3, 1, 0]);
        assert_eq!(projected.len(), 2);
        assert_eq!(projected.cluster(0), &[0, 2]);
        assert_eq!(projected.cluster(1), &[1]);
    }
}
