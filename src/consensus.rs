//! # Local cluster consensus
//!
//! For every variant position and every covering cluster this module computes
//! the majority allele among the cluster's reads at that position, together
//! with the majority fraction. The consensus is local: it is only defined
//! where the cluster actually has reads. The majority fraction feeds the
//! inconsistency check used by the external cluster refinement collaborator.
use log::debug;
use statrs::distribution::{Binomial, DiscreteCDF};
use std::collections::HashMap;

use crate::clustering::Clustering;
use crate::coverage::CoverageMap;
use crate::readset::{Allele, PositionIndex, ReadSet};

/// Expected sequencing error rate for the inconsistency binomial test.
const INCONSISTENCY_ERROR_RATE: f64 = 0.05;
/// p-value below which a cluster position counts as inconsistent.
const INCONSISTENCY_P_THRESHOLD: f64 = 0.02;

#[derive(Debug, Clone, Copy)]
struct ConsensusEntry {
    cluster_id: usize,
    allele: Allele,
    fraction: f64,
}

#[derive(Debug)]
pub struct LocalConsensus {
    /// Per position rank: entries for the covering clusters, ascending by id.
    entries: Vec<Vec<ConsensusEntry>>,
}

impl LocalConsensus {
    /// Compute the majority allele for every `(position, covering cluster)`
    /// pair. Count ties break to `tie_allele` when it is among the tied
    /// alleles, to the smallest tied allele otherwise.
    pub fn build(
        readset: &ReadSet,
        clustering: &Clustering,
        coverage: &CoverageMap,
        index: &PositionIndex,
        tie_allele: Allele,
    ) -> Self {
        let num_vars = index.len();
        // allele counters per (position, retained cluster)
        let mut counters: Vec<HashMap<usize, HashMap<Allele, u32>>> =
            vec![HashMap::new(); num_vars];
        for (cluster_id, cluster) in clustering.iter().enumerate() {
            for &read_id in cluster {
                for var in readset.get(read_id).variants() {
                    let rank = index
                        .rank(var.position)
                        .expect("read position missing from position index");
                    if !coverage.is_covering(rank, cluster_id) {
                        continue;
                    }
                    *counters[rank]
                        .entry(cluster_id)
                        .or_default()
                        .entry(var.allele)
                        .or_insert(0) += 1;
                }
            }
        }

        let entries = counters
            .iter()
            .enumerate()
            .map(|(rank, by_cluster)| {
                let mut row: Vec<ConsensusEntry> = coverage
                    .covering(rank)
                    .iter()
                    .filter_map(|&cluster_id| {
                        let counts = by_cluster.get(&cluster_id)?;
                        let (allele, fraction) = majority(counts, tie_allele);
                        Some(ConsensusEntry {
                            cluster_id,
                            allele,
                            fraction,
                        })
                    })
                    .collect();
                row.sort_by_key(|entry| entry.cluster_id);
                row
            })
            .collect();

        LocalConsensus { entries }
    }

    fn entry(&self, rank: usize, cluster_id: usize) -> Option<&ConsensusEntry> {
        let row = &self.entries[rank];
        row.binary_search_by_key(&cluster_id, |entry| entry.cluster_id)
            .ok()
            .map(|i| &row[i])
    }

    /// Majority allele of `cluster_id` at `rank`, None where the cluster
    /// does not cover the position.
    pub fn allele(&self, rank: usize, cluster_id: usize) -> Option<Allele> {
        self.entry(rank, cluster_id).map(|entry| entry.allele)
    }

    /// Fraction of the cluster's reads at `rank` that carry the majority
    /// allele.
    pub fn fraction(&self, rank: usize, cluster_id: usize) -> Option<f64> {
        self.entry(rank, cluster_id).map(|entry| entry.fraction)
    }

    pub fn num_vars(&self) -> usize {
        self.entries.len()
    }
}

/// Majority allele and its fraction from an allele counter.
fn majority(counts: &HashMap<Allele, u32>, tie_allele: Allele) -> (Allele, f64) {
    let total: u32 = counts.values().sum();
    let max_count = counts.values().copied().max().unwrap_or(0);
    let mut tied: Vec<Allele> = counts
        .iter()
        .filter_map(|(&allele, &count)| (count == max_count).then_some(allele))
        .collect();
    tied.sort_unstable();
    let allele = if tied.contains(&tie_allele) {
        tie_allele
    } else {
        tied[0]
    };
    (allele, f64::from(max_count) / f64::from(total))
}

/// Thread the chosen cluster path through the consensus: haplotype `h` gets
/// `cons[p][path[p][h]]` where defined and the undefined marker otherwise.
pub fn materialize_haplotypes(
    path: &[Option<Vec<usize>>],
    ploidy: usize,
    consensus: &LocalConsensus,
) -> Vec<Vec<Option<Allele>>> {
    (0..ploidy)
        .map(|hap| {
            path.iter()
                .enumerate()
                .map(|(rank, tuple)| {
                    tuple
                        .as_ref()
                        .and_then(|tuple| consensus.allele(rank, tuple[hap]))
                })
                .collect()
        })
        .collect()
}

/// Cluster positions whose reads deviate from the majority allele more than
/// sequencing error explains, plus the read pairs that would have to be
/// separated to resolve them. Consumed by the external cluster refinement
/// collaborator; a one-sided binomial test per cluster position.
pub fn find_inconsistencies(
    readset: &ReadSet,
    clustering: &Clustering,
    coverage: &CoverageMap,
    consensus: &LocalConsensus,
    index: &PositionIndex,
) -> (usize, Vec<(usize, usize)>) {
    let mut inconsistent_positions = 0;
    let mut separated_pairs = Vec::new();

    for rank in 0..index.len() {
        for &cluster_id in coverage.covering(rank) {
            let Some(fraction) = consensus.fraction(rank, cluster_id) else {
                continue;
            };
            let total = u64::from(coverage.absolute(rank, cluster_id));
            let deviations = (total as f64 * (1.0 - fraction)) as u64;
            if !deviation_is_significant(deviations, total) {
                continue;
            }
            inconsistent_positions += 1;
            debug!(
                "Inconsistent consensus in cluster {cluster_id} at variant {} ({deviations}/{total} deviating reads)",
                index.position(rank)
            );

            let mut zero_reads = Vec::new();
            let mut one_reads = Vec::new();
            for &read_id in clustering.cluster(cluster_id) {
                for var in readset.get(read_id).variants() {
                    if index.rank(var.position) == Some(rank) {
                        if var.allele == 0 {
                            zero_reads.push(read_id);
                        } else {
                            one_reads.push(read_id);
                        }
                    }
                }
            }
            for &r0 in &zero_reads {
                for &r1 in &one_reads {
                    separated_pairs.push((r0, r1));
                }
            }
        }
    }

    (inconsistent_positions, separated_pairs)
}

/// One-sided binomial test: is observing `deviations` out of `trials` reads
/// unlikely under the expected error rate?
fn deviation_is_significant(deviations: u64, trials: u64) -> bool {
    if deviations == 0 || trials == 0 {
        return false;
    }
    let Ok(binomial) = Binomial::new(INCONSISTENCY_ERROR_RATE, trials) else {
        return false;
    };
    let p_value = 1.0 - binomial.cdf(deviations - 1);
    p_value < INCONSISTENCY_P_THRESHOLD
}
