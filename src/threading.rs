//! # Threading haplotypes through read clusters
//!
//! The core dynamic program. For every variant position of a pre-block it
//! enumerates the ploidy-sized cluster multisets whose consensus alleles add
//! up to the required genotype, expands them into ordered tuples (one cluster
//! per haplotype slot), and selects one tuple per position minimizing
//! coverage mismatch plus cluster-switch penalties between consecutive
//! positions. Backtracing the chosen path yields the cut positions that
//! partition the block into phase blocks.
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::clustering::Clustering;
use crate::consensus::{materialize_haplotypes, LocalConsensus};
use crate::coverage::CoverageMap;
use crate::genotype::Genotype;
use crate::readset::{Allele, PositionIndex, ReadSet};
use crate::utils::{distinct_permutations, multiset_combinations};
use crate::PhaseConfig;

/// What constitutes a phase break between two consecutive tuples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutMode {
    /// Cut when the cluster multisets differ in at least one element.
    #[default]
    Multiset,
    /// Cut when any ordered haplotype slot changes its cluster.
    Ordered,
}

/// Genotype-conforming cluster multisets per position, plus the bookkeeping
/// of where the enumeration had to deviate from the hard constraint.
#[derive(Debug)]
pub struct TupleTable {
    /// Per position rank: multisets (ids ascending), in lexicographic order.
    multisets: Vec<Vec<Vec<usize>>>,
    /// Ranks where only the soft fallback produced candidates.
    pub soft_ranks: Vec<usize>,
    /// Ranks with no candidates at all; the DP is split around these.
    pub infeasible_ranks: Vec<usize>,
}

impl TupleTable {
    pub fn multisets(&self, rank: usize) -> &[Vec<usize>] {
        &self.multisets[rank]
    }
}

/// Enumerate, for every position, the ploidy-multisets over the covering
/// clusters whose summed consensus equals the genotype dose. Where no
/// multiset matches exactly, the fallback keeps the multisets with minimal
/// deviation, as long as that deviation stays within `soft_max_deviation`.
pub fn enumerate_tuples(
    coverage: &CoverageMap,
    consensus: &LocalConsensus,
    genotypes: &[Genotype],
    config: &PhaseConfig,
) -> TupleTable {
    let num_vars = coverage.num_vars();
    let mut multisets = Vec::with_capacity(num_vars);
    let mut soft_ranks = Vec::new();
    let mut infeasible_ranks = Vec::new();

    for rank in 0..num_vars {
        let candidates = multiset_combinations(coverage.covering(rank), config.ploidy);
        if candidates.is_empty() {
            infeasible_ranks.push(rank);
            multisets.push(Vec::new());
            continue;
        }

        let dose = genotypes[rank].dose() as i64;
        let deviation = |multiset: &Vec<usize>| {
            let sum: i64 = multiset
                .iter()
                .map(|&cluster_id| {
                    consensus
                        .allele(rank, cluster_id)
                        .expect("covering cluster without consensus")
                        as i64
                })
                .sum();
            (sum - dose).abs()
        };

        let hard: Vec<Vec<usize>> = candidates
            .iter()
            .filter(|multiset| deviation(multiset) == 0)
            .cloned()
            .collect();
        if !hard.is_empty() {
            multisets.push(hard);
            continue;
        }

        // soft fallback: keep the least-deviating multisets. We can unwrap
        // here because candidates is non-empty, checked above
        let min_deviation = candidates.iter().map(&deviation).min().unwrap();
        if min_deviation > config.soft_max_deviation as i64 {
            infeasible_ranks.push(rank);
            multisets.push(Vec::new());
            continue;
        }
        soft_ranks.push(rank);
        multisets.push(
            candidates
                .into_iter()
                .filter(|multiset| deviation(multiset) == min_deviation)
                .collect(),
        );
    }

    TupleTable {
        multisets,
        soft_ranks,
        infeasible_ranks,
    }
}

/// The ordered DP state space of one column: every distinct permutation of
/// every genotype-conforming multiset, multiset order outer, lexicographic
/// permutation order inner.
#[derive(Debug)]
struct ColumnPerms {
    perms: Vec<Vec<usize>>,
}

fn expand_column(multisets: &[Vec<usize>]) -> ColumnPerms {
    let perms = multisets
        .iter()
        .flat_map(|multiset| distinct_permutations(multiset))
        .collect();
    ColumnPerms { perms }
}

/// Cache for the per-variant consensus agreement between cluster pairs,
/// used by the dynamic switch cost.
struct SimilarityCache {
    values: HashMap<(usize, usize), Option<f64>>,
}

impl SimilarityCache {
    fn new() -> Self {
        SimilarityCache {
            values: HashMap::new(),
        }
    }

    /// Fraction of positions in the span intersection at which both clusters
    /// have a defined consensus and agree. None when no such position exists.
    fn similarity(
        &mut self,
        a: usize,
        b: usize,
        coverage: &CoverageMap,
        consensus: &LocalConsensus,
    ) -> Option<f64> {
        let key = (a.min(b), a.max(b));
        *self.values.entry(key).or_insert_with(|| {
            let (a_start, a_end) = coverage.span(key.0)?;
            let (b_start, b_end) = coverage.span(key.1)?;
            let lo = a_start.max(b_start);
            let hi = a_end.min(b_end);
            if lo > hi {
                return None;
            }
            let mut defined = 0u32;
            let mut agreeing = 0u32;
            for rank in lo..=hi {
                if let (Some(left), Some(right)) = (
                    consensus.allele(rank, key.0),
                    consensus.allele(rank, key.1),
                ) {
                    defined += 1;
                    if left == right {
                        agreeing += 1;
                    }
                }
            }
            (defined > 0).then(|| f64::from(agreeing) / f64::from(defined))
        })
    }
}

/// Per-column cost: haplotype slots should hold clusters that carry a large
/// share of the read coverage at this position.
fn column_cost(rank: usize, perm: &[usize], coverage: &CoverageMap) -> f64 {
    perm.iter()
        .map(|&cluster_id| 1.0 - coverage.relative(cluster_id, rank))
        .sum()
}

/// Transition cost between the tuples of consecutive columns: a constant (or
/// similarity-scaled) penalty per changed slot. Slots whose old cluster left
/// the covering set, or whose new cluster only just entered it, switch for
/// free.
#[allow(clippy::too_many_arguments)]
fn transition_cost(
    prev_perm: &[usize],
    perm: &[usize],
    rank: usize,
    coverage: &CoverageMap,
    consensus: &LocalConsensus,
    config: &PhaseConfig,
    similarities: &mut SimilarityCache,
) -> f64 {
    let mut cost = 0.0;
    for (them, us) in prev_perm.iter().zip(perm.iter()) {
        if them == us {
            continue;
        }
        if !coverage.is_covering(rank, *them) || !coverage.is_covering(rank - 1, *us) {
            continue;
        }
        let scale = if config.dynamic_switch_cost {
            match similarities.similarity(*them, *us, coverage, consensus) {
                Some(sim) => 1.0 - sim,
                None => 1.0,
            }
        } else {
            1.0
        };
        cost += config.switch_cost * scale;
    }
    cost
}

/// Forward sweep output: predecessor indices per column, the cost row of the
/// last computed column, and how many columns were computed before
/// completion or cancellation.
struct Sweep {
    prev: Vec<Vec<usize>>,
    last_costs: Vec<f64>,
    columns_done: usize,
}

fn cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.map_or(false, |flag| flag.load(Ordering::Relaxed))
}

/// The straightforward engine: keeps the full score table and recomputes
/// nothing clever. Reference semantics for the compact engine.
#[allow(clippy::too_many_arguments)]
fn sweep_standard(
    columns: &[ColumnPerms],
    base_rank: usize,
    coverage: &CoverageMap,
    consensus: &LocalConsensus,
    config: &PhaseConfig,
    similarities: &mut SimilarityCache,
    cancel: Option<&AtomicBool>,
) -> Sweep {
    let mut scores: Vec<Vec<f64>> = Vec::with_capacity(columns.len());
    let mut prev: Vec<Vec<usize>> = Vec::with_capacity(columns.len());

    let first: Vec<f64> = columns[0]
        .perms
        .iter()
        .map(|perm| column_cost(base_rank, perm, coverage))
        .collect();
    prev.push(vec![usize::MAX; first.len()]);
    scores.push(first);

    for (offset, column) in columns.iter().enumerate().skip(1) {
        if cancelled(cancel) {
            break;
        }
        let rank = base_rank + offset;
        let prev_scores = &scores[offset - 1];
        let mut row = Vec::with_capacity(column.perms.len());
        let mut row_prev = Vec::with_capacity(column.perms.len());
        for perm in &column.perms {
            let mut best = f64::INFINITY;
            let mut best_pred = usize::MAX;
            for (pred, pred_perm) in columns[offset - 1].perms.iter().enumerate() {
                let total = prev_scores[pred]
                    + transition_cost(
                        pred_perm,
                        perm,
                        rank,
                        coverage,
                        consensus,
                        config,
                        similarities,
                    );
                if total < best {
                    best = total;
                    best_pred = pred;
                }
            }
            row.push(best + column_cost(rank, perm, coverage));
            row_prev.push(best_pred);
        }
        scores.push(row);
        prev.push(row_prev);
    }

    let columns_done = scores.len();
    Sweep {
        prev,
        // the first column is computed before any cancellation check
        last_costs: scores.pop().unwrap(),
        columns_done,
    }
}

/// The compact engine. Semantically identical to [`sweep_standard`]
/// (identical costs, predecessors, and tie-breaks) but keeps only one
/// rotated cost row and skips predecessors whose score alone already
/// reaches the running minimum, which transition costs can never improve.
#[allow(clippy::too_many_arguments)]
fn sweep_compact(
    columns: &[ColumnPerms],
    base_rank: usize,
    coverage: &CoverageMap,
    consensus: &LocalConsensus,
    config: &PhaseConfig,
    similarities: &mut SimilarityCache,
    cancel: Option<&AtomicBool>,
) -> Sweep {
    let mut prev: Vec<Vec<usize>> = Vec::with_capacity(columns.len());
    let mut current: Vec<f64> = columns[0]
        .perms
        .iter()
        .map(|perm| column_cost(base_rank, perm, coverage))
        .collect();
    prev.push(vec![usize::MAX; current.len()]);
    let mut columns_done = 1;

    for (offset, column) in columns.iter().enumerate().skip(1) {
        if cancelled(cancel) {
            break;
        }
        let rank = base_rank + offset;
        let mut row = Vec::with_capacity(column.perms.len());
        let mut row_prev = Vec::with_capacity(column.perms.len());
        for perm in &column.perms {
            let mut best = f64::INFINITY;
            let mut best_pred = usize::MAX;
            for (pred, pred_perm) in columns[offset - 1].perms.iter().enumerate() {
                // transition costs are nonnegative, this predecessor is done for
                if current[pred] >= best {
                    continue;
                }
                let total = current[pred]
                    + transition_cost(
                        pred_perm,
                        perm,
                        rank,
                        coverage,
                        consensus,
                        config,
                        similarities,
                    );
                if total < best {
                    best = total;
                    best_pred = pred;
                }
            }
            row.push(best + column_cost(rank, perm, coverage));
            row_prev.push(best_pred);
        }
        current = row;
        prev.push(row_prev);
        columns_done += 1;
    }

    Sweep {
        prev,
        last_costs: current,
        columns_done,
    }
}

/// Walk the predecessor table back from the cheapest endpoint. Ties pick the
/// smaller permutation index.
fn backtrace(sweep: &Sweep, columns: &[ColumnPerms]) -> Vec<Vec<usize>> {
    let mut endpoint = 0;
    for (index, &cost) in sweep.last_costs.iter().enumerate() {
        if cost < sweep.last_costs[endpoint] {
            endpoint = index;
        }
    }

    let mut path = Vec::with_capacity(sweep.columns_done);
    let mut index = endpoint;
    for offset in (0..sweep.columns_done).rev() {
        path.push(columns[offset].perms[index].clone());
        index = sweep.prev[offset][index];
    }
    path.reverse();
    path
}

/// Cut positions derived from the path: a cut at `p` severs the phase link
/// between `p` and `p + 1`. Undefined columns sever their links to both
/// neighbours.
pub fn detect_cuts(path: &[Option<Vec<usize>>], mode: CutMode) -> Vec<usize> {
    let mut cuts = Vec::new();
    for rank in 0..path.len().saturating_sub(1) {
        let cut = match (&path[rank], &path[rank + 1]) {
            (Some(left), Some(right)) => match mode {
                CutMode::Ordered => left != right,
                CutMode::Multiset => {
                    let mut a = left.clone();
                    let mut b = right.clone();
                    a.sort_unstable();
                    b.sort_unstable();
                    a != b
                }
            },
            (Some(_), None) | (None, Some(_)) => true,
            (None, None) => false,
        };
        if cut {
            cuts.push(rank);
        }
    }
    cuts
}

/// Threading result for one pre-block.
#[derive(Debug)]
pub struct BlockPhasing {
    /// Chosen ordered cluster tuple per position; None where the column was
    /// infeasible or the sweep was cancelled before reaching it.
    pub path: Vec<Option<Vec<usize>>>,
    /// Block-local cut positions ("link severed after rank" convention).
    pub cut_positions: Vec<usize>,
    /// One allele sequence per haplotype, None marking undefined sites.
    pub haplotypes: Vec<Vec<Option<Allele>>>,
    /// Ranks where the genotype constraint was only softly satisfied.
    pub soft_ranks: Vec<usize>,
    pub aborted: bool,
}

impl BlockPhasing {
    fn empty(ploidy: usize) -> Self {
        BlockPhasing {
            path: Vec::new(),
            cut_positions: Vec::new(),
            haplotypes: vec![Vec::new(); ploidy],
            soft_ranks: Vec::new(),
            aborted: false,
        }
    }
}

/// Phase one pre-block: build the coverage and consensus tensors, enumerate
/// genotype-conforming tuples, run the DP over every feasible run of columns
/// (infeasible columns split the block and force cuts around themselves),
/// and materialize the haplotype sequences.
pub fn solve_block(
    readset: &ReadSet,
    clustering: &Clustering,
    genotypes: &[Genotype],
    config: &PhaseConfig,
    cancel: Option<&AtomicBool>,
) -> BlockPhasing {
    if readset.is_empty() {
        return BlockPhasing::empty(config.ploidy);
    }
    let index = PositionIndex::from_readset(readset)
        .expect("block readset positions are distinct by construction");
    let num_vars = index.len();
    debug_assert_eq!(genotypes.len(), num_vars);
    if num_vars == 0 {
        return BlockPhasing::empty(config.ploidy);
    }

    let coverage = CoverageMap::build(
        readset,
        clustering,
        &index,
        config.max_clusters_per_position,
    );
    let consensus = LocalConsensus::build(
        readset,
        clustering,
        &coverage,
        &index,
        config.consensus_tie,
    );
    let tuples = enumerate_tuples(&coverage, &consensus, genotypes, config);
    if !tuples.infeasible_ranks.is_empty() {
        debug!(
            "{} infeasible columns force additional phase breaks",
            tuples.infeasible_ranks.len()
        );
    }

    let mut path: Vec<Option<Vec<usize>>> = vec![None; num_vars];
    let mut similarities = SimilarityCache::new();
    let mut aborted = false;

    // solve each contiguous run of feasible columns independently
    let mut lo = 0;
    while lo < num_vars && !aborted {
        if tuples.multisets(lo).is_empty() {
            lo += 1;
            continue;
        }
        let mut hi = lo;
        while hi < num_vars && !tuples.multisets(hi).is_empty() {
            hi += 1;
        }

        let columns: Vec<ColumnPerms> = (lo..hi)
            .map(|rank| expand_column(tuples.multisets(rank)))
            .collect();
        let sweep = if config.fast_engine {
            sweep_compact(
                &columns,
                lo,
                &coverage,
                &consensus,
                config,
                &mut similarities,
                cancel,
            )
        } else {
            sweep_standard(
                &columns,
                lo,
                &coverage,
                &consensus,
                config,
                &mut similarities,
                cancel,
            )
        };
        if sweep.columns_done < columns.len() {
            aborted = true;
        }
        for (offset, tuple) in backtrace(&sweep, &columns).into_iter().enumerate() {
            path[lo + offset] = Some(tuple);
        }
        lo = hi;
    }

    let cut_positions = if config.single_block {
        Vec::new()
    } else {
        detect_cuts(&path, config.cut_mode)
    };
    let haplotypes = materialize_haplotypes(&path, config.ploidy, &consensus);

    BlockPhasing {
        path,
        cut_positions,
        haplotypes,
        soft_ranks: tuples.soft_ranks,
        aborted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readset::Read;

    fn readset_from(rows: &[&[(u32, u8)]]) -> ReadSet {
        let mut readset = ReadSet::new();
        for (i, vars) in rows.iter().enumerate() {
            let mut read = Read::new(format!("r{i}"), i);
            for (pos, allele) in *vars {
                read.add_variant(*pos, *allele, 30);
            }
            readset.push(read);
        }
        readset
    }

    fn tensors(
        readset: &ReadSet,
        clustering: &Clustering,
        config: &PhaseConfig,
    ) -> (PositionIndex, CoverageMap, LocalConsensus) {
        let index = PositionIndex::from_readset(readset).unwrap();
        let coverage = CoverageMap::build(
            readset,
            clustering,
            &index,
            config.max_clusters_per_position,
        );
        let consensus =
            LocalConsensus::build(readset, clustering, &coverage, &index, config.consensus_tie);
        (index, coverage, consensus)
    }

    /// Tetraploid over three positions. Cluster 2 vanishes after the second
    /// position, cluster 3 only appears at the third; every genotype wants
    /// one slot on the allele only those two clusters carry.
    fn tetraploid_fixture() -> (ReadSet, Clustering, Vec<Genotype>) {
        let readset = readset_from(&[
            &[(10, 0), (20, 0), (30, 0)],
            &[(10, 0), (20, 0), (30, 0)],
            &[(10, 0), (20, 0), (30, 0)],
            &[(10, 1), (20, 1), (30, 1)],
            &[(10, 1), (20, 1), (30, 1)],
            &[(10, 2), (20, 2)],
            &[(10, 2), (20, 2)],
            &[(10, 2), (20, 2)],
            &[(30, 2)],
            &[(30, 2)],
            &[(30, 2)],
        ]);
        let clustering = Clustering::new(vec![
            vec![0, 1, 2],
            vec![3, 4],
            vec![5, 6, 7],
            vec![8, 9, 10],
        ]);
        let genotypes = vec![Genotype::from_alleles(&[0, 0, 1, 2]); 3];
        (readset, clustering, genotypes)
    }

    #[test]
    fn tuples_conform_to_the_genotype() {
        let (readset, clustering, genotypes) = tetraploid_fixture();
        let config = PhaseConfig::new(4);
        let (_, coverage, consensus) = tensors(&readset, &clustering, &config);
        let tuples = enumerate_tuples(&coverage, &consensus, &genotypes, &config);

        assert!(tuples.soft_ranks.is_empty());
        assert!(tuples.infeasible_ranks.is_empty());
        for rank in 0..3 {
            assert!(!tuples.multisets(rank).is_empty());
            for multiset in tuples.multisets(rank) {
                let dose: usize = multiset
                    .iter()
                    .map(|&c| consensus.allele(rank, c).unwrap() as usize)
                    .sum();
                assert_eq!(dose, genotypes[rank].dose());
                for &cluster_id in multiset {
                    assert!(coverage.is_covering(rank, cluster_id));
                }
            }
        }
    }

    #[test]
    fn vanished_cluster_forces_one_switch_and_one_cut() {
        let (readset, clustering, genotypes) = tetraploid_fixture();
        let config = PhaseConfig::new(4);
        let phasing = solve_block(&readset, &clustering, &genotypes, &config, None);

        assert_eq!(phasing.cut_positions, vec![1]);
        let before = phasing.path[1].as_ref().unwrap();
        let after = phasing.path[2].as_ref().unwrap();
        let switched = before
            .iter()
            .zip(after.iter())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(switched, 1);
        assert_eq!(phasing.path[0], phasing.path[1]);
    }

    #[test]
    fn chosen_path_is_a_permutation_of_an_enumerated_multiset() {
        let (readset, clustering, genotypes) = tetraploid_fixture();
        let config = PhaseConfig::new(4);
        let (_, coverage, consensus) = tensors(&readset, &clustering, &config);
        let tuples = enumerate_tuples(&coverage, &consensus, &genotypes, &config);
        let phasing = solve_block(&readset, &clustering, &genotypes, &config, None);

        for (rank, tuple) in phasing.path.iter().enumerate() {
            let mut multiset = tuple.as_ref().unwrap().clone();
            multiset.sort_unstable();
            assert!(tuples.multisets(rank).contains(&multiset));
        }
    }

    /// Diploid with a column whose clusters cannot reach the genotype even
    /// softly: both clusters read 0/0 where the genotype wants 1/1.
    fn infeasible_fixture() -> (ReadSet, Clustering, Vec<Genotype>) {
        let readset = readset_from(&[
            &[(10, 0), (20, 0), (30, 0), (40, 0), (50, 0)],
            &[(10, 0), (20, 0), (30, 0), (40, 0), (50, 0)],
            &[(10, 1), (20, 1), (30, 0), (40, 1), (50, 1)],
            &[(10, 1), (20, 1), (30, 0), (40, 1), (50, 1)],
        ]);
        let clustering = Clustering::new(vec![vec![0, 1], vec![2, 3]]);
        let mut genotypes = vec![Genotype::from_alleles(&[0, 1]); 5];
        genotypes[2] = Genotype::from_alleles(&[1, 1]);
        (readset, clustering, genotypes)
    }

    #[test]
    fn infeasible_column_splits_the_block() {
        let (readset, clustering, genotypes) = infeasible_fixture();
        let config = PhaseConfig::new(2);
        let phasing = solve_block(&readset, &clustering, &genotypes, &config, None);

        assert!(phasing.path[2].is_none());
        assert_eq!(phasing.cut_positions, vec![1, 2]);
        for hap in &phasing.haplotypes {
            assert_eq!(hap[2], None);
            assert_eq!(hap.len(), 5);
        }
        // both sides of the split are phased
        assert!(phasing.path[1].is_some());
        assert!(phasing.path[3].is_some());
    }

    #[test]
    fn soft_fallback_is_used_and_recorded() {
        // a single cluster cannot produce the dose of one, deviation 1
        let readset = readset_from(&[&[(10, 0), (20, 0)], &[(10, 0), (20, 0)]]);
        let clustering = Clustering::new(vec![vec![0, 1]]);
        let genotypes = vec![
            Genotype::from_alleles(&[0, 0, 0]),
            Genotype::from_alleles(&[0, 0, 1]),
        ];
        let config = PhaseConfig::new(3);
        let (_, coverage, consensus) = tensors(&readset, &clustering, &config);
        let tuples = enumerate_tuples(&coverage, &consensus, &genotypes, &config);

        assert_eq!(tuples.soft_ranks, vec![1]);
        assert_eq!(tuples.multisets(1), &[vec![0, 0, 0]]);

        let phasing = solve_block(&readset, &clustering, &genotypes, &config, None);
        assert_eq!(phasing.soft_ranks, vec![1]);
        assert_eq!(phasing.path[1], Some(vec![0, 0, 0]));
    }

    /// Three clusters over three positions where leaving the low-coverage
    /// cluster is mandatory at the end; under constant switch costs staying
    /// on it all along is cheapest, under dynamic costs switching away from
    /// the consensus-similar cluster becomes cheaper.
    fn dynamic_cost_fixture() -> (ReadSet, Clustering, Vec<Genotype>) {
        let readset = readset_from(&[
            &[(10, 0), (20, 0), (30, 1)],
            &[(10, 0), (20, 0), (30, 1)],
            &[(10, 0), (20, 0), (30, 1)],
            &[(10, 0), (20, 0), (30, 0)],
            &[(10, 1), (20, 1), (30, 1)],
            &[(10, 1), (20, 1), (30, 1)],
            &[(10, 1), (20, 1), (30, 1)],
        ]);
        let clustering = Clustering::new(vec![vec![0, 1, 2], vec![3], vec![4, 5, 6]]);
        let genotypes = vec![Genotype::from_alleles(&[0, 1]); 3];
        (readset, clustering, genotypes)
    }

    #[test]
    fn dynamic_switch_cost_prefers_similar_clusters() {
        let (readset, clustering, genotypes) = dynamic_cost_fixture();

        let fixed = PhaseConfig::new(2);
        let phasing = solve_block(&readset, &clustering, &genotypes, &fixed, None);
        assert_eq!(phasing.path[0], Some(vec![1, 2]));

        let mut dynamic = PhaseConfig::new(2);
        dynamic.dynamic_switch_cost = true;
        let phasing = solve_block(&readset, &clustering, &genotypes, &dynamic, None);
        assert_eq!(phasing.path[0], Some(vec![0, 2]));
        assert_eq!(phasing.path[2], Some(vec![1, 2]));
    }

    #[test]
    fn similarity_is_consensus_agreement_over_the_span_intersection() {
        let (readset, clustering, genotypes) = dynamic_cost_fixture();
        let config = PhaseConfig::new(2);
        let (_, coverage, consensus) = tensors(&readset, &clustering, &config);
        let _ = genotypes;
        let mut cache = SimilarityCache::new();

        // clusters 0 and 1 agree at two of three positions
        let sim = cache.similarity(0, 1, &coverage, &consensus).unwrap();
        assert!((sim - 2.0 / 3.0).abs() < 1e-9);
        // clusters 1 and 2 never agree
        let sim = cache.similarity(1, 2, &coverage, &consensus).unwrap();
        assert!(sim.abs() < 1e-9);
    }

    #[test]
    fn cut_modes_differ_on_reordered_tuples() {
        let path = vec![
            Some(vec![0, 1]),
            Some(vec![1, 0]),
            Some(vec![1, 0]),
            Some(vec![1, 2]),
        ];
        assert_eq!(detect_cuts(&path, CutMode::Multiset), vec![2]);
        assert_eq!(detect_cuts(&path, CutMode::Ordered), vec![0, 2]);
    }

    #[test]
    fn reduction_keeps_genotype_conforming_tuples() {
        // ten clusters share one position, both alleles survive the top-8 cut
        let mut readset = ReadSet::new();
        let mut clusters = Vec::new();
        let mut read_id = 0;
        for cluster_id in 0..10usize {
            let mut members = Vec::new();
            for _ in 0..(10 - cluster_id) {
                let mut read = Read::new(format!("r{read_id}"), read_id);
                read.add_variant(10, (cluster_id % 2) as u8, 30);
                readset.push(read);
                members.push(read_id);
                read_id += 1;
            }
            clusters.push(members);
        }
        let clustering = Clustering::new(clusters);
        let genotypes = vec![Genotype::from_alleles(&[0, 1])];
        let config = PhaseConfig::new(2);
        let (_, coverage, consensus) = tensors(&readset, &clustering, &config);

        assert_eq!(coverage.covering(0), &[0, 1, 2, 3, 4, 5, 6, 7]);
        let tuples = enumerate_tuples(&coverage, &consensus, &genotypes, &config);
        assert!(!tuples.multisets(0).is_empty());
        assert!(tuples.soft_ranks.is_empty());
    }

    #[test]
    fn dp_is_optimal_on_small_inputs() {
        let (readset, clustering, genotypes) = tetraploid_fixture();
        let config = PhaseConfig::new(4);
        let (_, coverage, consensus) = tensors(&readset, &clustering, &config);
        let tuples = enumerate_tuples(&coverage, &consensus, &genotypes, &config);
        let columns: Vec<ColumnPerms> = (0..3)
            .map(|rank| expand_column(tuples.multisets(rank)))
            .collect();
        let mut similarities = SimilarityCache::new();
        let sweep = sweep_standard(
            &columns,
            0,
            &coverage,
            &consensus,
            &config,
            &mut similarities,
            None,
        );
        let dp_cost = sweep
            .last_costs
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);

        // brute force every permutation sequence
        let mut best = f64::INFINITY;
        let mut stack: Vec<(usize, usize, f64)> = columns[0]
            .perms
            .iter()
            .enumerate()
            .map(|(i, perm)| (0, i, column_cost(0, perm, &coverage)))
            .collect();
        while let Some((col, index, cost)) = stack.pop() {
            if col + 1 == columns.len() {
                best = best.min(cost);
                continue;
            }
            for (next, perm) in columns[col + 1].perms.iter().enumerate() {
                let step = transition_cost(
                    &columns[col].perms[index],
                    perm,
                    col + 1,
                    &coverage,
                    &consensus,
                    &config,
                    &mut similarities,
                ) + column_cost(col + 1, perm, &coverage);
                stack.push((col + 1, next, cost + step));
            }
        }
        assert!((dp_cost - best).abs() < 1e-9);
    }

    #[test]
    fn sweeps_are_equivalent() {
        let (readset, clustering, genotypes) = tetraploid_fixture();
        let config = PhaseConfig::new(4);
        let (_, coverage, consensus) = tensors(&readset, &clustering, &config);
        let tuples = enumerate_tuples(&coverage, &consensus, &genotypes, &config);
        let columns: Vec<ColumnPerms> = (0..3)
            .map(|rank| expand_column(tuples.multisets(rank)))
            .collect();

        let mut sims = SimilarityCache::new();
        let standard = sweep_standard(&columns, 0, &coverage, &consensus, &config, &mut sims, None);
        let mut sims = SimilarityCache::new();
        let compact = sweep_compact(&columns, 0, &coverage, &consensus, &config, &mut sims, None);

        assert_eq!(standard.prev, compact.prev);
        assert_eq!(standard.columns_done, compact.columns_done);
        for (a, b) in standard.last_costs.iter().zip(compact.last_costs.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
