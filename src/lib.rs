//! # haplothreader
//!
//! This library is the threading core of a polyploid variant phasing
//! pipeline. Upstream collaborators slice sequencing reads to heterozygous
//! variant positions, cluster them by haplotype origin with a cluster-editing
//! solver, and derive per-position genotype constraints; `haplothreader`
//! takes those three inputs and threads `ploidy` haplotypes through the read
//! clusters. The result is one ordered cluster sequence per haplotype, the
//! cut positions that partition the variant range into phase blocks, and the
//! consensus allele sequence of every haplotype. Reading alignments or VCFs
//! and writing phased output stay with the collaborators.
pub mod blocks;
pub mod cli;
pub mod clustering;
pub mod consensus;
pub mod coverage;
pub mod genotype;
pub mod io;
pub mod readset;
pub mod threading;
pub mod utils;

use anyhow::{bail, Result};
use log::{debug, info};
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;

use crate::blocks::BlockReadSet;
use crate::clustering::Clustering;
use crate::genotype::{validate_genotypes, Genotype};
use crate::readset::{Allele, PositionIndex, ReadSet};
use crate::threading::{solve_block, BlockPhasing, CutMode};

/// Tunables of the threading core. `new` gives the defaults the original
/// pipeline runs with; everything else is a knob for experiments.
#[derive(Debug, Clone)]
pub struct PhaseConfig {
    /// Number of haplotypes to thread. At least 2.
    pub ploidy: usize,
    /// Suppress all cut positions and report one single phase block.
    pub single_block: bool,
    /// Use the compact DP engine. Same results, less bookkeeping.
    pub fast_engine: bool,
    /// Scale switch penalties by cluster dissimilarity instead of charging a
    /// constant per changed slot.
    pub dynamic_switch_cost: bool,
    /// Minimum number of reads that must span two consecutive variants to
    /// keep them in one pre-block. Defaults to the ploidy.
    pub min_link: usize,
    /// Penalty per changed haplotype slot between consecutive positions.
    pub switch_cost: f64,
    /// Per position, only this many clusters (the largest ones) take part in
    /// tuple enumeration.
    pub max_clusters_per_position: usize,
    /// Largest genotype deviation the soft fallback may absorb before a
    /// column counts as infeasible.
    pub soft_max_deviation: usize,
    /// Allele that wins consensus ties.
    pub consensus_tie: Allele,
    /// Whether cuts react to multiset changes or to any ordered slot change.
    pub cut_mode: CutMode,
}

impl PhaseConfig {
    pub fn new(ploidy: usize) -> Self {
        PhaseConfig {
            ploidy,
            single_block: false,
            fast_engine: false,
            dynamic_switch_cost: false,
            min_link: ploidy,
            switch_cost: 1.0,
            max_clusters_per_position: 8,
            soft_max_deviation: 1,
            consensus_tie: 0,
            cut_mode: CutMode::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.ploidy < 2 {
            bail!("Ploidy must be at least 2, got {}", self.ploidy);
        }
        if self.max_clusters_per_position == 0 {
            bail!("At least one cluster per position must be retained");
        }
        Ok(())
    }
}

/// Aggregated phasing result for one sample. Cluster ids in `path` and
/// `clustering` live in the global cluster space: the concatenation of the
/// per-block projected clusterings, in block order. A `None` slot marks a
/// position the threading could not assign (infeasible column, or not
/// reached before cancellation).
#[derive(Debug)]
pub struct Phasing {
    /// Global variant ranks after which the phase connection is severed,
    /// strictly increasing.
    pub cut_positions: Vec<usize>,
    /// One ordered ploidy-tuple of global cluster ids per variant position.
    pub path: Vec<Vec<Option<usize>>>,
    /// One allele sequence per haplotype, None marking undefined sites.
    pub haplotypes: Vec<Vec<Option<Allele>>>,
    /// The projected clustering backing the global cluster space. Read ids
    /// refer to the split readset, offset block by block.
    pub clustering: Vec<Vec<usize>>,
    /// True when cooperative cancellation truncated the result.
    pub aborted: bool,
}

impl Phasing {
    /// Map every variant rank to the rank its phase block starts at.
    /// Collaborator surface for the downstream writer's block tags.
    pub fn block_components(&self) -> Vec<usize> {
        let num_vars = self.haplotypes.first().map_or(0, Vec::len);
        let mut components = Vec::with_capacity(num_vars);
        let mut block_start = 0;
        let mut next_cut = self.cut_positions.iter().peekable();
        for rank in 0..num_vars {
            components.push(block_start);
            if next_cut.peek() == Some(&&rank) {
                next_cut.next();
                block_start = rank + 1;
            }
        }
        components
    }
}

/// Phase one sample: validate the inputs, partition the variant range into
/// pre-blocks by read linkage, solve every pre-block independently (in
/// parallel), and stitch the per-block results back together in input order.
pub fn phase(
    readset: &ReadSet,
    clustering: &Clustering,
    genotypes: &[Genotype],
    config: &PhaseConfig,
    cancel: Option<&AtomicBool>,
) -> Result<Phasing> {
    config.validate()?;
    readset.validate()?;
    clustering.validate(readset)?;
    let index = PositionIndex::from_readset(readset)?;
    validate_genotypes(genotypes, index.len(), config.ploidy)?;

    if index.is_empty() {
        return Ok(Phasing {
            cut_positions: Vec::new(),
            path: Vec::new(),
            haplotypes: vec![Vec::new(); config.ploidy],
            clustering: Vec::new(),
            aborted: false,
        });
    }

    let block_starts = if config.single_block {
        vec![0]
    } else {
        blocks::linkage_block_starts(readset, &index, config.min_link)
    };
    let block_readsets = blocks::split_readset(readset, &index, &block_starts);
    info!(
        "Phasing {} variants in {} pre-blocks (ploidy {})",
        index.len(),
        block_readsets.len(),
        config.ploidy
    );

    let mut ext_starts = block_starts.clone();
    ext_starts.push(index.len());

    // every worker owns its block tensors, results come back in input order
    let solved: Vec<(Clustering, BlockPhasing)> = block_readsets
        .par_iter()
        .enumerate()
        .map(|(block_id, block)| {
            let projected = clustering.project(&block.origin);
            let genotype_slice = &genotypes[ext_starts[block_id]..ext_starts[block_id + 1]];
            let skipped = cancel.map_or(false, |flag| {
                flag.load(std::sync::atomic::Ordering::Relaxed)
            });
            if skipped {
                return (
                    projected,
                    BlockPhasing {
                        path: vec![None; genotype_slice.len()],
                        cut_positions: Vec::new(),
                        haplotypes: vec![vec![None; genotype_slice.len()]; config.ploidy],
                        soft_ranks: Vec::new(),
                        aborted: true,
                    },
                );
            }
            let phasing = solve_block(&block.readset, &projected, genotype_slice, config, cancel);
            (projected, phasing)
        })
        .collect();

    Ok(stitch(solved, &block_starts, &block_readsets, config))
}

/// Concatenate the per-block results: offset cluster ids by a running base,
/// re-base block-local cut positions, and sever the phase link at every
/// pre-block border.
fn stitch(
    solved: Vec<(Clustering, BlockPhasing)>,
    block_starts: &[usize],
    block_readsets: &[BlockReadSet],
    config: &PhaseConfig,
) -> Phasing {
    let mut cut_positions = Vec::new();
    let mut path = Vec::new();
    let mut haplotypes: Vec<Vec<Option<Allele>>> = vec![Vec::new(); config.ploidy];
    let mut global_clusters: Vec<Vec<usize>> = Vec::new();
    let mut aborted = false;

    let mut cluster_base = 0;
    let mut read_base = 0;
    for (block_id, (projected, block)) in solved.into_iter().enumerate() {
        let block_start = block_starts[block_id];
        aborted |= block.aborted;

        if !config.single_block && block_start > 0 {
            // pre-block borders always end a phase block
            let border_cut = block_start - 1;
            if cut_positions.last() != Some(&border_cut) {
                cut_positions.push(border_cut);
            }
        }
        for &cut in &block.cut_positions {
            cut_positions.push(block_start + cut);
        }
        if !block.soft_ranks.is_empty() {
            debug!(
                "Block {block_id}: genotype constraint softly satisfied at {} positions",
                block.soft_ranks.len()
            );
        }

        for tuple in block.path {
            path.push(match tuple {
                Some(tuple) => tuple
                    .into_iter()
                    .map(|cluster_id| Some(cluster_id + cluster_base))
                    .collect(),
                None => vec![None; config.ploidy],
            });
        }
        for (hap, alleles) in block.haplotypes.into_iter().enumerate() {
            haplotypes[hap].extend(alleles);
        }
        for cluster in projected.iter() {
            global_clusters.push(cluster.iter().map(|&read_id| read_id + read_base).collect());
        }

        cluster_base = global_clusters.len();
        read_base += block_readsets[block_id].readset.len();
    }

    cut_positions.sort_unstable();
    cut_positions.dedup();

    Phasing {
        cut_positions,
        path,
        haplotypes,
        clustering: global_clusters,
        aborted,
    }
}
