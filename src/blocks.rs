//! # Linkage-based pre-blocks
//!
//! Before threading, the variant range is partitioned into pre-blocks at
//! positions where too few reads connect consecutive variants for phasing to
//! carry any signal across. Reads are then sliced at the pre-block borders so
//! that every block can be solved independently; the slice keeps a reference
//! to the read it came from.
use log::info;

use crate::readset::{PositionIndex, Read, ReadSet};

/// A pre-block scoped readset. `origin[local_id]` is the id of the input
/// read the local read was sliced from.
#[derive(Debug)]
pub struct BlockReadSet {
    pub readset: ReadSet,
    pub origin: Vec<usize>,
    /// Rank (in the sample-wide position index) of the block's first variant.
    pub start_rank: usize,
}

/// Ranks at which a new pre-block starts. The first position always starts a
/// block; a boundary is inserted wherever fewer than `min_link` reads span
/// from the previous variant to the current one.
pub fn linkage_block_starts(
    readset: &ReadSet,
    index: &PositionIndex,
    min_link: usize,
) -> Vec<usize> {
    let num_vars = index.len();
    if num_vars == 0 {
        return Vec::new();
    }

    // linking[rank] = reads whose span covers both rank - 1 and rank
    let mut linking = vec![0usize; num_vars];
    for read in readset.iter() {
        let (Some(first), Some(last)) = (read.first_position(), read.last_position()) else {
            continue;
        };
        let first_rank = index.rank(first).expect("read position missing from index");
        let last_rank = index.rank(last).expect("read position missing from index");
        for rank in first_rank + 1..=last_rank {
            linking[rank] += 1;
        }
    }

    let mut starts = vec![0];
    for (rank, &links) in linking.iter().enumerate().skip(1) {
        if links < min_link {
            starts.push(rank);
        }
    }
    starts
}

/// Slice the readset at the pre-block borders. Reads lying entirely within
/// one block are copied; reads crossing a border are split into one slice per
/// covered block, with the block id prefixed to the slice name.
pub fn split_readset(
    readset: &ReadSet,
    index: &PositionIndex,
    block_starts: &[usize],
) -> Vec<BlockReadSet> {
    let num_vars = index.len();
    let mut block_of = vec![0usize; num_vars];
    let mut ext_starts = block_starts.to_vec();
    ext_starts.push(num_vars);
    for block_id in 0..block_starts.len() {
        for rank in ext_starts[block_id]..ext_starts[block_id + 1] {
            block_of[rank] = block_id;
        }
    }

    let mut blocks: Vec<BlockReadSet> = block_starts
        .iter()
        .map(|&start_rank| BlockReadSet {
            readset: ReadSet::new(),
            origin: Vec::new(),
            start_rank,
        })
        .collect();

    for (read_id, read) in readset.iter().enumerate() {
        let rank_of = |position: u32| {
            index
                .rank(position)
                .expect("read position missing from index")
        };
        // reads are validated non-empty before splitting
        let first_block = block_of[rank_of(read.first_position().unwrap())];
        let last_block = block_of[rank_of(read.last_position().unwrap())];

        if first_block == last_block {
            blocks[first_block].readset.push(read.clone());
            blocks[first_block].origin.push(read_id);
            continue;
        }

        // split the read into one slice per covered block
        let mut current_block = first_block;
        let mut slice = Read::new(
            format!("{current_block}_{}", read.name),
            read.source_id,
        );
        for var in read.variants() {
            let block_id = block_of[rank_of(var.position)];
            if block_id != current_block {
                if !slice.is_empty() {
                    blocks[current_block].readset.push(slice);
                    blocks[current_block].origin.push(read_id);
                }
                current_block = block_id;
                slice = Read::new(
                    format!("{current_block}_{}", read.name),
                    read.source_id,
                );
            }
            slice.add_variant(var.position, var.allele, var.quality);
        }
        if !slice.is_empty() {
            blocks[current_block].readset.push(slice);
            blocks[current_block].origin.push(read_id);
        }
    }

    info!(
        "Split {} heterozygous variants into {} pre-blocks",
        num_vars,
        blocks.len()
    );
    blocks
}
