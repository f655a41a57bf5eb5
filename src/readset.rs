//! # Readset
//!
//! Module containing the structs that represent the input to the threading
//! core: allele observations ([`Variant`]), reads sliced to heterozygous
//! variant positions ([`Read`]), and the ordered collection of reads for one
//! sample ([`ReadSet`]). Reads are identified by their index in the set.
//! [`PositionIndex`] maps genome coordinates to dense variant ranks and back.
use anyhow::{bail, Result};
use std::collections::HashMap;

/// Alleles are small nonnegative integers (0 or 1 in biallelic use). The
/// undefined marker is out-of-band: `Option<Allele>` at API boundaries.
pub type Allele = u8;

/// A single allele observation of a read at a heterozygous variant position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub position: u32,
    pub allele: Allele,
    pub quality: u8,
}

/// A sequencing read reduced to its allele observations. `name` and
/// `source_id` identify the read's origin and are only used to relate
/// slices of the same read after block splitting, equality is not required.
#[derive(Debug, Clone)]
pub struct Read {
    pub name: String,
    pub source_id: usize,
    variants: Vec<Variant>,
}

impl Read {
    pub fn new(name: String, source_id: usize) -> Self {
        Read {
            name,
            source_id,
            variants: Vec::new(),
        }
    }

    pub fn add_variant(&mut self, position: u32, allele: Allele, quality: u8) {
        self.variants.push(Variant {
            position,
            allele,
            quality,
        });
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// A read is sorted iff its positions strictly increase.
    pub fn is_sorted(&self) -> bool {
        self.variants
            .windows(2)
            .all(|w| w[0].position < w[1].position)
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn first_position(&self) -> Option<u32> {
        self.variants.first().map(|v| v.position)
    }

    pub fn last_position(&self) -> Option<u32> {
        self.variants.last().map(|v| v.position)
    }
}

/// The ordered collection of reads for one sample. Read ids handed to the
/// clustering are indices into this collection.
#[derive(Debug, Clone, Default)]
pub struct ReadSet {
    reads: Vec<Read>,
}

impl ReadSet {
    pub fn new() -> Self {
        ReadSet { reads: Vec::new() }
    }

    pub fn push(&mut self, read: Read) {
        self.reads.push(read);
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn get(&self, read_id: usize) -> &Read {
        &self.reads[read_id]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Read> {
        self.reads.iter()
    }

    /// All distinct variant positions touched by any read, ascending.
    pub fn positions(&self) -> Vec<u32> {
        let mut positions: Vec<u32> = self
            .reads
            .iter()
            .flat_map(|read| read.variants().iter().map(|var| var.position))
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    /// Reject readsets that violate the input contract: empty reads and
    /// reads whose positions do not strictly increase are fatal.
    pub fn validate(&self) -> Result<()> {
        for (read_id, read) in self.reads.iter().enumerate() {
            if read.is_empty() {
                bail!("Read {read_id} ({}) contains no variants", read.name);
            }
            if !read.is_sorted() {
                bail!(
                    "Read {read_id} ({}) is not sorted by position",
                    read.name
                );
            }
        }
        Ok(())
    }
}

/// Bidirectional map between genome coordinates of the heterozygous variants
/// and their dense ranks `0..N`.
#[derive(Debug, Clone)]
pub struct PositionIndex {
    rank_of: HashMap<u32, usize>,
    position_of: Vec<u32>,
}

impl PositionIndex {
    /// Build the index from a sorted list of positions. Duplicate positions
    /// are a fatal input violation.
    pub fn from_sorted(positions: &[u32]) -> Result<Self> {
        let mut rank_of = HashMap::with_capacity(positions.len());
        for (rank, &position) in positions.iter().enumerate() {
            if rank_of.insert(position, rank).is_some() {
                bail!("Duplicate variant position {position} in input");
            }
            if rank > 0 && positions[rank - 1] > position {
                bail!("Variant positions are not sorted at {position}");
            }
        }
        Ok(PositionIndex {
            rank_of,
            position_of: positions.to_vec(),
        })
    }

    pub fn from_readset(readset: &ReadSet) -> Result<Self> {
        Self::from_sorted(&readset.positions())
    }

    pub fn rank(&self, position: u32) -> Option<usize> {
        self.rank_of.get(&position).copied()
    }

    pub fn position(&self, rank: usize) -> u32 {
        self.position_of[rank]
    }

    pub fn len(&self) -> usize {
        self.position_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position_of.is_empty()
    }
}
