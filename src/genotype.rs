//! # Genotype
//!
//! Per-position genotype constraints. A [`Genotype`] is the expected multiset
//! of alleles across the `ploidy` haplotypes at one variant position,
//! represented as allele -> count. For biallelic matching the summed-allele
//! form ([`Genotype::dose`]) is sufficient and is what the threading DP
//! compares against.
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::readset::Allele;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genotype {
    counts: BTreeMap<Allele, usize>,
}

impl Genotype {
    pub fn from_counts(counts: BTreeMap<Allele, usize>) -> Self {
        Genotype { counts }
    }

    /// Build from one allele per haplotype, e.g. `[0, 0, 1, 1]` for an
    /// `AABB` tetraploid site.
    pub fn from_alleles(alleles: &[Allele]) -> Self {
        let mut counts = BTreeMap::new();
        for &allele in alleles {
            *counts.entry(allele).or_insert(0) += 1;
        }
        Genotype { counts }
    }

    pub fn count(&self, allele: Allele) -> usize {
        self.counts.get(&allele).copied().unwrap_or(0)
    }

    /// Number of haplotype slots this genotype accounts for.
    pub fn multiplicity(&self) -> usize {
        self.counts.values().sum()
    }

    /// Summed-allele form `sum(count[a] * a)`.
    pub fn dose(&self) -> usize {
        self.counts
            .iter()
            .map(|(&allele, &count)| allele as usize * count)
            .sum()
    }

    pub fn counts(&self) -> &BTreeMap<Allele, usize> {
        &self.counts
    }
}

/// Reject genotype tracks that violate the input contract: the track must
/// have one genotype per variant position and every multiset must have
/// exactly `ploidy` entries.
pub fn validate_genotypes(genotypes: &[Genotype], num_vars: usize, ploidy: usize) -> Result<()> {
    if genotypes.len() != num_vars {
        bail!(
            "Got {} genotypes for {num_vars} variant positions",
            genotypes.len()
        );
    }
    for (rank, genotype) in genotypes.iter().enumerate() {
        let multiplicity = genotype.multiplicity();
        if multiplicity != ploidy {
            bail!(
                "Genotype at variant {rank} has {multiplicity} alleles, expected ploidy {ploidy}"
            );
        }
    }
    Ok(())
}
