//! # Text collaterals of the threading core
//!
//! The core itself owns no file format; these readers and writers cover the
//! plain-text handover points to the out-of-scope collaborators: fragment
//! files with allele observations, the cluster-editing solver's output, the
//! genotype track derived from the input VCF, and the threading result that
//! the downstream phased-VCF writer consumes.
use anyhow::Result;
use log::info;
use std::io::Write;

use crate::clustering::Clustering;
use crate::genotype::Genotype;
use crate::readset::{Allele, ReadSet};
use crate::Phasing;

pub mod frags;
pub mod json;

/// Load the three input collaterals for one sample.
pub fn load_phase_input(
    frags_path: &str,
    clustering_path: &str,
    genotypes_path: &str,
) -> Result<(ReadSet, Clustering, Vec<Genotype>)> {
    let readset = frags::read_fragments(frags_path)?;
    info!("Read {} fragments from {frags_path}", readset.len());

    let clustering = json::read_clustering(clustering_path)?;
    info!(
        "Read {} clusters from {clustering_path}",
        clustering.len()
    );

    let genotypes = json::read_genotypes(genotypes_path)?;
    info!("Read {} genotypes from {genotypes_path}", genotypes.len());

    Ok((readset, clustering, genotypes))
}

/// Undefined sites render as `n`, everything else as the allele digit.
pub fn render_haplotype(alleles: &[Option<Allele>]) -> String {
    alleles
        .iter()
        .map(|allele| match allele {
            Some(allele) => char::from(b'0' + allele),
            None => 'n',
        })
        .collect()
}

/// Write the threading result as tab-separated records: one `HAP` line per
/// haplotype, one `CUT` line, and one `POS` line per variant with the
/// genome position and the ordered cluster tuple.
pub fn write_phasing<W: Write>(
    writer: &mut W,
    phasing: &Phasing,
    positions: &[u32],
) -> Result<()> {
    for (hap, alleles) in phasing.haplotypes.iter().enumerate() {
        writeln!(writer, "HAP\t{hap}\t{}", render_haplotype(alleles))?;
    }

    let cuts: Vec<String> = phasing
        .cut_positions
        .iter()
        .map(|cut| cut.to_string())
        .collect();
    writeln!(writer, "CUT\t{}", cuts.join(","))?;

    for (rank, tuple) in phasing.path.iter().enumerate() {
        let slots: Vec<String> = tuple
            .iter()
            .map(|slot| match slot {
                Some(cluster_id) => cluster_id.to_string(),
                None => "-".into(),
            })
            .collect();
        writeln!(writer, "POS\t{}\t{}", positions[rank], slots.join(","))?;
    }

    Ok(())
}
