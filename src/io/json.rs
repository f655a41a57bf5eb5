//! JSON collaterals: the cluster-editing solver's read groups and the
//! genotype track derived from the input VCF.
use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};

use crate::clustering::Clustering;
use crate::genotype::Genotype;

/// Read a clustering from a json file at `path`: an array of arrays of read
/// ids, e.g. `[[0, 1, 4], [2, 3]]`.
pub fn read_clustering<P: AsRef<Path>>(path: P) -> Result<Clustering> {
    let file = File::open(&path)
        .with_context(|| format!("Could not read json {}", path.as_ref().display()))?;
    let reader = BufReader::new(file);
    let clusters: Vec<Vec<usize>> = serde_json::from_reader(reader)
        .with_context(|| format!("Could not deserialize json {}", path.as_ref().display()))?;
    Ok(Clustering::new(clusters))
}

/// Read a genotype track from a json file at `path`: one allele multiset per
/// variant position, e.g. `[{"0": 1, "1": 1}, {"1": 2}]` for a diploid.
pub fn read_genotypes<P: AsRef<Path>>(path: P) -> Result<Vec<Genotype>> {
    let file = File::open(&path)
        .with_context(|| format!("Could not read json {}", path.as_ref().display()))?;
    let reader = BufReader::new(file);
    let genotypes: Vec<Genotype> = serde_json::from_reader(reader)
        .with_context(|| format!("Could not deserialize json {}", path.as_ref().display()))?;
    Ok(genotypes)
}
