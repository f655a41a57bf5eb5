//! Fragment files: the upstream read extractor's output, one allele
//! observation per line.
use std::collections::HashMap;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;

use crate::readset::{Read, ReadSet};

/// One line of a fragment file: `name <TAB> position <TAB> allele <TAB> quality`.
#[derive(Debug, Deserialize)]
struct FragmentRecord {
    name: String,
    position: u32,
    allele: u8,
    quality: u8,
}

/// Read a fragment file into a readset. Lines sharing a name belong to the
/// same read; reads keep the order of their first appearance, which defines
/// the read ids the clustering refers to.
pub fn read_fragments(path: &str) -> Result<ReadSet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Could not read fragment file {path}"))?;

    let mut readset = ReadSet::new();
    let mut read_of: HashMap<String, usize> = HashMap::new();
    let mut reads: Vec<Read> = Vec::new();

    for result in reader.deserialize() {
        let record: FragmentRecord = result
            .with_context(|| format!("Failed to deserialize fragment record in {path}"))?;
        let read_id = *read_of.entry(record.name.clone()).or_insert_with(|| {
            reads.push(Read::new(record.name.clone(), reads.len()));
            reads.len() - 1
        });
        reads[read_id].add_variant(record.position, record.allele, record.quality);
    }

    for read in reads {
        readset.push(read);
    }
    Ok(readset)
}
