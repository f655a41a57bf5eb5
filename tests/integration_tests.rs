use std::{
    fs, io,
    path::{Path, PathBuf},
};

use haplothreader::{
    io::{load_phase_input, render_haplotype},
    phase, PhaseConfig,
};
use hex_literal::hex;
use sha2::{Digest, Sha256};

const FRAG_FILE: &str = "sample1.frags.tsv";
const CLUSTER_FILE: &str = "sample1.clusters.json";
const GENOTYPE_FILE: &str = "sample1.genotypes.json";

fn test_data_dir() -> PathBuf {
    Path::new("tests").join("data")
}

fn sha256_file_digest<P: AsRef<Path>>(path: P) -> Vec<u8> {
    let mut file =
        fs::File::open(&path).expect(&format!("Failed to open file: {}", path.as_ref().display()));
    let mut hasher = Sha256::new();
    _ = io::copy(&mut file, &mut hasher).expect(&format!(
        "Failed to read from file: {}",
        path.as_ref().display()
    ));
    hasher.finalize().to_vec()
}

fn load_sample1() -> (
    haplothreader::readset::ReadSet,
    haplothreader::clustering::Clustering,
    Vec<haplothreader::genotype::Genotype>,
) {
    load_phase_input(
        test_data_dir().join(FRAG_FILE).to_str().unwrap(),
        test_data_dir().join(CLUSTER_FILE).to_str().unwrap(),
        test_data_dir().join(GENOTYPE_FILE).to_str().unwrap(),
    )
    .unwrap()
}

#[test]
/// Check the input files used for integration tests.
/// If this test fails, it means the fragment file has changed.
/// This is a problem if tests are not updated to reflect the new input file.
fn check_fragment_file() {
    let path = test_data_dir().join(FRAG_FILE);
    let expect = hex!("a1c4954122beed45ec0d675100d10f307023d470ab6895f0e6f56c02bfc12752");
    assert_eq!(sha256_file_digest(path)[..], expect[..]);
}

#[test]
/// Check the input files used for integration tests.
/// If this test fails, it means the clustering file has changed.
/// This is a problem if tests are not updated to reflect the new input file.
fn check_clustering_file() {
    let path = test_data_dir().join(CLUSTER_FILE);
    let expect = hex!("5a3f35618eb726b08a202365d0e529a27e29fcf426abb6b9004251516a49465f");
    assert_eq!(sha256_file_digest(path)[..], expect[..]);
}

#[test]
/// Check the input files used for integration tests.
/// If this test fails, it means the genotype file has changed.
/// This is a problem if tests are not updated to reflect the new input file.
fn check_genotype_file() {
    let path = test_data_dir().join(GENOTYPE_FILE);
    let expect = hex!("813914f00ead38b4a1d928e31ef16a27e8f0d7d702cf545a90a0f3cd53631d88");
    assert_eq!(sha256_file_digest(path)[..], expect[..]);
}

#[test]
/// Test if the threaded haplotype sequences match the expectations.
fn run_sample1_haplotypes() {
    let (readset, clustering, genotypes) = load_sample1();
    let config = PhaseConfig::new(2);
    let phasing = phase(&readset, &clustering, &genotypes, &config, None).unwrap();

    let rendered: Vec<String> = phasing
        .haplotypes
        .iter()
        .map(|hap| render_haplotype(hap))
        .collect();
    assert_eq!(rendered, vec!["010001".to_string(), "101110".to_string()]);
    assert!(!phasing.aborted);
}

#[test]
/// Test if the cut positions and the threading path match the expectations.
fn run_sample1_cuts_and_path() {
    let (readset, clustering, genotypes) = load_sample1();
    let config = PhaseConfig::new(2);
    let phasing = phase(&readset, &clustering, &genotypes, &config, None).unwrap();

    // no read spans ranks 2 to 3, the pre-block border severs the link there
    assert_eq!(phasing.cut_positions, vec![2]);
    assert_eq!(phasing.path.len(), 6);
    assert_eq!(phasing.path[0], vec![Some(0), Some(1)]);
    assert_eq!(phasing.path[5], vec![Some(2), Some(3)]);
    assert_eq!(
        phasing.clustering,
        vec![vec![0, 1], vec![2, 3], vec![4, 5], vec![6, 7]]
    );
    assert_eq!(phasing.block_components(), vec![0, 0, 0, 3, 3, 3]);
}

#[test]
/// Test if the compact engine reproduces the straightforward engine.
fn run_sample1_engines_agree() {
    let (readset, clustering, genotypes) = load_sample1();
    let standard = phase(
        &readset,
        &clustering,
        &genotypes,
        &PhaseConfig::new(2),
        None,
    )
    .unwrap();
    let mut config = PhaseConfig::new(2);
    config.fast_engine = true;
    let compact = phase(&readset, &clustering, &genotypes, &config, None).unwrap();

    assert_eq!(standard.path, compact.path);
    assert_eq!(standard.cut_positions, compact.cut_positions);
    assert_eq!(standard.haplotypes, compact.haplotypes);
}

#[test]
/// Test if forcing a single block suppresses the linkage cut.
fn run_sample1_single_block() {
    let (readset, clustering, genotypes) = load_sample1();
    let mut config = PhaseConfig::new(2);
    config.single_block = true;
    let phasing = phase(&readset, &clustering, &genotypes, &config, None).unwrap();

    assert!(phasing.cut_positions.is_empty());
    assert_eq!(phasing.path.len(), 6);
    assert_eq!(phasing.block_components(), vec![0; 6]);
}
