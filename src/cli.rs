//! # Command line interface for `haplothreader`
use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::threading::CutMode;
use crate::PhaseConfig;

#[derive(Parser)]
#[command(
    name = "haplothreader",
    author,
    version,
    about = "Polyploid haplotype threading through read clusters",
    long_about = None
)]
pub struct Cli {
    /// Fragment file with allele observations. Expected format is TSV:
    /// read name, position, allele, quality
    #[arg(short, long)]
    pub fragments: String,

    /// Read clustering produced by the cluster-editing solver. Expected
    /// format is JSON: an array of arrays of read ids
    #[arg(short, long)]
    pub clustering: String,

    /// Genotype track. Expected format is JSON: one allele-count map per
    /// variant position
    #[arg(short, long)]
    pub genotypes: String,

    /// Ploidy of the sample
    #[arg(short, long, value_parser = ploidy_in_range)]
    pub ploidy: usize,

    /// Output file. Writes to stdout if omitted
    #[arg(short, long)]
    pub output: Option<String>,

    /// Minimum number of reads that must span two consecutive variants to
    /// keep them in one pre-block. Defaults to the ploidy
    #[arg(long)]
    pub min_link: Option<usize>,

    /// Per position, only this many clusters (the largest ones) take part
    /// in tuple enumeration
    #[arg(long, default_value_t = 8)]
    pub max_clusters_per_position: usize,

    /// Report a single phase block without any cut positions
    #[arg(long, default_value_t = false)]
    pub single_block: bool,

    /// Use the compact DP engine (same results, less bookkeeping)
    #[arg(long, default_value_t = false)]
    pub fast_engine: bool,

    /// Scale switch penalties by cluster dissimilarity
    #[arg(long, default_value_t = false)]
    pub dynamic_switch_cost: bool,

    /// What ends a phase block: "multiset" or "ordered" tuple changes
    #[arg(long, default_value = "multiset", value_parser = parse_cut_mode)]
    pub cut_mode: CutMode,

    /// Number of threads to use
    #[arg(long, default_value_t = 1, value_parser = threads_in_range)]
    pub threads: usize,

    /// Verbose logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    pub fn phase_config(&self) -> PhaseConfig {
        let mut config = PhaseConfig::new(self.ploidy);
        config.single_block = self.single_block;
        config.fast_engine = self.fast_engine;
        config.dynamic_switch_cost = self.dynamic_switch_cost;
        config.max_clusters_per_position = self.max_clusters_per_position;
        config.cut_mode = self.cut_mode;
        if let Some(min_link) = self.min_link {
            config.min_link = min_link;
        }
        config
    }
}

fn ploidy_in_range(s: &str) -> Result<usize> {
    let ploidy = s
        .parse()
        .context("Could not parse value passed to --ploidy to integer")?;
    if ploidy < 2 {
        bail!("--ploidy must be at least 2");
    }
    Ok(ploidy)
}

fn threads_in_range(s: &str) -> Result<usize> {
    let threads = s
        .parse()
        .context("Could not parse value passed to --threads to integer")?;
    if threads < 1 {
        bail!("--threads must be at least 1");
    }
    Ok(threads)
}

fn parse_cut_mode(s: &str) -> Result<CutMode> {
    match s {
        "multiset" => Ok(CutMode::Multiset),
        "ordered" => Ok(CutMode::Ordered),
        other => bail!("--cut-mode must be 'multiset' or 'ordered', got '{other}'"),
    }
}
