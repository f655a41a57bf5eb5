use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use rayon::ThreadPoolBuilder;

use haplothreader::cli::Cli;
use haplothreader::io::{load_phase_input, write_phasing};
use haplothreader::readset::PositionIndex;
use haplothreader::phase;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter)).init();

    ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()?;
    info!("Launching {} thread(s) for threading", cli.threads);

    let (readset, clustering, genotypes) =
        load_phase_input(&cli.fragments, &cli.clustering, &cli.genotypes)?;
    let config = cli.phase_config();

    let phasing = phase(&readset, &clustering, &genotypes, &config, None)?;
    if phasing.aborted {
        warn!("Threading was cancelled, writing partial result");
    }
    info!(
        "Threaded {} haplotypes over {} variants in {} phase blocks",
        config.ploidy,
        phasing.haplotypes.first().map_or(0, Vec::len),
        phasing.cut_positions.len() + 1
    );

    let index = PositionIndex::from_readset(&readset)?;
    let positions: Vec<u32> = (0..index.len()).map(|rank| index.position(rank)).collect();

    match &cli.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_phasing(&mut writer, &phasing, &positions)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_phasing(&mut writer, &phasing, &positions)?;
        }
    }

    Ok(())
}
