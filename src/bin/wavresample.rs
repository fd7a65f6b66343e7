//! wavresample - rule-based WAV resampling

use anyhow::Context;
use clap::Parser;
use std::process;
use wavprep::processing::ResampleProcessor;
use wavprep::{init_logging, ResampleArgs, ResampleConfig};

fn main() {
    let args = ResampleArgs::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(args: ResampleArgs) -> anyhow::Result<bool> {
    if args.verbose {
        println!("{}", wavprep::get_library_info());
        println!();
    }

    let config = ResampleConfig::from_args_and_config(args).context("Invalid configuration")?;
    if !config.input_path.exists() {
        anyhow::bail!("Input path does not exist: {}", config.input_path.display());
    }

    println!("=== WAV Resampler ===");
    println!("Input: {}", config.input_path.display());
    println!("Output: {}", config.output_dir.display());
    println!("Target: {}Hz (minimum {}Hz)", config.target_sample_rate, config.min_sample_rate);
    println!("Downsample: {}", if config.downsample { "enabled" } else { "disabled" });
    println!("Overwrite: {}", if config.overwrite { "enabled" } else { "disabled" });
    println!("=====================\n");

    let processor = ResampleProcessor::new(config);
    let report = processor.process_batch()?;

    println!("\n=== Processing Complete ===");
    println!("{}", report.stats);

    Ok(!report.stats.has_errors())
}
