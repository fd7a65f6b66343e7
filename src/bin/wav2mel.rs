//! wav2mel - WAV to segmented log-mel spectrograms

use anyhow::Context;
use clap::Parser;
use std::process;
use wavprep::processing::MelExtractor;
use wavprep::{init_logging, Wav2MelArgs, Wav2MelConfig};

fn main() {
    let args = Wav2MelArgs::parse();
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

/// Returns `false` when any file failed.
fn run(args: Wav2MelArgs) -> anyhow::Result<bool> {
    if args.verbose {
        println!("{}", wavprep::get_library_info());
        println!();
    }

    let config = Wav2MelConfig::from_args_and_config(args).context("Invalid configuration")?;
    if !config.input_path.exists() {
        anyhow::bail!("Input path does not exist: {}", config.input_path.display());
    }

    println!("=== wav2mel ===");
    println!("Input: {}", config.input_path.display());
    println!("Output: {}", config.output_dir.display());
    println!(
        "Mel: {} bands, n_fft {}, hop {}, {}Hz",
        config.mel.n_mels, config.mel.n_fft, config.mel.hop_length, config.audio.sample_rate
    );
    println!(
        "Segments: {}s window, {}s step{}",
        config.segment.win_seconds,
        config.segment.step_seconds,
        if config.segment.pad_last { ", pad last" } else { "" }
    );
    println!("===============\n");

    let extractor = MelExtractor::new(config)?;
    let report = extractor.process_batch()?;

    println!("\n=== Processing Complete ===");
    println!("{}", report.stats);
    println!("Segments: {}", report.rows.len());
    println!("Index: {}", report.index_path.display());

    Ok(!report.stats.has_errors())
}
