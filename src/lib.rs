//! wavprep - Batch WAV Preprocessing
//!
//! Two single-purpose converters sharing one audio stack:
//! log-mel segmentation (`wav2mel`) and rule-based resampling (`wavresample`).

pub mod audio;
pub mod config;
pub mod error;
pub mod output;
pub mod processing;

pub use config::{ResampleArgs, ResampleConfig, Wav2MelArgs, Wav2MelConfig};
pub use error::{PrepError, Result};

use std::io::Write;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Initialize `env_logger`. `RUST_LOG` still wins for individual modules.
pub fn init_logging(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .try_init();
    if let Err(e) = result {
        log::debug!("Logger already initialized: {}", e);
    }
}

pub fn get_library_info() -> LibraryInfo {
    LibraryInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl std::fmt::Display for LibraryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} - {}", self.name, self.version, self.description)
    }
}
