//! Input discovery.

use std::fs;
use std::path::{Path, PathBuf};
use crate::error::{PrepError, Result};

/// `.wav`, any letter case.
pub fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

/// A single WAV file is returned as-is (any other file yields nothing); a
/// directory is scanned recursively for WAV files, sorted by path.
pub fn collect_wavs<P: AsRef<Path>>(input: P) -> Result<Vec<PathBuf>> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(PrepError::config(format!("Input path does not exist: {}", input.display())));
    }

    if input.is_file() {
        return Ok(if is_wav(input) { vec![input.to_path_buf()] } else { Vec::new() });
    }

    let mut files = Vec::new();
    scan_dir(input, &mut files)?;
    files.sort();
    log::debug!("Found {} WAV files under {}", files.len(), input.display());
    Ok(files)
}

fn scan_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            scan_dir(&path, files)?;
        } else if is_wav(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Where the result for `file` goes: `output/<parent relative to input>` when
/// `input` is a directory, `output` otherwise.
pub fn mirrored_dir(input: &Path, file: &Path, output: &Path) -> PathBuf {
    if input.is_dir() {
        match file.strip_prefix(input).ok().and_then(Path::parent) {
            Some(rel) => output.join(rel),
            None => output.to_path_buf(),
        }
    } else {
        output.to_path_buf()
    }
}
