//! Output Module
//!
//! Artifact writers: NumPy arrays, spectrogram images and CSV tables.

pub mod npy;
pub mod png;
pub mod index;

pub use npy::{read_npy, write_npy, NpyArray, NpyDtype};
pub use png::save_spectrogram_png;
pub use index::{write_index_csv, write_report_csv, IndexRow, ReportRow};
