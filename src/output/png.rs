//! Spectrogram heat-map PNGs.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use ndarray::ArrayView2;
use png::{BitDepth, ColorType, Encoder};
use crate::error::Result;

/// Bands are repeated vertically until the image is at least this tall.
const MIN_HEIGHT: usize = 256;

/// Viridis color stops at 1/8 intervals.
const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 145, 140],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

/// Map `t` in [0, 1] onto the viridis ramp.
pub fn viridis(t: f32) -> [u8; 3] {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (VIRIDIS.len() - 1) as f32;
    let lo = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = pos - lo as f32;
    let (a, b) = (VIRIDIS[lo], VIRIDIS[lo + 1]);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * frac).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

/// Render a `(bands, frames)` spectrogram to RGB pixels, lowest band at the bottom.
///
/// Returns `(width, height, pixels)`.
pub fn render_rgb(spec: ArrayView2<'_, f32>) -> (u32, u32, Vec<u8>) {
    let (bands, frames) = spec.dim();
    if bands == 0 || frames == 0 {
        return (0, 0, Vec::new());
    }

    let (min, max) = spec
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = if max > min { max - min } else { 1.0 };

    let y_scale = MIN_HEIGHT.div_ceil(bands).max(1);
    let height = bands * y_scale;
    let mut pixels = Vec::with_capacity(frames * height * 3);

    for row in 0..height {
        let band = bands - 1 - row / y_scale;
        for frame in 0..frames {
            let v = spec[[band, frame]];
            let t = if max > min { (v - min) / range } else { 0.0 };
            pixels.extend_from_slice(&viridis(t));
        }
    }

    (frames as u32, height as u32, pixels)
}

/// Write a spectrogram heat map. Empty spectrograms produce no file.
pub fn save_spectrogram_png<P: AsRef<Path>>(spec: ArrayView2<'_, f32>, path: P) -> Result<bool> {
    let (width, height, pixels) = render_rgb(spec);
    if width == 0 || height == 0 {
        log::warn!("Skipping empty spectrogram image {}", path.as_ref().display());
        return Ok(false);
    }

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut encoder = Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(ColorType::Rgb);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&pixels)?;
    writer.finish()?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use tempfile::TempDir;

    #[test]
    fn test_viridis_endpoints() {
        assert_eq!(viridis(0.0), VIRIDIS[0]);
        assert_eq!(viridis(1.0), VIRIDIS[8]);
        assert_eq!(viridis(-3.0), VIRIDIS[0]);
        assert_eq!(viridis(f32::NAN), VIRIDIS[0]);
        assert_eq!(viridis(0.5), VIRIDIS[4]);
    }

    #[test]
    fn test_render_orientation() {
        // Band 0 quiet, band 1 loud: loud color must be on the top rows.
        let spec = Array2::from(vec![[-80.0f32, -80.0], [0.0, 0.0]]);
        let (w, h, pixels) = render_rgb(spec.view());
        assert_eq!(w, 2);
        assert_eq!(h as usize, MIN_HEIGHT);
        assert_eq!(&pixels[..3], &VIRIDIS[8]);
        let last_row = (h as usize - 1) * w as usize * 3;
        assert_eq!(&pixels[last_row..last_row + 3], &VIRIDIS[0]);
    }

    #[test]
    fn test_save_png_signature() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img").join("mel.png");
        let spec = Array2::from_shape_fn((64, 20), |(m, t)| -((m + t) as f32));
        assert!(save_spectrogram_png(spec.view(), &path).unwrap());

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_empty_spectrogram_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("none.png");
        let spec = Array2::<f32>::zeros((64, 0));
        assert!(!save_spectrogram_png(spec.view(), &path).unwrap());
        assert!(!path.exists());
    }
}
