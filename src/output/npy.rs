//! NumPy `.npy` (format 1.0) writing and reading for float arrays.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use half::f16;
use ndarray::{ArrayBase, Data, Dimension};
use serde::{Deserialize, Serialize};
use crate::error::{PrepError, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Header (magic through newline) is padded to a multiple of this.
const HEADER_ALIGN: usize = 64;

/// Element type of written arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NpyDtype {
    #[default]
    Float32,
    Float16,
}

impl NpyDtype {
    pub fn descr(&self) -> &'static str {
        match self {
            NpyDtype::Float32 => "<f4",
            NpyDtype::Float16 => "<f2",
        }
    }

    pub fn size(&self) -> usize {
        match self {
            NpyDtype::Float32 => 4,
            NpyDtype::Float16 => 2,
        }
    }

    fn from_descr(descr: &str) -> Result<Self> {
        match descr {
            "<f4" | "|f4" => Ok(NpyDtype::Float32),
            "<f2" | "|f2" => Ok(NpyDtype::Float16),
            other => Err(PrepError::output(format!("Unsupported dtype: {}", other))),
        }
    }
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

fn encode_header(dtype: NpyDtype, shape: &[usize]) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        dtype.descr(),
        shape_literal(shape)
    );
    // magic + version + u16 length + dict + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(unpadded + padding);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat_n(b' ', padding));
    out.push(b'\n');
    out
}

/// Write an array in C order with the given element type.
pub fn write_npy<S, D, P>(path: P, array: &ArrayBase<S, D>, dtype: NpyDtype) -> Result<()>
where
    S: Data<Elem = f32>,
    D: Dimension,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path).map_err(|e| {
        PrepError::output(format!("Cannot create {}: {}", path.display(), e))
    })?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&encode_header(dtype, array.shape()))?;

    // `iter` walks logical (row-major) order regardless of memory layout.
    match dtype {
        NpyDtype::Float32 => {
            for &v in array.iter() {
                writer.write_all(&v.to_le_bytes())?;
            }
        }
        NpyDtype::Float16 => {
            for &v in array.iter() {
                writer.write_all(&f16::from_f32(v).to_le_bytes())?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// A loaded `.npy` array, widened to f32.
#[derive(Debug, Clone)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub dtype: NpyDtype,
    pub data: Vec<f32>,
}

impl NpyArray {
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn read_npy<P: AsRef<Path>>(path: P) -> Result<NpyArray> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        PrepError::output(format!("Cannot open NPY file {}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(PrepError::output("Invalid NPY magic number"));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = if version[0] == 1 {
        let mut len = [0u8; 2];
        reader.read_exact(&mut len)?;
        u16::from_le_bytes(len) as usize
    } else {
        let mut len = [0u8; 4];
        reader.read_exact(&mut len)?;
        u32::from_le_bytes(len) as usize
    };

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8_lossy(&header);

    if header.contains("'fortran_order': True") {
        return Err(PrepError::output("Fortran-ordered arrays are not supported"));
    }
    let dtype = NpyDtype::from_descr(&quoted_value(&header, "descr")?)?;
    let shape = parse_shape(&header)?;

    let count: usize = shape.iter().product();
    let mut raw = vec![0u8; count * dtype.size()];
    reader.read_exact(&mut raw)?;

    let data = match dtype {
        NpyDtype::Float32 => raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        NpyDtype::Float16 => raw
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
    };

    Ok(NpyArray { shape, dtype, data })
}

fn quoted_value(header: &str, key: &str) -> Result<String> {
    let needle = format!("'{}':", key);
    let start = header
        .find(&needle)
        .ok_or_else(|| PrepError::output(format!("No {} in NPY header", key)))?;
    let rest = &header[start + needle.len()..];
    let open = rest
        .find('\'')
        .ok_or_else(|| PrepError::output(format!("Malformed {} in NPY header", key)))?;
    let value = &rest[open + 1..];
    let close = value
        .find('\'')
        .ok_or_else(|| PrepError::output(format!("Unclosed {} in NPY header", key)))?;
    Ok(value[..close].to_string())
}

fn parse_shape(header: &str) -> Result<Vec<usize>> {
    let start = header
        .find("'shape':")
        .ok_or_else(|| PrepError::output("No shape in NPY header"))?;
    let rest = &header[start..];
    let open = rest.find('(').ok_or_else(|| PrepError::output("No shape tuple"))?;
    let close = rest.find(')').ok_or_else(|| PrepError::output("Unclosed shape tuple"))?;

    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| PrepError::output(format!("Invalid shape element: {}", e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, Array3};
    use tempfile::TempDir;

    #[test]
    fn test_header_is_aligned() {
        for shape in [vec![], vec![7], vec![64, 173], vec![12, 64, 172]] {
            let header = encode_header(NpyDtype::Float32, &shape);
            assert_eq!(header.len() % HEADER_ALIGN, 0);
            assert_eq!(*header.last().unwrap(), b'\n');
            assert_eq!(&header[..6], MAGIC);
        }
    }

    #[test]
    fn test_shape_literal() {
        assert_eq!(shape_literal(&[]), "()");
        assert_eq!(shape_literal(&[5]), "(5,)");
        assert_eq!(shape_literal(&[0, 64, 10]), "(0, 64, 10)");
    }

    #[test]
    fn test_write_and_read_float32() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.npy");
        let array = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f32 - 5.5);
        write_npy(&path, &array, NpyDtype::Float32).unwrap();

        let loaded = read_npy(&path).unwrap();
        assert_eq!(loaded.shape, vec![3, 4]);
        assert_eq!(loaded.dtype, NpyDtype::Float32);
        assert_eq!(loaded.data, array.iter().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn test_transposed_view_is_written_in_logical_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.npy");
        let array = Array2::from_shape_fn((2, 3), |(r, c)| (r * 3 + c) as f32);
        write_npy(&path, &array.t(), NpyDtype::Float32).unwrap();

        let loaded = read_npy(&path).unwrap();
        assert_eq!(loaded.shape, vec![3, 2]);
        assert_eq!(loaded.data, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_float16_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("h.npy");
        let array = Array1::from(vec![-80.0f32, -12.25, 0.0, 1.5]);
        write_npy(&path, &array, NpyDtype::Float16).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let loaded = read_npy(&path).unwrap();
        assert_eq!(loaded.dtype, NpyDtype::Float16);
        assert_eq!(loaded.data, array.to_vec());
        assert_eq!(bytes.len(), HEADER_ALIGN + 4 * 2);
    }

    #[test]
    fn test_empty_stack_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("e.npy");
        write_npy(&path, &Array3::<f32>::zeros((0, 64, 10)), NpyDtype::Float32).unwrap();
        let loaded = read_npy(&path).unwrap();
        assert_eq!(loaded.shape, vec![0, 64, 10]);
        assert!(loaded.is_empty());
    }
}
