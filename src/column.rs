//! Typed dataset columns and their on-disk representation.

use crate::error::ExplorerError;

use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use strum_macros::{Display, IntoStaticStr};
use zerocopy::{AsBytes, FromBytes};

/// Supported column data types
#[derive(Clone, Copy, Debug, Deserialize, Display, IntoStaticStr, PartialEq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    /// [f32]
    Float32,
    /// [f64]
    Float64,
    /// [i64]
    Int64,
}

impl DType {
    /// Returns the size of the associated type in bytes.
    pub fn size_of(self) -> usize {
        match self {
            Self::Float32 => std::mem::size_of::<f32>(),
            Self::Float64 => std::mem::size_of::<f64>(),
            Self::Int64 => std::mem::size_of::<i64>(),
        }
    }
}

/// A column of values held in memory.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int64(Vec<i64>),
}

impl Column {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(values) => values.len(),
            Self::Float64(values) => values.len(),
            Self::Int64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
            Self::Int64(_) => DType::Int64,
        }
    }

    /// Read the first `rows` values of a raw native-endian column file.
    ///
    /// # Arguments
    ///
    /// * `path`: Path of the column file
    /// * `name`: Column name, used in errors
    /// * `dtype`: Data type of the values in the file
    /// * `rows`: Number of rows to read
    pub fn read(path: &Path, name: &str, dtype: DType, rows: usize) -> Result<Self, ExplorerError> {
        let column = match dtype {
            DType::Float32 => Self::Float32(read_values(path, name, dtype, rows)?),
            DType::Float64 => Self::Float64(read_values(path, name, dtype, rows)?),
            DType::Int64 => Self::Int64(read_values(path, name, dtype, rows)?),
        };
        Ok(column)
    }
}

fn dataset_io(path: &Path, source: std::io::Error) -> ExplorerError {
    ExplorerError::DatasetIo {
        path: path.display().to_string(),
        source,
    }
}

/// Read `rows` values of type `T` from the start of a file.
///
/// `dtype` must describe `T`. Values are read straight into the backing storage of the returned
/// Vec, so no intermediate byte buffer is allocated.
fn read_values<T>(
    path: &Path,
    name: &str,
    dtype: DType,
    rows: usize,
) -> Result<Vec<T>, ExplorerError>
where
    T: AsBytes + FromBytes + Clone + num_traits::Zero,
{
    let mut file = File::open(path).map_err(|source| dataset_io(path, source))?;
    let file_len = file
        .metadata()
        .map_err(|source| dataset_io(path, source))?
        .len();
    let available = usize::try_from(file_len)? / dtype.size_of();
    if available < rows {
        return Err(ExplorerError::ColumnLength {
            name: name.to_string(),
            expected: rows,
            found: available,
        });
    }
    let mut values = vec![T::zero(); rows];
    file.read_exact(values.as_mut_slice().as_bytes_mut())
        .map_err(|source| dataset_io(path, source))?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    #[test]
    fn dtype_display() {
        assert_eq!("float32", DType::Float32.to_string());
        assert_eq!("float64", DType::Float64.to_string());
        assert_eq!("int64", DType::Int64.to_string());
        let name: &'static str = DType::Float64.into();
        assert_eq!("float64", name);
    }

    #[test]
    fn dtype_size_of() {
        assert_eq!(4, DType::Float32.size_of());
        assert_eq!(8, DType::Float64.size_of());
        assert_eq!(8, DType::Int64.size_of());
    }

    #[test]
    fn read_f32() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_utils::write(&dir, "x.bin", [1.5_f32, -2.0, 3.25][..].as_bytes());
        let column = Column::read(&path, "x", DType::Float32, 3).unwrap();
        assert_eq!(Column::Float32(vec![1.5, -2.0, 3.25]), column);
        assert_eq!(DType::Float32, column.dtype());
    }

    #[test]
    fn read_i64_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_utils::write(&dir, "t.bin", [10_i64, 20, 30, 40][..].as_bytes());
        let column = Column::read(&path, "t", DType::Int64, 2).unwrap();
        assert_eq!(Column::Int64(vec![10, 20]), column);
        assert_eq!(2, column.len());
    }

    #[test]
    fn read_too_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_utils::write(&dir, "y.bin", [1.0_f64, 2.0][..].as_bytes());
        match Column::read(&path, "y", DType::Float64, 3).unwrap_err() {
            ExplorerError::ColumnLength {
                name,
                expected,
                found,
            } => {
                assert_eq!("y", name);
                assert_eq!(3, expected);
                assert_eq!(2, found);
            }
            err => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.bin");
        match Column::read(&path, "nope", DType::Float32, 1).unwrap_err() {
            ExplorerError::DatasetIo { source, .. } => {
                assert_eq!(std::io::ErrorKind::NotFound, source.kind())
            }
            err => panic!("unexpected error {err:?}"),
        }
    }
}
