use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use log::info;
use ndarray::Array2;

use super::dataset::InMemoryDataset;
use crate::{MlErr, Result};

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

/// Which of the two MNIST file pairs to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnistSplit {
    Train,
    Test,
}

impl MnistSplit {
    fn file_names(self) -> (&'static str, &'static str) {
        match self {
            MnistSplit::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
            MnistSplit::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
        }
    }
}

/// Loads one MNIST split from a directory holding the uncompressed IDX files.
///
/// Every image becomes a row of `rows * cols` pixels scaled to `[0, 1]`.
pub fn load_mnist<P: AsRef<Path>>(dir: P, split: MnistSplit) -> Result<InMemoryDataset> {
    let dir = dir.as_ref();
    let (images_name, labels_name) = split.file_names();

    let images = read_idx_images(BufReader::new(File::open(dir.join(images_name))?))?;
    let labels = read_idx_labels(BufReader::new(File::open(dir.join(labels_name))?))?;
    info!(
        "loaded {} {split:?} images of {} pixels from {}",
        images.nrows(),
        images.ncols(),
        dir.display()
    );

    InMemoryDataset::new(images, labels)
}

/// Reads an IDX3 image file into a matrix with one flattened image per row.
pub fn read_idx_images<R: Read>(mut reader: R) -> Result<Array2<f32>> {
    let magic = read_u32_be(&mut reader)?;
    if magic != IMAGES_MAGIC {
        return Err(MlErr::invalid_format(
            "idx image file",
            format!("expected magic number {IMAGES_MAGIC}, got {magic}"),
        ));
    }

    let count = read_u32_be(&mut reader)? as usize;
    let rows = read_u32_be(&mut reader)? as usize;
    let cols = read_u32_be(&mut reader)? as usize;

    let Some(total) = rows.checked_mul(cols).and_then(|size| size.checked_mul(count)) else {
        return Err(MlErr::invalid_format(
            "idx image file",
            format!("{count} images of {rows}x{cols} pixels do not fit in memory"),
        ));
    };

    let pixels = read_bytes(&mut reader, total)?;
    let data = pixels.into_iter().map(|p| p as f32 / 255.0).collect();
    Array2::from_shape_vec((count, rows * cols), data)
        .map_err(|e| MlErr::invalid_format("idx image file", e.to_string()))
}

/// Reads an IDX1 label file.
pub fn read_idx_labels<R: Read>(mut reader: R) -> Result<Vec<usize>> {
    let magic = read_u32_be(&mut reader)?;
    if magic != LABELS_MAGIC {
        return Err(MlErr::invalid_format(
            "idx label file",
            format!("expected magic number {LABELS_MAGIC}, got {magic}"),
        ));
    }

    let count = read_u32_be(&mut reader)? as usize;
    let labels = read_bytes(&mut reader, count)?;

    Ok(labels.into_iter().map(usize::from).collect())
}

/// Reads exactly `len` bytes, never allocating more than the reader holds.
fn read_bytes<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes, the file holds {}", buf.len()),
        )
        .into());
    }

    Ok(buf)
}

fn read_u32_be<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}
