//! On-disk snapshot of network parameters.
//!
//! A checkpoint is a bincode archive holding a format version, an explicit
//! layer count, and one weight array (`W1`, `W2`, ...) plus one bias array
//! (`b1`, `b2`, ...) per layer. Loading validates everything against the
//! shapes the receiving model declares before any parameter is replaced.

use super::layer::Dense;
use super::tensor::Tensor;
use crate::error::PersistenceError;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

// refuse to decode anything larger than this; guards against corrupt length prefixes
const SIZE_LIMIT: u64 = 1 << 30;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub version: u32,
    pub layer_count: usize,
    pub arrays: BTreeMap<String, Tensor>,
}

pub fn weight_key(layer: usize) -> String {
    format!("W{}", layer + 1)
}

pub fn bias_key(layer: usize) -> String {
    format!("b{}", layer + 1)
}

impl Checkpoint {
    pub fn from_layers(layers: &[Dense]) -> Self {
        let mut arrays = BTreeMap::new();
        for (i, layer) in layers.iter().enumerate() {
            arrays.insert(weight_key(i), layer.weights.clone());
            arrays.insert(bias_key(i), layer.biases.clone());
        }
        Self {
            version: FORMAT_VERSION,
            layer_count: layers.len(),
            arrays,
        }
    }

    pub fn weights(&self, layer: usize) -> Option<&Tensor> {
        self.arrays.get(&weight_key(layer))
    }

    pub fn biases(&self, layer: usize) -> Option<&Tensor> {
        self.arrays.get(&bias_key(layer))
    }

    /// Writes through a sibling temp file so a failed save never clobbers the previous checkpoint.
    pub fn write(&self, path: &Path) -> Result<(), PersistenceError> {
        self.write_limited(path, SIZE_LIMIT)
    }

    fn write_limited(&self, path: &Path, limit: u64) -> Result<(), PersistenceError> {
        let io_err = |source: io::Error| PersistenceError::Io { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp_path = temp_path(path);
        let file = File::create(&tmp_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        let written = bincode::options()
            .with_limit(limit)
            .serialize_into(&mut writer, self)
            .map_err(|err| match *err {
                bincode::ErrorKind::Io(source) => io_err(source),
                other => PersistenceError::Corrupt { path: path.to_path_buf(), source: Box::new(other) },
            })
            .and_then(|()| writer.flush().map_err(io_err));
        drop(writer);

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
        fs::rename(&tmp_path, path).map_err(io_err)
    }

    pub fn read(path: &Path) -> Result<Self, PersistenceError> {
        let file = File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => PersistenceError::NotFound(path.to_path_buf()),
            _ => PersistenceError::Io { path: path.to_path_buf(), source },
        })?;

        bincode::options()
            .with_limit(SIZE_LIMIT)
            .deserialize_from(BufReader::new(file))
            .map_err(|source| PersistenceError::Corrupt { path: path.to_path_buf(), source })
    }

    /// Converts into layers, checking every array against `shapes` (`in x out` per layer).
    pub fn into_layers(mut self, shapes: &[(usize, usize)]) -> Result<Vec<Dense>, PersistenceError> {
        if self.version != FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion { expected: FORMAT_VERSION, found: self.version });
        }
        if self.layer_count != shapes.len() {
            return Err(PersistenceError::LayerCountMismatch { expected: shapes.len(), found: self.layer_count });
        }

        let mut layers = Vec::with_capacity(shapes.len());
        for (i, &(input_size, output_size)) in shapes.iter().enumerate() {
            let weights = take_array(&mut self.arrays, weight_key(i), vec![input_size, output_size])?;
            let biases = take_array(&mut self.arrays, bias_key(i), vec![1, output_size])?;
            layers.push(Dense { weights, biases });
        }
        Ok(layers)
    }
}

fn take_array(arrays: &mut BTreeMap<String, Tensor>, key: String, expected: Vec<usize>) -> Result<Tensor, PersistenceError> {
    let tensor = arrays.remove(&key).ok_or_else(|| PersistenceError::MissingArray(key.clone()))?;
    if tensor.shape != expected {
        return Err(PersistenceError::ShapeMismatch { key, expected, found: tensor.shape.clone() });
    }
    Ok(tensor)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
