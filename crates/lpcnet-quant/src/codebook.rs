//! VQ codebook resource
//!
//! Codebooks are read-only data shared by every decoder built from them.
//! Each stage is a table of `entries` centroids, each centroid holding one
//! value per spectral band, stored entry-major:
//! `stage[entry * NB_BANDS + band]`.
//!
//! Stage tables are distributed as raw little-endian `f32` files, one per
//! stage, so the entry count of a stage is implied by the file length.

use std::fmt;
use std::path::Path;

use bytes::Buf;
use tracing::debug;

use crate::error::{QuantError, Result};
use crate::features::NB_BANDS;

/// Maximum number of VQ stages a codebook may carry
pub const MAX_STAGES: usize = 5;

/// Maximum number of entries in a single stage
pub const MAX_ENTRIES: usize = 4096;

/// Read-only access to multi-stage VQ centroids
pub trait Codebook: fmt::Debug + Send + Sync {
    /// Number of stages available
    fn num_stages(&self) -> usize;

    /// Number of entries in `stage`
    fn stage_size(&self, stage: usize) -> usize;

    /// Centroid `entry` of `stage`, one value per band
    ///
    /// # Panics
    ///
    /// Panics if `stage` or `entry` is out of range.
    fn centroid(&self, stage: usize, entry: usize) -> &[f32];

    /// Single centroid value
    fn value(&self, stage: usize, band: usize, entry: usize) -> f32 {
        self.centroid(stage, entry)[band]
    }
}

/// Owned in-memory codebook
#[derive(Clone, PartialEq)]
pub struct VqCodebook {
    stages: Vec<Vec<f32>>,
}

impl VqCodebook {
    /// Build a codebook from per-stage tables in entry-major order
    ///
    /// # Errors
    ///
    /// Returns an error if there are no stages, too many stages, or a stage
    /// is empty, ragged, or has more than [`MAX_ENTRIES`] entries.
    pub fn new(stages: Vec<Vec<f32>>) -> Result<Self> {
        if stages.is_empty() {
            return Err(QuantError::invalid_codebook("codebook has no stages"));
        }
        if stages.len() > MAX_STAGES {
            return Err(QuantError::invalid_codebook(format!(
                "{} stages exceeds the maximum of {}",
                stages.len(),
                MAX_STAGES
            )));
        }

        for (s, table) in stages.iter().enumerate() {
            if table.is_empty() || table.len() % NB_BANDS != 0 {
                return Err(QuantError::invalid_codebook(format!(
                    "stage {} holds {} values, not a non-zero multiple of {} bands",
                    s,
                    table.len(),
                    NB_BANDS
                )));
            }
            let entries = table.len() / NB_BANDS;
            if entries > MAX_ENTRIES {
                return Err(QuantError::invalid_codebook(format!(
                    "stage {} has {} entries, maximum is {}",
                    s, entries, MAX_ENTRIES
                )));
            }
            if let Some(pos) = table.iter().position(|v| !v.is_finite()) {
                return Err(QuantError::invalid_codebook(format!(
                    "stage {} entry {} band {} is not finite",
                    s,
                    pos / NB_BANDS,
                    pos % NB_BANDS
                )));
            }
        }

        Ok(Self { stages })
    }

    /// Build a codebook from raw little-endian `f32` stage tables
    ///
    /// # Errors
    ///
    /// Returns an error if a table length is not a whole number of `f32`
    /// values, or if the resulting tables are rejected by [`VqCodebook::new`].
    pub fn from_f32_bytes<B: AsRef<[u8]>>(stages: &[B]) -> Result<Self> {
        let mut tables = Vec::with_capacity(stages.len());
        for (s, raw) in stages.iter().enumerate() {
            let mut buf = raw.as_ref();
            if buf.len() % std::mem::size_of::<f32>() != 0 {
                return Err(QuantError::invalid_codebook(format!(
                    "stage {} is {} bytes, not a whole number of f32 values",
                    s,
                    buf.len()
                )));
            }
            let mut table = Vec::with_capacity(buf.len() / std::mem::size_of::<f32>());
            while buf.has_remaining() {
                table.push(buf.get_f32_le());
            }
            tables.push(table);
        }
        Self::new(tables)
    }

    /// Load one stage table per file
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file cannot be read, or a codebook error if
    /// its contents are malformed.
    pub fn from_f32_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut raw = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let data = std::fs::read(path).map_err(|e| QuantError::IoError {
                reason: format!("{}: {}", path.display(), e),
            })?;
            debug!(
                "Loaded VQ stage {} from {} ({} entries)",
                raw.len(),
                path.display(),
                data.len() / (NB_BANDS * std::mem::size_of::<f32>())
            );
            raw.push(data);
        }
        Self::from_f32_bytes(&raw)
    }

    /// Entry count of every stage
    pub fn stage_sizes(&self) -> Vec<usize> {
        self.stages.iter().map(|t| t.len() / NB_BANDS).collect()
    }
}

impl Codebook for VqCodebook {
    fn num_stages(&self) -> usize {
        self.stages.len()
    }

    fn stage_size(&self, stage: usize) -> usize {
        self.stages[stage].len() / NB_BANDS
    }

    fn centroid(&self, stage: usize, entry: usize) -> &[f32] {
        let start = entry * NB_BANDS;
        &self.stages[stage][start..start + NB_BANDS]
    }
}

impl fmt::Debug for VqCodebook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VqCodebook")
            .field("stage_sizes", &self.stage_sizes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn table(entries: usize, base: f32) -> Vec<f32> {
        (0..entries * NB_BANDS)
            .map(|i| base + i as f32)
            .collect()
    }

    #[test]
    fn test_codebook_lookup() {
        let cb = VqCodebook::new(vec![table(4, 0.0), table(2, 1000.0)]).unwrap();
        assert_eq!(cb.num_stages(), 2);
        assert_eq!(cb.stage_size(0), 4);
        assert_eq!(cb.stage_size(1), 2);
        assert_eq!(cb.stage_sizes(), vec![4, 2]);

        let c = cb.centroid(0, 3);
        assert_eq!(c.len(), NB_BANDS);
        assert_eq!(c[0], (3 * NB_BANDS) as f32);
        assert_eq!(cb.value(1, 5, 1), 1000.0 + (NB_BANDS + 5) as f32);
    }

    #[test]
    fn test_codebook_rejects_bad_tables() {
        assert!(VqCodebook::new(vec![]).is_err());
        assert!(VqCodebook::new(vec![vec![]]).is_err());
        assert!(VqCodebook::new(vec![vec![0.0; NB_BANDS + 1]]).is_err());
        assert!(VqCodebook::new(vec![table(MAX_ENTRIES + 1, 0.0)]).is_err());
        assert!(VqCodebook::new(vec![table(1, 0.0); MAX_STAGES + 1]).is_err());

        let mut bad = table(2, 0.0);
        bad[NB_BANDS + 3] = f32::NAN;
        let err = VqCodebook::new(vec![bad]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_codebook_from_le_bytes() {
        let values = table(2, -4.5);
        let mut raw = Vec::new();
        for v in &values {
            raw.put_f32_le(*v);
        }
        let cb = VqCodebook::from_f32_bytes(&[raw]).unwrap();
        assert_eq!(cb.stage_sizes(), vec![2]);
        assert_eq!(cb.centroid(1, 1)[0], values[NB_BANDS]);

        let truncated = vec![0u8; NB_BANDS * 4 + 3];
        assert!(VqCodebook::from_f32_bytes(&[truncated]).is_err());
    }

    #[test]
    fn test_codebook_from_files() {
        let dir = temp_dir::TempDir::new().unwrap();
        let mut paths = Vec::new();
        for (s, entries) in [16usize, 4].iter().enumerate() {
            let mut raw = Vec::new();
            for v in table(*entries, s as f32) {
                raw.put_f32_le(v);
            }
            let path = dir.child(format!("stage{}.f32", s));
            std::fs::write(&path, raw).unwrap();
            paths.push(path);
        }

        let cb = VqCodebook::from_f32_files(&paths).unwrap();
        assert_eq!(cb.stage_sizes(), vec![16, 4]);
        assert_eq!(cb.value(1, 0, 0), 1.0);

        let missing = dir.child("missing.f32");
        let err = VqCodebook::from_f32_files(&[missing]).unwrap_err();
        assert!(matches!(err, QuantError::IoError { .. }));
    }
}
