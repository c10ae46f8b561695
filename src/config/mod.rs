// src/config/mod.rs
//! Benchmark configuration
//! Handles TOML parsing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Storage precision of the benchmark matrices. Accumulation is always
/// double precision regardless of this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    #[serde(rename = "float32")]
    F32,
    #[serde(rename = "float64")]
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "float32"),
            DType::F64 => write!(f, "float64"),
        }
    }
}

/// One benchmark case: C = A(m*n) * B(n*p).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub m: usize,
    pub n: usize,
    pub p: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    pub strategies: Vec<String>,
    pub cases: Vec<Case>,
    pub dtype: DType,
    pub parallel: ParallelConfig,
    pub tiled: TiledConfig,
    pub sparse: SparseConfig,
    pub distributed: DistributedConfig,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    pub threads: usize,
    pub chunk_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiledConfig {
    pub tile_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseConfig {
    /// Magnitudes at or below this threshold are treated as zero when the
    /// dense operand is compressed to CSR.
    pub tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedConfig {
    pub block_size: usize,
    pub partitions: usize,
    pub scratch_dir: PathBuf,
    pub min_free_bytes: u64,
}

impl BenchConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;

        let config: BenchConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Default sweep: every strategy over two square cases in float32,
    /// matching the reference benchmark's defaults.
    pub fn default_sweep() -> Self {
        Self {
            strategies: crate::strategy::Strategy::all()
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
            cases: vec![
                Case {
                    m: 512,
                    n: 512,
                    p: 512,
                },
                Case {
                    m: 1024,
                    n: 1024,
                    p: 1024,
                },
            ],
            dtype: DType::F32,
            parallel: ParallelConfig {
                threads: 4,
                chunk_rows: 128,
            },
            tiled: TiledConfig { tile_size: 64 },
            sparse: SparseConfig { tolerance: 0.5 },
            distributed: DistributedConfig {
                block_size: 128,
                partitions: 8,
                scratch_dir: PathBuf::from("./scratch_tmp"),
                min_free_bytes: 6_000_000_000,
            },
            output_dir: PathBuf::from("./results"),
        }
    }

    /// Validate configuration for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategies.is_empty() {
            return Err(ConfigError::Validation(
                "At least one strategy is required".to_string(),
            ));
        }

        if self.cases.is_empty() {
            return Err(ConfigError::Validation(
                "At least one case is required".to_string(),
            ));
        }

        for case in &self.cases {
            if case.m == 0 || case.n == 0 || case.p == 0 {
                return Err(ConfigError::Validation(format!(
                    "Case dimensions must be positive, got {}x{}x{}",
                    case.m, case.n, case.p
                )));
            }
        }

        if self.parallel.threads == 0 {
            return Err(ConfigError::Validation(
                "Thread count must be > 0".to_string(),
            ));
        }

        if self.parallel.chunk_rows == 0 {
            return Err(ConfigError::Validation(
                "Chunk rows must be > 0".to_string(),
            ));
        }

        if self.tiled.tile_size == 0 {
            return Err(ConfigError::Validation(
                "Tile size must be > 0".to_string(),
            ));
        }

        if self.sparse.tolerance < 0.0 {
            return Err(ConfigError::Validation(format!(
                "Sparsity tolerance must be non-negative, got {}",
                self.sparse.tolerance
            )));
        }

        if self.distributed.block_size == 0 {
            return Err(ConfigError::Validation(
                "Block size must be > 0".to_string(),
            ));
        }

        if self.distributed.partitions == 0 {
            return Err(ConfigError::Validation(
                "Partition count must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Export configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save configuration to file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml_str = self.to_toml_string()?;
        std::fs::write(path.as_ref(), toml_str).map_err(ConfigError::Io)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}
