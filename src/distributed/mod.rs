// src/distributed/mod.rs
//! Distributed-style partitioned multiplication engines
//!
//! Two map/cogroup/reduce pipelines over seeded fragments, executed on a
//! per-run fixed worker pool standing in for an external scheduler. Every
//! unit of work is stateless and idempotent; cross-unit combination happens
//! only through key-based grouping and associative reduction, so the
//! pipelines need no locks and tolerate re-execution of any unit.
//!
//! The block engine decomposes both operands into a grid of bs*bs blocks
//! that are generated independently per logical partition, joined on the
//! shared inner-block index, multiplied pairwise and reduced per output
//! block. Neither operand is ever materialized in one place.

use crate::kernels::block::{block_add_assign, block_multiply, block_sum};
use crate::kernels::KernelError;
use crate::matrix::{Matrix, MatrixError, Scalar};
use crate::metrics::MetricsCollector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use std::collections::HashMap;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Instant;
use sysinfo::Disks;

/// Base seed for per-row fragments of the row engine's A operand.
const ROW_BASE_SEED: u64 = 1000;
/// Base seeds for per-block fragments, one per operand role.
const A_BLOCK_BASE_SEED: u64 = 2000;
const B_BLOCK_BASE_SEED: u64 = 3000;
/// Seed of the row engine's shared (broadcast) B operand.
const BROADCAST_SEED: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("dimensions {m}x{n}x{p} are not divisible by block size {block_size}")]
    BlockSizeNotDivisible {
        m: usize,
        n: usize,
        p: usize,
        block_size: usize,
    },

    #[error("insufficient scratch space: {available} bytes available, {required} required")]
    InsufficientScratchSpace { available: u64, required: u64 },

    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    #[error("worker task failed: {source}")]
    WorkerTaskFailure {
        #[source]
        source: KernelError,
    },

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// Outcome of one engine run.
#[derive(Debug, Clone, Copy)]
pub struct EngineRun {
    pub elapsed_sec: f64,
    pub checksum: f64,
    pub metrics: MetricsCollector,
}

/// Operand role of a generated fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    A,
    B,
}

impl Role {
    fn base_seed(self) -> u64 {
        match self {
            Role::A => A_BLOCK_BASE_SEED,
            Role::B => B_BLOCK_BASE_SEED,
        }
    }
}

/// Content of block `index` (linear over the role's block grid). The seed
/// depends on the block alone, never on the partition that generates it,
/// so content is invariant to the partition count.
pub fn block_data<T: Scalar>(role: Role, index: usize, bs: usize) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(role.base_seed() + index as u64);
    (0..bs * bs)
        .map(|_| T::from_f64(rng.sample(StandardNormal)))
        .collect()
}

/// Content of row `index` of the row engine's A operand.
pub fn row_data<T: Scalar>(index: usize, n: usize) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(ROW_BASE_SEED + index as u64);
    (0..n)
        .map(|_| T::from_f64(rng.sample(StandardNormal)))
        .collect()
}

/// Contiguous slice of a linear index space owned by partition `pi`.
fn partition_slice(total: usize, pi: usize, parts: usize) -> std::ops::Range<usize> {
    (total * pi) / parts..(total * (pi + 1)) / parts
}

/// A generated block tagged with its cross index (row-block for A,
/// column-block for B); the join key k is carried alongside.
struct Fragment<T> {
    cross: usize,
    data: Vec<T>,
}

/// Block-partitioned engine: block grid of side `block_size`, fragment
/// generation sliced across `partitions` logical partitions.
#[derive(Debug, Clone, Copy)]
pub struct BlockEngine {
    pub block_size: usize,
    pub partitions: usize,
}

impl BlockEngine {
    pub fn new(block_size: usize, partitions: usize) -> Self {
        Self {
            block_size,
            partitions: partitions.max(1),
        }
    }

    /// Run the full pipeline for an m*n by n*p product. Fails with
    /// `BlockSizeNotDivisible` before any block is generated if the grid
    /// does not tile the dimensions exactly.
    pub fn run<T: Scalar>(&self, m: usize, n: usize, p: usize) -> Result<EngineRun, EngineError> {
        let bs = self.block_size;
        if bs == 0 || m % bs != 0 || n % bs != 0 || p % bs != 0 {
            return Err(EngineError::BlockSizeNotDivisible {
                m,
                n,
                p,
                block_size: bs,
            });
        }
        let (nb_i, nb_k, nb_j) = (m / bs, n / bs, p / bs);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.partitions)
            .build()?;

        let started = Instant::now();
        let outcome = pool.install(|| self.execute::<T>(nb_i, nb_k, nb_j));
        let elapsed_sec = started.elapsed().as_secs_f64();

        let (checksum, metrics) = outcome?;
        Ok(EngineRun {
            elapsed_sec,
            checksum,
            metrics,
        })
    }

    fn execute<T: Scalar>(
        &self,
        nb_i: usize,
        nb_k: usize,
        nb_j: usize,
    ) -> Result<(f64, MetricsCollector), EngineError> {
        let bs = self.block_size;
        let parts = self.partitions;
        let block_bytes = (bs * bs * mem::size_of::<T>()) as u64;

        // Stage 1: each partition generates its slice of both block grids.
        let generated: Vec<(Vec<(usize, Fragment<T>)>, Vec<(usize, Fragment<T>)>, MetricsCollector)> =
            (0..parts)
                .into_par_iter()
                .map(|pi| {
                    let a = a_fragments::<T>(pi, parts, nb_i, nb_k, bs);
                    let b = b_fragments::<T>(pi, parts, nb_k, nb_j, bs);
                    let metrics = MetricsCollector {
                        tasks: 1,
                        fragments: (a.len() + b.len()) as u64,
                        generated_bytes: (a.len() + b.len()) as u64 * block_bytes,
                        ..MetricsCollector::default()
                    };
                    (a, b, metrics)
                })
                .collect();

        // Stage 2: cogroup fragments of both roles on the inner index k.
        let mut metrics = MetricsCollector::new();
        let mut groups: HashMap<usize, (Vec<Fragment<T>>, Vec<Fragment<T>>)> = HashMap::new();
        for (a_frags, b_frags, m) in generated {
            metrics = metrics.merge(m);
            for (k, frag) in a_frags {
                groups.entry(k).or_default().0.push(frag);
            }
            for (k, frag) in b_frags {
                groups.entry(k).or_default().1.push(frag);
            }
        }

        // Stage 3: per key, every A-block pairs with every B-block.
        let groups: Vec<(Vec<Fragment<T>>, Vec<Fragment<T>>)> = groups.into_values().collect();
        let products: Vec<(Vec<((usize, usize), Vec<T>)>, MetricsCollector)> = groups
            .into_par_iter()
            .map(|(a_list, b_list)| {
                let mut out = Vec::with_capacity(a_list.len() * b_list.len());
                for a in &a_list {
                    for b in &b_list {
                        let product = block_multiply(&a.data, &b.data, bs)
                            .map_err(|source| EngineError::WorkerTaskFailure { source })?;
                        out.push(((a.cross, b.cross), product));
                    }
                }
                let metrics = MetricsCollector {
                    tasks: 1,
                    shuffle_bytes: (a_list.len() + b_list.len()) as u64 * block_bytes,
                    pairs_multiplied: out.len() as u64,
                    ..MetricsCollector::default()
                };
                Ok((out, metrics))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        // Stage 4: reduce partial products per (row-block, column-block).
        let mut blocks: HashMap<(usize, usize), Vec<T>> = HashMap::new();
        for (list, m) in products {
            metrics = metrics.merge(m);
            for (key, product) in list {
                match blocks.entry(key) {
                    std::collections::hash_map::Entry::Occupied(mut e) => {
                        block_add_assign(e.get_mut(), &product)
                            .map_err(|source| EngineError::WorkerTaskFailure { source })?;
                    }
                    std::collections::hash_map::Entry::Vacant(e) => {
                        e.insert(product);
                    }
                }
            }
        }
        metrics.tasks += 1;
        metrics.output_blocks = blocks.len() as u64;
        metrics.result_bytes = blocks.len() as u64 * block_bytes;

        // Stage 5: per-block sums collapse into the final checksum.
        let checksum = blocks.values().map(|b| block_sum(b)).sum();
        Ok((checksum, metrics))
    }

    /// Materialize the operands the pipeline generates, block by block.
    /// The engines never need this; it exists so the result can be checked
    /// against the dense reference product.
    pub fn assemble_operands<T: Scalar>(
        &self,
        m: usize,
        n: usize,
        p: usize,
    ) -> Result<(Matrix<T>, Matrix<T>), EngineError> {
        let bs = self.block_size;
        if bs == 0 || m % bs != 0 || n % bs != 0 || p % bs != 0 {
            return Err(EngineError::BlockSizeNotDivisible {
                m,
                n,
                p,
                block_size: bs,
            });
        }
        let (nb_i, nb_k, nb_j) = (m / bs, n / bs, p / bs);

        let mut a = Matrix::zeros(m, n);
        for t in 0..nb_i * nb_k {
            let (bi, bk) = (t / nb_k, t % nb_k);
            place_block(&mut a, &block_data::<T>(Role::A, t, bs), bi * bs, bk * bs, bs);
        }

        let mut b = Matrix::zeros(n, p);
        for t in 0..nb_k * nb_j {
            let (bk, bj) = (t / nb_j, t % nb_j);
            place_block(&mut b, &block_data::<T>(Role::B, t, bs), bk * bs, bj * bs, bs);
        }

        Ok((a, b))
    }
}

fn a_fragments<T: Scalar>(
    pi: usize,
    parts: usize,
    nb_i: usize,
    nb_k: usize,
    bs: usize,
) -> Vec<(usize, Fragment<T>)> {
    partition_slice(nb_i * nb_k, pi, parts)
        .map(|t| {
            let (i, k) = (t / nb_k, t % nb_k);
            (
                k,
                Fragment {
                    cross: i,
                    data: block_data::<T>(Role::A, t, bs),
                },
            )
        })
        .collect()
}

fn b_fragments<T: Scalar>(
    pi: usize,
    parts: usize,
    nb_k: usize,
    nb_j: usize,
    bs: usize,
) -> Vec<(usize, Fragment<T>)> {
    partition_slice(nb_k * nb_j, pi, parts)
        .map(|t| {
            let (k, j) = (t / nb_j, t % nb_j);
            (
                k,
                Fragment {
                    cross: j,
                    data: block_data::<T>(Role::B, t, bs),
                },
            )
        })
        .collect()
}

fn place_block<T: Scalar>(target: &mut Matrix<T>, block: &[T], row0: usize, col0: usize, bs: usize) {
    for i in 0..bs {
        for j in 0..bs {
            target.set(row0 + i, col0 + j, block[i * bs + j]);
        }
    }
}

/// Row-partitioned engine: partitions generate contiguous row ranges of A
/// while B is generated once and shared read-only by every task.
#[derive(Debug, Clone, Copy)]
pub struct RowEngine {
    pub partitions: usize,
}

impl RowEngine {
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }

    pub fn run<T: Scalar>(&self, m: usize, n: usize, p: usize) -> Result<EngineRun, EngineError> {
        let parts = self.partitions;
        let pool = rayon::ThreadPoolBuilder::new().num_threads(parts).build()?;

        let started = Instant::now();
        let outcome = pool.install(|| self.execute::<T>(m, n, p, parts));
        let elapsed_sec = started.elapsed().as_secs_f64();

        let (checksum, metrics) = outcome?;
        Ok(EngineRun {
            elapsed_sec,
            checksum,
            metrics,
        })
    }

    fn execute<T: Scalar>(
        &self,
        m: usize,
        n: usize,
        p: usize,
        parts: usize,
    ) -> Result<(f64, MetricsCollector), EngineError> {
        let broadcast = Matrix::<T>::generate(n, p, BROADCAST_SEED)?;
        let rows_per_part = (m + parts - 1) / parts;

        let partials: Vec<(f64, MetricsCollector)> = (0..parts)
            .into_par_iter()
            .map(|pi| {
                let start = (pi * rows_per_part).min(m);
                let end = (start + rows_per_part).min(m);

                let mut sum = 0.0f64;
                for i in start..end {
                    let row = row_data::<T>(i, n);
                    for j in 0..p {
                        let mut acc = 0.0f64;
                        for (k, &av) in row.iter().enumerate() {
                            acc += av.to_f64() * broadcast.at(k, j).to_f64();
                        }
                        sum += acc;
                    }
                }

                let metrics = MetricsCollector {
                    tasks: 1,
                    fragments: (end - start) as u64,
                    generated_bytes: ((end - start) * n * mem::size_of::<T>()) as u64,
                    ..MetricsCollector::default()
                };
                (sum, metrics)
            })
            .collect();

        let checksum = partials.iter().map(|(s, _)| s).sum();
        let metrics = partials.into_iter().map(|(_, m)| m).sum();
        Ok((checksum, metrics))
    }

    /// Materialize the row engine's operands for validation against the
    /// dense reference product.
    pub fn assemble_operands<T: Scalar>(
        &self,
        m: usize,
        n: usize,
        p: usize,
    ) -> Result<(Matrix<T>, Matrix<T>), EngineError> {
        let mut data = Vec::with_capacity(m * n);
        for i in 0..m {
            data.extend(row_data::<T>(i, n));
        }
        let a = Matrix::from_vec(m, n, data)?;
        let b = Matrix::<T>::generate(n, p, BROADCAST_SEED)?;
        Ok((a, b))
    }
}

/// Free bytes on the filesystem holding `path`, resolved against the
/// longest matching mount point. Paths outside every known mount report 0.
pub fn free_scratch_bytes(path: &Path) -> u64 {
    let abs: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|d| abs.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| d.available_space())
        .unwrap_or(0)
}

/// Pre-flight probe run before a distributed strategy starts: read-only,
/// synchronous, never writes. Insufficient space means the run is skipped,
/// not attempted.
pub fn ensure_scratch_capacity(path: &Path, min_free_bytes: u64) -> Result<u64, EngineError> {
    let available = free_scratch_bytes(path);
    if available < min_free_bytes {
        return Err(EngineError::InsufficientScratchSpace {
            available,
            required: min_free_bytes,
        });
    }
    Ok(available)
}
