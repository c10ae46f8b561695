// src/parallel/mod.rs
//! Thread-parallel chunked multiplication
//!
//! Splits the output rows into fixed-size chunks and computes a partial
//! checksum per chunk on a dedicated worker pool, without materializing the
//! product matrix. The pool lives exactly as long as one run: it is built
//! before the timed section and dropped on every exit path.

use crate::kernels::{self, KernelError};
use crate::matrix::{Matrix, Scalar};
use rayon::prelude::*;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum ParallelError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    #[error("worker task failed: {source}")]
    WorkerTaskFailure {
        #[source]
        source: KernelError,
    },
}

/// Fixed-pool executor configuration. `workers` threads process row chunks
/// of `chunk_rows` rows; the final chunk may be shorter.
#[derive(Debug, Clone, Copy)]
pub struct ParallelExecutor {
    pub workers: usize,
    pub chunk_rows: usize,
}

impl ParallelExecutor {
    pub fn new(workers: usize, chunk_rows: usize) -> Self {
        Self {
            workers: workers.max(1),
            chunk_rows: chunk_rows.max(1),
        }
    }

    /// Run the chunked multiply and return (elapsed seconds, checksum).
    ///
    /// The checksum is the sum of per-chunk partials; summation order only
    /// matters up to f64 associativity, so callers compare with tolerance.
    /// A single failing task aborts the run and discards completed
    /// partials.
    pub fn run<T: Scalar>(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<(f64, f64), ParallelError> {
        kernels::ensure_multipliable(a, b)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let m = a.rows();
        let chunk = self.chunk_rows;
        let starts: Vec<usize> = (0..m).step_by(chunk).collect();

        let started = Instant::now();
        let checksum = pool.install(|| {
            starts
                .into_par_iter()
                .map(|start| {
                    let end = (start + chunk).min(m);
                    partial_checksum(a, b, start, end)
                        .map_err(|source| ParallelError::WorkerTaskFailure { source })
                })
                .try_reduce(|| 0.0, |x, y| Ok(x + y))
        })?;
        let elapsed = started.elapsed().as_secs_f64();

        Ok((elapsed, checksum))
    }
}

/// Checksum of the product rows in [start, end) using the naive inner
/// algorithm with double accumulation.
fn partial_checksum<T: Scalar>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    start: usize,
    end: usize,
) -> Result<f64, KernelError> {
    if end > a.rows() {
        return Err(KernelError::ShapeMismatch {
            lhs_rows: a.rows(),
            lhs_cols: a.cols(),
            rhs_rows: b.rows(),
            rhs_cols: b.cols(),
        });
    }

    let (n, p) = (a.cols(), b.cols());
    let mut sum = 0.0f64;
    for i in start..end {
        let a_row = a.row(i);
        for j in 0..p {
            let mut acc = 0.0f64;
            for k in 0..n {
                acc += a_row[k].to_f64() * b.at(k, j).to_f64();
            }
            sum += acc;
        }
    }
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::multiply_naive;

    fn assert_close(a: f64, b: f64) {
        let scale = 1.0f64.max(a.abs()).max(b.abs());
        assert!((a - b).abs() <= 1e-9 * scale, "expected {} ~ {}", a, b);
    }

    #[test]
    fn test_matches_naive_checksum() {
        let a: Matrix<f64> = Matrix::generate(13, 7, 0).unwrap();
        let b: Matrix<f64> = Matrix::generate(7, 5, 1).unwrap();
        let reference = multiply_naive(&a, &b).unwrap().checksum();

        let (_, checksum) = ParallelExecutor::new(4, 3).run(&a, &b).unwrap();
        assert_close(checksum, reference);
    }

    #[test]
    fn test_invariant_to_workers_and_chunking() {
        let a: Matrix<f64> = Matrix::generate(16, 8, 2).unwrap();
        let b: Matrix<f64> = Matrix::generate(8, 6, 3).unwrap();
        let (_, reference) = ParallelExecutor::new(1, 16).run(&a, &b).unwrap();

        // Chunk sizes include divisors, non-divisors and oversize chunks.
        for workers in [1, 2, 4, 8] {
            for chunk in [1, 3, 5, 16, 64] {
                let (_, checksum) = ParallelExecutor::new(workers, chunk).run(&a, &b).unwrap();
                assert_close(checksum, reference);
            }
        }
    }

    #[test]
    fn test_shape_mismatch_surfaces_before_tasks() {
        let a: Matrix<f64> = Matrix::generate(4, 4, 0).unwrap();
        let b: Matrix<f64> = Matrix::generate(5, 4, 1).unwrap();
        assert!(matches!(
            ParallelExecutor::new(2, 2).run(&a, &b),
            Err(ParallelError::Kernel(KernelError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn test_zero_arguments_are_clamped() {
        let exec = ParallelExecutor::new(0, 0);
        assert_eq!(exec.workers, 1);
        assert_eq!(exec.chunk_rows, 1);
    }
}
