// src/kernels/mod.rs
//! Numeric multiplication kernels
//!
//! Pure single-threaded kernels shared by every benchmark strategy: the
//! naive reference triple loop, its loop-order permutations, a cache-tiled
//! variant, and the CSR-by-dense product. Inner products always accumulate
//! in `f64` regardless of storage precision.

pub mod block;

pub use block::{block_add, block_add_assign, block_multiply, block_sum};

use crate::matrix::{CsrMatrix, Matrix, Scalar};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error("shape mismatch: left is {lhs_rows}x{lhs_cols}, right is {rhs_rows}x{rhs_cols}")]
    ShapeMismatch {
        lhs_rows: usize,
        lhs_cols: usize,
        rhs_rows: usize,
        rhs_cols: usize,
    },

    #[error("block size mismatch: got lengths {lhs} and {rhs}, expected {expected}")]
    BlockSizeMismatch {
        lhs: usize,
        rhs: usize,
        expected: usize,
    },

    #[error("tile size must be positive, got {tile}")]
    InvalidTileSize { tile: usize },
}

/// Loop nesting order for the ordered multiply. All three orders compute
/// the same product; they differ only in memory access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOrder {
    Ijk,
    Ikj,
    Jik,
}

pub(crate) fn ensure_multipliable<T: Scalar>(
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<(), KernelError> {
    if a.cols() != b.rows() {
        return Err(KernelError::ShapeMismatch {
            lhs_rows: a.rows(),
            lhs_cols: a.cols(),
            rhs_rows: b.rows(),
            rhs_cols: b.cols(),
        });
    }
    Ok(())
}

/// Reference product: i-j-k triple loop, O(m*n*p).
pub fn multiply_naive<T: Scalar>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, KernelError> {
    multiply_ordered(a, b, LoopOrder::Ijk)
}

/// Product with an explicit loop nesting order. Results agree with the
/// naive kernel up to floating rounding for every order.
pub fn multiply_ordered<T: Scalar>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    order: LoopOrder,
) -> Result<Matrix<T>, KernelError> {
    ensure_multipliable(a, b)?;
    let (m, n, p) = (a.rows(), a.cols(), b.cols());
    let mut c = Matrix::zeros(m, p);

    match order {
        LoopOrder::Ijk => {
            for i in 0..m {
                for j in 0..p {
                    let mut acc = 0.0f64;
                    for k in 0..n {
                        acc += a.at(i, k).to_f64() * b.at(k, j).to_f64();
                    }
                    c.set(i, j, T::from_f64(acc));
                }
            }
        }
        LoopOrder::Ikj => {
            for i in 0..m {
                for k in 0..n {
                    let aik = a.at(i, k).to_f64();
                    for j in 0..p {
                        let cur = c.at(i, j).to_f64();
                        c.set(i, j, T::from_f64(cur + aik * b.at(k, j).to_f64()));
                    }
                }
            }
        }
        LoopOrder::Jik => {
            for j in 0..p {
                for i in 0..m {
                    let mut acc = 0.0f64;
                    for k in 0..n {
                        acc += a.at(i, k).to_f64() * b.at(k, j).to_f64();
                    }
                    c.set(i, j, T::from_f64(acc));
                }
            }
        }
    }

    Ok(c)
}

/// Cache-tiled product over cubic tiles of side `tile`. Each output cell
/// accumulates once per k-tile; partial edge tiles are handled by the
/// `min` bounds, so any positive tile size is valid.
pub fn multiply_tiled<T: Scalar>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    tile: usize,
) -> Result<Matrix<T>, KernelError> {
    ensure_multipliable(a, b)?;
    if tile == 0 {
        return Err(KernelError::InvalidTileSize { tile });
    }
    let (m, n, p) = (a.rows(), a.cols(), b.cols());
    let mut c: Matrix<T> = Matrix::zeros(m, p);

    for ii in (0..m).step_by(tile) {
        for jj in (0..p).step_by(tile) {
            for kk in (0..n).step_by(tile) {
                let i_end = (ii + tile).min(m);
                let j_end = (jj + tile).min(p);
                let k_end = (kk + tile).min(n);

                for i in ii..i_end {
                    for j in jj..j_end {
                        let mut acc = 0.0f64;
                        for k in kk..k_end {
                            acc += a.at(i, k).to_f64() * b.at(k, j).to_f64();
                        }
                        let cur = c.at(i, j).to_f64();
                        c.set(i, j, T::from_f64(cur + acc));
                    }
                }
            }
        }
    }

    Ok(c)
}

/// CSR-by-dense product: walks only the stored nonzeros of each row and
/// scales the matching rows of `b` into the output row, O(nnz*p).
pub fn multiply_sparse_dense<T: Scalar>(
    a: &CsrMatrix<T>,
    b: &Matrix<T>,
) -> Result<Matrix<T>, KernelError> {
    if a.cols() != b.rows() {
        return Err(KernelError::ShapeMismatch {
            lhs_rows: a.rows(),
            lhs_cols: a.cols(),
            rhs_rows: b.rows(),
            rhs_cols: b.cols(),
        });
    }
    let (m, p) = (a.rows(), b.cols());
    let mut c = Matrix::zeros(m, p);
    let mut acc = vec![0.0f64; p];

    for i in 0..m {
        acc.fill(0.0);
        for (col, v) in a.row_entries(i) {
            let av = v.to_f64();
            let b_row = b.row(col);
            for (j, &bv) in b_row.iter().enumerate() {
                acc[j] += av * bv.to_f64();
            }
        }
        for (j, &sum) in acc.iter().enumerate() {
            c.set(i, j, T::from_f64(sum));
        }
    }

    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        let scale = 1.0f64.max(a.abs()).max(b.abs());
        assert!(
            (a - b).abs() <= tol * scale,
            "expected {} ~ {} (tol {})",
            a,
            b,
            tol
        );
    }

    fn two_by_two() -> (Matrix<f64>, Matrix<f64>) {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::from_vec(2, 2, vec![5.0, 6.0, 7.0, 8.0]).unwrap();
        (a, b)
    }

    #[test]
    fn test_naive_two_by_two() {
        let (a, b) = two_by_two();
        let c = multiply_naive(&a, &b).unwrap();

        assert_eq!(c.at(0, 0), 19.0);
        assert_eq!(c.at(0, 1), 22.0);
        assert_eq!(c.at(1, 0), 43.0);
        assert_eq!(c.at(1, 1), 50.0);
        assert_eq!(c.checksum(), 134.0);
    }

    #[test]
    fn test_identity_preserves_checksum() {
        let id: Matrix<f64> = Matrix::identity(4).unwrap();
        let b: Matrix<f64> = Matrix::generate(4, 4, 9).unwrap();
        let c = multiply_naive(&id, &b).unwrap();
        assert_close(c.checksum(), b.checksum(), 1e-12);
    }

    #[test]
    fn test_loop_orders_agree() {
        let a: Matrix<f64> = Matrix::generate(7, 5, 1).unwrap();
        let b: Matrix<f64> = Matrix::generate(5, 9, 2).unwrap();
        let reference = multiply_ordered(&a, &b, LoopOrder::Ijk).unwrap();

        for order in [LoopOrder::Ikj, LoopOrder::Jik] {
            let c = multiply_ordered(&a, &b, order).unwrap();
            assert_close(c.checksum(), reference.checksum(), 1e-9);
            for i in 0..c.rows() {
                for j in 0..c.cols() {
                    assert_close(c.at(i, j), reference.at(i, j), 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_tiled_matches_naive_for_any_tile() {
        let a: Matrix<f64> = Matrix::generate(6, 10, 3).unwrap();
        let b: Matrix<f64> = Matrix::generate(10, 4, 4).unwrap();
        let reference = multiply_naive(&a, &b).unwrap();

        // Includes divisors, non-divisors and tiles larger than any dim.
        for tile in [1, 2, 3, 5, 7, 10, 64] {
            let c = multiply_tiled(&a, &b, tile).unwrap();
            assert_close(c.checksum(), reference.checksum(), 1e-9);
        }
    }

    #[test]
    fn test_tile_zero_rejected() {
        let (a, b) = two_by_two();
        assert_eq!(
            multiply_tiled(&a, &b, 0),
            Err(KernelError::InvalidTileSize { tile: 0 })
        );
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let a: Matrix<f64> = Matrix::generate(3, 4, 0).unwrap();
        let b: Matrix<f64> = Matrix::generate(5, 2, 1).unwrap();
        assert!(matches!(
            multiply_naive(&a, &b),
            Err(KernelError::ShapeMismatch { lhs_cols: 4, rhs_rows: 5, .. })
        ));
    }

    #[test]
    fn test_sparse_dense_matches_naive() {
        let a: Matrix<f64> = Matrix::generate_uniform(8, 6, 5).unwrap();
        let b: Matrix<f64> = Matrix::generate_uniform(6, 7, 6).unwrap();

        // tol = 0 keeps every entry, so the CSR product is exactly naive.
        let csr = CsrMatrix::from_dense(&a, 0.0);
        let sparse = multiply_sparse_dense(&csr, &b).unwrap();
        let dense = multiply_naive(&a, &b).unwrap();

        assert_close(sparse.checksum(), dense.checksum(), 1e-9);
    }

    #[test]
    fn test_sparse_dense_all_zero_input() {
        let zero: Matrix<f64> = Matrix::zeros(4, 4);
        let b: Matrix<f64> = Matrix::generate(4, 4, 8).unwrap();
        let csr = CsrMatrix::from_dense(&zero, 1e-9);

        let c = multiply_sparse_dense(&csr, &b).unwrap();
        assert_eq!(c.checksum(), 0.0);
    }

    #[test]
    fn test_float32_storage_double_accumulation() {
        let a: Matrix<f32> = Matrix::generate(5, 5, 10).unwrap();
        let b: Matrix<f32> = Matrix::generate(5, 5, 11).unwrap();

        let naive = multiply_naive(&a, &b).unwrap();
        let tiled = multiply_tiled(&a, &b, 2).unwrap();
        assert_close(naive.checksum(), tiled.checksum(), 1e-5);
    }
}
