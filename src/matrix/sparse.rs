// src/matrix/sparse.rs
//! Compressed sparse row (CSR) storage
//!
//! Built once from a dense matrix by a magnitude threshold and immutable
//! afterwards. Three parallel arrays: nonzero values in row-major nonzero
//! order, their column indices, and rows+1 offsets into both.

use crate::matrix::{Matrix, Scalar};

#[derive(Debug, Clone)]
pub struct CsrMatrix<T: Scalar> {
    rows: usize,
    cols: usize,
    values: Vec<T>,
    col_idx: Vec<usize>,
    row_start: Vec<usize>,
}

impl<T: Scalar> CsrMatrix<T> {
    /// Two-pass conversion: count magnitudes above `tol`, then fill.
    /// An all-zero input yields nnz = 0 and an all-zero offset array.
    pub fn from_dense(dense: &Matrix<T>, tol: f64) -> Self {
        let rows = dense.rows();
        let cols = dense.cols();

        let mut nnz = 0;
        for &v in dense.as_slice() {
            if v.to_f64().abs() > tol {
                nnz += 1;
            }
        }

        let mut values = Vec::with_capacity(nnz);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut row_start = vec![0usize; rows + 1];

        for i in 0..rows {
            row_start[i] = values.len();
            for (j, &v) in dense.row(i).iter().enumerate() {
                if v.to_f64().abs() > tol {
                    values.push(v);
                    col_idx.push(j);
                }
            }
        }
        row_start[rows] = values.len();

        Self {
            rows,
            cols,
            values,
            col_idx,
            row_start,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn density(&self) -> f64 {
        self.nnz() as f64 / (self.rows * self.cols) as f64
    }

    /// Nonzero entries of row `i` as (column, value) pairs.
    #[inline]
    pub fn row_entries(&self, i: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let span = self.row_start[i]..self.row_start[i + 1];
        self.col_idx[span.clone()]
            .iter()
            .copied()
            .zip(self.values[span].iter().copied())
    }
}
