// tests/parallel_executor_test.rs
//! Parallel executor invariance suite
//! The chunked-row checksum must match the naive reference and stay
//! invariant to worker count and chunking, divisor or not.

#[cfg(test)]
mod tests {
    use dmm_bench::kernels::multiply_naive;
    use dmm_bench::matrix::Matrix;
    use dmm_bench::parallel::ParallelExecutor;

    fn assert_close(a: f64, b: f64, context: &str) {
        let scale = 1.0f64.max(a.abs()).max(b.abs());
        assert!(
            (a - b).abs() <= 1e-6 * scale,
            "{}: expected {} ~ {}",
            context,
            a,
            b
        );
    }

    #[test]
    fn test_matches_naive_reference() {
        let a: Matrix<f64> = Matrix::generate(20, 10, 0).unwrap();
        let b: Matrix<f64> = Matrix::generate(10, 15, 1).unwrap();
        let reference = multiply_naive(&a, &b).unwrap().checksum();

        let (_, checksum) = ParallelExecutor::new(4, 6).run(&a, &b).unwrap();
        assert_close(checksum, reference, "parallel vs naive");
    }

    #[test]
    fn test_invariant_over_worker_and_chunk_grid() {
        let m = 17; // prime, so most chunk sizes do not divide it
        let a: Matrix<f64> = Matrix::generate(m, 9, 2).unwrap();
        let b: Matrix<f64> = Matrix::generate(9, 7, 3).unwrap();
        let reference = multiply_naive(&a, &b).unwrap().checksum();

        for workers in [1, 2, 3, 8] {
            for chunk in [1, 2, 4, 5, 17, 100] {
                let (_, checksum) = ParallelExecutor::new(workers, chunk).run(&a, &b).unwrap();
                assert_close(
                    checksum,
                    reference,
                    &format!("workers={} chunk={}", workers, chunk),
                );
            }
        }
    }

    #[test]
    fn test_single_row_matrix() {
        let a: Matrix<f64> = Matrix::generate(1, 8, 4).unwrap();
        let b: Matrix<f64> = Matrix::generate(8, 3, 5).unwrap();
        let reference = multiply_naive(&a, &b).unwrap().checksum();

        let (_, checksum) = ParallelExecutor::new(4, 16).run(&a, &b).unwrap();
        assert_close(checksum, reference, "single row");
    }

    #[test]
    fn test_float32_storage() {
        let a: Matrix<f32> = Matrix::generate(10, 10, 6).unwrap();
        let b: Matrix<f32> = Matrix::generate(10, 10, 7).unwrap();
        let reference = multiply_naive(&a, &b).unwrap().checksum();

        let (_, checksum) = ParallelExecutor::new(2, 3).run(&a, &b).unwrap();
        let scale = 1.0f64.max(reference.abs());
        assert!((checksum - reference).abs() <= 1e-4 * scale);
    }
}
