//! Host-side reference implementations, single threaded.
use crate::{BenchError, Matrix, Result};

fn check_output(out: &Matrix, expected: (usize, usize)) -> Result<()> {
    if out.shape() != expected {
        return Err(BenchError::DimensionMismatch {
            lhs: expected,
            rhs: out.shape(),
        });
    }
    Ok(())
}

/// C = A·B with the naive i, j, k loop nest.
///
/// `out` is zeroed first, then each cell accumulates over k in increasing
/// order. The device kernel sums in the same order.
pub fn matmul(a: &Matrix, b: &Matrix, out: &mut Matrix) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(BenchError::DimensionMismatch {
            lhs: a.shape(),
            rhs: b.shape(),
        });
    }
    check_output(out, (a.rows(), b.cols()))?;
    out.fill_zero();

    let (m, n, k) = (a.rows(), b.cols(), a.cols());
    for i in 0..m {
        for j in 0..n {
            for l in 0..k {
                out[(i, j)] += a.get(i, l) * b.get(l, j);
            }
        }
    }
    Ok(())
}

/// C[i][j] = A[i][j] * B[i][j]
pub fn elementwise_mul(a: &Matrix, b: &Matrix, out: &mut Matrix) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(BenchError::DimensionMismatch {
            lhs: a.shape(),
            rhs: b.shape(),
        });
    }
    check_output(out, a.shape())?;
    for ((c, &x), &y) in out
        .as_mut_slice()
        .iter_mut()
        .zip(a.as_slice())
        .zip(b.as_slice())
    {
        *c = x * y;
    }
    Ok(())
}
