use crate::{BenchError, Result};

/// # Matrix
///
/// A dense row-major matrix of `f32`, backed by a single contiguous allocation.
#[derive(Clone)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(BenchError::DimensionMismatch {
                lhs: (rows, cols),
                rhs: (data.len(), 1),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_rows<const C: usize>(rows: &[[f32; C]]) -> Self {
        Self {
            rows: rows.len(),
            cols: C,
            data: rows.iter().flatten().copied().collect(),
        }
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn n_bytes(&self) -> usize {
        self.numel() * std::mem::size_of::<f32>()
    }

    /// Side length if the matrix is square.
    pub fn dim(&self) -> Option<usize> {
        (self.rows == self.cols).then_some(self.rows)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn fill_zero(&mut self) {
        self.data.fill(0.0);
    }

    /// Tolerance-based comparison, used to describe a mismatch.
    pub fn all_close(&self, other: &Self, atol: f32, rtol: f32) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(BenchError::DimensionMismatch {
                lhs: self.shape(),
                rhs: other.shape(),
            });
        }
        let mut fail_cnt = 0;
        let mut total_error = 0f32;
        let mut mae = -1f32;
        let mut mae_idx = (0, 0);
        for (idx, (&a, &b)) in self.data.iter().zip(other.data.iter()).enumerate() {
            let abs_diff = (a - b).abs();
            if abs_diff > mae {
                mae = abs_diff;
                mae_idx = (idx / self.cols, idx % self.cols);
            }
            total_error += abs_diff;

            if !((a.is_nan() && b.is_nan())
                || (a.is_infinite() && b.is_infinite() && a.signum() == b.signum())
                || abs_diff <= atol + rtol * b.abs())
            {
                log::trace!(
                    "Mismatch at {:?}: {:?} != {:?} (atol={}, rtol={})",
                    (idx / self.cols, idx % self.cols),
                    a,
                    b,
                    atol,
                    rtol
                );
                fail_cnt += 1;
            }
        }
        let avg_error = total_error / self.numel().max(1) as f32;
        if fail_cnt > 0 {
            Err(BenchError::NotClose(format!(
                "{} samples not close - AVGE={} MAE={} at {:?}",
                fail_cnt, avg_error, mae, mae_idx
            )))
        } else {
            log::debug!("All close - AVGE={} MAE={} at {:?}", avg_error, mae, mae_idx);
            Ok(())
        }
    }
}

impl std::ops::Index<(usize, usize)> for Matrix {
    type Output = f32;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.data[row * self.cols + col]
    }
}

impl std::ops::IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        &mut self.data[row * self.cols + col]
    }
}

impl std::fmt::Debug for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

impl std::fmt::Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.rows {
            for value in self.row(i) {
                write!(f, "{:6.1}   ", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn row_major_layout() {
        let m = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(m.get(1, 2), 6.0);
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m.dim(), None);
        assert_eq!(m.n_bytes(), 24);
    }

    #[test]
    pub fn from_vec_checks_length() {
        assert!(matches!(
            Matrix::from_vec(2, 2, vec![0.0; 3]),
            Err(BenchError::DimensionMismatch { .. })
        ));
    }

    #[test]
    pub fn set_and_fill() {
        let mut m = Matrix::from_fn(3, 3, |i, j| (i * 3 + j) as f32);
        assert_eq!(m.dim(), Some(3));
        m.set(2, 2, -1.0);
        m[(0, 0)] = 7.0;
        assert_eq!(m.get(2, 2), -1.0);
        assert_eq!(m.get(0, 0), 7.0);
        m.fill_zero();
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    pub fn display_dump() {
        let m = Matrix::from_rows(&[[1.0, 2.5]]);
        assert_eq!(m.to_string(), "   1.0      2.5   \n");
    }

    #[test]
    pub fn all_close_tolerance() {
        let a = Matrix::from_rows(&[[1.0, 2.0]]);
        let b = Matrix::from_rows(&[[1.0, 2.000001]]);
        let c = Matrix::from_rows(&[[1.0, 3.0]]);
        assert!(a.all_close(&b, 1e-5, 1e-5).is_ok());
        assert!(a.all_close(&c, 1e-5, 1e-5).is_err());
        assert!(a.all_close(&Matrix::zeros(2, 1), 1e-5, 1e-5).is_err());
    }
}
