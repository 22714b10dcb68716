use crate::Matrix;

/// Exact comparison: same shape and identical bit patterns in every cell.
///
/// Only meaningful when both sides were produced with the same summation
/// order. `0.0` and `-0.0` compare unequal, identical NaNs compare equal.
pub fn bit_equal(a: &Matrix, b: &Matrix) -> bool {
    a.shape() == b.shape()
        && a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .all(|(x, y)| x.to_bits() == y.to_bits())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Equal,
    NotEqual,
}

impl Verdict {
    pub fn of(a: &Matrix, b: &Matrix) -> Self {
        if bit_equal(a, b) {
            Verdict::Equal
        } else {
            Verdict::NotEqual
        }
    }

    pub fn is_equal(self) -> bool {
        self == Verdict::Equal
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Equal => write!(f, "Matrices are equal"),
            Verdict::NotEqual => write!(f, "Matrices are not equal"),
        }
    }
}
