//! The matrix kernels themselves.

use crate::{ComputeError, Matrix};

/// Multiply `a * b`. Fails on an empty operand or when the inner dimensions
/// disagree.
pub fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix, ComputeError> {
    if a.first().map_or(true, Vec::is_empty) || b.first().map_or(true, Vec::is_empty) {
        return Err(ComputeError::InvalidInput(
            "empty matrix operand".to_string(),
        ));
    }
    let (rows_a, cols_a) = (a.len(), a[0].len());
    let (rows_b, cols_b) = (b.len(), b[0].len());
    if cols_a != rows_b {
        return Err(ComputeError::DimensionMismatch {
            rows_a,
            cols_a,
            rows_b,
            cols_b,
        });
    }

    let mut out = vec![vec![0i64; cols_b]; rows_a];
    for i in 0..rows_a {
        for j in 0..cols_b {
            let mut acc = 0i64;
            for k in 0..cols_a {
                acc += a[i][k] * b[k][j];
            }
            out[i][j] = acc;
        }
    }
    Ok(out)
}

/// Transpose a matrix. An empty matrix transposes to an empty matrix.
#[must_use]
pub fn transpose(m: &Matrix) -> Matrix {
    if m.first().map_or(true, Vec::is_empty) {
        return Matrix::new();
    }
    let (rows, cols) = (m.len(), m[0].len());
    let mut out = vec![vec![0i64; rows]; cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j][i] = m[i][j];
        }
    }
    out
}
