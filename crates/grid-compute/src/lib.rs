//! # Grid-Compute: Matrix Task Kernels
//!
//! Pure, sequential matrix routines executed by MatrixGrid workers. This
//! crate has no protocol or concurrency concerns: it maps a task type and a
//! textual operand encoding to a textual result.
//!
//! ## Matrix Text Format
//!
//! Rows are separated by `\`, columns by `,`; the two multiply operands are
//! separated by `|`:
//!
//! ```text
//! 1,2\3,4      ->  [[1,2],[3,4]]
//! 1,2|3\4      ->  A=[[1,2]]  B=[[3],[4]]
//! ```
//!
//! The payload escaping layer in `grid-protocol` keeps these separators from
//! ever clashing with the outer wire framing.

pub mod tasks;

use thiserror::Error;

pub use tasks::{multiply, transpose};

/// Task type tag for matrix multiplication. Data: `A|B`.
pub const TASK_MATRIX_MULTIPLY: &str = "MATRIX_MULTIPLY";

/// Task type tag for block transpose. Data: one matrix.
pub const TASK_BLOCK_TRANSPOSE: &str = "BLOCK_TRANSPOSE";

/// Compute-side failures, reported back to the master verbatim.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid matrix data: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: {rows_a}x{cols_a} * {rows_b}x{cols_b}")]
    DimensionMismatch {
        rows_a: usize,
        cols_a: usize,
        rows_b: usize,
        cols_b: usize,
    },

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),
}

/// A dense integer matrix, row-major, with uniform row lengths.
pub type Matrix = Vec<Vec<i64>>;

/// Execute one task by type tag, returning the encoded result text.
pub fn run_task(task_type: &str, data: &str) -> Result<String, ComputeError> {
    match task_type {
        TASK_MATRIX_MULTIPLY => {
            let (a, b) = parse_operand_pair(data)?;
            let product = multiply(&a, &b)?;
            Ok(format_matrix(&product))
        }
        TASK_BLOCK_TRANSPOSE => {
            let m = parse_matrix(data)?;
            Ok(format_matrix(&transpose(&m)))
        }
        other => Err(ComputeError::UnknownTaskType(other.to_string())),
    }
}

/// Parse a `A|B` operand pair for multiplication.
pub fn parse_operand_pair(data: &str) -> Result<(Matrix, Matrix), ComputeError> {
    let (a, b) = data.split_once('|').ok_or_else(|| {
        ComputeError::InvalidInput("expected two operands separated by '|'".to_string())
    })?;
    Ok((parse_matrix(a)?, parse_matrix(b)?))
}

/// Parse one matrix from `\`-separated rows of `,`-separated integers.
pub fn parse_matrix(text: &str) -> Result<Matrix, ComputeError> {
    let mut matrix = Vec::new();
    for row_text in text.split('\\') {
        let mut row = Vec::new();
        for cell in row_text.split(',') {
            let value = cell.trim().parse::<i64>().map_err(|_| {
                ComputeError::InvalidInput(format!("non-numeric cell: {cell:?}"))
            })?;
            row.push(value);
        }
        matrix.push(row);
    }
    let width = matrix[0].len();
    if matrix.iter().any(|row| row.len() != width) {
        return Err(ComputeError::InvalidInput(
            "ragged rows: all rows must have the same length".to_string(),
        ));
    }
    Ok(matrix)
}

/// Format a matrix back into the wire text form.
#[must_use]
pub fn format_matrix(matrix: &Matrix) -> String {
    matrix
        .iter()
        .map(|row| {
            row.iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\\")
}
