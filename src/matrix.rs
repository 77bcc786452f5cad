use core::fmt;
use core::ops::Range;

use faer_core::sparse::SymbolicSparseColMatRef;

/// Row-compressed sparse matrix A.
///
/// Indices are zero-based; each row's column indices must be strictly increasing.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    row_ptrs: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
}

/// Validation errors for a CsrMatrix.
#[derive(Debug, Clone)]
pub enum MatrixError {
    /// row_ptrs length is not nrows + 1.
    RowPtrLen { expected: usize, actual: usize },
    /// row_ptrs[0] is not 0.
    RowPtrStart { value: usize },
    /// row_ptrs is not non-decreasing.
    RowPtrNotMonotonic { row: usize, prev: usize, next: usize },
    /// row_ptrs[nrows] does not match col_indices length.
    RowPtrOutOfBounds { last: usize, col_indices_len: usize },
    /// values and col_indices differ in length.
    ValuesLen { expected: usize, actual: usize },
    /// A column index is >= ncols.
    ColIndexOutOfBounds { row: usize, col: usize, ncols: usize },
    /// Column indices in a row are not strictly increasing.
    ColIndexNotSorted { row: usize, prev: usize, next: usize },
    /// A stored value is NaN or infinite.
    NonFiniteValue { row: usize, col: usize },
    /// A triplet row index is >= nrows.
    RowIndexOutOfBounds { row: usize, nrows: usize },
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowPtrLen { expected, actual } => {
                write!(f, "row_ptrs length {actual} does not match expected {expected}")
            }
            Self::RowPtrStart { value } => {
                write!(f, "row_ptrs must start at 0 (got {value})")
            }
            Self::RowPtrNotMonotonic { row, prev, next } => {
                write!(f, "row_ptrs not monotonic at row {row}: {prev} > {next}")
            }
            Self::RowPtrOutOfBounds {
                last,
                col_indices_len,
            } => {
                write!(
                    f,
                    "row_ptrs end {last} does not match col_indices length {col_indices_len}"
                )
            }
            Self::ValuesLen { expected, actual } => {
                write!(f, "values length {actual} does not match expected {expected}")
            }
            Self::ColIndexOutOfBounds { row, col, ncols } => {
                write!(f, "column index {col} in row {row} exceeds ncols {ncols}")
            }
            Self::ColIndexNotSorted { row, prev, next } => {
                write!(
                    f,
                    "column indices not strictly increasing in row {row}: {prev} >= {next}"
                )
            }
            Self::NonFiniteValue { row, col } => {
                write!(f, "non-finite value at ({row}, {col})")
            }
            Self::RowIndexOutOfBounds { row, nrows } => {
                write!(f, "row index {row} exceeds nrows {nrows}")
            }
        }
    }
}

impl std::error::Error for MatrixError {}

impl CsrMatrix {
    /// Creates a validated row-compressed matrix.
    ///
    /// Requirements:
    /// - `row_ptrs.len() == nrows + 1`
    /// - `row_ptrs` is non-decreasing and starts at `0`
    /// - `row_ptrs[nrows] == col_indices.len() == values.len()`
    /// - column indices are strictly increasing and `< ncols` within each row
    /// - every value is finite
    pub fn new(
        nrows: usize,
        ncols: usize,
        row_ptrs: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self, MatrixError> {
        let expected = nrows + 1;
        if row_ptrs.len() != expected {
            return Err(MatrixError::RowPtrLen {
                expected,
                actual: row_ptrs.len(),
            });
        }
        if row_ptrs[0] != 0 {
            return Err(MatrixError::RowPtrStart { value: row_ptrs[0] });
        }
        for row in 0..nrows {
            let prev = row_ptrs[row];
            let next = row_ptrs[row + 1];
            if prev > next {
                return Err(MatrixError::RowPtrNotMonotonic { row, prev, next });
            }
        }
        let last = row_ptrs[nrows];
        if last != col_indices.len() {
            return Err(MatrixError::RowPtrOutOfBounds {
                last,
                col_indices_len: col_indices.len(),
            });
        }
        if values.len() != col_indices.len() {
            return Err(MatrixError::ValuesLen {
                expected: col_indices.len(),
                actual: values.len(),
            });
        }

        for row in 0..nrows {
            let mut prev: Option<usize> = None;
            for idx in row_ptrs[row]..row_ptrs[row + 1] {
                let col = col_indices[idx];
                if col >= ncols {
                    return Err(MatrixError::ColIndexOutOfBounds { row, col, ncols });
                }
                if let Some(prev) = prev {
                    if prev >= col {
                        return Err(MatrixError::ColIndexNotSorted {
                            row,
                            prev,
                            next: col,
                        });
                    }
                }
                if !values[idx].is_finite() {
                    return Err(MatrixError::NonFiniteValue { row, col });
                }
                prev = Some(col);
            }
        }

        Ok(Self {
            nrows,
            ncols,
            row_ptrs,
            col_indices,
            values,
        })
    }

    /// Builds a matrix from `(row, col, value)` triplets; duplicates are summed.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        entries: &[(usize, usize, f64)],
    ) -> Result<Self, MatrixError> {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); nrows];
        for &(row, col, value) in entries {
            if row >= nrows {
                return Err(MatrixError::RowIndexOutOfBounds { row, nrows });
            }
            rows[row].push((col, value));
        }

        let mut row_ptrs = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        row_ptrs.push(0);
        for mut row in rows {
            row.sort_unstable_by_key(|&(col, _)| col);
            for (col, value) in row {
                if col_indices.len() > *row_ptrs.last().unwrap_or(&0)
                    && col_indices.last() == Some(&col)
                {
                    if let Some(acc) = values.last_mut() {
                        *acc += value;
                    }
                    continue;
                }
                col_indices.push(col);
                values.push(value);
            }
            row_ptrs.push(col_indices.len());
        }
        Self::new(nrows, ncols, row_ptrs, col_indices, values)
    }

    /// Number of rows (observations).
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns (features).
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored non-zeros.
    pub fn nnz(&self) -> usize {
        self.col_indices.len()
    }

    /// Row pointer array in CSR format.
    pub fn row_ptrs(&self) -> &[usize] {
        &self.row_ptrs
    }

    /// Column index array in CSR format.
    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    /// Stored values, aligned with `col_indices`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Index range in col_indices for the given row.
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.row_ptrs[row]..self.row_ptrs[row + 1]
    }

    /// Computes `out = A x`.
    pub fn mul_vec(&self, x: &[f64], out: &mut [f64]) {
        debug_assert_eq!(x.len(), self.ncols);
        debug_assert_eq!(out.len(), self.nrows);
        for (row, out) in out.iter_mut().enumerate() {
            let mut sum = 0.0;
            for idx in self.row_range(row) {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            *out = sum;
        }
    }

    /// Computes `out = Aᵀ v` in a single pass over the non-zeros.
    pub fn mul_transpose_vec(&self, v: &[f64], out: &mut [f64]) {
        debug_assert_eq!(v.len(), self.nrows);
        debug_assert_eq!(out.len(), self.ncols);
        out.fill(0.0);
        for (row, &vi) in v.iter().enumerate() {
            for idx in self.row_range(row) {
                out[self.col_indices[idx]] += self.values[idx] * vi;
            }
        }
    }
}

/// Column-compressed layout of `[A; I]` used by the projection step.
///
/// Column `j` holds the entries of column `j` of A in increasing row order,
/// followed by a single diagonal entry at row `nrows + j`.
#[derive(Debug)]
pub(crate) struct AugmentedPattern {
    matrix_rows: usize,
    ncols: usize,
    col_ptrs: Vec<usize>,
    row_indices: Vec<usize>,
    diag_positions: Vec<usize>,
    value_positions: Vec<usize>,
}

impl AugmentedPattern {
    pub(crate) fn new(matrix: &CsrMatrix) -> Self {
        let ncols = matrix.ncols();
        let matrix_rows = matrix.nrows();

        let mut counts = vec![0usize; ncols];
        for &col in matrix.col_indices() {
            counts[col] += 1;
        }
        let mut col_ptrs = Vec::with_capacity(ncols + 1);
        col_ptrs.push(0);
        for col in 0..ncols {
            let next = col_ptrs[col] + counts[col] + 1;
            col_ptrs.push(next);
        }

        let mut row_indices = vec![0usize; col_ptrs[ncols]];
        let mut value_positions = vec![0usize; matrix.nnz()];
        let mut cursor = col_ptrs[..ncols].to_vec();
        for row in 0..matrix_rows {
            for idx in matrix.row_range(row) {
                let col = matrix.col_indices()[idx];
                let pos = cursor[col];
                cursor[col] += 1;
                row_indices[pos] = row;
                value_positions[idx] = pos;
            }
        }

        let mut diag_positions = Vec::with_capacity(ncols);
        for col in 0..ncols {
            let pos = col_ptrs[col + 1] - 1;
            row_indices[pos] = matrix_rows + col;
            diag_positions.push(pos);
        }

        Self {
            matrix_rows,
            ncols,
            col_ptrs,
            row_indices,
            diag_positions,
            value_positions,
        }
    }

    /// Scatters the values of `matrix` into `values` and sets the diagonal block.
    pub(crate) fn fill_values(&self, matrix: &CsrMatrix, diag: f64, values: &mut [f64]) {
        for (&pos, &value) in self.value_positions.iter().zip(matrix.values()) {
            values[pos] = value;
        }
        for &pos in &self.diag_positions {
            values[pos] = diag;
        }
    }

    pub(crate) fn nrows(&self) -> usize {
        self.matrix_rows + self.ncols
    }

    pub(crate) fn ncols(&self) -> usize {
        self.ncols
    }

    pub(crate) fn matrix_rows(&self) -> usize {
        self.matrix_rows
    }

    pub(crate) fn nnz(&self) -> usize {
        self.row_indices.len()
    }

    pub(crate) fn as_symbolic(&self) -> SymbolicSparseColMatRef<'_, usize> {
        // Column pointers are monotonic and row indices sorted per column by construction.
        unsafe {
            SymbolicSparseColMatRef::new_unchecked(
                self.nrows(),
                self.ncols,
                &self.col_ptrs,
                None,
                &self.row_indices,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CsrMatrix {
        // [[1, 0, 2],
        //  [0, 3, 0]]
        CsrMatrix::new(2, 3, vec![0, 2, 3], vec![0, 2, 1], vec![1.0, 2.0, 3.0]).unwrap()
    }

    #[test]
    fn rejects_unsorted_columns() {
        let err = CsrMatrix::new(1, 3, vec![0, 2], vec![2, 1], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            MatrixError::ColIndexNotSorted { row: 0, prev: 2, next: 1 }
        ));
    }

    #[test]
    fn rejects_bad_row_ptrs() {
        let err = CsrMatrix::new(2, 2, vec![0, 1], vec![0], vec![1.0]).unwrap_err();
        assert!(matches!(err, MatrixError::RowPtrLen { expected: 3, actual: 2 }));

        let err = CsrMatrix::new(1, 2, vec![0, 2], vec![0], vec![1.0]).unwrap_err();
        assert!(matches!(err, MatrixError::RowPtrOutOfBounds { .. }));

        let err = CsrMatrix::new(1, 2, vec![0, 1], vec![5], vec![1.0]).unwrap_err();
        assert!(matches!(err, MatrixError::ColIndexOutOfBounds { col: 5, .. }));

        let err = CsrMatrix::new(1, 2, vec![0, 1], vec![0], vec![f64::NAN]).unwrap_err();
        assert!(matches!(err, MatrixError::NonFiniteValue { row: 0, col: 0 }));
    }

    #[test]
    fn triplets_sum_duplicates() {
        let a = CsrMatrix::from_triplets(2, 2, &[(1, 1, 1.0), (0, 0, 2.0), (1, 1, 0.5)]).unwrap();
        assert_eq!(a.row_ptrs(), &[0, 1, 2]);
        assert_eq!(a.col_indices(), &[0, 1]);
        assert_eq!(a.values(), &[2.0, 1.5]);
    }

    #[test]
    fn products_match_dense() {
        let a = sample();
        let mut y = [0.0; 2];
        a.mul_vec(&[1.0, 1.0, 1.0], &mut y);
        assert_eq!(y, [3.0, 3.0]);

        let mut u = [0.0; 3];
        a.mul_transpose_vec(&[1.0, 2.0], &mut u);
        assert_eq!(u, [1.0, 6.0, 2.0]);
    }

    #[test]
    fn augmented_layout_appends_identity() {
        let a = sample();
        let augmented = AugmentedPattern::new(&a);
        assert_eq!(augmented.nrows(), 5);
        assert_eq!(augmented.col_ptrs, vec![0, 2, 4, 6]);
        assert_eq!(augmented.row_indices, vec![0, 2, 1, 3, 0, 4]);
        assert_eq!(augmented.diag_positions, vec![1, 3, 5]);

        let mut values = vec![0.0; augmented.nnz()];
        augmented.fill_values(&a, 1.0, &mut values);
        assert_eq!(values, vec![1.0, 1.0, 3.0, 1.0, 2.0, 1.0]);
    }
}
