use bit_vec::BitVec;
use nalgebra::{DMatrix, DVector};

use crate::error::{ImplicitError, Result};
use crate::utils::Mask;

/// A sparse users x items matrix of non-negative interaction strengths (e.g., purchase counts).
///
/// Entries are kept in compressed sparse row form: the stored columns of row `r` are
/// `indices[indptr[r]..indptr[r + 1]]`, sorted ascending. Zeros are never stored, so a stored
/// entry always means "an interaction was observed".
///
/// ## Note
///
/// A zero entry is an _unobserved_ interaction, not a negative one.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionMatrix {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl InteractionMatrix {
    /// Creates a matrix without any observed interaction.
    pub fn empty(n_rows: usize, n_cols: usize) -> InteractionMatrix {
        InteractionMatrix {
            n_rows,
            n_cols,
            indptr: vec![0; n_rows + 1],
            indices: vec![],
            values: vec![],
        }
    }

    /// Builds a matrix from `(row, column, value)` triplets. Values landing on the same
    /// coordinate are summed and coordinates summing to zero are dropped.
    ///
    /// # Errors
    ///
    /// Fails if a coordinate falls outside the shape or a value is negative or not finite.
    pub fn from_triplets<I>(n_rows: usize, n_cols: usize, triplets: I) -> Result<InteractionMatrix>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut triplets = triplets
            .into_iter()
            .map(|(row, col, value)| {
                if row >= n_rows || col >= n_cols {
                    Err(ImplicitError::OutOfBounds {
                        row,
                        col,
                        n_rows,
                        n_cols,
                    })
                } else if !value.is_finite() {
                    Err(ImplicitError::NonFiniteInteraction { row, col })
                } else if value < 0.0 {
                    Err(ImplicitError::NegativeInteraction { row, col, value })
                } else {
                    Ok((row, col, value))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        triplets.sort_by_key(|&(row, col, _)| (row, col));

        let mut merged: Vec<(usize, usize, f64)> = Vec::with_capacity(triplets.len());
        for (row, col, value) in triplets {
            match merged.last_mut() {
                Some(last) if last.0 == row && last.1 == col => last.2 += value,
                _ => merged.push((row, col, value)),
            }
        }

        let mut indptr = vec![0; n_rows + 1];
        let mut indices = Vec::with_capacity(merged.len());
        let mut values = Vec::with_capacity(merged.len());

        for (row, col, value) in merged.into_iter().filter(|&(_, _, value)| value != 0.0) {
            indptr[row + 1] += 1;
            indices.push(col);
            values.push(value);
        }
        for row in 0..n_rows {
            indptr[row + 1] += indptr[row];
        }

        Ok(InteractionMatrix {
            n_rows,
            n_cols,
            indptr,
            indices,
            values,
        })
    }

    /// Builds a sparse matrix out of a dense one, keeping the non-zero entries.
    pub fn from_dense(dense: &DMatrix<f64>) -> Result<InteractionMatrix> {
        let (n_rows, n_cols) = dense.shape();
        InteractionMatrix::from_triplets(
            n_rows,
            n_cols,
            (0..n_rows).flat_map(|row| (0..n_cols).map(move |col| (row, col, dense[(row, col)]))),
        )
    }

    /// The dense version of this matrix.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.n_rows, self.n_cols);
        for row in 0..self.n_rows {
            for (col, value) in self.row(row) {
                dense[(row, col)] = value;
            }
        }

        dense
    }

    /// Number of users.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of items.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Number of observed interactions.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Whether there is no observed interaction at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the observed `(column, value)` pairs of a row, by ascending column.
    ///
    /// # Panics
    ///
    /// This function panics if `row` is out of bounds.
    pub fn row(&self, row: usize) -> impl '_ + Iterator<Item = (usize, f64)> {
        let range = self.indptr[row]..self.indptr[row + 1];
        self.indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// The observed columns of a row, ascending.
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.indices[self.indptr[row]..self.indptr[row + 1]]
    }

    /// The value at `(row, col)`; zero if nothing was observed there.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let start = self.indptr[row];
        match self.row_indices(row).binary_search(&col) {
            Ok(offset) => self.values[start + offset],
            Err(_) => 0.0,
        }
    }

    /// All observed coordinates, in row-major order.
    pub fn nonzero_positions(&self) -> Vec<(usize, usize)> {
        (0..self.n_rows)
            .flat_map(|row| self.row_indices(row).iter().map(move |&col| (row, col)))
            .collect()
    }

    /// The columns of `row` where nothing was observed.
    pub fn unobserved_in_row(&self, row: usize) -> Mask {
        let mut mask = Mask::all(self.n_cols);
        for &col in self.row_indices(row) {
            mask.0.set(col, false);
        }

        mask
    }

    /// A copy of this matrix with all of `positions` erased. Positions that hold no
    /// observation are ignored.
    pub fn without_positions(&self, positions: &[(usize, usize)]) -> InteractionMatrix {
        let mut erased = BitVec::from_elem(self.nnz(), false);
        for &(row, col) in positions {
            if row >= self.n_rows {
                continue;
            }
            if let Ok(offset) = self.row_indices(row).binary_search(&col) {
                erased.set(self.indptr[row] + offset, true);
            }
        }

        let mut indptr = vec![0; self.n_rows + 1];
        let mut indices = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());

        for row in 0..self.n_rows {
            for storage in self.indptr[row]..self.indptr[row + 1] {
                if !erased[storage] {
                    indices.push(self.indices[storage]);
                    values.push(self.values[storage]);
                }
            }
            indptr[row + 1] = indices.len();
        }

        InteractionMatrix {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            indptr,
            indices,
            values,
        }
    }

    /// The binary preference matrix: one wherever an interaction was observed.
    pub fn binarized(&self) -> InteractionMatrix {
        InteractionMatrix {
            values: vec![1.0; self.values.len()],
            ..self.clone()
        }
    }

    /// Total of every column (for a binarized matrix, the number of users per item).
    pub fn column_sums(&self) -> DVector<f64> {
        let mut sums = DVector::zeros(self.n_cols);
        for (&col, &value) in self.indices.iter().zip(&self.values) {
            sums[col] += value;
        }

        sums
    }

    /// The items x users version of this matrix. Rows of the transpose are the columns of the
    /// original, which is how the item side of the factorization walks the data.
    pub fn transpose(&self) -> InteractionMatrix {
        let mut indptr = vec![0; self.n_cols + 1];
        for &col in &self.indices {
            indptr[col + 1] += 1;
        }
        for col in 0..self.n_cols {
            indptr[col + 1] += indptr[col];
        }

        let mut cursor = indptr.clone();
        let mut indices = vec![0; self.nnz()];
        let mut values = vec![0.0; self.nnz()];

        // Visiting rows in order keeps the new rows sorted.
        for row in 0..self.n_rows {
            for (col, value) in self.row(row) {
                indices[cursor[col]] = row;
                values[cursor[col]] = value;
                cursor[col] += 1;
            }
        }

        InteractionMatrix {
            n_rows: self.n_cols,
            n_cols: self.n_rows,
            indptr,
            indices,
            values,
        }
    }

    /// Percentage of the cells without an observed interaction.
    pub fn sparsity(&self) -> f64 {
        let size = self.n_rows * self.n_cols;
        if size == 0 {
            return 100.0;
        }

        100.0 * (1.0 - self.nnz() as f64 / size as f64)
    }
}
