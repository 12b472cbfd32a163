use bit_vec::BitVec;
use nalgebra::{DMatrix, DVector};
use rand::distributions::Distribution;
use rand::Rng;
use rand_distr::StandardNormal;

/// Draws a `rows x cols` matrix of standard normal noise from `rng`, filling it row by row so
/// that the same stream always lands in the same cells regardless of storage order.
pub(crate) fn standard_noise_matrix<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    rng: &mut R,
) -> DMatrix<f64> {
    DMatrix::from_row_iterator(
        rows,
        cols,
        StandardNormal
            .sample_iter(rng)
            .take(rows * cols)
            .collect::<Vec<f64>>(),
    )
}

/// Rescales `vector` linearly onto `[0, 1]`. A constant vector maps to all zeros.
pub(crate) fn min_max_scale(vector: &DVector<f64>) -> DVector<f64> {
    if vector.is_empty() {
        return vector.clone();
    }

    let min = vector.min();
    let range = vector.max() - min;

    if range > 0.0 && range.is_finite() {
        vector.map(|xi| (xi - min) / range)
    } else {
        DVector::zeros(vector.len())
    }
}

/// Rounds to three decimal places.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}

/// A selection over the columns of a matrix row. A column is selected when its bit is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(pub BitVec);

impl Mask {
    pub(crate) fn all(size: usize) -> Mask {
        Mask(BitVec::from_elem(size, true))
    }

    pub(crate) fn filter<'a, I: IntoIterator>(&'a self, it: I) -> impl 'a + Iterator<Item = I::Item>
    where
        I::IntoIter: 'a,
    {
        self.0
            .iter()
            .zip(it)
            .filter(|(selected, _)| *selected)
            .map(|(_, element)| element)
    }

    /// Positions of the selected columns, in ascending order.
    pub fn selected(&self) -> impl '_ + Iterator<Item = usize> {
        self.filter(0..self.0.len())
    }

    /// Number of selected columns.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|selected| *selected).count()
    }

    /// Keeps only the selected entries of `vector`.
    pub(crate) fn mask(&self, vector: &DVector<f64>) -> Vec<f64> {
        self.filter(vector.iter()).copied().collect()
    }

    /// Zeroes every entry of `vector` that is not selected.
    pub(crate) fn fillna(&self, vector: &DVector<f64>) -> DVector<f64> {
        vector
            .iter()
            .zip(&self.0)
            .map(|(xi, selected)| if selected { *xi } else { 0.0 })
            .collect::<Vec<f64>>()
            .into()
    }
}
