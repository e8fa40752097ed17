//! Dense per-token embedding storage.

/// Contiguous `rows x dim` matrix of 32-bit floats, row `i` holding the
/// contextual vector of token `i`, L2-normalized once filled.
///
/// Allocated once per corpus after `end_reading` and exclusively owned
/// by it; the matching engine borrows read-only views. During an
/// embedding session ownership moves into the provider's receiver
/// worker and returns at `end_session`.
#[derive(Clone, Debug)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Allocates a zero-filled matrix.
    pub fn zeroed(rows: usize, dim: usize) -> Self {
        Self {
            rows,
            dim,
            data: vec![0.0; rows * dim],
        }
    }

    /// Builds a matrix from row-major data. Panics if the data length
    /// is not `rows * dim`.
    pub fn from_rows(rows: usize, dim: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), rows * dim, "row-major data length mismatch");
        Self { rows, dim, data }
    }

    /// Number of token rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Vector dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Read-only view of row `i`.
    pub fn row(&self, i: usize) -> &[f32] {
        let start = i * self.dim;
        &self.data[start..start + self.dim]
    }

    /// Mutable view of row `i`.
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        let start = i * self.dim;
        &mut self.data[start..start + self.dim]
    }

    /// The whole matrix as one row-major slice.
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Divides `row` by its Euclidean norm in place.
///
/// The embedding service never returns zero vectors, so no epsilon
/// guard is applied; a zero row would stay zero.
pub fn l2_normalize(row: &mut [f32]) {
    let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in row.iter_mut() {
            *x /= norm;
        }
    }
}
