//! Symmetric coupling strengths between components.
//!
//! Couplings are advisory: the loop dynamics do not read them, but the
//! matrix is kept square and symmetric so collaborators can rely on it.

use crate::error::{Result, ThermoError};

/// Square, symmetric matrix of dimensionless coupling strengths.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingMatrix {
    size: usize,
    data: Vec<f64>,
}

impl Default for CouplingMatrix {
    fn default() -> Self {
        Self::zeros(1)
    }
}

impl CouplingMatrix {
    /// Create a `size x size` matrix of zeros.
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    /// Build a matrix from rows, checking shape and symmetry.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let size = rows.len();
        let mut matrix = Self::zeros(size);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(ThermoError::invalid_parameter(
                    "coupling_matrix",
                    format!("row {} has {} entries, expected {}", i, row.len(), size),
                ));
            }
            matrix.data[i * size..(i + 1) * size].copy_from_slice(row);
        }
        for i in 0..size {
            for j in (i + 1)..size {
                if matrix.get(i, j) != matrix.get(j, i) {
                    return Err(ThermoError::invalid_parameter(
                        "coupling_matrix",
                        format!("entries ({i},{j}) and ({j},{i}) differ"),
                    ));
                }
            }
        }
        Ok(matrix)
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Grow to at least `size x size`, keeping existing entries.
    pub fn grow(&mut self, size: usize) {
        if size <= self.size {
            return;
        }
        let mut data = vec![0.0; size * size];
        for i in 0..self.size {
            data[i * size..i * size + self.size]
                .copy_from_slice(&self.data[i * self.size..(i + 1) * self.size]);
        }
        self.size = size;
        self.data = data;
    }

    /// Coupling between `i` and `j`; zero outside the stored range.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i < self.size && j < self.size {
            self.data[i * self.size + j]
        } else {
            0.0
        }
    }

    /// Set `M[i][j]` and `M[j][i]`, growing the matrix if needed.
    pub fn set_symmetric(&mut self, i: usize, j: usize, strength: f64) {
        self.grow(i.max(j) + 1);
        self.data[i * self.size + j] = strength;
        self.data[j * self.size + i] = strength;
    }

    /// Whether `M[i][j] == M[j][i]` for every pair.
    pub fn is_symmetric(&self) -> bool {
        (0..self.size).all(|i| (0..i).all(|j| self.get(i, j) == self.get(j, i)))
    }

    /// Copy out as nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.size.max(1)).take(self.size).map(<[f64]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_symmetric_grows_and_mirrors() {
        let mut m = CouplingMatrix::default();
        m.set_symmetric(0, 3, 0.25);
        assert_eq!(m.size(), 4);
        assert_eq!(m.get(0, 3), 0.25);
        assert_eq!(m.get(3, 0), 0.25);
        m.set_symmetric(2, 1, -0.5);
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }

    #[test]
    fn test_grow_keeps_entries() {
        let mut m = CouplingMatrix::zeros(2);
        m.set_symmetric(0, 1, 0.1);
        m.grow(5);
        assert_eq!(m.get(1, 0), 0.1);
        assert_eq!(m.get(4, 4), 0.0);
    }

    #[test]
    fn test_from_rows_rejects_asymmetric() {
        let rows = vec![vec![0.0, 0.1], vec![0.2, 0.0]];
        assert!(CouplingMatrix::from_rows(&rows).is_err());
        let ragged = vec![vec![0.0, 0.1], vec![0.1]];
        assert!(CouplingMatrix::from_rows(&ragged).is_err());
    }

    #[test]
    fn test_rows_round_trip() {
        let mut m = CouplingMatrix::zeros(3);
        m.set_symmetric(0, 2, 0.05);
        let back = CouplingMatrix::from_rows(&m.to_rows()).unwrap();
        assert_eq!(back, m);
    }
}
