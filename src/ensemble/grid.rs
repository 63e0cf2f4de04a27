//! Parameter variations for ensemble runs.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::circuit::Circuit;
use crate::error::{Result, ThermoError};

/// Nominal value overrides applied to one unit of work, by component name.
pub type Overrides = Vec<(String, f64)>;

/// Named value lists whose Cartesian product is swept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterGrid {
    axes: Vec<(String, Vec<f64>)>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis. Axes vary slowest-first in the order they are added.
    pub fn with_axis(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.axes.push((name.into(), values));
        self
    }

    pub fn axes(&self) -> &[(String, Vec<f64>)] {
        &self.axes
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(name, _)| name.as_str())
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|(_, values)| values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, the last axis varying fastest.
    ///
    /// A grid without axes has exactly one (empty) combination.
    pub fn combinations(&self) -> Vec<Overrides> {
        let mut out = Vec::with_capacity(self.len());
        let mut index = vec![0usize; self.axes.len()];
        if self.is_empty() {
            return out;
        }
        loop {
            out.push(
                self.axes
                    .iter()
                    .zip(&index)
                    .map(|((name, values), &k)| (name.clone(), values[k]))
                    .collect(),
            );

            // Odometer increment from the last axis.
            let mut axis = self.axes.len();
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < self.axes[axis].1.len() {
                    break;
                }
                index[axis] = 0;
            }
        }
    }
}

/// Gaussian perturbations of named nominal values for Monte Carlo runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterVariations {
    entries: Vec<(String, f64, f64)>,
}

impl ParameterVariations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vary `name` as `Normal(mean, std)`.
    pub fn with(mut self, name: impl Into<String>, mean: f64, std: f64) -> Self {
        self.entries.push((name.into(), mean, std));
        self
    }

    /// Every component of `circuit`, centred on its nominal value with a
    /// deviation of 10% of it.
    pub fn from_circuit(circuit: &Circuit) -> Self {
        Self {
            entries: circuit
                .components()
                .iter()
                .map(|c| (c.name.clone(), c.nominal_value, 0.1 * c.nominal_value.abs()))
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn distributions(&self) -> Result<Vec<(String, Normal<f64>)>> {
        self.entries
            .iter()
            .map(|(name, mean, std)| {
                Normal::new(*mean, *std)
                    .map(|dist| (name.clone(), dist))
                    .map_err(|e| ThermoError::invalid_parameter(name, e.to_string()))
            })
            .collect()
    }

    /// Draw one set of overrides, one value per entry in order.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Overrides> {
        Ok(self
            .distributions()?
            .into_iter()
            .map(|(name, dist)| {
                let value = dist.sample(rng);
                (name, value)
            })
            .collect())
    }
}
