//! Simulation output.

use serde::Serialize;

use super::dynamics::{RlcParameters, State};
use super::integrator::StepStats;

/// One recorded point of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub current: f64,
    pub voltage: f64,
    /// Energy function value, when the run captures energy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
}

impl Sample {
    pub fn state(&self) -> State {
        State::new(self.current, self.voltage)
    }

    /// Instantaneous power `i * v`.
    pub fn power(&self) -> f64 {
        self.current * self.voltage
    }
}

/// Time series produced by a simulation run.
///
/// Times are strictly increasing and every sample either carries an energy
/// value or none does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    samples: Vec<Sample>,
    parameters: RlcParameters,
    #[serde(skip)]
    stats: StepStats,
}

impl Trajectory {
    pub(crate) fn new(samples: Vec<Sample>, parameters: RlcParameters, stats: StepStats) -> Self {
        Self {
            samples,
            parameters,
            stats,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Element values the run was integrated with.
    pub fn parameters(&self) -> &RlcParameters {
        &self.parameters
    }

    /// Integrator step counters (batch runs only).
    pub fn step_stats(&self) -> StepStats {
        self.stats
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn currents(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.current).collect()
    }

    pub fn voltages(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.voltage).collect()
    }

    /// Energy series, if it was captured.
    pub fn energies(&self) -> Option<Vec<f64>> {
        self.samples.iter().map(|s| s.energy).collect()
    }

    pub fn final_state(&self) -> Option<State> {
        self.samples.last().map(Sample::state)
    }

    /// Statistics over the whole trajectory.
    pub fn summary(&self) -> SummaryStats {
        SummaryStats::from_samples(&self.samples)
    }

    /// Statistics over the trailing `fraction` of the samples.
    pub fn tail_summary(&self, fraction: f64) -> SummaryStats {
        let keep = ((self.samples.len() as f64) * fraction.clamp(0.0, 1.0)).ceil() as usize;
        let start = self.samples.len() - keep.min(self.samples.len());
        SummaryStats::from_samples(&self.samples[start..])
    }
}

/// Mean and sample standard deviation of current, voltage and power.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub current_mean: f64,
    pub current_std: f64,
    pub voltage_mean: f64,
    pub voltage_std: f64,
    pub power_mean: f64,
    pub power_std: f64,
}

impl SummaryStats {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let (current_mean, current_std) = mean_std(samples.iter().map(|s| s.current));
        let (voltage_mean, voltage_std) = mean_std(samples.iter().map(|s| s.voltage));
        let (power_mean, power_std) = mean_std(samples.iter().map(Sample::power));
        Self {
            current_mean,
            current_std,
            voltage_mean,
            voltage_std,
            power_mean,
            power_std,
        }
    }

    pub fn current_snr(&self) -> f64 {
        snr(self.current_mean, self.current_std)
    }

    pub fn voltage_snr(&self) -> f64 {
        snr(self.voltage_mean, self.voltage_std)
    }
}

/// Mean and sample (n - 1) standard deviation. Zero for empty input; the
/// deviation is zero for a single value.
pub fn mean_std<I: IntoIterator<Item = f64>>(values: I) -> (f64, f64) {
    let values: Vec<f64> = values.into_iter().collect();
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}

/// Signal-to-noise ratio `|mean| / std`; infinite when the deviation is
/// zero.
pub fn snr(mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        f64::INFINITY
    } else {
        mean.abs() / std
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_std_uses_sample_deviation() {
        let (mean, std) = mean_std([1.0, 2.0, 3.0, 4.0]);
        assert_relative_eq!(mean, 2.5);
        assert_relative_eq!(std, (5.0_f64 / 3.0).sqrt());
        assert_eq!(mean_std(std::iter::empty()), (0.0, 0.0));
        assert_eq!(mean_std([7.0]), (7.0, 0.0));
    }

    #[test]
    fn test_snr_infinite_for_constant_signal() {
        assert_eq!(snr(5.0, 0.0), f64::INFINITY);
        assert_relative_eq!(snr(-4.0, 2.0), 2.0);
    }

    #[test]
    fn test_energy_series_all_or_nothing() {
        let params = RlcParameters {
            resistance: 1.0,
            inductance: 1.0,
            capacitance: 1.0,
            source_voltage: 1.0,
        };
        let sample = |time, energy| Sample {
            time,
            current: 1.0,
            voltage: 2.0,
            energy,
        };
        let with = Trajectory::new(
            vec![sample(0.0, Some(1.0)), sample(0.1, Some(2.0))],
            params,
            StepStats::default(),
        );
        assert_eq!(with.energies(), Some(vec![1.0, 2.0]));
        let without = Trajectory::new(vec![sample(0.0, None)], params, StepStats::default());
        assert_eq!(without.energies(), None);
        assert_relative_eq!(without.summary().power_mean, 2.0);
    }
}
