//! Time- and frequency-domain noise characterization.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;

use crate::error::{Result, ThermoError};
use crate::solver::{mean_std, snr, RunOptions, Simulator, Trajectory};

/// Segment length of the Welch estimate.
pub const WELCH_SEGMENT: usize = 1024;

/// Mean, deviation and signal-to-noise ratio of current and voltage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoiseMetrics {
    pub current_mean: f64,
    pub current_std: f64,
    pub voltage_mean: f64,
    pub voltage_std: f64,
    pub current_snr: f64,
    pub voltage_snr: f64,
    pub current_snr_db: f64,
    pub voltage_snr_db: f64,
}

impl NoiseMetrics {
    pub fn from_trajectory(trajectory: &Trajectory) -> Self {
        let (current_mean, current_std) = mean_std(trajectory.currents());
        let (voltage_mean, voltage_std) = mean_std(trajectory.voltages());
        let current_snr = snr(current_mean, current_std);
        let voltage_snr = snr(voltage_mean, voltage_std);
        Self {
            current_mean,
            current_std,
            voltage_mean,
            voltage_std,
            current_snr,
            voltage_snr,
            current_snr_db: 20.0 * current_snr.log10(),
            voltage_snr_db: 20.0 * voltage_snr.log10(),
        }
    }
}

/// One-sided power spectral densities on a shared frequency axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerSpectrum {
    /// Hz
    pub frequencies: Vec<f64>,
    /// A^2/Hz
    pub current_psd: Vec<f64>,
    /// V^2/Hz
    pub voltage_psd: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseReport {
    pub time_domain: NoiseMetrics,
    pub frequency_domain: PowerSpectrum,
}

/// Run one simulation and characterize its noise.
pub fn analyze_noise(
    simulator: &mut Simulator,
    duration: f64,
    dt: f64,
    seed: Option<u64>,
) -> Result<NoiseReport> {
    let _span = tracing::info_span!("analyze_noise", duration, dt).entered();
    let options = RunOptions {
        seed,
        ..RunOptions::default()
    };
    let trajectory = simulator.simulate(duration, dt, &options)?;
    let fs = 1.0 / dt;
    let (frequencies, current_psd) = welch(&trajectory.currents(), fs, WELCH_SEGMENT)?;
    let (_, voltage_psd) = welch(&trajectory.voltages(), fs, WELCH_SEGMENT)?;

    Ok(NoiseReport {
        time_domain: NoiseMetrics::from_trajectory(&trajectory),
        frequency_domain: PowerSpectrum {
            frequencies,
            current_psd,
            voltage_psd,
        },
    })
}

/// Welch power spectral density estimate.
///
/// Periodic Hann window, 50% overlap, per-segment mean removal, one-sided
/// density scaling. Signals shorter than `nperseg` use a single segment of
/// their own length. Returns `(frequencies, psd)`.
pub fn welch(signal: &[f64], fs: f64, nperseg: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if signal.len() < 2 {
        return Err(ThermoError::invalid_parameter(
            "signal",
            "at least two samples are needed for a spectrum",
        ));
    }
    if !(fs.is_finite() && fs > 0.0) {
        return Err(ThermoError::invalid_parameter("fs", "must be positive"));
    }

    let nperseg = nperseg.clamp(2, signal.len());
    let step = nperseg - nperseg / 2;
    let segments = (signal.len() - nperseg) / step + 1;

    let window: Vec<f64> = (0..nperseg)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / nperseg as f64).cos())
        .collect();
    let scale = 1.0 / (fs * window.iter().map(|w| w * w).sum::<f64>());

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);
    let bins = nperseg / 2 + 1;
    let mut psd = vec![0.0; bins];
    let mut buffer: Vec<Complex<f64>> = Vec::with_capacity(nperseg);

    for s in 0..segments {
        let segment = &signal[s * step..s * step + nperseg];
        let mean = segment.iter().sum::<f64>() / nperseg as f64;
        buffer.clear();
        buffer.extend(
            segment
                .iter()
                .zip(&window)
                .map(|(x, w)| Complex::new((x - mean) * w, 0.0)),
        );
        fft.process(&mut buffer);
        for (p, c) in psd.iter_mut().zip(&buffer) {
            *p += c.norm_sqr();
        }
    }

    let nyquist_bin = (nperseg % 2 == 0).then_some(bins - 1);
    for (k, p) in psd.iter_mut().enumerate() {
        *p *= scale / segments as f64;
        if k != 0 && Some(k) != nyquist_bin {
            *p *= 2.0;
        }
    }

    let frequencies = (0..bins).map(|k| k as f64 * fs / nperseg as f64).collect();
    Ok((frequencies, psd))
}
