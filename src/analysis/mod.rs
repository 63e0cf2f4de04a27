//! Circuit-level analyses built on the simulator.

mod calibration;
mod noise;

pub use calibration::{
    calibrate, characterize, Adjustment, CalibrationConfig, CalibrationReport, CharacterizationRecord,
};
pub use noise::{analyze_noise, welch, NoiseMetrics, NoiseReport, PowerSpectrum, WELCH_SEGMENT};
