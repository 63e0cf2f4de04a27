//! CSV output for the CLI frontend.
//!
//! Every writer emits one header line followed by data rows. Infinite
//! values are written as `inf`.

use std::io::{self, BufWriter, Write};

use crate::analysis::{CalibrationReport, CharacterizationRecord, NoiseReport};
use crate::compute::ComputationResult;
use crate::ensemble::{RunStatus, RunTag, SweepRecord};
use crate::error::{Result, ThermoError};
use crate::solver::{Sample, Trajectory};

/// Buffered CSV row writer.
pub struct CsvOutput<W: Write> {
    writer: BufWriter<W>,
}

impl CsvOutput<io::Stdout> {
    /// Write to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> CsvOutput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Write one row of already formatted fields.
    pub fn row<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(field.as_ref());
        }
        line.push('\n');
        self.writer.write_all(line.as_bytes()).map_err(output_error)
    }

    /// Write one row of numbers.
    pub fn values(&mut self, values: &[f64]) -> Result<()> {
        let fields: Vec<String> = values.iter().map(f64::to_string).collect();
        self.row(&fields)
    }

    /// Flush the output stream.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(output_error)
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| output_error(e.into_error()))
    }
}

fn output_error(e: io::Error) -> ThermoError {
    ThermoError::OutputError {
        message: e.to_string(),
    }
}

/// Header for trajectory rows.
pub fn trajectory_header<W: Write>(out: &mut CsvOutput<W>, with_energy: bool) -> Result<()> {
    if with_energy {
        out.row(&["time", "current", "voltage", "energy"])
    } else {
        out.row(&["time", "current", "voltage"])
    }
}

/// One trajectory row; the energy column appears when the sample has one.
pub fn write_sample<W: Write>(out: &mut CsvOutput<W>, sample: &Sample) -> Result<()> {
    match sample.energy {
        Some(energy) => out.values(&[sample.time, sample.current, sample.voltage, energy]),
        None => out.values(&[sample.time, sample.current, sample.voltage]),
    }
}

pub fn write_trajectory<W: Write>(out: &mut CsvOutput<W>, trajectory: &Trajectory) -> Result<()> {
    trajectory_header(out, trajectory.energies().is_some())?;
    for sample in trajectory.samples() {
        write_sample(out, sample)?;
    }
    Ok(())
}

/// Sweep or Monte Carlo records, one `param_<name>` column per override.
pub fn write_sweep<W: Write>(out: &mut CsvOutput<W>, records: &[SweepRecord]) -> Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let tag_column = match first.tag {
        RunTag::Repetition(_) => "repetition",
        RunTag::Simulation(_) => "simulation_id",
    };

    let mut header = vec![tag_column.to_string()];
    header.extend(first.parameters.iter().map(|(name, _)| format!("param_{name}")));
    header.extend(
        [
            "current_mean",
            "current_std",
            "voltage_mean",
            "voltage_std",
            "snr_current",
            "snr_voltage",
            "status",
        ]
        .map(String::from),
    );
    out.row(&header)?;

    for record in records {
        let m = &record.metrics;
        let mut row = vec![record.tag.index().to_string()];
        row.extend(record.parameters.iter().map(|(_, value)| value.to_string()));
        row.extend(
            [
                m.current_mean,
                m.current_std,
                m.voltage_mean,
                m.voltage_std,
                m.snr_current,
                m.snr_voltage,
            ]
            .iter()
            .map(f64::to_string),
        );
        row.push(status_field(&record.status));
        out.row(&row)?;
    }
    Ok(())
}

fn status_field(status: &RunStatus) -> String {
    match status {
        RunStatus::Completed => "completed".to_string(),
        RunStatus::Cancelled => "cancelled".to_string(),
        RunStatus::Failed { reason } => format!("\"failed: {}\"", reason.replace('"', "'")),
    }
}

/// Annealing trace (iteration, temperature, score, x0..) or samples
/// (x0.., density).
pub fn write_computation<W: Write>(out: &mut CsvOutput<W>, result: &ComputationResult) -> Result<()> {
    match result {
        ComputationResult::Optimize(outcome) | ComputationResult::Solve(outcome) => {
            let dims = outcome.best_point.len();
            let mut header = vec!["iteration".to_string(), "temperature".into(), "score".into()];
            header.extend((0..dims).map(|d| format!("x{d}")));
            out.row(&header)?;
            for (i, record) in outcome.trace.iter().enumerate() {
                let mut row = vec![i as f64, record.temperature, record.score];
                row.extend_from_slice(&record.point);
                out.values(&row)?;
            }
        }
        ComputationResult::Sample(outcome) => {
            let dims = outcome.samples.first().map_or(0, Vec::len);
            let mut header: Vec<String> = (0..dims).map(|d| format!("x{d}")).collect();
            header.push("density".into());
            out.row(&header)?;
            for (sample, density) in outcome.samples.iter().zip(&outcome.densities) {
                let mut row = sample.clone();
                row.push(*density);
                out.values(&row)?;
            }
        }
    }
    Ok(())
}

/// Welch spectra of current and voltage.
pub fn write_spectrum<W: Write>(out: &mut CsvOutput<W>, report: &NoiseReport) -> Result<()> {
    let spectrum = &report.frequency_domain;
    out.row(&["frequency", "current_psd", "voltage_psd"])?;
    for ((f, pi), pv) in spectrum
        .frequencies
        .iter()
        .zip(&spectrum.current_psd)
        .zip(&spectrum.voltage_psd)
    {
        out.values(&[*f, *pi, *pv])?;
    }
    Ok(())
}

/// Every adjustment the calibration loop made.
pub fn write_calibration<W: Write>(out: &mut CsvOutput<W>, report: &CalibrationReport) -> Result<()> {
    out.row(&["iteration", "component", "old_value", "new_value"])?;
    for adj in &report.adjustments {
        out.row(&[
            adj.iteration.to_string(),
            adj.component.clone(),
            adj.old_value.to_string(),
            adj.new_value.to_string(),
        ])?;
    }
    Ok(())
}

pub fn write_characterization<W: Write>(
    out: &mut CsvOutput<W>,
    records: &[CharacterizationRecord],
) -> Result<()> {
    out.row(&[
        "param_name",
        "param_value",
        "repetition",
        "avg_current",
        "std_current",
        "avg_voltage",
        "std_voltage",
        "avg_power",
        "std_power",
    ])?;
    for r in records {
        let s = &r.stats;
        let mut row = vec![r.parameter.clone(), r.value.to_string(), r.repetition.to_string()];
        row.extend(
            [
                s.current_mean,
                s.current_std,
                s.voltage_mean,
                s.voltage_std,
                s.power_mean,
                s.power_std,
            ]
            .iter()
            .map(f64::to_string),
        );
        out.row(&row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::RunMetrics;

    fn written<F>(f: F) -> String
    where
        F: FnOnce(&mut CsvOutput<Vec<u8>>) -> Result<()>,
    {
        let mut out = CsvOutput::new(Vec::new());
        f(&mut out).unwrap();
        String::from_utf8(out.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_sweep_rows() {
        let records = vec![
            SweepRecord {
                parameters: vec![("R1".to_string(), 100.0)],
                tag: RunTag::Repetition(0),
                metrics: RunMetrics {
                    voltage_mean: 5.0,
                    snr_voltage: f64::INFINITY,
                    ..RunMetrics::default()
                },
                status: RunStatus::Completed,
            },
            SweepRecord {
                parameters: vec![("R1".to_string(), 100.0)],
                tag: RunTag::Repetition(1),
                metrics: RunMetrics::default(),
                status: RunStatus::Failed {
                    reason: "Circuit has no capacitor".to_string(),
                },
            },
        ];
        let text = written(|out| write_sweep(out, &records));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "repetition,param_R1,current_mean,current_std,voltage_mean,voltage_std,snr_current,snr_voltage,status"
        );
        assert_eq!(lines[1], "0,100,0,0,5,0,0,inf,completed");
        assert!(lines[2].ends_with("\"failed: Circuit has no capacitor\""));
    }

    #[test]
    fn test_sample_row_with_energy() {
        let sample = Sample {
            time: 0.5,
            current: 1.0,
            voltage: -2.0,
            energy: Some(0.25),
        };
        let text = written(|out| {
            trajectory_header(out, true)?;
            write_sample(out, &sample)
        });
        assert_eq!(text, "time,current,voltage,energy\n0.5,1,-2,0.25\n");
    }
}
