//! Time steppers for the loop dynamics.
//!
//! [`DormandPrince`] is an adaptive explicit Runge-Kutta 5(4) stepper for
//! the deterministic drift. After each accepted step the caller may
//! perturb the new state (thermal noise), so the stepper re-evaluates the
//! first stage every step instead of reusing the last one.

use super::dynamics::State;
use crate::error::{Result, ThermoError};

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// Fifth-order weights
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between fifth- and fourth-order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

/// Step counters for one integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
}

/// Adaptive Dormand-Prince RK45 stepper.
#[derive(Debug, Clone)]
pub struct DormandPrince {
    rtol: f64,
    atol: f64,
    max_step: f64,
    /// Suggested size of the next step; `None` until the first step
    step: Option<f64>,
    stats: StepStats,
}

impl DormandPrince {
    pub fn new(rtol: f64, atol: f64, max_step: f64) -> Self {
        Self {
            rtol,
            atol,
            max_step,
            step: None,
            stats: StepStats::default(),
        }
    }

    pub fn stats(&self) -> StepStats {
        self.stats
    }

    /// Advance `state` from `t` to exactly `t_end`.
    ///
    /// `f` is the drift. `on_accept(t_new, h, state)` runs after every
    /// accepted step and may modify the state before the next step.
    pub fn advance<F, A>(
        &mut self,
        f: &F,
        t: f64,
        state: State,
        t_end: f64,
        on_accept: &mut A,
    ) -> Result<State>
    where
        F: Fn(f64, State) -> State,
        A: FnMut(f64, f64, &mut State),
    {
        let mut t = t;
        let mut y = state;
        let mut h_next = match self.step {
            Some(h) => h,
            None => self.initial_step(f, t, y, t_end - t),
        };

        while t < t_end {
            let min_step = 10.0 * f64::EPSILON * t.abs().max(t_end.abs());
            let remaining = t_end - t;
            let h_try = h_next.min(self.max_step);
            // Never leave a remainder below the smallest usable step.
            let clipped = remaining - h_try <= min_step;
            let h = if clipped { remaining } else { h_try };

            if h < min_step {
                return Err(ThermoError::StepSizeUnderflow { time: t, step: h });
            }

            let (y_new, error) = self.try_step(f, t, y, h);
            let norm = if y_new.is_finite() {
                self.error_norm(y, y_new, error)
            } else {
                f64::INFINITY
            };

            if norm <= 1.0 {
                t = if clipped { t_end } else { t + h };
                y = y_new;
                on_accept(t, h, &mut y);
                if !y.is_finite() {
                    return Err(ThermoError::numerical("stochastic RK45 step", t));
                }
                self.stats.accepted += 1;

                let factor = if norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * norm.powf(ERROR_EXPONENT)).min(MAX_FACTOR)
                };
                // A step shortened to hit a checkpoint says little about
                // the achievable step size.
                h_next = if clipped { h_next.max(h * factor) } else { h * factor };
            } else {
                self.stats.rejected += 1;
                let factor = if norm.is_finite() {
                    (SAFETY * norm.powf(ERROR_EXPONENT)).max(MIN_FACTOR)
                } else {
                    MIN_FACTOR
                };
                h_next = h * factor;
            }
        }

        self.step = Some(h_next.min(self.max_step));
        Ok(y)
    }

    /// One Dormand-Prince step, returning the fifth-order solution and the
    /// local error estimate.
    fn try_step<F>(&mut self, f: &F, t: f64, y: State, h: f64) -> (State, State)
    where
        F: Fn(f64, State) -> State,
    {
        let k1 = f(t, y);
        let k2 = f(t + C2 * h, y + k1 * (h * A21));
        let k3 = f(t + C3 * h, y + k1 * (h * A31) + k2 * (h * A32));
        let k4 = f(
            t + C4 * h,
            y + k1 * (h * A41) + k2 * (h * A42) + k3 * (h * A43),
        );
        let k5 = f(
            t + C5 * h,
            y + k1 * (h * A51) + k2 * (h * A52) + k3 * (h * A53) + k4 * (h * A54),
        );
        let k6 = f(
            t + h,
            y + k1 * (h * A61) + k2 * (h * A62) + k3 * (h * A63) + k4 * (h * A64) + k5 * (h * A65),
        );
        let y_new = y + k1 * (h * B1) + k3 * (h * B3) + k4 * (h * B4) + k5 * (h * B5) + k6 * (h * B6);
        let k7 = f(t + h, y_new);
        self.stats.evaluations += 7;

        let error = k1 * (h * E1) + k3 * (h * E3) + k4 * (h * E4) + k5 * (h * E5) + k6 * (h * E6) + k7 * (h * E7);
        (y_new, error)
    }

    /// RMS of the error scaled by `atol + rtol * max(|y|, |y_new|)`.
    fn error_norm(&self, y: State, y_new: State, error: State) -> f64 {
        let scale_i = self.atol + self.rtol * y.current.abs().max(y_new.current.abs());
        let scale_v = self.atol + self.rtol * y.voltage.abs().max(y_new.voltage.abs());
        let ei = error.current / scale_i;
        let ev = error.voltage / scale_v;
        (0.5 * (ei * ei + ev * ev)).sqrt()
    }

    /// Starting step from the scaled magnitudes of the state and its
    /// derivative.
    fn initial_step<F>(&mut self, f: &F, t: f64, y: State, span: f64) -> f64
    where
        F: Fn(f64, State) -> State,
    {
        let d = f(t, y);
        self.stats.evaluations += 1;
        let scale_i = self.atol + self.rtol * y.current.abs();
        let scale_v = self.atol + self.rtol * y.voltage.abs();
        let rms = |a: f64, b: f64| (0.5 * ((a / scale_i).powi(2) + (b / scale_v).powi(2))).sqrt();
        let d0 = rms(y.current, y.voltage);
        let d1 = rms(d.current, d.voltage);

        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };
        h0.min(self.max_step).min(span.abs().max(f64::MIN_POSITIVE))
    }
}

/// One forward Euler step of size `dt` with derivative `derivative`.
pub fn euler_step(state: State, derivative: State, dt: f64) -> State {
    state + derivative * dt
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exponential_decay_hits_checkpoints() {
        let f = |_t: f64, y: State| State::new(-y.current, -2.0 * y.voltage);
        let mut stepper = DormandPrince::new(1e-8, 1e-10, f64::INFINITY);
        let mut y = State::new(1.0, 1.0);
        let mut t = 0.0;
        let mut last_t = 0.0;
        let mut on_accept = |t_new: f64, _h: f64, _y: &mut State| last_t = t_new;
        for k in 1..=10 {
            let t_end = k as f64 * 0.1;
            y = stepper.advance(&f, t, y, t_end, &mut on_accept).unwrap();
            t = t_end;
        }
        assert_eq!(last_t, 1.0);
        assert_relative_eq!(y.current, (-1.0_f64).exp(), max_relative = 1e-6);
        assert_relative_eq!(y.voltage, (-2.0_f64).exp(), max_relative = 1e-6);
        assert!(stepper.stats().accepted >= 10);
    }

    #[test]
    fn test_oscillator_conserves_amplitude() {
        // i' = -v, v' = i
        let f = |_t: f64, y: State| State::new(-y.voltage, y.current);
        let mut stepper = DormandPrince::new(1e-9, 1e-12, 0.1);
        let y = stepper
            .advance(
                &f,
                0.0,
                State::new(1.0, 0.0),
                2.0 * std::f64::consts::PI,
                &mut |_: f64, _: f64, _: &mut State| {},
            )
            .unwrap();
        assert_relative_eq!(y.current, 1.0, epsilon = 1e-6);
        assert_relative_eq!(y.voltage, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_non_finite_drift_stalls_integration() {
        let f = |t: f64, y: State| {
            if t > 0.5 {
                State::new(f64::NAN, 0.0)
            } else {
                y
            }
        };
        let mut stepper = DormandPrince::new(1e-3, 1e-6, f64::INFINITY);
        let err = stepper
            .advance(&f, 0.0, State::new(1.0, 0.0), 2.0, &mut |_: f64, _: f64, _: &mut State| {})
            .unwrap_err();
        assert!(matches!(
            err,
            ThermoError::StepSizeUnderflow { .. } | ThermoError::NumericalFailure { .. }
        ));
    }

    #[test]
    fn test_max_step_caps_every_step() {
        let f = |_t: f64, y: State| State::new(-y.current, 0.0);
        let mut stepper = DormandPrince::new(1e-3, 1e-6, 1e-3);
        let mut largest: f64 = 0.0;
        let mut on_accept = |_t: f64, h: f64, _y: &mut State| largest = largest.max(h);
        let mut y = State::new(1.0, 0.0);
        for k in 1..=10 {
            y = stepper
                .advance(&f, (k - 1) as f64 * 0.01, y, k as f64 * 0.01, &mut on_accept)
                .unwrap();
        }
        assert!(largest <= 1e-3 * (1.0 + 1e-12), "step {largest} exceeds cap");
        assert!(stepper.stats().accepted >= 100);
        assert_relative_eq!(y.current, (-0.1_f64).exp(), max_relative = 1e-4);
    }

    #[test]
    fn test_euler_step() {
        let next = euler_step(State::new(1.0, 2.0), State::new(10.0, -20.0), 0.1);
        assert_relative_eq!(next.current, 2.0);
        assert_relative_eq!(next.voltage, 0.0);
    }
}
