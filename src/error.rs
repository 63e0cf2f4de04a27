//! Error types for the thermocircuit simulator.
//!
//! This module provides a unified error type [`ThermoError`] that covers
//! all error conditions that can occur during circuit description parsing,
//! circuit assembly, simulation, annealing and ensemble runs.

use thiserror::Error;

use crate::circuit::ComponentKind;

/// Result type alias using [`ThermoError`].
pub type Result<T> = std::result::Result<T, ThermoError>;

/// Unified error type for all thermocircuit operations.
#[derive(Error, Debug)]
pub enum ThermoError {
    // ============ Description Parsing Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Component name does not start with a known kind prefix
    #[error("Unknown component type '{name}' at line {line} (expected prefix R, L, C or V)")]
    UnknownComponentType { name: String, line: usize },

    // ============ Circuit Assembly Errors ============
    /// A required circuit role has no component
    #[error("Circuit has no {kind} - a resistor, inductor, capacitor and source are all required")]
    MissingComponent { kind: ComponentKind },

    /// Duplicate component name
    #[error("Duplicate component name '{name}'")]
    DuplicateComponent { name: String },

    /// Component lookup by name failed
    #[error("Component '{name}' not found in circuit")]
    ComponentNotFound { name: String },

    /// Temperature must be strictly positive
    #[error("Invalid temperature {value} K - temperature must be positive")]
    InvalidTemperature { value: f64 },

    /// Invalid parameter value
    #[error("Invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // ============ Numerical Errors ============
    /// Non-finite values or scores appeared during integration or annealing.
    /// `time` is the simulation time, or the iteration for annealing runs.
    #[error("Numerical failure in {context} at t={time:.3e}")]
    NumericalFailure { context: String, time: f64 },

    /// Adaptive integrator could not make progress
    #[error("Step size underflow at t={time:.3e} (step {step:.2e})")]
    StepSizeUnderflow { time: f64, step: f64 },

    // ============ Execution Errors ============
    /// Run stopped by a cancellation token
    #[error("Cancelled after {completed} completed iterations")]
    Cancelled { completed: usize },

    /// Worker pool could not be created
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    // ============ I/O Errors ============
    /// Error reading a circuit file
    #[error("Failed to read circuit file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing result rows
    #[error("Output error: {message}")]
    OutputError { message: String },

    /// Error encoding or decoding a circuit configuration
    #[error("Circuit configuration error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ThermoError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create a numerical failure error
    pub fn numerical(context: impl Into<String>, time: f64) -> Self {
        Self::NumericalFailure {
            context: context.into(),
            time,
        }
    }

    /// Whether this error is a configuration problem the caller has to fix
    /// before running again.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingComponent { .. }
                | Self::DuplicateComponent { .. }
                | Self::ComponentNotFound { .. }
                | Self::InvalidTemperature { .. }
                | Self::InvalidParameter { .. }
        )
    }
}
