//! Error types for pipeline construction and per-frame pass execution

use thiserror::Error;

use crate::buffer::{BufferId, PixelFormat};

/// Fatal configuration errors, raised while building or resizing a pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Cel-shading needs at least two bands, `floor(ndl*n)/(n-1)` divides by `n-1`
    #[error("cel step count must be greater than 1, got {0}")]
    StepCount(u32),

    #[error("{name} must be positive, got {value}")]
    NonPositiveGamma { name: &'static str, value: f32 },

    #[error("render target must be non-empty, got {width}x{height}")]
    ZeroSizeTarget { width: u32, height: u32 },

    #[error("buffer {buffer:?} is written by both '{first}' and '{second}'")]
    DuplicateWriter {
        buffer: BufferId,
        first: &'static str,
        second: &'static str,
    },

    #[error("pass '{pass}' reads {buffer:?} but no pass produces it")]
    MissingProducer { pass: &'static str, buffer: BufferId },

    #[error("buffer dependency cycle through pass '{0}'")]
    Cycle(&'static str),

    #[error("failed to load preset: {0}")]
    Preset(String),
}

/// Recoverable, single-frame failures. The pipeline logs these and degrades
/// the frame instead of propagating them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PassError {
    #[error("input buffer {0:?} is not available this frame")]
    MissingInput(BufferId),

    #[error("buffer {buffer:?} holds {found:?} pixels, expected {expected:?}")]
    FormatMismatch {
        buffer: BufferId,
        expected: PixelFormat,
        found: PixelFormat,
    },

    #[error("pass '{pass}' expected {expected} output buffers, got {found}")]
    OutputLayout {
        pass: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid frame parameter: {0}")]
    InvalidParameter(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type PassResult<T> = Result<T, PassError>;
