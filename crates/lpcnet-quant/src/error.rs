//! Error handling for the quantised feature decoder
//!
//! This module defines the error types that can occur while configuring
//! the quantiser, loading codebooks and decoding coded frames.

#![allow(missing_docs)]

use std::fmt;
use thiserror::Error;

/// Result type alias for decoder operations
pub type Result<T> = std::result::Result<T, QuantError>;

/// Error type for quantiser and decoder operations
#[derive(Error, Debug)]
pub enum QuantError {
    /// Invalid quantiser configuration
    #[error("Invalid quantiser configuration: {details}")]
    InvalidConfig { details: String },

    /// Codebook data is missing, ragged or too large
    #[error("Invalid codebook: {details}")]
    InvalidCodebook { details: String },

    /// Coded frame has the wrong number of bits
    #[error("Invalid frame size: expected {expected} bits, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    /// A bit field ran past the end of the coded frame
    #[error(
        "Bitstream underrun: field of {requested} bits at position {position} \
         exceeds {available} bits"
    )]
    BitstreamUnderrun {
        position: usize,
        requested: usize,
        available: usize,
    },

    /// Decoding operation failed
    #[error("Decoding failed: {reason}")]
    DecodingFailed { reason: String },

    /// Synthesis engine failed to render a feature vector
    #[error("Synthesis failed: {reason}")]
    SynthesisFailed { reason: String },

    /// I/O operation failed
    #[error("I/O operation failed: {reason}")]
    IoError { reason: String },
}

impl QuantError {
    /// Create a new invalid configuration error
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }

    /// Create a new invalid codebook error
    pub fn invalid_codebook(details: impl Into<String>) -> Self {
        Self::InvalidCodebook {
            details: details.into(),
        }
    }

    /// Create a new decoding failed error
    pub fn decoding_failed(reason: impl Into<String>) -> Self {
        Self::DecodingFailed {
            reason: reason.into(),
        }
    }

    /// Create a new synthesis failed error
    pub fn synthesis_failed(reason: impl Into<String>) -> Self {
        Self::SynthesisFailed {
            reason: reason.into(),
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. } | Self::InvalidCodebook { .. } => {
                ErrorCategory::Configuration
            }

            Self::InvalidFrameSize { .. }
            | Self::BitstreamUnderrun { .. }
            | Self::DecodingFailed { .. } => ErrorCategory::Decoding,

            Self::SynthesisFailed { .. } => ErrorCategory::Synthesis,

            Self::IoError { .. } => ErrorCategory::Io,
        }
    }

    /// Configuration problems are reported before any output is produced
    pub fn is_configuration(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration, parameter and codebook errors
    Configuration,
    /// Bitstream and VQ decoding errors
    Decoding,
    /// Errors raised by the synthesis engine
    Synthesis,
    /// I/O related errors
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Decoding => write!(f, "Decoding"),
            Self::Synthesis => write!(f, "Synthesis"),
            Self::Io => write!(f, "I/O"),
        }
    }
}

/// Convert from I/O errors
impl From<std::io::Error> for QuantError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError {
            reason: error.to_string(),
        }
    }
}
