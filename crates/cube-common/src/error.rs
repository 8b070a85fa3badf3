//! Error types for the datacube tile and timeseries services.

use thiserror::Error;

/// Result type alias using CubeError.
pub type CubeResult<T> = Result<T, CubeError>;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backing object is absent. Expected; not a failure.
    NotFound,
    /// Malformed input or stored payload.
    Invalid,
    /// Everything else. Surfaced as a server fault.
    Internal,
}

/// Primary error type for tile and output operations.
#[derive(Debug, Error)]
pub enum CubeError {
    // === Missing data ===
    #[error("Tile not found: {0}")]
    TileNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    // === Invalid input / payload ===
    #[error("Bin count {0} is not a power of 4")]
    InvalidBinCount(u32),

    #[error("Bin position {position} out of range for {total_bins} bins")]
    InvalidBinPosition { position: u32, total_bins: u32 },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // === Internal ===
    #[error("Failed to decode stored object: {0}")]
    DecodeError(String),

    #[error("Failed to encode vector tile: {0}")]
    EncodeError(String),

    #[error("Population data unavailable: {0}")]
    PopulationUnavailable(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl CubeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CubeError::TileNotFound(_) | CubeError::ObjectNotFound(_) => ErrorKind::NotFound,

            CubeError::InvalidBinCount(_)
            | CubeError::InvalidBinPosition { .. }
            | CubeError::InvalidParameter { .. }
            | CubeError::InvalidPayload(_) => ErrorKind::Invalid,

            _ => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Invalid => 400,
            ErrorKind::Internal => 500,
        }
    }

    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CubeError {
    fn from(err: std::io::Error) -> Self {
        CubeError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for CubeError {
    fn from(err: serde_json::Error) -> Self {
        CubeError::DecodeError(format!("JSON error: {}", err))
    }
}

impl From<prost::DecodeError> for CubeError {
    fn from(err: prost::DecodeError) -> Self {
        CubeError::DecodeError(format!("protobuf error: {}", err))
    }
}
