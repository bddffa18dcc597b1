use thiserror::Error;

/// Fatal faults in simulator inputs, raised at startup before any loop runs.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("grid size must be positive, got {0}")]
    InvalidGridSize(i64),
    #[error("city center ({lat}, {lon}) is outside valid coordinates")]
    InvalidCenter { lat: f64, lon: f64 },
    #[error("invalid setting {key}: {value:?}")]
    InvalidSetting { key: &'static str, value: String },
}

/// Faults while moving batches across the event channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel connection failed: {0}")]
    Connect(String),
    #[error("serialized reading is {size} bytes, batch capacity is {capacity}")]
    OversizedRecord { size: usize, capacity: usize },
    #[error("reading failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("batch send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
    #[error("channel closed")]
    Closed,
}

impl TransportError {
    /// Oversized payloads and serialization faults are configuration
    /// errors; retrying cannot fix them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SendFailed(_) | Self::ReceiveFailed(_))
    }
}
