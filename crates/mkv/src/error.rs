use ebml::EbmlError;

#[derive(Debug, thiserror::Error)]
pub enum MkvError {
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error(
        "relative timestamp {relative} of track {track_number} does not fit in a signed 16-bit block timestamp"
    )]
    TimestampOverflow { track_number: u64, relative: i64 },

    #[error("muxer already finalized")]
    Finalized,

    #[error("sink error: {source}")]
    Sink {
        #[source]
        source: std::io::Error,
    },

    #[error("invalid stream: {reason}")]
    InvalidStream { reason: String },

    #[error("EBML error: {source}")]
    Ebml {
        #[from]
        source: EbmlError,
    },
}

impl MkvError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn invalid_stream(reason: impl Into<String>) -> Self {
        Self::InvalidStream {
            reason: reason.into(),
        }
    }

    pub fn sink(source: std::io::Error) -> Self {
        Self::Sink { source }
    }

    /// Whether the muxer can keep accepting frames after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::TimestampOverflow { .. } => false,
            Self::Configuration { .. }
            | Self::Finalized
            | Self::Sink { .. }
            | Self::InvalidStream { .. }
            | Self::Ebml { .. } => true,
        }
    }
}
