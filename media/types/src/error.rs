/*!
    Error model for the transcoding pipeline.
*/

use thiserror::Error;

/// Convenience alias used across the pipeline crates.
pub type Result<T> = std::result::Result<T, Error>;

/**
    Errors produced by the transcoding pipeline.

    Setup-time errors (`MissingDecoder`, `MissingEncoder`,
    `UnclassifiableStream`, `HeaderParse`, `FilterSetup`) are fatal to the
    whole run — the pipeline has no per-stream-disable mode.
    `UnrecoverablePacket` is a steady-state error: the caller drops the
    packet and continues.
*/
#[derive(Debug, Error)]
pub enum Error {
    #[error("allocation failed: {0}")]
    Allocation(&'static str),

    #[error("no decoder registered for stream #{stream}")]
    MissingDecoder { stream: usize },

    #[error("no encoder registered for stream #{stream}")]
    MissingEncoder { stream: usize },

    #[error("stream #{stream} has an unclassifiable media type")]
    UnclassifiableStream { stream: usize },

    #[error("structural header parse failed: {0}")]
    HeaderParse(String),

    #[error("filter setup failed for stream #{stream}: {reason}")]
    FilterSetup { stream: usize, reason: String },

    #[error("unrecoverable packet corruption on stream #{stream} at position {pos:#010x}")]
    UnrecoverablePacket { stream: usize, pos: i64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),
}

impl Error {
    /// Wrap an FFmpeg-side error as a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Structural-header parse failure with context.
    pub fn header_parse(message: impl Into<String>) -> Self {
        Self::HeaderParse(message.into())
    }

    /// Filter-graph construction failure for one stream.
    pub fn filter_setup(stream: usize, reason: impl Into<String>) -> Self {
        Self::FilterSetup {
            stream,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_stream() {
        let err = Error::MissingDecoder { stream: 2 };
        assert_eq!(err.to_string(), "no decoder registered for stream #2");

        let err = Error::UnrecoverablePacket {
            stream: 0,
            pos: 0x1234,
        };
        assert!(err.to_string().contains("0x00001234"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
