use crate::foundation::core::FrameIndex;

/// Convenience result type used across framelab.
pub type FramelabResult<T> = Result<T, FramelabError>;

/// Top-level error taxonomy used by pipeline APIs.
#[derive(thiserror::Error, Debug)]
pub enum FramelabError {
    /// Invalid user-provided configuration or data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A frame could not be decoded from its source.
    #[error("decode error: {0}")]
    Decode(String),

    /// A frame could not be written to its destination.
    #[error("encode error: {0}")]
    Encode(String),

    /// Motion estimation could not run on the given input.
    #[error("motion error: {0}")]
    Motion(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// The job was cancelled cooperatively.
    #[error("cancelled")]
    Cancelled,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramelabError {
    /// Build a [`FramelabError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FramelabError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`FramelabError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`FramelabError::Motion`] value.
    pub fn motion(msg: impl Into<String>) -> Self {
        Self::Motion(msg.into())
    }

    /// Build a [`FramelabError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Prefix the message with the frame it concerns, keeping the variant.
    pub fn at_frame(self, frame: FrameIndex) -> Self {
        match self {
            Self::Validation(m) => Self::Validation(format!("frame {}: {m}", frame.0)),
            Self::Decode(m) => Self::Decode(format!("frame {}: {m}", frame.0)),
            Self::Encode(m) => Self::Encode(format!("frame {}: {m}", frame.0)),
            Self::Motion(m) => Self::Motion(format!("frame {}: {m}", frame.0)),
            Self::Serde(m) => Self::Serde(format!("frame {}: {m}", frame.0)),
            other => other,
        }
    }
}

impl From<serde_json::Error> for FramelabError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
