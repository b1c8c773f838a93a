/// Convenience result type used across scenecast.
pub type ReelResult<T> = Result<T, ReelError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid user-provided project, scene, or configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation was attempted from a state that does not allow it (for example a second
    /// concurrent traversal, or editing scenes during a render).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Nothing to render: no scenes, or the muxer received zero frames.
    #[error("empty sequence: {0}")]
    EmptySequence(String),

    /// An external generator (image, narration, script) failed. Always recoverable.
    #[error("generation error: {0}")]
    Generation(String),

    /// Frame/audio encoding or container muxing failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::InvalidState`] value.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Build a [`ReelError::EmptySequence`] value.
    pub fn empty_sequence(msg: impl Into<String>) -> Self {
        Self::EmptySequence(msg.into())
    }

    /// Build a [`ReelError::Generation`] value.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Build a [`ReelError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`ReelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Generator failures are recovered locally with a placeholder; everything else is fatal to
    /// the operation that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Generation(_))
    }
}

impl From<serde_json::Error> for ReelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
