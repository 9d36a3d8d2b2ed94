use crate::features::capabilities::Capability;
use thiserror::Error;

/// Failures a tool handler can run into. Every variant ends up as a single
/// entry in the message channel; none of them escape `dispatch`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("empty input: {0}")]
    EmptyInput(&'static str),
    #[error("{0}")]
    Parse(String),
    #[error("{} not loaded", .0.label())]
    CapabilityMissing(Capability),
    #[error("{0}")]
    Delegate(String),
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("failed to load {0}")]
    NetworkLoad(String),
}

impl ToolError {
    pub fn parse(err: impl std::fmt::Display) -> Self {
        ToolError::Parse(err.to_string())
    }

    pub fn delegate(err: impl std::fmt::Display) -> Self {
        ToolError::Delegate(err.to_string())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        ToolError::Storage(err.to_string())
    }

    /// Storage and network failures degrade functionality but are never shown
    /// to the user as blocking errors.
    pub fn is_silent(&self) -> bool {
        matches!(self, ToolError::Storage(_) | ToolError::NetworkLoad(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_missing_names_the_library() {
        let err = ToolError::CapabilityMissing(Capability::JsBeautify);
        assert_eq!(err.to_string(), "JavaScript Beautification Library not loaded");
    }

    #[test]
    fn storage_and_network_are_silent() {
        assert!(ToolError::storage("quota").is_silent());
        assert!(ToolError::NetworkLoad("https://cdn".into()).is_silent());
        assert!(!ToolError::parse("bad").is_silent());
    }
}
