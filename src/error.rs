/**
 * Errors
 *
 * NodeError covers everything the lifecycle and command path can report.
 * MixError is the narrower failure of parsing a mixer definition.
 */

use thiserror::Error;

/// Main error type for node operations
#[derive(Error, Debug)]
pub enum NodeError{
    /// Transport or node initialization failed; no task was spawned
    #[error("Init error: {0}")]
    Init(String),

    /// A node is already active on this factory
    #[error("Node already started")]
    AlreadyStarted,

    /// Acquiring a control-group subscription failed
    #[error("Subscription to control group {group} failed: {reason}")]
    Subscription{ group: usize, reason: String },

    /// Waiting on the poll set failed
    #[error("Poll error: {0}")]
    Poll(String),

    /// Mixer definition was rejected
    #[error("Mixer config error: {0}")]
    MixConfig(#[from] MixError),

    /// The output sink could not deliver a frame
    #[error("Transmit error: {0}")]
    Transmit(String),

    /// Command code not understood by the node
    #[error("Unsupported command")]
    UnsupportedCommand,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mixer definition parse and validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixError{
    #[error("mixer buffer exceeds {max} bytes")]
    TooLong{ max: usize },

    #[error("mixer buffer is not valid UTF-8")]
    InvalidUtf8,

    #[error("line {line}: {message}")]
    Syntax{ line: usize, message: String },

    #[error("line {line}: control group {group} out of range")]
    GroupOutOfRange{ line: usize, group: usize },

    #[error("line {line}: control index {index} out of range")]
    IndexOutOfRange{ line: usize, index: usize },

    #[error("mixer definition produces {count} outputs, max is {max}")]
    TooManyOutputs{ count: usize, max: usize },

    #[error("no mixers defined")]
    Empty,
}

pub type Result<T> = std::result::Result<T, NodeError>;

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_mix_error_converts_into_node_error(){
        let err: NodeError = MixError::Empty.into();
        assert!(matches!(err, NodeError::MixConfig(MixError::Empty)));
        assert_eq!(err.to_string(), "Mixer config error: no mixers defined");
    }

    #[test]
    fn test_subscription_error_message(){
        let err = NodeError::Subscription{ group: 2, reason: "no topic".into() };
        assert_eq!(err.to_string(), "Subscription to control group 2 failed: no topic");
    }
}
