use crate::{Procedure, SequenceStep};

/// Connection and wire-level failures.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("robot not connected")]
    NotConnected,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serial(#[from] serialport::Error),
    #[error("unexpected handshake response: expected `{expected}`, got `{got}`")]
    HandshakeMismatch { expected: String, got: String },
    #[error("no handshake response from device")]
    NoHandshakeResponse,
}

/// Failures of robot-level operations built on the protocol.
#[derive(thiserror::Error, Debug)]
pub enum MotionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("device rejected `{command}`: {reply}")]
    Rejected { command: String, reply: String },
    #[error("no acknowledgement for `{command}` before the response timeout ({} line(s) received)", lines.len())]
    Timeout { command: String, lines: Vec<String> },
    #[error("{procedure} aborted at step {step}: {source}")]
    Aborted {
        procedure: Procedure,
        step: SequenceStep,
        source: Box<MotionError>,
    },
}

impl MotionError {
    /// The innermost error, looking through sequence aborts.
    pub fn root(&self) -> &MotionError {
        match self {
            MotionError::Aborted { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_connected(&self) -> bool {
        matches!(
            self.root(),
            MotionError::Protocol(ProtocolError::NotConnected)
        )
    }
}
