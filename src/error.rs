use thiserror::Error;

/// Failures raised by the MIDI transport while talking to the OS MIDI subsystem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MidiError {
    #[error("Failed to initialize MIDI client: {0}")]
    Init(String),

    #[error("Failed to open MIDI port {index}: {reason}")]
    Connect { index: usize, reason: String },

    #[error("MIDI port {index} is no longer available")]
    PortVanished { index: usize },

    #[error("Failed to send MIDI message: {0}")]
    Send(String),
}

impl From<midir::InitError> for MidiError {
    fn from(e: midir::InitError) -> Self {
        MidiError::Init(e.to_string())
    }
}

impl From<midir::SendError> for MidiError {
    fn from(e: midir::SendError) -> Self {
        MidiError::Send(e.to_string())
    }
}
