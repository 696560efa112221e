use thiserror::Error;

/// Faults raised while talking to the player over the bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The player could not be reached when opening a session.
    #[error("cannot reach {bus_name}: {reason}")]
    Connect { bus_name: String, reason: String },

    /// A call failed on the wire. Triggers a reconnect.
    #[error("{0}")]
    Transport(String),

    /// The player does not implement this property or method.
    #[error("{member} is not supported by the player")]
    Unsupported { member: String },

    /// Any other error reply from the player.
    #[error("{message}")]
    #[allow(dead_code)]
    Remote { name: String, message: String },

    #[error("property {property} is not a {expected}")]
    InvalidProperty {
        property: String,
        expected: &'static str,
    },

    #[error("failed to decode reply: {0}")]
    Decode(String),

    /// Reconnecting gave up; the process cannot continue.
    #[error("Broken pipe! Gave up after {attempts} reconnect attempts")]
    Unrecoverable { attempts: u32 },
}

impl BusError {
    pub fn is_transport(&self) -> bool {
        matches!(self, BusError::Transport(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, BusError::Unsupported { .. })
    }

    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, BusError::Unrecoverable { .. })
    }
}

pub type BusResult<T> = Result<T, BusError>;
