/// Failure reported by a UART implementation.
#[derive(Debug, thiserror::Error)]
#[error("serial I/O failed: {0}")]
pub struct SerialError(pub String);

/// Failure reported by a register bus implementation.
#[derive(Debug, thiserror::Error)]
#[error("bus transaction failed: {0}")]
pub struct BusError(pub String);

/// Errors raised while talking AT to the modem.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Serial(#[from] SerialError),

    #[error("no response to `{command}`")]
    NoResponse { command: String },

    #[error("`{command}` rejected with {reply}")]
    Rejected { command: String, reply: String },
}

/// Errors raised by the motion sensor facade.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("unexpected WHO_AM_I 0x{0:02x}")]
    IdentityMismatch(u8),

    #[error("calibration got {valid}/{attempted} valid samples")]
    InsufficientSamples { valid: usize, attempted: usize },
}

/// Errors raised by the HTTP bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("could not connect to {host}:{port}")]
    ConnectFailed { host: String, port: u16 },

    #[error("modem never prompted for payload on link {link}")]
    NoSendPrompt { link: u8 },

    #[error("modem did not acknowledge payload on link {link}")]
    NotAcknowledged { link: u8 },

    #[error("network link is down")]
    Offline,
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
