use flyweight_api::{CodecError, MalformedGuidError, NetGuid};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("No free network address left for device {0}")]
    AddressTableFull(NetGuid),

    #[error("Device {0} is not registered")]
    UnknownDevice(NetGuid),

    #[error("Device {0} is already registered")]
    DuplicateDevice(NetGuid),

    #[error(transparent)]
    MalformedGuid(#[from] MalformedGuidError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ControllerError {
    /// Errors that must reach whoever triggered the operation instead of only being logged.
    pub fn is_surfaced(&self) -> bool {
        matches!(self, ControllerError::AddressTableFull(_))
    }
}
