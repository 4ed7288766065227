use core::fmt;

/// Errors raised by the configuration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The persisted parameter blob is missing or has a bad version code and
    /// the caller asked for a non-dynamic parameter.
    StoreCorrupted,
    /// A typed read asked for a different variant than the one declared for
    /// the parameter.
    WrongType { param: &'static str },
    /// The value does not fit the declared range of the parameter.
    OutOfRange { param: &'static str },
    /// Attempt to write a read-only parameter through a path that does not
    /// silently ignore such writes.
    ReadOnly { param: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::StoreCorrupted => f.write_str("configuration store is corrupted"),
            ConfigError::WrongType { param } => {
                write!(f, "wrong value type for parameter {param}")
            },
            ConfigError::OutOfRange { param } => {
                write!(f, "value out of range for parameter {param}")
            },
            ConfigError::ReadOnly { param } => write!(f, "parameter {param} is read-only"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors raised while decoding a control-protocol frame or its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame envelope is malformed (missing `$`, bad characters, ...).
    BadFormat,
    /// No `#` length delimiter found.
    NoLengthDelimiter,
    /// No `;` data delimiter found.
    NoDataDelimiter,
    /// The declared payload length does not match the received payload.
    PayloadLengthMismatch { expect: usize, got: usize },
    /// The command name is not in the command table.
    UnknownCommand,
    /// A parameter key is not in the parameter table.
    UnknownKey,
    /// More arguments supplied than the command prototype declares.
    UnexpectedArgument,
    /// Fewer arguments supplied than the command prototype declares.
    MissingArgument,
    /// An argument fails its range or permitted-value constraint.
    ValueOutOfRange,
    /// The frame exceeds the maximum payload length.
    MessageTooLarge,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::BadFormat => f.write_str("malformed frame"),
            ProtocolError::NoLengthDelimiter => f.write_str("missing length delimiter"),
            ProtocolError::NoDataDelimiter => f.write_str("missing data delimiter"),
            ProtocolError::PayloadLengthMismatch { expect, got } => {
                write!(f, "payload length mismatch, expect {expect}, got {got}")
            },
            ProtocolError::UnknownCommand => f.write_str("unknown command"),
            ProtocolError::UnknownKey => f.write_str("unrecognised parameter key"),
            ProtocolError::UnexpectedArgument => f.write_str("unexpected argument"),
            ProtocolError::MissingArgument => f.write_str("missing argument"),
            ProtocolError::ValueOutOfRange => f.write_str("argument value out of range"),
            ProtocolError::MessageTooLarge => f.write_str("message too large"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Errors surfaced by the external device interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The device (or the sensor channel) is not fitted or not responding.
    Unavailable,
    /// The request cannot be honoured in the device's current state.
    Busy,
    /// The transport to the device failed.
    Transport,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Unavailable => f.write_str("device unavailable"),
            DeviceError::Busy => f.write_str("device busy"),
            DeviceError::Transport => f.write_str("device transport failure"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Errors raised by a pass-prediction implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepassError {
    /// The predictor's working pool cannot hold all candidate passes.
    /// Callers treat this as "no pass found" and do not transmit.
    PoolExhausted { capacity: usize },
    /// The AOP table holds no operational satellite.
    NoOperationalSatellite,
}

impl fmt::Display for PrepassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrepassError::PoolExhausted { capacity } => {
                write!(f, "pass prediction pool exhausted (capacity {capacity})")
            },
            PrepassError::NoOperationalSatellite => f.write_str("no operational satellite in AOP"),
        }
    }
}

impl std::error::Error for PrepassError {}

/// Filesystem failures. Mount failure is the only error in the system that
/// escalates to the device Error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesystemError {
    MountFailed,
    FormatFailed,
    Io,
}

impl fmt::Display for FilesystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilesystemError::MountFailed => f.write_str("filesystem mount failed"),
            FilesystemError::FormatFailed => f.write_str("filesystem format failed"),
            FilesystemError::Io => f.write_str("filesystem I/O error"),
        }
    }
}

impl std::error::Error for FilesystemError {}
