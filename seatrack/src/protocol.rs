//! Framed ASCII control protocol spoken over the local transport.
//!
//! Requests look like `$CMD#LLL;arg1,arg2,...\r` where `LLL` is the payload
//! length in hex; responses are `$O;CMD#LLL;payload\r` on success and
//! `$N;CMD#LLL;code\r` on error. The command set covers parameter access,
//! profile naming, AOP upload, log dump/erase, calibration and manual
//! transmissions.

pub mod codec;
pub mod commands;
pub mod handler;

pub use handler::{DteAction, DteEnv, DteHandler};

/// Error taxonomy returned on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DteError {
    Ok = 0,
    IncorrectCommand = 1,
    NoLengthDelimiter = 2,
    NoDataDelimiter = 3,
    DataLengthMismatch = 4,
    IncorrectData = 5,
}

impl From<crate::error::ProtocolError> for DteError {
    fn from(e: crate::error::ProtocolError) -> Self {
        use crate::error::ProtocolError;
        match e {
            ProtocolError::UnknownCommand => DteError::IncorrectCommand,
            ProtocolError::NoLengthDelimiter => DteError::NoLengthDelimiter,
            ProtocolError::NoDataDelimiter => DteError::NoDataDelimiter,
            ProtocolError::PayloadLengthMismatch { .. } => DteError::DataLengthMismatch,
            _ => DteError::IncorrectData,
        }
    }
}
