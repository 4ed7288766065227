//! Frame and argument codec for the control protocol.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{NaiveDateTime, TimeZone, Utc};

use crate::config::params::{
    ArgosMode, ArgosModulation, ArgosPower, DebugMode, DepthPile, Encoding, GnssDynModel,
    GnssFixMode, LedMode, ParamId, ParamValue, PressureLogMode, SensorTxMode, UnderwaterSource,
    ZoneType,
};
use crate::error::ProtocolError;
use crate::protocol::commands::{self, ArgSpec, CommandDescriptor};

/// Maximum payload length of one frame.
pub const MAX_PAYLOAD_LENGTH: usize = 0xFFF;

/// Wire representation of the Argos frequency parameter.
const ARGOS_FREQUENCY_OFFSET: i64 = 4_016_200;
const ARGOS_FREQUENCY_MULT: f64 = 10_000.0;

const DATESTRING_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// A decoded argument.
#[derive(Debug, Clone, PartialEq)]
pub enum DteArg {
    Uint(u32),
    Float(f64),
    Text(String),
    Base64(Vec<u8>),
    Keys(Vec<ParamId>),
    KeyValues(Vec<(ParamId, ParamValue)>),
}

impl DteArg {
    pub fn as_uint(&self) -> Option<u32> {
        match self {
            DteArg::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            DteArg::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// A decoded request frame.
#[derive(Debug)]
pub struct Request {
    pub descriptor: &'static CommandDescriptor,
    pub args: Vec<DteArg>,
}

/// Decode failure with enough context to produce an error frame.
#[derive(Debug)]
pub struct DecodeFailure {
    pub name: Option<String>,
    pub error: ProtocolError,
}

fn failure(name: Option<&str>, error: ProtocolError) -> DecodeFailure {
    DecodeFailure {
        name: name.map(str::to_string),
        error,
    }
}

/// Parse one request line.
pub fn decode_request(line: &str) -> Result<Request, DecodeFailure> {
    let line = line.trim_end_matches(['\r', '\n']);
    let body = line
        .strip_prefix('$')
        .ok_or_else(|| failure(None, ProtocolError::BadFormat))?;

    let hash = body
        .find('#')
        .ok_or_else(|| failure(None, ProtocolError::NoLengthDelimiter))?;
    let name = &body[..hash];
    let rest = &body[hash + 1..];

    if rest.len() < 3 {
        return Err(failure(Some(name), ProtocolError::NoDataDelimiter));
    }
    let (len_field, rest) = rest.split_at(3);
    let declared_len = usize::from_str_radix(len_field, 16)
        .map_err(|_| failure(Some(name), ProtocolError::BadFormat))?;
    if declared_len > MAX_PAYLOAD_LENGTH {
        return Err(failure(Some(name), ProtocolError::MessageTooLarge));
    }

    let payload = rest
        .strip_prefix(';')
        .ok_or_else(|| failure(Some(name), ProtocolError::NoDataDelimiter))?;
    if payload.len() != declared_len {
        return Err(failure(
            Some(name),
            ProtocolError::PayloadLengthMismatch {
                expect: declared_len,
                got: payload.len(),
            },
        ));
    }

    let descriptor =
        commands::find(name).ok_or_else(|| failure(Some(name), ProtocolError::UnknownCommand))?;

    let args =
        decode_args(descriptor.args, payload).map_err(|e| failure(Some(name), e))?;
    Ok(Request { descriptor, args })
}

fn decode_args(specs: &[ArgSpec], payload: &str) -> Result<Vec<DteArg>, ProtocolError> {
    // A single list-typed argument consumes the whole payload, commas and
    // all; otherwise arguments are comma separated
    if let [spec] = specs {
        match spec.encoding {
            Encoding::KeyList => return Ok(vec![DteArg::Keys(decode_key_list(payload)?)]),
            Encoding::KeyValueList => {
                return Ok(vec![DteArg::KeyValues(decode_key_value_list(payload)?)])
            },
            _ => {},
        }
    }

    let fields: Vec<&str> = if payload.is_empty() {
        Vec::new()
    } else {
        payload.split(',').collect()
    };
    if fields.len() < specs.len() {
        return Err(ProtocolError::MissingArgument);
    }
    if fields.len() > specs.len() {
        return Err(ProtocolError::UnexpectedArgument);
    }

    specs
        .iter()
        .zip(fields)
        .map(|(spec, field)| decode_arg(spec, field))
        .collect()
}

fn decode_arg(spec: &ArgSpec, field: &str) -> Result<DteArg, ProtocolError> {
    let check_range = |value: f64| -> Result<(), ProtocolError> {
        if let Some(min) = spec.min {
            if value < min {
                return Err(ProtocolError::ValueOutOfRange);
            }
        }
        if let Some(max) = spec.max {
            if value > max {
                return Err(ProtocolError::ValueOutOfRange);
            }
        }
        Ok(())
    };

    match spec.encoding {
        Encoding::Decimal | Encoding::Uint => {
            let value: u32 = field.parse().map_err(|_| ProtocolError::BadFormat)?;
            check_range(f64::from(value))?;
            if !spec.permitted.is_empty() && !spec.permitted.contains(&value) {
                return Err(ProtocolError::ValueOutOfRange);
            }
            Ok(DteArg::Uint(value))
        },
        Encoding::Hexadecimal => {
            let value = u32::from_str_radix(field, 16).map_err(|_| ProtocolError::BadFormat)?;
            check_range(f64::from(value))?;
            if !spec.permitted.is_empty() && !spec.permitted.contains(&value) {
                return Err(ProtocolError::ValueOutOfRange);
            }
            Ok(DteArg::Uint(value))
        },
        Encoding::Float => {
            let value: f64 = field.parse().map_err(|_| ProtocolError::BadFormat)?;
            check_range(value)?;
            Ok(DteArg::Float(value))
        },
        Encoding::Text => {
            check_range(field.len() as f64)?;
            Ok(DteArg::Text(field.to_string()))
        },
        Encoding::Base64 => {
            let bytes = BASE64
                .decode(field)
                .map_err(|_| ProtocolError::BadFormat)?;
            Ok(DteArg::Base64(bytes))
        },
        _ => Err(ProtocolError::BadFormat),
    }
}

fn decode_key_list(payload: &str) -> Result<Vec<ParamId>, ProtocolError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    payload
        .split(',')
        .map(|key| ParamId::from_key(key).ok_or(ProtocolError::UnknownKey))
        .collect()
}

fn decode_key_value_list(payload: &str) -> Result<Vec<(ParamId, ParamValue)>, ProtocolError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    payload
        .split(',')
        .map(|pair| {
            let (key, value) = pair.split_once('=').ok_or(ProtocolError::BadFormat)?;
            let id = ParamId::from_key(key).ok_or(ProtocolError::UnknownKey)?;
            let value = decode_param_value(id, value)?;
            Ok((id, value))
        })
        .collect()
}

/// Parse a parameter value per its declared wire encoding.
pub fn decode_param_value(id: ParamId, field: &str) -> Result<ParamValue, ProtocolError> {
    let meta = id.meta();
    let uint = |field: &str, radix: u32| -> Result<u32, ProtocolError> {
        u32::from_str_radix(field, radix).map_err(|_| ProtocolError::BadFormat)
    };
    let in_range = |value: f64| -> Result<(), ProtocolError> {
        if meta.min.is_some_and(|min| value < min) || meta.max.is_some_and(|max| value > max) {
            return Err(ProtocolError::ValueOutOfRange);
        }
        Ok(())
    };
    let enum_byte = |field: &str| -> Result<u8, ProtocolError> {
        field
            .parse::<u8>()
            .map_err(|_| ProtocolError::BadFormat)
    };

    let value = match meta.encoding {
        Encoding::Decimal | Encoding::Uint | Encoding::AqPeriod => {
            let v = uint(field, 10)?;
            in_range(f64::from(v))?;
            ParamValue::Uint(v)
        },
        Encoding::Hexadecimal => {
            let v = uint(field, 16)?;
            in_range(f64::from(v))?;
            ParamValue::Uint(v)
        },
        Encoding::Float => {
            let v: f64 = field.parse().map_err(|_| ProtocolError::BadFormat)?;
            in_range(v)?;
            ParamValue::Float(v)
        },
        Encoding::Text => ParamValue::Text(field.to_string()),
        Encoding::Boolean => match field {
            "0" => ParamValue::Bool(false),
            "1" => ParamValue::Bool(true),
            _ => return Err(ProtocolError::BadFormat),
        },
        Encoding::Datestring => {
            let dt = NaiveDateTime::parse_from_str(field, DATESTRING_FORMAT)
                .map_err(|_| ProtocolError::BadFormat)?;
            ParamValue::DateTime(dt.and_utc().timestamp())
        },
        Encoding::ArgosFreq => {
            let raw: i64 = field.parse().map_err(|_| ProtocolError::BadFormat)?;
            let mhz = (raw + ARGOS_FREQUENCY_OFFSET) as f64 / ARGOS_FREQUENCY_MULT;
            in_range(mhz)?;
            ParamValue::Float(mhz)
        },
        Encoding::ArgosMode => {
            ParamValue::ArgosMode(
                ArgosMode::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
            )
        },
        Encoding::ArgosPower => {
            ParamValue::ArgosPower(ArgosPower::from_milliwatts(uint(field, 10)?))
        },
        Encoding::DepthPile => {
            ParamValue::DepthPile(
                DepthPile::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
            )
        },
        Encoding::GnssFixMode => {
            ParamValue::GnssFixMode(
                GnssFixMode::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
            )
        },
        Encoding::GnssDynModel => {
            ParamValue::GnssDynModel(
                GnssDynModel::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
            )
        },
        Encoding::LedMode => {
            ParamValue::LedMode(
                LedMode::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
            )
        },
        Encoding::ZoneType => {
            ParamValue::ZoneType(
                ZoneType::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
            )
        },
        Encoding::SensorTxMode => {
            ParamValue::SensorTxMode(
                SensorTxMode::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
            )
        },
        Encoding::UnderwaterSource => ParamValue::UnderwaterSource(
            UnderwaterSource::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
        ),
        Encoding::ArgosModulation => ParamValue::ArgosModulation(
            ArgosModulation::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
        ),
        Encoding::PressureLogMode => ParamValue::PressureLogMode(
            PressureLogMode::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
        ),
        Encoding::DebugMode => {
            ParamValue::DebugMode(
                DebugMode::from_u8(enum_byte(field)?).ok_or(ProtocolError::ValueOutOfRange)?,
            )
        },
        Encoding::Base64 | Encoding::KeyList | Encoding::KeyValueList => {
            return Err(ProtocolError::BadFormat)
        },
    };
    Ok(value)
}

/// Render a parameter value per its declared wire encoding.
pub fn encode_param_value(id: ParamId, value: &ParamValue) -> String {
    let meta = id.meta();
    match (meta.encoding, value) {
        (Encoding::Hexadecimal, ParamValue::Uint(v)) => format!("{v:X}"),
        (Encoding::ArgosFreq, ParamValue::Float(mhz)) => {
            let raw = (mhz * ARGOS_FREQUENCY_MULT).round() as i64 - ARGOS_FREQUENCY_OFFSET;
            format!("{raw}")
        },
        (Encoding::Datestring, ParamValue::DateTime(epoch)) => Utc
            .timestamp_opt(*epoch, 0)
            .single()
            .map(|dt| dt.format(DATESTRING_FORMAT).to_string())
            .unwrap_or_else(|| "01/01/1970 00:00:00".to_string()),
        (_, ParamValue::Uint(v)) => format!("{v}"),
        (_, ParamValue::Int(v)) => format!("{v}"),
        (_, ParamValue::Float(v)) => format!("{v}"),
        (_, ParamValue::Text(s)) => s.clone(),
        (_, ParamValue::DateTime(v)) => format!("{v}"),
        (_, ParamValue::Bool(v)) => format!("{}", u8::from(*v)),
        (_, ParamValue::ArgosMode(v)) => format!("{}", *v as u8),
        (_, ParamValue::ArgosPower(v)) => format!("{}", v.milliwatts()),
        (_, ParamValue::DepthPile(v)) => format!("{}", *v as u8),
        (_, ParamValue::GnssFixMode(v)) => format!("{}", *v as u8),
        (_, ParamValue::GnssDynModel(v)) => format!("{}", *v as u8),
        (_, ParamValue::LedMode(v)) => format!("{}", *v as u8),
        (_, ParamValue::ZoneType(v)) => format!("{}", *v as u8),
        (_, ParamValue::SensorTxMode(v)) => format!("{}", *v as u8),
        (_, ParamValue::UnderwaterSource(v)) => format!("{}", *v as u8),
        (_, ParamValue::ArgosModulation(v)) => format!("{}", *v as u8),
        (_, ParamValue::PressureLogMode(v)) => format!("{}", *v as u8),
        (_, ParamValue::DebugMode(v)) => format!("{}", *v as u8),
    }
}

/// Success frame.
pub fn encode_response(name: &str, payload: &str) -> String {
    format!("$O;{name}#{:03X};{payload}\r", payload.len())
}

/// Error frame carrying the wire error code.
pub fn encode_error(name: &str, code: u32) -> String {
    let payload = code.to_string();
    format!("$N;{name}#{:03X};{payload}\r", payload.len())
}

/// Base64 helper shared with the handler.
pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}
