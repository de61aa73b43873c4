//! Wire encodings for events.

use std::{fmt, str::FromStr};

use rmp_serde::Serializer;
use serde::Serialize;

use crate::{
    config::env,
    error::{ConfigError, EncodeError},
    event::Event,
};

/// Leading bytes of every MessagePack frame.
pub const MSGPACK_MAGIC: [u8; 2] = [3, 23];

/// Largest MessagePack payload expressible in the two-byte length header.
pub const MSGPACK_MAX_PAYLOAD: usize = 0xffff;

/// How events are framed on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Magic bytes, big-endian `u16` length, then a MessagePack map.
    MsgPack,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown wire format: {0}")]
pub struct ParseFormatError(pub String);

impl FromStr for WireFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "msgpack" | "messagepack" => Ok(Self::MsgPack),
            other => Err(ParseFormatError(other.to_owned())),
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::MsgPack => "msgpack",
        })
    }
}

impl WireFormat {
    /// Read `EVENTLOG_FORMAT`, defaulting to JSON when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(env::FORMAT) {
            Ok(raw) if !raw.trim().is_empty() => raw
                .parse()
                .map_err(|err: ParseFormatError| {
                    ConfigError::invalid(env::FORMAT, err.to_string())
                }),
            _ => Ok(Self::default()),
        }
    }

    /// Encode `event` into one self-delimiting frame no longer than `max_len`.
    pub fn encode(self, event: &Event, max_len: usize) -> Result<Vec<u8>, EncodeError> {
        let frame = match self {
            Self::Json => encode_json(event)?,
            Self::MsgPack => encode_msgpack(event)?,
        };
        if frame.len() > max_len {
            return Err(EncodeError::TooLarge {
                len: frame.len(),
                max: max_len,
            });
        }
        Ok(frame)
    }
}

fn encode_json(event: &Event) -> Result<Vec<u8>, EncodeError> {
    let mut buf = serde_json::to_vec(event)?;
    buf.push(b'\n');
    Ok(buf)
}

fn encode_msgpack(event: &Event) -> Result<Vec<u8>, EncodeError> {
    let mut payload = Vec::with_capacity(256);
    event.serialize(&mut Serializer::new(&mut payload).with_struct_map())?;
    let len = u16::try_from(payload.len()).map_err(|_| EncodeError::TooLarge {
        len: payload.len(),
        max: MSGPACK_MAX_PAYLOAD,
    })?;
    let mut framed = Vec::with_capacity(payload.len() + 4);
    framed.extend_from_slice(&MSGPACK_MAGIC);
    framed.extend(len.to_be_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}
