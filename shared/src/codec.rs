use bincode::{Decode, Encode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Encoding used for frames sent to one connection. Text frames carry JSON,
/// binary frames carry the bincode standard encoding of the same enums.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WireFormat {
    #[default]
    Json,
    Binary,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid json frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid binary frame: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("failed to encode binary frame: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

pub fn encode<T>(message: &T, format: WireFormat) -> Result<Frame, CodecError>
where
    T: Serialize + Encode,
{
    match format {
        WireFormat::Json => Ok(Frame::Text(serde_json::to_string(message)?)),
        WireFormat::Binary => Ok(Frame::Binary(bincode::encode_to_vec(
            message,
            bincode::config::standard(),
        )?)),
    }
}

pub fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Upper bound on what one binary frame may claim while decoding. Same as the
/// default websocket message cap.
pub const MAX_BINARY_FRAME_LEN: usize = 64 << 20;

/// Length prefixes are checked against `MAX_BINARY_FRAME_LEN` before anything
/// is allocated, so a forged prefix is a `DecodeError::LimitExceeded`.
pub fn decode_binary<T: Decode<()>>(payload: &[u8]) -> Result<T, CodecError> {
    let config = bincode::config::standard().with_limit::<MAX_BINARY_FRAME_LEN>();
    let (message, _) = bincode::decode_from_slice(payload, config)?;
    Ok(message)
}
