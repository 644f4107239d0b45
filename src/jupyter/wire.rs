//! The Jupyter v5.3 wire codec.
//!
//! A message on the wire is: zero or more routing-id frames, the literal
//! `<IDS|MSG>` delimiter, a lowercase-hex HMAC signature, the four JSON
//! dict frames (header, parent header, metadata, content), then any raw
//! binary buffers. The signature covers exactly the four dict frames.
//!
//! Canonical JSON is UTF-8, keys sorted, compact separators; serialization
//! routes every frame through `serde_json::Value` (whose object map is
//! key-ordered) so round-trips are byte-stable.

use bytes::Bytes;
use serde_json::Value as JsonValue;
use zeromq::ZmqMessage;

use crate::jupyter::errors::WireError;
use crate::jupyter::messages::MessageHeader;
use crate::jupyter::signature::MessageSigner;

pub const DELIMITER: &[u8] = b"<IDS|MSG>";

#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    /// Routing identities; on IOPub broadcasts, a single topic frame.
    pub ids: Vec<Bytes>,
    pub header: MessageHeader,
    pub parent_header: Option<MessageHeader>,
    pub metadata: JsonValue,
    pub content: JsonValue,
    /// Trailing frames carried through opaquely.
    pub buffers: Vec<Bytes>,
}

impl WireMessage {
    /// Parse and verify a frame sequence.
    pub fn parse(frames: &[Bytes], signer: &MessageSigner) -> Result<Self, WireError> {
        let delim_index = frames
            .iter()
            .position(|frame| frame.as_ref() == DELIMITER)
            .ok_or_else(|| WireError::BadFrame("missing <IDS|MSG> delimiter".to_string()))?;

        if frames.len() < delim_index + 6 {
            return Err(WireError::BadFrame(format!(
                "expected signature and four dict frames after delimiter, got {}",
                frames.len() - delim_index - 1
            )));
        }

        // empty identity frames are dropped, as the reference parser does
        let ids: Vec<Bytes> = frames[..delim_index]
            .iter()
            .filter(|frame| !frame.is_empty())
            .cloned()
            .collect();

        let signature = std::str::from_utf8(&frames[delim_index + 1])
            .map_err(|_| WireError::BadFrame("signature frame is not UTF-8".to_string()))?;
        let header_bytes = &frames[delim_index + 2];
        let parent_bytes = &frames[delim_index + 3];
        let metadata_bytes = &frames[delim_index + 4];
        let content_bytes = &frames[delim_index + 5];

        if !signer.verify(
            signature,
            &[header_bytes, parent_bytes, metadata_bytes, content_bytes],
        ) {
            return Err(WireError::BadSignature);
        }

        let header: MessageHeader = serde_json::from_slice(header_bytes)?;
        let parent_header = parse_optional_header(parent_bytes)?;
        let metadata: JsonValue = parse_dict_frame(metadata_bytes)?;
        let content: JsonValue = parse_dict_frame(content_bytes)?;

        Ok(Self {
            ids,
            header,
            parent_header,
            metadata,
            content,
            buffers: frames[delim_index + 6..].to_vec(),
        })
    }

    pub fn from_zmq(message: &ZmqMessage, signer: &MessageSigner) -> Result<Self, WireError> {
        let frames: Vec<Bytes> = message.iter().cloned().collect();
        Self::parse(&frames, signer)
    }

    /// Serialize with canonical JSON and a fresh signature.
    pub fn to_frames(&self, signer: &MessageSigner) -> Result<Vec<Bytes>, WireError> {
        let header_bytes = canonical_json(&serde_json::to_value(&self.header)?)?;
        let parent_bytes = match &self.parent_header {
            Some(parent) => canonical_json(&serde_json::to_value(parent)?)?,
            None => b"{}".to_vec(),
        };
        let metadata_bytes = canonical_json(&self.metadata)?;
        let content_bytes = canonical_json(&self.content)?;

        let signature = signer.sign(&[
            &header_bytes,
            &parent_bytes,
            &metadata_bytes,
            &content_bytes,
        ]);

        let mut frames: Vec<Bytes> = Vec::with_capacity(self.ids.len() + 6 + self.buffers.len());
        frames.extend(self.ids.iter().cloned());
        frames.push(Bytes::from_static(DELIMITER));
        frames.push(Bytes::from(signature.into_bytes()));
        frames.push(Bytes::from(header_bytes));
        frames.push(Bytes::from(parent_bytes));
        frames.push(Bytes::from(metadata_bytes));
        frames.push(Bytes::from(content_bytes));
        frames.extend(self.buffers.iter().cloned());
        Ok(frames)
    }

    pub fn to_zmq(&self, signer: &MessageSigner) -> Result<ZmqMessage, WireError> {
        let frames = self.to_frames(signer)?;
        ZmqMessage::try_from(frames)
            .map_err(|err| WireError::Encode(format!("cannot build zmq message: {err}")))
    }

    /// Typed view of the content frame.
    pub fn content_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, WireError> {
        Ok(serde_json::from_value(self.content.clone())?)
    }

    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }
}

fn parse_optional_header(bytes: &[u8]) -> Result<Option<MessageHeader>, WireError> {
    if bytes.is_empty() || bytes == b"{}" {
        return Ok(None);
    }
    let value: JsonValue = serde_json::from_slice(bytes)?;
    match &value {
        JsonValue::Object(map) if map.is_empty() => Ok(None),
        JsonValue::Object(_) => Ok(Some(serde_json::from_value(value)?)),
        _ => Err(WireError::BadFrame(
            "parent header frame is not a JSON object".to_string(),
        )),
    }
}

fn parse_dict_frame(bytes: &[u8]) -> Result<JsonValue, WireError> {
    if bytes.is_empty() {
        return Ok(JsonValue::Object(serde_json::Map::new()));
    }
    let value: JsonValue = serde_json::from_slice(bytes)?;
    if !value.is_object() {
        return Err(WireError::BadFrame(
            "dict frame is not a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Compact, key-sorted JSON bytes. `serde_json::Value` objects already
/// iterate in key order, so plain serialization is canonical.
fn canonical_json(value: &JsonValue) -> Result<Vec<u8>, WireError> {
    serde_json::to_vec(value).map_err(|err| WireError::Encode(err.to_string()))
}
