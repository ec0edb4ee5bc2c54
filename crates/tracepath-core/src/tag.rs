//! Correlation tags
//!
//! A tag is the transport-safe encoding of a [`TracerId`]. Applications read
//! an outgoing tag from a started tracer, carry it to another thread or
//! process (header, message property, argument) and hand it to the incoming
//! tracer there. The resolver later matches both ends by id.
//!
//! The byte form is the 16 byte big-endian ULID, the string form is the
//! standard base64 encoding of the byte form.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// HTTP header under which applications conventionally carry the string tag
pub const TAG_HTTP_HEADER_NAME: &str = "X-Tracepath";

/// Message property under which applications conventionally carry the tag
pub const TAG_MESSAGE_PROPERTY_NAME: &str = "tracepathTagInfo";

/// Length of an encoded byte tag
pub const BYTE_TAG_LEN: usize = 16;

/// Marker prefixed to in-process links so they never decode as a tag
const IN_PROCESS_LINK_MARKER: u8 = 0x4c;

/// Unique identity of a tracer node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TracerId(Ulid);

impl TracerId {
    /// Issue a fresh id
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Rebuild an id from its raw value; the nil value is not an id
    pub fn from_u128(raw: u128) -> Option<Self> {
        let ulid = Ulid::from(raw);
        if ulid.is_nil() {
            None
        } else {
            Some(Self(ulid))
        }
    }

    pub fn as_u128(&self) -> u128 {
        self.0 .0
    }
}

impl Default for TracerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TracerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requested representation of an outgoing tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagForm {
    /// ASCII (base64) string tag
    String,
    /// Raw byte tag
    Bytes,
}

/// Both representations of one outgoing tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTag {
    pub string_tag: String,
    pub byte_tag: Vec<u8>,
}

/// Tag received from a caller, in whichever form it travelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomingTag {
    String(String),
    Bytes(Vec<u8>),
}

impl IncomingTag {
    pub fn is_empty(&self) -> bool {
        match self {
            IncomingTag::String(s) => s.is_empty(),
            IncomingTag::Bytes(b) => b.is_empty(),
        }
    }
}

/// Encode a tracer id into both tag forms
pub fn encode_outgoing(id: TracerId) -> EncodedTag {
    let byte_tag = encode_bytes(id);
    let string_tag = STANDARD.encode(&byte_tag);
    EncodedTag {
        string_tag,
        byte_tag,
    }
}

/// Encode a tracer id as a byte tag
pub fn encode_bytes(id: TracerId) -> Vec<u8> {
    id.as_u128().to_be_bytes().to_vec()
}

/// Encode a tracer id as a string tag
pub fn encode_string(id: TracerId) -> String {
    STANDARD.encode(encode_bytes(id))
}

/// Encode a tracer id in the requested form, string tags as ASCII bytes
pub fn encode_form(id: TracerId, form: TagForm) -> Vec<u8> {
    match form {
        TagForm::Bytes => encode_bytes(id),
        TagForm::String => encode_string(id).into_bytes(),
    }
}

/// Decode an incoming tag; malformed tags yield `None`
pub fn decode_incoming(tag: &IncomingTag) -> Option<TracerId> {
    match tag {
        IncomingTag::String(s) => decode_string(s),
        IncomingTag::Bytes(b) => decode_bytes(b),
    }
}

/// Decode a byte tag
pub fn decode_bytes(tag: &[u8]) -> Option<TracerId> {
    let raw: [u8; BYTE_TAG_LEN] = tag.try_into().ok()?;
    TracerId::from_u128(u128::from_be_bytes(raw))
}

/// Decode a string tag
pub fn decode_string(tag: &str) -> Option<TracerId> {
    let bytes = STANDARD.decode(tag.trim()).ok()?;
    decode_bytes(&bytes)
}

/// Opaque link to a tracer that was active on some thread of this process
///
/// Links are only meaningful inside the process that created them and are not
/// interchangeable with string or byte tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InProcessLink(Vec<u8>);

impl InProcessLink {
    /// Link to the given tracer, or an empty link if there is none
    pub fn new(target: Option<TracerId>) -> Self {
        match target {
            Some(id) => {
                let mut bytes = Vec::with_capacity(BYTE_TAG_LEN + 1);
                bytes.push(IN_PROCESS_LINK_MARKER);
                bytes.extend_from_slice(&encode_bytes(id));
                Self(bytes)
            }
            None => Self(Vec::new()),
        }
    }

    /// Rebuild a link from bytes previously obtained via [`InProcessLink::as_bytes`]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tracer this link points at
    pub fn target(&self) -> Option<TracerId> {
        match self.0.split_first() {
            Some((&IN_PROCESS_LINK_MARKER, rest)) => decode_bytes(rest),
            _ => None,
        }
    }
}
