//! Payload location and its byte-exact serialized form.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Where a record's payload lives.
///
/// Exactly one variant holds at any instant. The embedded variant carries the
/// payload inline; the remote variant carries only an object key.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use formvault_core::PayloadLocation;
///
/// let location = PayloadLocation::Embedded {
///     data: Bytes::from_static(b"\x00\xffhello"),
/// };
/// let json = serde_json::to_string(&location).unwrap();
/// assert_eq!(json, r#"{"backend":"embedded","data":"AP9oZWxsbw=="}"#);
///
/// let back: PayloadLocation = serde_json::from_str(&json).unwrap();
/// assert_eq!(back, location);
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum PayloadLocation {
    /// Payload stored inline with the record.
    Embedded {
        /// Raw payload bytes
        #[serde(with = "base64_bytes")]
        data: Bytes,
    },
    /// Payload stored in the remote object store.
    Remote {
        /// Object key in the remote store
        key: String,
    },
}

impl PayloadLocation {
    /// True when the payload is held inline.
    pub fn is_embedded(&self) -> bool {
        matches!(self, PayloadLocation::Embedded { .. })
    }

    /// True when the payload lives in the remote store.
    pub fn is_remote(&self) -> bool {
        matches!(self, PayloadLocation::Remote { .. })
    }

    /// Inline payload, if embedded.
    pub fn embedded_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadLocation::Embedded { data } => Some(data),
            PayloadLocation::Remote { .. } => None,
        }
    }

    /// Remote object key, if remote.
    pub fn remote_key(&self) -> Option<&str> {
        match self {
            PayloadLocation::Embedded { .. } => None,
            PayloadLocation::Remote { key } => Some(key),
        }
    }

    /// Short backend label for logs.
    pub fn backend_name(&self) -> &'static str {
        match self {
            PayloadLocation::Embedded { .. } => "embedded",
            PayloadLocation::Remote { .. } => "remote",
        }
    }
}

// Payloads can be megabytes; never dump them into logs.
impl std::fmt::Debug for PayloadLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadLocation::Embedded { data } => f
                .debug_struct("Embedded")
                .field("len", &data.len())
                .finish(),
            PayloadLocation::Remote { key } => f.debug_struct("Remote").field("key", key).finish(),
        }
    }
}

/// Serde adapter storing bytes as one standard base64 string.
///
/// Deserialization accepts only a string. Arrays of numbers or keyed objects
/// are rejected rather than coerced.
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as a base64 string.
    pub fn serialize<S>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    /// Deserialize a base64 string into bytes.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(|e| D::Error::custom(format!("invalid base64 payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_object_payload_is_rejected() {
        let json = r#"{"backend":"embedded","data":{"0":"a","1":"b"}}"#;
        assert!(serde_json::from_str::<PayloadLocation>(json).is_err());
    }

    #[test]
    fn numeric_array_payload_is_rejected() {
        let json = r#"{"backend":"embedded","data":[104,105]}"#;
        assert!(serde_json::from_str::<PayloadLocation>(json).is_err());
    }

    #[test]
    fn text_like_binary_survives() {
        let data = Bytes::from_static(b"%PDF-1.7\n\x00\x01\x02 {\"k\": 1}\r\n");
        let location = PayloadLocation::Embedded { data: data.clone() };
        let json = serde_json::to_string(&location).unwrap();
        let back: PayloadLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.embedded_bytes(), Some(&data));
    }

    #[test]
    fn debug_hides_payload() {
        let location = PayloadLocation::Embedded {
            data: Bytes::from(vec![7u8; 4096]),
        };
        assert_eq!(format!("{:?}", location), "Embedded { len: 4096 }");
    }
}
