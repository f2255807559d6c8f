//! Wire value, error shape, and call envelope types.

use serde::{Deserialize, Serialize};

use crate::error::{PlugwireError, Result};

use super::{PayloadCodec, TypeTag};

/// The atomic wire unit for one argument or result.
///
/// `type_tag` always identifies exactly how `payload` is interpreted; `name`
/// is empty for positional values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    /// Argument name, empty if positional.
    #[serde(default)]
    pub name: String,
    /// Globally unique wire type tag.
    pub type_tag: String,
    /// Type-tagged MessagePack payload.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl Value {
    /// Build a positional value from a tag and encoded payload.
    pub fn positional(tag: TypeTag, payload: Vec<u8>) -> Self {
        Self {
            name: String::new(),
            type_tag: tag.as_str().to_string(),
            payload,
        }
    }

    /// Build a named value from a tag and encoded payload.
    pub fn named(name: impl Into<String>, tag: TypeTag, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            type_tag: tag.as_str().to_string(),
            payload,
        }
    }

    /// Parse this value's tag.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unregistered tag.
    pub fn tag(&self) -> Result<TypeTag> {
        TypeTag::parse(&self.type_tag)
    }
}

/// Status code carried by a wire error.
///
/// Only the codes this bridge produces are modeled; `Unknown` is the generic
/// catch-all applied by the exception guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Generic failure, applied to anything not already wire-shaped.
    Unknown,
    /// Requested plugin/capability/type is not registered.
    NotFound,
    /// Arguments could not be satisfied.
    InvalidArgument,
    /// The call was well-formed but the handler failed internally.
    Internal,
}

/// Structured localized message detail for clean client-side extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedMessage {
    /// BCP-47 locale of the message.
    pub locale: String,
    /// Human-readable message in that locale.
    pub message: String,
}

impl LocalizedMessage {
    /// Build an `en-US` localized message.
    pub fn en(message: impl Into<String>) -> Self {
        Self {
            locale: "en-US".to_string(),
            message: message.into(),
        }
    }
}

/// The single stable error shape clients receive.
///
/// Carries a status code, a message (with backtrace text appended when the
/// error was transformed at the boundary), and structured localized details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    /// Status code.
    pub code: StatusCode,
    /// Message plus backtrace text.
    pub message: String,
    /// Structured details for client-side extraction.
    #[serde(default)]
    pub details: Vec<LocalizedMessage>,
}

impl WireError {
    /// Build a wire error with the generic `Unknown` status.
    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            details: vec![LocalizedMessage::en(message.clone())],
            code: StatusCode::Unknown,
            message,
        }
    }

    /// The localized message, if one was attached.
    pub fn localized(&self) -> Option<&str> {
        self.details.first().map(|d| d.message.as_str())
    }
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// How a remote object is reached.
///
/// Exactly one resolution path exists by construction: either a direct
/// address or a broker-multiplexed stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientDescriptor {
    /// Direct address: filesystem-path style for local transports,
    /// host:port style otherwise.
    Target {
        /// Address string.
        addr: String,
    },
    /// Broker-multiplexed channel, resolved through `Broker::dial`.
    Stream {
        /// Logical stream identifier.
        id: String,
    },
}

impl ClientDescriptor {
    /// Decode a descriptor from raw wire bytes.
    pub fn from_wire(raw: &[u8]) -> Result<Self> {
        PayloadCodec::decode(raw)
    }

    /// Encode this descriptor to raw wire bytes.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        PayloadCodec::encode(self)
    }
}

/// Per-call metadata attached to every inbound request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    /// Name of the plugin this call targets. Required.
    #[serde(default)]
    pub plugin_name: Option<String>,
    /// Optional descriptor for a remote plugin-manager fallback.
    #[serde(default)]
    pub plugin_manager: Option<ClientDescriptor>,
}

impl CallMetadata {
    /// Metadata carrying only a plugin name.
    pub fn for_plugin(name: impl Into<String>) -> Self {
        Self {
            plugin_name: Some(name.into()),
            plugin_manager: None,
        }
    }

    /// The plugin name, or `MissingMetadata` if absent.
    pub fn require_plugin_name(&self) -> Result<&str> {
        self.plugin_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(PlugwireError::MissingMetadata("plugin_name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_tag_parse() {
        let v = Value::positional(TypeTag::String, vec![0xa2, b'h', b'i']);
        assert_eq!(v.tag().unwrap(), TypeTag::String);
        assert!(v.name.is_empty());
    }

    #[test]
    fn test_value_unknown_tag() {
        let v = Value {
            name: String::new(),
            type_tag: "Mystery".to_string(),
            payload: vec![],
        };
        assert!(matches!(v.tag(), Err(PlugwireError::NotFound(_))));
    }

    #[test]
    fn test_value_wire_round_trip() {
        let v = Value::named("folders", TypeTag::Hash, vec![0x80]);
        let bytes = PayloadCodec::encode(&v).unwrap();
        let back: Value = PayloadCodec::decode(&bytes).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_wire_error_unknown_carries_localized_detail() {
        let err = WireError::unknown("boom");
        assert_eq!(err.code, StatusCode::Unknown);
        assert_eq!(err.localized(), Some("boom"));
    }

    #[test]
    fn test_descriptor_wire_round_trip() {
        let desc = ClientDescriptor::Target {
            addr: "/run/plugwire/guest.sock".to_string(),
        };
        let raw = desc.to_wire().unwrap();
        assert_eq!(ClientDescriptor::from_wire(&raw).unwrap(), desc);

        let desc = ClientDescriptor::Stream {
            id: "7".to_string(),
        };
        let raw = desc.to_wire().unwrap();
        assert_eq!(ClientDescriptor::from_wire(&raw).unwrap(), desc);
    }

    #[test]
    fn test_metadata_requires_plugin_name() {
        let meta = CallMetadata::default();
        assert!(matches!(
            meta.require_plugin_name(),
            Err(PlugwireError::MissingMetadata("plugin_name"))
        ));

        let meta = CallMetadata::for_plugin("guestLinux");
        assert_eq!(meta.require_plugin_name().unwrap(), "guestLinux");
    }
}
