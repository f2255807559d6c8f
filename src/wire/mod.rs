//! Wire-level data model.
//!
//! Everything that crosses the RPC boundary lives here:
//!
//! - [`TypeTag`] - closed set of wire type tags
//! - [`Value`] - the atomic wire unit for one argument or result
//! - [`WireError`] - the single stable error shape clients receive
//! - [`ClientDescriptor`] - how a remote object is reached
//! - [`CallMetadata`] - per-call metadata attached to every inbound request
//! - [`PayloadCodec`] - MessagePack encoding for type-tagged payloads
//!
//! The transport itself (framing, connection management) is an external
//! collaborator; this module only defines the shapes it carries.

mod codec;
mod tag;
mod value;

pub use codec::PayloadCodec;
pub use tag::TypeTag;
pub use value::{
    CallMetadata, ClientDescriptor, LocalizedMessage, StatusCode, Value, WireError,
};
