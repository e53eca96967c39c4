//! Codec module - serialization of structured block contents.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde`, used for the provider
//!   descriptors a query places in its discovery block
//!
//! Codecs are marker structs with static methods rather than trait objects.

mod msgpack;

pub use msgpack::MsgPackCodec;
