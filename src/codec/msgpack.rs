//! MsgPack codec using `rmp-serde`.
//!
//! Discovery blocks are encoded with `to_vec_named` so tools written in
//! other languages see structs as maps keyed by field name rather than
//! positional arrays.
//!
//! # Example
//!
//! ```
//! use tracewire::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Provider {
//!     id: u32,
//!     name: String,
//! }
//!
//! let provider = Provider { id: 42, name: "gpu".to_string() };
//! let encoded = MsgPackCodec::encode(&provider).unwrap();
//! let decoded: Provider = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, provider);
//! ```

use crate::error::Result;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
