//! The opaque-serializer seam.
//!
//! This crate never inspects what a user's execution config, checkpoint
//! hook, or state backend actually *is* -- per spec.md §1 that's left to
//! external collaborators. All the compiler does is invoke an opaque
//! serializer on the object and propagate success or failure (§4.7, §6).
//!
//! [`Serializable`] is that seam. [`Postcard`] is the one concrete
//! implementation this crate ships, wrapping any `serde::Serialize` type in
//! the same "encode, map failure to a contextual error" shape the teacher
//! crate used for its own checkpoint blobs.

use serde::Serialize;
use std::fmt;

/// A value the compiler can ask to turn itself into bytes, without knowing
/// anything else about it.
pub trait Serializable: Send + Sync {
    /// Attempt to encode this value. Any failure is reported back to the
    /// caller as a compile error identifying what failed to serialize.
    fn serialize(&self) -> Result<Vec<u8>, SerializeError>;
}

/// Opaque serialization failure. The message is whatever the underlying
/// encoder reported; this crate does not interpret it further.
#[derive(Debug, Clone)]
pub struct SerializeError(pub String);

impl fmt::Display for SerializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SerializeError {}

/// Wraps any `serde`-serializable value so it can be used wherever a
/// [`Serializable`] is expected.
pub struct Postcard<T>(pub T);

impl<T: Serialize + Send + Sync> Serializable for Postcard<T> {
    fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        postcard::to_allocvec(&self.0).map_err(|e| SerializeError(e.to_string()))
    }
}

/// A [`Serializable`] that always fails; useful for exercising the
/// `NonSerializable*` error paths in tests.
pub struct AlwaysFails(pub &'static str);

impl Serializable for AlwaysFails {
    fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        Err(SerializeError(self.0.to_string()))
    }
}
