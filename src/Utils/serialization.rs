//! # Versioned binary persistence
//!
//! Every persisted object is written as a leading `u32` version tag followed by a
//! bincode-encoded record. Readers check the tag before touching the payload, so a stream
//! written by a newer (or corrupted) layout fails loudly instead of being misread.
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("binary encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("unknown {object} serialization version {found} (supported: {supported})")]
    UnknownVersion {
        object: &'static str,
        found: u32,
        supported: u32,
    },
    #[error("restored {object} is inconsistent: {reason}")]
    InvalidState { object: &'static str, reason: String },
}

/// Objects persisted with a version tag.
///
/// Implementors describe their on-disk record; the default methods handle the tag.
pub trait Versioned: Sized {
    /// Name used in error messages.
    const OBJECT: &'static str;
    /// Version written by this build.
    const VERSION: u32;
    type Record: Serialize + DeserializeOwned;

    fn to_record(&self) -> Self::Record;
    fn from_record(record: Self::Record) -> Result<Self, SerializationError>;

    fn serialize_into<W: Write>(&self, out: &mut W) -> Result<(), SerializationError> {
        bincode::serialize_into(&mut *out, &Self::VERSION)?;
        bincode::serialize_into(&mut *out, &self.to_record())?;
        Ok(())
    }

    fn deserialize_from<R: Read>(input: &mut R) -> Result<Self, SerializationError> {
        let found: u32 = bincode::deserialize_from(&mut *input)?;
        if found != Self::VERSION {
            return Err(SerializationError::UnknownVersion {
                object: Self::OBJECT,
                found,
                supported: Self::VERSION,
            });
        }
        let record: Self::Record = bincode::deserialize_from(&mut *input)?;
        Self::from_record(record)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf)?;
        Ok(buf)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut cursor = bytes;
        Self::deserialize_from(&mut cursor)
    }
}
