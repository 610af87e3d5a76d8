//! Encode-side errors. Decode-side errors live in [`crate::handler::DecodeError`].

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EncodeError {
    #[error("buffer of {capacity} bytes is too small for encoded message of {needed} bytes")]
    BufferTooSmall { capacity: usize, needed: usize },
}
