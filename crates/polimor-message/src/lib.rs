//! Typed message envelopes and a streaming, zero-copy handler-stack JSON
//! codec. See [`handler`] for the decode engine, [`tokenizer`] for the
//! underlying lexer, and [`messages`] for the domain types and their wire
//! shapes and semantic validators.

pub mod error;
pub mod handler;
pub mod messages;
pub mod tokenizer;

pub use error::EncodeError;
pub use handler::{decode, DecodeError, DecodeErrorKind, Handler};
pub use messages::{
    decode_migration, decode_purge, decode_recorder, decode_scan, encode_migration,
    encode_purge, encode_recorder, encode_scan, encode_scan_into, EntryKind, MigrationMessage,
    PurgeMessage, RecorderMessage, ScanMessage,
};
