//! Domain message types: shapes, handler trees, semantic validators, and
//! encode/decode entry points. See the wire format table for the exact JSON
//! shape each type renders and expects.

use crate::error::EncodeError;
use crate::handler::{decode as decode_with, DecodeError, Handler};

/// Filesystem entry kind, encoded on the wire as the single-character
/// `"type"` field. `Unset` is the zero value a freshly decoded message
/// starts from; a message that reaches the semantic validator still holding
/// `Unset` means the wire value wasn't `"f"` or `"d"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryKind {
    #[default]
    Unset,
    File,
    Dir,
}

impl EntryKind {
    /// The single-character wire representation (`"f"`/`"d"`), also used by
    /// consumers that render the kind outside of JSON (e.g. the recorder's
    /// SQLite catalog).
    pub fn as_wire(self) -> &'static str {
        match self {
            EntryKind::File => "f",
            EntryKind::Dir => "d",
            EntryKind::Unset => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanMessage {
    pub kind: EntryKind,
    pub path: String,
    pub atime: u64,
    pub mtime: u64,
    pub size: u64,
    pub uid: u64,
    pub gid: u64,
    pub filesys: String,
    pub ost_pool: String,
    pub stripe_count: u64,
    pub fid: String,
}

/// Recorder messages share the scan wire shape exactly; rather than
/// duplicate the handler tree and validator, the recorder consumes the same
/// type under a descriptive alias.
pub type RecorderMessage = ScanMessage;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurgeMessage {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationMessage {
    pub path: String,
}

fn set_kind(m: &mut ScanMessage, s: &str) {
    m.kind = match s {
        "f" => EntryKind::File,
        "d" => EntryKind::Dir,
        _ => EntryKind::Unset,
    };
}

static FORMAT_FIELDS: &[(&str, Handler<ScanMessage>)] = &[
    ("filesys", Handler::String(|m, s| m.filesys = s.to_string())),
    ("ost_pool", Handler::String(|m, s| m.ost_pool = s.to_string())),
    ("stripe_count", Handler::UInt(|m, v| m.stripe_count = v)),
    ("fid", Handler::String(|m, s| m.fid = s.to_string())),
];

static SCAN_FIELDS: &[(&str, Handler<ScanMessage>)] = &[
    ("type", Handler::String(set_kind)),
    ("path", Handler::String(|m, s| m.path = s.to_string())),
    ("atime", Handler::UInt(|m, v| m.atime = v)),
    ("mtime", Handler::UInt(|m, v| m.mtime = v)),
    ("size", Handler::UInt(|m, v| m.size = v)),
    ("uid", Handler::UInt(|m, v| m.uid = v)),
    ("gid", Handler::UInt(|m, v| m.gid = v)),
    ("format", Handler::Object(FORMAT_FIELDS)),
];
static SCAN_ROOT: Handler<ScanMessage> = Handler::Object(SCAN_FIELDS);

static PURGE_FIELDS: &[(&str, Handler<PurgeMessage>)] =
    &[("path", Handler::String(|m, s| m.path = s.to_string()))];
static PURGE_ROOT: Handler<PurgeMessage> = Handler::Object(PURGE_FIELDS);

static MIGRATION_FIELDS: &[(&str, Handler<MigrationMessage>)] =
    &[("path", Handler::String(|m, s| m.path = s.to_string()))];
static MIGRATION_ROOT: Handler<MigrationMessage> = Handler::Object(MIGRATION_FIELDS);

fn validate_scan(m: &ScanMessage) -> Result<(), DecodeError> {
    if !matches!(m.kind, EntryKind::File | EntryKind::Dir) {
        return Err(DecodeError::semantic("type", "type must be 'f' or 'd'"));
    }
    if m.path.is_empty() {
        return Err(DecodeError::semantic("path", "path must not be empty"));
    }
    if m.filesys.is_empty() {
        return Err(DecodeError::semantic("format.filesys", "filesys must not be empty"));
    }
    if m.fid.is_empty() {
        return Err(DecodeError::semantic("format.fid", "fid must not be empty"));
    }
    if m.atime == 0 {
        return Err(DecodeError::semantic("atime", "atime must not be the Unix epoch"));
    }
    if m.mtime == 0 {
        return Err(DecodeError::semantic("mtime", "mtime must not be the Unix epoch"));
    }
    Ok(())
}

fn validate_path_message(path: &str, field: &str) -> Result<(), DecodeError> {
    if path.is_empty() {
        return Err(DecodeError::semantic(field, "path must not be empty"));
    }
    Ok(())
}

pub fn decode_scan(input: &str) -> Result<ScanMessage, DecodeError> {
    let msg = decode_with(&SCAN_ROOT, input)?;
    validate_scan(&msg)?;
    Ok(msg)
}

pub fn decode_recorder(input: &str) -> Result<RecorderMessage, DecodeError> {
    decode_scan(input)
}

pub fn decode_purge(input: &str) -> Result<PurgeMessage, DecodeError> {
    let msg = decode_with(&PURGE_ROOT, input)?;
    validate_path_message(&msg.path, "path")?;
    Ok(msg)
}

pub fn decode_migration(input: &str) -> Result<MigrationMessage, DecodeError> {
    let msg = decode_with(&MIGRATION_ROOT, input)?;
    validate_path_message(&msg.path, "path")?;
    Ok(msg)
}

fn push_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

pub fn encode_scan(m: &ScanMessage) -> String {
    let mut out = String::with_capacity(128 + m.path.len() + m.filesys.len() + m.fid.len());
    out.push_str("{\"type\":\"");
    out.push_str(m.kind.as_wire());
    out.push_str("\",\"path\":");
    push_json_string(&mut out, &m.path);
    out.push_str(",\"atime\":");
    out.push_str(&m.atime.to_string());
    out.push_str(",\"mtime\":");
    out.push_str(&m.mtime.to_string());
    out.push_str(",\"size\":");
    out.push_str(&m.size.to_string());
    out.push_str(",\"uid\":");
    out.push_str(&m.uid.to_string());
    out.push_str(",\"gid\":");
    out.push_str(&m.gid.to_string());
    out.push_str(",\"format\":{\"filesys\":");
    push_json_string(&mut out, &m.filesys);
    out.push_str(",\"ost_pool\":");
    push_json_string(&mut out, &m.ost_pool);
    out.push_str(",\"stripe_count\":");
    out.push_str(&m.stripe_count.to_string());
    out.push_str(",\"fid\":");
    push_json_string(&mut out, &m.fid);
    out.push_str("}}");
    out
}

pub fn encode_recorder(m: &RecorderMessage) -> String {
    encode_scan(m)
}

pub fn encode_purge(m: &PurgeMessage) -> String {
    let mut out = String::with_capacity(16 + m.path.len());
    out.push_str("{\"path\":");
    push_json_string(&mut out, &m.path);
    out.push('}');
    out
}

pub fn encode_migration(m: &MigrationMessage) -> String {
    let mut out = String::with_capacity(16 + m.path.len());
    out.push_str("{\"path\":");
    push_json_string(&mut out, &m.path);
    out.push('}');
    out
}

/// Renders into a caller-supplied buffer for hot paths that want to avoid an
/// allocation per message; fails if `buf` is too small for the rendered
/// length rather than truncating.
pub fn encode_scan_into<'a>(m: &ScanMessage, buf: &'a mut [u8]) -> Result<&'a [u8], EncodeError> {
    let rendered = encode_scan(m);
    let needed = rendered.len();
    if needed > buf.len() {
        return Err(EncodeError::BufferTooSmall {
            capacity: buf.len(),
            needed,
        });
    }
    buf[..needed].copy_from_slice(rendered.as_bytes());
    Ok(&buf[..needed])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScanMessage {
        ScanMessage {
            kind: EntryKind::File,
            path: "/a".into(),
            atime: 1,
            mtime: 2,
            size: 3,
            uid: 4,
            gid: 5,
            filesys: "x".into(),
            ost_pool: "".into(),
            stripe_count: 0,
            fid: "z".into(),
        }
    }

    #[test]
    fn scan_round_trips() {
        let m = sample();
        let encoded = encode_scan(&m);
        let decoded = decode_scan(&encoded).unwrap();
        assert_eq!(m, decoded);
    }

    #[test]
    fn scan_decodes_literal_from_spec() {
        let input = r#"{"type":"f","path":"/a","atime":1,"mtime":2,"size":3,"uid":4,"gid":5,"format":{"filesys":"x","ost_pool":"","stripe_count":0,"fid":"z"}}"#;
        let decoded = decode_scan(input).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn scan_rejects_unknown_type() {
        let input = r#"{"type":"x","path":"/a","atime":1,"mtime":2,"size":3,"uid":4,"gid":5,"format":{"filesys":"x","ost_pool":"","stripe_count":0,"fid":"z"}}"#;
        let err = decode_scan(input).unwrap_err();
        assert_eq!(err.kind, crate::handler::DecodeErrorKind::Semantic);
    }

    #[test]
    fn scan_rejects_empty_path() {
        let mut m = sample();
        m.path.clear();
        let encoded = encode_scan(&m);
        let err = decode_scan(&encoded).unwrap_err();
        assert_eq!(err.kind, crate::handler::DecodeErrorKind::Semantic);
    }

    #[test]
    fn scan_rejects_empty_filesys() {
        let mut m = sample();
        m.filesys.clear();
        let encoded = encode_scan(&m);
        let err = decode_scan(&encoded).unwrap_err();
        assert_eq!(err.kind, crate::handler::DecodeErrorKind::Semantic);
    }

    #[test]
    fn scan_rejects_empty_fid() {
        let mut m = sample();
        m.fid.clear();
        let encoded = encode_scan(&m);
        let err = decode_scan(&encoded).unwrap_err();
        assert_eq!(err.kind, crate::handler::DecodeErrorKind::Semantic);
    }

    #[test]
    fn purge_round_trips() {
        let m = PurgeMessage { path: "/a".into() };
        let encoded = encode_purge(&m);
        assert_eq!(decode_purge(&encoded).unwrap(), m);
    }

    #[test]
    fn purge_rejects_empty_path() {
        let encoded = encode_purge(&PurgeMessage { path: String::new() });
        let err = decode_purge(&encoded).unwrap_err();
        assert_eq!(err.kind, crate::handler::DecodeErrorKind::Semantic);
    }

    #[test]
    fn migration_round_trips() {
        let m = MigrationMessage { path: "/b".into() };
        let encoded = encode_migration(&m);
        assert_eq!(decode_migration(&encoded).unwrap(), m);
    }

    #[test]
    fn recorder_shares_scan_shape() {
        let m = sample();
        let encoded = encode_recorder(&m);
        assert_eq!(decode_recorder(&encoded).unwrap(), m);
    }

    #[test]
    fn bounded_buffer_rejects_too_small() {
        let m = sample();
        let mut buf = [0u8; 4];
        let err = encode_scan_into(&m, &mut buf).unwrap_err();
        assert!(matches!(err, EncodeError::BufferTooSmall { .. }));
    }

    #[test]
    fn bounded_buffer_succeeds_when_large_enough() {
        let m = sample();
        let mut buf = [0u8; 512];
        let written = encode_scan_into(&m, &mut buf).unwrap();
        assert_eq!(written, encode_scan(&m).as_bytes());
    }
}
