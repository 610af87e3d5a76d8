//! End-to-end encode/decode coverage exercised as an external consumer would
//! use the crate, rather than via the inline unit tests beside each handler
//! tree.

use polimor_message::{
    decode_migration, decode_purge, decode_scan, encode_migration, encode_purge, encode_scan,
    EntryKind, MigrationMessage, PurgeMessage, ScanMessage,
};

fn sample_dir() -> ScanMessage {
    ScanMessage {
        kind: EntryKind::Dir,
        path: "/lustre/fs1/projects".into(),
        atime: 1_700_000_000,
        mtime: 1_700_000_100,
        size: 4096,
        uid: 0,
        gid: 0,
        filesys: "fs1".into(),
        ost_pool: "".into(),
        stripe_count: 0,
        fid: "0x200000007:0x1:0x0".into(),
    }
}

#[test]
fn scan_message_round_trips_through_the_public_api() {
    let m = sample_dir();
    let encoded = encode_scan(&m);
    let decoded = decode_scan(&encoded).expect("well-formed message decodes");
    assert_eq!(decoded, m);
}

#[test]
fn scan_message_rejects_wrong_order_fields_the_same_as_canonical_order() {
    let canonical = r#"{"type":"f","path":"/a","atime":1,"mtime":2,"size":3,"uid":4,"gid":5,"format":{"filesys":"x","ost_pool":"p","stripe_count":2,"fid":"f"}}"#;
    let reordered = r#"{"mtime":2,"type":"f","gid":5,"uid":4,"size":3,"atime":1,"path":"/a","format":{"fid":"f","stripe_count":2,"ost_pool":"p","filesys":"x"}}"#;
    assert_eq!(decode_scan(canonical).unwrap(), decode_scan(reordered).unwrap());
}

#[test]
fn purge_and_migration_messages_carry_only_a_path() {
    let purge = PurgeMessage {
        path: "/lustre/fs1/old/file".into(),
    };
    let migration = MigrationMessage {
        path: "/lustre/fs1/hot/file".into(),
    };
    assert_eq!(decode_purge(&encode_purge(&purge)).unwrap(), purge);
    assert_eq!(decode_migration(&encode_migration(&migration)).unwrap(), migration);
}

#[test]
fn malformed_json_is_a_decode_error_not_a_panic() {
    assert!(decode_scan("not json").is_err());
    assert!(decode_scan(r#"{"type":"f""#).is_err());
    assert!(decode_purge("{}").is_err());
}
