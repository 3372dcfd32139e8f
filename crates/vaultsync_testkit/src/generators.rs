//! Property-based test generators using proptest.

use proptest::prelude::*;
use vaultsync_core::{fields, Entry};

/// Strategy for URLs that never yield a sync target.
///
/// Covers free text, unsupported schemes and `sftp` URLs without a port.
pub fn malformed_url_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{0,20}",
        ("(ftp|http|https|webdav|smb)", "[a-z]{1,10}", 1u16..=u16::MAX, "[a-z]{0,8}")
            .prop_map(|(scheme, host, port, dir)| format!("{scheme}://{host}:{port}/{dir}/")),
        ("[a-z]{1,10}", "[a-z]{0,8}").prop_map(|(host, dir)| format!("sftp://{host}/{dir}/")),
        Just("sftp://host:port/path/to/directory/".to_string()),
    ]
}

/// Strategy for valid sync URLs.
pub fn valid_url_strategy() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9]{0,12}", 1u16..=u16::MAX, "[a-z0-9]{1,8}")
        .prop_map(|(host, port, dir)| format!("sftp://{host}:{port}/{dir}/"))
}

/// Strategy for entries with a title, a password and up to three extra
/// fields.
pub fn entry_strategy() -> impl Strategy<Value = Entry> {
    (
        "[A-Za-z0-9 ]{1,24}",
        "[ -~]{0,32}",
        prop::collection::btree_map("[A-Z][a-z]{2,10}", "[ -~]{0,16}", 0..3),
    )
        .prop_map(|(title, password, extra)| {
            let mut entry = Entry::new();
            entry.set_field(fields::TITLE, title);
            entry.set_field(fields::PASSWORD, password);
            for (name, value) in extra {
                entry.set_field(name, value);
            }
            entry
        })
}
