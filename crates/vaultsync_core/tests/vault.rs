//! Integration tests for vault persistence and merging.

use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;
use vaultsync_core::{fields, CoreError, Entry, MasterKey, MergeMethod, Vault};

fn key() -> MasterKey {
    MasterKey::from_password("correct horse battery staple")
}

fn entry(title: &str) -> Entry {
    let mut entry = Entry::new();
    entry.set_field(fields::TITLE, title);
    entry.set_field(fields::USER_NAME, "alice");
    entry.set_field(fields::PASSWORD, "hunter2");
    entry
}

#[test]
fn reopen_preserves_entries_and_deletions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("personal.vsdb");

    let mut vault = Vault::create(&path, key(), "personal").unwrap();
    let keep = entry("mail");
    let drop = entry("forum");
    let keep_id = keep.uuid();
    let drop_id = drop.uuid();
    vault.put_entry(keep);
    vault.put_entry(drop);
    vault.remove_entry(&drop_id).unwrap();
    vault.save().unwrap();

    let reopened = Vault::open(&path, &key()).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.entry(&keep_id).unwrap().field(fields::PASSWORD), Some("hunter2"));
    assert!(reopened.deleted_objects().any(|d| d.uuid == drop_id));
    assert!(!reopened.is_modified());
}

#[test]
fn truncated_file_is_integrity_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("v.vsdb");
    let mut vault = Vault::create(&path, key(), "v").unwrap();
    vault.put_entry(entry("a"));
    vault.save().unwrap();

    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..data.len() - 1]).unwrap();

    let err = Vault::open(&path, &key()).unwrap_err();
    assert!(err.is_integrity_failure(), "unexpected error: {err}");
}

#[test]
fn garbage_file_is_integrity_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.vsdb");
    fs::write(&path, b"this is not a vault at all").unwrap();

    let err = Vault::open(&path, &key()).unwrap_err();
    assert!(matches!(err, CoreError::InvalidFormat { .. }));
}

#[test]
fn two_device_round_trip_through_files() {
    let dir = TempDir::new().unwrap();
    let laptop_path = dir.path().join("laptop.vsdb");
    let phone_path = dir.path().join("phone.vsdb");

    let mut laptop = Vault::create(&laptop_path, key(), "shared").unwrap();
    let shared = entry("bank");
    let shared_id = shared.uuid();
    laptop.put_entry(shared);
    laptop.save().unwrap();

    // The phone starts from a copy of the laptop file.
    laptop.save_copy(&phone_path).unwrap();
    let mut phone = Vault::open(&phone_path, &key()).unwrap();

    let mut edited = phone.entry(&shared_id).unwrap().clone();
    edited.set_field(fields::PASSWORD, "rotated");
    edited.touch();
    phone.put_entry(edited);
    let added = entry("new on phone");
    let added_id = added.uuid();
    phone.put_entry(added);
    phone.save().unwrap();

    let incoming = Vault::open(&phone_path, &key()).unwrap();
    let stats = laptop.merge_in(&incoming, MergeMethod::Synchronize);

    assert_eq!(stats.added, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(
        laptop.entry(&shared_id).unwrap().field(fields::PASSWORD),
        Some("rotated")
    );
    assert!(laptop.entry(&added_id).is_some());
    assert!(laptop.is_modified());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn arbitrary_fields_survive_save(
        titles in prop::collection::vec("[a-zA-Z0-9 ]{0,24}", 0..12),
        notes in "\\PC{0,64}",
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.vsdb");
        let mut vault = Vault::create(&path, key(), "prop").unwrap();

        let mut ids = Vec::new();
        for title in &titles {
            let mut e = entry(title);
            e.set_field(fields::NOTES, notes.clone());
            ids.push(e.uuid());
            vault.put_entry(e);
        }
        vault.save().unwrap();

        let reopened = Vault::open(&path, &key()).unwrap();
        prop_assert_eq!(reopened.len(), titles.len());
        for (id, title) in ids.iter().zip(&titles) {
            let e = reopened.entry(id).unwrap();
            prop_assert_eq!(e.title(), Some(title.as_str()));
            prop_assert_eq!(e.field(fields::NOTES), Some(notes.as_str()));
        }
    }

    #[test]
    fn merging_a_copy_changes_nothing(count in 0usize..8) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.vsdb");
        let copy = dir.path().join("m-copy.vsdb");

        let mut vault = Vault::create(&path, key(), "m").unwrap();
        for i in 0..count {
            vault.put_entry(entry(&format!("entry {i}")));
        }
        vault.save().unwrap();
        vault.save_copy(&copy).unwrap();

        let other = Vault::open(&copy, &key()).unwrap();
        let stats = vault.merge_in(&other, MergeMethod::Synchronize);
        prop_assert!(stats.is_empty());
        prop_assert!(!vault.is_modified());
    }
}
