//! End-to-end sync attempts against the in-memory remote.

use proptest::prelude::*;
use std::time::{Duration, Instant};
use vaultsync_core::{fields, format::VAULT_VERSION, MasterKey, Vault};
use vaultsync_engine::{
    load_settings, options_entry_uuid, save_settings, settings::APP_NAME, Credentials, HookAction,
    RemoteCall, ResultReporter, StatusSink, SyncContext, SyncHooks, SyncResultCode, SyncSettings,
    SyncState,
};
use vaultsync_testkit::prelude::*;

const FILE: &str = "vault.kdbx";

fn path() -> String {
    remote_path(FILE)
}

fn backup() -> String {
    format!("{}.bak", remote_path(FILE))
}

fn open_remote(bed: &TestBed, name: &str) -> Vault {
    let copy = bed.dir().join(format!("remote-{}", name.replace('/', "_")));
    std::fs::write(&copy, bed.remote.file(name).expect("remote file")).unwrap();
    Vault::open(&copy, &master_key()).expect("remote copy opens")
}

#[test]
fn first_sync_call_sequence() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);

    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::Success);
    assert_eq!(
        bed.remote.calls(),
        vec![
            RemoteCall::Connect,
            RemoteCall::Exists(path()),
            RemoteCall::Exists(path()),
            RemoteCall::Upload(path()),
            RemoteCall::Exists(path()),
            RemoteCall::Download(path()),
            RemoteCall::Disconnect,
        ]
    );
    assert_eq!(
        bed.remote.last_login(),
        Some(("nas".to_string(), 22, TEST_USER.to_string()))
    );
    assert_eq!(bed.engine.state(), SyncState::Synced);
    assert!(bed.scratch_is_empty());
}

#[test]
fn first_upload_holds_the_local_content() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);
    let ids = scenarios::populate(&mut vault, 5);

    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::Success);

    let remote = open_remote(&bed, &path());
    assert_eq!(remote.len(), 5);
    for id in ids {
        assert_eq!(remote.entry(&id), vault.entry(&id));
    }
}

#[test]
fn second_sync_keeps_a_backup() {
    let bed = TestBed::new();
    let mut vault = scenarios::synced_vault(&bed, FILE, 2);
    let first = bed.remote.file(&path()).unwrap();

    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::Success);
    assert_eq!(
        bed.remote.calls(),
        vec![
            RemoteCall::Connect,
            RemoteCall::Exists(path()),
            RemoteCall::Download(path()),
            RemoteCall::Exists(path()),
            RemoteCall::Exists(backup()),
            RemoteCall::Rename(path(), backup()),
            RemoteCall::Upload(path()),
            RemoteCall::Exists(path()),
            RemoteCall::Download(path()),
            RemoteCall::Disconnect,
        ]
    );
    assert_eq!(bed.remote.file(&backup()), Some(first));
}

#[test]
fn repeated_syncs_stay_successful() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);
    scenarios::populate(&mut vault, 3);

    for _ in 0..4 {
        assert_eq!(bed.sync(&mut vault, false), SyncResultCode::Success);
        assert!(bed.scratch_is_empty());
    }

    assert_eq!(bed.remote.paths(), vec![path(), backup()]);
    assert_eq!(open_remote(&bed, &path()).len(), 3);

    let stats = bed.engine.stats();
    assert_eq!(stats.attempts, 4);
    assert_eq!(stats.successes, 4);
    assert_eq!(stats.last_result, Some(SyncResultCode::Success));
}

#[test]
fn two_devices_converge() {
    let bed = TestBed::new();
    let mut laptop = bed.device_vault("laptop", FILE);
    let mut desktop = bed.device_vault("desktop", FILE);

    let on_laptop = scenarios::populate(&mut laptop, 2);
    let on_desktop = scenarios::populate(&mut desktop, 3);

    assert!(bed.sync(&mut laptop, true).is_success());
    assert!(bed.sync(&mut desktop, true).is_success());
    assert!(bed.sync(&mut laptop, true).is_success());

    for id in on_laptop.iter().chain(&on_desktop) {
        assert!(laptop.entry(id).is_some());
        assert!(desktop.entry(id).is_some());
    }
    assert_eq!(open_remote(&bed, &path()).len(), 5);
}

#[test]
fn deletion_propagates() {
    let bed = TestBed::new();
    let mut laptop = bed.device_vault("laptop", FILE);
    let ids = scenarios::populate(&mut laptop, 2);
    assert!(bed.sync(&mut laptop, true).is_success());

    let mut desktop = bed.device_vault("desktop", FILE);
    assert!(bed.sync(&mut desktop, true).is_success());
    assert!(desktop.entry(&ids[0]).is_some());

    std::thread::sleep(Duration::from_millis(5));
    desktop.remove_entry(&ids[0]).unwrap();
    desktop.save().unwrap();
    assert!(bed.sync(&mut desktop, true).is_success());
    assert!(bed.sync(&mut laptop, true).is_success());

    assert!(laptop.entry(&ids[0]).is_none());
    assert!(laptop.entry(&ids[1]).is_some());
}

#[test]
fn declined_override_leaves_remote_alone() {
    let bed = TestBed::new();
    let mut vault = scenarios::synced_vault(&bed, FILE, 1);
    assert!(bed.sync(&mut vault, true).is_success());
    let old_backup = bed.remote.file(&backup()).unwrap();
    let garbage = scenarios::corrupt_remote(&bed, FILE);

    let mut prompt = ScriptedPrompt::decline();
    let code = bed.sync_with(&mut vault, true, &mut prompt);

    assert_eq!(code, SyncResultCode::MergeFailed);
    assert_eq!(prompt.times_asked(), 1);
    assert_eq!(prompt.notices[0].remote_path, path());
    assert_eq!(bed.remote.file(&path()), Some(garbage));
    assert_eq!(bed.remote.file(&backup()), Some(old_backup));
    assert_eq!(bed.remote.calls().last(), Some(&RemoteCall::Disconnect));
    assert!(bed.scratch_is_empty());
}

#[test]
fn accepted_override_replaces_remote() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);
    scenarios::populate(&mut vault, 2);
    scenarios::corrupt_remote(&bed, FILE);

    let mut prompt = ScriptedPrompt::accept();
    assert_eq!(
        bed.sync_with(&mut vault, true, &mut prompt),
        SyncResultCode::Success
    );
    assert_eq!(open_remote(&bed, &path()).len(), 2);
    assert!(bed.remote.calls().contains(&RemoteCall::Delete(path())));
    assert!(!bed.remote.contains(&backup()));
}

#[test]
fn unattended_override_does_not_prompt() {
    let bed = TestBed::new();
    let mut vault = scenarios::synced_vault(&bed, FILE, 1);
    assert!(bed.sync(&mut vault, false).is_success());
    let old_backup = bed.remote.file(&backup()).unwrap();
    scenarios::corrupt_remote(&bed, FILE);

    let mut prompt = ScriptedPrompt::decline();
    let code = bed.sync_with(&mut vault, false, &mut prompt);

    assert_eq!(code, SyncResultCode::Success);
    assert_eq!(prompt.times_asked(), 0);
    assert_eq!(open_remote(&bed, &path()).len(), 1);
    assert_eq!(bed.remote.file(&backup()), Some(old_backup));
}

#[test]
fn wrong_master_key_on_remote_counts_as_corruption() {
    let bed = TestBed::new();
    let other = bed.dir().join("other.kdbx");
    Vault::create(&other, MasterKey::from_password("someone else"), "x").unwrap();
    bed.remote.put_file(path(), std::fs::read(&other).unwrap());

    let mut vault = bed.vault(FILE);
    let mut prompt = ScriptedPrompt::decline();
    assert_eq!(
        bed.sync_with(&mut vault, true, &mut prompt),
        SyncResultCode::MergeFailed
    );
    assert_eq!(prompt.times_asked(), 1);
}

#[test]
fn newer_remote_container_is_a_merge_failure() {
    let bed = TestBed::new();
    let mut vault = scenarios::synced_vault(&bed, FILE, 2);
    let mut newer = bed.remote.file(&path()).unwrap();
    newer[4..6].copy_from_slice(&(VAULT_VERSION + 1).to_le_bytes());
    bed.remote.put_file(path(), newer.clone());
    bed.remote.clear_calls();

    let mut prompt = ScriptedPrompt::accept();
    let code = bed.sync_with(&mut vault, true, &mut prompt);

    // Readable but unsupported is not corruption: no prompt, no override.
    assert_eq!(code, SyncResultCode::MergeFailed);
    assert_eq!(prompt.times_asked(), 0);
    assert_eq!(bed.remote.file(&path()), Some(newer));
    assert!(!bed.remote.contains(&backup()));
    assert_eq!(bed.remote.calls().last(), Some(&RemoteCall::Disconnect));
    assert!(!bed
        .remote
        .calls()
        .iter()
        .any(|call| matches!(call, RemoteCall::Upload(_) | RemoteCall::Delete(_))));
    assert!(bed.scratch_is_empty());
}

#[test]
fn failed_exists_check_is_a_download_failure() {
    let bed = TestBed::new();
    let mut vault = scenarios::synced_vault(&bed, FILE, 1);
    let before = bed.remote.file(&path());
    bed.remote.clear_calls();
    bed.remote.fail_exists(true);

    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::DownloadFailed);
    assert_eq!(
        bed.remote.calls(),
        vec![
            RemoteCall::Connect,
            RemoteCall::Exists(path()),
            RemoteCall::Disconnect,
        ]
    );
    assert_eq!(bed.remote.file(&path()), before);
    assert!(bed.scratch_is_empty());
}

#[test]
fn truncated_upload_is_removed() {
    let bed = TestBed::new();
    let mut vault = scenarios::synced_vault(&bed, FILE, 2);
    let previous = bed.remote.file(&path()).unwrap();
    bed.remote.truncate_uploads(true);

    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::UploadFailed);
    assert!(!bed.remote.contains(&path()));
    assert_eq!(bed.remote.file(&backup()), Some(previous));
    assert!(bed.remote.calls().contains(&RemoteCall::Delete(path())));
    assert!(bed.scratch_is_empty());

    bed.remote.clear_faults();
    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::Success);
}

#[test]
fn corrupted_upload_is_removed() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);
    bed.remote.corrupt_uploads(true);

    assert_eq!(bed.sync(&mut vault, false), SyncResultCode::UploadFailed);
    assert!(bed.remote.paths().is_empty());
}

#[test]
fn failed_verify_download_is_a_mismatch() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);
    // Nothing to merge, so the first download is the verification one.
    bed.remote.fail_download_number(1);

    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::UploadFailed);
    assert!(!bed.remote.contains(&path()));
    assert!(bed.scratch_is_empty());
}

#[test]
fn failure_codes() {
    let bed = TestBed::new();
    let mut vault = scenarios::synced_vault(&bed, FILE, 1);

    // Wrong password.
    let ctx = SyncContext::attended(TEST_URL, Credentials::new(TEST_USER, "nope"));
    let code = bed
        .engine
        .synchronize(&mut vault, &ctx, &mut ScriptedPrompt::decline());
    assert_eq!(code, SyncResultCode::InvalidCredentials);
    assert_eq!(bed.remote.calls(), vec![RemoteCall::Connect]);
    bed.remote.clear_calls();

    // Refused connection.
    bed.remote.fail_connect("connection refused");
    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::ConnectFailed);
    bed.remote.clear_faults();

    // Transport reporting a bad login as text only.
    bed.remote.fail_connect("Authentication failed (Password)");
    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::InvalidCredentials);
    bed.remote.clear_faults();

    // Fetching the existing copy fails.
    // The initial sync made one download, to verify its upload.
    let before = bed.remote.file(&path());
    bed.remote.fail_download_number(2);
    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::DownloadFailed);
    assert_eq!(bed.remote.file(&path()), before);
    bed.remote.clear_faults();

    // Backup rename fails.
    bed.remote.fail_renames(true);
    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::UploadFailed);
    assert_eq!(bed.remote.file(&path()), before);
    bed.remote.clear_faults();

    // Upload fails after the backup was taken.
    bed.remote.fail_uploads(true);
    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::UploadFailed);
    assert!(!bed.remote.contains(&path()));
    assert!(bed.remote.contains(&backup()));
    bed.remote.clear_faults();

    assert!(bed.scratch_is_empty());
    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::Success);
}

#[test]
fn lost_session_is_unknown_error() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);
    bed.remote.report_disconnected(true);

    assert_eq!(bed.sync(&mut vault, true), SyncResultCode::UnknownError);
    assert_eq!(bed.engine.state(), SyncState::Failed);
    assert!(bed.scratch_is_empty());
}

#[test]
fn missing_path_is_reported_before_connecting() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);
    let ctx = attended_ctx("sftp://nas:22");
    let code = bed
        .engine
        .synchronize(&mut vault, &ctx, &mut ScriptedPrompt::decline());
    assert_eq!(code, SyncResultCode::InvalidParameters);
    assert!(bed.remote.calls().is_empty());
}

#[test]
fn reporter_follows_the_code() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);
    let reporter = ResultReporter::new(bed.engine.config().status_name.clone());
    let mut sink = RecordingSink::default();

    sink.set_status(&reporter.synchronizing());
    bed.remote.fail_connect("no route to host");
    let code = bed.sync(&mut vault, true);
    reporter.report(code, true, &mut sink);

    assert_eq!(
        sink.statuses,
        vec!["VaultSync: Synchronizing...", "VaultSync: sync failed"]
    );
    assert_eq!(sink.errors.len(), 1);
}

#[test]
fn settings_drive_a_timed_sync() {
    let bed = TestBed::new();
    let mut vault = bed.vault(FILE);
    let settings = SyncSettings {
        url: TEST_URL.to_string(),
        username: TEST_USER.to_string(),
        password: TEST_PASSWORD.to_string(),
        sync_on_open: false,
        sync_on_save: true,
        interval_minutes: 30,
    };
    save_settings(&mut vault, &settings);
    vault.save().unwrap();

    let (loaded, _) = load_settings(&mut vault);
    let start = Instant::now();
    let mut hooks = SyncHooks::new();
    assert_eq!(hooks.on_database_opened(&loaded, start), HookAction::None);

    let due = start + Duration::from_secs(30 * 60);
    let HookAction::Synchronize { attended } = hooks.on_tick(due) else {
        panic!("timer did not fire");
    };
    assert!(!attended);

    hooks.before_attempt();
    let code = bed.engine.synchronize(
        &mut vault,
        &loaded.context(attended),
        &mut ScriptedPrompt::decline(),
    );
    hooks.after_attempt(due);
    assert_eq!(code, SyncResultCode::Success);
    assert!(hooks.timer().is_running());

    // The settings travel with the vault.
    let remote = open_remote(&bed, &path());
    let entry = remote
        .entry(&options_entry_uuid(APP_NAME))
        .unwrap();
    assert_eq!(entry.field(fields::URL), Some(TEST_URL));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn malformed_urls_make_no_remote_calls(
        url in malformed_url_strategy(),
        attended in any::<bool>(),
    ) {
        let bed = TestBed::new();
        let mut vault = bed.vault(FILE);
        let ctx = if attended { attended_ctx(&url) } else { unattended_ctx(&url) };

        let code = bed.engine.synchronize(&mut vault, &ctx, &mut ScriptedPrompt::decline());

        prop_assert!(code.is_configuration_error(), "unexpected {code:?} for {url:?}");
        prop_assert!(bed.remote.calls().is_empty());
        prop_assert!(bed.remote.last_login().is_none());
        prop_assert!(bed.scratch_is_empty());
    }
}
