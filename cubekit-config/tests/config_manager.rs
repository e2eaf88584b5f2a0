//! End-to-end configuration behavior: loading, saving, and the
//! one-time secret migration.

use serde_json::{Map, Value};

use cubekit_config::{
    ConfigError, ConfigManager, DirConfigFs, MemoryConfigFs, DEFAULT_CONFIG_PATH,
};
use cubekit_nvs::{DeviceIdentity, FileRegion, MemoryRegion, SecureStore};

const SALT: &str = "public-salt";

fn identity() -> DeviceIdentity {
    DeviceIdentity::new("AA:BB:CC:DD:EE:FF".to_string(), 123)
}

fn fresh_store() -> SecureStore<MemoryRegion> {
    SecureStore::new(MemoryRegion::default(), &identity(), SALT)
}

fn manager_with_file(json: &str) -> ConfigManager<MemoryConfigFs, MemoryRegion> {
    let fs = MemoryConfigFs::new().with_file(DEFAULT_CONFIG_PATH, json);
    ConfigManager::new(fs, fresh_store(), DEFAULT_CONFIG_PATH)
}

fn parse_document(fs: &MemoryConfigFs) -> Map<String, Value> {
    serde_json::from_slice(fs.file(DEFAULT_CONFIG_PATH).unwrap()).unwrap()
}

#[test]
fn load_applies_defaults_for_missing_fields() {
    let mut config = manager_with_file(r#"{"lcd_rotation":1}"#);
    config.load().unwrap();

    assert_eq!(config.display().rotation, 1);
    assert_eq!(config.display().width, 240);
    assert_eq!(config.ntp_server(), None);
    assert_eq!(config.ntp_server_or_default(), "pool.ntp.org");
    assert_eq!(config.wifi_ssid(), "");
}

#[test]
fn missing_document_fails_and_keeps_defaults() {
    let fs = MemoryConfigFs::new();
    let mut config = ConfigManager::new(fs, fresh_store(), DEFAULT_CONFIG_PATH);

    assert!(matches!(config.load(), Err(ConfigError::Missing { .. })));
    assert_eq!(config.display().rotation, 4);
}

#[test]
fn empty_document_is_its_own_failure() {
    let mut config = manager_with_file("");
    assert!(matches!(config.load(), Err(ConfigError::Empty { .. })));
}

#[test]
fn malformed_document_reports_the_parser() {
    let mut config = manager_with_file("{not json");
    assert!(matches!(config.load(), Err(ConfigError::Document(_))));
}

#[test]
fn mount_failure_is_fatal_to_load() {
    let mut fs = MemoryConfigFs::new().with_file(DEFAULT_CONFIG_PATH, "{}");
    fs.fail_mounts("flash offline");
    let mut config = ConfigManager::new(fs, fresh_store(), DEFAULT_CONFIG_PATH);

    assert!(matches!(config.load(), Err(ConfigError::Mount(_))));
}

#[test]
fn first_load_migrates_secrets_and_strips_the_document() {
    let mut config = manager_with_file(
        r#"{
            "lcd_rotation": 3,
            "wifi_ssid": "homenet",
            "wifi_password": "hunter2",
            "api_token": "tok_1"
        }"#,
    );
    config.load().unwrap();

    assert_eq!(config.wifi_ssid(), "homenet");
    assert_eq!(config.wifi_password(), "hunter2");
    assert_eq!(config.api_token(), "tok_1");
    assert_eq!(config.display().rotation, 3);

    let (fs, mut store) = config.into_parts();

    // One rewrite, and the document no longer carries any secret.
    assert_eq!(fs.write_count(), 1);
    let doc = parse_document(&fs);
    assert!(!doc.contains_key("wifi_ssid"));
    assert!(!doc.contains_key("wifi_password"));
    assert!(!doc.contains_key("api_token"));
    assert_eq!(doc.get("lcd_rotation"), Some(&Value::from(3)));

    assert_eq!(store.get_or("wifi_ssid", ""), "homenet");
    assert_eq!(store.get_or("wifi_password", ""), "hunter2");
    assert_eq!(store.get_or("api_token", ""), "tok_1");
}

#[test]
fn second_load_after_migration_writes_nothing() {
    let mut config = manager_with_file(
        r#"{"wifi_ssid":"homenet","wifi_password":"hunter2","api_token":"tok_1"}"#,
    );
    config.load().unwrap();

    // Restart: same document, same region bytes, fresh instances.
    let (fs, store) = config.into_parts();
    let writes_after_first_load = fs.write_count();
    let region = store.into_region();
    let commits_after_first_load = region.commit_count();

    let store = SecureStore::new(region, &identity(), SALT);
    let mut config = ConfigManager::new(fs, store, DEFAULT_CONFIG_PATH);
    config.load().unwrap();

    assert_eq!(config.wifi_ssid(), "homenet");
    assert_eq!(config.wifi_password(), "hunter2");

    let (fs, store) = config.into_parts();
    assert_eq!(fs.write_count(), writes_after_first_load);
    assert_eq!(store.into_region().commit_count(), commits_after_first_load);
}

#[test]
fn store_value_wins_over_plaintext_claim() {
    let mut store = fresh_store();
    store.put("wifi_ssid", "authoritative").unwrap();

    let fs = MemoryConfigFs::new().with_file(DEFAULT_CONFIG_PATH, r#"{"wifi_ssid":"stale"}"#);
    let mut config = ConfigManager::new(fs, store, DEFAULT_CONFIG_PATH);
    config.load().unwrap();

    assert_eq!(config.wifi_ssid(), "authoritative");

    // No migration, so the document was not rewritten.
    let (fs, _) = config.into_parts();
    assert_eq!(fs.write_count(), 0);
}

#[test]
fn migration_is_per_field() {
    let mut store = fresh_store();
    store.put("wifi_ssid", "stored-net").unwrap();

    let fs = MemoryConfigFs::new().with_file(
        DEFAULT_CONFIG_PATH,
        r#"{"wifi_ssid":"stale-net","wifi_password":"fresh-pw"}"#,
    );
    let mut config = ConfigManager::new(fs, store, DEFAULT_CONFIG_PATH);
    config.load().unwrap();

    // The password migrated; the SSID kept its stored value.
    assert_eq!(config.wifi_ssid(), "stored-net");
    assert_eq!(config.wifi_password(), "fresh-pw");

    let (fs, mut store) = config.into_parts();
    assert_eq!(store.get_or("wifi_password", ""), "fresh-pw");
    let doc = parse_document(&fs);
    assert!(!doc.contains_key("wifi_ssid"));
    assert!(!doc.contains_key("wifi_password"));
}

#[test]
fn failed_migration_leaves_plaintext_secrets_in_place() {
    // An 8-byte region admits the empty document but nothing more, so
    // the migration's store write must fail.
    let store = SecureStore::new(MemoryRegion::new(8), &identity(), SALT);
    let fs = MemoryConfigFs::new().with_file(DEFAULT_CONFIG_PATH, r#"{"wifi_ssid":"homenet"}"#);
    let mut config = ConfigManager::new(fs, store, DEFAULT_CONFIG_PATH);

    assert!(matches!(config.load(), Err(ConfigError::Store(_))));

    let (fs, _) = config.into_parts();
    assert_eq!(fs.write_count(), 0);
    let doc = parse_document(&fs);
    assert_eq!(doc.get("wifi_ssid"), Some(&Value::from("homenet")));
}

#[test]
fn save_persists_plaintext_and_secrets_to_their_homes() {
    let fs = MemoryConfigFs::new();
    let mut config = ConfigManager::new(fs, fresh_store(), DEFAULT_CONFIG_PATH);

    config.set_wifi("homenet", "hunter2");
    config.set_api_token("tok_9");
    config.set_ntp_server("time.cloudflare.com");
    config.save().unwrap();

    let (fs, store) = config.into_parts();
    let doc = parse_document(&fs);
    assert_eq!(doc.get("lcd_rotation"), Some(&Value::from(4)));
    assert_eq!(
        doc.get("ntp_server"),
        Some(&Value::from("time.cloudflare.com"))
    );
    assert!(!doc.contains_key("wifi_ssid"));
    assert!(!doc.contains_key("wifi_password"));
    assert!(!doc.contains_key("api_token"));

    // Restart: everything comes back from its own home.
    let store = SecureStore::new(store.into_region(), &identity(), SALT);
    let mut config = ConfigManager::new(fs, store, DEFAULT_CONFIG_PATH);
    config.load().unwrap();
    assert_eq!(config.wifi_ssid(), "homenet");
    assert_eq!(config.wifi_password(), "hunter2");
    assert_eq!(config.api_token(), "tok_9");
    assert_eq!(config.ntp_server(), Some("time.cloudflare.com"));
}

#[test]
fn save_batches_secret_fields_into_one_flush() {
    let fs = MemoryConfigFs::new();
    let mut config = ConfigManager::new(fs, fresh_store(), DEFAULT_CONFIG_PATH);
    config.store_mut().begin().unwrap();

    config.set_wifi("homenet", "hunter2");
    config.set_api_token("tok_9");
    config.save().unwrap();

    let (_, store) = config.into_parts();
    // One commit from initialization, one from the batched save.
    assert_eq!(store.into_region().commit_count(), 2);
}

#[test]
fn clearing_the_ntp_server_removes_it_from_the_document() {
    let fs = MemoryConfigFs::new();
    let mut config = ConfigManager::new(fs, fresh_store(), DEFAULT_CONFIG_PATH);

    config.set_ntp_server("time.example.net");
    config.save().unwrap();
    config.set_ntp_server("");
    config.save().unwrap();

    let (fs, _) = config.into_parts();
    let doc = parse_document(&fs);
    assert!(!doc.contains_key("ntp_server"));
    assert!(fs.file(DEFAULT_CONFIG_PATH).is_some());
}

#[test]
fn migration_round_trips_through_real_files() {
    let dir = tempfile::tempdir().unwrap();
    let region_path = dir.path().join("nvs.bin");
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"lcd_rotation":2,"wifi_ssid":"homenet","wifi_password":"hunter2"}"#,
    )
    .unwrap();

    let region = FileRegion::create(&region_path, 512).unwrap();
    let store = SecureStore::new(region, &identity(), SALT);
    let mut config = ConfigManager::new(
        DirConfigFs::new(dir.path()),
        store,
        DEFAULT_CONFIG_PATH,
    );
    config.load().unwrap();
    assert_eq!(config.wifi_ssid(), "homenet");
    drop(config);

    // Cold start from the files alone.
    let region = FileRegion::open(&region_path).unwrap();
    let store = SecureStore::new(region, &identity(), SALT);
    let mut config = ConfigManager::new(
        DirConfigFs::new(dir.path()),
        store,
        DEFAULT_CONFIG_PATH,
    );
    config.load().unwrap();

    assert_eq!(config.wifi_ssid(), "homenet");
    assert_eq!(config.wifi_password(), "hunter2");
    assert_eq!(config.display().rotation, 2);

    let on_disk: Map<String, Value> =
        serde_json::from_slice(&std::fs::read(dir.path().join("config.json")).unwrap()).unwrap();
    assert!(!on_disk.contains_key("wifi_ssid"));
    assert!(!on_disk.contains_key("wifi_password"));
}
