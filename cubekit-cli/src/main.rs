//! Bench tool for CubeKit appliances.
//!
//! Operates on two artifacts pulled off (or destined for) a device:
//! region images, plain files holding the bytes of the reserved
//! non-volatile segment, and configuration directories, host
//! directories standing in for the device's flash filesystem. Record
//! obfuscation is keyed by device identity, so every command that
//! touches record contents needs the device's hardware address, chip
//! id, and firmware salt.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use eyre::{bail, eyre, Result};
use serde_json::{Map, Value};
use tracing::debug;

use cubekit_config::settings::{FIELD_API_TOKEN, FIELD_WIFI_PASSWORD, FIELD_WIFI_SSID};
use cubekit_config::{ConfigError, ConfigManager, DirConfigFs, DEFAULT_CONFIG_PATH};
use cubekit_nvs::format::{max_payload, RecordHeader, DEFAULT_REGION_CAPACITY, HEADER_SIZE};
use cubekit_nvs::{DeviceIdentity, FileRegion, NvsRegion, ObfuscationKey, SecureStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "CubeKit appliance bench tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a region image holding an initialized empty store.
    Init(InitArgs),
    /// Decode a region image header without touching record contents.
    Inspect(ImageArgs),
    /// Decode a region image and print every stored entry.
    Dump(StoreArgs),
    /// Print a single value from a region image.
    Get(GetArgs),
    /// Write a value into a region image. An unreadable image is
    /// recovered to an empty store first, as on the device.
    Put(PutArgs),
    /// Delete a key from a region image.
    Remove(RemoveArgs),
    /// Load a configuration directory and print the effective settings.
    Show(ShowArgs),
    /// Update the Wi-Fi credentials held in the store.
    SetWifi(SetWifiArgs),
    /// Update the API token held in the store.
    SetToken(SetTokenArgs),
    /// Set or clear the NTP server override in the document.
    SetNtp(SetNtpArgs),
}

#[derive(Args, Debug, Clone)]
struct IdentityArgs {
    /// Hardware address mixed into the record key, e.g. AA:BB:CC:DD:EE:FF.
    #[arg(long, env = "CUBEKIT_MAC", value_name = "ADDR")]
    mac: String,

    /// Chip identifier mixed into the record key.
    #[arg(long, env = "CUBEKIT_CHIP_ID", value_name = "ID")]
    chip_id: u32,

    /// Obfuscation salt the firmware build was provisioned with.
    #[arg(long, env = "CUBEKIT_SALT", value_name = "SALT")]
    salt: String,
}

impl IdentityArgs {
    fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.mac.clone(), self.chip_id)
    }
}

#[derive(Args, Debug, Clone)]
struct ImageArgs {
    /// Path to the region image.
    #[arg(long, value_name = "PATH")]
    image: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct InitArgs {
    #[command(flatten)]
    image: ImageArgs,

    #[command(flatten)]
    identity: IdentityArgs,

    /// Region capacity in bytes.
    #[arg(long, default_value_t = DEFAULT_REGION_CAPACITY, value_name = "BYTES")]
    capacity: usize,
}

#[derive(Args, Debug, Clone)]
struct StoreArgs {
    #[command(flatten)]
    image: ImageArgs,

    #[command(flatten)]
    identity: IdentityArgs,
}

#[derive(Args, Debug, Clone)]
struct GetArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Key to read.
    key: String,
}

#[derive(Args, Debug, Clone)]
struct PutArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Key to write.
    key: String,

    /// Value to store under the key.
    value: String,
}

#[derive(Args, Debug, Clone)]
struct RemoveArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Key to delete.
    key: String,
}

#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Directory standing in for the flash filesystem root.
    #[arg(long, value_name = "DIR")]
    root: PathBuf,

    /// Document path inside the root.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, value_name = "PATH")]
    config: String,

    #[command(flatten)]
    image: ImageArgs,

    #[command(flatten)]
    identity: IdentityArgs,
}

#[derive(Args, Debug, Clone)]
struct ShowArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Print secret values instead of placeholders.
    #[arg(long)]
    reveal: bool,
}

#[derive(Args, Debug, Clone)]
struct SetWifiArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Network name to connect to.
    #[arg(long, value_name = "SSID")]
    ssid: String,

    /// Network passphrase.
    #[arg(long, value_name = "PASSWORD")]
    password: String,
}

#[derive(Args, Debug, Clone)]
struct SetTokenArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Backend API token.
    #[arg(long, value_name = "TOKEN")]
    token: String,
}

#[derive(Args, Debug, Clone)]
struct SetNtpArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// NTP host, or an empty string to fall back to the built-in pool.
    #[arg(long, value_name = "HOST")]
    server: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init(args) => execute_init(&args),
        Command::Inspect(args) => execute_inspect(&args),
        Command::Dump(args) => execute_dump(&args),
        Command::Get(args) => execute_get(&args),
        Command::Put(args) => execute_put(&args),
        Command::Remove(args) => execute_remove(&args),
        Command::Show(args) => execute_show(&args),
        Command::SetWifi(args) => execute_set_wifi(&args),
        Command::SetToken(args) => execute_set_token(&args),
        Command::SetNtp(args) => execute_set_ntp(&args),
    }
}

// =============================================================================
// Region image commands
// =============================================================================

fn execute_init(args: &InitArgs) -> Result<()> {
    let region = FileRegion::create(&args.image.image, args.capacity)?;
    let mut store = SecureStore::new(region, &args.identity.identity(), &args.identity.salt);
    store.begin()?;
    println!(
        "Initialized '{}': {} bytes, payload limit {} bytes.",
        args.image.image.display(),
        args.capacity,
        max_payload(args.capacity)
    );
    Ok(())
}

fn execute_inspect(args: &ImageArgs) -> Result<()> {
    let mut region = FileRegion::open(&args.image)?;
    let capacity = region.capacity();
    println!("Region image '{}'", args.image.display());
    println!("  capacity      : {capacity} bytes");
    println!("  payload limit : {} bytes", max_payload(capacity));

    let mut header = [0u8; HEADER_SIZE];
    if let Err(err) = region.read_at(0, &mut header) {
        println!("  header        : unreadable ({err})");
        println!("The appliance would reinitialize this region on boot.");
        return Ok(());
    }
    println!("  header bytes  : {}", hex::encode(header));

    match RecordHeader::decode(&header, capacity) {
        Ok(decoded) => {
            let used = usize::from(decoded.payload_len);
            println!("  payload bytes : {used}");
            println!("  free bytes    : {}", max_payload(capacity) - used);
        }
        Err(err) => {
            println!("  header        : invalid ({err})");
            println!("The appliance would reinitialize this region on boot.");
        }
    }
    Ok(())
}

fn execute_dump(args: &StoreArgs) -> Result<()> {
    let mut region = FileRegion::open(&args.image.image)?;
    let doc = read_document(&mut region, &args.identity)?;
    if doc.is_empty() {
        println!("Store is empty.");
        return Ok(());
    }
    for (key, value) in &doc {
        match value {
            Value::String(text) => println!("{key} = {text}"),
            other => println!("{key} = {other}"),
        }
    }
    Ok(())
}

fn execute_get(args: &GetArgs) -> Result<()> {
    let mut region = FileRegion::open(&args.store.image.image)?;
    let doc = read_document(&mut region, &args.store.identity)?;
    if let Some(Value::String(value)) = doc.get(&args.key) {
        println!("{value}");
        Ok(())
    } else {
        bail!("key '{}' is not set", args.key)
    }
}

fn execute_put(args: &PutArgs) -> Result<()> {
    let mut store = open_store(&args.store)?;
    store.put(&args.key, &args.value)?;
    println!("Stored '{}'.", args.key);
    Ok(())
}

fn execute_remove(args: &RemoveArgs) -> Result<()> {
    let mut store = open_store(&args.store)?;
    store.remove(&args.key)?;
    println!("Removed '{}'.", args.key);
    Ok(())
}

fn open_store(args: &StoreArgs) -> Result<SecureStore<FileRegion>> {
    debug!(image = %args.image.image.display(), "opening region image");
    let region = FileRegion::open(&args.image.image)?;
    Ok(SecureStore::new(
        region,
        &args.identity.identity(),
        &args.identity.salt,
    ))
}

/// Read-only decode of a region image.
///
/// `dump` and `get` go through this instead of a store so that looking
/// at a corrupt or foreign image never rewrites it.
fn read_document(region: &mut FileRegion, identity: &IdentityArgs) -> Result<Map<String, Value>> {
    let capacity = region.capacity();
    let mut header = [0u8; HEADER_SIZE];
    region.read_at(0, &mut header)?;
    let decoded = RecordHeader::decode(&header, capacity)?;

    let mut payload = vec![0u8; usize::from(decoded.payload_len)];
    region.read_at(HEADER_SIZE, &mut payload)?;
    ObfuscationKey::derive(&identity.identity(), &identity.salt).apply_keystream(&mut payload);

    serde_json::from_slice(&payload)
        .map_err(|err| eyre!("payload does not parse as a document ({err}); wrong salt or identity?"))
}

// =============================================================================
// Configuration commands
// =============================================================================

fn execute_show(args: &ShowArgs) -> Result<()> {
    let mut manager = open_manager(&args.config)?;
    manager.load()?;

    let display = manager.display();
    println!(
        "Configuration '{}' under '{}'",
        manager.path(),
        args.config.root.display()
    );
    println!(
        "  display       : {}x{}, rotation {}, SPI {} Hz",
        display.width,
        display.height,
        display.rotation,
        display.effective_spi_hz()
    );
    let ntp = manager.ntp_server().map_or_else(
        || format!("{} (default)", manager.ntp_server_or_default()),
        ToString::to_string,
    );
    println!("  ntp server    : {ntp}");
    println!("  wifi ssid     : {}", text_or_unset(manager.wifi_ssid()));
    println!(
        "  wifi password : {}",
        secret(manager.wifi_password(), args.reveal)
    );
    println!("  api token     : {}", secret(manager.api_token(), args.reveal));
    Ok(())
}

fn execute_set_wifi(args: &SetWifiArgs) -> Result<()> {
    let mut manager = open_manager(&args.config)?;
    load_or_adopt(&mut manager)?;
    manager.set_wifi(&args.ssid, &args.password);
    manager.save()?;
    println!("Wi-Fi credentials updated.");
    Ok(())
}

fn execute_set_token(args: &SetTokenArgs) -> Result<()> {
    let mut manager = open_manager(&args.config)?;
    load_or_adopt(&mut manager)?;
    manager.set_api_token(&args.token);
    manager.save()?;
    println!("API token updated.");
    Ok(())
}

fn execute_set_ntp(args: &SetNtpArgs) -> Result<()> {
    let mut manager = open_manager(&args.config)?;
    load_or_adopt(&mut manager)?;
    manager.set_ntp_server(&args.server);
    manager.save()?;
    if args.server.is_empty() {
        println!("NTP server override cleared.");
    } else {
        println!("NTP server set to '{}'.", args.server);
    }
    Ok(())
}

fn open_manager(args: &ConfigArgs) -> Result<ConfigManager<DirConfigFs, FileRegion>> {
    debug!(root = %args.root.display(), "opening configuration directory");
    let region = FileRegion::open(&args.image.image)?;
    let store = SecureStore::new(region, &args.identity.identity(), &args.identity.salt);
    Ok(ConfigManager::new(
        DirConfigFs::new(&args.root),
        store,
        args.config.clone(),
    ))
}

/// Loads the configuration, treating a missing document as a fresh
/// deployment: secrets already in the store are adopted so a later
/// `save` does not overwrite them with empty values.
fn load_or_adopt(manager: &mut ConfigManager<DirConfigFs, FileRegion>) -> Result<()> {
    match manager.load() {
        Ok(()) => Ok(()),
        Err(ConfigError::Missing { .. }) => {
            let ssid = manager.store_mut().get_or(FIELD_WIFI_SSID, "");
            let password = manager.store_mut().get_or(FIELD_WIFI_PASSWORD, "");
            let token = manager.store_mut().get_or(FIELD_API_TOKEN, "");
            manager.set_wifi(&ssid, &password);
            manager.set_api_token(&token);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn text_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}

fn secret(value: &str, reveal: bool) -> &str {
    if value.is_empty() {
        "(unset)"
    } else if reveal {
        value
    } else {
        "(set)"
    }
}
