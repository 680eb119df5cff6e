// config.rs

use std::{collections::HashMap, fs, io, path::PathBuf};

use crate::*;

pub const KEY_NETWORK_NAME: &str = "network-name";
pub const KEY_NETWORK_PASSPHRASE: &str = "network-passphrase";
pub const KEY_CHANNEL_OFFSET: [&str; CHANNELS] = ["channel-1-offset", "channel-2-offset"];

/// DS18B20 worst case conversion time at 12-bit resolution.
pub const CONVERSION_TIME_MS: u64 = 750;

const DEFAULT_API_PORT: u16 = 80;
const DEFAULT_AP_SSID: &str = "KMS Temp logger";
const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;
const DEFAULT_RECONNECT_COOLDOWN_MS: u64 = 10_000;
const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_LONG_PRESS_MS: u64 = 4000;
const DEFAULT_TICK_MS: u64 = 20;
const DEFAULT_STORAGE_PATH: &str = "/spiffs";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MyConfig {
    pub port: u16,

    pub ap_ssid: String,
    pub ap_addr: net::Ipv4Addr,
    pub ap_mask: u8,

    pub sample_interval_ms: u64,
    pub reconnect_cooldown_ms: u64,
    pub connect_attempts: u32,
    pub long_press_ms: u64,
    pub button_active_low: bool,
    pub tick_ms: u64,

    pub storage_path: String,
}

impl Default for MyConfig {
    fn default() -> Self {
        Self {
            port: option_env!("API_PORT")
                .unwrap_or("-")
                .parse()
                .unwrap_or(DEFAULT_API_PORT),

            ap_ssid: option_env!("AP_SSID").unwrap_or(DEFAULT_AP_SSID).into(),
            ap_addr: net::Ipv4Addr::new(10, 10, 10, 1),
            ap_mask: 24,

            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            reconnect_cooldown_ms: DEFAULT_RECONNECT_COOLDOWN_MS,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            button_active_low: true,
            tick_ms: DEFAULT_TICK_MS,

            storage_path: DEFAULT_STORAGE_PATH.into(),
        }
    }
}

impl MyConfig {
    /// Never shorter than the sensor conversion time, otherwise every read
    /// would see an unfinished conversion.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(CONVERSION_TIME_MS))
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_millis(self.reconnect_cooldown_ms)
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Durable text key/value storage.
pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Missing and unreadable keys both read as empty.
    fn get_or_empty(&self, key: &str) -> String {
        match self.get(key) {
            Ok(Some(v)) => v,
            Ok(None) => String::new(),
            Err(e) => {
                error!("Store read error on {key:?}: {e:#}");
                String::new()
            }
        }
    }
}

/// One file per key under a base directory.
#[derive(Debug)]
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        FileStore { base: base.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.txt"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path(key);
        debug!("Reading file: {}", path.display());
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path(key);
        info!("Writing file: {}", path.display());
        fs::write(&path, value)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemStore {
    values: HashMap<String, String>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.into(), value.into());
        Ok(())
    }
}

/// Stands in for storage that failed to mount.
#[derive(Debug, Default)]
pub struct UnavailableStore;

impl KvStore for UnavailableStore {
    fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        bail!("storage is not mounted")
    }

    fn set(&mut self, _key: &str, _value: &str) -> anyhow::Result<()> {
        bail!("storage is not mounted")
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub pass: String,
}

impl Credentials {
    pub fn new(ssid: &str, pass: &str) -> Self {
        Credentials {
            ssid: ssid.into(),
            pass: pass.into(),
        }
    }

    pub fn load(store: &dyn KvStore) -> Self {
        Credentials {
            ssid: store.get_or_empty(KEY_NETWORK_NAME),
            pass: store.get_or_empty(KEY_NETWORK_PASSPHRASE),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ssid.is_empty()
    }
}

// keep the passphrase out of the logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("pass", &"***")
            .finish()
    }
}

/// Empty or unparsable text means no offset.
pub fn parse_offset(text: &str) -> f32 {
    text.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn load_offset(store: &dyn KvStore, channel: usize) -> f32 {
    parse_offset(&store.get_or_empty(KEY_CHANNEL_OFFSET[channel]))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::process;

    #[test]
    fn offsets_parse_leniently() {
        assert_eq!(parse_offset("1.5"), 1.5);
        assert_eq!(parse_offset(" -0.5\n"), -0.5);
        assert_eq!(parse_offset(""), 0.0);
        assert_eq!(parse_offset("warm"), 0.0);
        assert_eq!(parse_offset("NaN"), 0.0);
        assert_eq!(parse_offset("inf"), 0.0);
    }

    #[test]
    fn sample_interval_never_below_conversion_time() {
        let mut config = MyConfig {
            sample_interval_ms: 100,
            ..Default::default()
        };
        assert_eq!(config.sample_interval(), Duration::from_millis(CONVERSION_TIME_MS));
        config.sample_interval_ms = 2000;
        assert_eq!(config.sample_interval(), Duration::from_secs(2));
    }

    #[test]
    fn defaults() {
        let config = MyConfig::default();
        assert_eq!(config.ap_addr, net::Ipv4Addr::new(10, 10, 10, 1));
        assert_eq!(config.reconnect_cooldown(), Duration::from_secs(10));
        assert_eq!(config.long_press(), Duration::from_secs(4));
    }

    #[test]
    fn credentials_from_store() {
        let store = MemStore::new()
            .with(KEY_NETWORK_NAME, "MyNet")
            .with(KEY_NETWORK_PASSPHRASE, "secret123");
        let creds = Credentials::load(&store);
        assert_eq!(creds, Credentials::new("MyNet", "secret123"));
        assert!(!creds.is_empty());
        assert!(!format!("{creds:?}").contains("secret123"));

        assert!(Credentials::load(&MemStore::new()).is_empty());
    }

    #[test]
    fn unavailable_store_reads_empty() {
        let mut store = UnavailableStore;
        assert!(store.get(KEY_NETWORK_NAME).is_err());
        assert_eq!(store.get_or_empty(KEY_NETWORK_NAME), "");
        assert!(Credentials::load(&store).is_empty());
        assert_eq!(load_offset(&store, 1), 0.0);
        assert!(store.set(KEY_NETWORK_NAME, "x").is_err());
    }

    #[test]
    fn file_store_keeps_one_file_per_key() {
        let base = std::env::temp_dir().join(format!("kmstemp-store-{}", process::id()));
        fs::create_dir_all(&base).unwrap();
        let mut store = FileStore::new(&base);

        assert_eq!(store.get(KEY_CHANNEL_OFFSET[0]).unwrap(), None);
        store.set(KEY_CHANNEL_OFFSET[0], "1.5").unwrap();
        store.set(KEY_CHANNEL_OFFSET[1], "-0.5").unwrap();
        assert_eq!(load_offset(&store, 0), 1.5);
        assert_eq!(load_offset(&store, 1), -0.5);
        assert!(base.join("channel-1-offset.txt").exists());

        store.set(KEY_CHANNEL_OFFSET[0], "").unwrap();
        assert_eq!(load_offset(&store, 0), 0.0);

        fs::remove_dir_all(&base).unwrap();
    }
}

// EOF
