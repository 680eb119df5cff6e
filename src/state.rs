// state.rs

use tokio::sync::mpsc;

use crate::*;

/// Asks from the web surface to the control loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    Reconnect,
    ReloadCalibration,
}

pub type SharedStore = Box<dyn KvStore + Send + Sync>;

pub struct MyState {
    pub config: MyConfig,
    pub storage_ok: bool,
    pub api_cnt: AtomicU32,
    pub uptime: RwLock<u64>,
    pub net: RwLock<NetState>,
    pub readings: RwLock<[Reading; CHANNELS]>,
    pub store: RwLock<SharedStore>,
    requests: mpsc::UnboundedSender<Request>,
}

impl MyState {
    pub fn new(
        config: MyConfig,
        store: SharedStore,
        storage_ok: bool,
    ) -> (Self, mpsc::UnboundedReceiver<Request>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = MyState {
            config,
            storage_ok,
            api_cnt: AtomicU32::new(0),
            uptime: RwLock::new(0),
            net: RwLock::new(NetState::Uninitialized),
            readings: RwLock::new([Reading::Initializing; CHANNELS]),
            store: RwLock::new(store),
            requests: tx,
        };
        (state, rx)
    }

    pub fn request(&self, request: Request) {
        if self.requests.send(request).is_err() {
            error!("Control loop is gone, dropped {request:?}");
        }
    }

    pub async fn temp_values(&self) -> TempValues {
        let uptime = *self.uptime.read().await;
        let net = *self.net.read().await;
        let readings = *self.readings.read().await;
        TempValues::new(uptime, &net, &readings)
    }

    pub async fn status(&self) -> DeviceStatus {
        let net = *self.net.read().await;
        DeviceStatus {
            version: FW_VERSION,
            mode: net.to_string(),
            address: net.address().map(|a| a.to_string()),
            uptime: *self.uptime.read().await,
            requests: self.api_cnt.load(Ordering::Relaxed),
            storage: self.storage_ok,
        }
    }
}

// EOF
