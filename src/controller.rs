// controller.rs

use std::net::Ipv4Addr;

use embedded_hal::digital::InputPin;
use tokio::sync::mpsc;

use crate::*;

/// Hardware handed to the controller at boot.
pub struct Hardware<N, D, B, S> {
    pub net: N,
    pub display: D,
    pub button: B,
    pub sensors: [S; CHANNELS],
}

/// Owns all device state: connectivity, both sampling channels and the
/// mode button, plus the hardware they drive. Nothing in here blocks.
pub struct Controller<N, D, B, S> {
    net: N,
    display: D,
    button: B,
    sensors: [S; CHANNELS],
    connectivity: Connectivity,
    samplers: [Sampler; CHANNELS],
    long_press: LongPress,
    link: Option<Ipv4Addr>,
}

impl<N, D, B, S> Controller<N, D, B, S>
where
    N: NetDriver,
    D: StatusDisplay,
    B: InputPin,
    S: TempSensor,
{
    pub fn new(config: &MyConfig, hw: Hardware<N, D, B, S>) -> Self {
        let active = if config.button_active_low {
            PinLevel::Low
        } else {
            PinLevel::High
        };
        let interval = config.sample_interval();

        Controller {
            net: hw.net,
            display: hw.display,
            button: hw.button,
            sensors: hw.sensors,
            connectivity: Connectivity::new(config),
            samplers: std::array::from_fn(|ch| Sampler::new(ch, interval)),
            long_press: LongPress::with_active_level(config.long_press(), active),
            link: None,
        }
    }

    pub fn net_state(&self) -> NetState {
        self.connectivity.state()
    }

    pub fn readings(&self) -> [Reading; CHANNELS] {
        std::array::from_fn(|ch| self.samplers[ch].snapshot())
    }

    pub fn offsets(&self) -> [f32; CHANNELS] {
        std::array::from_fn(|ch| self.samplers[ch].offset())
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Boot: load calibration, start the first conversions, pick a radio mode.
    pub fn initialize(&mut self, store: &dyn KvStore, now: Duration) {
        self.reload_calibration(store);
        for ch in 0..CHANNELS {
            self.samplers[ch].start(&mut self.sensors[ch], now);
            self.show_channel(ch, Reading::Initializing);
        }

        let actions = self.connectivity.initialize(Credentials::load(store), now);
        self.execute(actions);
    }

    pub fn handle_request(&mut self, request: Request, store: &dyn KvStore, now: Duration) {
        info!("Handling {request:?}");
        match request {
            Request::Reconnect => {
                let credentials = Credentials::load(store);
                self.handle_event(NetEvent::ReconnectRequested { credentials }, now);
            }
            Request::ReloadCalibration => self.reload_calibration(store),
        }
    }

    pub fn handle_event(&mut self, event: NetEvent, now: Duration) {
        let actions = self.connectivity.handle(event, now);
        self.execute(actions);
    }

    /// One pass of the main loop.
    pub fn tick(&mut self, now: Duration) {
        self.poll_link(now);

        // forcing an access point that is already up is pointless
        if self.connectivity.mode() != Some(ConnectivityMode::AccessPoint) {
            self.poll_button(now);
        }

        let actions = self.connectivity.tick(now, self.link.is_some());
        self.execute(actions);

        for ch in 0..CHANNELS {
            if let Some(reading) = self.samplers[ch].tick(&mut self.sensors[ch], now) {
                self.show_channel(ch, reading);
            }
        }
    }

    fn reload_calibration(&mut self, store: &dyn KvStore) {
        for (ch, sampler) in self.samplers.iter_mut().enumerate() {
            sampler.set_offset(load_offset(store, ch));
        }
    }

    // turn the live link status into up/down edges
    fn poll_link(&mut self, now: Duration) {
        let link = self.net.link_address();
        if link == self.link {
            return;
        }
        self.link = link;
        let event = match link {
            Some(address) => NetEvent::LinkUp { address },
            None => NetEvent::LinkDown,
        };
        self.handle_event(event, now);
    }

    fn poll_button(&mut self, now: Duration) {
        let level = match self.button.is_high() {
            Ok(high) => PinLevel::from(high),
            Err(e) => {
                warn!("Button read error: {e:?}");
                return;
            }
        };
        if self.long_press.poll(level, now) {
            self.handle_event(NetEvent::ForceAccessPoint, now);
        }
    }

    fn show_channel(&mut self, ch: usize, reading: Reading) {
        let (row, col) = channel_position(ch);
        self.show(row, col, &channel_text(reading));
    }

    fn show(&mut self, row: u8, col: u8, text: &str) {
        if let Err(e) = self.display.write_at(row, col, text) {
            debug!("Display write failed: {e:#}");
        }
    }

    // radio actions supersede the previous attempt, its link edges are dropped
    fn restart_radio<F>(&mut self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut N) -> anyhow::Result<()>,
    {
        let res = f(&mut self.net);
        self.link = self.net.link_address();
        res
    }

    fn execute(&mut self, actions: Vec<NetAction>) {
        for action in actions {
            let description = format!("{action:?}");
            let res = match action {
                NetAction::StartAccessPoint { ssid } => {
                    self.restart_radio(|net| net.start_access_point(&ssid))
                }
                NetAction::Associate(credentials) => {
                    self.restart_radio(|net| net.associate(&credentials))
                }
                NetAction::Disassociate => self.restart_radio(|net| net.disassociate()),
                NetAction::ShowAddress(address) => {
                    self.show(STATUS_ROW, 0, &address_text(address));
                    Ok(())
                }
                NetAction::ShowAccessPoint(address) => {
                    self.show(STATUS_ROW, 0, &access_point_text(address));
                    Ok(())
                }
                NetAction::ShowDisconnected => {
                    self.show(STATUS_ROW, 0, &disconnected_text());
                    Ok(())
                }
            };
            match res {
                Ok(()) => debug!("Network action done [{description}]"),
                Err(e) => error!("Network action failed [{description}]: {e:#}"),
            }
        }
    }
}

/// Drives the controller forever, publishing snapshots for the web surface.
/// Requests queued by the web surface are applied between ticks.
pub async fn run_controller<N, D, B, S, C>(
    state: Arc<Pin<Box<MyState>>>,
    mut controller: Controller<N, D, B, S>,
    clock: C,
    mut requests: mpsc::UnboundedReceiver<Request>,
) -> anyhow::Result<()>
where
    N: NetDriver,
    D: StatusDisplay,
    B: InputPin,
    S: TempSensor,
    C: Clock,
{
    {
        let store = state.store.read().await;
        controller.initialize(&**store, clock.now());
    }
    let tick = state.config.tick();

    loop {
        let now = clock.now();
        while let Ok(request) = requests.try_recv() {
            let store = state.store.read().await;
            controller.handle_request(request, &**store, now);
        }

        controller.tick(now);

        *state.readings.write().await = controller.readings();
        *state.net.write().await = controller.net_state();
        *state.uptime.write().await = now.as_secs();

        sleep(tick).await;
    }
}

// EOF
