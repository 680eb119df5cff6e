// connectivity.rs

use std::net::Ipv4Addr;

use crate::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectivityMode {
    Client,
    AccessPoint,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NetState {
    #[default]
    Uninitialized,
    AccessPoint,
    Connecting,
    Connected(Ipv4Addr),
}

impl NetState {
    pub fn mode(&self) -> Option<ConnectivityMode> {
        match self {
            NetState::Uninitialized => None,
            NetState::AccessPoint => Some(ConnectivityMode::AccessPoint),
            NetState::Connecting | NetState::Connected(_) => Some(ConnectivityMode::Client),
        }
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        match self {
            NetState::Connected(a) => Some(*a),
            _ => None,
        }
    }
}

impl fmt::Display for NetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NetState::Uninitialized => "uninitialized",
            NetState::AccessPoint => "access-point",
            NetState::Connecting => "connecting",
            NetState::Connected(_) => "connected",
        })
    }
}

/// Inputs to the connectivity state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetEvent {
    LinkUp { address: Ipv4Addr },
    LinkDown,
    ReconnectRequested { credentials: Credentials },
    ForceAccessPoint,
}

/// Side effects requested by a transition, carried out by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetAction {
    StartAccessPoint { ssid: String },
    Associate(Credentials),
    Disassociate,
    ShowAddress(Ipv4Addr),
    ShowAccessPoint(Ipv4Addr),
    ShowDisconnected,
}

/// The radio as seen by the controller. Every call must return without
/// waiting for the air: association is started here and observed later
/// through `link_address()`.
pub trait NetDriver {
    /// Switch the radio into exclusive access point mode.
    fn start_access_point(&mut self, ssid: &str) -> anyhow::Result<()>;
    /// Switch into station mode and start joining the given network.
    fn associate(&mut self, credentials: &Credentials) -> anyhow::Result<()>;
    fn disassociate(&mut self) -> anyhow::Result<()>;
    /// Station address while associated and configured.
    fn link_address(&mut self) -> Option<Ipv4Addr>;
}

/// Decides between station and access point mode and paces reconnects.
///
/// Transitions are pure: each call updates the state and returns the
/// actions to perform. A session that never got a link gives up after
/// `connect_attempts` tries and falls back to the access point. Once a
/// session has been connected, lost links are retried forever, one
/// attempt per cooldown.
#[derive(Debug)]
pub struct Connectivity {
    state: NetState,
    ap_ssid: String,
    ap_addr: Ipv4Addr,
    cooldown: Interval,
    max_attempts: u32,
    attempts: u32,
    established: bool,
    credentials: Credentials,
}

impl Connectivity {
    pub fn new(config: &MyConfig) -> Self {
        Connectivity {
            state: NetState::Uninitialized,
            ap_ssid: config.ap_ssid.clone(),
            ap_addr: config.ap_addr,
            cooldown: Interval::new(config.reconnect_cooldown()),
            max_attempts: config.connect_attempts.max(1),
            attempts: 0,
            established: false,
            credentials: Credentials::default(),
        }
    }

    pub fn state(&self) -> NetState {
        self.state
    }

    pub fn mode(&self) -> Option<ConnectivityMode> {
        self.state.mode()
    }

    /// Attempts made in the current session.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_attempt(&self) -> Option<Duration> {
        self.cooldown.last()
    }

    pub fn initialize(&mut self, credentials: Credentials, now: Duration) -> Vec<NetAction> {
        info!("Network init, stored network {:?}", credentials.ssid);
        self.begin_session(credentials, now)
    }

    pub fn handle(&mut self, event: NetEvent, now: Duration) -> Vec<NetAction> {
        match event {
            NetEvent::LinkUp { address } => self.on_link_established(address),
            NetEvent::LinkDown => self.on_link_lost(now),
            NetEvent::ReconnectRequested { credentials } => {
                self.request_reconnect(credentials, now)
            }
            NetEvent::ForceAccessPoint => self.force_access_point(),
        }
    }

    pub fn on_link_established(&mut self, address: Ipv4Addr) -> Vec<NetAction> {
        match self.state {
            NetState::Uninitialized | NetState::AccessPoint => {
                debug!("Ignoring stale link-up {address}");
                Vec::new()
            }
            NetState::Connecting | NetState::Connected(_) => {
                info!("IP Address: {address}");
                self.state = NetState::Connected(address);
                self.established = true;
                self.attempts = 0;
                self.cooldown.clear();
                vec![NetAction::ShowAddress(address)]
            }
        }
    }

    pub fn on_link_lost(&mut self, now: Duration) -> Vec<NetAction> {
        match self.state {
            NetState::Uninitialized | NetState::AccessPoint => Vec::new(),
            NetState::Connected(address) => {
                warn!("Link lost (was {address}), retrying in {:?}", self.cooldown.period());
                self.state = NetState::Connecting;
                self.cooldown.mark(now);
                vec![NetAction::ShowDisconnected, NetAction::Disassociate]
            }
            NetState::Connecting => {
                warn!("Cannot connect to network {:?}", self.credentials.ssid);
                self.cooldown.mark(now);
                let mut actions = vec![NetAction::ShowDisconnected, NetAction::Disassociate];
                if self.out_of_attempts() {
                    actions.extend(self.enter_access_point());
                }
                actions
            }
        }
    }

    /// Called every loop iteration with the live link status.
    pub fn tick(&mut self, now: Duration, link_up: bool) -> Vec<NetAction> {
        match self.state {
            NetState::Connected(_) if !link_up => self.on_link_lost(now),
            NetState::Connecting if !link_up && self.cooldown.reached(now) => {
                if self.out_of_attempts() {
                    warn!(
                        "No link after {} attempts, falling back to access point",
                        self.attempts
                    );
                    let mut actions = vec![NetAction::Disassociate];
                    actions.extend(self.enter_access_point());
                    actions
                } else {
                    vec![self.attempt(now)]
                }
            }
            _ => Vec::new(),
        }
    }

    /// Idempotent.
    pub fn force_access_point(&mut self) -> Vec<NetAction> {
        match self.state {
            NetState::AccessPoint => Vec::new(),
            NetState::Uninitialized => self.enter_access_point(),
            NetState::Connecting | NetState::Connected(_) => {
                info!("Access point mode forced");
                let mut actions = vec![NetAction::Disassociate];
                actions.extend(self.enter_access_point());
                actions
            }
        }
    }

    /// Starts a fresh session right away, the cooldown does not apply.
    pub fn request_reconnect(&mut self, credentials: Credentials, now: Duration) -> Vec<NetAction> {
        info!("Reconnect requested to {:?}", credentials.ssid);
        self.begin_session(credentials, now)
    }

    fn begin_session(&mut self, credentials: Credentials, now: Duration) -> Vec<NetAction> {
        let mut actions = Vec::new();
        if matches!(self.state, NetState::Connecting | NetState::Connected(_)) {
            actions.push(NetAction::Disassociate);
        }

        self.credentials = credentials;
        self.established = false;
        self.attempts = 0;

        if self.credentials.is_empty() {
            info!("No network configured");
            actions.extend(self.enter_access_point());
        } else {
            self.state = NetState::Connecting;
            actions.push(self.attempt(now));
        }
        actions
    }

    fn attempt(&mut self, now: Duration) -> NetAction {
        self.attempts += 1;
        self.cooldown.mark(now);
        info!(
            "Connecting to {:?}, attempt {}",
            self.credentials.ssid, self.attempts
        );
        NetAction::Associate(self.credentials.clone())
    }

    fn out_of_attempts(&self) -> bool {
        !self.established && self.attempts >= self.max_attempts
    }

    fn enter_access_point(&mut self) -> Vec<NetAction> {
        info!("AP mode, SSID {:?} at {}", self.ap_ssid, self.ap_addr);
        self.state = NetState::AccessPoint;
        self.attempts = 0;
        self.established = false;
        self.cooldown.clear();
        vec![
            NetAction::StartAccessPoint {
                ssid: self.ap_ssid.clone(),
            },
            NetAction::ShowAccessPoint(self.ap_addr),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 40);

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn creds() -> Credentials {
        Credentials::new("MyNet", "secret123")
    }

    fn ap_actions() -> Vec<NetAction> {
        vec![
            NetAction::StartAccessPoint {
                ssid: "KMS Temp logger".into(),
            },
            NetAction::ShowAccessPoint(Ipv4Addr::new(10, 10, 10, 1)),
        ]
    }

    fn machine() -> Connectivity {
        Connectivity::new(&MyConfig {
            ap_ssid: "KMS Temp logger".into(),
            ..Default::default()
        })
    }

    fn connected(now: Duration) -> Connectivity {
        let mut c = machine();
        c.initialize(creds(), now);
        c.on_link_established(ADDR);
        c
    }

    #[test]
    fn empty_credentials_boot_into_access_point() {
        let mut c = machine();
        assert_eq!(c.state(), NetState::Uninitialized);
        assert_eq!(c.mode(), None);

        let actions = c.initialize(Credentials::default(), secs(0));
        assert_eq!(actions, ap_actions());
        assert_eq!(c.state(), NetState::AccessPoint);
        assert_eq!(c.mode(), Some(ConnectivityMode::AccessPoint));
        assert_eq!(c.attempts(), 0);
    }

    #[test]
    fn stored_credentials_start_association() {
        let mut c = machine();
        let actions = c.initialize(creds(), secs(1));
        assert_eq!(actions, vec![NetAction::Associate(creds())]);
        assert_eq!(c.state(), NetState::Connecting);
        assert_eq!(c.mode(), Some(ConnectivityMode::Client));
        assert_eq!(c.attempts(), 1);
        assert_eq!(c.last_attempt(), Some(secs(1)));
    }

    #[test]
    fn link_up_records_address_and_clears_cooldown() {
        let mut c = machine();
        c.initialize(creds(), secs(0));
        assert_eq!(c.on_link_established(ADDR), vec![NetAction::ShowAddress(ADDR)]);
        assert_eq!(c.state(), NetState::Connected(ADDR));
        assert_eq!(c.last_attempt(), None);
        assert_eq!(c.attempts(), 0);
        assert!(c.tick(secs(100), true).is_empty());
    }

    #[test]
    fn reconnect_waits_for_cooldown_after_link_loss() {
        let mut c = connected(secs(0));
        let actions = c.on_link_lost(secs(50));
        assert_eq!(actions, vec![NetAction::ShowDisconnected, NetAction::Disassociate]);
        assert_eq!(c.state(), NetState::Connecting);

        assert!(c.tick(secs(50), false).is_empty());
        assert!(c.tick(Duration::from_millis(59_999), false).is_empty());
        assert_eq!(c.tick(secs(60), false), vec![NetAction::Associate(creds())]);

        // the attempt restarts the cooldown
        assert!(c.tick(secs(61), false).is_empty());
        assert!(c.tick(Duration::from_millis(69_999), false).is_empty());
        assert_eq!(c.tick(secs(70), false), vec![NetAction::Associate(creds())]);
    }

    #[test]
    fn established_session_retries_forever() {
        let mut c = connected(secs(0));
        c.on_link_lost(secs(10));
        for n in 1..=20u64 {
            let actions = c.tick(secs(10 + n * 10), false);
            assert_eq!(actions, vec![NetAction::Associate(creds())]);
            assert_eq!(c.state(), NetState::Connecting);
        }
        assert_eq!(c.on_link_established(ADDR), vec![NetAction::ShowAddress(ADDR)]);
    }

    #[test]
    fn link_status_down_while_connected_counts_as_loss() {
        let mut c = connected(secs(0));
        let actions = c.tick(secs(30), false);
        assert_eq!(actions, vec![NetAction::ShowDisconnected, NetAction::Disassociate]);
        assert_eq!(c.state(), NetState::Connecting);
        assert!(c.tick(secs(39), false).is_empty());
        assert_eq!(c.tick(secs(40), false), vec![NetAction::Associate(creds())]);
    }

    #[test]
    fn connecting_with_link_up_pending_does_nothing() {
        let mut c = machine();
        c.initialize(creds(), secs(0));
        assert!(c.tick(secs(20), true).is_empty());
        assert_eq!(c.attempts(), 1);
    }

    #[test]
    fn fresh_session_falls_back_to_access_point() {
        let mut c = machine();
        c.initialize(creds(), secs(0));
        assert_eq!(c.tick(secs(10), false), vec![NetAction::Associate(creds())]);
        assert_eq!(c.tick(secs(20), false), vec![NetAction::Associate(creds())]);
        assert_eq!(c.attempts(), 3);

        let mut expected = vec![NetAction::Disassociate];
        expected.extend(ap_actions());
        assert_eq!(c.tick(secs(30), false), expected);
        assert_eq!(c.state(), NetState::AccessPoint);

        // access point is terminal for ticks
        assert!(c.tick(secs(1000), false).is_empty());
    }

    #[test]
    fn association_failure_falls_back_once_attempts_are_spent() {
        let mut c = Connectivity::new(&MyConfig {
            ap_ssid: "KMS Temp logger".into(),
            connect_attempts: 1,
            ..Default::default()
        });
        c.initialize(creds(), secs(0));
        let mut expected = vec![NetAction::ShowDisconnected, NetAction::Disassociate];
        expected.extend(ap_actions());
        assert_eq!(c.on_link_lost(secs(2)), expected);
        assert_eq!(c.state(), NetState::AccessPoint);
    }

    #[test]
    fn association_failure_restarts_cooldown() {
        let mut c = machine();
        c.initialize(creds(), secs(0));
        assert_eq!(
            c.on_link_lost(secs(8)),
            vec![NetAction::ShowDisconnected, NetAction::Disassociate]
        );
        assert_eq!(c.state(), NetState::Connecting);
        assert_eq!(c.last_attempt(), Some(secs(8)));
        assert!(c.tick(secs(10), false).is_empty());
        assert!(c.tick(Duration::from_millis(17_999), false).is_empty());
        assert_eq!(c.tick(secs(18), false), vec![NetAction::Associate(creds())]);
        assert_eq!(c.attempts(), 2);
    }

    #[test]
    fn force_access_point_is_idempotent() {
        let mut c = connected(secs(0));
        let mut expected = vec![NetAction::Disassociate];
        expected.extend(ap_actions());
        assert_eq!(c.force_access_point(), expected);
        assert_eq!(c.state(), NetState::AccessPoint);
        assert!(c.force_access_point().is_empty());
        assert!(c.handle(NetEvent::ForceAccessPoint, secs(1)).is_empty());
        assert_eq!(c.state(), NetState::AccessPoint);
    }

    #[test]
    fn stale_link_events_in_access_point_are_ignored() {
        let mut c = connected(secs(0));
        c.force_access_point();
        assert!(c.on_link_established(ADDR).is_empty());
        assert!(c.on_link_lost(secs(5)).is_empty());
        assert_eq!(c.state(), NetState::AccessPoint);
    }

    #[test]
    fn reconnect_bypasses_cooldown() {
        let mut c = connected(secs(0));
        c.on_link_lost(secs(100));
        let actions = c.request_reconnect(creds(), secs(101));
        assert_eq!(actions, vec![NetAction::Disassociate, NetAction::Associate(creds())]);
        assert_eq!(c.last_attempt(), Some(secs(101)));
    }

    #[test]
    fn reconnect_leaves_access_point() {
        let mut c = machine();
        c.initialize(Credentials::default(), secs(0));
        let other = Credentials::new("Other", "");
        assert_eq!(
            c.handle(NetEvent::ReconnectRequested { credentials: other.clone() }, secs(3)),
            vec![NetAction::Associate(other)]
        );
        assert_eq!(c.state(), NetState::Connecting);
    }

    #[test]
    fn repeated_reconnect_is_one_fresh_attempt() {
        let mut c = machine();
        c.initialize(creds(), secs(0));
        c.request_reconnect(creds(), secs(1));
        let actions = c.request_reconnect(creds(), secs(1));
        assert_eq!(actions, vec![NetAction::Disassociate, NetAction::Associate(creds())]);
        assert_eq!(c.attempts(), 1);
        assert_eq!(c.state(), NetState::Connecting);
    }

    #[test]
    fn reconnect_with_empty_credentials_resolves_to_access_point() {
        let mut c = machine();
        c.initialize(Credentials::default(), secs(0));
        let actions = c.request_reconnect(Credentials::default(), secs(5));
        assert_eq!(actions, ap_actions());
        assert_eq!(c.state(), NetState::AccessPoint);
    }

    #[test]
    fn state_is_always_defined_after_init() {
        let mut c = machine();
        c.initialize(creds(), secs(0));
        let mut t = 0;
        for step in 0..500u64 {
            t += 700;
            let now = Duration::from_millis(t);
            match step % 37 {
                5 => {
                    c.on_link_established(ADDR);
                }
                11 => {
                    c.on_link_lost(now);
                }
                23 => {
                    c.force_access_point();
                }
                31 => {
                    c.request_reconnect(creds(), now);
                }
                _ => {
                    c.tick(now, step % 3 == 0);
                }
            }
            assert!(matches!(
                c.state(),
                NetState::AccessPoint | NetState::Connecting | NetState::Connected(_)
            ));
        }
    }
}

// EOF
