// lib.rs
#![warn(clippy::large_futures)]

pub use std::{
    fmt, net,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

pub use anyhow::{anyhow, bail};
pub use log::*;
pub use serde::{Deserialize, Serialize};
pub use tokio::{
    sync::RwLock,
    time::{Duration, sleep},
};

mod clock;
pub use clock::*;

mod config;
pub use config::*;

mod button;
pub use button::*;

mod connectivity;
pub use connectivity::*;

mod sampler;
pub use sampler::*;

mod display;
pub use display::*;

mod controller;
pub use controller::*;

mod state;
pub use state::*;

mod apiserver;
pub use apiserver::*;

#[cfg(target_os = "espidf")]
mod wifi;
#[cfg(target_os = "espidf")]
pub use wifi::*;

#[cfg(target_os = "espidf")]
mod measure;
#[cfg(target_os = "espidf")]
pub use measure::*;

#[cfg(target_os = "espidf")]
mod lcd;
#[cfg(target_os = "espidf")]
pub use lcd::*;

#[cfg(target_os = "espidf")]
mod storage;
#[cfg(target_os = "espidf")]
pub use storage::*;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of independent temperature channels.
pub const CHANNELS: usize = 2;

/// Value reported for a channel with no device on its bus, and for a
/// channel whose first conversion has not completed yet.
pub const DEVICE_DISCONNECTED_C: f32 = -127.0;

/// One channel's latest sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reading {
    Celsius(f32),
    Disconnected,
    Initializing,
}

impl Reading {
    /// Adds a calibration offset to genuine conversions only.
    /// Sentinels pass through untouched.
    pub fn calibrated(self, offset: f32) -> Self {
        match self {
            Reading::Celsius(t) => Reading::Celsius(t + offset),
            other => other,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Reading::Celsius(_))
    }

    /// Numeric form, with sentinels mapped to their reserved values.
    pub fn value(&self) -> f32 {
        match self {
            Reading::Celsius(t) => *t,
            Reading::Disconnected | Reading::Initializing => DEVICE_DISCONNECTED_C,
        }
    }
}

impl fmt::Display for Reading {
    // always float-like, "23.5" and "-127.0"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TempData {
    pub channel: usize,
    pub value: f32,
    pub valid: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct TempValues {
    pub uptime: u64,
    pub mode: String,
    pub address: Option<String>,
    pub temperatures: Vec<TempData>,
}

impl TempValues {
    pub fn new(uptime: u64, net: &NetState, readings: &[Reading]) -> Self {
        TempValues {
            uptime,
            mode: net.to_string(),
            address: net.address().map(|a| a.to_string()),
            temperatures: readings
                .iter()
                .enumerate()
                .map(|(i, r)| TempData {
                    channel: i + 1,
                    value: r.value(),
                    valid: r.is_valid(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DeviceStatus {
    pub version: &'static str,
    pub mode: String,
    pub address: Option<String>,
    pub uptime: u64,
    pub requests: u32,
    pub storage: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_skips_sentinels() {
        assert_eq!(Reading::Celsius(22.0).calibrated(1.5), Reading::Celsius(23.5));
        assert_eq!(Reading::Disconnected.calibrated(1.5), Reading::Disconnected);
        assert_eq!(Reading::Initializing.calibrated(-3.0), Reading::Initializing);
    }

    #[test]
    fn readings_render_float_like() {
        assert_eq!(Reading::Celsius(23.5).to_string(), "23.5");
        assert_eq!(Reading::Celsius(20.0).to_string(), "20.0");
        assert_eq!(Reading::Disconnected.to_string(), "-127.0");
        assert_eq!(Reading::Initializing.to_string(), "-127.0");
    }

    #[test]
    fn telemetry_marks_sentinels_invalid() {
        let v = TempValues::new(
            12,
            &NetState::AccessPoint,
            &[Reading::Celsius(21.25), Reading::Disconnected],
        );
        assert_eq!(v.mode, "access-point");
        assert!(v.address.is_none());
        assert_eq!(v.temperatures.len(), 2);
        assert!(v.temperatures[0].valid);
        assert_eq!(v.temperatures[1].channel, 2);
        assert_eq!(v.temperatures[1].value, DEVICE_DISCONNECTED_C);
        assert!(!v.temperatures[1].valid);
    }
}

// EOF
