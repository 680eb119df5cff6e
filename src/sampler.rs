// sampler.rs

use crate::*;

/// Non-blocking temperature probe.
pub trait TempSensor {
    /// Kick off a conversion and return immediately.
    fn request_conversion(&mut self) -> anyhow::Result<()>;
    /// Result of the most recently completed conversion.
    fn last_conversion(&mut self) -> Reading;
}

/// Paces one channel: read the finished conversion, calibrate it,
/// start the next one.
#[derive(Clone, Debug)]
pub struct Sampler {
    channel: usize,
    offset: f32,
    last_reading: Reading,
    interval: Interval,
}

impl Sampler {
    pub fn new(channel: usize, interval: Duration) -> Self {
        Sampler {
            channel,
            offset: 0.0,
            last_reading: Reading::Initializing,
            interval: Interval::new(interval.max(Duration::from_millis(CONVERSION_TIME_MS))),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval.period()
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: f32) {
        if offset != self.offset {
            info!("S{}: calibration offset {offset}", self.channel + 1);
        }
        self.offset = offset;
    }

    /// First conversion request, the interval counts from here.
    pub fn start<S: TempSensor + ?Sized>(&mut self, sensor: &mut S, now: Duration) {
        if let Err(e) = sensor.request_conversion() {
            warn!("S{}: conversion request failed: {e:#}", self.channel + 1);
        }
        self.interval.mark(now);
    }

    /// Samples when the interval has been exceeded, returns the new reading.
    pub fn tick<S: TempSensor + ?Sized>(&mut self, sensor: &mut S, now: Duration) -> Option<Reading> {
        if !self.interval.exceeded(now) {
            return None;
        }

        self.last_reading = sensor.last_conversion().calibrated(self.offset);
        debug!("S{}: {}", self.channel + 1, self.last_reading);

        if let Err(e) = sensor.request_conversion() {
            warn!("S{}: conversion request failed: {e:#}", self.channel + 1);
        }
        self.interval.mark(now);
        Some(self.last_reading)
    }

    pub fn snapshot(&self) -> Reading {
        self.last_reading
    }
}


// EOF
