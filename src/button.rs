// button.rs

use crate::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    pub fn inverse(self) -> Self {
        match self {
            PinLevel::Low => PinLevel::High,
            PinLevel::High => PinLevel::Low,
        }
    }
}

impl From<bool> for PinLevel {
    fn from(high: bool) -> Self {
        if high { PinLevel::High } else { PinLevel::Low }
    }
}

/// Long-press detector over a polled digital input.
///
/// A press starts on the edge into the active level and is judged when the
/// input leaves it again. Holding for at least the threshold yields exactly
/// one event, after which the press/release timestamps go back to neutral.
#[derive(Clone, Debug)]
pub struct LongPress {
    threshold: Duration,
    active: PinLevel,
    last_level: PinLevel,
    pressed_at: Option<Duration>,
    released_at: Option<Duration>,
}

impl LongPress {
    /// Active-high input: Low->High presses, High->Low releases.
    pub fn new(threshold: Duration) -> Self {
        Self::with_active_level(threshold, PinLevel::High)
    }

    pub fn with_active_level(threshold: Duration, active: PinLevel) -> Self {
        LongPress {
            threshold,
            active,
            last_level: active.inverse(),
            pressed_at: None,
            released_at: None,
        }
    }

    pub fn pressed_at(&self) -> Option<Duration> {
        self.pressed_at
    }

    pub fn released_at(&self) -> Option<Duration> {
        self.released_at
    }

    /// Feed one sample, returns true when a long press just completed.
    pub fn poll(&mut self, level: PinLevel, now: Duration) -> bool {
        if level == self.last_level {
            return false;
        }
        self.last_level = level;

        if level == self.active {
            self.pressed_at = Some(now);
            return false;
        }

        self.released_at = Some(now);
        let Some(pressed_at) = self.pressed_at else {
            return false;
        };

        let held = now.saturating_sub(pressed_at);
        if held >= self.threshold {
            info!("Button held for {} ms", held.as_millis());
            self.reset();
            true
        } else {
            debug!("Short press ({} ms), ignored", held.as_millis());
            false
        }
    }

    pub fn reset(&mut self) {
        self.pressed_at = None;
        self.released_at = None;
    }
}


// EOF
