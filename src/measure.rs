// measure.rs

use std::time::Instant;

use ds18b20::Ds18b20;
use embedded_hal::digital::ErrorType;
use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, InputOutput, PinDriver, Pull},
};
use one_wire_bus::OneWire;

use crate::*;

pub type OnewirePin = PinDriver<'static, AnyIOPin, InputOutput>;
type PinError = <OnewirePin as ErrorType>::Error;

/// One DS18B20 on its own one-wire bus, driven without waiting for
/// conversions to finish. Sensors stay at their power-on 12-bit resolution,
/// so a conversion takes `CONVERSION_TIME_MS`.
pub struct OnewireChannel {
    name: String,
    bus: OneWire<OnewirePin>,
    sensor: Option<Ds18b20>,
    started: Option<Instant>,
}

impl OnewireChannel {
    pub fn new(pin: AnyIOPin, name: &str) -> anyhow::Result<Self> {
        let mut pin_drv = PinDriver::input_output_od(pin)?;
        pin_drv.set_pull(Pull::Up)?;
        let bus = OneWire::new(pin_drv).map_err(|e| anyhow!("{name}: one-wire init failed: {e:?}"))?;

        let mut channel = OnewireChannel {
            name: name.to_string(),
            bus,
            sensor: None,
            started: None,
        };
        channel.sensor = channel.find_sensor();
        Ok(channel)
    }

    fn find_sensor(&mut self) -> Option<Ds18b20> {
        match self.bus.device_search(None, false, &mut Ets) {
            Ok(Some((address, _))) if address.family_code() == ds18b20::FAMILY_CODE => {
                info!("{}: found DS18B20 {address:?}", self.name);
                Ds18b20::new::<PinError>(address).ok()
            }
            Ok(Some((address, _))) => {
                warn!("{}: unexpected device {address:?}", self.name);
                None
            }
            Ok(None) => {
                debug!("{}: no device", self.name);
                None
            }
            Err(e) => {
                warn!("{}: search failed: {e:?}", self.name);
                None
            }
        }
    }
}

impl TempSensor for OnewireChannel {
    fn request_conversion(&mut self) -> anyhow::Result<()> {
        if self.sensor.is_none() {
            self.sensor = self.find_sensor();
        }
        let Some(sensor) = &self.sensor else {
            self.started = None;
            return Ok(());
        };

        if let Err(e) = sensor.start_temp_measurement(&mut self.bus, &mut Ets) {
            self.started = None;
            bail!("{}: start measurement failed: {e:?}", self.name);
        }
        self.started = Some(Instant::now());
        Ok(())
    }

    fn last_conversion(&mut self) -> Reading {
        let Some(sensor) = &self.sensor else {
            return Reading::Disconnected;
        };
        match self.started {
            Some(t) if t.elapsed() >= Duration::from_millis(CONVERSION_TIME_MS) => {}
            _ => return Reading::Initializing,
        }

        match sensor.read_data(&mut self.bus, &mut Ets) {
            Ok(data) => Reading::Celsius(data.temperature),
            Err(e) => {
                // unplugged, search again on the next request
                warn!("{}: read failed: {e:?}", self.name);
                self.sensor = None;
                Reading::Disconnected
            }
        }
    }
}

// EOF
