// bin/kmstemp.rs

#![warn(clippy::large_futures)]

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::main()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("kmstemp is firmware, build it for an ESP-IDF target.");
    std::process::exit(1);
}

#[cfg(target_os = "espidf")]
mod firmware {
    use std::sync::Arc;

    use esp_idf_hal::{
        delay::FreeRtos,
        gpio::{IOPin, PinDriver, Pull},
        i2c::{I2cConfig, I2cDriver},
        prelude::Peripherals,
        units::Hertz,
    };
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs, wifi::WifiDriver};
    use esp_idf_sys::{esp, esp_app_desc};
    use kmstemp::*;

    const I2C_HZ: u32 = 100_000;

    esp_app_desc!();

    pub fn main() -> anyhow::Result<()> {
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();

        // eventfd is needed by our mio poll implementation.  Note you should set max_fds
        // higher if you have other code that may need eventfd.
        #[allow(clippy::needless_update)]
        let config = esp_idf_sys::esp_vfs_eventfd_config_t {
            max_fds: 1,
            ..Default::default()
        };
        esp! { unsafe { esp_idf_sys::esp_vfs_eventfd_register(&config) } }?;

        info!("Hello.");
        info!("KMS Temp logger v{FW_VERSION} starting up.");

        let config = MyConfig::default();
        info!("My config:\n{config:#?}");

        let sysloop = EspSystemEventLoop::take()?;
        let nvs_default_partition = nvs::EspDefaultNvsPartition::take()?;

        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;

        #[cfg(feature = "esp32c3")]
        let (sda, scl, sensor1_pin, sensor2_pin, button_pin) = (
            pins.gpio4.downgrade(),
            pins.gpio5.downgrade(),
            (pins.gpio6.downgrade(), "gpio6"),
            (pins.gpio7.downgrade(), "gpio7"),
            pins.gpio9.downgrade(),
        );

        #[cfg(feature = "esp32s")]
        let (sda, scl, sensor1_pin, sensor2_pin, button_pin) = (
            pins.gpio21.downgrade(),
            pins.gpio22.downgrade(),
            (pins.gpio4.downgrade(), "gpio4"),
            (pins.gpio18.downgrade(), "gpio18"),
            pins.gpio0.downgrade(),
        );

        // the logger keeps working without a display
        let mut lcd = match I2cDriver::new(
            peripherals.i2c0,
            sda,
            scl,
            &I2cConfig::new().baudrate(Hertz(I2C_HZ)),
        ) {
            Ok(i2c) => match I2cLcd::new(i2c, LCD_ADDR) {
                Ok(lcd) => Some(lcd),
                Err(e) => {
                    error!("LCD init failed: {e:?}");
                    None
                }
            },
            Err(e) => {
                error!("I2C init failed: {e:?}");
                None
            }
        };
        lcd.write_at(STATUS_ROW, 0, &status_line("Starting...")).ok();

        let storage_ok = match mount_spiffs(&config.storage_path) {
            Ok(()) => true,
            Err(e) => {
                error!("SPIFFS Failed! {e:?}");
                lcd.write_at(STATUS_ROW, 0, &status_line("Storage error")).ok();
                FreeRtos::delay_ms(2000);
                false
            }
        };
        let store: SharedStore = if storage_ok {
            Box::new(FileStore::new(config.storage_path.as_str()))
        } else {
            Box::new(UnavailableStore)
        };

        let sensors = [
            OnewireChannel::new(sensor1_pin.0, sensor1_pin.1)?,
            OnewireChannel::new(sensor2_pin.0, sensor2_pin.1)?,
        ];

        let mut button = PinDriver::input(button_pin)?;
        button.set_pull(Pull::Up)?;

        let wifidriver = WifiDriver::new(
            peripherals.modem,
            sysloop.clone(),
            Some(nvs_default_partition),
        )?;
        let net = EspNetDriver::new(wifidriver, &config)?;
        info!("My id: {}", net.mac_id()?);

        let controller = Controller::new(
            &config,
            Hardware {
                net,
                display: lcd,
                button,
                sensors,
            },
        );

        let (state, requests) = MyState::new(config, store, storage_ok);
        let shared_state = Arc::new(Box::pin(state));

        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(Box::pin(async move {
                info!("Entering main loop...");
                tokio::select! {
                    _ = Box::pin(run_controller(shared_state.clone(), controller, SystemClock::new(), requests)) => { error!("run_controller() ended."); }
                    _ = Box::pin(run_api_server(shared_state.clone())) => { error!("run_api_server() ended."); }
                };
            }));

        // not actually returning from main() but we reboot instead
        info!("main() finished, reboot.");
        FreeRtos::delay_ms(3000);
        esp_idf_hal::reset::restart();
    }
}

// EOF
