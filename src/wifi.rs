// wifi.rs

use std::net::Ipv4Addr;

use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::{
    ipv4,
    netif::{self, EspNetif},
    wifi::{EspWifi, WifiDriver},
};

use crate::*;

/// Station and access point share one radio. Only one of them is
/// configured at a time, switching always goes through a driver restart.
pub struct EspNetDriver<'a> {
    wifi: EspWifi<'a>,
}

impl<'a> EspNetDriver<'a> {
    pub fn new(wifidriver: WifiDriver<'a>, config: &MyConfig) -> anyhow::Result<Self> {
        info!("Initializing Wi-Fi...");

        let sta_if = EspNetif::new_with_conf(&netif::NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Client(
                ipv4::ClientConfiguration::DHCP(ipv4::DHCPClientSettings::default()),
            )),
            ..netif::NetifConfiguration::wifi_default_client()
        })?;

        let ap_if = EspNetif::new_with_conf(&netif::NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(ipv4::RouterConfiguration {
                subnet: ipv4::Subnet {
                    gateway: config.ap_addr,
                    mask: ipv4::Mask(config.ap_mask),
                },
                dhcp_enabled: true,
                dns: None,
                secondary_dns: None,
            })),
            ..netif::NetifConfiguration::wifi_default_router()
        })?;

        let wifi = EspWifi::wrap_all(wifidriver, sta_if, ap_if)?;
        Ok(EspNetDriver { wifi })
    }

    pub fn mac_id(&self) -> anyhow::Result<String> {
        let mac = self.wifi.sta_netif().get_mac()?;
        Ok(format!(
            "kmstemp-{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5],
        ))
    }

    fn restart_with(&mut self, conf: &Configuration) -> anyhow::Result<()> {
        if self.wifi.is_started()? {
            self.wifi.stop()?;
        }
        self.wifi.set_configuration(conf)?;
        info!("WiFi driver starting...");
        self.wifi.start()?;
        Ok(())
    }
}

impl NetDriver for EspNetDriver<'_> {
    fn start_access_point(&mut self, ssid: &str) -> anyhow::Result<()> {
        let conf = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| anyhow!("AP SSID too long: {ssid:?}"))?,
            auth_method: AuthMethod::None,
            channel: 1,
            ..Default::default()
        });
        self.restart_with(&conf)?;
        info!("AP IP Address: {}", self.wifi.ap_netif().get_ip_info()?.ip);
        Ok(())
    }

    fn associate(&mut self, credentials: &Credentials) -> anyhow::Result<()> {
        let auth_method = if credentials.pass.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let conf = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("SSID too long: {:?}", credentials.ssid))?,
            password: credentials
                .pass
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("WiFi password too long"))?,
            auth_method,
            ..Default::default()
        });
        self.restart_with(&conf)?;

        // returns right away, the result shows up in link_address()
        info!("WiFi connecting...");
        self.wifi.connect()?;
        Ok(())
    }

    fn disassociate(&mut self) -> anyhow::Result<()> {
        if self.wifi.is_started()? && self.wifi.is_connected()? {
            info!("WiFi disconnecting...");
            self.wifi.disconnect()?;
        }
        Ok(())
    }

    fn link_address(&mut self) -> Option<Ipv4Addr> {
        if !self.wifi.is_connected().unwrap_or(false) {
            return None;
        }
        let ip = self.wifi.sta_netif().get_ip_info().ok()?.ip;
        (!ip.is_unspecified()).then_some(ip)
    }
}

// EOF
