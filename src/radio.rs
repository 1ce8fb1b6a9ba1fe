use std::collections::HashMap;

use nl80211_ng::{get_interface_info_idx, Nl80211};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Driver or netlink failure, carried as the message the driver reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("radio: {0}")]
pub struct RadioError(pub String);

impl From<String> for RadioError {
    fn from(message: String) -> Self {
        RadioError(message)
    }
}

/// Control surface of the capturing radio.
pub trait RadioControl {
    fn channel(&mut self) -> Result<u8, RadioError>;
    fn set_channel(&mut self, channel: u8) -> Result<(), RadioError>;
    fn radio_power(&mut self) -> Result<i32, RadioError>;
    fn set_radio_power(&mut self, value: i32) -> Result<(), RadioError>;
    fn int_variable(&mut self, name: &str) -> Result<i32, RadioError>;
    fn set_int_variable(&mut self, name: &str, value: i32) -> Result<(), RadioError>;
}

impl<R: RadioControl + ?Sized> RadioControl for Box<R> {
    fn channel(&mut self) -> Result<u8, RadioError> {
        (**self).channel()
    }

    fn set_channel(&mut self, channel: u8) -> Result<(), RadioError> {
        (**self).set_channel(channel)
    }

    fn radio_power(&mut self) -> Result<i32, RadioError> {
        (**self).radio_power()
    }

    fn set_radio_power(&mut self, value: i32) -> Result<(), RadioError> {
        (**self).set_radio_power(value)
    }

    fn int_variable(&mut self, name: &str) -> Result<i32, RadioError> {
        (**self).int_variable(name)
    }

    fn set_int_variable(&mut self, name: &str, value: i32) -> Result<(), RadioError> {
        (**self).set_int_variable(name, value)
    }
}

/// Band number nl80211 expects for a channel.
pub fn band_for_channel(channel: u8) -> u8 {
    if channel <= 14 {
        2
    } else {
        5
    }
}

/// Radio reached through nl80211.
pub struct Nl80211Radio {
    netlink: Nl80211,
    index: i32,
    name: String,
    power: i32,
}

impl Nl80211Radio {
    pub fn open(interface: &str) -> Result<Self, RadioError> {
        let netlink = Nl80211::new()?;
        let iface = netlink
            .get_interfaces()
            .iter()
            .find(|&(_, iface)| iface.name_as_string() == interface)
            .map(|(_, iface)| iface.clone())
            .ok_or_else(|| RadioError(format!("interface {} not found", interface)))?;
        let index = iface
            .index
            .ok_or_else(|| RadioError(format!("interface {} has no index", interface)))?;

        info!("Radio control on {} (index {})", interface, index);
        Ok(Nl80211Radio {
            netlink,
            index,
            name: interface.to_string(),
            power: 0,
        })
    }
}

impl RadioControl for Nl80211Radio {
    fn channel(&mut self) -> Result<u8, RadioError> {
        let iface = get_interface_info_idx(self.index)?;
        iface
            .frequency
            .and_then(|frequency| frequency.channel)
            .map(|channel| channel.get_channel_number())
            .ok_or_else(|| RadioError(format!("{} reports no channel", self.name)))
    }

    fn set_channel(&mut self, channel: u8) -> Result<(), RadioError> {
        debug!("Setting {} to channel {}", self.name, channel);
        self.netlink
            .set_interface_chan(self.index, channel, band_for_channel(channel))?;
        Ok(())
    }

    fn radio_power(&mut self) -> Result<i32, RadioError> {
        Ok(self.power)
    }

    /// Zero powers the radio up, anything else takes the interface down.
    fn set_radio_power(&mut self, value: i32) -> Result<(), RadioError> {
        if value == 0 {
            self.netlink.set_interface_up(self.index)?;
        } else {
            self.netlink.set_interface_down(self.index)?;
        }
        self.power = value;
        Ok(())
    }

    fn int_variable(&mut self, name: &str) -> Result<i32, RadioError> {
        Err(RadioError(format!("driver variable {} not available over nl80211", name)))
    }

    fn set_int_variable(&mut self, name: &str, _value: i32) -> Result<(), RadioError> {
        Err(RadioError(format!("driver variable {} not available over nl80211", name)))
    }
}

/// In-memory radio used when replaying captures.
#[derive(Debug, Default)]
pub struct NullRadio {
    channel: u8,
    power: i32,
    variables: HashMap<String, i32>,
}

impl NullRadio {
    pub fn new() -> Self {
        NullRadio::default()
    }
}

impl RadioControl for NullRadio {
    fn channel(&mut self) -> Result<u8, RadioError> {
        Ok(self.channel)
    }

    fn set_channel(&mut self, channel: u8) -> Result<(), RadioError> {
        self.channel = channel;
        Ok(())
    }

    fn radio_power(&mut self) -> Result<i32, RadioError> {
        Ok(self.power)
    }

    fn set_radio_power(&mut self, value: i32) -> Result<(), RadioError> {
        self.power = value;
        Ok(())
    }

    fn int_variable(&mut self, name: &str) -> Result<i32, RadioError> {
        Ok(self.variables.get(name).copied().unwrap_or(0))
    }

    fn set_int_variable(&mut self, name: &str, value: i32) -> Result<(), RadioError> {
        self.variables.insert(name.to_string(), value);
        Ok(())
    }
}

/// Turns off minimum power consumption so the radio keeps receiving.
pub fn setup_card<R: RadioControl + ?Sized>(radio: &mut R) {
    match radio.int_variable("mpc") {
        Ok(0) => {}
        Ok(mpc) => {
            info!("Disabling mpc (was {})", mpc);
            if let Err(e) = radio.set_int_variable("mpc", 0) {
                warn!("Could not disable mpc: {}", e);
            }
        }
        Err(e) => warn!("Could not read mpc: {}", e),
    }
}

pub const CHANNEL_ATTEMPTS: usize = 5;

/// Sets `channel` and reissues the request until the radio reports it.
pub fn tune<R: RadioControl + ?Sized>(radio: &mut R, channel: u8) -> Result<(), RadioError> {
    let mut last_error = None;
    for attempt in 1..=CHANNEL_ATTEMPTS {
        if let Err(e) = radio.set_channel(channel) {
            warn!("Channel {} attempt {} failed: {}", channel, attempt, e);
            last_error = Some(e);
            continue;
        }
        match radio.channel() {
            Ok(current) if current == channel => {
                info!("Channel set to {}", channel);
                return Ok(());
            }
            Ok(current) => {
                warn!("Radio still on channel {} (wanted {})", current, channel);
                last_error = Some(RadioError(format!("radio reports channel {}", current)));
            }
            Err(e) => {
                warn!("Channel {} attempt {} unverified: {}", channel, attempt, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| RadioError(format!("channel {} not applied", channel))))
}
