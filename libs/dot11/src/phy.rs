//! Broadcom 4329 receive header, prepended by the firmware to every frame
//! delivered on the monitor tap.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ensure_len, Result};

const RSSI_VALID_MASK: u16 = 0xff00;
const RSSI_VALID: u16 = 0x0100;
const RX_STATUS1_FCS_ERROR: u16 = 0x0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhyMetadata {
    pub frame_size: u16,
    pub phy_rx_status: [u16; 6],
    pub rx_status1: u16,
    pub rx_status2: u16,
    pub rx_tsf_time: u16,
    pub rx_chan: u16,
    pub tsf_low: u32,
    pub rssi_raw: i8,
    pub rxpwr0: i8,
    pub rxpwr1: i8,
    pub do_rssi_ma: i8,
    pub rxpwr: [i8; 4],
}

impl PhyMetadata {
    pub const LEN: usize = 36;

    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("PHY header", data, Self::LEN)?;

        let mut phy_rx_status = [0u16; 6];
        LittleEndian::read_u16_into(&data[4..16], &mut phy_rx_status);

        Ok(PhyMetadata {
            frame_size: LittleEndian::read_u16(&data[0..2]),
            phy_rx_status,
            rx_status1: LittleEndian::read_u16(&data[16..18]),
            rx_status2: LittleEndian::read_u16(&data[18..20]),
            rx_tsf_time: LittleEndian::read_u16(&data[20..22]),
            rx_chan: LittleEndian::read_u16(&data[22..24]),
            tsf_low: LittleEndian::read_u32(&data[24..28]),
            rssi_raw: data[28] as i8,
            rxpwr0: data[29] as i8,
            rxpwr1: data[30] as i8,
            do_rssi_ma: data[31] as i8,
            rxpwr: [data[32] as i8, data[33] as i8, data[34] as i8, data[35] as i8],
        })
    }

    pub fn channel(&self) -> u8 {
        ((self.rx_chan >> 3) & 0xff) as u8
    }

    /// Signal strength in dBm, only reported when the extended status marks it valid.
    pub fn rssi(&self) -> Option<i8> {
        if self.rx_status2 & RSSI_VALID_MASK != RSSI_VALID {
            return None;
        }
        Some((self.phy_rx_status[1] & 0x00ff) as u8 as i8)
    }

    pub fn fcs_valid(&self) -> bool {
        self.rx_status1 & RX_STATUS1_FCS_ERROR == 0
    }
}
