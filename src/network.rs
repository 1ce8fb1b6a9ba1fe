use std::collections::HashMap;

use dot11::{capability, Beacon, DataFrame, IeName, MacAddress, ProbeRequest};
use strum_macros::{Display, EnumString};
use tracing::{debug, trace};

use crate::oui::OuiDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Security {
    #[strum(serialize = "OPEN")]
    Open,
    #[strum(serialize = "WEP")]
    Wep,
    #[strum(serialize = "WPA")]
    Wpa,
    #[strum(serialize = "WPA2")]
    Wpa2,
}

impl Security {
    pub fn classify(beacon: &Beacon) -> Self {
        if beacon.elements.contains(IeName::Rsn) {
            Security::Wpa2
        } else if beacon.elements.contains(IeName::Wpa) {
            Security::Wpa
        } else if beacon.has_capability(capability::PRIVACY) {
            Security::Wep
        } else {
            Security::Open
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub mac: MacAddress,
    pub vendor: Option<String>,
    pub connected: bool,
    pub probes: Vec<Vec<u8>>,
    pub sent_data_frames: u64,
}

impl Station {
    fn new(mac: MacAddress, vendor: Option<String>) -> Self {
        Station {
            mac,
            vendor,
            connected: false,
            probes: Vec::new(),
            sent_data_frames: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub bssid: MacAddress,
    pub ssid: Vec<u8>,
    pub cloaked: bool,
    pub security: Security,
    pub channel: u8,
    pub vendor: Option<String>,
    pub management_frames: u64,
    pub data_frames: u64,
    pub stations: HashMap<MacAddress, Station>,
}

impl Network {
    fn from_beacon(beacon: &Beacon, vendor: Option<String>) -> Self {
        let ssid = beacon.elements.ssid().map(<[u8]>::to_vec);
        Network {
            bssid: beacon.bssid(),
            cloaked: ssid.is_none(),
            ssid: ssid.unwrap_or_default(),
            security: Security::classify(beacon),
            channel: beacon.elements.channel().unwrap_or(0),
            vendor,
            management_frames: 1,
            data_frames: 0,
            stations: HashMap::new(),
        }
    }

    /// SSID with non-printable bytes escaped as `\xNN`.
    pub fn ssid_string(&self) -> String {
        self.ssid.escape_ascii().to_string()
    }

    pub fn station(&self, mac: &MacAddress) -> Option<&Station> {
        self.stations.get(mac)
    }
}

/// Every network seen during a run, keyed by bssid.
pub struct NetworkStore {
    networks: HashMap<MacAddress, Network>,
    oui: OuiDatabase,
}

impl NetworkStore {
    pub fn new(oui: OuiDatabase) -> Self {
        NetworkStore {
            networks: HashMap::new(),
            oui,
        }
    }

    /// Records a beacon. The first beacon for a bssid fixes the network's
    /// ssid, channel and security; later ones only bump its counter.
    pub fn register_beacon(&mut self, beacon: &Beacon) -> &Network {
        let bssid = beacon.bssid();
        let oui = &self.oui;
        self.networks
            .entry(bssid)
            .and_modify(|network| network.management_frames += 1)
            .or_insert_with(|| {
                let network = Network::from_beacon(beacon, oui.search(&bssid));
                debug!(
                    "New network {} \"{}\" ({}, channel {})",
                    network.bssid,
                    network.ssid_string(),
                    network.security,
                    network.channel
                );
                network
            })
    }

    /// Records a data frame against `bssid`. Does nothing if the network is unknown.
    pub fn register_data_frame(&mut self, bssid: &MacAddress, frame: &DataFrame) {
        let Some(network) = self.networks.get_mut(bssid) else {
            return;
        };
        network.data_frames += 1;

        let source = frame.source;
        match network.stations.get_mut(&source) {
            Some(station) => station.sent_data_frames += 1,
            None => {
                let station = Station::new(source, self.oui.search(&source));
                debug!("New station {} on {}", source, network.bssid);
                network.stations.insert(source, station);
            }
        }
    }

    /// Adds the probed SSID to every known station record for the prober.
    pub fn register_probe_request(&mut self, probe: &ProbeRequest) {
        let source = probe.source();
        let ssid = match probe.elements.ssid() {
            Some(ssid) if !ssid.is_empty() => ssid,
            _ => return,
        };

        for network in self.networks.values_mut() {
            if let Some(station) = network.stations.get_mut(&source) {
                if !station.probes.iter().any(|probe| probe == ssid) {
                    trace!("{} probing for \"{}\"", source, ssid.escape_ascii());
                    station.probes.push(ssid.to_vec());
                }
            }
        }
    }

    pub fn get(&self, bssid: &MacAddress) -> Option<&Network> {
        self.networks.get(bssid)
    }

    pub fn contains(&self, bssid: &MacAddress) -> bool {
        self.networks.contains_key(bssid)
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const BSSID: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

    /// Beacon with an optional SSID, a DS parameter set and any extra elements.
    #[rustfmt::skip]
    pub(crate) fn beacon(bssid: [u8; 6], ssid: Option<&[u8]>, channel: u8, capabilities: u16, extra: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x80, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        frame.extend_from_slice(&bssid);
        frame.extend_from_slice(&bssid);
        frame.extend_from_slice(&[
            0x10, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x64, 0x00,
        ]);
        frame.extend_from_slice(&capabilities.to_le_bytes());
        if let Some(ssid) = ssid {
            frame.push(0x00);
            frame.push(ssid.len() as u8);
            frame.extend_from_slice(ssid);
        }
        frame.extend_from_slice(&[0x03, 0x01, channel]);
        frame.extend_from_slice(extra);
        frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        frame
    }

    /// ToDS data frame from `source` to the AP `bssid`.
    pub(crate) fn data_to_ap(bssid: [u8; 6], source: [u8; 6]) -> Vec<u8> {
        let mut frame = vec![0x08, 0x01, 0x00, 0x00];
        frame.extend_from_slice(&bssid);
        frame.extend_from_slice(&source);
        frame.extend_from_slice(&[0xff; 6]);
        frame.extend_from_slice(&[0x00, 0x00]);
        frame
    }

    #[rustfmt::skip]
    const RSN: [u8; 22] = [
        0x30, 0x14, 0x01, 0x00,
        0x00, 0x0f, 0xac, 0x04,
        0x01, 0x00, 0x00, 0x0f, 0xac, 0x04,
        0x01, 0x00, 0x00, 0x0f, 0xac, 0x02,
        0x00, 0x00,
    ];

    #[rustfmt::skip]
    const WPA: [u8; 24] = [
        0xdd, 0x16,
        0x00, 0x50, 0xf2, 0x01,
        0x01, 0x00,
        0x00, 0x50, 0xf2, 0x02,
        0x01, 0x00, 0x00, 0x50, 0xf2, 0x02,
        0x01, 0x00, 0x00, 0x50, 0xf2, 0x02,
    ];

    fn store() -> NetworkStore {
        NetworkStore::new(OuiDatabase::disabled())
    }

    fn parse_beacon(bytes: &[u8]) -> Beacon {
        Beacon::parse(bytes).unwrap()
    }

    #[test]
    fn classifies_security() {
        let rsn_and_wpa = [&RSN[..], &WPA[..]].concat();
        let cases = [
            (0x0001, &RSN[..], Security::Wpa2),
            (0x0011, &rsn_and_wpa[..], Security::Wpa2),
            (0x0001, &WPA[..], Security::Wpa),
            (0x0011, &WPA[..], Security::Wpa),
            (0x0011, &[][..], Security::Wep),
            (0x0001, &[][..], Security::Open),
        ];
        for (caps, extra, expected) in cases {
            let beacon = parse_beacon(&beacon(BSSID, Some(b"n"), 1, caps, extra));
            assert_eq!(Security::classify(&beacon), expected, "caps {:#06x}", caps);
        }
        assert_eq!(Security::Wpa.to_string(), "WPA");
        assert_eq!(Security::Wpa2.to_string(), "WPA2");
        assert_eq!(Security::Open.to_string(), "OPEN");
    }

    #[test]
    fn first_beacon_wins() {
        let mut store = store();
        let first = parse_beacon(&beacon(BSSID, Some(b"first"), 1, 0x0001, &[]));
        let second = parse_beacon(&beacon(BSSID, Some(b"second"), 11, 0x0001, &RSN));

        store.register_beacon(&first);
        let network = store.register_beacon(&second);
        assert_eq!(network.ssid, b"first");
        assert_eq!(network.channel, 1);
        assert_eq!(network.security, Security::Open);
        assert_eq!(network.management_frames, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_ssid_is_cloaked() {
        let mut store = store();
        let network = store.register_beacon(&parse_beacon(&beacon(BSSID, None, 6, 0x0001, &[])));
        assert!(network.cloaked);
        assert!(network.ssid.is_empty());
        assert_eq!(network.channel, 6);
    }

    #[test]
    fn data_frames_create_then_count_stations() {
        let mut store = store();
        store.register_beacon(&parse_beacon(&beacon(BSSID, Some(b"n"), 1, 0x0001, &[])));

        let bssid = MacAddress(BSSID);
        let station = [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];
        let frame = DataFrame::parse(&data_to_ap(BSSID, station)).unwrap();
        store.register_data_frame(&bssid, &frame);
        store.register_data_frame(&bssid, &frame);
        store.register_data_frame(&bssid, &frame);

        let network = store.get(&bssid).unwrap();
        assert_eq!(network.data_frames, 3);
        assert_eq!(network.stations.len(), 1);
        let station = network.station(&MacAddress(station)).unwrap();
        assert_eq!(station.sent_data_frames, 2);
    }

    #[test]
    fn every_source_address_becomes_a_station() {
        let mut store = store();
        store.register_beacon(&parse_beacon(&beacon(BSSID, Some(b"n"), 1, 0x0001, &[])));

        let group = [0x01, 0x00, 0x5e, 0, 0, 1];
        let frame = DataFrame::parse(&data_to_ap(BSSID, group)).unwrap();
        store.register_data_frame(&MacAddress(BSSID), &frame);
        let network = store.get(&MacAddress(BSSID)).unwrap();
        assert!(network.station(&MacAddress(group)).is_some());
    }

    #[test]
    fn unknown_networks_are_ignored() {
        let mut store = store();
        let unknown = MacAddress([0x02, 0, 0, 0, 0, 9]);
        let frame = DataFrame::parse(&data_to_ap(unknown.0, [0x02, 0, 0, 0, 0, 1])).unwrap();
        store.register_data_frame(&unknown, &frame);
        assert!(!store.contains(&unknown));
    }

    #[test]
    fn probes_are_recorded_once() {
        let mut store = store();
        store.register_beacon(&parse_beacon(&beacon(BSSID, Some(b"n"), 1, 0x0001, &[])));
        let station = [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];
        let frame = DataFrame::parse(&data_to_ap(BSSID, station)).unwrap();
        store.register_data_frame(&MacAddress(BSSID), &frame);

        #[rustfmt::skip]
        let mut probe = vec![
            0x40, 0x00, 0x00, 0x00,
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        ];
        probe.extend_from_slice(&station);
        probe.extend_from_slice(&[0xff; 6]);
        probe.extend_from_slice(&[0x00, 0x00, 0x00, 0x04, b'h', b'o', b'm', b'e']);
        probe.extend_from_slice(&[0x00; 4]);
        let probe = ProbeRequest::parse(&probe).unwrap();

        store.register_probe_request(&probe);
        store.register_probe_request(&probe);

        let network = store.get(&MacAddress(BSSID)).unwrap();
        let station = network.station(&MacAddress(station)).unwrap();
        assert_eq!(station.probes, vec![b"home".to_vec()]);
    }
}
