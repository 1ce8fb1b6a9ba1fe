use std::collections::HashMap;
use std::time::{Duration, Instant};

use dot11::{DecodedFrame, MacAddress, PhyMetadata};
use tracing::{debug, info};

use crate::command::{NetworkDetail, NetworkUpdate, ServerCommand};
use crate::network::NetworkStore;

/// Minimum spacing between two updates for the same network while scanning.
pub const NOTIFY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct PassiveScanMode {
    last_notified: HashMap<MacAddress, Instant>,
}

impl PassiveScanMode {
    pub fn new() -> Self {
        PassiveScanMode::default()
    }

    fn on_frame(
        &mut self,
        store: &NetworkStore,
        frame: &DecodedFrame,
        phy: &PhyMetadata,
        now: Instant,
    ) -> Option<ServerCommand> {
        let DecodedFrame::Beacon(beacon) = frame else {
            return None;
        };
        let bssid = beacon.bssid();

        let due = match self.last_notified.get(&bssid) {
            None => true,
            Some(last) => now.saturating_duration_since(*last) > NOTIFY_INTERVAL,
        };
        if !due {
            return None;
        }

        let network = store.get(&bssid)?;
        self.last_notified.insert(bssid, now);
        Some(ServerCommand::NetworkUpdate(NetworkUpdate::new(network, phy)))
    }
}

#[derive(Debug)]
pub struct NetworkDetailMode {
    bssid: MacAddress,
    just_started: bool,
}

impl NetworkDetailMode {
    pub fn new(bssid: MacAddress) -> Self {
        NetworkDetailMode {
            bssid,
            just_started: true,
        }
    }

    pub fn bssid(&self) -> MacAddress {
        self.bssid
    }

    /// The first data frame after entering the mode always produces a
    /// snapshot, whichever network it belongs to.
    fn on_frame(&mut self, store: &NetworkStore, frame: &DecodedFrame) -> Option<ServerCommand> {
        let DecodedFrame::Data(data) = frame else {
            return None;
        };
        if data.bssid != self.bssid && !self.just_started {
            return None;
        }
        self.just_started = false;

        let network = store.get(&self.bssid)?;
        Some(ServerCommand::NetworkDetail(NetworkDetail::new(network)))
    }
}

#[derive(Debug)]
pub enum OperationMode {
    PassiveScan(PassiveScanMode),
    NetworkDetail(NetworkDetailMode),
}

impl Default for OperationMode {
    fn default() -> Self {
        OperationMode::PassiveScan(PassiveScanMode::new())
    }
}

impl OperationMode {
    pub fn name(&self) -> &'static str {
        match self {
            OperationMode::PassiveScan(_) => "passive scan",
            OperationMode::NetworkDetail(_) => "network detail",
        }
    }

    /// Registers `frame` with the store, then lets the active mode decide
    /// whether the operator should hear about it.
    pub fn on_frame(
        &mut self,
        store: &mut NetworkStore,
        frame: &DecodedFrame,
        phy: &PhyMetadata,
        now: Instant,
    ) -> Option<ServerCommand> {
        match frame {
            DecodedFrame::Beacon(beacon) => {
                store.register_beacon(beacon);
            }
            DecodedFrame::Data(data) => store.register_data_frame(&data.bssid, data),
            DecodedFrame::ProbeRequest(probe) => store.register_probe_request(probe),
            DecodedFrame::Unrecognized(_) => {}
        }

        match self {
            OperationMode::PassiveScan(mode) => mode.on_frame(store, frame, phy, now),
            OperationMode::NetworkDetail(mode) => mode.on_frame(store, frame),
        }
    }

    /// Switches to detail mode for `bssid`. Unknown or unparsable bssids leave
    /// the current mode in place.
    pub fn set_network(&mut self, store: &NetworkStore, bssid: &str) {
        let bssid: MacAddress = match bssid.parse() {
            Ok(bssid) => bssid,
            Err(e) => {
                debug!("Ignoring SetNetwork: {}", e);
                return;
            }
        };
        if !store.contains(&bssid) {
            debug!("Ignoring SetNetwork for unseen network {}", bssid);
            return;
        }
        info!("Tracking network {}", bssid);
        *self = OperationMode::NetworkDetail(NetworkDetailMode::new(bssid));
    }

    pub fn unset_network(&mut self) {
        info!("Back to passive scan");
        *self = OperationMode::PassiveScan(PassiveScanMode::new());
    }
}

#[cfg(test)]
mod tests {
    use dot11::decode_frame;

    use super::*;
    use crate::network::tests::{beacon, data_to_ap, BSSID};
    use crate::oui::OuiDatabase;

    const OTHER: [u8; 6] = [0x00, 0x66, 0x77, 0x88, 0x99, 0xaa];
    const STATION: [u8; 6] = [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];

    fn phy() -> PhyMetadata {
        PhyMetadata {
            rx_chan: 6 << 3,
            ..Default::default()
        }
    }

    fn store() -> NetworkStore {
        NetworkStore::new(OuiDatabase::disabled())
    }

    fn frame(bytes: &[u8]) -> DecodedFrame {
        decode_frame(bytes).unwrap()
    }

    #[test]
    fn passive_scan_rate_limits_per_network() {
        let mut store = store();
        let mut mode = OperationMode::default();
        let beacon = frame(&beacon(BSSID, Some(b"cafe"), 1, 0x0001, &[]));
        let t0 = Instant::now();

        let emitted: Vec<_> = [0, 500, 1500]
            .iter()
            .filter_map(|ms| {
                mode.on_frame(&mut store, &beacon, &phy(), t0 + Duration::from_millis(*ms))
            })
            .collect();

        assert_eq!(emitted.len(), 2);
        match &emitted[0] {
            ServerCommand::NetworkUpdate(update) => {
                assert_eq!(update.ssid, "cafe");
                assert_eq!(update.bssid, "00:11:22:33:44:55");
                assert_eq!(update.protection, "OPEN");
                assert_eq!(update.channel, 6);
                assert_eq!(update.rssi, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.get(&MacAddress(BSSID)).unwrap().management_frames, 3);
    }

    #[test]
    fn exactly_one_second_is_not_enough() {
        let mut store = store();
        let mut mode = OperationMode::default();
        let beacon = frame(&beacon(BSSID, Some(b"cafe"), 1, 0x0001, &[]));
        let t0 = Instant::now();

        assert!(mode.on_frame(&mut store, &beacon, &phy(), t0).is_some());
        assert!(mode
            .on_frame(&mut store, &beacon, &phy(), t0 + NOTIFY_INTERVAL)
            .is_none());
    }

    #[test]
    fn passive_scan_ignores_data() {
        let mut store = store();
        let mut mode = OperationMode::default();
        mode.on_frame(&mut store, &frame(&beacon(BSSID, Some(b"n"), 1, 1, &[])), &phy(), Instant::now());
        let data = frame(&data_to_ap(BSSID, STATION));
        assert!(mode.on_frame(&mut store, &data, &phy(), Instant::now()).is_none());
        assert_eq!(store.get(&MacAddress(BSSID)).unwrap().stations.len(), 1);
    }

    #[test]
    fn detail_mode_first_frame_is_unconditional() {
        let mut store = store();
        let mut mode = OperationMode::default();
        let now = Instant::now();
        mode.on_frame(&mut store, &frame(&beacon(BSSID, Some(b"a"), 1, 1, &[])), &phy(), now);
        mode.on_frame(&mut store, &frame(&beacon(OTHER, Some(b"b"), 1, 1, &[])), &phy(), now);

        mode.set_network(&store, "00:11:22:33:44:55");
        assert_eq!(mode.name(), "network detail");

        let foreign = frame(&data_to_ap(OTHER, STATION));
        assert!(matches!(
            mode.on_frame(&mut store, &foreign, &phy(), now),
            Some(ServerCommand::NetworkDetail(_))
        ));
        assert!(mode.on_frame(&mut store, &foreign, &phy(), now).is_none());

        let beacon = frame(&beacon(BSSID, Some(b"a"), 1, 1, &[]));
        assert!(mode.on_frame(&mut store, &beacon, &phy(), now).is_none());

        let own = frame(&data_to_ap(BSSID, STATION));
        match mode.on_frame(&mut store, &own, &phy(), now) {
            Some(ServerCommand::NetworkDetail(detail)) => {
                assert_eq!(detail.clients.len(), 1);
                assert_eq!(detail.clients[0].addr, "02:aa:bb:cc:dd:ee");
                assert_eq!(detail.clients[0].sent_data_frames, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn set_network_needs_a_known_bssid() {
        let mut store = store();
        let mut mode = OperationMode::default();
        mode.set_network(&store, "00:11:22:33:44:55");
        assert_eq!(mode.name(), "passive scan");
        mode.set_network(&store, "not a mac");
        assert_eq!(mode.name(), "passive scan");

        mode.on_frame(&mut store, &frame(&beacon(BSSID, Some(b"a"), 1, 1, &[])), &phy(), Instant::now());
        mode.set_network(&store, "00:11:22:33:44:55");
        match &mode {
            OperationMode::NetworkDetail(detail) => assert_eq!(detail.bssid(), MacAddress(BSSID)),
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[test]
    fn unset_network_resets_notification_times() {
        let mut store = store();
        let mut mode = OperationMode::default();
        let beacon = frame(&beacon(BSSID, Some(b"a"), 1, 1, &[]));
        let now = Instant::now();

        assert!(mode.on_frame(&mut store, &beacon, &phy(), now).is_some());
        assert!(mode.on_frame(&mut store, &beacon, &phy(), now).is_none());
        mode.unset_network();
        assert!(mode.on_frame(&mut store, &beacon, &phy(), now).is_some());
    }
}
