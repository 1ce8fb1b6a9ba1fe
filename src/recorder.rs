use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use dot11::{PhyMetadata, FCS_LEN};
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapReader, PcapWriter};
use pcap_file::DataLink;
use tracing::{debug, info, warn};

use crate::capture::ETHERNET_HEADER_LEN;

/// Ethertype the firmware uses for frames on the monitor tap.
pub const TAP_ETHERTYPE: [u8; 2] = [0xfa, 0xfa];
/// Ethernet plus PHY header, removed from the front of every tap frame.
pub const CAPTURE_HEADER_LEN: usize = ETHERNET_HEADER_LEN + PhyMetadata::LEN;
const MIN_SNAPLEN: u32 = 1500;

/// The 802.11 frame inside a tap packet, without the FCS.
pub fn strip_capture_headers(packet: &[u8]) -> Option<&[u8]> {
    if packet.len() < CAPTURE_HEADER_LEN + FCS_LEN {
        return None;
    }
    Some(&packet[CAPTURE_HEADER_LEN..packet.len() - FCS_LEN])
}

/// `<prefix>-YYYY-mm-dd_HH-MM-SS.pcap`, the way capture files are named.
pub fn capture_filename(prefix: &str) -> String {
    let date_time = Local::now().format("-%Y-%m-%d_%H-%M-%S").to_string();
    format!("{}{}.pcap", prefix, date_time)
}

fn ieee80211_header(snaplen: u32) -> PcapHeader {
    PcapHeader {
        snaplen,
        datalink: DataLink::IEEE802_11,
        ..Default::default()
    }
}

/// Writes bare 802.11 frames to a pcap file.
pub struct FrameRecorder {
    writer: PcapWriter<BufWriter<File>>,
    path: String,
    frames: u64,
}

impl FrameRecorder {
    pub fn create(path: &str) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("creating {}", path))?;
        let writer = PcapWriter::with_header(BufWriter::new(file), ieee80211_header(0xffff))
            .with_context(|| format!("writing pcap header to {}", path))?;
        info!("Recording frames to {}", path);
        Ok(FrameRecorder {
            writer,
            path: path.to_string(),
            frames: 0,
        })
    }

    pub fn record(&mut self, timestamp: Duration, frame: &[u8]) {
        let packet = PcapPacket::new(timestamp, frame.len() as u32, frame);
        match self.writer.write_packet(&packet) {
            Ok(_) => self.frames += 1,
            Err(e) => warn!("Dropping frame from {}: {}", self.path, e),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Rewrites a raw tap capture as an 802.11 capture. Only `0xFAFA` frames are
/// kept. Refuses to overwrite `output`. Returns the number of frames written.
pub fn convert_capture<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<usize> {
    let (input, output) = (input.as_ref(), output.as_ref());

    let source = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mut reader = PcapReader::new(BufReader::new(source))
        .with_context(|| format!("reading pcap header of {}", input.display()))?;
    let header = reader.header();
    info!(
        "Converting {} (snaplen {}, datalink {:?})",
        input.display(),
        header.snaplen,
        header.datalink
    );
    if header.snaplen < MIN_SNAPLEN {
        warn!(
            "Snaplen {} is below {}, frame data may be missing",
            header.snaplen, MIN_SNAPLEN
        );
    }

    let destination = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output)
        .with_context(|| format!("creating {}", output.display()))?;
    let out_header = PcapHeader {
        ts_resolution: header.ts_resolution,
        ..ieee80211_header(header.snaplen)
    };
    let mut writer = PcapWriter::with_header(BufWriter::new(destination), out_header)?;

    let mut written = 0;
    let mut skipped = 0;
    while let Some(packet) = reader.next_packet() {
        let packet = packet.with_context(|| format!("reading {}", input.display()))?;
        let data = &packet.data;
        if data.len() < ETHERNET_HEADER_LEN || data[12..14] != TAP_ETHERTYPE {
            skipped += 1;
            continue;
        }
        let Some(frame) = strip_capture_headers(data) else {
            skipped += 1;
            continue;
        };
        writer.write_packet(&PcapPacket::new(packet.timestamp, frame.len() as u32, frame))?;
        written += 1;
    }

    debug!("Skipped {} non-tap frames", skipped);
    info!("Wrote {} frames to {}", written, output.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap_packet(ethertype: [u8; 2], frame: &[u8]) -> Vec<u8> {
        let mut packet = vec![0x88; 12];
        packet.extend_from_slice(&ethertype);
        packet.extend_from_slice(&[0u8; PhyMetadata::LEN]);
        packet.extend_from_slice(frame);
        packet.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
        packet
    }

    #[test]
    fn strips_ethernet_phy_and_fcs() {
        let packet = tap_packet(TAP_ETHERTYPE, &[1, 2, 3]);
        assert_eq!(strip_capture_headers(&packet), Some(&[1u8, 2, 3][..]));
        assert_eq!(strip_capture_headers(&packet[..53]), None);
    }

    #[test]
    fn converts_only_tap_frames() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.pcap");
        let output = dir.path().join("dot11.pcap");

        {
            let mut writer =
                PcapWriter::with_header(File::create(&input).unwrap(), PcapHeader::default())
                    .unwrap();
            let packets = [
                tap_packet(TAP_ETHERTYPE, &[0x80, 0x00, 0x01]),
                tap_packet([0x08, 0x00], &[0x80, 0x00, 0x02]),
                tap_packet(TAP_ETHERTYPE, &[0x08, 0x00, 0x03, 0x04]),
            ];
            for (n, data) in packets.iter().enumerate() {
                let packet = PcapPacket::new(Duration::from_secs(n as u64), data.len() as u32, data);
                writer.write_packet(&packet).unwrap();
            }
        }

        assert_eq!(convert_capture(&input, &output).unwrap(), 2);

        let mut reader = PcapReader::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(reader.header().datalink, DataLink::IEEE802_11);
        let first = reader.next_packet().unwrap().unwrap();
        assert_eq!(&first.data[..], &[0x80, 0x00, 0x01]);
        assert_eq!(first.timestamp, Duration::from_secs(0));
        let second = reader.next_packet().unwrap().unwrap();
        assert_eq!(&second.data[..], &[0x08, 0x00, 0x03, 0x04]);
        assert_eq!(second.orig_len, 4);
        assert!(reader.next_packet().is_none());

        // output already exists
        assert!(convert_capture(&input, &output).is_err());
    }

    #[test]
    fn recorder_writes_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.pcap");
        let path = path.to_str().unwrap();
        {
            let mut recorder = FrameRecorder::create(path).unwrap();
            recorder.record(Duration::from_millis(1500), &[0x80, 0x00]);
            assert_eq!(recorder.frames(), 1);
            assert_eq!(recorder.path(), path);
        }
        let mut reader = PcapReader::new(File::open(path).unwrap()).unwrap();
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.timestamp, Duration::from_millis(1500));
        assert_eq!(&packet.data[..], &[0x80, 0x00]);
    }

    #[test]
    fn filenames_carry_prefix_and_date() {
        let name = capture_filename("scan");
        assert!(name.starts_with("scan-20"));
        assert!(name.ends_with(".pcap"));
    }
}
