use std::fs::File;
use std::io::{self, BufReader};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nix::net::if_::if_nametoindex;
use pcap_file::pcap::PcapReader;
use pcap_file::PcapError;
use thiserror::Error;
use tracing::{debug, info};

/// Ethernet address the Broadcom firmware stamps on frames sent up the monitor tap.
pub const TAP_ADDRESS: [u8; 6] = [0x88; 6];
pub const ETHERNET_HEADER_LEN: usize = 14;
pub const SNAPLEN: usize = 0xffff;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture I/O: {0}")]
    Io(#[from] io::Error),

    #[error("capture file: {0}")]
    Pcap(#[from] PcapError),

    #[error("capture source closed")]
    Closed,
}

/// One packet as delivered by a capture source, ethernet header included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Time since the unix epoch.
    pub timestamp: Duration,
    /// Length on the wire, which may exceed `data.len()` for truncated captures.
    pub captured_len: u32,
    pub data: Vec<u8>,
}

pub trait CaptureSource {
    /// Returns the next packet, or `None` when nothing arrived before the source's timeout.
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError>;
}

impl<C: CaptureSource + ?Sized> CaptureSource for Box<C> {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        (**self).next_frame()
    }
}

/// True when the ethernet source or destination is the monitor tap address.
pub fn is_tap_frame(packet: &[u8]) -> bool {
    packet.len() >= ETHERNET_HEADER_LEN
        && (packet[0..6] == TAP_ADDRESS || packet[6..12] == TAP_ADDRESS)
}

/// Live capture from an AF_PACKET socket bound to one interface.
pub struct SocketCapture {
    socket: OwnedFd,
    buffer: Vec<u8>,
}

impl SocketCapture {
    pub fn open(interface: &str, timeout: Duration) -> Result<Self, CaptureError> {
        let ifindex = if_nametoindex(interface).map_err(io::Error::from)?;

        let protocol = (libc::ETH_P_ALL as u16).to_be();
        let fd = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, protocol as i32) };
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let socket = unsafe { OwnedFd::from_raw_fd(fd) };

        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_protocol = protocol;
        addr.sll_ifindex = ifindex as i32;
        let rc = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error().into());
        }

        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        let rc = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error().into());
        }

        info!(
            "Capturing on {} (ifindex {}, fd {})",
            interface,
            ifindex,
            socket.as_raw_fd()
        );
        Ok(SocketCapture {
            socket,
            buffer: vec![0u8; SNAPLEN],
        })
    }
}

impl CaptureSource for SocketCapture {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        let packet_len = unsafe {
            libc::read(
                self.socket.as_raw_fd(),
                self.buffer.as_mut_ptr() as *mut libc::c_void,
                self.buffer.len(),
            )
        };

        // Receive timeout
        if packet_len < 0 {
            let error_code = io::Error::last_os_error();
            return match error_code.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                    Ok(None)
                }
                _ => Err(error_code.into()),
            };
        }

        let packet = &self.buffer[..packet_len as usize];
        if !is_tap_frame(packet) {
            return Ok(None);
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Ok(Some(CapturedFrame {
            timestamp,
            captured_len: packet.len() as u32,
            data: packet.to_vec(),
        }))
    }
}

/// Replays a pcap file recorded from the monitor tap.
pub struct FileCapture {
    reader: PcapReader<BufReader<File>>,
}

impl FileCapture {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let file = File::open(path.as_ref())?;
        let reader = PcapReader::new(BufReader::new(file))?;
        debug!(
            "Replaying {} (datalink {:?})",
            path.as_ref().display(),
            reader.header().datalink
        );
        Ok(FileCapture { reader })
    }
}

impl CaptureSource for FileCapture {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        match self.reader.next_packet() {
            Some(Ok(packet)) => Ok(Some(CapturedFrame {
                timestamp: packet.timestamp,
                captured_len: packet.orig_len,
                data: packet.data.into_owned(),
            })),
            Some(Err(e)) => Err(e.into()),
            None => Err(CaptureError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
    use pcap_file::DataLink;

    use super::*;

    #[test]
    fn tap_filter_matches_either_address() {
        let mut packet = vec![0u8; 20];
        assert!(!is_tap_frame(&packet));
        packet[6..12].copy_from_slice(&TAP_ADDRESS);
        assert!(is_tap_frame(&packet));
        packet[6..12].copy_from_slice(&[0; 6]);
        packet[0..6].copy_from_slice(&TAP_ADDRESS);
        assert!(is_tap_frame(&packet));
        assert!(!is_tap_frame(&packet[..13]));
    }

    #[test]
    fn replays_then_closes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let header = PcapHeader {
                datalink: DataLink::ETHERNET,
                ..Default::default()
            };
            let mut writer = PcapWriter::with_header(file.reopen().unwrap(), header).unwrap();
            for n in 0..3u8 {
                let data = vec![n; 60];
                let packet = PcapPacket::new(Duration::from_secs(n as u64), 60, &data);
                writer.write_packet(&packet).unwrap();
            }
        }

        let mut capture = FileCapture::open(file.path()).unwrap();
        for n in 0..3u8 {
            let frame = capture.next_frame().unwrap().unwrap();
            assert_eq!(frame.timestamp, Duration::from_secs(n as u64));
            assert_eq!(frame.data, vec![n; 60]);
        }
        assert!(matches!(capture.next_frame(), Err(CaptureError::Closed)));
    }
}
