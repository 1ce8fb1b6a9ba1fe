//! Framed property list messages exchanged with the operator.
//!
//! Every message on the wire is a little-endian `u32` length followed by an
//! XML plist dictionary of that many bytes. The dictionary's `command` integer
//! selects the message; the remaining keys are the message fields.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use dot11::PhyMetadata;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::{Network, Station};

/// Documents larger than this are refused before any payload is read.
pub const MAX_DOCUMENT_LEN: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("command channel I/O: {0}")]
    Io(#[from] io::Error),

    #[error("malformed command document: {0}")]
    Plist(#[from] plist::Error),

    #[error("unknown command id {0}")]
    UnknownCommand(i64),

    #[error("command document of {0} bytes exceeds the {} byte limit", MAX_DOCUMENT_LEN)]
    FrameTooLarge(usize),
}

impl ProtocolError {
    /// True when the peer closed the connection between or inside a message.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    command: u32,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Deserialize)]
struct Discriminator {
    command: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkUpdate {
    pub ssid: String,
    pub bssid: String,
    pub protection: String,
    pub channel: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

impl NetworkUpdate {
    /// `channel` and `rssi` come from the radio header of the frame that
    /// triggered the update, not from the network record.
    pub fn new(network: &Network, phy: &PhyMetadata) -> Self {
        NetworkUpdate {
            ssid: network.ssid_string(),
            bssid: network.bssid.to_string(),
            protection: network.security.to_string(),
            channel: phy.channel(),
            rssi: phy.rssi(),
            vendor: network.vendor.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub sent_data_frames: u64,
}

impl From<&Station> for Client {
    fn from(station: &Station) -> Self {
        Client {
            addr: station.mac.to_string(),
            vendor: station.vendor.clone(),
            sent_data_frames: station.sent_data_frames,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDetail {
    pub clients: Vec<Client>,
}

impl NetworkDetail {
    pub fn new(network: &Network) -> Self {
        let mut clients: Vec<Client> = network.stations.values().map(Client::from).collect();
        clients.sort_by(|a, b| a.addr.cmp(&b.addr));
        NetworkDetail { clients }
    }
}

/// Notifications sent to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    NetworkUpdate(NetworkUpdate),
    NetworkDetail(NetworkDetail),
}

impl ServerCommand {
    pub const NETWORK_UPDATE: u32 = 0;
    pub const NETWORK_DETAIL: u32 = 1;

    pub fn id(&self) -> u32 {
        match self {
            ServerCommand::NetworkUpdate(_) => Self::NETWORK_UPDATE,
            ServerCommand::NetworkDetail(_) => Self::NETWORK_DETAIL,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            ServerCommand::NetworkUpdate(body) => encode_document(self.id(), body),
            ServerCommand::NetworkDetail(body) => encode_document(self.id(), body),
        }
    }

    pub fn decode(document: &[u8]) -> Result<Self, ProtocolError> {
        let command = match discriminator(document)? {
            0 => ServerCommand::NetworkUpdate(body(document)?),
            1 => ServerCommand::NetworkDetail(body(document)?),
            other => return Err(ProtocolError::UnknownCommand(other)),
        };
        Ok(command)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, ProtocolError> {
        Self::decode(&read_document(reader)?)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        writer.write_all(&self.encode()?)?;
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SetChannel {
    channel: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SetNetwork {
    bssid: String,
}

#[derive(Serialize)]
struct NoFields {}

/// Requests from the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    SetChannel { channel: u8 },
    SetNetwork { bssid: String },
    UnsetNetwork,
}

impl ClientCommand {
    pub const SET_CHANNEL: u32 = 0;
    pub const SET_NETWORK: u32 = 1;
    pub const UNSET_NETWORK: u32 = 2;

    pub fn id(&self) -> u32 {
        match self {
            ClientCommand::SetChannel { .. } => Self::SET_CHANNEL,
            ClientCommand::SetNetwork { .. } => Self::SET_NETWORK,
            ClientCommand::UnsetNetwork => Self::UNSET_NETWORK,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            ClientCommand::SetChannel { channel } => {
                encode_document(self.id(), &SetChannel { channel: *channel })
            }
            ClientCommand::SetNetwork { bssid } => encode_document(
                self.id(),
                &SetNetwork {
                    bssid: bssid.clone(),
                },
            ),
            ClientCommand::UnsetNetwork => encode_document(self.id(), &NoFields {}),
        }
    }

    pub fn decode(document: &[u8]) -> Result<Self, ProtocolError> {
        let command = match discriminator(document)? {
            0 => {
                let SetChannel { channel } = body(document)?;
                ClientCommand::SetChannel { channel }
            }
            1 => {
                let SetNetwork { bssid } = body(document)?;
                ClientCommand::SetNetwork { bssid }
            }
            2 => ClientCommand::UnsetNetwork,
            other => return Err(ProtocolError::UnknownCommand(other)),
        };
        Ok(command)
    }

    /// Blocks until a whole message has been read.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, ProtocolError> {
        Self::decode(&read_document(reader)?)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        writer.write_all(&self.encode()?)?;
        writer.flush()?;
        Ok(())
    }
}

fn encode_document<T: Serialize>(command: u32, body: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut document = Vec::new();
    plist::to_writer_xml(&mut document, &Envelope { command, body })?;
    if document.len() > MAX_DOCUMENT_LEN {
        return Err(ProtocolError::FrameTooLarge(document.len()));
    }

    let mut framed = Vec::with_capacity(4 + document.len());
    framed.write_u32::<LittleEndian>(document.len() as u32)?;
    framed.extend_from_slice(&document);
    Ok(framed)
}

fn read_document<R: Read>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    if len > MAX_DOCUMENT_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut document = vec![0u8; len];
    reader.read_exact(&mut document)?;
    Ok(document)
}

fn discriminator(document: &[u8]) -> Result<i64, ProtocolError> {
    let Discriminator { command } = plist::from_reader_xml(document)?;
    Ok(command)
}

fn body<T: DeserializeOwned>(document: &[u8]) -> Result<T, ProtocolError> {
    Ok(plist::from_reader_xml(document)?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn update() -> NetworkUpdate {
        NetworkUpdate {
            ssid: "test".to_string(),
            bssid: "00:11:22:33:44:55".to_string(),
            protection: "WPA2".to_string(),
            channel: 6,
            rssi: Some(-40),
            vendor: None,
        }
    }

    #[test]
    fn network_update_survives_the_wire() {
        let command = ServerCommand::NetworkUpdate(update());
        let framed = command.encode().unwrap();

        let declared = u32::from_le_bytes([framed[0], framed[1], framed[2], framed[3]]) as usize;
        assert_eq!(declared, framed.len() - 4);

        let text = String::from_utf8(framed[4..].to_vec()).unwrap();
        assert!(text.contains("<key>command</key>"));
        assert!(!text.contains("<key>vendor</key>"));

        let decoded = ServerCommand::read_from(&mut Cursor::new(framed)).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn network_detail_uses_camel_case_fields() {
        let command = ServerCommand::NetworkDetail(NetworkDetail {
            clients: vec![
                Client {
                    addr: "02:00:00:00:00:01".to_string(),
                    vendor: Some("Apple, Inc.".to_string()),
                    sent_data_frames: 12,
                },
                Client {
                    addr: "02:00:00:00:00:02".to_string(),
                    vendor: None,
                    sent_data_frames: 0,
                },
            ],
        });
        let framed = command.encode().unwrap();
        let text = String::from_utf8(framed[4..].to_vec()).unwrap();
        assert!(text.contains("<key>sentDataFrames</key>"));
        assert_eq!(text.matches("<key>vendor</key>").count(), 1);

        assert_eq!(ServerCommand::decode(&framed[4..]).unwrap(), command);
    }

    #[test]
    fn client_commands_round_trip() {
        let commands = [
            ClientCommand::SetChannel { channel: 11 },
            ClientCommand::SetNetwork {
                bssid: "00:11:22:33:44:55".to_string(),
            },
            ClientCommand::UnsetNetwork,
        ];

        let mut stream = Vec::new();
        for command in &commands {
            command.write_to(&mut stream).unwrap();
        }

        let mut reader = Cursor::new(stream);
        for command in &commands {
            assert_eq!(&ClientCommand::read_from(&mut reader).unwrap(), command);
        }
        assert!(ClientCommand::read_from(&mut reader)
            .unwrap_err()
            .is_disconnect());
    }

    #[test]
    fn unknown_id_is_rejected() {
        let framed = encode_document(7, &NoFields {}).unwrap();
        assert!(matches!(
            ClientCommand::read_from(&mut Cursor::new(framed.clone())),
            Err(ProtocolError::UnknownCommand(7))
        ));
        assert!(matches!(
            ServerCommand::read_from(&mut Cursor::new(framed)),
            Err(ProtocolError::UnknownCommand(7))
        ));
    }

    #[test]
    fn oversized_length_is_rejected_before_reading() {
        let mut framed = Vec::new();
        framed.write_u32::<LittleEndian>(MAX_DOCUMENT_LEN as u32 + 1).unwrap();
        assert!(matches!(
            ClientCommand::read_from(&mut Cursor::new(framed)),
            Err(ProtocolError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn garbage_document_is_a_plist_error() {
        let mut framed = Vec::new();
        framed.write_u32::<LittleEndian>(5).unwrap();
        framed.extend_from_slice(b"hello");
        assert!(matches!(
            ClientCommand::read_from(&mut Cursor::new(framed)),
            Err(ProtocolError::Plist(_))
        ));
    }

    #[test]
    fn truncated_payload_is_a_disconnect() {
        let mut framed = ClientCommand::UnsetNetwork.encode().unwrap();
        framed.truncate(framed.len() - 3);
        assert!(ClientCommand::read_from(&mut Cursor::new(framed))
            .unwrap_err()
            .is_disconnect());
    }
}
