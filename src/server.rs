use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dot11::{decode_frame, PhyMetadata};
use nix::poll::{poll, PollFd, PollFlags};
use tracing::{debug, error, info, trace, warn};

use crate::capture::{CaptureError, CaptureSource, CapturedFrame, ETHERNET_HEADER_LEN};
use crate::command::{ClientCommand, ProtocolError, ServerCommand};
use crate::mode::OperationMode;
use crate::network::NetworkStore;
use crate::radio::{tune, RadioControl};
use crate::recorder::{strip_capture_headers, FrameRecorder, CAPTURE_HEADER_LEN};

/// Byte stream to the operator.
pub trait CommandChannel: Read + Write + AsFd {
    fn shutdown(&self) -> io::Result<()>;
}

impl CommandChannel for TcpStream {
    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

impl CommandChannel for UnixStream {
    fn shutdown(&self) -> io::Result<()> {
        UnixStream::shutdown(self, Shutdown::Both)
    }
}

/// Listens on `addr`, accepts a single operator and stops listening.
pub fn accept_operator(addr: SocketAddr) -> Result<TcpStream> {
    let listener = TcpListener::bind(addr).with_context(|| format!("binding {}", addr))?;
    info!("Waiting for operator on {}", addr);
    println!("💲 Waiting for operator on {}", addr);

    let (stream, peer) = listener.accept().context("accepting operator")?;
    info!("Operator connected from {}", peer);
    Ok(stream)
}

#[derive(Debug, Default, Clone)]
pub struct Counters {
    pub frame_count: u64,
    pub empty_reads: u64,
    pub short_packets: u64,
    pub decode_errors: u64,
    pub fcs_errors: u64,
    pub commands_received: u64,
    pub commands_sent: u64,
    pub send_errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Stop,
}

pub struct Server<C: CaptureSource, R: RadioControl, S: CommandChannel> {
    capture: C,
    radio: R,
    channel: S,
    store: NetworkStore,
    mode: OperationMode,
    recorder: Option<FrameRecorder>,
    counters: Counters,
}

impl<C: CaptureSource, R: RadioControl, S: CommandChannel> Server<C, R, S> {
    pub fn new(capture: C, radio: R, channel: S, store: NetworkStore) -> Self {
        Server {
            capture,
            radio,
            channel,
            store,
            mode: OperationMode::default(),
            recorder: None,
            counters: Counters::default(),
        }
    }

    pub fn with_recorder(mut self, recorder: FrameRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn mode(&self) -> &OperationMode {
        &self.mode
    }

    pub fn store(&self) -> &NetworkStore {
        &self.store
    }

    pub fn radio(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Runs until `running` is cleared, the operator disconnects or the capture ends.
    pub fn run(&mut self, running: &AtomicBool) {
        let mut last_status_time = Instant::now();
        let status_interval = Duration::from_secs(1);
        let mut frame_count_old = 0u64;

        while running.load(Ordering::SeqCst) {
            if self.run_once() == Step::Stop {
                break;
            }

            if last_status_time.elapsed() >= status_interval {
                last_status_time = Instant::now();
                let frame_rate = self.counters.frame_count - frame_count_old;
                frame_count_old = self.counters.frame_count;
                debug!(
                    "Frames: {} | Rate: {} | ERs: {} | Networks: {} | Mode: {}",
                    self.counters.frame_count,
                    frame_rate,
                    self.counters.empty_reads,
                    self.store.len(),
                    self.mode.name()
                );
            }
        }
    }

    /// One loop iteration: pending operator command, then at most one captured frame.
    pub fn run_once(&mut self) -> Step {
        if self.process_commands() == Step::Stop {
            return Step::Stop;
        }

        match self.capture.next_frame() {
            Ok(Some(frame)) => {
                self.process_packet(&frame);
                Step::Continue
            }
            Ok(None) => {
                self.counters.empty_reads += 1;
                Step::Continue
            }
            Err(CaptureError::Closed) => {
                info!("Capture source closed");
                Step::Stop
            }
            Err(e) => {
                error!("Error reading from capture: {}", e);
                Step::Stop
            }
        }
    }

    fn command_pending(&self) -> bool {
        let mut fds = [PollFd::new(&self.channel, PollFlags::POLLIN)];
        match poll(&mut fds, 0) {
            Ok(ready) => ready > 0,
            Err(e) => {
                warn!("Polling command channel: {}", e);
                false
            }
        }
    }

    fn process_commands(&mut self) -> Step {
        if !self.command_pending() {
            return Step::Continue;
        }

        match ClientCommand::read_from(&mut self.channel) {
            Ok(command) => {
                self.counters.commands_received += 1;
                self.apply(command);
                Step::Continue
            }
            Err(e) if e.is_disconnect() => {
                info!("Operator disconnected");
                Step::Stop
            }
            Err(ProtocolError::Io(e)) => {
                error!("Command channel failed: {}", e);
                Step::Stop
            }
            Err(e) => {
                warn!("Discarding operator command: {}", e);
                Step::Continue
            }
        }
    }

    fn apply(&mut self, command: ClientCommand) {
        debug!("Operator command: {:?}", command);
        match command {
            ClientCommand::SetChannel { channel } => {
                if let Err(e) = tune(&mut self.radio, channel) {
                    warn!("Could not switch to channel {}: {}", channel, e);
                }
            }
            ClientCommand::SetNetwork { bssid } => self.mode.set_network(&self.store, &bssid),
            ClientCommand::UnsetNetwork => self.mode.unset_network(),
        }
    }

    fn process_packet(&mut self, captured: &CapturedFrame) {
        let packet = &captured.data;
        if packet.len() < CAPTURE_HEADER_LEN {
            self.counters.short_packets += 1;
            trace!("Dropping {} byte packet", packet.len());
            return;
        }
        self.counters.frame_count += 1;

        let phy = match PhyMetadata::parse(&packet[ETHERNET_HEADER_LEN..CAPTURE_HEADER_LEN]) {
            Ok(phy) => phy,
            Err(e) => {
                debug!("PHY header: {}", e);
                return;
            }
        };
        if !phy.fcs_valid() {
            self.counters.fcs_errors += 1;
        }

        if let Some(recorder) = self.recorder.as_mut() {
            if let Some(frame) = strip_capture_headers(packet) {
                recorder.record(captured.timestamp, frame);
            }
        }

        let frame = match decode_frame(&packet[CAPTURE_HEADER_LEN..]) {
            Ok(frame) => frame,
            Err(e) => {
                self.counters.decode_errors += 1;
                debug!("Dropping frame: {}", e);
                return;
            }
        };

        if let Some(command) = self
            .mode
            .on_frame(&mut self.store, &frame, &phy, Instant::now())
        {
            self.send(&command);
        }
    }

    fn send(&mut self, command: &ServerCommand) {
        match command.write_to(&mut self.channel) {
            Ok(()) => self.counters.commands_sent += 1,
            Err(e) => {
                self.counters.send_errors += 1;
                warn!("Could not notify operator: {}", e);
            }
        }
    }
}

impl<C: CaptureSource, R: RadioControl, S: CommandChannel> Drop for Server<C, R, S> {
    fn drop(&mut self) {
        if let Err(e) = self.channel.shutdown() {
            debug!("Command channel shutdown: {}", e);
        }
        if let Some(recorder) = &self.recorder {
            info!("Recorded {} frames to {}", recorder.frames(), recorder.path());
        }
    }
}
