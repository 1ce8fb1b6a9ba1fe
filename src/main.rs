extern crate libc;
extern crate nix;

use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use libc::EXIT_FAILURE;
use nix::unistd::geteuid;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use bcmon::capture::{CaptureSource, FileCapture, SocketCapture};
use bcmon::config::{Arguments, CaptureConfig, Command, ServerConfig};
use bcmon::network::NetworkStore;
use bcmon::oui::OuiDatabase;
use bcmon::radio::{setup_card, Nl80211Radio, NullRadio, RadioControl};
use bcmon::recorder::{capture_filename, convert_capture, FrameRecorder};
use bcmon::server::{accept_operator, Server};

fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env("BCMON_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));

    Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Arguments::parse();

    match cli.command {
        Command::Convert { input, output } => {
            let written = convert_capture(&input, &output)?;
            println!("💲 Wrote {} frames to {}", written, output.display());
            Ok(())
        }
        Command::Serve(args) => serve(ServerConfig::from(&args)),
    }
}

fn serve(config: ServerConfig) -> Result<()> {
    if matches!(config.capture, CaptureConfig::Live { .. }) && !geteuid().is_root() {
        println!("💲 You need to run as root!");
        exit(EXIT_FAILURE);
    }

    let channel = accept_operator(config.listen)?;
    println!("💲 Operator connected.");

    let (capture, mut radio): (Box<dyn CaptureSource>, Box<dyn RadioControl>) =
        match &config.capture {
            CaptureConfig::Live { interface } => {
                let radio = Nl80211Radio::open(interface)
                    .with_context(|| format!("opening radio {}", interface))?;
                let capture = SocketCapture::open(interface, config.read_timeout)
                    .with_context(|| format!("opening capture on {}", interface))?;
                println!("💲 Capturing on {}.", interface);
                (Box::new(capture), Box::new(radio))
            }
            CaptureConfig::Replay { path } => {
                let capture = FileCapture::open(path)
                    .with_context(|| format!("opening {}", path.display()))?;
                println!("💲 Replaying {}.", path.display());
                (Box::new(capture), Box::new(NullRadio::new()))
            }
        };
    setup_card(&mut radio);

    let vendors = if config.vendor_lookup {
        OuiDatabase::load()
    } else {
        OuiDatabase::disabled()
    };

    let mut server = Server::new(capture, radio, channel, NetworkStore::new(vendors));
    if let Some(prefix) = &config.record_prefix {
        let filename = capture_filename(prefix);
        server = server.with_recorder(FrameRecorder::create(&filename)?);
        println!("💲 Recording to {}.", filename);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl-C handler")?;

    println!("💲 Starting...");
    server.run(&running);

    println!("💲 Cleaning up...");
    let counters = server.counters().clone();
    drop(server);
    info!(
        "Processed {} frames, sent {} updates, received {} commands",
        counters.frame_count, counters.commands_sent, counters.commands_received
    );
    Ok(())
}
