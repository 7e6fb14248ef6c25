/*
 *  main.rs
 *
 *  MeterBridge - needle in the red
 *	(c) 2020-25 Stuart Hunter
 *
 *	Analog VU needles and a 31-band RTA for a streaming telemetry
 *	backend, painted on the terminal.
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Arg, ArgAction, Command};
use env_logger::Env;
use log::{error, info, warn};

#[cfg(unix)] // Only compile this block on Unix-like systems
use tokio::signal::unix::{signal, SignalKind}; // Import specific Unix signals

use meterbridge::config::{self, Overrides};
use meterbridge::control::ControlClient;
use meterbridge::pacer::AutoPacer;
use meterbridge::render::{self, gauge, Renderer};
use meterbridge::signal::{MeterMode, SignalSnapshot, SignalStore};
use meterbridge::term::{TermSurface, UiEvent};
use meterbridge::theme::{self, Skin};
use meterbridge::transport::{ConnectionState, Transport};
use meterbridge::vframebuf::VarFrameBuf;

// Include the build-time generated constants
include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// One line of state for the reserved bottom row: link badge, mode, skin,
/// level readouts, pace, and the key map.
fn status_line(
    conn: ConnectionState,
    snap: &SignalSnapshot,
    skin: Skin,
    frozen: bool,
    no_signal: bool,
    fps: u32,
) -> String {
    let badge = match conn {
        ConnectionState::Connected => "●",
        ConnectionState::Connecting => "◌",
        ConnectionState::Disconnected => "○",
    };
    let mut line = format!(
        " {} {}  {}/{}",
        badge,
        conn.name(),
        snap.mode.name(),
        skin.name()
    );
    if let MeterMode::Gauge = snap.mode {
        line.push_str(&format!(
            "  L {} R {}",
            gauge::readout(snap.left_db),
            gauge::readout(snap.right_db)
        ));
    }
    if no_signal {
        line.push_str("  NO SIGNAL");
    }
    if frozen {
        line.push_str("  FROZEN");
    }
    line.push_str(&format!(
        "  {:>2} fps  [q]uit [r]estart [m]ode [s]kin [a]split [f]reeze",
        fps
    ));
    line
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author("Stuart Hunter")
        .about("MeterBridge - terminal VU and RTA meters for a telemetry feed")
        .arg(
            Arg::new("debug")
                .short('v')
                .long("debug")
                .alias("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug log level")
                .required(false),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (YAML)")
                .required(false),
        )
        .arg(
            Arg::new("host")
                .short('H')
                .long("host")
                .value_name("HOST")
                .help("Telemetry host to connect to")
                .required(false),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16))
                .help("Telemetry port")
                .required(false),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .value_parser(["gauge", "vu", "bars", "rta", "spectrum"])
                .help("Start with needle gauges or analyzer bars")
                .required(false),
        )
        .arg(
            Arg::new("skin")
                .short('s')
                .long("skin")
                .value_name("SKIN")
                .value_parser(["classic", "ocean", "ember", "mono", "dynamic"])
                .help("Meter face palette")
                .required(false),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PIXELS")
                .value_parser(clap::value_parser!(u32))
                .help("Fixed frame width; both width and height pin the frame size")
                .required(false),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PIXELS")
                .value_parser(clap::value_parser!(u32))
                .help("Fixed frame height; unset means size to the terminal")
                .required(false),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("FPS")
                .value_parser(clap::value_parser!(u32))
                .help("Target refresh rate, paced down automatically on slow terminals")
                .required(false),
        )
        .arg(
            Arg::new("sweep")
                .long("sweep")
                .value_name("DEGREES")
                .value_parser(clap::value_parser!(f32))
                .help("Needle sweep angle in degrees")
                .required(false),
        )
        .arg(
            Arg::new("asymmetric")
                .short('a')
                .long("asymmetric")
                .action(ArgAction::SetTrue)
                .help("Split left and right into separate panels")
                .required(false),
        )
        .arg(
            Arg::new("dump-config")
                .long("dump-config")
                .action(ArgAction::SetTrue)
                .help("Print the fully merged configuration and exit")
                .required(false),
        )
        .after_help(
            "CONTROLS:\n\
             \tq quit, r restart producer, m gauge/bars,\n\
             \ts cycle skin, a split panels, f freeze display",
        )
        .get_matches();

    let debug_enabled = matches.get_flag("debug");

    // Initialize the logger with the appropriate level based on debug flag
    env_logger::Builder::from_env(Env::default().default_filter_or(if debug_enabled {"debug"}else{"info"}))
        .format_timestamp_secs()
        .init();

    info!("This {} goes up to eleven", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let overrides = Overrides {
        config: matches.get_one::<String>("config").map(PathBuf::from),
        host: matches.get_one::<String>("host").cloned(),
        port: matches.get_one::<u16>("port").copied(),
        mode: matches.get_one::<String>("mode").cloned(),
        skin: matches.get_one::<String>("skin").cloned(),
        width: matches.get_one::<u32>("width").copied(),
        height: matches.get_one::<u32>("height").copied(),
        fps: matches.get_one::<u32>("fps").copied(),
        sweep_deg: matches.get_one::<f32>("sweep").copied(),
        asymmetric: matches.get_flag("asymmetric").then_some(true),
        dump_config: matches.get_flag("dump-config"),
    };
    let cfg = config::load(&overrides)?;
    let endpoint = cfg.transport();
    info!(
        "Feed {}:{}, {} mode, {} skin",
        endpoint.host,
        endpoint.port,
        cfg.meter_mode().name(),
        cfg.skin().name()
    );

    let store = Arc::new(SignalStore::new(cfg.meter_mode(), cfg.silence_secs()));
    let transport = Transport::spawn(endpoint, store.clone());
    let control = cfg.control_url().map(|url| ControlClient::new(&url));
    if control.is_none() {
        info!("No control endpoint configured; 'r' cycles the local connection only.");
    }

    let mut term = TermSurface::new()?;
    let fixed_size = cfg.frame_size().is_some();
    let (fw, fh) = match cfg.frame_size() {
        Some(size) => size,
        None => term.frame_size()?,
    };
    let mut frame = VarFrameBuf::new(fw, fh, render::BACKGROUND);
    let mut renderer = Renderer::new(cfg.sweep_deg(), cfg.spring_k(), cfg.damping());
    let mut pacer = AutoPacer::new(cfg.fps(), cfg.fps(), 10);

    let mut skin = cfg.skin();
    let mut asymmetric = cfg.asymmetric();
    let mut frozen = false;

    tokio::select! {
        // Wait for a termination signal
        _ = signal_handler() => {
            // The signal_handler function logs the received signal.
            // Execution proceeds to the teardown at the end of main.
        }
        // Main application loop
        _ = async {
            loop {
                // Drain the keyboard first so quit never waits behind a frame
                let mut quit = false;
                loop {
                    match term.poll_event() {
                        Ok(Some(UiEvent::Quit)) => {
                            quit = true;
                            break;
                        }
                        Ok(Some(UiEvent::RestartProducer)) => {
                            info!("Producer restart requested.");
                            if let Some(ctrl) = control.clone() {
                                tokio::spawn(async move {
                                    if let Err(e) = ctrl.restart_producer().await {
                                        warn!("Producer restart request failed: {}", e);
                                    }
                                });
                            }
                            transport.reconnect();
                        }
                        Ok(Some(UiEvent::ToggleMode)) => {
                            let next = store.mode().toggled();
                            info!("Meter mode -> {}", next.name());
                            store.set_mode(next);
                        }
                        Ok(Some(UiEvent::CycleSkin)) => {
                            skin = skin.cycled();
                            info!("Skin -> {}", skin.name());
                        }
                        Ok(Some(UiEvent::ToggleAsymmetric)) => {
                            asymmetric = !asymmetric;
                        }
                        Ok(Some(UiEvent::ToggleFreeze)) => {
                            frozen = !frozen;
                            info!("{}", if frozen { "Display frozen." } else { "Display live." });
                        }
                        Ok(Some(UiEvent::Resized)) => {
                            if !fixed_size {
                                match term.frame_size() {
                                    Ok((w, h)) => frame = VarFrameBuf::new(w, h, render::BACKGROUND),
                                    Err(e) => warn!("Failed to size frame to terminal: {}", e),
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            error!("Keyboard read failed: {}", e);
                            quit = true;
                            break;
                        }
                    }
                }
                if quit {
                    break;
                }

                if pacer.should_flush() {
                    let snap = store.snapshot();
                    let base = if skin == Skin::Dynamic {
                        theme::reactive_base(&snap)
                    } else {
                        None
                    };
                    let params = theme::resolve(skin, base, asymmetric, frozen);
                    renderer
                        .tick(&snap, &params, &mut frame)
                        .unwrap_or_else(|e| error!("Failed to render meter frame: {}", e));

                    let status = status_line(
                        transport.state(),
                        &snap,
                        skin,
                        frozen,
                        store.no_signal(),
                        pacer.effective_fps(),
                    );
                    let flushed = Instant::now();
                    if let Err(e) = term.blit(&frame, &status) {
                        error!("Terminal write failed: {}", e);
                        break;
                    }
                    pacer.record_flush_ms(flushed.elapsed().as_secs_f32() * 1000.0);
                }

                // Yield briefly; the pacer decides when the next frame goes out
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        } => {
            info!("Closed Application Loop.");
        }
    }

    info!("Main application exiting. Restoring terminal and closing the feed.");

    // Leave the alternate screen before the transport logs its teardown
    drop(term);
    transport.shutdown().await;

    Ok(())
}
