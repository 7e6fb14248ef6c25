/*
 *  transport.rs
 *
 *  MeterBridge - needle in the red
 *	(c) 2020-25 Stuart Hunter
 *
 *	TODO:
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
//! Connection keeper for the telemetry stream. One worker task owns the
//! socket, the watchdog, the poll timer and the reconnect backoff, so
//! there is never more than one connection attempt in flight and teardown
//! is a single task exit. Faults never escape: a broken stream becomes a
//! state change plus a retry, nothing more.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, sleep_until, timeout, Instant, MissedTickBehavior};

use crate::signal::{MeterMode, SignalStore};
use crate::wire::{self, InboundFrame};

pub const DEFAULT_PORT: u16 = 5550;
pub const DEFAULT_LEVEL_COMMAND: &str = "getLevels";
pub const WATCHDOG_MS: u64 = 3000;
pub const POLL_MS: u64 = 100;
pub const BACKOFF_MIN_MS: u64 = 1000;
pub const BACKOFF_MAX_MS: u64 = 2000;
const POLL_WRITE_TIMEOUT_MS: u64 = 500;

/// Connection status as surfaced to the UI badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TransportCommand {
    /// Drop the current connection (if any) and dial again right away,
    /// skipping any backoff in progress.
    Reconnect,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    /// One-line command sent on the poll timer while the gauge is up.
    /// Push-mode producers just ignore it.
    pub level_command: String,
    pub watchdog: Duration,
    pub poll_interval: Duration,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            level_command: DEFAULT_LEVEL_COMMAND.to_string(),
            watchdog: Duration::from_millis(WATCHDOG_MS),
            poll_interval: Duration::from_millis(POLL_MS),
            backoff_min: Duration::from_millis(BACKOFF_MIN_MS),
            backoff_max: Duration::from_millis(BACKOFF_MAX_MS),
        }
    }
}

/// Why the connected loop ended.
enum Leave {
    Lost,
    Reconnect,
    Shutdown,
}

/// Handle to the worker task. Dropping it tears the transport down; prefer
/// [`Transport::shutdown`] when you can await the clean exit.
pub struct Transport {
    cmd_tx: mpsc::Sender<TransportCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    closing: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl Transport {
    /// Spawn the background worker. It starts dialing immediately and
    /// keeps the connection alive until shutdown.
    pub fn spawn(cfg: TransportConfig, store: Arc<SignalStore>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<TransportCommand>(16);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let closing = Arc::new(AtomicBool::new(false));

        let worker_closing = closing.clone();
        let join = tokio::spawn(async move {
            transport_worker(cfg, store, cmd_rx, state_tx, worker_closing).await
        });

        Self {
            cmd_tx,
            state_rx,
            closing,
            join: Some(join),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Live view of the connection state for badge display.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    // Keep caller-side simple (no .await); best-effort send.
    pub fn reconnect(&self) {
        let _ = self.cmd_tx.try_send(TransportCommand::Reconnect);
    }

    /// Clean stop: flag first so the close caused by the shutdown itself
    /// cannot schedule a reconnect, then wait for the worker to exit.
    pub async fn shutdown(mut self) {
        self.closing.store(true, Ordering::SeqCst);
        let _ = self.cmd_tx.send(TransportCommand::Shutdown).await;
        if let Some(handle) = self.join.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        let _ = self.cmd_tx.try_send(TransportCommand::Shutdown);
        if let Some(handle) = self.join.take() {
            handle.abort();
        }
    }
}

async fn transport_worker(
    cfg: TransportConfig,
    store: Arc<SignalStore>,
    mut cmd_rx: mpsc::Receiver<TransportCommand>,
    state_tx: watch::Sender<ConnectionState>,
    closing: Arc<AtomicBool>,
) {
    'outer: loop {
        if closing.load(Ordering::SeqCst) {
            break;
        }

        let _ = state_tx.send(ConnectionState::Connecting);
        debug!("dialing {}:{}", cfg.host, cfg.port);

        let attempt = tokio::select! {
            r = TcpStream::connect((cfg.host.as_str(), cfg.port)) => r,
            cmd = cmd_rx.recv() => match cmd {
                // already dialing, start the attempt over
                Some(TransportCommand::Reconnect) => continue 'outer,
                Some(TransportCommand::Shutdown) | None => break 'outer,
            },
        };

        match attempt {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                let _ = state_tx.send(ConnectionState::Connected);
                info!("connected to {}:{}", cfg.host, cfg.port);

                let leave = run_connection(&cfg, &store, stream, &mut cmd_rx).await;

                // never wake up after a reconnect showing ghost levels
                store.reset_to_neutral();
                let _ = state_tx.send(ConnectionState::Disconnected);

                match leave {
                    Leave::Shutdown => break 'outer,
                    Leave::Reconnect => continue 'outer,
                    Leave::Lost => {}
                }
            }
            Err(e) => {
                warn!("connect to {}:{} failed: {}", cfg.host, cfg.port, e);
                let _ = state_tx.send(ConnectionState::Disconnected);
            }
        }

        if closing.load(Ordering::SeqCst) {
            break;
        }

        // constant bounded retry with jitter; the endpoint is local and
        // failures are transient, so exponential growth buys nothing
        let span_ms = cfg.backoff_max.as_millis().max(cfg.backoff_min.as_millis()) as u64;
        let wait = Duration::from_millis(
            rand::rng().random_range(cfg.backoff_min.as_millis() as u64..=span_ms),
        );
        debug!("reconnect in {:?}", wait);
        tokio::select! {
            _ = sleep(wait) => {}
            cmd = cmd_rx.recv() => match cmd {
                Some(TransportCommand::Reconnect) => {}
                Some(TransportCommand::Shutdown) | None => break 'outer,
            },
        }
    }

    let _ = state_tx.send(ConnectionState::Disconnected);
    info!("transport worker stopped");
}

/// Service one live connection until it dies, the watchdog bites, or a
/// command ends it. Every inbound line re-arms the watchdog; decoded
/// frames land in the store and garbage is dropped where it fell.
async fn run_connection(
    cfg: &TransportConfig,
    store: &SignalStore,
    stream: TcpStream,
    cmd_rx: &mut mpsc::Receiver<TransportCommand>,
) -> Leave {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let poll_line = format!("{}\n", cfg.level_command);
    let mut poll = interval(cfg.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_rx = Instant::now();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    last_rx = Instant::now();
                    match wire::decode_line(&line) {
                        Some(InboundFrame::Level { left, right }) => {
                            store.accept_level(left, right);
                        }
                        Some(InboundFrame::Spectrum { left, right }) => {
                            store.accept_spectrum(left, right);
                        }
                        None => {}
                    }
                }
                Ok(None) => {
                    info!("stream closed by peer");
                    return Leave::Lost;
                }
                Err(e) => {
                    warn!("stream read error: {}", e);
                    return Leave::Lost;
                }
            },
            _ = sleep_until(last_rx + cfg.watchdog) => {
                warn!(
                    "watchdog: nothing received for {:?}, forcing reconnect",
                    cfg.watchdog
                );
                return Leave::Lost;
            }
            _ = poll.tick() => {
                // only the gauge source wants polling; push producers feed
                // us unprompted
                if store.mode() == MeterMode::Gauge {
                    // bounded: a peer that quits reading would otherwise
                    // park this loop and starve the watchdog arm
                    let write = write_half.write_all(poll_line.as_bytes());
                    match timeout(Duration::from_millis(POLL_WRITE_TIMEOUT_MS), write).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!("poll write failed: {}", e);
                            return Leave::Lost;
                        }
                        Err(_) => {
                            warn!("poll write stalled, forcing reconnect");
                            return Leave::Lost;
                        }
                    }
                }
            }
            cmd = cmd_rx.recv() => match cmd {
                Some(TransportCommand::Reconnect) => {
                    info!("manual reconnect requested");
                    return Leave::Reconnect;
                }
                Some(TransportCommand::Shutdown) | None => return Leave::Shutdown,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{SignalStore, DEFAULT_SILENCE_SECS, NEUTRAL_DB};
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    fn test_cfg(port: u16, watchdog_ms: u64) -> TransportConfig {
        TransportConfig {
            host: "127.0.0.1".to_string(),
            port,
            level_command: "getLevels".to_string(),
            watchdog: Duration::from_millis(watchdog_ms),
            poll_interval: Duration::from_millis(50),
            backoff_min: Duration::from_millis(80),
            backoff_max: Duration::from_millis(120),
        }
    }

    #[tokio::test]
    async fn watchdog_forces_exactly_one_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepts = Arc::new(AtomicUsize::new(0));

        let server_accepts = accepts.clone();
        tokio::spawn(async move {
            // first connection stays mute so the watchdog bites
            let (first, _) = listener.accept().await.unwrap();
            server_accepts.fetch_add(1, Ordering::SeqCst);
            // second connection keeps talking, so no further cycles
            let (mut second, _) = listener.accept().await.unwrap();
            server_accepts.fetch_add(1, Ordering::SeqCst);
            drop(first);
            loop {
                if second.write_all(b"[-10.0, -12.0]\n").await.is_err() {
                    break;
                }
                sleep(Duration::from_millis(40)).await;
            }
        });

        // bars mode: no polling, the first socket really is silent
        let store = Arc::new(SignalStore::new(MeterMode::Bars, DEFAULT_SILENCE_SECS));
        let transport = Transport::spawn(test_cfg(port, 200), store.clone());

        sleep(Duration::from_millis(900)).await;
        assert_eq!(
            accepts.load(Ordering::SeqCst),
            2,
            "stalled stream should cause exactly one reconnect"
        );
        assert_eq!(store.snapshot().left_db, -10.0);
        assert_eq!(transport.state(), ConnectionState::Connected);
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn gauge_mode_polls_with_the_level_command() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            let (r, mut w) = sock.into_split();
            let mut lines = BufReader::new(r).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            assert_eq!(line, "getLevels");
            w.write_all(b"{\"getLevels\":{\"result\":\"Ok\",\"value\":[-6.2,-3.1]}}\n")
                .await
                .unwrap();
            // keep the socket open while the client digests the reply
            sleep(Duration::from_secs(2)).await;
        });

        let store = Arc::new(SignalStore::new(MeterMode::Gauge, DEFAULT_SILENCE_SECS));
        let transport = Transport::spawn(test_cfg(port, 1000), store.clone());

        sleep(Duration::from_millis(300)).await;
        let snap = store.snapshot();
        assert_eq!(snap.left_db, -6.2);
        assert_eq!(snap.right_db, -3.1);
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn manual_reconnect_cycles_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepts = Arc::new(AtomicUsize::new(0));

        let server_accepts = accepts.clone();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                server_accepts.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    loop {
                        if sock.write_all(b"[-3.0, -3.0]\n").await.is_err() {
                            break;
                        }
                        sleep(Duration::from_millis(30)).await;
                    }
                });
            }
        });

        let store = Arc::new(SignalStore::new(MeterMode::Bars, DEFAULT_SILENCE_SECS));
        let transport = Transport::spawn(test_cfg(port, 1000), store.clone());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(accepts.load(Ordering::SeqCst), 1);

        transport.reconnect();
        sleep(Duration::from_millis(400)).await;
        assert_eq!(
            accepts.load(Ordering::SeqCst),
            2,
            "manual reconnect should cycle the connection once"
        );
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn stalled_poll_write_forces_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepts = Arc::new(AtomicUsize::new(0));

        let server_accepts = accepts.clone();
        tokio::spawn(async move {
            let mut parked = Vec::new();
            loop {
                let (sock, _) = listener.accept().await.unwrap();
                server_accepts.fetch_add(1, Ordering::SeqCst);
                // hold the socket open but never read from it
                parked.push(sock);
            }
        });

        // watchdog far out so only the write bound can trip; one poll
        // line big enough to overrun both socket buffers in one write
        let mut cfg = test_cfg(port, 10_000);
        cfg.level_command = "g".repeat(16 * 1024 * 1024);

        let store = Arc::new(SignalStore::new(MeterMode::Gauge, DEFAULT_SILENCE_SECS));
        let transport = Transport::spawn(cfg, store.clone());

        sleep(Duration::from_millis(1300)).await;
        assert!(
            accepts.load(Ordering::SeqCst) >= 2,
            "a wedged poll write should cycle the connection"
        );
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_is_prompt_and_resets_the_store() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            loop {
                if sock.write_all(b"[-5.0, -7.0]\n").await.is_err() {
                    break;
                }
                sleep(Duration::from_millis(30)).await;
            }
        });

        let store = Arc::new(SignalStore::new(MeterMode::Bars, DEFAULT_SILENCE_SECS));
        let transport = Transport::spawn(test_cfg(port, 1000), store.clone());
        let mut state_rx = transport.subscribe_state();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.state(), ConnectionState::Connected);
        assert_eq!(store.snapshot().left_db, -5.0);

        timeout(Duration::from_secs(1), transport.shutdown())
            .await
            .expect("shutdown should not hang");

        assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Disconnected);
        assert_eq!(store.snapshot().left_db, NEUTRAL_DB);
    }
}
