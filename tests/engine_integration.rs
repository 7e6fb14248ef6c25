/*
 *  tests/engine_integration.rs
 *
 *  End-to-end checks: producer lines over a loopback socket, through the
 *  transport and the signal store, out to painted frames.
 *
 *  MeterBridge - needle in the red
 *  (c) 2020-25 Stuart Hunter
 */

use std::sync::Arc;
use std::time::Duration;

use embedded_graphics::pixelcolor::Rgb888;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::time::sleep;

use meterbridge::render::{self, bars, gauge, Renderer};
use meterbridge::signal::{MeterMode, SignalStore, NEUTRAL_DB};
use meterbridge::theme::{self, Skin};
use meterbridge::transport::{Transport, TransportConfig};
use meterbridge::vframebuf::VarFrameBuf;
use meterbridge::wire::BAND_COUNT;

const SWEEP: f32 = 92.0;

fn local_cfg(port: u16) -> TransportConfig {
    TransportConfig {
        host: "127.0.0.1".to_string(),
        port,
        level_command: "getLevels".to_string(),
        watchdog: Duration::from_millis(1000),
        poll_interval: Duration::from_millis(50),
        backoff_min: Duration::from_millis(80),
        backoff_max: Duration::from_millis(120),
    }
}

/// Spawn a producer that repeats one line forever.
async fn repeating_producer(line: String) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let (mut sock, _) = listener.accept().await.unwrap();
            let line = line.clone();
            tokio::spawn(async move {
                loop {
                    if sock.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    sleep(Duration::from_millis(30)).await;
                }
            });
        }
    });
    port
}

fn lit_pixels(frame: &VarFrameBuf<Rgb888>) -> usize {
    frame.count_where(|c| *c != render::BACKGROUND)
}

#[tokio::test]
async fn levels_travel_from_socket_to_needle_angles() {
    let port = repeating_producer("[-6.2, -3.1]\n".to_string()).await;
    let store = Arc::new(SignalStore::new(MeterMode::Gauge, 5.0));
    let transport = Transport::spawn(local_cfg(port), store.clone());

    sleep(Duration::from_millis(300)).await;
    let snap = store.snapshot();
    assert_eq!(snap.left_db, -6.2);
    assert_eq!(snap.right_db, -3.1);

    let mut renderer = Renderer::new(SWEEP, 0.15, 0.75);
    let mut frame = VarFrameBuf::new(160, 120, render::BACKGROUND);
    let params = theme::resolve(Skin::Classic, None, false, false);

    let (rest_left, _) = renderer.needle_angles();
    for _ in 0..150 {
        renderer.tick(&snap, &params, &mut frame).unwrap();
    }
    let (left, right) = renderer.needle_angles();
    assert!(left > rest_left, "needle should swing up from rest");
    assert!(right > left, "the hotter channel should sit higher");
    assert!(lit_pixels(&frame) > 0, "dial and needles should be painted");

    transport.shutdown().await;
}

#[tokio::test]
async fn overdriven_levels_clamp_at_the_stops() {
    let port = repeating_producer("[-65.0, 4.5]\n".to_string()).await;
    let store = Arc::new(SignalStore::new(MeterMode::Gauge, 5.0));
    let transport = Transport::spawn(local_cfg(port), store.clone());

    sleep(Duration::from_millis(300)).await;
    let snap = store.snapshot();
    // below the visual floor is kept, above the ceiling is not
    assert_eq!(snap.left_db, -65.0);
    assert_eq!(snap.right_db, 3.0);
    assert_eq!(gauge::readout(snap.left_db), "-∞");
    assert_eq!(gauge::readout(snap.right_db), "3.0");

    let mut renderer = Renderer::new(SWEEP, 0.15, 0.75);
    let mut frame = VarFrameBuf::new(160, 120, render::BACKGROUND);
    let params = theme::resolve(Skin::Classic, None, false, false);
    for _ in 0..250 {
        renderer.tick(&snap, &params, &mut frame).unwrap();
    }
    let (left, right) = renderer.needle_angles();
    assert!(
        (left + SWEEP / 2.0).abs() < 2.0,
        "sub-floor level parks the needle at the left stop, got {}",
        left
    );
    assert!(
        (right - SWEEP / 2.0).abs() < 2.0,
        "clipped level parks the needle at the right stop, got {}",
        right
    );

    transport.shutdown().await;
}

#[tokio::test]
async fn spectrum_lines_raise_the_bars() {
    let mut bands = vec!["-100".to_string(); BAND_COUNT];
    bands[15] = "-20".to_string();
    let line = format!("{{\"type\":\"rta\",\"data\":[{}]}}\n", bands.join(","));
    let port = repeating_producer(line).await;

    let store = Arc::new(SignalStore::new(MeterMode::Bars, 5.0));
    let transport = Transport::spawn(local_cfg(port), store.clone());

    sleep(Duration::from_millis(300)).await;
    let snap = store.snapshot();
    assert_eq!(snap.spectrum_left[15], -20.0);
    assert_eq!(snap.spectrum_right[15], -20.0);

    // height curve sanity at the points the feed exercises
    assert_eq!(bars::bar_height(0.0, 100), 100);
    assert_eq!(bars::bar_height(-100.0, 100), 0);
    let h = bars::bar_height(-20.0, 100);
    assert!((70..=80).contains(&h), "got {}", h);

    let params = theme::resolve(Skin::Classic, None, false, false);
    let mut live = Renderer::new(SWEEP, 0.15, 0.75);
    let mut live_frame = VarFrameBuf::new(160, 120, render::BACKGROUND);
    live.tick(&snap, &params, &mut live_frame).unwrap();

    let idle_snap = SignalStore::new(MeterMode::Bars, 5.0).snapshot();
    let mut idle = Renderer::new(SWEEP, 0.15, 0.75);
    let mut idle_frame = VarFrameBuf::new(160, 120, render::BACKGROUND);
    idle.tick(&idle_snap, &params, &mut idle_frame).unwrap();

    assert!(
        lit_pixels(&live_frame) > lit_pixels(&idle_frame),
        "a hot band should add ink over the idle analyzer"
    );

    transport.shutdown().await;
}

#[tokio::test]
async fn noise_on_the_stream_never_corrupts_the_meters() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        loop {
            let burst = b"not json at all\n[1.0]\n{\"type\":\"rta\",\"data\":[1,2]}\n[-8.0, -9.0]\n";
            if sock.write_all(burst).await.is_err() {
                break;
            }
            sleep(Duration::from_millis(30)).await;
        }
    });

    let store = Arc::new(SignalStore::new(MeterMode::Gauge, 5.0));
    let transport = Transport::spawn(local_cfg(port), store.clone());

    sleep(Duration::from_millis(300)).await;
    let snap = store.snapshot();
    assert_eq!(snap.left_db, -8.0);
    assert_eq!(snap.right_db, -9.0);

    // a clean teardown parks the meters at neutral
    transport.shutdown().await;
    let snap = store.snapshot();
    assert_eq!(snap.left_db, NEUTRAL_DB);
    assert_eq!(snap.right_db, NEUTRAL_DB);
}
