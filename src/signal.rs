/*
 *  signal.rs
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
//! Latest-sample store shared between the transport task and the render
//! loop. Holds exactly one level pair and one spectrum frame; every
//! accepted sample replaces the previous one wholesale. Nothing here
//! survives a restart and nothing is ever written to disk.

use std::sync::Mutex;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::wire::BAND_COUNT;

/// Lower bound of the stored dB domain for both meters.
pub const STORE_FLOOR_DB: f32 = -100.0;

/// Neutral level shown before the first sample lands.
pub const NEUTRAL_DB: f32 = -60.0;

/// Seconds of at-floor program before the UI flags no signal.
pub const DEFAULT_SILENCE_SECS: f32 = 5.0;

/// Which meter face is live. The mode decides the clamp ceiling: the VU
/// scale runs into the red up to +3, the bar graph tops out at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeterMode {
    #[default]
    Gauge,
    Bars,
}

impl MeterMode {
    pub fn ceiling_db(self) -> f32 {
        match self {
            MeterMode::Gauge => 3.0,
            MeterMode::Bars => 0.0,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            MeterMode::Gauge => MeterMode::Bars,
            MeterMode::Bars => MeterMode::Gauge,
        }
    }

    /// Lenient config parse, unknown names fall back to the dial.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "bars" | "rta" | "spectrum" => MeterMode::Bars,
            _ => MeterMode::Gauge,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MeterMode::Gauge => "gauge",
            MeterMode::Bars => "bars",
        }
    }
}

/// Read-only copy handed to the renderer each frame so drawing never
/// holds the store lock.
#[derive(Debug, Clone)]
pub struct SignalSnapshot {
    pub left_db: f32,
    pub right_db: f32,
    /// Arrival stamp of the level pair currently held; store creation
    /// time until the first sample lands.
    pub level_received_at: Instant,
    pub spectrum_left: [f32; BAND_COUNT],
    pub spectrum_right: [f32; BAND_COUNT],
    pub spectrum_received_at: Instant,
    pub mode: MeterMode,
    pub silence_secs: f32,
}

struct StoreInner {
    left_db: f32,
    right_db: f32,
    level_received_at: Instant,
    spectrum_left: [f32; BAND_COUNT],
    spectrum_right: [f32; BAND_COUNT],
    spectrum_received_at: Instant,
    last_non_silent: Instant,
    mode: MeterMode,
}

impl StoreInner {
    fn neutral(mode: MeterMode) -> Self {
        let now = Instant::now();
        Self {
            left_db: NEUTRAL_DB,
            right_db: NEUTRAL_DB,
            level_received_at: now,
            spectrum_left: [STORE_FLOOR_DB; BAND_COUNT],
            spectrum_right: [STORE_FLOOR_DB; BAND_COUNT],
            spectrum_received_at: now,
            last_non_silent: now,
            mode,
        }
    }
}

pub struct SignalStore {
    inner: Mutex<StoreInner>,
    silence_secs: f32,
    level_tx: watch::Sender<(f32, f32)>,
    level_rx: watch::Receiver<(f32, f32)>,
}

impl SignalStore {
    pub fn new(mode: MeterMode, silence_secs: f32) -> Self {
        let (level_tx, level_rx) = watch::channel((NEUTRAL_DB, NEUTRAL_DB));
        Self {
            inner: Mutex::new(StoreInner::neutral(mode)),
            silence_secs,
            level_tx,
            level_rx,
        }
    }

    /// Accept a decoded level pair: clamp to the active mode's domain,
    /// update the silence tracker in the same critical section, and fan
    /// the clamped pair out to level listeners.
    pub fn accept_level(&self, left: f32, right: f32) {
        let clamped = {
            let mut s = self.inner.lock().unwrap();
            let ceil = s.mode.ceiling_db();
            let l = left.clamp(STORE_FLOOR_DB, ceil);
            let r = right.clamp(STORE_FLOOR_DB, ceil);
            let now = Instant::now();
            s.left_db = l;
            s.right_db = r;
            s.level_received_at = now;
            if l > STORE_FLOOR_DB || r > STORE_FLOOR_DB {
                s.last_non_silent = now;
            }
            (l, r)
        };
        let _ = self.level_tx.send(clamped);
    }

    /// Accept a spectrum frame verbatim. Decay and peak-hold are the
    /// renderer's business, not the store's. Band energy above the floor
    /// counts as program material for the silence tracker.
    pub fn accept_spectrum(&self, left: [f32; BAND_COUNT], right: [f32; BAND_COUNT]) {
        let mut s = self.inner.lock().unwrap();
        let live = left
            .iter()
            .chain(right.iter())
            .any(|&db| db > STORE_FLOOR_DB);
        let now = Instant::now();
        s.spectrum_left = left;
        s.spectrum_right = right;
        s.spectrum_received_at = now;
        if live {
            s.last_non_silent = now;
        }
    }

    /// Back to the mount-time defaults. Called when the transport drops
    /// so a reconnected meter does not wake up showing ghost levels.
    pub fn reset_to_neutral(&self) {
        let mode = {
            let mut s = self.inner.lock().unwrap();
            let mode = s.mode;
            *s = StoreInner::neutral(mode);
            mode
        };
        let _ = self.level_tx.send((NEUTRAL_DB, NEUTRAL_DB));
        log::debug!("signal store reset to neutral ({})", mode.name());
    }

    pub fn mode(&self) -> MeterMode {
        self.inner.lock().unwrap().mode
    }

    pub fn set_mode(&self, mode: MeterMode) {
        self.inner.lock().unwrap().mode = mode;
    }

    pub fn snapshot(&self) -> SignalSnapshot {
        let s = self.inner.lock().unwrap();
        SignalSnapshot {
            left_db: s.left_db,
            right_db: s.right_db,
            level_received_at: s.level_received_at,
            spectrum_left: s.spectrum_left,
            spectrum_right: s.spectrum_right,
            spectrum_received_at: s.spectrum_received_at,
            mode: s.mode,
            silence_secs: s.last_non_silent.elapsed().as_secs_f32(),
        }
    }

    /// Seconds since the last sample that carried actual program.
    pub fn silence_seconds(&self) -> f32 {
        self.inner
            .lock()
            .unwrap()
            .last_non_silent
            .elapsed()
            .as_secs_f32()
    }

    /// Transport is (or was) alive but the program has been at the floor
    /// past the configured threshold.
    pub fn no_signal(&self) -> bool {
        self.silence_seconds() >= self.silence_secs
    }

    /// Live view of the clamped level pair, for mirroring the meter into
    /// other surfaces without polling the store.
    pub fn subscribe_levels(&self) -> watch::Receiver<(f32, f32)> {
        self.level_rx.clone()
    }
}
