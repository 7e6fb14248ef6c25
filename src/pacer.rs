/*
 *  pacer.rs
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
use std::time::{Duration, Instant};

pub struct Pacer {
    next_deadline: Instant,
    frame: Duration,
}

// A local terminal keeps 60fps easily; over ssh the blit can cost tens of
// ms, so the auto variant backs the rate off from measured cost.
impl Pacer {
    pub fn new(target_fps: u32) -> Self {
        let frame = Duration::from_micros((1_000_000u32 / target_fps.max(1)) as u64);
        Self {
            next_deadline: Instant::now(),
            frame,
        }
    }

    #[inline]
    pub fn set_fps(&mut self, fps: u32) {
        self.frame = Duration::from_micros((1_000_000u32 / fps.max(1)) as u64);
    }

    /// Returns true if a frame is due; if true, the next deadline is also
    /// scheduled. Deadlines advance by whole frames so one slow frame does
    /// not push the entire schedule late; after a long stall we resync to
    /// now instead of bursting to catch up.
    #[inline]
    pub fn should_flush(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next_deadline {
            self.next_deadline += self.frame;
            if self.next_deadline < now {
                self.next_deadline = now + self.frame;
            }
            true
        } else {
            false
        }
    }
}

pub struct AutoPacer {
    pacer: Pacer,
    ema_ms: f32,   // moving avg of blit time
    alpha: f32,    // smoothing (0.1 ~ 0.3)
    headroom: f32, // >1.0 to avoid saturation (e.g. 1.25)
    max_fps: u32,  // user cap
    min_fps: u32,  // floor, keeps the needle animating even on slow links
    fps: u32,
}

impl AutoPacer {
    pub fn new(initial_fps: u32, max_fps: u32, min_fps: u32) -> Self {
        // a cap under the floor must not invert the clamp range below
        let min_fps = min_fps.min(max_fps);
        Self {
            pacer: Pacer::new(initial_fps),
            ema_ms: 0.0,
            alpha: 0.2,
            headroom: 1.25,
            max_fps,
            min_fps,
            fps: initial_fps,
        }
    }

    pub fn should_flush(&mut self) -> bool {
        self.pacer.should_flush()
    }

    /// Rate the pacer is actually running at, for the status line.
    pub fn effective_fps(&self) -> u32 {
        self.fps
    }

    /// Call immediately after pushing a frame to the terminal.
    pub fn record_flush_ms(&mut self, flush_ms: f32) {
        self.ema_ms = if self.ema_ms == 0.0 {
            flush_ms
        } else {
            self.alpha * flush_ms + (1.0 - self.alpha) * self.ema_ms
        };
        if self.ema_ms > 0.0 {
            let safe_fps = (1000.0 / (self.ema_ms * self.headroom))
                .clamp(self.min_fps as f32, self.max_fps as f32) as u32;
            self.fps = safe_fps;
            self.pacer.set_fps(safe_fps);
        }
    }
}
