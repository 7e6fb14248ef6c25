/*
 *  render/bars.rs
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
//! 31-band spectrum panel: power-law bar heights on a log frequency axis,
//! gradient fill, peak caps with hold/decay, mirrored reflection.

use std::time::{Duration, Instant};

use embedded_graphics::{
    geometry::{Point, Size},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
};

use crate::theme::{lighten, Gradient};
use crate::wire::BAND_COUNT;

/// Canonical third-octave centers, 20 Hz to 20 kHz.
pub const BAND_CENTERS_HZ: [f32; BAND_COUNT] = [
    20.0, 25.0, 31.5, 40.0, 50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0,
    500.0, 630.0, 800.0, 1000.0, 1250.0, 1600.0, 2000.0, 2500.0, 3150.0, 4000.0, 5000.0, 6300.0,
    8000.0, 10000.0, 12500.0, 16000.0, 20000.0,
];

// For bar display (different from gauge mapping)
const BAR_FLOOR_DB: f32 = -100.0;
const BAR_CEIL_DB: f32 = 0.0;
const POWER_EXP: f32 = 1.2;

const BAND_FMIN_HZ: f32 = 20.0;
const BAND_FSPAN: f32 = 1000.0; // fmax / fmin over the 31 bands

const PEAK_DECAY_RATE: f32 = 0.05;
const PEAK_HOLD_DURATION: Duration = Duration::from_millis(800);
const REFLECT_DIM: f32 = 0.30;

/// Bar height in pixels: linear normalization over the bar domain, then a
/// perceptual power-law lift so quiet program still registers.
#[inline]
pub fn bar_height(db: f32, panel_h: u32) -> u32 {
    let x = ((db - BAR_FLOOR_DB) / (BAR_CEIL_DB - BAR_FLOOR_DB)).clamp(0.0, 1.0);
    (x.powf(POWER_EXP) * panel_h as f32).round() as u32
}

/// Left edge of band `idx` inside a panel `panel_w` wide: log-spaced so each
/// octave gets equal width, with the last band flush to the right edge.
#[inline]
pub fn band_x(idx: usize, panel_w: u32, bar_w: u32) -> i32 {
    let span = panel_w.saturating_sub(bar_w) as f32;
    let t = (BAND_CENTERS_HZ[idx] / BAND_FMIN_HZ).ln() / BAND_FSPAN.ln();
    (span * t).round() as i32
}

#[derive(Debug, Clone, Copy)]
struct BandPeak {
    norm: f32,
    set_at: Instant,
}

/// One channel's worth of spectrum panel, with per-band peak state.
pub struct BarPanel {
    peaks: [BandPeak; BAND_COUNT],
}

impl BarPanel {
    pub fn new() -> Self {
        Self {
            peaks: [BandPeak {
                norm: 0.0,
                set_at: Instant::now(),
            }; BAND_COUNT],
        }
    }

    /// Paint one spectrum frame into `panel`. The top three quarters hold
    /// the bars; the strip below the baseline holds the dimmed reflection.
    pub fn draw<D>(
        &mut self,
        target: &mut D,
        panel: Rectangle,
        bands: &[f32; BAND_COUNT],
        grad: &Gradient,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let Size { width, height } = panel.size;
        if width < BAND_COUNT as u32 || height < 8 {
            return Ok(());
        }

        let bar_area_h = (height * 3) / 4;
        let reflect_area_h = height - bar_area_h;
        let baseline_y = panel.top_left.y + bar_area_h as i32;
        let bar_w = (width / BAND_COUNT as u32).saturating_sub(1).max(1);
        let cap_ink = lighten(grad.top, 0.25);
        let now = Instant::now();

        for (i, &db) in bands.iter().enumerate() {
            let h = bar_height(db, bar_area_h);
            let norm = h as f32 / bar_area_h.max(1) as f32;

            let pk = &mut self.peaks[i];
            if norm >= pk.norm {
                pk.norm = norm;
                pk.set_at = now;
            } else if now.duration_since(pk.set_at) > PEAK_HOLD_DURATION {
                pk.norm = (pk.norm - PEAK_DECAY_RATE).max(norm);
            }

            let x = panel.top_left.x + band_x(i, width, bar_w);

            // bar, row by row: the gradient tracks absolute level so a short
            // bar only ever shows the low stops
            for row in 0..h {
                let y = baseline_y - 1 - row as i32;
                let color = grad.at(row as f32 / bar_area_h as f32);
                Rectangle::new(Point::new(x, y), Size::new(bar_w, 1))
                    .into_styled(PrimitiveStyle::with_fill(color))
                    .draw(target)?;
            }

            // reflection
            let refl_h = (h / 3).min(reflect_area_h);
            for row in 0..refl_h {
                let y = baseline_y + row as i32;
                let color = dim(grad.at(row as f32 / bar_area_h as f32), REFLECT_DIM);
                Rectangle::new(Point::new(x, y), Size::new(bar_w, 1))
                    .into_styled(PrimitiveStyle::with_fill(color))
                    .draw(target)?;
            }

            // peak cap
            let ph = (pk.norm * bar_area_h as f32).round() as i32;
            if ph > 0 {
                let y = baseline_y - 1 - ph;
                Line::new(Point::new(x, y), Point::new(x + bar_w as i32 - 1, y))
                    .into_styled(PrimitiveStyle::with_stroke(cap_ink, 1))
                    .draw(target)?;
            }
        }
        Ok(())
    }
}

impl Default for BarPanel {
    fn default() -> Self {
        Self::new()
    }
}

fn dim(c: Rgb888, k: f32) -> Rgb888 {
    Rgb888::new(
        (c.r() as f32 * k) as u8,
        (c.g() as f32 * k) as u8,
        (c.b() as f32 * k) as u8,
    )
}
