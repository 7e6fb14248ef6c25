/*
 *  render/mod.rs
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
//! The per-frame paint path. The host owns the clock: it calls
//! [`Renderer::tick`] at its frame rate with the latest store snapshot and
//! the resolved theme, and the renderer does everything else. No I/O and
//! no store access happen here, which keeps the whole paint path testable
//! against an offscreen framebuffer.

pub mod bars;
pub mod gauge;

use embedded_graphics::{
    geometry::{Point, Size},
    mono_font::{ascii::FONT_5X8, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::Rectangle,
    text::Text,
};

use crate::signal::{MeterMode, SignalSnapshot};
use crate::smoothing::{db_to_angle, Needle};
use crate::theme::ThemeParams;

pub const BACKGROUND: Rgb888 = Rgb888::new(8, 8, 12);
const LABEL_INK: Rgb888 = Rgb888::new(140, 140, 140);
const CENTER_GAP: u32 = 8;

pub struct Renderer {
    sweep_deg: f32,
    needle_left: Needle,
    needle_right: Needle,
    bars_left: bars::BarPanel,
    bars_right: bars::BarPanel,
    /// Last snapshot consulted while unfrozen; frozen frames repaint this.
    held: Option<SignalSnapshot>,
}

impl Renderer {
    pub fn new(sweep_deg: f32, k_spring: f32, damping: f32) -> Self {
        Self {
            sweep_deg,
            needle_left: Needle::with_params(sweep_deg, k_spring, damping),
            needle_right: Needle::with_params(sweep_deg, k_spring, damping),
            bars_left: bars::BarPanel::new(),
            bars_right: bars::BarPanel::new(),
            held: None,
        }
    }

    /// Smoothed angles, mostly for instrumentation.
    pub fn needle_angles(&self) -> (f32, f32) {
        (self.needle_left.angle_deg, self.needle_right.angle_deg)
    }

    /// One cooperative frame: pick the view (live or held), step the
    /// needles, paint. Never blocks and never fails on stale data; a stale
    /// snapshot just gets painted again.
    pub fn tick<D>(
        &mut self,
        latest: &SignalSnapshot,
        theme: &ThemeParams,
        target: &mut D,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888> + OriginDimensions,
    {
        let snap: SignalSnapshot = if theme.frozen {
            self.held.clone().unwrap_or_else(|| latest.clone())
        } else {
            self.held = Some(latest.clone());
            latest.clone()
        };

        target.clear(BACKGROUND)?;
        let full = Rectangle::new(Point::zero(), target.size());

        match snap.mode {
            MeterMode::Gauge => {
                let target_l = db_to_angle(snap.left_db, self.sweep_deg);
                let target_r = db_to_angle(snap.right_db, self.sweep_deg);
                self.needle_left.step(target_l);
                self.needle_right.step(target_r);

                let left = gauge::NeedleDraw {
                    angle_deg: self.needle_left.angle_deg,
                    db: snap.left_db,
                    color: gauge::NEEDLE_LEFT_INK,
                };
                let right = gauge::NeedleDraw {
                    angle_deg: self.needle_right.angle_deg,
                    db: snap.right_db,
                    color: gauge::NEEDLE_RIGHT_INK,
                };

                if theme.asymmetric {
                    let (lp, rp) = split_panels(full);
                    gauge::draw_dial(target, lp, self.sweep_deg, &[left])?;
                    gauge::draw_dial(target, rp, self.sweep_deg, &[right])?;
                    draw_channel_labels(target, lp, rp)?;
                } else {
                    gauge::draw_dial(target, full, self.sweep_deg, &[left, right])?;
                }
            }
            MeterMode::Bars => {
                if theme.asymmetric {
                    let (lp, rp) = split_panels(full);
                    self.bars_left
                        .draw(target, lp, &snap.spectrum_left, &theme.gradient)?;
                    self.bars_right
                        .draw(target, rp, &snap.spectrum_right, &theme.gradient)?;
                    draw_channel_labels(target, lp, rp)?;
                } else {
                    // combined panel runs off the left (or aliased mono) channel
                    self.bars_left
                        .draw(target, full, &snap.spectrum_left, &theme.gradient)?;
                }
            }
        }
        Ok(())
    }
}

fn split_panels(full: Rectangle) -> (Rectangle, Rectangle) {
    let Size { width, height } = full.size;
    let half_w = width.saturating_sub(CENTER_GAP) / 2;
    let left = Rectangle::new(full.top_left, Size::new(half_w, height));
    let right = Rectangle::new(
        Point::new(
            full.top_left.x + (half_w + CENTER_GAP) as i32,
            full.top_left.y,
        ),
        Size::new(half_w, height),
    );
    (left, right)
}

fn draw_channel_labels<D>(target: &mut D, left: Rectangle, right: Rectangle) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let style = MonoTextStyle::new(&FONT_5X8, LABEL_INK);
    Text::new(
        "L",
        Point::new(left.top_left.x + 2, left.top_left.y + 8),
        style,
    )
    .draw(target)?;
    Text::new(
        "R",
        Point::new(right.top_left.x + 2, right.top_left.y + 8),
        style,
    )
    .draw(target)?;
    Ok(())
}
