/*
 *  render/gauge.rs
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
//! Analog dial: arc + ticks + hot zone, one needle per channel, dB readout
//! under the pivot.

use embedded_graphics::{
    geometry::{Point, Size},
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, Rectangle},
};
use embedded_text::{
    alignment::{HorizontalAlignment, VerticalAlignment},
    style::TextBoxStyleBuilder,
    TextBox,
};

use crate::smoothing::{db_to_angle, GAUGE_FLOOR_DB};
use crate::trig::polar_point;

pub const NEEDLE_LEFT_INK: Rgb888 = Rgb888::new(240, 240, 240);
pub const NEEDLE_RIGHT_INK: Rgb888 = Rgb888::new(255, 170, 60);
const SCALE_INK: Rgb888 = Rgb888::new(210, 205, 190);
const HOT_INK: Rgb888 = Rgb888::new(225, 50, 40);

// Reference points on the -60..+3 scale
const DB_MAJOR: [f32; 6] = [-40.0, -20.0, -10.0, -3.0, 0.0, 3.0];
const DB_MINOR: [f32; 9] = [-50.0, -30.0, -15.0, -7.0, -5.0, -2.0, -1.0, 1.0, 2.0];

const READOUT_H: i32 = 12;

/// One needle to paint: smoothed angle plus the raw level for the readout.
#[derive(Debug, Clone, Copy)]
pub struct NeedleDraw {
    pub angle_deg: f32,
    pub db: f32,
    pub color: Rgb888,
}

/// Numeric readout text for a level, below-floor levels show as infinity.
/// The pixel path draws its own glyph for that case; this string form
/// feeds status lines and logs.
pub fn readout(db: f32) -> String {
    if db < GAUGE_FLOOR_DB {
        "-∞".to_string()
    } else {
        format!("{:.1}", db)
    }
}

/// Draw one dial panel: face, ticks, hot zone, needles, readout strip.
pub fn draw_dial<D>(
    target: &mut D,
    panel: Rectangle,
    sweep_deg: f32,
    needles: &[NeedleDraw],
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let origin = panel.top_left;
    let Size { width, height } = panel.size;

    if width < 40 || height < 32 || needles.is_empty() {
        return Ok(()); // too small to draw meaningfully
    }

    // Layout: pivot near the bottom of the face, readout strip below
    let w = width as i32;
    let h = height as i32 - READOUT_H;
    let cx = origin.x + w / 2;
    let cy = origin.y + h - 6;
    let r_arc = h / 2 + h / 6;
    let r_tick = r_arc;
    let r_in_major = r_tick - 8;
    let r_in_minor = r_tick - 4;

    let half = (sweep_deg / 2.0).round() as i32;
    let hot_from = db_to_angle(0.0, sweep_deg);

    // major / hot
    let style0 = PrimitiveStyle::with_stroke(SCALE_INK, 2);
    let style_hot = PrimitiveStyle::with_stroke(HOT_INK, 3);
    // minor
    let style1 = PrimitiveStyle::with_stroke(SCALE_INK, 1);

    // --- Arc: polyline at radius r_arc across the sweep (1 degree steps) ---
    let mut prev: Option<Point> = None;
    for deg in -half..=half {
        let p = polar_point(cx, cy, r_arc, deg as f32);
        if let Some(pp) = prev {
            let style = if (deg as f32) > hot_from {
                style_hot
            } else {
                style1
            };
            Line::new(pp, p).into_styled(style).draw(target)?;
        }
        prev = Some(p);
    }

    // --- Ticks ---
    for &db in &DB_MAJOR {
        let ang = db_to_angle(db, sweep_deg);
        let p_out = polar_point(cx, cy, r_tick, ang);
        let p_in = polar_point(cx, cy, r_in_major, ang);
        let style = if db > 0.0 { style_hot } else { style0 };
        Line::new(p_in, p_out).into_styled(style).draw(target)?;
    }
    for &db in &DB_MINOR {
        let ang = db_to_angle(db, sweep_deg);
        let p_out = polar_point(cx, cy, r_tick, ang);
        let p_in = polar_point(cx, cy, r_in_minor, ang);
        Line::new(p_in, p_out).into_styled(style1).draw(target)?;
    }

    // --- Needles, pivot to just inside the arc ---
    for nd in needles {
        let tip = polar_point(cx, cy, r_arc - 2, nd.angle_deg);
        let style = PrimitiveStyle::with_stroke(nd.color, 2);
        Line::new(Point::new(cx, cy), tip)
            .into_styled(style)
            .draw(target)?;
    }

    // pivot hub
    Circle::with_center(Point::new(cx, cy), 5)
        .into_styled(PrimitiveStyle::with_fill(SCALE_INK))
        .draw(target)?;

    // --- Readout strip, one slot per needle ---
    let slot_w = w / needles.len() as i32;
    for (i, nd) in needles.iter().enumerate() {
        let slot = Rectangle::new(
            Point::new(origin.x + i as i32 * slot_w, origin.y + h),
            Size::new(slot_w as u32, READOUT_H as u32),
        );
        draw_readout(target, slot, nd.db)?;
    }

    Ok(())
}

fn draw_readout<D>(target: &mut D, slot: Rectangle, db: f32) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    if db < GAUGE_FLOOR_DB {
        return draw_infinity(target, slot.center());
    }

    let text = format!("{:.1}", db);
    let text_style = MonoTextStyle::new(&FONT_6X10, SCALE_INK);
    let textbox_style = TextBoxStyleBuilder::new()
        .alignment(HorizontalAlignment::Center)
        .vertical_alignment(VerticalAlignment::Middle)
        .build();
    TextBox::with_textbox_style(&text, slot, text_style, textbox_style).draw(target)?;
    Ok(())
}

/// No infinity glyph in the mono fonts, so lay one down by hand: a minus
/// stroke and two interlocked rings.
fn draw_infinity<D>(target: &mut D, c: Point) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let stroke = PrimitiveStyle::with_stroke(SCALE_INK, 1);
    Line::new(Point::new(c.x - 11, c.y), Point::new(c.x - 7, c.y))
        .into_styled(stroke)
        .draw(target)?;
    Circle::new(Point::new(c.x - 5, c.y - 3), 6)
        .into_styled(stroke)
        .draw(target)?;
    Circle::new(Point::new(c.x - 1, c.y - 3), 6)
        .into_styled(stroke)
        .draw(target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smoothing::DEFAULT_SWEEP_DEG;
    use crate::vframebuf::VarFrameBuf;

    const BG: Rgb888 = Rgb888::new(0, 0, 0);

    fn ink(c: &Rgb888) -> bool {
        *c != BG
    }

    #[test]
    fn readout_strings() {
        assert_eq!(readout(-6.25), "-6.2");
        assert_eq!(readout(0.0), "0.0");
        assert_eq!(readout(-60.0), "-60.0");
        assert_eq!(readout(-60.01), "-∞");
        assert_eq!(readout(-100.0), "-∞");
    }

    #[test]
    fn face_and_hot_zone_paint() {
        let mut fb = VarFrameBuf::<Rgb888>::new(160, 120, BG);
        let panel = Rectangle::new(Point::zero(), Size::new(160, 120));
        let needles = [NeedleDraw {
            angle_deg: 0.0,
            db: -10.0,
            color: NEEDLE_LEFT_INK,
        }];
        draw_dial(&mut fb, panel, DEFAULT_SWEEP_DEG, &needles).unwrap();

        assert!(fb.count_where(ink) > 100);
        assert!(fb.count_where(|c| *c == HOT_INK) > 0, "hot zone missing");
    }

    #[test]
    fn needle_angle_moves_ink_across_the_face() {
        let panel = Rectangle::new(Point::zero(), Size::new(160, 120));
        let half = DEFAULT_SWEEP_DEG / 2.0;

        let left_ink = |angle: f32| {
            let mut fb = VarFrameBuf::<Rgb888>::new(160, 120, BG);
            let needles = [NeedleDraw {
                angle_deg: angle,
                db: -70.0,
                color: NEEDLE_LEFT_INK,
            }];
            draw_dial(&mut fb, panel, DEFAULT_SWEEP_DEG, &needles).unwrap();
            let mut n = 0usize;
            for y in 0..120 {
                for x in 0..80 {
                    if fb.pixel_at(x, y).map(|c| ink(&c)).unwrap_or(false) {
                        n += 1;
                    }
                }
            }
            n
        };

        assert!(
            left_ink(-half) > left_ink(half),
            "needle at the left stop should put more ink in the left half"
        );
    }

    #[test]
    fn tiny_panel_draws_nothing() {
        let mut fb = VarFrameBuf::<Rgb888>::new(30, 20, BG);
        let panel = Rectangle::new(Point::zero(), Size::new(30, 20));
        let needles = [NeedleDraw {
            angle_deg: 0.0,
            db: 0.0,
            color: NEEDLE_LEFT_INK,
        }];
        draw_dial(&mut fb, panel, DEFAULT_SWEEP_DEG, &needles).unwrap();
        assert_eq!(fb.count_where(ink), 0);
    }
}
