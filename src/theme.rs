/*
 *  theme.rs
 *
 *  MeterBridge - needle in the red
 *	(c) 2020-25 Stuart Hunter
 *
 *	Skin registry and gradient resolver
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

use embedded_graphics::pixelcolor::Rgb888;

use crate::signal::{SignalSnapshot, NEUTRAL_DB};

/// The palettes we ship. A closed set: an unknown name in the config maps
/// to [`Skin::Classic`], never to a missing-palette state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Skin {
    /// Green into yellow into red, the canonical analyzer ladder.
    #[default]
    Classic,
    /// Deep blue through cyan.
    Ocean,
    /// Embers, dark red through amber.
    Ember,
    /// Grayscale, for displays where color distracts.
    Mono,
    /// Gradient derived at resolve time from a host-supplied base color.
    Dynamic,
}

impl Skin {
    pub const ALL: [Skin; 5] = [
        Skin::Classic,
        Skin::Ocean,
        Skin::Ember,
        Skin::Mono,
        Skin::Dynamic,
    ];

    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "ocean" => Skin::Ocean,
            "ember" => Skin::Ember,
            "mono" => Skin::Mono,
            "dynamic" => Skin::Dynamic,
            _ => Skin::Classic,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Skin::Classic => "classic",
            Skin::Ocean => "ocean",
            Skin::Ember => "ember",
            Skin::Mono => "mono",
            Skin::Dynamic => "dynamic",
        }
    }

    /// Next skin in presentation order, wrapping.
    pub fn cycled(self) -> Self {
        let i = Skin::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Skin::ALL[(i + 1) % Skin::ALL.len()]
    }

    fn stops(self) -> (Rgb888, Rgb888, Rgb888) {
        match self {
            Skin::Classic => (
                Rgb888::new(0, 160, 60),
                Rgb888::new(230, 200, 0),
                Rgb888::new(220, 40, 40),
            ),
            Skin::Ocean => (
                Rgb888::new(10, 40, 120),
                Rgb888::new(0, 150, 200),
                Rgb888::new(170, 240, 255),
            ),
            Skin::Ember => (
                Rgb888::new(110, 20, 10),
                Rgb888::new(220, 110, 20),
                Rgb888::new(255, 210, 90),
            ),
            Skin::Mono => (
                Rgb888::new(70, 70, 70),
                Rgb888::new(150, 150, 150),
                Rgb888::new(235, 235, 235),
            ),
            // Dynamic has no fixed stops; resolve() derives or falls back
            Skin::Dynamic => Skin::Classic.stops(),
        }
    }
}

/// Three-stop vertical gradient, bottom of the bar to its top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gradient {
    pub bottom: Rgb888,
    pub mid: Rgb888,
    pub top: Rgb888,
}

impl Gradient {
    /// Sample the gradient at `t` in [0, 1], 0 = bottom stop, 1 = top stop.
    pub fn at(&self, t: f32) -> Rgb888 {
        let t = t.clamp(0.0, 1.0);
        if t <= 0.5 {
            lerp_rgb(self.bottom, self.mid, t * 2.0)
        } else {
            lerp_rgb(self.mid, self.top, (t - 0.5) * 2.0)
        }
    }
}

/// Everything the renderer needs to know about presentation for one frame.
#[derive(Debug, Clone, Copy)]
pub struct ThemeParams {
    pub skin: Skin,
    pub gradient: Gradient,
    /// Two independent half-width panels when set, one combined panel when
    /// clear.
    pub asymmetric: bool,
    /// Renderer stops consulting the store; the feed keeps running.
    pub frozen: bool,
}

/// Turn a skin selection plus layout flags into concrete draw parameters.
/// `base` feeds the dynamic skin; without it the dynamic skin quietly uses
/// the default palette instead.
pub fn resolve(skin: Skin, base: Option<Rgb888>, asymmetric: bool, frozen: bool) -> ThemeParams {
    let gradient = match (skin, base) {
        (Skin::Dynamic, Some(c)) => Gradient {
            bottom: c,
            mid: lighten(c, 0.45),
            top: lighten(c, 0.80),
        },
        _ => {
            let (bottom, mid, top) = skin.stops();
            Gradient { bottom, mid, top }
        }
    };
    ThemeParams {
        skin,
        gradient,
        asymmetric,
        frozen,
    }
}

/// Base color for the dynamic skin, taken from whatever the program is
/// doing right now. Cool and blue near the floor, hot and red near 0 dB.
/// Returns `None` when the snapshot shows no program at all, which lets
/// [`resolve`] fall back to the fixed palette instead of painting a
/// meaningless tint over silence.
pub fn reactive_base(snap: &SignalSnapshot) -> Option<Rgb888> {
    let band_peak = snap
        .spectrum_left
        .iter()
        .chain(snap.spectrum_right.iter())
        .fold(f32::MIN, |a, &b| a.max(b));
    let peak = snap.left_db.max(snap.right_db).max(band_peak);
    if peak <= NEUTRAL_DB {
        return None;
    }
    let t = ((peak - NEUTRAL_DB) / (3.0 - NEUTRAL_DB)).clamp(0.0, 1.0);
    Some(Rgb888::new(
        (40.0 + 180.0 * t) as u8,
        (200.0 - 140.0 * t) as u8,
        (230.0 - 200.0 * t) as u8,
    ))
}

/// Push a color toward white by `amt` in [0, 1].
pub fn lighten(c: Rgb888, amt: f32) -> Rgb888 {
    use embedded_graphics::prelude::RgbColor;
    let amt = amt.clamp(0.0, 1.0);
    let ch = |v: u8| v as f32 + (255.0 - v as f32) * amt;
    Rgb888::new(ch(c.r()) as u8, ch(c.g()) as u8, ch(c.b()) as u8)
}

fn lerp_rgb(a: Rgb888, b: Rgb888, t: f32) -> Rgb888 {
    use embedded_graphics::prelude::RgbColor;
    let ch = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t) as u8;
    Rgb888::new(ch(a.r(), b.r()), ch(a.g(), b.g()), ch(a.b(), b.b()))
}
