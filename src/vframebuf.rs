/*
 *  vframebuf.rs
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::PixelColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// A runtime-sized framebuffer for embedded-graphics.
/// The renderer paints into one of these; the host blits it out, and the
/// tests probe it with `pixel_at`/`count_where`.
#[derive(Debug, Clone)]
pub struct VarFrameBuf<C: PixelColor> {
    buf: Vec<C>,
    w: usize,
    h: usize,
}

impl<C: PixelColor + Clone> VarFrameBuf<C> {
    pub fn new(width: u32, height: u32, fill: C) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![fill; w * h], w, h }
    }

    pub fn width(&self) -> usize { self.w }
    pub fn height(&self) -> usize { self.h }

    /// Mutable raw access (useful for pushing regions to the surface)
    pub fn as_mut_slice(&mut self) -> &mut [C] { &mut self.buf }

    /// Immutable raw access
    pub fn as_slice(&self) -> &[C] { &self.buf }

    /// Clear to a color
    pub fn clear_color(&mut self, color: C) {
        self.buf.fill(color);
    }

    /// Pixel value at (x,y); None when out of bounds.
    pub fn pixel_at(&self, x: i32, y: i32) -> Option<C> {
        self.idx(Point::new(x, y)).map(|i| self.buf[i].clone())
    }

    /// Count pixels matching `pred`. Test instrumentation.
    pub fn count_where<F>(&self, pred: F) -> usize
    where
        F: Fn(&C) -> bool,
    {
        self.buf.iter().filter(|c| pred(c)).count()
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }
}

impl<C: PixelColor> OriginDimensions for VarFrameBuf<C> {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl<C: PixelColor + Clone> DrawTarget for VarFrameBuf<C> {
    type Color = C;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.clear_color(color);
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        // row-major walk of the area; the color iterator is consumed for
        // clipped pixels too so on-screen pixels stay aligned
        let Size { width, height } = area.size;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let mut it = colors.into_iter();
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                let Some(c) = it.next() else {
                    return Ok(());
                };
                let p = Point::new(area.top_left.x + col, area.top_left.y + row);
                if let Some(i) = self.idx(p) {
                    self.buf[i] = c;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::Rgb888;
    use embedded_graphics::primitives::PrimitiveStyle;

    #[test]
    fn new_fb_is_filled() {
        let fb = VarFrameBuf::new(8, 4, Rgb888::new(0, 0, 0));
        assert_eq!(fb.width(), 8);
        assert_eq!(fb.height(), 4);
        assert_eq!(fb.count_where(|c| *c == Rgb888::new(0, 0, 0)), 32);
    }

    #[test]
    fn draw_and_probe() {
        let mut fb = VarFrameBuf::new(16, 16, Rgb888::new(0, 0, 0));
        Rectangle::new(Point::new(2, 3), Size::new(4, 2))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::new(255, 0, 0)))
            .draw(&mut fb)
            .unwrap();
        assert_eq!(fb.pixel_at(2, 3), Some(Rgb888::new(255, 0, 0)));
        assert_eq!(fb.pixel_at(5, 4), Some(Rgb888::new(255, 0, 0)));
        assert_eq!(fb.pixel_at(6, 3), Some(Rgb888::new(0, 0, 0)));
        assert_eq!(fb.count_where(|c| *c == Rgb888::new(255, 0, 0)), 8);
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut fb = VarFrameBuf::new(4, 4, Rgb888::new(0, 0, 0));
        fb.draw_iter([Pixel(Point::new(-1, 0), Rgb888::new(1, 2, 3)),
                      Pixel(Point::new(9, 9), Rgb888::new(1, 2, 3))])
            .unwrap();
        assert_eq!(fb.count_where(|c| *c != Rgb888::new(0, 0, 0)), 0);
        assert_eq!(fb.pixel_at(9, 9), None);
    }
}
