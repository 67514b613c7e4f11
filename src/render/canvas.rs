use embedded_graphics::{
    pixelcolor::Rgb888,
    prelude::{DrawTarget, OriginDimensions, RgbColor, Size},
    Pixel,
};
use image::{Rgba, RgbaImage};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// RGBA raster that embedded-graphics primitives and text can be drawn onto
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// Allocate a canvas filled with opaque white
    pub fn white(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, WHITE),
        }
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb888) {
        // Out-of-bounds pixels are clipped
        if x < 0 || y < 0 || x as u32 >= self.image.width() || y as u32 >= self.image.height() {
            return;
        }
        self.image
            .put_pixel(x as u32, y as u32, Rgba([color.r(), color.g(), color.b(), 255]));
    }

    /// Blend black over the pixel at (`x`, `y`) with `coverage` (0..=255)
    pub fn darken(&mut self, x: i32, y: i32, coverage: u8) {
        if x < 0 || y < 0 || x as u32 >= self.image.width() || y as u32 >= self.image.height() {
            return;
        }
        let keep = u16::from(255 - coverage);
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        for channel in &mut pixel.0[..3] {
            *channel = (u16::from(*channel) * keep / 255) as u8;
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            self.set_pixel(coord.x, coord.y, color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::prelude::Point;

    #[test]
    fn test_white_fill() {
        let image = Canvas::white(4, 3).into_image();
        assert_eq!(image.dimensions(), (4, 3));
        assert!(image.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn test_draw_clips_outside_pixels() {
        let mut canvas = Canvas::white(2, 2);
        canvas
            .draw_iter([
                Pixel(Point::new(1, 1), Rgb888::BLACK),
                Pixel(Point::new(-1, 0), Rgb888::BLACK),
                Pixel(Point::new(5, 5), Rgb888::BLACK),
            ])
            .unwrap();

        let image = canvas.into_image();
        assert_eq!(*image.get_pixel(1, 1), Rgba([0, 0, 0, 255]));
        assert_eq!(*image.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn test_darken_blends_coverage() {
        let mut canvas = Canvas::white(3, 1);
        canvas.darken(0, 0, 255);
        canvas.darken(1, 0, 51);
        canvas.darken(7, 0, 255);

        let image = canvas.into_image();
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*image.get_pixel(1, 0), Rgba([204, 204, 204, 255]));
        assert_eq!(*image.get_pixel(2, 0), WHITE);
    }
}
