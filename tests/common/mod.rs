//! Shared test utilities

use std::io::Cursor;

use image::{Rgb, RgbImage};

/// Encode a solid-color frame as PNG bytes
#[must_use]
pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode_png(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Encode a frame with a contrasting block painted over a solid background
#[must_use]
pub fn block_png(
    width: u32,
    height: u32,
    background: [u8; 3],
    block: (u32, u32, u32, u32),
    color: [u8; 3],
) -> Vec<u8> {
    let mut img = RgbImage::from_pixel(width, height, Rgb(background));
    let (left, top, right, bottom) = block;
    for y in top..bottom {
        for x in left..right {
            img.put_pixel(x, y, Rgb(color));
        }
    }
    encode_png(img)
}

fn encode_png(img: RgbImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("png encoding should not fail");
    buffer.into_inner()
}
