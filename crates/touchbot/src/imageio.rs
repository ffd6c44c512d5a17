//! Bridges between `image` buffers and the core grayscale types.

use std::path::Path;

use crate::core::{GrayImage, GrayImageView, RasterSize};
use crate::rectify::{Rectification, RectifyError};

#[derive(thiserror::Error, Debug)]
pub enum ImageIoError {
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
    #[error(transparent)]
    Rectify(#[from] RectifyError),
    #[error("buffer of {len} bytes does not fit {width}x{height}")]
    BufferSize { width: u32, height: u32, len: usize },
}

pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn raster_size(img: &::image::GrayImage) -> RasterSize {
    RasterSize::new(img.width(), img.height())
}

pub fn into_image(gray: GrayImage) -> Result<::image::GrayImage, ImageIoError> {
    let (width, height) = (gray.width as u32, gray.height as u32);
    let len = gray.data.len();
    ::image::GrayImage::from_raw(width, height, gray.data).ok_or(ImageIoError::BufferSize {
        width,
        height,
        len,
    })
}

/// Decode any supported image file and convert it to 8-bit luma.
pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, ImageIoError> {
    Ok(::image::open(path)?.to_luma8())
}

/// Render the rectified view of `frame`.
pub fn rectify_image(
    frame: &::image::GrayImage,
    rectification: &Rectification,
) -> Result<::image::GrayImage, ImageIoError> {
    let warped = rectification.warp_gray(&gray_view(frame))?;
    into_image(warped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Homography;

    #[test]
    fn half_pixel_shift_preserves_content() {
        let frame = ::image::GrayImage::from_fn(8, 6, |x, y| ::image::Luma([(x * 20 + y) as u8]));
        // pixel centres land on integer sample positions
        let rect = Rectification::new(Homography::translation(0.5, 0.5), raster_size(&frame));
        let out = rectify_image(&frame, &rect).unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.as_raw(), frame.as_raw());
    }

    #[test]
    fn buffer_mismatch_is_reported() {
        let gray = GrayImage {
            width: 4,
            height: 4,
            data: vec![0; 3],
        };
        assert!(matches!(
            into_image(gray),
            Err(ImageIoError::BufferSize { len: 3, .. })
        ));
    }
}
