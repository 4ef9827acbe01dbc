//! Basic image enhancement on color images.

use crate::image::{box_blur, gaussian_blur, GrayFloatImage};
use crate::Error;
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::map::map_subpixels;
use log::*;
use std::str::FromStr;

pub const DEFAULT_BRIGHTNESS: i32 = 50;
pub const DEFAULT_CONTRAST_PERCENT: i32 = 150;
pub const DEFAULT_KERNEL_SIZE: i32 = 5;

/// Largest accepted smoothing kernel.
pub const MAX_KERNEL_SIZE: usize = 31;

/// The kind of enhancement, without its amount.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnhanceKind {
    Gray,
    Brightness,
    Contrast,
    Average,
    Gauss,
}

impl FromStr for EnhanceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gray" | "rgb2gray" => Ok(EnhanceKind::Gray),
            "brightness" => Ok(EnhanceKind::Brightness),
            "contrast" => Ok(EnhanceKind::Contrast),
            "avg" | "average" => Ok(EnhanceKind::Average),
            "gauss" | "gaussian" => Ok(EnhanceKind::Gauss),
            _ => Err(Error::UnknownEnhancement(s.to_owned())),
        }
    }
}

/// One enhancement with its amount.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Enhancement {
    /// Luma conversion.
    Gray,
    /// Add a constant to every channel, saturating.
    Brightness(i32),
    /// Multiply every channel by a gain, saturating.
    Contrast(f32),
    /// Mean filter with a square odd kernel.
    Average(usize),
    /// Gaussian filter with a square odd kernel.
    Gauss(usize),
}

impl Enhancement {
    /// Build an enhancement from its kind and an integer amount.
    ///
    /// Contrast amounts are percent. Kernel sizes are made odd and at
    /// least 1. A missing amount uses the default for the kind.
    pub fn new(kind: EnhanceKind, value: Option<i32>) -> Self {
        match kind {
            EnhanceKind::Gray => Enhancement::Gray,
            EnhanceKind::Brightness => {
                Enhancement::Brightness(value.unwrap_or(DEFAULT_BRIGHTNESS).clamp(-255, 255))
            }
            EnhanceKind::Contrast => {
                let percent = value.unwrap_or(DEFAULT_CONTRAST_PERCENT).clamp(0, 300);
                Enhancement::Contrast(percent as f32 / 100.0)
            }
            EnhanceKind::Average => {
                Enhancement::Average(odd_kernel_size(value.unwrap_or(DEFAULT_KERNEL_SIZE)))
            }
            EnhanceKind::Gauss => {
                Enhancement::Gauss(odd_kernel_size(value.unwrap_or(DEFAULT_KERNEL_SIZE)))
            }
        }
    }

    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        debug!("Applying {:?}", self);
        match *self {
            Enhancement::Gray => DynamicImage::ImageLuma8(image.to_luma8()),
            Enhancement::Brightness(offset) => {
                DynamicImage::ImageRgb8(image::imageops::brighten(&image.to_rgb8(), offset))
            }
            Enhancement::Contrast(gain) => DynamicImage::ImageRgb8(map_subpixels(
                &image.to_rgb8(),
                |value: u8| (f32::from(value) * gain).round().clamp(0.0, 255.0) as u8,
            )),
            Enhancement::Average(kernel_size) => DynamicImage::ImageRgb8(filter_channels(
                &image.to_rgb8(),
                |channel| box_blur(channel, kernel_size),
            )),
            Enhancement::Gauss(kernel_size) => DynamicImage::ImageRgb8(filter_channels(
                &image.to_rgb8(),
                |channel| gaussian_blur(channel, kernel_size),
            )),
        }
    }
}

/// Even sizes grow by one, sizes below one become one.
pub fn odd_kernel_size(value: i32) -> usize {
    let value = value.max(1) as usize;
    let odd = if value % 2 == 0 { value + 1 } else { value };
    odd.min(MAX_KERNEL_SIZE)
}

/// Run a float filter over each channel of an RGB image.
fn filter_channels(
    image: &RgbImage,
    filter: impl Fn(&GrayFloatImage) -> GrayFloatImage,
) -> RgbImage {
    let (width, height) = image.dimensions();
    let channels: Vec<GrayImage> = (0..3)
        .map(|c| {
            let channel =
                GrayImage::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y)[c]]));
            filter(&GrayFloatImage::from_luma8(&channel)).to_luma8()
        })
        .collect();
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            channels[0].get_pixel(x, y)[0],
            channels[1].get_pixel(x, y)[0],
            channels[2].get_pixel(x, y)[0],
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn rgb(width: u32, height: u32, pixel: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(pixel)))
    }

    #[test]
    fn kinds_parse() {
        assert_eq!("gray".parse::<EnhanceKind>().unwrap(), EnhanceKind::Gray);
        assert_eq!("avg".parse::<EnhanceKind>().unwrap(), EnhanceKind::Average);
        assert!(matches!(
            "sharpen".parse::<EnhanceKind>(),
            Err(Error::UnknownEnhancement(name)) if name == "sharpen"
        ));
    }

    #[test]
    fn kernel_sizes_are_odd_and_positive() {
        assert_eq!(odd_kernel_size(-4), 1);
        assert_eq!(odd_kernel_size(0), 1);
        assert_eq!(odd_kernel_size(4), 5);
        assert_eq!(odd_kernel_size(7), 7);
        assert_eq!(odd_kernel_size(100), MAX_KERNEL_SIZE);
    }

    #[test]
    fn brightness_and_contrast_saturate() {
        let image = rgb(4, 4, [10, 100, 230]);
        let brighter = Enhancement::new(EnhanceKind::Brightness, None).apply(&image);
        assert_eq!(brighter.to_rgb8().get_pixel(1, 1), &Rgb([60, 150, 255]));
        let contrast = Enhancement::new(EnhanceKind::Contrast, None).apply(&image);
        assert_eq!(contrast.to_rgb8().get_pixel(2, 3), &Rgb([15, 150, 255]));
    }

    #[test]
    fn blurs_keep_flat_color() {
        let image = rgb(12, 9, [40, 80, 120]);
        for kind in [EnhanceKind::Average, EnhanceKind::Gauss] {
            let out = Enhancement::new(kind, Some(6)).apply(&image).to_rgb8();
            assert!(out.pixels().all(|p| *p == Rgb([40, 80, 120])));
        }
    }

    #[test]
    fn gray_has_one_channel() {
        let out = Enhancement::Gray.apply(&rgb(3, 3, [50, 50, 50]));
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        assert_eq!(out.to_luma8().get_pixel(0, 0)[0], 50);
    }
}
