use derive_more::{Deref, DerefMut};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use log::*;
use ndarray::{Array2, ArrayView2};
use std::f32;
use wide::f32x4;

pub type GrayImageBuffer = ImageBuffer<Luma<f32>, Vec<f32>>;

/// The float image type used by every numeric stage of this crate.
///
/// Unlike a unit-range float image, intensities stay on the 8-bit scale
/// (0 to 255). Gradients, tensor products and corner responses are then
/// directly comparable with what the same filters produce on the source
/// image, and thresholds given on the 0-255 scale need no conversion.
///
/// The image crate is still used for loading, saving and the 8-bit
/// grayscale conversion.
#[derive(Debug, Clone, Deref, DerefMut)]
pub struct GrayFloatImage(pub GrayImageBuffer);

impl GrayFloatImage {
    /// Create a float image from an 8-bit grayscale image.
    pub fn from_luma8(gray: &GrayImage) -> Self {
        trace!("Converting a {} x {} 8-bit image", gray.width(), gray.height());
        Self(ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([f32::from(gray[(x, y)][0])])
        }))
    }

    /// Create a float image from any image the image crate can decode.
    ///
    /// Color images are converted with the image crate's luma weights first.
    pub fn from_dynamic(input_image: &DynamicImage) -> Self {
        Self::from_luma8(&input_image.to_luma8())
    }

    pub fn from_array2(arr: Array2<f32>) -> Self {
        let (height, width) = arr.dim();
        let raw = if arr.is_standard_layout() {
            arr.into_raw_vec()
        } else {
            arr.iter().copied().collect()
        };
        Self(
            ImageBuffer::from_raw(width as u32, height as u32, raw)
                .expect("raw vector didn't have enough pixels for the image"),
        )
    }

    /// View the pixels as a `(height, width)` array.
    pub fn ref_array2(&self) -> ArrayView2<f32> {
        ArrayView2::from_shape((self.height(), self.width()), self.0.as_raw().as_slice())
            .expect("image buffer length matches its dimensions")
    }

    pub fn width(&self) -> usize {
        self.0.width() as usize
    }

    pub fn height(&self) -> usize {
        self.0.height() as usize
    }

    /// True when the image has no pixels at all.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.get_pixel(x as u32, y as u32)[0]
    }

    /// Combine two same-sized images pixel by pixel.
    pub fn zip_map(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> Self {
        debug_assert_eq!(self.dimensions(), other.dimensions());
        let raw = self
            .as_raw()
            .iter()
            .zip(other.as_raw().iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        Self(
            GrayImageBuffer::from_raw(self.0.width(), self.0.height(), raw)
                .expect("zipped images have the same dimensions"),
        )
    }

    /// Smallest and largest pixel values, `None` for an empty image.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut values = self.as_raw().iter().copied();
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Round back to 8 bits, saturating at 0 and 255.
    pub fn to_luma8(&self) -> GrayImage {
        ImageBuffer::from_fn(self.0.width(), self.0.height(), |x, y| {
            Luma([self.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// A 1d kernel split into SIMD lanes, padded with zeros.
struct SimdKernel {
    lanes: Vec<f32x4>,
    len: usize,
    window: usize,
}

impl SimdKernel {
    fn new(kernel: &[f32]) -> Self {
        debug_assert!(kernel.len() % 2 == 1, "kernel size must be odd");
        let lanes = kernel
            .chunks(4)
            .map(|chunk| {
                let mut data = [0f32; 4];
                data[..chunk.len()].copy_from_slice(chunk);
                f32x4::new(data)
            })
            .collect::<Vec<_>>();
        Self {
            window: lanes.len() * 4,
            lanes,
            len: kernel.len(),
        }
    }

    /// Correlate one line of samples with the kernel.
    ///
    /// Samples beyond either end mirror the line without repeating the end
    /// sample.
    fn apply(&self, line: &[f32], scratch: &mut Vec<f32>, out: &mut [f32]) {
        if line.is_empty() {
            return;
        }
        let half = self.len / 2;
        scratch.clear();
        scratch.extend(
            (0..line.len() + 2 * half)
                .map(|i| line[reflect_101(i as isize - half as isize, line.len())]),
        );
        // Zero tail so the final window covers the padded lanes.
        scratch.resize(line.len() + self.window - 1, 0.0);
        for (window, output) in scratch.windows(self.window).zip(out.iter_mut()) {
            *output = window
                .chunks_exact(4)
                .map(|chunk| f32x4::new([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .zip(self.lanes.iter())
                .fold(f32x4::splat(0.), |acc, (a, b)| a.mul_add(*b, acc))
                .reduce_add();
        }
    }
}

/// Map an index outside `0..len` back inside by mirroring, `dcb|abcd|cba`.
fn reflect_101(index: isize, len: usize) -> usize {
    if len < 2 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let folded = index.rem_euclid(period);
    if folded < len as isize {
        folded as usize
    } else {
        (period - folded) as usize
    }
}

pub fn horizontal_filter(image: &GrayFloatImage, kernel: &[f32]) -> GrayFloatImage {
    if image.is_empty() {
        return image.clone();
    }
    let width = image.width();
    let kernel = SimdKernel::new(kernel);
    let mut output = vec![0f32; width * image.height()];
    let mut scratch = Vec::with_capacity(width + kernel.window);
    for (row_in, row_out) in image
        .as_raw()
        .chunks_exact(width)
        .zip(output.chunks_exact_mut(width))
    {
        kernel.apply(row_in, &mut scratch, row_out);
    }
    GrayFloatImage(
        GrayImageBuffer::from_raw(width as u32, image.height() as u32, output)
            .expect("filtered rows cover the whole image"),
    )
}

pub fn vertical_filter(image: &GrayFloatImage, kernel: &[f32]) -> GrayFloatImage {
    if image.is_empty() {
        return image.clone();
    }
    let width = image.width();
    let height = image.height();
    let kernel = SimdKernel::new(kernel);
    let input = image.as_raw();
    let mut output = vec![0f32; width * height];
    let mut column = vec![0f32; height];
    let mut filtered = vec![0f32; height];
    let mut scratch = Vec::with_capacity(height + kernel.window);
    for x in 0..width {
        for (y, sample) in column.iter_mut().enumerate() {
            *sample = input[y * width + x];
        }
        kernel.apply(&column, &mut scratch, &mut filtered);
        for (y, &value) in filtered.iter().enumerate() {
            output[y * width + x] = value;
        }
    }
    GrayFloatImage(
        GrayImageBuffer::from_raw(width as u32, height as u32, output)
            .expect("filtered columns cover the whole image"),
    )
}

pub fn separable_filter(
    image: &GrayFloatImage,
    h_kernel: &[f32],
    v_kernel: &[f32],
) -> GrayFloatImage {
    let h = horizontal_filter(image, h_kernel);
    vertical_filter(&h, v_kernel)
}

/// The Gaussian function.
///
/// # Arguments
/// * `x` - the offset.
/// * `r` - sigma.
/// # Return value
/// The kernel value at x.
fn gaussian(x: f32, r: f32) -> f32 {
    ((2.0 * f32::consts::PI).sqrt() * r).recip() * (-x.powi(2) / (2.0 * r.powi(2))).exp()
}

/// Generate a normalized Gaussian kernel.
///
/// # Arguments
/// * `r` - sigma.
/// * `kernel_size` - The size of the kernel.
/// # Return value
/// The kernel (a vector).
pub fn gaussian_kernel(r: f32, kernel_size: usize) -> Vec<f32> {
    assert!(kernel_size % 2 == 1, "kernel_size must be odd");
    let mut kernel = vec![0f32; kernel_size];
    let half_width = (kernel_size / 2) as i32;
    let mut sum = 0f32;
    for i in -half_width..=half_width {
        let val = gaussian(i as f32, r);
        kernel[(i + half_width) as usize] = val;
        sum += val;
    }
    for val in kernel.iter_mut() {
        *val /= sum;
    }
    kernel
}

/// Sigma implied by a kernel size when no sigma is given.
pub fn sigma_for_kernel_size(kernel_size: usize) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian kernel for a size alone.
///
/// Sizes up to 7 use the fixed binomial kernels, larger sizes sample a
/// Gaussian with [`sigma_for_kernel_size`].
pub fn gaussian_kernel_for_size(kernel_size: usize) -> Vec<f32> {
    match kernel_size {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![
            0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
        ],
        _ => gaussian_kernel(sigma_for_kernel_size(kernel_size), kernel_size),
    }
}

/// Perform a square Gaussian blur with an odd kernel size.
///
/// # Arguments
/// * `image` - the input image.
/// * `kernel_size` - side of the square kernel, must be odd.
/// # Return value
/// The resulting image after the filter was applied.
pub fn gaussian_blur(image: &GrayFloatImage, kernel_size: usize) -> GrayFloatImage {
    let kernel = gaussian_kernel_for_size(kernel_size);
    separable_filter(image, &kernel, &kernel)
}

/// Perform a square mean filter with an odd kernel size.
pub fn box_blur(image: &GrayFloatImage, kernel_size: usize) -> GrayFloatImage {
    assert!(kernel_size % 2 == 1, "kernel_size must be odd");
    let kernel = vec![(kernel_size as f32).recip(); kernel_size];
    separable_filter(image, &kernel, &kernel)
}
