use crate::image::{separable_filter, GrayFloatImage};

/// Odd Sobel aperture sizes.
///
/// Apertures are usually picked by an abstract level, where level 0, 1 and
/// 2 stand for 3, 5 and 7.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ApertureSize {
    Three,
    Five,
    Seven,
}

impl ApertureSize {
    /// Map an aperture level to its size. Levels above 2 clamp to 7.
    pub fn from_level(level: u32) -> Self {
        match level {
            0 => ApertureSize::Three,
            1 => ApertureSize::Five,
            _ => ApertureSize::Seven,
        }
    }

    /// The nearest valid aperture for an arbitrary size.
    ///
    /// Even sizes round up to the next odd member.
    pub fn from_size(size: u32) -> Self {
        match size {
            0..=3 => ApertureSize::Three,
            4 | 5 => ApertureSize::Five,
            _ => ApertureSize::Seven,
        }
    }

    pub fn size(self) -> usize {
        match self {
            ApertureSize::Three => 3,
            ApertureSize::Five => 5,
            ApertureSize::Seven => 7,
        }
    }
}

impl Default for ApertureSize {
    fn default() -> Self {
        ApertureSize::Three
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum FilterOrder {
    Main,
    Off,
}

fn convolve_full(a: &[f32], b: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

fn binomial(order: usize) -> Vec<f32> {
    (0..order).fold(vec![1.0], |acc, _| convolve_full(&acc, &[1.0, 1.0]))
}

/// Sobel kernels are a binomial smoother on the off axis and a smoothed
/// central difference on the main axis. Neither is normalized.
fn compute_sobel_kernel(aperture: ApertureSize, order: FilterOrder) -> Vec<f32> {
    let ksize = aperture.size();
    match order {
        FilterOrder::Main => convolve_full(&binomial(ksize - 2), &[-1.0, 1.0]),
        FilterOrder::Off => binomial(ksize - 1),
    }
}

/// Compute the Sobel derivative horizontally.
///
/// # Arguments
/// * `image` - the input image.
/// * `aperture` - the size of the Sobel kernel.
///
/// # Return value
/// Output image derivative (an image.)
pub fn sobel_horizontal(image: &GrayFloatImage, aperture: ApertureSize) -> GrayFloatImage {
    let main_kernel = compute_sobel_kernel(aperture, FilterOrder::Main);
    let off_kernel = compute_sobel_kernel(aperture, FilterOrder::Off);
    separable_filter(image, &main_kernel, &off_kernel)
}

/// Compute the Sobel derivative vertically.
///
/// # Arguments
/// * `image` - the input image.
/// * `aperture` - the size of the Sobel kernel.
///
/// # Return value
/// Output image derivative (an image.)
pub fn sobel_vertical(image: &GrayFloatImage, aperture: ApertureSize) -> GrayFloatImage {
    let main_kernel = compute_sobel_kernel(aperture, FilterOrder::Main);
    let off_kernel = compute_sobel_kernel(aperture, FilterOrder::Off);
    separable_filter(image, &off_kernel, &main_kernel)
}

/// Plain central differences, used where a keypoint's gradient is sampled
/// directly rather than as part of a smoothed field.
pub fn central_difference_horizontal(image: &GrayFloatImage) -> GrayFloatImage {
    separable_filter(image, &[-0.5, 0., 0.5], &[1.])
}

pub fn central_difference_vertical(image: &GrayFloatImage) -> GrayFloatImage {
    separable_filter(image, &[1.], &[-0.5, 0., 0.5])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn sobel_kernels_match_known_values() {
        assert_eq!(
            compute_sobel_kernel(ApertureSize::Three, FilterOrder::Main),
            vec![-1., 0., 1.]
        );
        assert_eq!(
            compute_sobel_kernel(ApertureSize::Three, FilterOrder::Off),
            vec![1., 2., 1.]
        );
        assert_eq!(
            compute_sobel_kernel(ApertureSize::Five, FilterOrder::Main),
            vec![-1., -2., 0., 2., 1.]
        );
        assert_eq!(
            compute_sobel_kernel(ApertureSize::Seven, FilterOrder::Main),
            vec![-1., -4., -5., 0., 5., 4., 1.]
        );
        assert_eq!(
            compute_sobel_kernel(ApertureSize::Seven, FilterOrder::Off),
            vec![1., 6., 15., 20., 15., 6., 1.]
        );
    }

    #[test]
    fn aperture_levels_and_sizes_clamp() {
        assert_eq!(ApertureSize::from_level(0).size(), 3);
        assert_eq!(ApertureSize::from_level(1).size(), 5);
        assert_eq!(ApertureSize::from_level(2).size(), 7);
        assert_eq!(ApertureSize::from_level(3).size(), 7);
        assert_eq!(ApertureSize::from_size(1).size(), 3);
        assert_eq!(ApertureSize::from_size(4).size(), 5);
        assert_eq!(ApertureSize::from_size(6).size(), 7);
        assert_eq!(ApertureSize::from_size(31).size(), 7);
    }

    #[test]
    fn horizontal_ramp_has_constant_gradient() {
        let ramp = GrayFloatImage::from_luma8(&GrayImage::from_fn(12, 8, |x, _| {
            Luma([(x * 10) as u8])
        }));
        let dx = sobel_horizontal(&ramp, ApertureSize::Three);
        let dy = sobel_vertical(&ramp, ApertureSize::Three);
        // Interior: (-1, 0, 1) gives 20 per row, weighted by 1 + 2 + 1.
        assert!((dx.get(5, 4) - 80.0).abs() < 1e-3);
        assert!(dy.get(5, 4).abs() < 1e-3);
        // Mirrored borders cancel the difference across the edge.
        assert!(dx.get(0, 4).abs() < 1e-3);
        assert!(dx.get(11, 0).abs() < 1e-3);
    }
}
