use featlab::{KeyPoint, Match};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use imageproc::{drawing, pixelops};
use log::*;
use palette::{FromColor, Hsv, RgbHue, Srgb};
use rusttype::{Font, Scale};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CORNER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const KEYPOINT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Pixel height of the summary text.
pub const TEXT_SCALE: f32 = 24.0;

/// DejaVu Sans Mono, used for the summary when no other font is given.
const BUNDLED_FONT: &[u8] = include_bytes!("../fonts/DejaVuSansMono.ttf");

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Featlab(#[from] featlab::Error),
    #[error("failed to read font {path:?}: {source}")]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0:?} is not a usable TrueType font")]
    FontParse(PathBuf),
    #[error("the bundled font could not be parsed")]
    BundledFont,
    #[error("failed to encode the output image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write the output image to stdout: {0}")]
    Stdout(#[source] std::io::Error),
}

/// Mark single pixel corners with small hollow circles.
pub fn render_corners(image: &DynamicImage, keypoints: &[KeyPoint]) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    for keypoint in keypoints {
        let center = to_i32(keypoint.point, 0);
        for radius in [3, 4] {
            drawing::draw_hollow_circle_mut(&mut canvas, center, radius, CORNER_COLOR);
        }
    }
    canvas
}

/// Mark keypoints with a circle of their size and a line along their angle.
pub fn render_rich_keypoints(image: &DynamicImage, keypoints: &[KeyPoint]) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    for keypoint in keypoints {
        let radius = (keypoint.size * 0.5).round().max(1.0);
        let (x, y) = keypoint.point;
        drawing::draw_hollow_circle_mut(
            &mut canvas,
            to_i32(keypoint.point, 0),
            radius as i32,
            KEYPOINT_COLOR,
        );
        if let Some(angle) = keypoint.angle {
            let end = (x + radius * angle.cos(), y + radius * angle.sin());
            drawing::draw_line_segment_mut(&mut canvas, (x, y), end, KEYPOINT_COLOR);
        }
    }
    canvas
}

/// Place both images side by side and connect matched keypoints.
///
/// Each match gets its own hue so neighbouring lines stay distinguishable.
pub fn render_matches(
    image_a: &DynamicImage,
    keypoints_a: &[KeyPoint],
    image_b: &DynamicImage,
    keypoints_b: &[KeyPoint],
    matches: &[Match],
) -> RgbaImage {
    let rgba_image_a = image_a.to_rgba8();
    let rgba_image_b = image_b.to_rgba8();
    let offset = rgba_image_a.width();
    let canvas_width = offset + rgba_image_b.width();
    let canvas_height = rgba_image_a.height().max(rgba_image_b.height());
    let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, Rgba([0, 0, 0, 255]));
    let mut render_image_onto_canvas_x_offset = |image: &RgbaImage, x_offset: u32| {
        for (x, y, pixel) in image.enumerate_pixels() {
            canvas.put_pixel(x + x_offset, y, *pixel);
        }
    };
    render_image_onto_canvas_x_offset(&rgba_image_a, 0);
    render_image_onto_canvas_x_offset(&rgba_image_b, offset);

    for (ix, m) in matches.iter().enumerate() {
        let (a, b) = match (keypoints_a.get(m.query), keypoints_b.get(m.train)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                warn!("Match {:?} refers to a missing keypoint", m);
                continue;
            }
        };
        let hsv = Hsv::new(RgbHue::from_radians(ix as f64 * 0.1), 1.0, 1.0);
        let rgb = Srgb::from_color(hsv);
        let color = Rgba([
            (rgb.red * 255.0) as u8,
            (rgb.green * 255.0) as u8,
            (rgb.blue * 255.0) as u8,
            255,
        ]);
        let start = to_i32(a.point, 0);
        let end = to_i32(b.point, offset);
        drawing::draw_hollow_circle_mut(&mut canvas, start, 3, color);
        drawing::draw_hollow_circle_mut(&mut canvas, end, 3, color);
        drawing::draw_antialiased_line_segment_mut(
            &mut canvas,
            start,
            end,
            color,
            pixelops::interpolate,
        );
    }
    canvas
}

pub fn load_font(path: impl AsRef<Path>) -> Result<Font<'static>, Error> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| Error::FontRead {
        path: path.to_path_buf(),
        source,
    })?;
    Font::try_from_vec(data).ok_or_else(|| Error::FontParse(path.to_path_buf()))
}

pub fn bundled_font() -> Result<Font<'static>, Error> {
    Font::try_from_bytes(BUNDLED_FONT).ok_or(Error::BundledFont)
}

/// Write a line of text near the top-left corner.
pub fn draw_summary(canvas: &mut RgbaImage, font: &Font, text: &str) {
    drawing::draw_text_mut(
        canvas,
        TEXT_COLOR,
        10,
        10,
        Scale::uniform(TEXT_SCALE),
        font,
        text,
    );
}

/// Save to `path`, or stream a PNG to stdout when there is none.
pub fn write_output(image: &DynamicImage, path: Option<&Path>) -> Result<(), Error> {
    match path {
        Some(path) => {
            featlab::save_image(image, path)?;
            info!("Saved {}", path.display());
        }
        None => {
            let mut png = Cursor::new(Vec::new());
            image.write_to(&mut png, ImageOutputFormat::Png)?;
            let stdout = std::io::stdout();
            let mut stdout = stdout.lock();
            stdout.write_all(png.get_ref()).map_err(Error::Stdout)?;
            stdout.flush().map_err(Error::Stdout)?;
        }
    }
    Ok(())
}

fn to_i32((x, y): (f32, f32), x_offset: u32) -> (i32, i32) {
    (x.round() as i32 + x_offset as i32, y.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gray(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([0])))
    }

    #[test]
    fn corners_are_circled_in_red() {
        let canvas = render_corners(&gray(20, 20), &[KeyPoint::corner(10.0, 10.0, 1.0)]);
        assert_eq!(canvas.get_pixel(13, 10), &CORNER_COLOR);
        assert_eq!(canvas.get_pixel(10, 10), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn rich_keypoints_show_orientation() {
        let keypoint = KeyPoint {
            size: 10.0,
            angle: Some(0.0),
            ..KeyPoint::corner(10.0, 10.0, 1.0)
        };
        let canvas = render_rich_keypoints(&gray(20, 20), &[keypoint]);
        assert_eq!(canvas.get_pixel(12, 10), &KEYPOINT_COLOR);
        assert_eq!(canvas.get_pixel(10, 15), &KEYPOINT_COLOR);
    }

    #[test]
    fn matches_canvas_holds_both_images() {
        let a = gray(30, 20);
        let b = DynamicImage::ImageLuma8(GrayImage::from_pixel(25, 40, Luma([200])));
        let keypoints = [KeyPoint::corner(5.0, 5.0, 1.0)];
        let matches = [Match {
            query: 0,
            train: 0,
            distance: 0.0,
        }];
        let canvas = render_matches(&a, &keypoints, &b, &keypoints, &matches);
        assert_eq!(canvas.dimensions(), (55, 40));
        assert_eq!(canvas.get_pixel(40, 35), &Rgba([200, 200, 200, 255]));
        assert_eq!(canvas.get_pixel(10, 35), &Rgba([0, 0, 0, 255]));
        // The first match is drawn in pure red.
        assert_eq!(canvas.get_pixel(2, 5), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn summary_is_drawn_with_the_bundled_font() {
        let font = bundled_font().unwrap();
        let mut canvas = RgbaImage::from_pixel(120, 40, Rgba([0, 0, 0, 255]));
        draw_summary(&mut canvas, &font, "Harris: 7");
        let green = canvas
            .pixels()
            .filter(|p| p.0[1] > 100 && p.0[0] == 0 && p.0[2] == 0)
            .count();
        assert!(green > 20, "{} text pixels", green);
        assert_eq!(canvas.get_pixel(119, 39), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn missing_font_is_reported() {
        assert!(matches!(
            load_font("/nonexistent/featdraw/font.ttf"),
            Err(Error::FontRead { .. })
        ));
    }
}
