use featdraw::Error;
use featlab::config::{BlobKnobs, HarrisKnobs, MatchKnobs, ScaleSpaceKnobs};
use featlab::enhance::{EnhanceKind, Enhancement};
use featlab::{DescriptorKind, DetectorKind, Pipeline};
use image::{DynamicImage, RgbaImage};
use log::*;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "featdraw",
    about = "A tool to detect, describe and match keypoints and draw the result"
)]
enum Opt {
    /// Harris corners.
    Harris {
        #[structopt(flatten)]
        io: Io,
        #[structopt(flatten)]
        harris: HarrisArgs,
    },
    /// Multi-threshold blobs.
    Blob {
        #[structopt(flatten)]
        io: Io,
        #[structopt(flatten)]
        blob: BlobArgs,
    },
    /// Scale-space keypoints.
    Dog {
        #[structopt(flatten)]
        io: Io,
        #[structopt(flatten)]
        scale_space: ScaleSpaceArgs,
    },
    /// Match keypoints between two images.
    #[structopt(name = "m")]
    Match {
        /// One of harris, blob, dog.
        detector: DetectorKind,
        /// One of sift, lbp.
        descriptor: DescriptorKind,
        #[structopt(flatten)]
        io: Io,
        /// The second image.
        #[structopt(parse(from_os_str))]
        second: PathBuf,
        #[structopt(flatten)]
        harris: HarrisArgs,
        #[structopt(flatten)]
        blob: BlobArgs,
        #[structopt(flatten)]
        scale_space: ScaleSpaceArgs,
        #[structopt(flatten)]
        matching: MatchArgs,
    },
    /// Grayscale, brightness, contrast, average or Gaussian filtering.
    Enhance {
        /// One of gray, brightness, contrast, avg, gauss.
        kind: EnhanceKind,
        #[structopt(flatten)]
        io: Io,
        /// Brightness offset, contrast in percent or kernel size.
        #[structopt(long, allow_hyphen_values = true)]
        value: Option<i32>,
    },
}

#[derive(Debug, StructOpt)]
struct Io {
    /// The image file to process.
    #[structopt(parse(from_os_str))]
    input: PathBuf,
    /// The output path to write to (autodetects image type from extension).
    ///
    /// If this is not provided, then the output goes to stdout as a PNG.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
    /// A TrueType font used to write the keypoint or match count on the image.
    ///
    /// Defaults to the bundled DejaVu Sans Mono.
    #[structopt(long, parse(from_os_str))]
    font: Option<PathBuf>,
}

#[derive(Debug, StructOpt)]
struct HarrisArgs {
    /// Neighborhood size, 0 to 10 (at least 2 is used).
    #[structopt(long, default_value = "2")]
    block_size: u32,
    /// Sobel aperture level, 0 to 3 for apertures 3, 5, 7.
    #[structopt(long, default_value = "0")]
    aperture_level: u32,
    /// Harris k in hundredths, 0 to 10.
    #[structopt(long, default_value = "4")]
    k_x100: u32,
    /// Normalized response threshold, 0 to 255.
    #[structopt(long, default_value = "200")]
    threshold: u32,
    /// Keep at most this many corners, 0 keeps all.
    #[structopt(long, default_value = "500")]
    max_keypoints: u32,
}

impl HarrisArgs {
    fn knobs(&self) -> HarrisKnobs {
        HarrisKnobs {
            block_size: self.block_size,
            aperture_level: self.aperture_level,
            k_x100: self.k_x100,
            threshold: self.threshold,
            max_keypoints: self.max_keypoints,
        }
    }
}

#[derive(Debug, StructOpt)]
struct BlobArgs {
    /// First binarization threshold, 0 to 255.
    #[structopt(long, default_value = "10")]
    min_threshold: u32,
    /// Last binarization threshold, 0 to 255.
    #[structopt(long, default_value = "220")]
    max_threshold: u32,
    /// Minimum blob area in pixels, 0 to 5000.
    #[structopt(long, default_value = "100")]
    min_area: u32,
    /// Minimum circularity in percent.
    #[structopt(long, default_value = "4")]
    circularity: u32,
    /// Minimum convexity in percent.
    #[structopt(long, default_value = "58")]
    convexity: u32,
    /// Minimum inertia ratio in percent.
    #[structopt(long, default_value = "10")]
    inertia: u32,
}

impl BlobArgs {
    fn knobs(&self) -> BlobKnobs {
        BlobKnobs {
            min_threshold: self.min_threshold,
            max_threshold: self.max_threshold,
            min_area: self.min_area,
            circularity: self.circularity,
            convexity: self.convexity,
            inertia: self.inertia,
        }
    }
}

#[derive(Debug, StructOpt)]
struct ScaleSpaceArgs {
    /// Keep at most this many keypoints, 0 keeps all.
    #[structopt(long, default_value = "500")]
    max_features: u32,
    /// Sublevels per octave, 1 to 8.
    #[structopt(long, default_value = "4")]
    octave_layers: u32,
    /// Detector threshold in units of 1/40000, 1 to 20.
    #[structopt(long, default_value = "4")]
    contrast_x100: u32,
    /// Curvature ratio limit, 0 to 20 (0 disables the edge test).
    #[structopt(long, default_value = "10")]
    edge_threshold: u32,
    /// Base sigma in tenths, 1 to 50.
    #[structopt(long, default_value = "16")]
    sigma_x10: u32,
}

impl ScaleSpaceArgs {
    fn knobs(&self) -> ScaleSpaceKnobs {
        ScaleSpaceKnobs {
            max_features: self.max_features,
            octave_layers: self.octave_layers,
            contrast_x100: self.contrast_x100,
            edge_threshold: self.edge_threshold,
            sigma_x10: self.sigma_x10,
        }
    }
}

#[derive(Debug, StructOpt)]
struct MatchArgs {
    /// Lowe ratio in hundredths, 1 to 100.
    #[structopt(long, default_value = "75")]
    ratio_x100: u32,
    /// LBP neighbour distance, 1 to 3.
    #[structopt(long, default_value = "1")]
    lbp_radius: u32,
}

impl MatchArgs {
    fn knobs(&self) -> MatchKnobs {
        MatchKnobs {
            ratio_x100: self.ratio_x100,
            lbp_radius: self.lbp_radius,
        }
    }
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        error!("{}", e);
        eprintln!("featdraw: {}", e);
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), Error> {
    let mut pipeline = Pipeline::default();
    match opt {
        Opt::Harris { io, harris } => {
            pipeline.harris = harris.knobs().harris();
            let image = featlab::open_image(&io.input)?;
            let keypoints = pipeline.detect(DetectorKind::Harris, &image);
            let canvas = featdraw::render_corners(&image, &keypoints);
            finish(canvas, &io, &format!("{}: {}", DetectorKind::Harris, keypoints.len()))
        }
        Opt::Blob { io, blob } => {
            pipeline.blob = blob.knobs().blob_detector();
            let image = featlab::open_image(&io.input)?;
            let keypoints = pipeline.detect(DetectorKind::Blob, &image);
            let canvas = featdraw::render_rich_keypoints(&image, &keypoints);
            finish(canvas, &io, &format!("{}: {}", DetectorKind::Blob, keypoints.len()))
        }
        Opt::Dog { io, scale_space } => {
            pipeline.scale_space = scale_space.knobs().scale_space();
            let image = featlab::open_image(&io.input)?;
            let keypoints = pipeline.detect(DetectorKind::Dog, &image);
            let canvas = featdraw::render_rich_keypoints(&image, &keypoints);
            finish(canvas, &io, &format!("{}: {}", DetectorKind::Dog, keypoints.len()))
        }
        Opt::Match {
            detector,
            descriptor,
            io,
            second,
            harris,
            blob,
            scale_space,
            matching,
        } => {
            pipeline.harris = harris.knobs().harris();
            pipeline.blob = blob.knobs().blob_detector();
            pipeline.scale_space = scale_space.knobs().scale_space();
            pipeline.matcher = matching.knobs().matcher();
            pipeline.lbp = matching.knobs().lbp();
            let image_a = featlab::open_image(&io.input)?;
            let image_b = featlab::open_image(&second)?;
            let report = pipeline.match_images(detector, descriptor, &image_a, &image_b);
            let canvas = featdraw::render_matches(
                &image_a,
                &report.keypoints_a,
                &image_b,
                &report.keypoints_b,
                &report.matches,
            );
            finish(canvas, &io, &format!("Matches: {}", report.matches.len()))
        }
        Opt::Enhance { kind, io, value } => {
            let image = featlab::open_image(&io.input)?;
            let enhanced = Enhancement::new(kind, value).apply(&image);
            featdraw::write_output(&enhanced, io.output.as_deref())
        }
    }
}

/// Report the summary, stamp it on the canvas and write it out.
fn finish(mut canvas: RgbaImage, io: &Io, summary: &str) -> Result<(), Error> {
    info!("{}", summary);
    eprintln!("{}", summary);
    let font = match &io.font {
        Some(font_path) => featdraw::load_font(font_path)?,
        None => featdraw::bundled_font()?,
    };
    featdraw::draw_summary(&mut canvas, &font, summary);
    featdraw::write_output(&DynamicImage::ImageRgba8(canvas), io.output.as_deref())
}
