use std::path::PathBuf;
use thiserror::Error;

/// Failures of the library surface.
///
/// Only I/O can fail. Degenerate inputs to the algorithms produce empty
/// results instead of errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to load image {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to save image {path:?}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("unknown detector {0:?}, expected one of harris, blob, dog")]
    UnknownDetector(String),
    #[error("unknown descriptor {0:?}, expected one of sift, lbp")]
    UnknownDescriptor(String),
    #[error("unknown enhancement {0:?}, expected one of gray, brightness, contrast, avg, gauss")]
    UnknownEnhancement(String),
}
