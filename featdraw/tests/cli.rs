use image::{GrayImage, Luma};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn featdraw(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_featdraw"))
        .args(args)
        .output()
        .expect("failed to run featdraw")
}

fn chessboard(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    GrayImage::from_fn(80, 80, |x, y| {
        if (x / 10 + y / 10) % 2 == 0 {
            Luma([30])
        } else {
            Luma([220])
        }
    })
    .save(&path)
    .unwrap();
    path
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn harris_writes_annotated_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = chessboard(dir.path(), "board.png");
    let out = dir.path().join("harris.png");
    let output = featdraw(&[
        "harris",
        input.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--threshold",
        "150",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("Harris: "));
    let annotated = image::open(&out).unwrap();
    assert_eq!((annotated.width(), annotated.height()), (80, 80));
}

#[test]
fn count_is_written_on_the_default_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gray.png");
    GrayImage::from_pixel(160, 60, Luma([128])).save(&input).unwrap();
    let out = dir.path().join("harris.png");
    let output = featdraw(&["harris", input.to_str().unwrap(), "-o", out.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("Harris: 0"));
    let annotated = image::open(&out).unwrap().to_rgb8();
    let text = annotated
        .pixels()
        .filter(|p| p.0[1] > p.0[0] + 60 && p.0[1] > p.0[2] + 60)
        .count();
    assert!(text > 20, "{} text pixels", text);
    // Nothing is drawn far from the top-left corner.
    assert_eq!(annotated.get_pixel(150, 55).0, [128, 128, 128]);
}

#[test]
fn matching_an_image_with_itself() {
    let dir = tempfile::tempdir().unwrap();
    let input = chessboard(dir.path(), "board.png");
    let out = dir.path().join("matches.png");
    let output = featdraw(&[
        "m",
        "harris",
        "sift",
        input.to_str().unwrap(),
        input.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("Matches: "));
    let canvas = image::open(&out).unwrap();
    assert_eq!((canvas.width(), canvas.height()), (160, 80));
}

#[test]
fn png_goes_to_stdout_without_output_path() {
    let dir = tempfile::tempdir().unwrap();
    let input = chessboard(dir.path(), "board.png");
    let output = featdraw(&["blob", input.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("Blobs: "));
    assert!(output.stdout.starts_with(b"\x89PNG"));
}

#[test]
fn enhance_writes_filtered_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = chessboard(dir.path(), "board.png");
    let out = dir.path().join("bright.png");
    let output = featdraw(&[
        "enhance",
        "brightness",
        input.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--value",
        "-20",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let bright = image::open(&out).unwrap().to_rgb8();
    assert_eq!(bright.get_pixel(0, 0).0, [10, 10, 10]);
    assert_eq!(bright.get_pixel(15, 0).0, [200, 200, 200]);
}

#[test]
fn unreadable_image_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never.png");
    let missing = dir.path().join("missing.png");
    let output = featdraw(&[
        "harris",
        missing.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("missing.png"));
    assert!(!out.exists());
}

#[test]
fn unknown_detector_is_a_usage_error() {
    let output = featdraw(&["m", "fast", "lbp", "a.png", "b.png"]);
    assert!(!output.status.success());
}
