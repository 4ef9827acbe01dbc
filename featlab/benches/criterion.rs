use criterion::{criterion_group, criterion_main, Criterion};
use featlab::image::GrayFloatImage;
use featlab::{ChiSquare, Euclidean, Harris, Lbp, Matcher, Sift};
use image::{GrayImage, Luma};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

fn noise_image() -> GrayImage {
    let mut rng = Pcg64::seed_from_u64(0);
    GrayImage::from_fn(320, 240, |_, _| Luma([rng.gen::<u8>()]))
}

fn bench_harris(c: &mut Criterion) {
    let image = noise_image();
    let harris = Harris::default();
    c.bench_function("harris_extract", |b| b.iter(|| harris.extract(&image)));
    let float_image = GrayFloatImage::from_luma8(&image);
    c.bench_function("harris_response_map", |b| {
        b.iter(|| harris.response_map(&float_image))
    });
}

criterion_group!(
    name = harris;
    config = Criterion::default().sample_size(10);
    targets = bench_harris
);

fn bench_describe_and_match(c: &mut Criterion) {
    let image = noise_image();
    let keypoints = Harris::default().extract(&image);
    let lbp = Lbp::default();
    let sift = Sift::default();
    c.bench_function("lbp_describe", |b| {
        b.iter(|| lbp.describe_all(&image, &keypoints))
    });
    c.bench_function("sift_describe", |b| {
        b.iter(|| sift.describe_all(&image, &keypoints))
    });
    let lbp_descriptors = lbp.describe_all(&image, &keypoints);
    let sift_descriptors = sift.describe_all(&image, &keypoints);
    let matcher = Matcher::default();
    c.bench_function("match_lbp_chi_square", |b| {
        b.iter(|| matcher.match_descriptors(&lbp_descriptors, &lbp_descriptors, &ChiSquare))
    });
    c.bench_function("match_sift_euclidean", |b| {
        b.iter(|| matcher.match_descriptors(&sift_descriptors, &sift_descriptors, &Euclidean))
    });
}

criterion_group!(
    name = matching;
    config = Criterion::default().sample_size(10);
    targets = bench_describe_and_match
);

fn bench_filters(c: &mut Criterion) {
    let image = GrayFloatImage::from_luma8(&noise_image());
    let small_kernel = featlab::image::gaussian_kernel(1.0, 7);
    c.bench_function("horizontal_filter_small_kernel", |b| {
        b.iter(|| featlab::image::horizontal_filter(&image, &small_kernel))
    });
    c.bench_function("vertical_filter_small_kernel", |b| {
        b.iter(|| featlab::image::vertical_filter(&image, &small_kernel))
    });
    let large_kernel = featlab::image::gaussian_kernel(10.0, 71);
    c.bench_function("horizontal_filter_large_kernel", |b| {
        b.iter(|| featlab::image::horizontal_filter(&image, &large_kernel))
    });
}

criterion_group!(
    name = filters;
    config = Criterion::default().sample_size(10);
    targets = bench_filters
);

criterion_main!(harris, matching, filters);
