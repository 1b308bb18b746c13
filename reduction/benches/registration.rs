use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reduction::image_proc::detect_kappa_sigma;
use reduction::registration::{
    estimate_cube_offsets, select_anchor_points_with_ladder, PlaneOffset, XcorrConfig,
};
use reduction::resampling::{shift_and_add, shift_image, Kernel, StackConfig};
use reduction::{Cube, Image, NoProgress};
use shared::synthetic::{SyntheticFrame, SyntheticStar};
use shared::ImageSize;

fn make_cube(size: usize, planes: usize) -> Cube {
    let stars: Vec<SyntheticStar> = (0..40)
        .map(|i| {
            let x = 40.0 + (i as f64 * 53.0) % (size as f64 - 80.0);
            let y = 40.0 + (i as f64 * 37.0) % (size as f64 - 80.0);
            SyntheticStar::new(x, y, 2000.0 / (i as f64 + 1.0), 1.8)
        })
        .collect();
    let planes = (0..planes)
        .map(|p| {
            let d = (0.7 * p as f64, -0.4 * p as f64);
            let data = SyntheticFrame::new(ImageSize::from_width_height(size, size))
                .with_background(100.0)
                .with_noise(3.0, p as u64)
                .with_stars(stars.iter().map(|s| s.translated(d.0, d.1)))
                .render();
            Image::from_array(data)
        })
        .collect();
    Cube::from_planes(planes).expect("equal plane sizes")
}

fn bench_detection(c: &mut Criterion) {
    let _ = env_logger::builder().is_test(true).try_init();
    let cube = make_cube(512, 1);
    let mut group = c.benchmark_group("detection");
    group.bench_function("kappa_sigma_512x512", |b| {
        b.iter(|| detect_kappa_sigma(black_box(cube.plane(0)), black_box(5.0), false))
    });
    group.bench_function("median_512x512", |b| b.iter(|| black_box(cube.plane(0)).median()));
    group.finish();
}

fn bench_registration(c: &mut Criterion) {
    let cube = make_cube(512, 4);
    let config = XcorrConfig::default();
    let (ex, ey) = config.edge_margin();
    let (anchors, _) = select_anchor_points_with_ladder(
        cube.plane(0),
        ex,
        ey,
        config.sigma,
        config.min_points,
        config.max_points,
    )
    .expect("anchors in the synthetic field");

    let mut group = c.benchmark_group("registration");
    group.sample_size(20);
    group.bench_function("xcorr_4x512x512", |b| {
        b.iter(|| {
            estimate_cube_offsets(
                black_box(&cube),
                cube.plane(0),
                None,
                &anchors,
                &config,
                &NoProgress,
            )
        })
    });
    group.finish();
}

fn bench_resampling(c: &mut Criterion) {
    let cube = make_cube(512, 4);
    let kernel = Kernel::default();
    let offsets: Vec<PlaneOffset> = (0..4)
        .map(|p| PlaneOffset::known(0.7 * p as f64, -0.4 * p as f64))
        .collect();

    let mut group = c.benchmark_group("resampling");
    group.bench_function("shift_image_512x512", |b| {
        b.iter(|| shift_image(black_box(cube.plane(1)), 0.37, -1.62, &kernel))
    });
    group.sample_size(20);
    group.bench_function("shift_and_add_4x512x512", |b| {
        b.iter(|| shift_and_add(black_box(&cube), &offsets, &kernel, &StackConfig::default()))
    });
    group.finish();
}

criterion_group!(benches, bench_detection, bench_registration, bench_resampling);
criterion_main!(benches);
