//! Five-plane standard-star sequence measured end to end.

use approx::assert_abs_diff_eq;
use reduction::image_proc::detect_kappa_sigma;
use reduction::recipes::{zero_point, AcquisitionMode, ZeroPointConfig};
use reduction::{Cube, Image, NoProgress};
use shared::synthetic::{SyntheticFrame, SyntheticStar};
use shared::ImageSize;

const SIZE: usize = 128;
const STAR: (f64, f64) = (64.0, 74.0);
const SIGMA: f64 = 2.0;
const DITHER: [(f64, f64); 5] = [(0.0, 0.0), (1.2, -0.3), (2.5, 0.7), (-0.4, 1.1), (0.0, 2.0)];
const AMPLITUDES: [f64; 5] = [2000.0, 1800.0, 2200.0, 1900.0, 2100.0];

fn sequence() -> Cube {
    let planes = DITHER
        .iter()
        .zip(AMPLITUDES)
        .enumerate()
        .map(|(i, (&(dx, dy), amplitude))| {
            let data = SyntheticFrame::new(ImageSize::from_width_height(SIZE, SIZE))
                .with_background(100.0)
                .with_noise(2.0, 4242 + i as u64)
                .with_star(SyntheticStar::new(STAR.0 + dx, STAR.1 + dy, amplitude, SIGMA))
                .render();
            Image::from_array(data)
        })
        .collect();
    Cube::from_planes(planes).unwrap()
}

fn config() -> ZeroPointConfig {
    ZeroPointConfig {
        star_magnitude: 10.0,
        dit: 0.5,
        mode: Some(AcquisitionMode::Chop),
        star_radius: 10.0,
        background_inner: 14.0,
        background_outer: 20.0,
        ..ZeroPointConfig::default()
    }
}

#[test]
fn test_single_detection_on_first_plane() {
    let cube = sequence();
    let detected = detect_kappa_sigma(cube.plane(0), 5.0, false).unwrap();
    assert_eq!(detected.len(), 1);
    let (x, y) = detected.objects[0].centroid;
    assert!((x - STAR.0).abs() < 0.5 && (y - STAR.1).abs() < 0.5);
}

#[test]
fn test_offsets_recovered_by_correlation() {
    let cube = sequence();
    let result = zero_point(&cube, &config(), &NoProgress).unwrap();

    assert_eq!(result.star, (64, 74));
    assert_eq!(result.offsets.len(), DITHER.len());
    for (offset, &(dx, dy)) in result.offsets.iter().zip(DITHER.iter()) {
        assert!(offset.is_valid());
        assert_abs_diff_eq!(offset.dx, dx, epsilon = 0.2);
        assert_abs_diff_eq!(offset.dy, dy, epsilon = 0.2);
    }
}

#[test]
fn test_flux_follows_amplitude() {
    let cube = sequence();
    let config = config();
    let result = zero_point(&cube, &config, &NoProgress).unwrap();
    assert_eq!(result.used, DITHER.len());

    let fluxes: Vec<f64> = result
        .measurements
        .iter()
        .map(|m| m.as_ref().expect("every plane measured").flux)
        .collect();
    for (flux, amplitude) in fluxes.iter().zip(AMPLITUDES) {
        let measured = flux / fluxes[0];
        let expected = amplitude / AMPLITUDES[0];
        assert!(
            (measured / expected - 1.0).abs() < 0.05,
            "flux ratio {measured:.4} vs amplitude ratio {expected:.4}"
        );
    }

    // mean of mag + 2.5 log10(2πσ²A / dit)
    let expected: f64 = AMPLITUDES
        .iter()
        .map(|a| {
            let flux = 2.0 * std::f64::consts::PI * SIGMA * SIGMA * a;
            config.star_magnitude + 2.5 * (flux / config.dit).log10()
        })
        .sum::<f64>()
        / AMPLITUDES.len() as f64;
    assert_abs_diff_eq!(result.zero_point, expected, epsilon = 0.03);
}

#[test]
fn test_result_serialises() {
    let cube = sequence();
    let result = zero_point(&cube, &config(), &NoProgress).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["mode"], "chop");
    assert_eq!(json["measurements"].as_array().unwrap().len(), 5);
}
