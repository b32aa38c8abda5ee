//! Per-pixel conversion functions for the standard colorspaces.
//!
//! Every function here maps the first three bands of each pixel and leaves
//! any further band (alpha) untouched.

use palette::{Hsv, IntoColor, Lab, Luv, Srgb, Xyz};

use crate::types::Raster;

/// Apply `f` to the colour bands of every pixel.
fn map_pixels(image: &Raster, f: impl Fn([f32; 3]) -> [f32; 3]) -> Raster {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        if let [a, b, c, ..] = pixel {
            [*a, *b, *c] = f([*a, *b, *c]);
        }
    }
    out
}

pub(super) fn identity(image: &Raster) -> Raster {
    image.clone()
}

fn srgb([r, g, b]: [f32; 3]) -> Srgb<f32> {
    Srgb::new(r, g, b)
}

fn components(rgb: Srgb<f32>) -> [f32; 3] {
    [rgb.red, rgb.green, rgb.blue]
}

// -- HSV, hue normalised to [0, 1) --

pub(super) fn rgb_to_hsv(image: &Raster) -> Raster {
    map_pixels(image, |rgb| {
        let hsv: Hsv = srgb(rgb).into_color();
        [
            hsv.hue.into_positive_degrees() / 360.0,
            hsv.saturation,
            hsv.value,
        ]
    })
}

pub(super) fn hsv_to_rgb(image: &Raster) -> Raster {
    map_pixels(image, |[h, s, v]| {
        let rgb: Srgb<f32> = Hsv::new(h * 360.0, s, v).into_color();
        components(rgb)
    })
}

// -- CIE spaces, D65 white point --

pub(super) fn rgb_to_xyz(image: &Raster) -> Raster {
    map_pixels(image, |rgb| {
        let xyz: Xyz = srgb(rgb).into_color();
        [xyz.x, xyz.y, xyz.z]
    })
}

pub(super) fn xyz_to_rgb(image: &Raster) -> Raster {
    map_pixels(image, |[x, y, z]| {
        let rgb: Srgb<f32> = Xyz::new(x, y, z).into_color();
        components(rgb)
    })
}

pub(super) fn rgb_to_lab(image: &Raster) -> Raster {
    map_pixels(image, |rgb| {
        let lab: Lab = srgb(rgb).into_color();
        [lab.l, lab.a, lab.b]
    })
}

pub(super) fn lab_to_rgb(image: &Raster) -> Raster {
    map_pixels(image, |[l, a, b]| {
        let rgb: Srgb<f32> = Lab::new(l, a, b).into_color();
        components(rgb)
    })
}

pub(super) fn rgb_to_luv(image: &Raster) -> Raster {
    map_pixels(image, |rgb| {
        let luv: Luv = srgb(rgb).into_color();
        [luv.l, luv.u, luv.v]
    })
}

pub(super) fn luv_to_rgb(image: &Raster) -> Raster {
    map_pixels(image, |[l, u, v]| {
        let rgb: Srgb<f32> = Luv::new(l, u, v).into_color();
        components(rgb)
    })
}

// -- Haematoxylin / Eosin / DAB stain separation --

/// Stain vectors, one row per stain.
const RGB_FROM_HED: [[f32; 3]; 3] = [
    [0.65, 0.70, 0.29],
    [0.07, 0.99, 0.11],
    [0.27, 0.57, 0.78],
];

/// Inverse of `RGB_FROM_HED`.
const HED_FROM_RGB: [[f32; 3]; 3] = [
    [1.877_982_7, -1.007_678_7, -0.556_115_8],
    [-0.065_908_06, 1.134_730_4, -0.135_521_8],
    [-0.601_907_4, -0.480_414_2, 1.573_588_1],
];

/// Smallest optical density input; avoids ln(0).
const MIN_INTENSITY: f32 = 1e-6;

/// Row vector times matrix.
fn row_times(v: [f32; 3], m: &[[f32; 3]; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (j, slot) in out.iter_mut().enumerate() {
        *slot = v[0] * m[0][j] + v[1] * m[1][j] + v[2] * m[2][j];
    }
    out
}

pub(super) fn rgb_to_hed(image: &Raster) -> Raster {
    let log_adjust = MIN_INTENSITY.ln();
    map_pixels(image, |rgb| {
        let density = rgb.map(|c| c.max(MIN_INTENSITY).ln() / log_adjust);
        row_times(density, &HED_FROM_RGB).map(|s| s.max(0.0))
    })
}

pub(super) fn hed_to_rgb(image: &Raster) -> Raster {
    let log_adjust = -MIN_INTENSITY.ln();
    map_pixels(image, |stains| {
        let log_rgb = row_times(stains.map(|s| -s * log_adjust), &RGB_FROM_HED);
        log_rgb.map(|c| c.exp().clamp(0.0, 1.0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-3;

    fn sample() -> Raster {
        Raster::from_rgba_pixels(
            3,
            2,
            &[
                [1.0, 0.0, 0.0, 1.0],
                [0.2, 0.6, 0.4, 0.5],
                [0.9, 0.9, 0.1, 0.0],
                [0.05, 0.02, 0.01, 1.0],
                [1.0, 1.0, 1.0, 0.25],
                [0.3, 0.1, 0.8, 0.75],
            ],
        )
        .unwrap()
    }

    fn assert_close(a: &Raster, b: &Raster) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.data().iter().zip(b.data()) {
            assert!((x - y).abs() < TOLERANCE, "{} vs {}", x, y);
        }
    }

    fn assert_alpha_kept(a: &Raster, b: &Raster) {
        for (p, q) in a.pixels().zip(b.pixels()) {
            assert_eq!(p[3].to_bits(), q[3].to_bits());
        }
    }

    #[test]
    fn test_round_trips() {
        let image = sample();
        let pairs: [(fn(&Raster) -> Raster, fn(&Raster) -> Raster); 4] = [
            (rgb_to_hsv, hsv_to_rgb),
            (rgb_to_xyz, xyz_to_rgb),
            (rgb_to_lab, lab_to_rgb),
            (rgb_to_luv, luv_to_rgb),
        ];
        for (encode, decode) in pairs {
            let encoded = encode(&image);
            assert_alpha_kept(&image, &encoded);
            let decoded = decode(&encoded);
            assert_close(&image, &decoded);
            assert_alpha_kept(&image, &decoded);
        }
    }

    #[test]
    fn test_hed_round_trip_within_stain_gamut() {
        // Colours produced from non-negative stain amounts survive the clip
        let stains = Raster::from_rgba_pixels(
            2,
            1,
            &[[0.1, 0.05, 0.02, 1.0], [0.0, 0.3, 0.1, 0.5]],
        )
        .unwrap();
        let image = hed_to_rgb(&stains);
        let decoded = hed_to_rgb(&rgb_to_hed(&image));
        assert_close(&image, &decoded);
        assert_alpha_kept(&stains, &decoded);
        assert_close(&stains, &rgb_to_hed(&image));
    }

    #[test]
    fn test_hed_white_has_no_stain() {
        let white = Raster::from_rgb_pixels(1, 1, &[[1.0, 1.0, 1.0]]).unwrap();
        let hed = rgb_to_hed(&white);
        assert!(hed.data().iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_hue_is_normalised() {
        let image = Raster::from_rgb_pixels(2, 1, &[[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]).unwrap();
        let hsv = rgb_to_hsv(&image);
        assert!(hsv.pixel(0, 0)[0].abs() < TOLERANCE);
        assert!((hsv.pixel(1, 0)[0] - 240.0 / 360.0).abs() < TOLERANCE);
        assert!((hsv.pixel(1, 0)[2] - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_three_band_images() {
        let image = Raster::from_rgb_pixels(1, 1, &[[0.25, 0.5, 0.75]]).unwrap();
        let lab = rgb_to_lab(&image);
        assert_eq!(lab.channels(), 3);
        assert_close(&image, &lab_to_rgb(&lab));
    }
}
