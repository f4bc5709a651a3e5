//! Contrast enhancement by histogram equalization of the CIELAB lightness channel.
//!
//! Chroma (a*, b*) is carried through untouched so colours do not shift; only
//! the lightness distribution is stretched.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::equalize_histogram;

// D65 reference white.
const XN: f32 = 0.950_456;
const ZN: f32 = 1.088_754;
const EPSILON: f32 = 216.0 / 24389.0;
const KAPPA: f32 = 24389.0 / 27.0;

/// Return a copy of `image` with its L* channel histogram-equalized.
///
/// Images whose lightness is already uniform are returned unchanged.
pub fn enhance_contrast(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let to_linear = srgb_to_linear_table();

    let mut lab = Vec::with_capacity((width * height) as usize);
    let mut lightness = GrayImage::new(width, height);
    for (px, out) in image.pixels().zip(lightness.pixels_mut()) {
        let [l, a, b] = linear_to_lab(
            to_linear[px[0] as usize],
            to_linear[px[1] as usize],
            to_linear[px[2] as usize],
        );
        lab.push((a, b));
        *out = Luma([(l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8]);
    }

    let first = lightness.pixels().next().map(|p| p[0]);
    if lightness.pixels().all(|p| Some(p[0]) == first) {
        return image.clone();
    }

    let equalized = equalize_histogram(&lightness);
    let mut out = RgbImage::new(width, height);
    for ((px, l8), (a, b)) in out.pixels_mut().zip(equalized.pixels()).zip(lab) {
        let l = l8[0] as f32 * 100.0 / 255.0;
        let [r, g, bl] = lab_to_linear(l, a, b);
        px.0 = [linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(bl)];
    }
    out
}

fn srgb_to_linear_table() -> [f32; 256] {
    let mut table = [0.0f32; 256];
    for (i, v) in table.iter_mut().enumerate() {
        let c = i as f32 / 255.0;
        *v = if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        };
    }
    table
}

fn linear_to_srgb(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let v = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    let cubed = f * f * f;
    if cubed > EPSILON {
        cubed
    } else {
        (116.0 * f - 16.0) / KAPPA
    }
}

fn linear_to_lab(r: f32, g: f32, b: f32) -> [f32; 3] {
    let x = 0.412_453 * r + 0.357_580 * g + 0.180_423 * b;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = 0.019_334 * r + 0.119_193 * g + 0.950_227 * b;

    let fx = lab_f(x / XN);
    let fy = lab_f(y);
    let fz = lab_f(z / ZN);
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

fn lab_to_linear(l: f32, a: f32, b: f32) -> [f32; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let x = lab_f_inv(fx) * XN;
    let y = lab_f_inv(fy);
    let z = lab_f_inv(fz) * ZN;

    [
        3.240_479 * x - 1.537_150 * y - 0.498_535 * z,
        -0.969_256 * x + 1.875_992 * y + 0.041_556 * z,
        0.055_648 * x - 0.204_043 * y + 1.057_311 * z,
    ]
}
