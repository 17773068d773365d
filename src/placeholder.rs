//! BlurHash placeholder encoder.
//!
//! Turns a small RGBA raster into a short base83 string that a client can
//! decode into a blurred preview while the real photo loads. The layout of
//! the output is:
//!
//! | chars | content |
//! |---|---|
//! | 1 | component counts, `(cx - 1) + (cy - 1) * 9` |
//! | 1 | quantised maximum AC amplitude |
//! | 4 | DC term (average colour, sRGB 8-bit per channel) |
//! | 2 each | remaining `cx * cy - 1` AC terms |
//!
//! The encoder is deterministic: factors are summed in row-major pixel order
//! and every quantisation step uses the same floor/truncation rules, so the
//! same raster always yields the same string.

use std::f64::consts::PI;
use thiserror::Error;

/// Component counts used for every catalog entry.
pub const COMPONENTS: (u32, u32) = (4, 4);

const BASE83: &[u8; 83] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz#$%*+,-.:;=?@[]^_{|}~";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("component counts must be between 1 and 9, got {x}x{y}")]
    ComponentCount { x: u32, y: u32 },
    #[error("image has zero width or height")]
    EmptyImage,
    #[error("expected {expected} bytes of RGBA data, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}

/// Encode an RGBA buffer of `width * height` pixels.
///
/// Alpha is ignored. Returns a string of `6 + 2 * (cx * cy - 1)` characters.
pub fn encode(
    pixels: &[u8],
    width: u32,
    height: u32,
    components_x: u32,
    components_y: u32,
) -> Result<String, PlaceholderError> {
    if !(1..=9).contains(&components_x) || !(1..=9).contains(&components_y) {
        return Err(PlaceholderError::ComponentCount {
            x: components_x,
            y: components_y,
        });
    }
    if width == 0 || height == 0 {
        return Err(PlaceholderError::EmptyImage);
    }
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(PlaceholderError::BufferSize {
            expected,
            actual: pixels.len(),
        });
    }

    let linear: Vec<[f64; 3]> = pixels
        .chunks_exact(4)
        .map(|px| {
            [
                srgb_to_linear(px[0]),
                srgb_to_linear(px[1]),
                srgb_to_linear(px[2]),
            ]
        })
        .collect();

    let mut factors = Vec::with_capacity((components_x * components_y) as usize);
    for j in 0..components_y {
        for i in 0..components_x {
            factors.push(basis_factor(&linear, width, height, i, j));
        }
    }

    let dc = factors[0];
    let ac = &factors[1..];

    let mut hash = String::with_capacity(6 + 2 * ac.len());
    push_base83(&mut hash, (components_x - 1) + (components_y - 1) * 9, 1);

    let maximum_value = if ac.is_empty() {
        push_base83(&mut hash, 0, 1);
        1.0
    } else {
        let actual_max = ac
            .iter()
            .flat_map(|f| f.iter())
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let quantised = (actual_max * 166.0 - 0.5).floor().clamp(0.0, 82.0) as u32;
        push_base83(&mut hash, quantised, 1);
        (quantised as f64 + 1.0) / 166.0
    };

    push_base83(&mut hash, encode_dc(dc), 4);
    for factor in ac {
        push_base83(&mut hash, encode_ac(*factor, maximum_value), 2);
    }
    Ok(hash)
}

fn basis_factor(linear: &[[f64; 3]], width: u32, height: u32, i: u32, j: u32) -> [f64; 3] {
    let normalisation = if i == 0 && j == 0 { 1.0 } else { 2.0 };
    let (w, h) = (width as f64, height as f64);
    let mut sum = [0.0_f64; 3];
    for y in 0..height {
        let cy = (PI * j as f64 * y as f64 / h).cos();
        for x in 0..width {
            let basis = (PI * i as f64 * x as f64 / w).cos() * cy;
            let px = linear[(y * width + x) as usize];
            sum[0] += basis * px[0];
            sum[1] += basis * px[1];
            sum[2] += basis * px[2];
        }
    }
    let scale = normalisation / (w * h);
    [sum[0] * scale, sum[1] * scale, sum[2] * scale]
}

fn encode_dc(value: [f64; 3]) -> u32 {
    let r = linear_to_srgb(value[0]);
    let g = linear_to_srgb(value[1]);
    let b = linear_to_srgb(value[2]);
    (r << 16) + (g << 8) + b
}

fn encode_ac(value: [f64; 3], maximum_value: f64) -> u32 {
    let quant = |v: f64| -> u32 {
        (sign_pow(v / maximum_value, 0.5) * 9.0 + 9.5)
            .floor()
            .clamp(0.0, 18.0) as u32
    };
    quant(value[0]) * 19 * 19 + quant(value[1]) * 19 + quant(value[2])
}

fn sign_pow(value: f64, exp: f64) -> f64 {
    value.abs().powf(exp).copysign(value)
}

fn srgb_to_linear(value: u8) -> f64 {
    let v = value as f64 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(value: f64) -> u32 {
    let v = value.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        (v * 12.92 * 255.0 + 0.5).trunc() as u32
    } else {
        ((1.055 * v.powf(1.0 / 2.4) - 0.055) * 255.0 + 0.5).trunc() as u32
    }
}

fn push_base83(out: &mut String, value: u32, length: u32) {
    for i in 1..=length {
        let digit = (value / 83u32.pow(length - i)) % 83;
        out.push(BASE83[digit as usize] as char);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        (0..width * height)
            .flat_map(|_| [rgb[0], rgb[1], rgb[2], 255])
            .collect()
    }

    fn decode_base83(s: &str) -> u32 {
        s.bytes().fold(0, |acc, c| {
            let digit = BASE83.iter().position(|&b| b == c).unwrap() as u32;
            acc * 83 + digit
        })
    }

    // =========================================================================
    // Layout
    // =========================================================================

    #[test]
    fn four_by_four_is_36_chars_with_size_flag_u() {
        let hash = encode(&solid(32, 24, [10, 200, 30]), 32, 24, 4, 4).unwrap();
        assert_eq!(hash.len(), 36);
        assert!(hash.starts_with('U'));
    }

    #[test]
    fn length_follows_component_count() {
        let px = solid(8, 8, [0, 0, 0]);
        assert_eq!(encode(&px, 8, 8, 1, 1).unwrap().len(), 6);
        assert_eq!(encode(&px, 8, 8, 9, 9).unwrap().len(), 6 + 2 * 80);
        assert_eq!(encode(&px, 8, 8, 3, 2).unwrap().len(), 6 + 2 * 5);
    }

    #[test]
    fn solid_colour_dc_round_trips() {
        let hash = encode(&solid(16, 16, [255, 0, 0]), 16, 16, 4, 4).unwrap();
        assert_eq!(decode_base83(&hash[2..6]), 0xFF0000);

        let hash = encode(&solid(16, 16, [0, 0, 255]), 16, 16, 4, 4).unwrap();
        assert_eq!(decode_base83(&hash[2..6]), 0x0000FF);
    }

    #[test]
    fn gradient_differs_from_solid() {
        let gradient: Vec<u8> = (0..32 * 32)
            .flat_map(|i| {
                let x = (i % 32) as u8 * 8;
                [x, 255 - x, 128, 255]
            })
            .collect();
        let a = encode(&gradient, 32, 32, 4, 4).unwrap();
        let b = encode(&solid(32, 32, [128, 128, 128]), 32, 32, 4, 4).unwrap();
        assert_ne!(a, b);
        assert_ne!(&a[1..2], "0");
    }

    #[test]
    fn encoding_is_deterministic() {
        let px: Vec<u8> = (0..20 * 10 * 4).map(|i| (i * 37 % 256) as u8).collect();
        let first = encode(&px, 20, 10, 4, 4).unwrap();
        for _ in 0..5 {
            assert_eq!(encode(&px, 20, 10, 4, 4).unwrap(), first);
        }
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn rejects_bad_component_counts() {
        let px = solid(4, 4, [0, 0, 0]);
        assert_eq!(
            encode(&px, 4, 4, 0, 4),
            Err(PlaceholderError::ComponentCount { x: 0, y: 4 })
        );
        assert!(encode(&px, 4, 4, 4, 10).is_err());
    }

    #[test]
    fn rejects_empty_image() {
        assert_eq!(encode(&[], 0, 4, 4, 4), Err(PlaceholderError::EmptyImage));
    }

    #[test]
    fn rejects_short_buffer() {
        assert_eq!(
            encode(&[0; 12], 2, 2, 4, 4),
            Err(PlaceholderError::BufferSize {
                expected: 16,
                actual: 12
            })
        );
    }

    // =========================================================================
    // Colour conversion
    // =========================================================================

    #[test]
    fn srgb_linear_round_trip() {
        for v in [0u8, 1, 10, 64, 128, 200, 255] {
            assert_eq!(linear_to_srgb(srgb_to_linear(v)), v as u32);
        }
    }
}
