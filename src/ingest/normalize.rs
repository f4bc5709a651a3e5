use anyhow::{anyhow, Result};

/// Raw device pixel layouts the ingest layer can convert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    /// Packed 4:2:2, `Y0 U Y1 V` per pixel pair.
    Yuyv,
}

pub fn normalize_to_rgb(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = width
                .checked_mul(height)
                .and_then(|v| v.checked_mul(3))
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
            if pixels.len() != expected {
                return Err(anyhow!(
                    "RGB frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            Ok(pixels.to_vec())
        }
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height),
    }
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frames need an even width, got {}", width));
    }
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    let expected = pixel_count * 2;
    if pixels.len() != expected {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for chunk in pixels.chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = y as f32;
            rgb.push(clamp_to_u8(y + 1.402_f32 * v));
            rgb.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            rgb.push(clamp_to_u8(y + 1.772_f32 * u));
        }
    }
    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_conversion_produces_gray() -> Result<()> {
        let yuyv = vec![128u8; 2 * 2 * 2];
        let rgb = normalize_to_rgb(&yuyv, 2, 2, PixelFormat::Yuyv)?;
        assert_eq!(rgb, vec![128u8; 12]);
        Ok(())
    }

    #[test]
    fn yuyv_rejects_odd_width_and_bad_length() {
        assert!(normalize_to_rgb(&[0u8; 6], 3, 1, PixelFormat::Yuyv).is_err());
        assert!(normalize_to_rgb(&[0u8; 7], 2, 2, PixelFormat::Yuyv).is_err());
    }

    #[test]
    fn rgb_pass_through_validates_length() -> Result<()> {
        let pixels = vec![1u8; 9];
        let rgb = normalize_to_rgb(&pixels, 1, 3, PixelFormat::Rgb24)?;
        assert_eq!(rgb, pixels);
        assert!(normalize_to_rgb(&pixels, 2, 3, PixelFormat::Rgb24).is_err());
        Ok(())
    }
}
