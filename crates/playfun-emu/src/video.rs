//! Conversion of captured core frames into the fixed 256x256 RGBA8 layout.

use libretro_host::{CapturedFrame, PixelFormat};

/// Output images are square, top-left aligned, black where the source frame
/// does not reach.
pub const IMAGE_DIM: usize = 256;

pub(crate) fn frame_to_rgba(frame: &CapturedFrame, out: &mut Vec<u8>) {
    out.clear();
    out.resize(IMAGE_DIM * IMAGE_DIM * 4, 0);

    let width = (frame.width as usize).min(IMAGE_DIM);
    let height = (frame.height as usize).min(IMAGE_DIM);

    for y in 0..height {
        let row = y * frame.pitch;
        for x in 0..width {
            let rgb = match frame.format {
                PixelFormat::Xrgb8888 => {
                    let offset = row + x * 4;
                    let Some(bytes) = frame.pixels.get(offset..offset + 4) else {
                        continue;
                    };
                    let v = u32::from_le_bytes(bytes.try_into().expect("4 bytes"));
                    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
                }
                PixelFormat::Rgb565 => {
                    let offset = row + x * 2;
                    let Some(bytes) = frame.pixels.get(offset..offset + 2) else {
                        continue;
                    };
                    let v = u16::from_le_bytes(bytes.try_into().expect("2 bytes"));
                    [
                        expand5((v >> 11) as u8 & 0x1F),
                        expand6((v >> 5) as u8 & 0x3F),
                        expand5(v as u8 & 0x1F),
                    ]
                }
                PixelFormat::Rgb1555 => {
                    let offset = row + x * 2;
                    let Some(bytes) = frame.pixels.get(offset..offset + 2) else {
                        continue;
                    };
                    let v = u16::from_le_bytes(bytes.try_into().expect("2 bytes"));
                    [
                        expand5((v >> 10) as u8 & 0x1F),
                        expand5((v >> 5) as u8 & 0x1F),
                        expand5(v as u8 & 0x1F),
                    ]
                }
            };
            let dst = (y * IMAGE_DIM + x) * 4;
            out[dst] = rgb[0];
            out[dst + 1] = rgb[1];
            out[dst + 2] = rgb[2];
            out[dst + 3] = 0xFF;
        }
    }
}

fn expand5(v: u8) -> u8 {
    (v << 3) | (v >> 2)
}

fn expand6(v: u8) -> u8 {
    (v << 2) | (v >> 4)
}

/// Downmixes interleaved stereo to mono as `(L + R) / 2`.
pub(crate) fn mix_mono(stereo: &[i16]) -> Vec<i16> {
    stereo
        .chunks_exact(2)
        .map(|pair| ((i32::from(pair[0]) + i32::from(pair[1])) / 2) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pixels: Vec<u8>, width: u32, height: u32, pitch: usize, format: PixelFormat) -> CapturedFrame {
        CapturedFrame {
            pixels,
            width,
            height,
            pitch,
            format,
        }
    }

    fn pixel(out: &[u8], x: usize, y: usize) -> [u8; 4] {
        let base = (y * IMAGE_DIM + x) * 4;
        out[base..base + 4].try_into().unwrap()
    }

    #[test]
    fn xrgb8888_pixels_convert_and_padding_stays_black() {
        // One pixel: X=0, R=0x11, G=0x22, B=0x33, little-endian in memory.
        let pixels = vec![0x33, 0x22, 0x11, 0x00];
        let mut out = Vec::new();
        frame_to_rgba(&frame(pixels, 1, 1, 4, PixelFormat::Xrgb8888), &mut out);
        assert_eq!(out.len(), IMAGE_DIM * IMAGE_DIM * 4);
        assert_eq!(pixel(&out, 0, 0), [0x11, 0x22, 0x33, 0xFF]);
        assert_eq!(pixel(&out, 1, 0), [0, 0, 0, 0]);
        assert_eq!(pixel(&out, 0, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn rgb565_full_channels_expand_to_255() {
        let v: u16 = 0xFFFF;
        let mut out = Vec::new();
        frame_to_rgba(
            &frame(v.to_le_bytes().to_vec(), 1, 1, 2, PixelFormat::Rgb565),
            &mut out,
        );
        assert_eq!(pixel(&out, 0, 0), [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn rgb1555_channels_expand_to_255() {
        let v: u16 = 0x7FFF;
        let mut out = Vec::new();
        frame_to_rgba(
            &frame(v.to_le_bytes().to_vec(), 1, 1, 2, PixelFormat::Rgb1555),
            &mut out,
        );
        assert_eq!(pixel(&out, 0, 0), [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn pitch_is_respected_between_rows() {
        // 1x2 frame with a 8-byte pitch: second row starts at offset 8.
        let mut pixels = vec![0u8; 16];
        pixels[0..4].copy_from_slice(&[0x00, 0x00, 0xFF, 0x00]); // red at (0,0)
        pixels[8..12].copy_from_slice(&[0xFF, 0x00, 0x00, 0x00]); // blue at (0,1)
        let mut out = Vec::new();
        frame_to_rgba(&frame(pixels, 1, 2, 8, PixelFormat::Xrgb8888), &mut out);
        assert_eq!(pixel(&out, 0, 0), [0xFF, 0x00, 0x00, 0xFF]);
        assert_eq!(pixel(&out, 0, 1), [0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn oversized_frames_are_cropped_to_the_output_square() {
        let width = 300usize;
        let pixels = vec![0xFFu8; width * 2 * 2];
        let mut out = Vec::new();
        frame_to_rgba(
            &frame(pixels, width as u32, 2, width * 2, PixelFormat::Rgb565),
            &mut out,
        );
        assert_eq!(out.len(), IMAGE_DIM * IMAGE_DIM * 4);
        assert_eq!(pixel(&out, IMAGE_DIM - 1, 0), [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn mono_mix_averages_the_channels() {
        assert_eq!(mix_mono(&[100, 200, -100, 100, 7]), vec![150, 0]);
        assert!(mix_mono(&[]).is_empty());
    }
}
