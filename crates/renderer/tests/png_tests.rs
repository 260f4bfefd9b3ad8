//! Tests for PNG encoding.
//!
//! Inflates the IDAT stream to check the scanlines actually carry the
//! input pixels.

use std::io::Read;

use renderer::png::{create_png, create_png_auto, create_png_indexed};

// ============================================================================
// Helper functions
// ============================================================================

/// Split a PNG into `(type, data)` chunks.
fn chunks(png: &[u8]) -> Vec<([u8; 4], Vec<u8>)> {
    let mut out = Vec::new();
    let mut pos = 8;
    while pos + 12 <= png.len() {
        let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
        let mut kind = [0u8; 4];
        kind.copy_from_slice(&png[pos + 4..pos + 8]);
        out.push((kind, png[pos + 8..pos + 8 + len].to_vec()));
        pos += 12 + len;
    }
    out
}

fn inflate(data: &[u8]) -> Vec<u8> {
    let mut raw = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut raw)
        .unwrap();
    raw
}

fn color_type(png: &[u8]) -> u8 {
    chunks(png)[0].1[9]
}

// ============================================================================
// Format selection
// ============================================================================

#[test]
fn test_auto_uses_indexed_for_few_colors() {
    let pixels = [
        68, 1, 84, 255, //
        253, 231, 37, 255, //
        0, 0, 0, 0, //
        68, 1, 84, 255,
    ];
    let png = create_png_auto(&pixels, 2, 2).unwrap();
    assert_eq!(color_type(&png), 3);

    let kinds: Vec<[u8; 4]> = chunks(&png).into_iter().map(|(k, _)| k).collect();
    assert_eq!(kinds, vec![*b"IHDR", *b"PLTE", *b"tRNS", *b"IDAT", *b"IEND"]);
}

#[test]
fn test_auto_falls_back_to_rgba() {
    let pixels: Vec<u8> = (0..300u32).flat_map(|i| [i as u8, (i / 2) as u8, (i / 3) as u8, 255]).collect();
    let png = create_png_auto(&pixels, 300, 1).unwrap();
    assert_eq!(color_type(&png), 6);
}

#[test]
fn test_opaque_palette_has_no_trns() {
    let png = create_png_indexed(1, 1, &[[1, 2, 3, 255]], &[0]).unwrap();
    assert!(chunks(&png).iter().all(|(k, _)| k != b"tRNS"));
}

// ============================================================================
// Content
// ============================================================================

#[test]
fn test_rgba_scanlines_round_trip() {
    let pixels: Vec<u8> = (0..3 * 2 * 4).map(|i| i as u8).collect();
    let png = create_png(&pixels, 3, 2).unwrap();

    let idat = chunks(&png)
        .into_iter()
        .find(|(k, _)| k == b"IDAT")
        .unwrap()
        .1;
    let raw = inflate(&idat);
    assert_eq!(raw.len(), 2 * (1 + 3 * 4));
    assert_eq!(raw[0], 0);
    assert_eq!(&raw[1..13], &pixels[..12]);
    assert_eq!(raw[13], 0);
    assert_eq!(&raw[14..], &pixels[12..]);
}

#[test]
fn test_ihdr_dimensions() {
    let png = create_png(&vec![0u8; 5 * 7 * 4], 5, 7).unwrap();
    let ihdr = &chunks(&png)[0].1;
    assert_eq!(u32::from_be_bytes([ihdr[0], ihdr[1], ihdr[2], ihdr[3]]), 5);
    assert_eq!(u32::from_be_bytes([ihdr[4], ihdr[5], ihdr[6], ihdr[7]]), 7);
}

#[test]
fn test_buffer_size_mismatch() {
    assert!(create_png(&[0u8; 10], 2, 2).is_err());
    assert!(create_png_indexed(2, 2, &[[0, 0, 0, 0]], &[0, 0, 0]).is_err());
}
