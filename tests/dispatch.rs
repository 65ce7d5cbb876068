mod common;

use std::io::{Cursor, Seek};

use common::{GifBuilder, GifFrame, pcx_header, tga_header};
use enough::Unstoppable;
use zenretro::*;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// 2x1, one bit-plane, black and white.
fn tiny_ilbm() -> Vec<u8> {
    let mut bmhd = Vec::new();
    for v in [2u16, 1, 0, 0] {
        bmhd.extend_from_slice(&v.to_be_bytes());
    }
    bmhd.extend_from_slice(&[1, 0, 0, 0]);
    bmhd.extend_from_slice(&0u16.to_be_bytes());
    bmhd.extend_from_slice(&[10, 11]);
    bmhd.extend_from_slice(&320u16.to_be_bytes());
    bmhd.extend_from_slice(&200u16.to_be_bytes());

    let mut form = b"ILBM".to_vec();
    form.extend_from_slice(&chunk(b"BMHD", &bmhd));
    form.extend_from_slice(&chunk(b"CMAP", &[0, 0, 0, 255, 255, 255]));
    form.extend_from_slice(&chunk(b"BODY", &[0b0100_0000, 0]));
    chunk(b"FORM", &form)
}

fn assert_palette_covers_indices(out: &DecodeOutput) {
    for frame in out.frames() {
        if frame.layout() != PixelLayout::Indexed {
            continue;
        }
        let palette = frame.palette().expect("indexed frame without palette");
        let max = frame.pixels().iter().copied().max().unwrap_or(0);
        assert!(usize::from(max) < palette.len(), "index {max} past {} entries", palette.len());
    }
}

// ── Sniffing ────────────────────────────────────────────────────────

#[test]
fn png_is_identified_but_not_decoded() {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(b"GIF89a");
    assert_eq!(identify(&data), Some(ImageFormat::Png));
    assert_eq!(identify(&data), identify(&data));

    let err = decode(&data, Unstoppable).unwrap_err();
    assert!(matches!(err, BitmapError::UnsupportedFormat(ImageFormat::Png)));
    assert_eq!(err.kind(), ErrorKind::FormatNotSupported);
}

#[test]
fn jpeg_and_jp2_signatures() {
    assert_eq!(identify(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
    assert_eq!(identify(&[0xFF, 0x4F, 0xFF, 0x51, 0]), Some(ImageFormat::Jp2));
}

#[test]
fn garbage_is_unrecognized() {
    let err = decode(b"definitely not an image", Unstoppable).unwrap_err();
    assert!(matches!(err, BitmapError::UnrecognizedFormat));
    assert_eq!(err.kind(), ErrorKind::UnknownFormat);
}

#[test]
fn ilbm_sniffed_and_decoded() {
    let data = tiny_ilbm();
    assert_eq!(identify(&data), Some(ImageFormat::Ilbm));
    assert!(is_valid(ImageFormat::Iff, &data));
    assert!(is_valid(ImageFormat::Ilbm, &data));
    assert!(!is_valid(ImageFormat::Gif, &data));

    let out = decode(&data, Unstoppable).unwrap();
    assert_eq!(out.pixels(), &[0, 1]);
    assert_palette_covers_indices(&out);
}

#[test]
fn xpm_sniffed_and_decoded() {
    let data = b"/* XPM */\nstatic char *dot[] = {\n\"1 1 1 1\",\n\"# c #00ff00\",\n\"#\"};\n";
    assert_eq!(identify(data), Some(ImageFormat::Xpm));
    let out = decode(data, Unstoppable).unwrap();
    assert_eq!(out.layout(), PixelLayout::Rgba);
    assert_eq!(out.pixels(), &[0, 255, 0, 255]);
}

#[test]
fn raw_validity_is_length_only() {
    assert!(is_valid(ImageFormat::Raw, &[0; 14]));
    assert!(!is_valid(ImageFormat::Raw, &[0; 13]));
}

// ── Format edge cases ───────────────────────────────────────────────

#[test]
fn tga_rle_packet_clipped_at_image_end() {
    // 2x1 truecolour; one run packet claims four pixels.
    let mut data = tga_header(10, 2, 1, 24, 0x20);
    data.extend_from_slice(&[0x83, 1, 2, 3]);
    let out = decode_tga(&data, Unstoppable).unwrap();
    assert_eq!(out.layout(), PixelLayout::Bgr);
    assert_eq!(out.pixels(), &[1, 2, 3, 1, 2, 3]);
}

#[test]
fn tga_short_data_depends_on_permissiveness() {
    let mut data = tga_header(3, 2, 2, 8, 0x20);
    data.extend_from_slice(&[9, 8, 7]);
    let out = decode_tga(&data, Unstoppable).unwrap();
    assert_eq!(out.pixels(), &[9, 8, 7, 0]);

    let err = DecodeRequest::new(&data)
        .with_format(ImageFormat::Tga)
        .with_permissiveness(Permissiveness::Strict)
        .decode(Unstoppable)
        .unwrap_err();
    assert!(matches!(err, BitmapError::UnexpectedEof));
}

#[test]
fn tga_bottom_up_keeps_lower_left_origin() {
    let mut data = tga_header(3, 1, 2, 8, 0);
    data.extend_from_slice(&[1, 2]);
    let out = decode_tga(&data, Unstoppable).unwrap();
    assert_eq!(out.first().origin, Origin::LowerLeft);
    assert_eq!(out.pixels(), &[1, 2]);
}

fn fixed(text: &str, len: usize) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.resize(len, 0);
    out
}

#[test]
fn tga_image_id_and_extension_comments_are_joined() {
    let mut data = tga_header(3, 1, 1, 8, 0x20);
    data[0] = 8;
    data.extend_from_slice(b"level 3a");
    data.push(9);

    let extension_offset = data.len() as u32;
    data.extend_from_slice(&495u16.to_le_bytes());
    data.extend(fixed("Ann", 41));
    data.extend(fixed("first line", 81));
    data.extend(fixed("second line", 81));
    data.extend(fixed("", 162));
    data.extend(fixed("", 12 + 41 + 6));
    data.extend(fixed("paint", 41));
    data.resize(extension_offset as usize + 495, 0);
    data.extend_from_slice(&extension_offset.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(b"TRUEVISION-XFILE.\0");

    let out = decode_tga(&data, Unstoppable).unwrap();
    assert_eq!(out.pixels(), &[9]);
    assert_eq!(out.metadata.comment.as_deref(), Some("level 3a\nfirst line\nsecond line"));
    assert_eq!(out.metadata.author.as_deref(), Some("Ann"));
    assert_eq!(out.metadata.software.as_deref(), Some("paint"));
}

#[test]
fn pcx_odd_width_needs_even_line_length() {
    let mut good = pcx_header(3, 1, 1, 4);
    good.extend_from_slice(&[10, 20, 30, 0]);
    let out = decode_pcx(&good, Unstoppable).unwrap();
    assert_eq!(out.layout(), PixelLayout::Gray);
    assert_eq!(out.pixels(), &[10, 20, 30]);

    let mut bad = pcx_header(3, 1, 1, 3);
    bad.extend_from_slice(&[10, 20, 30]);
    assert_eq!(identify(&bad), None);
    assert!(matches!(decode_pcx(&bad, Unstoppable), Err(BitmapError::InvalidHeader(_))));
}

#[test]
fn pcx_run_crosses_plane_boundary() {
    // 2x1 RGB: one run of six bytes covers all three planes.
    let mut data = pcx_header(2, 1, 3, 2);
    data.extend_from_slice(&[0xC6, 0x55]);
    let out = decode_pcx(&data, Unstoppable).unwrap();
    assert_eq!(out.layout(), PixelLayout::Rgb);
    assert_eq!(out.pixels(), &[0x55; 6]);
}

#[test]
fn indexed_outputs_carry_covering_palettes() {
    let gif = GifBuilder::new(2, 2, 0)
        .frame(&GifFrame::full(2, 2, vec![0, 1, 2, 3]))
        .finish();
    let palette = Palette::new(PaletteFormat::Rgb24, vec![1, 2, 3, 4, 5, 6]).unwrap();
    let source = Bitmap::from_pixels(
        2,
        1,
        PixelLayout::Indexed,
        SampleType::U8,
        Origin::UpperLeft,
        vec![0, 1],
        Some(palette),
    )
    .unwrap();
    let pcx = encode_pcx(&source, Unstoppable).unwrap();
    let tga = encode_tga(&source, true, Unstoppable).unwrap();
    for data in [gif, pcx, tga, tiny_ilbm()] {
        let out = decode(&data, Unstoppable).unwrap();
        assert_eq!(out.layout(), PixelLayout::Indexed, "{:?}", out.format);
        assert_palette_covers_indices(&out);
    }
}

#[test]
fn pixel_limit_rejects_before_decoding() {
    let mut data = tga_header(2, 100, 100, 24, 0x20);
    data.resize(data.len() + 100 * 100 * 3, 0);
    let limits = Limits {
        max_pixels: Some(5_000),
        ..Default::default()
    };
    let err = DecodeRequest::new(&data)
        .with_limits(&limits)
        .decode(Unstoppable)
        .unwrap_err();
    assert!(matches!(err, BitmapError::LimitExceeded(_)));
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
}

// ── Extensions and registry ─────────────────────────────────────────

#[test]
fn extension_table() {
    assert_eq!(ImageFormat::from_extension("GIF"), Some(ImageFormat::Gif));
    assert_eq!(ImageFormat::from_extension("vst"), Some(ImageFormat::Tga));
    assert_eq!(ImageFormat::from_extension("jpe"), Some(ImageFormat::Jpeg));
    assert_eq!(ImageFormat::Tga.extension(), "tga");
    assert!(ImageFormat::Raw.can_encode());
    assert!(!ImageFormat::Png.can_decode());
    assert!(matches!(
        ImageFormat::for_encoding("xpm"),
        Err(BitmapError::InvalidExtension(_))
    ));
}

#[test]
fn iff_extension_routes_amiga_files_to_ilbm() {
    let registry = Registry::new();
    let out = registry.decode_named("picture.iff", &tiny_ilbm(), Unstoppable).unwrap();
    assert_eq!(out.format, ImageFormat::Ilbm);
}

#[test]
fn raw_only_by_extension() {
    let source = Bitmap::from_pixels(
        1,
        1,
        PixelLayout::Gray,
        SampleType::U8,
        Origin::UpperLeft,
        vec![77],
        None,
    )
    .unwrap();
    let bytes = encode_raw(&source, Unstoppable).unwrap();
    let registry = Registry::new();
    assert!(registry.decode(&bytes, Unstoppable).is_err());
    let out = registry.decode_named("dump.RAW", &bytes, Unstoppable).unwrap();
    assert_eq!(out.pixels(), &[77]);
}

#[test]
fn registered_handler_overrides_builtin() {
    let mut registry = Registry::new();
    registry.register("gif", |data, _stop| {
        let mut out = zenretro::decode_gif(data, Unstoppable)?;
        out.metadata.software = Some("override".into());
        Ok(out)
    });
    let gif = GifBuilder::new(1, 1, 0).frame(&GifFrame::full(1, 1, vec![1])).finish();

    let named = registry.decode_named("anim.gif", &gif, Unstoppable).unwrap();
    assert_eq!(named.metadata.software.as_deref(), Some("override"));
    let sniffed = registry.decode(&gif, Unstoppable).unwrap();
    assert_eq!(sniffed.metadata.software.as_deref(), Some("override"));

    assert!(registry.unregister("GIF"));
    let builtin = registry.decode_named("anim.gif", &gif, Unstoppable).unwrap();
    assert_eq!(builtin.metadata.software, None);
}

#[test]
fn registry_limits_apply() {
    let gif = GifBuilder::new(4, 4, 0).frame(&GifFrame::full(4, 4, vec![0; 16])).finish();
    let registry = Registry::new().with_limits(Limits {
        max_width: Some(2),
        ..Default::default()
    });
    let err = registry.decode_named("a.gif", &gif, Unstoppable).unwrap_err();
    assert!(matches!(err, BitmapError::LimitExceeded(_)));
}

#[test]
fn save_and_load_files() {
    let dir = std::env::temp_dir().join(format!("zenretro-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let source = Bitmap::from_pixels(
        2,
        1,
        PixelLayout::Rgb,
        SampleType::U8,
        Origin::UpperLeft,
        vec![1, 2, 3, 4, 5, 6],
        None,
    )
    .unwrap();
    let registry = Registry::new();

    let path = dir.join("out.pcx");
    registry.save_file(&path, &source, Unstoppable).unwrap();
    let loaded = registry.load_file(&path, Unstoppable).unwrap();
    assert_eq!(loaded.format, ImageFormat::Pcx);
    assert_eq!(loaded.pixels(), source.pixels());

    let err = registry.save_file(dir.join("out.gif"), &source, Unstoppable).unwrap_err();
    assert!(matches!(err, BitmapError::InvalidExtension(_)));

    let err = registry.load_file(dir.join("missing.tga"), Unstoppable).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CouldNotOpenSource);
    std::fs::remove_dir_all(&dir).unwrap();
}

// ── Streams ─────────────────────────────────────────────────────────

#[test]
fn decode_reader_rewinds_on_failure() {
    let mut cursor = Cursor::new(b"xxxnot an image".to_vec());
    cursor.set_position(3);
    assert!(decode_reader(&mut cursor, Unstoppable).is_err());
    assert_eq!(cursor.stream_position().unwrap(), 3);

    let gif = GifBuilder::new(1, 1, 0).frame(&GifFrame::full(1, 1, vec![2])).finish();
    let out = decode_reader(Cursor::new(gif), Unstoppable).unwrap();
    assert_eq!(out.pixels(), &[2]);
}
