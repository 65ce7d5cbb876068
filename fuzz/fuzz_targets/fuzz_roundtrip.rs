#![no_main]
use libfuzzer_sys::fuzz_target;
use zenretro::*;

fuzz_target!(|data: &[u8]| {
    // If we can decode it, re-encoding and decoding again must produce identical pixels
    let Ok(decoded) = decode(data, enough::Unstoppable) else {
        return;
    };
    let mut frame = decoded.into_first();
    if frame.sample() != SampleType::U8 || frame.depth() != 1 {
        return;
    }
    frame.to_upper_left();

    // PCX stores RGB(A) as planes in that order; TGA covers the rest without a swizzle
    let request = match frame.layout() {
        PixelLayout::Rgb | PixelLayout::Rgba => EncodeRequest::pcx(),
        _ => EncodeRequest::tga_rle(),
    };
    let Ok(reencoded) = request.encode(&frame, enough::Unstoppable) else {
        return;
    };
    let Ok(decoded2) = decode(&reencoded, enough::Unstoppable) else {
        panic!("re-encoded {:?} failed to decode", request.format());
    };
    let mut frame2 = decoded2.into_first();
    frame2.to_upper_left();

    assert_eq!(frame.layout(), frame2.layout());
    assert_eq!(frame.width(), frame2.width());
    assert_eq!(frame.height(), frame2.height());
    assert_eq!(frame.pixels(), frame2.pixels(), "roundtrip pixel mismatch");
});
