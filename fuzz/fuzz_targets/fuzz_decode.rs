#![no_main]
use libfuzzer_sys::fuzz_target;
use zenretro::*;

fuzz_target!(|data: &[u8]| {
    // Sniffed decode, lenient and strict: must never panic
    let _ = decode(data, enough::Unstoppable);
    let _ = DecodeRequest::new(data)
        .with_permissiveness(Permissiveness::Strict)
        .decode(enough::Unstoppable);

    // Every decoder on every input, including the signature-less ones
    let _ = decode_tga(data, enough::Unstoppable);
    let _ = decode_raw(data, enough::Unstoppable);
    let _ = decode_gif(data, enough::Unstoppable);
    let _ = decode_pcx(data, enough::Unstoppable);
    let _ = decode_pic(data, enough::Unstoppable);
    let _ = decode_lif(data, enough::Unstoppable);
    let _ = decode_mdl(data, enough::Unstoppable);
    let _ = decode_icns(data, enough::Unstoppable);
    let _ = decode_iff(data, enough::Unstoppable);
    let _ = decode_ilbm(data, enough::Unstoppable);
    let _ = decode_xpm(data, enough::Unstoppable);
    let _ = decode_utx(data, enough::Unstoppable);
    let _ = decode_ktx(data, enough::Unstoppable);

    let _ = identify(data);
    let _ = decode_compact_index(data);
});
