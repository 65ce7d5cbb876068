//! X PixMap (XPM2 and XPM3) decoder.
//!
//! XPM3 is a C string array; XPM2 is the same content as bare lines. Both
//! decode to upper-left RGBA with `None` entries fully transparent.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PixelLayout};
use crate::source::Reader;

const XPM3_MAGIC: &[u8] = b"/* XPM */";
const XPM2_MAGIC: &[u8] = b"! XPM2";
const MAX_CHARS_PER_PIXEL: usize = 8;

/// The handful of X11 colour names that turn up in real icons.
const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [190, 190, 190]),
    ("grey", [190, 190, 190]),
    ("orange", [255, 165, 0]),
    ("purple", [160, 32, 240]),
    ("brown", [165, 42, 42]),
    ("navy", [0, 0, 128]),
    ("maroon", [176, 48, 96]),
    ("gold", [255, 215, 0]),
    ("pink", [255, 192, 203]),
    ("darkgray", [169, 169, 169]),
    ("darkgrey", [169, 169, 169]),
    ("lightgray", [211, 211, 211]),
    ("lightgrey", [211, 211, 211]),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flavor {
    Xpm2,
    Xpm3,
}

fn flavor(data: &[u8]) -> Option<Flavor> {
    let trimmed = data.trim_ascii_start();
    if trimmed.starts_with(XPM3_MAGIC) {
        Some(Flavor::Xpm3)
    } else if trimmed.starts_with(XPM2_MAGIC) {
        Some(Flavor::Xpm2)
    } else {
        None
    }
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    flavor(src.rest()).is_some()
}

/// All double-quoted strings outside comments, in order.
fn c_strings(text: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < text.len() {
        match text[i] {
            b'/' if text.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..]
                    .windows(2)
                    .position(|w| w == b"*/")
                    .map_or(text.len(), |p| i + 2 + p + 2);
            }
            b'"' => {
                let mut s = Vec::new();
                i += 1;
                while i < text.len() && text[i] != b'"' {
                    if text[i] == b'\\' && i + 1 < text.len() {
                        i += 1;
                    }
                    s.push(text[i]);
                    i += 1;
                }
                out.push(s);
                i += 1;
            }
            _ => i += 1,
        }
    }
    out
}

/// The array name in `static char *name[] = {`.
fn array_name(text: &[u8]) -> Option<String> {
    let text = core::str::from_utf8(text).ok()?;
    let before = &text[..text.find('[')?];
    let name = before.rsplit(|c: char| c == '*' || c.is_whitespace()).next()?;
    (!name.is_empty()).then(|| name.into())
}

fn parse_color(value: &str) -> Option<[u8; 4]> {
    if value.eq_ignore_ascii_case("none") {
        return Some([0, 0, 0, 0]);
    }
    if let Some(hex) = value.strip_prefix('#') {
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let digits = match hex.len() {
            3 | 6 | 9 | 12 => hex.len() / 3,
            _ => return None,
        };
        let mut rgba = [0, 0, 0, 255];
        for (c, out) in rgba.iter_mut().take(3).enumerate() {
            let field = &hex[c * digits..(c + 1) * digits];
            let v = u16::from_str_radix(field, 16).ok()?;
            *out = match digits {
                1 => (v * 17) as u8,
                2 => v as u8,
                n => (v >> (4 * (n - 2))) as u8,
            };
        }
        return Some(rgba);
    }
    let key: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|&(_, [r, g, b])| [r, g, b, 255])
}

/// Pick the best visual from a colour definition: `c`, then `g`, `g4`, `m`.
fn definition_value(spec: &str) -> Option<String> {
    const KEYS: [&str; 5] = ["c", "g", "g4", "m", "s"];
    let mut values: Vec<(&str, String)> = Vec::new();
    for token in spec.split_whitespace() {
        if KEYS.contains(&token) {
            values.push((token, String::new()));
        } else if let Some((_, value)) = values.last_mut() {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(token);
        }
    }
    ["c", "g", "g4", "m"]
        .iter()
        .find_map(|key| values.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()))
}

fn parse_header(line: &[u8]) -> Result<(u32, u32, usize, usize), BitmapError> {
    let text = core::str::from_utf8(line)
        .map_err(|_| BitmapError::InvalidHeader("XPM header is not text".into()))?;
    let mut fields = text.split_whitespace().map(str::parse::<u32>);
    let mut next = |what: &str| -> Result<u32, BitmapError> {
        fields
            .next()
            .and_then(Result::ok)
            .ok_or_else(|| BitmapError::InvalidHeader(alloc::format!("XPM header lacks {what}")))
    };
    let width = next("width")?;
    let height = next("height")?;
    let colors = next("colour count")? as usize;
    let cpp = next("characters per pixel")? as usize;
    if cpp == 0 || cpp > MAX_CHARS_PER_PIXEL {
        return Err(BitmapError::IllegalValue(alloc::format!(
            "XPM uses {cpp} characters per pixel"
        )));
    }
    Ok((width, height, colors, cpp))
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let text = src.rest();
    let kind = flavor(text).ok_or_else(|| BitmapError::InvalidHeader("missing XPM marker".into()))?;
    let lines: Vec<Vec<u8>> = match kind {
        Flavor::Xpm3 => c_strings(text),
        Flavor::Xpm2 => text
            .split(|&b| b == b'\n')
            .skip(1)
            .map(|l| l.strip_suffix(b"\r").unwrap_or(l).to_vec())
            .collect(),
    };
    src.skip(text.len())?;
    let mut lines = lines.iter();
    let header = lines
        .next()
        .ok_or_else(|| BitmapError::InvalidHeader("XPM without values line".into()))?;
    let (width, height, colors, cpp) = parse_header(header)?;

    let mut table: BTreeMap<&[u8], [u8; 4]> = BTreeMap::new();
    for _ in 0..colors {
        let line = lines.next().ok_or(BitmapError::UnexpectedEof)?;
        if line.len() < cpp {
            return Err(BitmapError::IllegalValue("XPM colour line too short".into()));
        }
        let (key, spec) = line.split_at(cpp);
        let spec = String::from_utf8_lossy(spec);
        let value = definition_value(&spec).unwrap_or_default();
        let rgba = match parse_color(&value) {
            Some(rgba) => rgba,
            None if cx.strict() => {
                return Err(BitmapError::IllegalValue(alloc::format!(
                    "unknown XPM colour {value:?}"
                )));
            }
            None => {
                log::warn!("XPM: unknown colour {value:?}, using black");
                [0, 0, 0, 255]
            }
        };
        table.insert(key, rgba);
    }

    let mut bitmap = cx.bitmap(width, height, PixelLayout::Rgba, Origin::UpperLeft)?;
    let row = bitmap.row_bytes();
    for (y, out) in bitmap.pixels_mut().chunks_exact_mut(row).enumerate() {
        if y % 16 == 0 {
            cx.stop.check()?;
        }
        let line = lines.next().ok_or(BitmapError::UnexpectedEof)?;
        let keys = line.get(..width as usize * cpp).ok_or(BitmapError::UnexpectedEof)?;
        for (px, key) in out.chunks_exact_mut(4).zip(keys.chunks_exact(cpp)) {
            let rgba = table.get(key).ok_or_else(|| {
                BitmapError::IllegalValue(alloc::format!(
                    "XPM pixel {:?} has no colour",
                    String::from_utf8_lossy(key)
                ))
            })?;
            px.copy_from_slice(rgba);
        }
    }

    let mut output = DecodeOutput::single(ImageFormat::Xpm, bitmap);
    if kind == Flavor::Xpm3 {
        output.metadata.comment = array_name(text);
    }
    Ok(output)
}
