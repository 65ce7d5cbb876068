//! Tiny writers for building test inputs by hand.

#![allow(dead_code)]

/// LSB-first bit packer.
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl BitWriter {
    fn put(&mut self, code: u16, width: u8) {
        self.acc |= u32::from(code) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.bytes.push(self.acc as u8);
        }
        self.bytes
    }
}

/// LZW stream made of literal codes only, with the code width tracking the
/// decoder's table growth. One CLEAR at the start; the table is allowed to
/// fill up and freeze.
pub fn lzw_literals(root: u8, indices: &[u8]) -> Vec<u8> {
    let clear = 1u16 << root;
    let mut width = root + 1;
    let mut next = clear + 2;
    let mut max = 1u16 << width;
    let mut w = BitWriter::default();
    w.put(clear, width);
    for (i, &index) in indices.iter().enumerate() {
        w.put(u16::from(index), width);
        if i > 0 && next < 4096 {
            next += 1;
            if next == max && width < 12 {
                width += 1;
                max <<= 1;
            }
        }
    }
    w.put(clear + 1, width);
    w.finish()
}

/// Split `data` into GIF sub-blocks plus the terminator.
pub fn sub_blocks(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
    out
}

pub struct GifFrame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// Indices in display order.
    pub pixels: Vec<u8>,
    /// Graphic control: (disposal method, transparent index, delay).
    pub control: Option<(u8, Option<u8>, u16)>,
    pub interlaced: bool,
}

impl GifFrame {
    pub fn full(width: u16, height: u16, pixels: Vec<u8>) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
            pixels,
            control: None,
            interlaced: false,
        }
    }
}

/// Rows in the order an interlaced GIF stores them.
pub fn interlace_order(height: usize) -> Vec<usize> {
    [(0usize, 8usize), (4, 8), (2, 4), (1, 2)]
        .into_iter()
        .flat_map(|(start, step)| (start..height).step_by(step))
        .collect()
}

/// A GIF89a with a 4-entry global table (black, red, green, blue).
pub struct GifBuilder {
    out: Vec<u8>,
}

impl GifBuilder {
    pub const PALETTE: [u8; 12] = [0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255];

    pub fn new(width: u16, height: u16, background: u8) -> Self {
        let mut out = b"GIF89a".to_vec();
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&[0x80 | 0x01, background, 0]);
        out.extend_from_slice(&Self::PALETTE);
        Self { out }
    }

    pub fn looping(mut self, count: u16) -> Self {
        self.out.extend_from_slice(&[0x21, 0xFF, 11]);
        self.out.extend_from_slice(b"NETSCAPE2.0");
        self.out.extend_from_slice(&[3, 1]);
        self.out.extend_from_slice(&count.to_le_bytes());
        self.out.push(0);
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.out.extend_from_slice(&[0x21, 0xFE]);
        self.out.extend_from_slice(&sub_blocks(text.as_bytes()));
        self
    }

    pub fn frame(mut self, frame: &GifFrame) -> Self {
        if let Some((disposal, transparent, delay)) = frame.control {
            self.out.extend_from_slice(&[0x21, 0xF9, 4]);
            self.out.push((disposal << 2) | u8::from(transparent.is_some()));
            self.out.extend_from_slice(&delay.to_le_bytes());
            self.out.push(transparent.unwrap_or(0));
            self.out.push(0);
        }
        self.out.push(0x2C);
        for v in [frame.left, frame.top, frame.width, frame.height] {
            self.out.extend_from_slice(&v.to_le_bytes());
        }
        self.out.push(if frame.interlaced { 0x40 } else { 0 });
        let w = usize::from(frame.width);
        let stored: Vec<u8> = if frame.interlaced {
            interlace_order(usize::from(frame.height))
                .into_iter()
                .flat_map(|y| frame.pixels[y * w..(y + 1) * w].iter().copied())
                .collect()
        } else {
            frame.pixels.clone()
        };
        self.out.push(2);
        self.out.extend_from_slice(&sub_blocks(&lzw_literals(2, &stored)));
        self
    }

    /// Append an image block whose data is not valid LZW.
    pub fn broken_frame(mut self, width: u16, height: u16) -> Self {
        self.out.push(0x2C);
        for v in [0, 0, width, height] {
            self.out.extend_from_slice(&v.to_le_bytes());
        }
        self.out.push(0);
        self.out.push(2);
        // CLEAR, literal 1, then code 7 with only slot 6 defined.
        self.out.extend_from_slice(&sub_blocks(&[0xCC, 0x01]));
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.out.extend_from_slice(bytes);
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.out.push(0x3B);
        self.out
    }
}

/// An 18-byte TGA header without ID or colour map.
pub fn tga_header(image_type: u8, width: u16, height: u16, bpp: u8, descriptor: u8) -> Vec<u8> {
    let mut out = vec![0, 0, image_type, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.push(bpp);
    out.push(descriptor);
    out
}

/// A 128-byte PCX header for 8 bits per plane.
pub fn pcx_header(width: u16, height: u16, planes: u8, bytes_per_line: u16) -> Vec<u8> {
    let mut out = vec![0x0A, 5, 1, 8];
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(width - 1).to_le_bytes());
    out.extend_from_slice(&(height - 1).to_le_bytes());
    out.extend_from_slice(&72u16.to_le_bytes());
    out.extend_from_slice(&72u16.to_le_bytes());
    out.extend_from_slice(&[0; 48]);
    out.push(0);
    out.push(planes);
    out.extend_from_slice(&bytes_per_line.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.resize(128, 0);
    out
}
