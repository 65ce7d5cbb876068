//! Variable-width LZW decoder for GIF image data.
//!
//! Codes are read LSB-first from the concatenated data sub-blocks. The code
//! width starts at `root + 1`, grows each time the next free slot reaches
//! the current width's capacity and stops at 12 bits. When all 4096 slots
//! are taken the table is frozen until the encoder sends CLEAR.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::BitmapError;
use crate::source::Reader;

/// Size of the code space (12-bit codes).
pub(crate) const MAX_CODES: usize = 4096;
const MAX_CODE_BITS: u8 = 12;

/// Byte stream over a GIF sub-block sequence terminated by a zero-length block.
pub(crate) struct SubBlocks<'r, 'a> {
    src: &'r mut Reader<'a>,
    left: usize,
    done: bool,
}

impl<'r, 'a> SubBlocks<'r, 'a> {
    pub(crate) fn new(src: &'r mut Reader<'a>) -> Self {
        Self {
            src,
            left: 0,
            done: false,
        }
    }

    /// Next data byte, or `None` once the terminator block has been read.
    pub(crate) fn next_byte(&mut self) -> Result<Option<u8>, BitmapError> {
        if self.done {
            return Ok(None);
        }
        while self.left == 0 {
            let len = self.src.read_u8()?;
            if len == 0 {
                self.done = true;
                return Ok(None);
            }
            self.left = usize::from(len);
        }
        self.left -= 1;
        self.src.read_u8().map(Some)
    }

    /// Skip whatever data is left, through the terminator.
    pub(crate) fn finish(&mut self) -> Result<(), BitmapError> {
        if self.done {
            return Ok(());
        }
        self.src.skip(self.left)?;
        self.left = 0;
        loop {
            let len = self.src.read_u8()?;
            if len == 0 {
                self.done = true;
                return Ok(());
            }
            self.src.skip(usize::from(len))?;
        }
    }
}

/// Decoder tables. Allocated once per image and dropped on every exit path.
pub(crate) struct LzwDecoder {
    root: u8,
    prefix: Vec<u16>,
    suffix: Vec<u8>,
    stack: Vec<u8>,
}

/// How a decode call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LzwOutcome {
    /// Indices written into the output slice.
    pub written: usize,
    /// Whether the END code was seen (as opposed to running out of data).
    pub saw_end: bool,
}

impl LzwDecoder {
    pub(crate) fn new(root: u8) -> Result<Self, BitmapError> {
        if !(2..=11).contains(&root) {
            return Err(BitmapError::IllegalValue(alloc::format!(
                "LZW minimum code size {root} outside 2..=11"
            )));
        }
        let mut suffix = vec![0u8; MAX_CODES];
        for (i, s) in suffix.iter_mut().enumerate().take(1 << root) {
            *s = i as u8;
        }
        Ok(Self {
            root,
            prefix: vec![0u16; MAX_CODES],
            suffix,
            stack: vec![0u8; MAX_CODES + 1],
        })
    }

    /// Decode codes into `out` until END, the terminator block, or an error.
    ///
    /// Indices past `out.len()` are decoded and dropped so the stream stays
    /// in sync.
    pub(crate) fn decode(
        &mut self,
        input: &mut SubBlocks<'_, '_>,
        out: &mut [u8],
    ) -> Result<LzwOutcome, BitmapError> {
        let clear = 1u16 << self.root;
        let end = clear + 1;
        let mut code_size = self.root + 1;
        let mut next = clear + 2;
        let mut max = 1u16 << code_size;
        let mut prev: Option<u16> = None;
        let mut first = 0u8;
        let mut written = 0usize;

        let mut acc = 0u32;
        let mut bits = 0u8;

        loop {
            while bits < code_size {
                match input.next_byte()? {
                    Some(b) => {
                        acc |= u32::from(b) << bits;
                        bits += 8;
                    }
                    None => {
                        return Ok(LzwOutcome {
                            written,
                            saw_end: false,
                        });
                    }
                }
            }
            let code = (acc & ((1u32 << code_size) - 1)) as u16;
            acc >>= code_size;
            bits -= code_size;

            if code == clear {
                code_size = self.root + 1;
                next = clear + 2;
                max = 1 << code_size;
                prev = None;
                continue;
            }
            if code == end {
                return Ok(LzwOutcome {
                    written,
                    saw_end: true,
                });
            }

            let Some(prev_code) = prev else {
                if code > clear {
                    return Err(BitmapError::IllegalValue(alloc::format!(
                        "LZW stream starts with undefined code {code}"
                    )));
                }
                if written < out.len() {
                    out[written] = code as u8;
                }
                written += 1;
                first = code as u8;
                prev = Some(code);
                continue;
            };

            if code > next || (code == next && usize::from(next) >= MAX_CODES) {
                return Err(BitmapError::IllegalValue(alloc::format!(
                    "LZW code {code} beyond next free slot {next}"
                )));
            }

            let mut sp = 0usize;
            let mut c = code;
            if code == next {
                self.stack[sp] = first;
                sp += 1;
                c = prev_code;
            }
            while c > end {
                if sp >= MAX_CODES {
                    return Err(BitmapError::IllegalValue(
                        "LZW string longer than the code table".into(),
                    ));
                }
                self.stack[sp] = self.suffix[usize::from(c)];
                sp += 1;
                c = self.prefix[usize::from(c)];
            }
            if c >= clear {
                return Err(BitmapError::IllegalValue(alloc::format!(
                    "LZW string chains through control code {c}"
                )));
            }
            first = c as u8;
            self.stack[sp] = first;
            sp += 1;

            while sp > 0 {
                sp -= 1;
                if written < out.len() {
                    out[written] = self.stack[sp];
                }
                written += 1;
            }

            if usize::from(next) < MAX_CODES {
                self.prefix[usize::from(next)] = prev_code;
                self.suffix[usize::from(next)] = first;
                next += 1;
                if next == max && code_size < MAX_CODE_BITS {
                    code_size += 1;
                    max <<= 1;
                }
            }
            prev = Some(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack (code, width) pairs LSB-first and wrap them in one sub-block.
    fn blocks(codes: &[(u16, u8)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let (mut acc, mut bits) = (0u32, 0u8);
        for &(code, width) in codes {
            acc |= u32::from(code) << bits;
            bits += width;
            while bits >= 8 {
                bytes.push(acc as u8);
                acc >>= 8;
                bits -= 8;
            }
        }
        if bits > 0 {
            bytes.push(acc as u8);
        }
        let mut out = vec![bytes.len() as u8];
        out.extend_from_slice(&bytes);
        out.push(0);
        out
    }

    fn run(
        root: u8,
        codes: &[(u16, u8)],
        len: usize,
    ) -> Result<(Vec<u8>, LzwOutcome), BitmapError> {
        let data = blocks(codes);
        let mut src = Reader::new(&data);
        let mut input = SubBlocks::new(&mut src);
        let mut out = vec![0u8; len];
        let outcome = LzwDecoder::new(root)?.decode(&mut input, &mut out)?;
        input.finish()?;
        Ok((out, outcome))
    }

    #[test]
    fn literal_and_kwkwk() {
        // root 2: clear=4, end=5. "1", then code 6 (= "11", not yet defined).
        let (out, outcome) = run(2, &[(4, 3), (1, 3), (6, 3), (5, 3)], 3).unwrap();
        assert_eq!(out, [1, 1, 1]);
        assert!(outcome.saw_end);
        assert_eq!(outcome.written, 3);
    }

    #[test]
    fn code_width_grows_at_capacity() {
        // Slots 6 and 7 are filled by the 2nd and 3rd codes; the 4th code is
        // read with 4 bits.
        let codes = [(4, 3), (0, 3), (1, 3), (2, 3), (3, 4), (5, 4)];
        let (out, outcome) = run(2, &codes, 4).unwrap();
        assert_eq!(out, [0, 1, 2, 3]);
        assert!(outcome.saw_end);
    }

    #[test]
    fn undefined_code_rejected() {
        let err = run(2, &[(4, 3), (1, 3), (7, 3)], 4).unwrap_err();
        assert!(matches!(err, BitmapError::IllegalValue(_)));
    }

    #[test]
    fn excess_output_is_dropped() {
        // The third code fills slot 7, so END arrives 4 bits wide.
        let (out, outcome) = run(2, &[(1, 3), (1, 3), (1, 3), (5, 4)], 2).unwrap();
        assert_eq!(out, [1, 1]);
        assert_eq!(outcome.written, 3);
    }

    #[test]
    fn missing_end_code_reports_short_stream() {
        let (_, outcome) = run(2, &[(4, 3), (2, 3)], 4).unwrap();
        assert!(!outcome.saw_end);
        assert_eq!(outcome.written, 1);
    }

    #[test]
    fn root_size_bounds() {
        assert!(LzwDecoder::new(1).is_err());
        assert!(LzwDecoder::new(12).is_err());
        assert!(LzwDecoder::new(8).is_ok());
    }
}
