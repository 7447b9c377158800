//! TIFF-flavoured LZW.
//!
//! Codes are packed MSB-first and grow from 9 to 12 bits. Code 256 clears the
//! table and 257 ends the stream. TIFF writers switch code width one entry
//! early ("early change"), which both directions reproduce here.

use std::collections::HashMap;

use crate::error::CodecError;

use super::options::CodecOptions;

const CLEAR: u16 = 256;
const EOI: u16 = 257;
const FIRST_CODE: u32 = 258;
const MAX_TABLE: u32 = 4094;

/// Code width for a table whose next free code is `next`.
fn code_width(next: u32) -> u32 {
    match next {
        n if n >= 2048 => 12,
        n if n >= 1024 => 11,
        n if n >= 512 => 10,
        _ => 9,
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    buffer: u32,
    bits: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            buffer: 0,
            bits: 0,
        }
    }

    fn read(&mut self, width: u32) -> Option<u16> {
        while self.bits < width {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            self.buffer = (self.buffer << 8) | byte as u32;
            self.bits += 8;
        }
        self.bits -= width;
        let code = (self.buffer >> self.bits) & ((1 << width) - 1);
        self.buffer &= (1 << self.bits) - 1;
        Some(code as u16)
    }
}

struct BitWriter {
    out: Vec<u8>,
    buffer: u32,
    bits: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            out: Vec::new(),
            buffer: 0,
            bits: 0,
        }
    }

    fn write(&mut self, code: u16, width: u32) {
        self.buffer = (self.buffer << width) | code as u32;
        self.bits += width;
        while self.bits >= 8 {
            self.bits -= 8;
            self.out.push((self.buffer >> self.bits) as u8);
        }
        self.buffer &= (1 << self.bits) - 1;
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.out.push((self.buffer << (8 - self.bits)) as u8);
        }
        self.out
    }
}

/// Decode an LZW stream.
///
/// Table entries are stored as ranges of the output, since every new entry
/// is the previous string plus the first byte of the one that follows it.
pub fn decode(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(options.output_capacity(input.len(), 2));
    let mut reader = BitReader::new(input);
    let mut entries: Vec<(usize, usize)> = Vec::with_capacity(4096);
    let mut previous: Option<(usize, usize)> = None;
    let mut width = 9;

    while let Some(code) = reader.read(width) {
        if code == CLEAR {
            entries.clear();
            previous = None;
            width = 9;
            continue;
        }
        if code == EOI {
            break;
        }

        let start = out.len();
        let index = code as usize;
        let len = if index < 256 {
            out.push(code as u8);
            1
        } else if let Some(&(s, l)) = entries.get(index - FIRST_CODE as usize) {
            out.extend_from_within(s..s + l);
            l
        } else if index == FIRST_CODE as usize + entries.len() {
            // The code being defined by this very step (KwKwK)
            let (s, l) = previous.ok_or_else(|| CodecError::Decode {
                codec: "LZW",
                message: format!("code {} before any string", code),
            })?;
            out.extend_from_within(s..s + l);
            let first = out[s];
            out.push(first);
            l + 1
        } else {
            return Err(CodecError::Decode {
                codec: "LZW",
                message: format!("invalid code {} (table has {} entries)", code, entries.len()),
            });
        };

        if let Some((s, l)) = previous {
            if FIRST_CODE + (entries.len() as u32) < 4096 {
                entries.push((s, l + 1));
            }
        }
        previous = Some((start, len));
        width = code_width(FIRST_CODE + entries.len() as u32 + 1);

        if options.max_bytes.is_some_and(|max| out.len() >= max) {
            break;
        }
    }

    if let Some(max) = options.max_bytes {
        out.truncate(max);
    }
    Ok(out)
}

/// Encode bytes as an LZW stream readable by [`decode`] and other TIFF readers.
pub fn encode(input: &[u8], _options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let mut writer = BitWriter::new();
    let mut table: HashMap<(u16, u8), u16> = HashMap::new();
    let mut next = FIRST_CODE;
    let mut width = 9;

    writer.write(CLEAR, width);

    let mut current: Option<u16> = None;
    for &byte in input {
        let Some(prefix) = current else {
            current = Some(byte as u16);
            continue;
        };
        if let Some(&code) = table.get(&(prefix, byte)) {
            current = Some(code);
            continue;
        }

        writer.write(prefix, width);
        table.insert((prefix, byte), next as u16);
        next += 1;
        if next == MAX_TABLE {
            writer.write(CLEAR, width);
            table.clear();
            next = FIRST_CODE;
            width = 9;
        } else {
            width = code_width(next);
        }
        current = Some(byte as u16);
    }

    if let Some(prefix) = current {
        writer.write(prefix, width);
        next += 1;
        if next == MAX_TABLE {
            writer.write(CLEAR, width);
            width = 9;
        } else {
            width = code_width(next);
        }
    }
    writer.write(EOI, width);

    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let options = CodecOptions::default();
        let encoded = encode(data, &options).unwrap();
        let decoded = decode(&encoded, &options).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_known_stream() {
        // Example from the TIFF 6.0 specification, section 13
        let encoded = [0x80, 0x01, 0xE0, 0x40, 0x80, 0x44, 0x08, 0x0C, 0x06, 0x80, 0x80];
        let decoded = decode(&encoded, &CodecOptions::default()).unwrap();
        assert_eq!(decoded, vec![7, 7, 7, 8, 8, 7, 7, 6, 6]);
    }

    #[test]
    fn test_repetitive_input_compresses() {
        let data = vec![42u8; 10_000];
        let encoded = encode(&data, &CodecOptions::default()).unwrap();
        assert!(encoded.len() < 500);
        roundtrip(&data);
    }

    #[test]
    fn test_table_reset_on_long_input() {
        // Pseudo-random data fills the 4096-entry table several times over
        let mut state = 0x1234_5678u32;
        let data: Vec<u8> = (0..60_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 7) as u8
            })
            .collect();
        roundtrip(&data);
    }

    #[test]
    fn test_empty_and_single() {
        roundtrip(&[]);
        roundtrip(&[9]);
    }

    #[test]
    fn test_max_bytes_truncates() {
        let data = vec![1u8; 100];
        let encoded = encode(&data, &CodecOptions::default()).unwrap();
        let options = CodecOptions {
            max_bytes: Some(10),
            ..Default::default()
        };
        assert_eq!(decode(&encoded, &options).unwrap().len(), 10);
    }

    #[test]
    fn test_invalid_code() {
        // Clear, then code 300 with an empty table
        let mut writer = BitWriter::new();
        writer.write(CLEAR, 9);
        writer.write(300, 9);
        let result = decode(&writer.finish(), &CodecOptions::default());
        assert!(matches!(result, Err(CodecError::Decode { codec: "LZW", .. })));
    }
}
