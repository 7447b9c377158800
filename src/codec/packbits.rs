//! PackBits run-length coding (Apple/TIFF variant).

use crate::error::CodecError;

use super::options::CodecOptions;

/// Longest literal or replicate run a single header byte can describe.
const MAX_RUN: usize = 128;

pub fn decode(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let limit = options.max_bytes.unwrap_or(usize::MAX);
    let mut out = Vec::with_capacity(options.output_capacity(input.len(), 2));
    let mut pos = 0;

    while pos < input.len() && out.len() < limit {
        let header = input[pos] as i8;
        pos += 1;
        match header {
            0..=127 => {
                let count = header as usize + 1;
                let literal = input.get(pos..pos + count).ok_or_else(|| CodecError::Decode {
                    codec: "PackBits",
                    message: format!(
                        "literal run of {} bytes at offset {} exceeds input",
                        count,
                        pos - 1
                    ),
                })?;
                out.extend_from_slice(literal);
                pos += count;
            }
            -127..=-1 => {
                let byte = *input.get(pos).ok_or_else(|| CodecError::Decode {
                    codec: "PackBits",
                    message: format!("replicate run at offset {} has no data byte", pos - 1),
                })?;
                pos += 1;
                let count = (1 - header as isize) as usize;
                out.resize(out.len() + count, byte);
            }
            // -128 is a no-op
            _ => {}
        }
    }

    if let Some(max) = options.max_bytes {
        out.truncate(max);
    }
    Ok(out)
}

pub fn encode(input: &[u8], _options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(input.len() + input.len() / MAX_RUN + 1);
    let mut pos = 0;

    while pos < input.len() {
        let run = run_length(&input[pos..]);
        if run >= 2 {
            out.push((1 - run as isize) as i8 as u8);
            out.push(input[pos]);
            pos += run;
            continue;
        }

        // Extend the literal until a run of three or more starts
        let start = pos;
        while pos < input.len() && pos - start < MAX_RUN {
            if run_length(&input[pos..]) >= 3 {
                break;
            }
            pos += 1;
        }
        out.push((pos - start - 1) as u8);
        out.extend_from_slice(&input[start..pos]);
    }

    Ok(out)
}

fn run_length(data: &[u8]) -> usize {
    let first = data[0];
    data.iter()
        .take(MAX_RUN)
        .take_while(|&&b| b == first)
        .count()
}
