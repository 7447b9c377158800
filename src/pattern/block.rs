//! Variable blocks of a file pattern.
//!
//! A block is the text between `<` and `>`:
//!
//! - `<1-12>`, `<01-12>`, `<0-90:10>`: numeric range, zero padded when both
//!   ends have the same width
//! - `<A-D>`, `<a-e:2>`: single-letter range
//! - `<red,green,blue>`: explicit enumeration

use serde::Serialize;

use crate::error::PatternError;
use crate::metadata::AxisType;

/// Upper bound on the names one block, or one whole pattern, may expand to.
pub const MAX_PATTERN_FILES: u64 = 1 << 20;

/// One variable span of a [`FilePattern`](super::FilePattern).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternBlock {
    text: String,
    elements: Vec<String>,
    numeric: bool,
    fixed_width: bool,
    /// Advisory axis the block is thought to vary along
    pub axis: Option<AxisType>,
}

impl PatternBlock {
    /// Parse a block including its angle brackets.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let syntax = |message: &str| PatternError::Syntax {
            pattern: text.to_string(),
            message: message.to_string(),
        };
        let inner = text
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .ok_or_else(|| syntax("block must be enclosed in <>"))?;
        if inner.is_empty() {
            return Err(syntax("empty block"));
        }

        if inner.contains(',') {
            let elements: Vec<String> = inner.split(',').map(str::to_string).collect();
            if elements.iter().any(String::is_empty) {
                return Err(syntax("empty element"));
            }
            let numeric = elements.iter().all(|e| is_digits(e));
            let fixed_width = numeric && elements.iter().all(|e| e.len() == elements[0].len());
            return Ok(Self {
                text: text.to_string(),
                elements,
                numeric,
                fixed_width,
                axis: None,
            });
        }

        let (range, step) = match inner.split_once(':') {
            Some((range, step)) => {
                let step: u64 = step.parse().map_err(|_| syntax("step is not a number"))?;
                (range, step)
            }
            None => (inner, 1),
        };
        if step == 0 {
            return Err(syntax("step must be positive"));
        }
        // A step wider than the range keeps only the first element
        let stride = usize::try_from(step).unwrap_or(usize::MAX);

        let Some((start, end)) = range.split_once('-') else {
            // A single element
            return Ok(Self {
                text: text.to_string(),
                elements: vec![inner.to_string()],
                numeric: is_digits(inner),
                fixed_width: is_digits(inner),
                axis: None,
            });
        };

        if is_digits(start) && is_digits(end) {
            let first: u64 = start.parse().map_err(|_| syntax("range start too large"))?;
            let last: u64 = end.parse().map_err(|_| syntax("range end too large"))?;
            if first > last {
                return Err(syntax("range start exceeds end"));
            }
            if (last - first) / step >= MAX_PATTERN_FILES {
                return Err(PatternError::Syntax {
                    pattern: text.to_string(),
                    message: format!("range expands to more than {} names", MAX_PATTERN_FILES),
                });
            }
            let width = if start.len() == end.len() { start.len() } else { 0 };
            let elements = (first..=last)
                .step_by(stride)
                .map(|n| format!("{:0width$}", n, width = width))
                .collect();
            return Ok(Self {
                text: text.to_string(),
                elements,
                numeric: true,
                fixed_width: width > 0,
                axis: None,
            });
        }

        match (single_letter(start), single_letter(end)) {
            (Some(first), Some(last)) if first <= last => {
                let elements = (first..=last)
                    .step_by(stride)
                    .map(|c| char::from(c).to_string())
                    .collect();
                Ok(Self {
                    text: text.to_string(),
                    elements,
                    numeric: false,
                    fixed_width: true,
                    axis: None,
                })
            }
            (Some(_), Some(_)) => Err(syntax("range start exceeds end")),
            _ => Err(syntax("range ends must both be numbers or single letters")),
        }
    }

    /// Build the most compact block listing `values`.
    ///
    /// Values are deduplicated and sorted (numerically when all are digits).
    /// Evenly spaced numbers of consistent width become a range, as do
    /// evenly spaced single letters; anything else is enumerated.
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        let mut values: Vec<String> = values.iter().map(|v| v.as_ref().to_string()).collect();
        let numeric = !values.is_empty() && values.iter().all(|v| is_digits(v));
        if numeric {
            values.sort_by(|a, b| {
                a.trim_start_matches('0')
                    .len()
                    .cmp(&b.trim_start_matches('0').len())
                    .then_with(|| a.trim_start_matches('0').cmp(b.trim_start_matches('0')))
                    .then_with(|| a.cmp(b))
            });
        } else {
            values.sort();
        }
        values.dedup();

        let text = range_text(&values, numeric).unwrap_or_else(|| format!("<{}>", values.join(",")));
        match Self::parse(&text) {
            Ok(block) if block.elements == values => block,
            // Enumerations always reproduce their values
            _ => Self {
                fixed_width: numeric && values.iter().all(|v| v.len() == values[0].len()),
                text: format!("<{}>", values.join(",")),
                elements: values,
                numeric,
                axis: None,
            },
        }
    }

    /// Block text including the angle brackets.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Every value the block stands for, in order.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    /// Whether every element has the same width.
    pub fn is_fixed_width(&self) -> bool {
        self.fixed_width
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn single_letter(text: &str) -> Option<u8> {
    match text.as_bytes() {
        [c] if c.is_ascii_alphabetic() => Some(*c),
        _ => None,
    }
}

/// `<start-end[:step]>` for evenly spaced values, if they are.
fn range_text(values: &[String], numeric: bool) -> Option<String> {
    if values.len() < 2 {
        return None;
    }
    let points: Vec<u64> = if numeric {
        let same_width = values.iter().all(|v| v.len() == values[0].len());
        let padded = values.iter().any(|v| v.len() > 1 && v.starts_with('0'));
        if padded && !same_width {
            return None;
        }
        values.iter().map(|v| v.parse().ok()).collect::<Option<_>>()?
    } else {
        values
            .iter()
            .map(|v| single_letter(v).map(u64::from))
            .collect::<Option<_>>()?
    };

    let step = points[1].checked_sub(points[0]).filter(|&s| s > 0)?;
    if points.windows(2).any(|w| w[1].checked_sub(w[0]) != Some(step)) {
        return None;
    }
    let (first, last) = (&values[0], &values[values.len() - 1]);
    Some(if step == 1 {
        format!("<{}-{}>", first, last)
    } else {
        format!("<{}-{}:{}>", first, last, step)
    })
}
