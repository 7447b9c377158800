//! Advisory axis assignment for variable pattern blocks.
//!
//! The text right before a block often names its axis (`z03`, `_ch1`,
//! `time_12`). Blocks with a recognised label get that axis; the rest are
//! handed Z, Time and Channel, in that order, skipping axes already claimed.
//! The result is a guess: only the variable/literal split of a pattern is
//! reliable.

use crate::metadata::AxisType;

const FALLBACK_ORDER: [AxisType; 3] = [AxisType::Z, AxisType::Time, AxisType::Channel];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisGuesser {
    axes: Vec<AxisType>,
}

impl AxisGuesser {
    /// Guess axes for blocks preceded by `prefixes` (the literal text before
    /// each block, in pattern order).
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Self {
        let mut axes: Vec<Option<AxisType>> = prefixes
            .iter()
            .map(|p| Self::label_axis(p.as_ref()))
            .collect();

        let mut fallback = FALLBACK_ORDER
            .into_iter()
            .filter(|axis| !axes.contains(&Some(*axis)))
            .collect::<Vec<_>>()
            .into_iter();
        for axis in axes.iter_mut().filter(|a| a.is_none()) {
            *axis = Some(fallback.next().unwrap_or(AxisType::Unknown));
        }

        Self {
            axes: axes.into_iter().map(|a| a.unwrap_or(AxisType::Unknown)).collect(),
        }
    }

    /// One axis per prefix.
    pub fn axis_types(&self) -> &[AxisType] {
        &self.axes
    }

    /// Axis named by the letters at the end of `prefix`, if any.
    ///
    /// Trailing digits and separators are skipped first, so the prefix of a
    /// zero-padded block (`z_00`) still reads as `z`.
    pub fn label_axis(prefix: &str) -> Option<AxisType> {
        let trimmed = prefix
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .trim_end_matches(['_', '-', '.', ' ']);
        let start = trimmed
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_alphabetic())
            .last()
            .map_or(trimmed.len(), |(i, _)| i);
        let label = trimmed[start..].to_lowercase();

        match label.as_str() {
            "z" | "zs" | "slice" | "focal" | "fp" => Some(AxisType::Z),
            "t" | "tp" | "tl" | "time" => Some(AxisType::Time),
            "c" | "ch" | "channel" | "w" | "wavelength" => Some(AxisType::Channel),
            "s" | "series" => Some(AxisType::Series),
            _ => None,
        }
    }
}
