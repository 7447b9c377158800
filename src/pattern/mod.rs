//! File patterns: one name standing for a family of files.
//!
//! A pattern is literal text with variable blocks in angle brackets, such as
//! `img_z<1-3>_c<dapi,gfp>.tif`. [`FilePattern`] parses and expands them;
//! the `find_*` functions infer them from example names.

mod axis_guesser;
mod block;
mod grouper;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::PatternError;
use crate::metadata::AxisType;

pub use axis_guesser::AxisGuesser;
pub use block::{PatternBlock, MAX_PATTERN_FILES};
pub use grouper::{find_image_patterns, find_pattern, find_pattern_for_path, find_pattern_in_list};

/// Piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Segment {
    Literal(String),
    Block(PatternBlock),
}

/// A parsed file pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePattern {
    segments: Vec<Segment>,
    directory: Option<PathBuf>,
}

impl FilePattern {
    /// Parse pattern text.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        let mut rest = text;
        while let Some(open) = rest.find(['<', '>']) {
            if rest.as_bytes()[open] == b'>' {
                return Err(PatternError::Syntax {
                    pattern: text.to_string(),
                    message: format!("unmatched '>' at byte {}", text.len() - rest.len() + open),
                });
            }
            let close = rest[open..].find('>').ok_or_else(|| PatternError::Syntax {
                pattern: text.to_string(),
                message: "unterminated block".to_string(),
            })? + open;
            if rest[open + 1..close].contains('<') {
                return Err(PatternError::Syntax {
                    pattern: text.to_string(),
                    message: "nested blocks".to_string(),
                });
            }
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            segments.push(Segment::Block(PatternBlock::parse(&rest[open..=close])?));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        let total = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Block(block) => Some(block.len() as u64),
                Segment::Literal(_) => None,
            })
            .try_fold(1u64, |acc, n| acc.checked_mul(n))
            .filter(|&n| n <= MAX_PATTERN_FILES);
        if total.is_none() {
            return Err(PatternError::Syntax {
                pattern: text.to_string(),
                message: format!("pattern expands to more than {} names", MAX_PATTERN_FILES),
            });
        }
        Ok(Self::from_segments(segments))
    }

    pub(crate) fn from_segments(segments: Vec<Segment>) -> Self {
        // Adjacent literals are merged so equal patterns compare equal
        let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) if text.is_empty() => {}
                Segment::Literal(text) => {
                    if let Some(Segment::Literal(last)) = merged.last_mut() {
                        last.push_str(&text);
                    } else {
                        merged.push(Segment::Literal(text));
                    }
                }
                block => merged.push(block),
            }
        }
        Self {
            segments: merged,
            directory: None,
        }
    }

    /// Resolve expanded names against `directory`.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn blocks(&self) -> impl Iterator<Item = &PatternBlock> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Block(block) => Some(block),
            Segment::Literal(_) => None,
        })
    }

    /// Advisory axis of each block, in order.
    pub fn axis_types(&self) -> Vec<Option<AxisType>> {
        self.blocks().map(|b| b.axis).collect()
    }

    /// Whether the pattern has no variable blocks.
    pub fn is_literal(&self) -> bool {
        self.blocks().next().is_none()
    }

    /// Every name the pattern stands for. The first block varies slowest.
    pub fn files(&self) -> Vec<String> {
        let mut names = vec![String::new()];
        for segment in &self.segments {
            names = match segment {
                Segment::Literal(text) => names.into_iter().map(|n| n + text).collect(),
                Segment::Block(block) => names
                    .iter()
                    .flat_map(|n| block.elements().iter().map(move |e| format!("{}{}", n, e)))
                    .collect(),
            };
        }
        names
    }

    /// [`files`](Self::files) joined to the pattern's directory, if any.
    pub fn paths(&self) -> Vec<PathBuf> {
        let files = self.files();
        match &self.directory {
            Some(dir) => files.into_iter().map(|f| dir.join(f)).collect(),
            None => files.into_iter().map(PathBuf::from).collect(),
        }
    }

    /// Whether `name` is one of the names the pattern stands for.
    pub fn matches(&self, name: &str) -> bool {
        fn matches_from(segments: &[Segment], rest: &str) -> bool {
            match segments.split_first() {
                None => rest.is_empty(),
                Some((Segment::Literal(text), tail)) => rest
                    .strip_prefix(text.as_str())
                    .is_some_and(|r| matches_from(tail, r)),
                Some((Segment::Block(block), tail)) => block.elements().iter().any(|e| {
                    rest.strip_prefix(e.as_str())
                        .is_some_and(|r| matches_from(tail, r))
                }),
            }
        }
        matches_from(&self.segments, name)
    }

    /// Pattern text.
    pub fn pattern(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Block(block) => f.write_str(block.text())?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for FilePattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
