//! Pattern inference.
//!
//! Names are split into maximal runs of digits, maximal runs of letters and
//! the literal text between them. A run becomes a variable block when the
//! names it is compared against take two or more values in its place; every
//! other run stays literal.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::PatternError;
use crate::metadata::AxisType;

use super::axis_guesser::AxisGuesser;
use super::block::PatternBlock;
use super::{FilePattern, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Kind {
    Literal,
    Digits,
    Letters,
}

impl Kind {
    fn of(c: char) -> Self {
        if c.is_ascii_digit() {
            Kind::Digits
        } else if c.is_alphabetic() {
            Kind::Letters
        } else {
            Kind::Literal
        }
    }

    /// Whether `text` could replace a run of this kind.
    fn accepts(self, text: &str) -> bool {
        !text.is_empty() && text.chars().all(|c| Kind::of(c) == self)
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: Kind,
    text: &'a str,
    start: usize,
}

fn tokenize(name: &str) -> Vec<Token<'_>> {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    for (i, c) in name.char_indices() {
        let kind = Kind::of(c);
        let end = i + c.len_utf8();
        if let Some(last) = tokens.last_mut().filter(|t| t.kind == kind) {
            last.text = &name[last.start..end];
            continue;
        }
        tokens.push(Token {
            kind,
            text: &name[i..end],
            start: i,
        });
    }
    tokens
}

/// Token kinds plus literal text; names with equal shapes can share a pattern.
fn shape(tokens: &[Token<'_>]) -> Vec<(Kind, Option<String>)> {
    tokens
        .iter()
        .map(|t| (t.kind, (t.kind == Kind::Literal).then(|| t.text.to_string())))
        .collect()
}

/// Infer the pattern `name` belongs to among `candidates`.
///
/// Each digit or letter run of `name` is compared against the candidates
/// identical to `name` outside that run. Runs whose guessed axis is in
/// `exclude_axes` stay literal.
pub fn find_pattern<S: AsRef<str>>(name: &str, candidates: &[S], exclude_axes: &[AxisType]) -> FilePattern {
    let mut candidates: Vec<&str> = candidates.iter().map(AsRef::as_ref).collect();
    candidates.sort_unstable();
    candidates.dedup();

    let tokens = tokenize(name);
    let values: Vec<Option<Vec<String>>> = tokens
        .iter()
        .map(|token| {
            if token.kind == Kind::Literal {
                return None;
            }
            let prefix = &name[..token.start];
            let suffix = &name[token.start + token.text.len()..];
            let mut seen = BTreeSet::from([token.text.to_string()]);
            for candidate in &candidates {
                if let Some(middle) = candidate
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_suffix(suffix))
                {
                    if token.kind.accepts(middle) {
                        seen.insert(middle.to_string());
                    }
                }
            }
            (seen.len() > 1).then(|| seen.into_iter().collect())
        })
        .collect();

    let pattern = assemble(&tokens, values, exclude_axes);
    debug!(file = name, candidates = candidates.len(), pattern = %pattern, "inferred file pattern");
    pattern
}

/// Infer the pattern of the file at `path` from the other files in its
/// directory.
pub fn find_pattern_for_path(path: &Path, exclude_axes: &[AxisType]) -> Result<FilePattern, PatternError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PatternError::Listing {
            path: path.display().to_string(),
            message: "path has no UTF-8 file name".to_string(),
        })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PatternError::Listing {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() {
            if let Some(file_name) = entry.file_name().to_str() {
                names.push(file_name.to_string());
            }
        }
    }

    Ok(find_pattern(name, &names, exclude_axes).with_directory(dir))
}

/// One pattern covering every name, which must all share the same structure.
pub fn find_pattern_in_list<S: AsRef<str>>(names: &[S]) -> Result<FilePattern, PatternError> {
    let mut names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names.dedup();
    let Some((first, others)) = names.split_first() else {
        return Err(PatternError::NoConsensus("no names given".to_string()));
    };

    let template = tokenize(first);
    let template_shape = shape(&template);
    let mut seen: Vec<BTreeSet<&str>> = template.iter().map(|t| BTreeSet::from([t.text])).collect();
    for other in others {
        let tokens = tokenize(other);
        if shape(&tokens) != template_shape {
            return Err(PatternError::NoConsensus(format!(
                "'{}' and '{}' differ in structure",
                first, other
            )));
        }
        for (set, token) in seen.iter_mut().zip(&tokens) {
            set.insert(token.text);
        }
    }

    let values: Vec<Option<Vec<String>>> = seen
        .into_iter()
        .map(|set| (set.len() > 1).then(|| set.into_iter().map(str::to_string).collect()))
        .collect();
    let pattern = assemble(&template, values, &[]);
    debug!(names = names.len(), pattern = %pattern, "inferred consensus pattern");
    Ok(pattern)
}

/// One pattern per group of structurally equal names, sorted by pattern text.
pub fn find_image_patterns<S: AsRef<str>>(names: &[S]) -> Result<Vec<FilePattern>, PatternError> {
    let mut groups: BTreeMap<Vec<(Kind, Option<String>)>, Vec<&str>> = BTreeMap::new();
    for name in names {
        let name = name.as_ref();
        groups.entry(shape(&tokenize(name))).or_default().push(name);
    }

    let mut patterns = groups
        .values()
        .map(|group| find_pattern_in_list(group))
        .collect::<Result<Vec<_>, _>>()?;
    patterns.sort_by_cached_key(FilePattern::pattern);
    Ok(patterns)
}

/// Build a pattern from tokens and, for each, the values it takes when
/// variable.
fn assemble(tokens: &[Token<'_>], values: Vec<Option<Vec<String>>>, exclude_axes: &[AxisType]) -> FilePattern {
    // (literal text, block) per token; the literal precedes the block
    let mut parts: Vec<(String, Option<PatternBlock>)> = Vec::with_capacity(tokens.len());
    for (token, values) in tokens.iter().zip(values) {
        match values {
            None => parts.push((token.text.to_string(), None)),
            Some(values) => {
                let (fixed, values) = split_common_prefix(token.kind, values);
                parts.push((fixed, Some(PatternBlock::from_values(&values))));
            }
        }
    }

    // Text before each block, for axis labels
    let mut prefixes = Vec::new();
    let mut text = String::new();
    for (literal, block) in &parts {
        text.push_str(literal);
        if let Some(block) = block {
            prefixes.push(text.clone());
            text.push_str(block.text());
        }
    }
    let mut axes = AxisGuesser::new(&prefixes).axis_types().to_vec().into_iter();

    let mut segments = Vec::with_capacity(parts.len() * 2);
    for ((literal, block), token) in parts.into_iter().zip(tokens) {
        match block {
            None => segments.push(Segment::Literal(literal)),
            Some(mut block) => {
                let axis = axes.next().unwrap_or(AxisType::Unknown);
                if exclude_axes.contains(&axis) {
                    segments.push(Segment::Literal(token.text.to_string()));
                } else {
                    block.axis = Some(axis);
                    segments.push(Segment::Literal(literal));
                    segments.push(Segment::Block(block));
                }
            }
        }
    }
    FilePattern::from_segments(segments)
}

/// Peel the digits shared by every value of a fixed-width numeric run, so
/// `001, 002, 003` becomes the literal `00` and the values `1, 2, 3`.
fn split_common_prefix(kind: Kind, values: Vec<String>) -> (String, Vec<String>) {
    let width = values.first().map_or(0, String::len);
    if kind != Kind::Digits || values.iter().any(|v| v.len() != width) {
        return (String::new(), values);
    }
    let common = (0..width.saturating_sub(1))
        .take_while(|&i| values.iter().all(|v| v.as_bytes()[i] == values[0].as_bytes()[i]))
        .count();
    let prefix = values[0][..common].to_string();
    let rest = values.into_iter().map(|v| v[common..].to_string()).collect();
    (prefix, rest)
}
