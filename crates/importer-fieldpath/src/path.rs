//! Field paths for addressing values inside unstructured documents
//!
//! Provides [`FieldPath`], parsed from the Kubernetes-style syntax used by
//! composition templates:
//!
//! - `spec.forProvider.region` → three field segments
//! - `metadata.annotations["crossplane.io/external-name"]` → quoted map key
//! - `spec.rules[0].port` → array index
//!
//! Inside a quoted key, `\` escapes the next character.

use std::fmt::{self, Display, Formatter};
use std::iter::Peekable;
use std::str::{Chars, FromStr};

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member by name
    Field(String),
    /// Array element by position
    Index(usize),
}

impl Segment {
    /// Field segment
    #[inline]
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Index segment
    #[inline]
    #[must_use]
    pub fn index(position: usize) -> Self {
        Self::Index(position)
    }
}

/// Path to a value within a JSON document
///
/// Always has at least one segment; the document root itself is not
/// addressable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// Create path from segments
    ///
    /// # Errors
    /// Returns [`PathError::Empty`] when `segments` is empty.
    pub fn new(segments: Vec<Segment>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self(segments))
    }

    /// Single-field path; extend with [`FieldPath::child`]
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![Segment::Field(name.into())])
    }

    /// Path of an annotation: `metadata.annotations["<key>"]`
    #[must_use]
    pub fn annotation(key: impl Into<String>) -> Self {
        Self(vec![
            Segment::field("metadata"),
            Segment::field("annotations"),
            Segment::Field(key.into()),
        ])
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }

    /// Get last segment
    #[inline]
    #[must_use]
    pub fn last(&self) -> &Segment {
        // Non-empty by construction
        &self.0[self.0.len() - 1]
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Index(position) => write!(f, "[{position}]")?,
                Segment::Field(name) if needs_brackets(name) => {
                    f.write_str("[\"")?;
                    for c in name.chars() {
                        if matches!(c, '"' | '\\') {
                            f.write_str("\\")?;
                        }
                        write!(f, "{c}")?;
                    }
                    f.write_str("\"]")?;
                }
                Segment::Field(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
            }
        }
        Ok(())
    }
}

fn needs_brackets(name: &str) -> bool {
    name.is_empty() || name.contains(['.', '[', ']', '"', '\'', '\\'])
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        let mut field = String::new();
        let mut chars = s.chars().peekable();
        // Set right after a closing bracket, where only '.' or '[' may follow
        let mut after_bracket = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !field.is_empty() {
                        segments.push(Segment::Field(std::mem::take(&mut field)));
                    } else if !after_bracket {
                        return Err(PathError::EmptySegment(s.to_string()));
                    }
                    if matches!(chars.peek(), None | Some('.' | '[')) {
                        return Err(PathError::EmptySegment(s.to_string()));
                    }
                    after_bracket = false;
                }
                '[' => {
                    if !field.is_empty() {
                        segments.push(Segment::Field(std::mem::take(&mut field)));
                    } else if segments.is_empty() {
                        return Err(PathError::LeadingBracket(s.to_string()));
                    }
                    segments.push(parse_bracket(&mut chars, s)?);
                    after_bracket = true;
                }
                ']' => return Err(PathError::UnbalancedBracket(s.to_string())),
                other => {
                    if after_bracket {
                        return Err(PathError::UnexpectedCharacter {
                            path: s.to_string(),
                            found: other,
                        });
                    }
                    field.push(other);
                }
            }
        }

        if !field.is_empty() {
            segments.push(Segment::Field(field));
        }

        Self::new(segments)
    }
}

/// Parse the body of `[...]` after the opening bracket has been consumed
fn parse_bracket(chars: &mut Peekable<Chars<'_>>, path: &str) -> Result<Segment, PathError> {
    if let Some(quote) = chars.next_if(|c| *c == '"' || *c == '\'') {
        let mut key = String::new();
        loop {
            match chars.next() {
                Some(c) if c == quote => break,
                Some('\\') => match chars.next() {
                    Some(escaped) => key.push(escaped),
                    None => return Err(PathError::UnbalancedBracket(path.to_string())),
                },
                Some(c) => key.push(c),
                None => return Err(PathError::UnbalancedBracket(path.to_string())),
            }
        }
        if chars.next() != Some(']') {
            return Err(PathError::UnbalancedBracket(path.to_string()));
        }
        if key.is_empty() {
            return Err(PathError::EmptySegment(path.to_string()));
        }
        return Ok(Segment::Field(key));
    }

    let mut raw = String::new();
    loop {
        match chars.next() {
            Some(']') => break,
            Some('[') | None => return Err(PathError::UnbalancedBracket(path.to_string())),
            Some(c) => raw.push(c),
        }
    }

    if raw.is_empty() {
        return Err(PathError::EmptySegment(path.to_string()));
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let position = raw
            .parse()
            .map_err(|_| PathError::InvalidIndex(raw.clone()))?;
        return Ok(Segment::Index(position));
    }
    Ok(Segment::Field(raw))
}

/// Errors related to field paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path has no segments
    #[error("field path must not be empty")]
    Empty,

    /// Empty segment in path
    #[error("field path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Brackets do not pair up
    #[error("field path '{0}' has unbalanced brackets")]
    UnbalancedBracket(String),

    /// Path begins with a bracket instead of a field
    #[error("field path '{0}' must start with a field name")]
    LeadingBracket(String),

    /// Something other than '.' or '[' follows a closing bracket
    #[error("unexpected character '{found}' after ']' in field path '{path}'")]
    UnexpectedCharacter { path: String, found: char },

    /// Index does not fit in usize
    #[error("invalid array index: {0}")]
    InvalidIndex(String),
}
