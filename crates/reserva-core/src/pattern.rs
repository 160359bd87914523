use crate::format::{ContextualFormat, RandomFormat, SequentialFormat};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// The object a pattern belongs to, e.g. an attribute with a given id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Owner {
    pub kind: String,
    pub id: String,
}

impl Owner {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// One unit of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Fixed text copied verbatim into every value.
    Literal(String),
    /// A zero-padded counter handed out in ascending order.
    Sequential(SequentialFormat),
    /// Characters sampled uniformly from per-position classes.
    Random(RandomFormat),
    /// A fragment derived from request context.
    Contextual(ContextualFormat),
}

impl Segment {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Number of characters this segment contributes to a value.
    pub fn width(&self) -> usize {
        match self {
            Self::Literal(text) => text.chars().count(),
            Self::Sequential(format) => format.width(),
            Self::Random(format) => format.width(),
            Self::Contextual(format) => format.width(),
        }
    }

    /// The shape of the segment as it appears in a reservation signature.
    /// Literals have no shape.
    pub fn shape(&self) -> Option<String> {
        match self {
            Self::Literal(_) => None,
            Self::Sequential(format) => Some(format!("SEQUENTIAL({format})")),
            Self::Random(format) => Some(format!("RANDOM({format})")),
            Self::Contextual(format) => Some(format.to_string()),
        }
    }
}

/// An ordered sequence of segments describing the shape of a value.
///
/// Patterns are produced by an external parser and are treated as valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    owner: Owner,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn new(owner: Owner, segments: Vec<Segment>) -> Self {
        Self { owner, segments }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total character width of every value of this pattern.
    pub fn width(&self) -> usize {
        self.segments.iter().map(Segment::width).sum()
    }
}
