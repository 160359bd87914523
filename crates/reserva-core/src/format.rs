use crate::error::FormatError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Widest format accepted for any generated or contextual segment.
pub const MAX_WIDTH: usize = 32;

const DIGITS: &[u8] = b"0123456789";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// The set of characters a single random position may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharClass {
    /// `#`
    Digit,
    /// `x`
    Lower,
    /// `X`
    Upper,
    /// `*`
    Alphanumeric,
}

impl CharClass {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '#' => Some(Self::Digit),
            'x' => Some(Self::Lower),
            'X' => Some(Self::Upper),
            '*' => Some(Self::Alphanumeric),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Digit => '#',
            Self::Lower => 'x',
            Self::Upper => 'X',
            Self::Alphanumeric => '*',
        }
    }

    /// The characters of this class, in ascending byte order.
    pub fn alphabet(self) -> &'static [u8] {
        match self {
            Self::Digit => DIGITS,
            Self::Lower => LOWER,
            Self::Upper => UPPER,
            Self::Alphanumeric => ALPHANUMERIC,
        }
    }

    pub fn contains(self, c: char) -> bool {
        c.is_ascii() && self.alphabet().contains(&(c as u8))
    }
}

fn check_width(width: usize) -> Result<(), FormatError> {
    if width == 0 {
        return Err(FormatError::Empty);
    }
    if width > MAX_WIDTH {
        return Err(FormatError::TooWide {
            width,
            max: MAX_WIDTH,
        });
    }
    Ok(())
}

/// A zero-padded decimal counter, written as a run of `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequentialFormat {
    width: usize,
}

impl SequentialFormat {
    pub fn new(width: usize) -> Result<Self, FormatError> {
        check_width(width)?;
        Ok(Self { width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of distinct counter values, `10^width`.
    pub fn value_space(&self) -> u128 {
        10u128.saturating_pow(self.width as u32)
    }
}

impl FromStr for SequentialFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(symbol) = s.chars().find(|c| *c != '#') {
            return Err(FormatError::InvalidSymbol {
                symbol,
                format: s.to_string(),
            });
        }
        Self::new(s.len())
    }
}

impl Display for SequentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", "#".repeat(self.width))
    }
}

/// One character class per output position, e.g. `xxx###`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RandomFormat {
    classes: Vec<CharClass>,
}

impl RandomFormat {
    pub fn new(classes: Vec<CharClass>) -> Result<Self, FormatError> {
        check_width(classes.len())?;
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[CharClass] {
        &self.classes
    }

    pub fn width(&self) -> usize {
        self.classes.len()
    }

    /// Product of the alphabet sizes of every position.
    pub fn value_space(&self) -> u128 {
        self.classes.iter().fold(1u128, |acc, class| {
            acc.saturating_mul(class.alphabet().len() as u128)
        })
    }
}

impl FromStr for RandomFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let classes = s
            .chars()
            .map(|symbol| {
                CharClass::from_symbol(symbol).ok_or_else(|| FormatError::InvalidSymbol {
                    symbol,
                    format: s.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(classes)
    }
}

impl Display for RandomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.classes
            .iter()
            .try_for_each(|class| write!(f, "{}", class.symbol()))
    }
}

/// Which end of a contextual value is kept when it is longer than the width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Anchor {
    /// `^..`, keep the leading characters.
    #[default]
    Start,
    /// `..$`, keep the trailing characters.
    End,
}

/// Where a contextual segment takes its value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextSource {
    /// A named entry of the caller-supplied variables, e.g. `ORG_UNIT_CODE`.
    Variable(String),
    /// The current UTC date rendered with a strftime format, e.g. `%Y`.
    CurrentDate(String),
}

/// A value derived from context and cut (or padded) to a fixed width.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextualFormat {
    source: ContextSource,
    width: usize,
    anchor: Anchor,
}

impl ContextualFormat {
    pub fn new(source: ContextSource, width: usize, anchor: Anchor) -> Result<Self, FormatError> {
        check_width(width)?;
        Ok(Self {
            source,
            width,
            anchor,
        })
    }

    /// Builds a variable-backed format from a shape such as `..`, `^...` or `..$`.
    pub fn variable(name: impl Into<String>, shape: &str) -> Result<Self, FormatError> {
        let (width, anchor) = parse_shape(shape)?;
        Self::new(ContextSource::Variable(name.into()), width, anchor)
    }

    /// Builds a date-backed format from a strftime pattern and a shape.
    pub fn current_date(strftime: impl Into<String>, shape: &str) -> Result<Self, FormatError> {
        let (width, anchor) = parse_shape(shape)?;
        Self::new(ContextSource::CurrentDate(strftime.into()), width, anchor)
    }

    pub fn source(&self) -> &ContextSource {
        &self.source
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Cuts or left-pads `raw` to exactly `width` characters.
    pub fn fit(&self, raw: &str) -> String {
        let chars: Vec<char> = raw.chars().collect();
        if chars.len() >= self.width {
            let kept = match self.anchor {
                Anchor::Start => &chars[..self.width],
                Anchor::End => &chars[chars.len() - self.width..],
            };
            return kept.iter().collect();
        }
        let mut fitted = "0".repeat(self.width - chars.len());
        fitted.extend(chars);
        fitted
    }
}

fn parse_shape(shape: &str) -> Result<(usize, Anchor), FormatError> {
    let (body, anchor) = if let Some(rest) = shape.strip_prefix('^') {
        (rest, Anchor::Start)
    } else if let Some(rest) = shape.strip_suffix('$') {
        (rest, Anchor::End)
    } else {
        (shape, Anchor::Start)
    };
    if let Some(symbol) = body.chars().find(|c| *c != '.') {
        return Err(FormatError::InvalidSymbol {
            symbol,
            format: shape.to_string(),
        });
    }
    Ok((body.len(), anchor))
}

impl Display for ContextualFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.source {
            ContextSource::Variable(name) => name.as_str(),
            ContextSource::CurrentDate(_) => "CURRENT_DATE",
        };
        let dots = ".".repeat(self.width);
        let shape = match self.anchor {
            Anchor::Start => dots,
            Anchor::End => format!("{dots}$"),
        };
        match &self.source {
            ContextSource::Variable(_) => write!(f, "{name}({shape})"),
            ContextSource::CurrentDate(strftime) => write!(f, "{name}({strftime},{shape})"),
        }
    }
}
