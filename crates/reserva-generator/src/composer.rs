use crate::{contextual, Slot};
use jiff::Timestamp;
use reserva_core::{Pattern, ReservationError, ReservationKey, Segment, Variables};

/// One position of a resolved pattern: fixed text, or a slot still to be drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Fixed(String),
    Slot(Slot),
}

/// A pattern with every literal and contextual segment turned into fixed text.
///
/// What remains to vary are the slots; the product of their value spaces is
/// the capacity under the resolved key.
#[derive(Debug, Clone)]
pub struct ResolvedPattern {
    key: ReservationKey,
    parts: Vec<Part>,
}

impl ResolvedPattern {
    pub fn key(&self) -> &ReservationKey {
        &self.key
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.parts.iter().filter_map(|part| match part {
            Part::Slot(slot) => Some(slot),
            Part::Fixed(_) => None,
        })
    }

    pub fn has_slots(&self) -> bool {
        self.slots().next().is_some()
    }

    pub fn has_random(&self) -> bool {
        self.slots().any(|slot| matches!(slot, Slot::Random(_)))
    }

    /// Product of every slot's value space; `1` when there are no slots.
    pub fn capacity(&self) -> u128 {
        self.slots()
            .fold(1u128, |acc, slot| acc.saturating_mul(slot.value_space()))
    }

    /// Concatenates fixed text and one fragment per slot, in pattern order.
    ///
    /// Missing fragments are treated as empty; extra ones are ignored.
    pub fn compose<S: AsRef<str>>(&self, fragments: &[S]) -> String {
        let mut fragments = fragments.iter();
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Fixed(text) => out.push_str(text),
                Part::Slot(_) => {
                    if let Some(fragment) = fragments.next() {
                        out.push_str(fragment.as_ref());
                    }
                }
            }
        }
        out
    }

    /// The `ordinal`-th candidate of the whole pattern, the last slot varying
    /// fastest. For digit-only slots this is ascending lexical order.
    pub fn nth(&self, ordinal: u128) -> String {
        let slots: Vec<&Slot> = self.slots().collect();
        let mut fragments = vec![String::new(); slots.len()];
        let mut rest = ordinal;
        for (fragment, slot) in fragments.iter_mut().zip(&slots).rev() {
            let space = slot.value_space();
            *fragment = slot.nth(rest % space);
            rest /= space;
        }
        self.compose(&fragments)
    }

    /// Draws one candidate by sampling every slot.
    pub fn sample<R: rand::Rng>(&self, rng: &mut R) -> String {
        let fragments: Vec<String> = self.slots().map(|slot| slot.sample(&mut *rng)).collect();
        self.compose(&fragments)
    }
}

/// Resolves literal and contextual segments against the request context.
///
/// Fails before anything is generated if a contextual variable is missing.
pub fn resolve(
    pattern: &Pattern,
    variables: &Variables,
    now: Timestamp,
) -> Result<ResolvedPattern, ReservationError> {
    let mut parts = Vec::with_capacity(pattern.segments().len());
    let mut contextual_fragments = Vec::new();

    for segment in pattern.segments() {
        let part = match segment {
            Segment::Literal(text) => Part::Fixed(text.clone()),
            Segment::Sequential(format) => Part::Slot(Slot::Sequential(*format)),
            Segment::Random(format) => Part::Slot(Slot::Random(format.clone())),
            Segment::Contextual(format) => {
                let fragment = contextual::resolve(format, variables, now)?;
                contextual_fragments.push(fragment.clone());
                Part::Fixed(fragment)
            }
        };
        parts.push(part);
    }

    Ok(ResolvedPattern {
        key: ReservationKey::new(
            pattern.owner().clone(),
            signature(pattern, &contextual_fragments),
        ),
        parts,
    })
}

/// Capacity of a pattern before any context is applied: the product of the
/// value spaces of its generated segments. Literal and contextual segments
/// contribute a factor of one.
pub fn capacity(pattern: &Pattern) -> u128 {
    pattern
        .segments()
        .iter()
        .fold(1u128, |acc, segment| match segment {
            Segment::Sequential(format) => acc.saturating_mul(format.value_space()),
            Segment::Random(format) => acc.saturating_mul(format.value_space()),
            Segment::Literal(_) | Segment::Contextual(_) => acc,
        })
}

/// Builds the reservation signature: the shapes of every non-literal
/// segment, each contextual shape followed by its resolved fragment.
pub fn signature<S: AsRef<str>>(pattern: &Pattern, contextual_fragments: &[S]) -> String {
    let mut fragments = contextual_fragments.iter();
    let mut out = String::new();
    for segment in pattern.segments() {
        let Some(shape) = segment.shape() else {
            continue;
        };
        out.push_str(&shape);
        if let Segment::Contextual(_) = segment {
            out.push('[');
            if let Some(fragment) = fragments.next() {
                out.push_str(fragment.as_ref());
            }
            out.push(']');
        }
    }
    out
}

/// Recovers the reservation key of a complete value of `pattern`.
///
/// Every segment has a fixed width, so the contextual fragments can be cut
/// out of the value directly. Returns `None` when the value does not have the
/// pattern's shape.
pub fn key_for_value(pattern: &Pattern, value: &str) -> Option<ReservationKey> {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() != pattern.width() {
        return None;
    }

    let mut offset = 0;
    let mut contextual_fragments = Vec::new();
    for segment in pattern.segments() {
        let piece = &chars[offset..offset + segment.width()];
        offset += segment.width();
        let fits = match segment {
            Segment::Literal(text) => text.chars().eq(piece.iter().copied()),
            Segment::Sequential(_) => piece.iter().all(char::is_ascii_digit),
            Segment::Random(format) => format
                .classes()
                .iter()
                .zip(piece)
                .all(|(class, c)| class.contains(*c)),
            Segment::Contextual(_) => {
                contextual_fragments.push(piece.iter().collect::<String>());
                true
            }
        };
        if !fits {
            return None;
        }
    }

    Some(ReservationKey::new(
        pattern.owner().clone(),
        signature(pattern, &contextual_fragments),
    ))
}
