use jiff::fmt::strtime::BrokenDownTime;
use jiff::tz::TimeZone;
use jiff::Timestamp;
use reserva_core::{ContextSource, ContextualFormat, ReservationError, Variables};

/// Derives the fragment of a contextual segment from the request context.
///
/// Fails with [`ReservationError::InvalidVariable`] when the variable the
/// segment needs is absent.
pub fn resolve(
    format: &ContextualFormat,
    variables: &Variables,
    now: Timestamp,
) -> Result<String, ReservationError> {
    let raw = match format.source() {
        ContextSource::Variable(name) => variables
            .get(name)
            .cloned()
            .ok_or_else(|| ReservationError::InvalidVariable(name.clone()))?,
        ContextSource::CurrentDate(strftime) => {
            let zoned = now.to_zoned(TimeZone::UTC);
            BrokenDownTime::from(&zoned)
                .to_string(strftime)
                .map_err(|e| {
                    ReservationError::InvalidRequest(format!(
                        "invalid date format '{strftime}': {e}"
                    ))
                })?
        }
    };
    Ok(format.fit(&raw))
}
