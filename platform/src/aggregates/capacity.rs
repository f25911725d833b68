//! Capacity ledger.
//!
//! An event's `confirmed_requests` never exceeds its `participant_limit`
//! unless the limit is zero (unlimited). These helpers are the only code that
//! reads or moves the counter; callers run them inside the reducer, where
//! check and increment cannot interleave with another command.

use crate::error::DomainError;
use crate::types::Event;

/// A limit of zero admits everyone.
#[must_use]
pub const fn is_unlimited(event: &Event) -> bool {
    event.participant_limit == 0
}

/// Seats still free, or `None` when unlimited.
#[must_use]
pub const fn remaining(event: &Event) -> Option<u32> {
    if is_unlimited(event) {
        None
    } else {
        Some(event.participant_limit.saturating_sub(event.confirmed_requests))
    }
}

/// True when a limited event has no free seat.
#[must_use]
pub const fn is_exhausted(event: &Event) -> bool {
    matches!(remaining(event), Some(0))
}

/// True when `seats` more confirmations fit.
#[must_use]
pub fn has_room_for(event: &Event, seats: u32) -> bool {
    remaining(event).is_none_or(|free| seats <= free)
}

/// Take `seats` seats. Callers check [`has_room_for`] first.
pub fn reserve(event: &mut Event, seats: u32) {
    event.confirmed_requests = event.confirmed_requests.saturating_add(seats);
}

/// Give back one seat.
pub fn release(event: &mut Event) {
    event.confirmed_requests = event.confirmed_requests.saturating_sub(1);
}

/// Check that `limit` can replace the current limit.
///
/// # Errors
///
/// [`DomainError::RestrictionViolation`] if more requests are already
/// confirmed than the new limit allows.
pub fn accepts_limit(event: &Event, limit: u32) -> Result<(), DomainError> {
    if limit != 0 && limit < event.confirmed_requests {
        return Err(DomainError::RestrictionViolation(format!(
            "Participant limit {limit} is below the {} already confirmed requests",
            event.confirmed_requests
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::fixtures;
    use crate::types::EventState;

    fn event(limit: u32, confirmed: u32) -> Event {
        Event {
            confirmed_requests: confirmed,
            ..fixtures::event(EventState::Published, limit, true)
        }
    }

    #[test]
    fn zero_limit_never_exhausts() {
        let event = event(0, 10_000);
        assert!(is_unlimited(&event));
        assert!(!is_exhausted(&event));
        assert!(has_room_for(&event, u32::MAX));
        assert_eq!(remaining(&event), None);
    }

    #[test]
    fn last_seat_then_full() {
        let mut event = event(3, 2);
        assert_eq!(remaining(&event), Some(1));
        assert!(has_room_for(&event, 1));
        assert!(!has_room_for(&event, 2));

        reserve(&mut event, 1);
        assert!(is_exhausted(&event));

        release(&mut event);
        assert_eq!(event.confirmed_requests, 2);
    }

    #[test]
    fn limit_cannot_drop_below_confirmed() {
        let event = event(5, 4);
        assert!(accepts_limit(&event, 4).is_ok());
        assert!(accepts_limit(&event, 0).is_ok());
        assert!(matches!(
            accepts_limit(&event, 3),
            Err(DomainError::RestrictionViolation(_))
        ));
    }
}
