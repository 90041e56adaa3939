//! Call matching.
//!
//! Aligns the calls of an estimated journey with the stops of a pattern.
//! Recorded calls are tried before estimated calls and every call is
//! consumed at most once, so trips visiting the same stop twice still align.

use tracing::trace;

use crate::domain::{Call, CallKind, EstimatedJourney, StationResolver, Stop, StopPattern};

use super::RejectReason;

/// A call matched to one pattern stop.
#[derive(Debug, Clone, Copy)]
pub struct CallMatch<'a> {
    /// Recorded or estimated
    pub kind: CallKind,
    /// The matched call
    pub call: &'a Call,
    /// The call names a different stop of the same station
    pub substituted: bool,
}

/// Per-stop result of matching a journey against a pattern.
#[derive(Debug)]
pub struct MatchedCalls<'a> {
    matches: Vec<Option<CallMatch<'a>>>,
    stop_pattern_changed: bool,
}

impl<'a> MatchedCalls<'a> {
    /// The call matched to `stop`, if any.
    pub fn at(&self, stop: usize) -> Option<&CallMatch<'a>> {
        self.matches.get(stop).and_then(Option::as_ref)
    }

    /// Whether any stop was matched through a station sibling.
    pub fn stop_pattern_changed(&self) -> bool {
        self.stop_pattern_changed
    }
}

/// Whether `stop_ref` names `stop`, either exactly or as another stop of the
/// same station. Returns `Some(substituted)` on a match.
pub fn stop_matches(stop: &Stop, stop_ref: &str, resolver: &dyn StationResolver) -> Option<bool> {
    if stop.id.id() == stop_ref {
        return Some(false);
    }
    if !resolver.is_part_of_station(stop) {
        return None;
    }
    let alternative = resolver.lookup_stop(stop.id.feed_id(), stop_ref)?;
    resolver
        .is_part_of_same_station(stop, &alternative)
        .then_some(true)
}

/// Match every stop of `pattern` against the calls of `journey`.
///
/// Fails with [`RejectReason::StructuralMismatch`] if the journey has more
/// calls than the pattern has stops, or if any call is left unmatched.
pub fn match_calls<'a>(
    pattern: &StopPattern,
    journey: &'a EstimatedJourney,
    resolver: &dyn StationResolver,
) -> Result<MatchedCalls<'a>, RejectReason> {
    let calls: Vec<(CallKind, &'a Call)> = journey.calls().collect();
    let stops = pattern.len();
    if calls.len() > stops {
        return Err(RejectReason::StructuralMismatch {
            calls: calls.len(),
            stops,
            matched: 0,
        });
    }

    let mut claimed = vec![false; calls.len()];
    let mut stop_pattern_changed = false;
    let mut matches = Vec::with_capacity(stops);

    for pattern_stop in pattern.stops() {
        let found = calls.iter().enumerate().find_map(|(j, (kind, call))| {
            if claimed[j] {
                return None;
            }
            let substituted = stop_matches(&pattern_stop.stop, &call.stop_ref, resolver)?;
            Some((j, *kind, *call, substituted))
        });

        match found {
            Some((j, kind, call, substituted)) => {
                claimed[j] = true;
                if substituted {
                    trace!(stop = %pattern_stop.stop.id, call_stop = %call.stop_ref, "matched station sibling");
                    stop_pattern_changed = true;
                }
                matches.push(Some(CallMatch {
                    kind,
                    call,
                    substituted,
                }));
            }
            None => matches.push(None),
        }
    }

    let matched = claimed.iter().filter(|c| **c).count();
    if matched != calls.len() {
        return Err(RejectReason::StructuralMismatch {
            calls: calls.len(),
            stops,
            matched,
        });
    }

    Ok(MatchedCalls {
        matches,
        stop_pattern_changed,
    })
}
