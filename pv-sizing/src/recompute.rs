//! Single-flight bookkeeping for estimator round-trips.
//!
//! Each recomputation takes a ticket. Only the newest ticket may apply its
//! response, and only while the inputs it was issued for are still current.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use pv_model::{Coordinates, Inverter, Orientation, PvModule};
use tracing::{debug, warn};

/// Hash of every input that affects a yield estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputFingerprint(u64);

/// Inputs to fingerprint. Floats are hashed by bit pattern.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintInputs<'a> {
    pub module: Option<&'a PvModule>,
    pub inverter: Option<&'a Inverter>,
    pub inverter_quantity: u32,
    pub orientations: &'a [Orientation],
    pub coordinates: Coordinates,
    pub total_loss_pct: f64,
    pub safety_margin: f64,
    pub decomposition_model: Option<&'a str>,
    pub transposition_model: Option<&'a str>,
}

impl InputFingerprint {
    pub fn of(inputs: &FingerprintInputs<'_>) -> Self {
        let mut hasher = DefaultHasher::new();
        inputs.module.map(|m| m.id.as_str()).hash(&mut hasher);
        inputs.inverter.map(|i| i.id.as_str()).hash(&mut hasher);
        inputs.inverter_quantity.hash(&mut hasher);
        inputs.orientations.len().hash(&mut hasher);
        for o in inputs.orientations {
            o.name.hash(&mut hasher);
            o.azimuth_deg.to_bits().hash(&mut hasher);
            o.tilt_deg.to_bits().hash(&mut hasher);
            o.module_count.hash(&mut hasher);
            o.channel.hash(&mut hasher);
        }
        inputs.coordinates.latitude.to_bits().hash(&mut hasher);
        inputs.coordinates.longitude.to_bits().hash(&mut hasher);
        inputs.total_loss_pct.to_bits().hash(&mut hasher);
        inputs.safety_margin.to_bits().hash(&mut hasher);
        inputs.decomposition_model.hash(&mut hasher);
        inputs.transposition_model.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Handle for one in-flight recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub sequence: u64,
    pub fingerprint: InputFingerprint,
}

#[derive(Debug, Default)]
pub struct RecomputeGuard {
    latest: AtomicU64,
}

impl RecomputeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket that supersedes every earlier one.
    pub fn begin(&self, fingerprint: InputFingerprint) -> Ticket {
        let sequence = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(sequence, "recompute started");
        Ticket {
            sequence,
            fingerprint,
        }
    }

    /// True when `ticket` is the newest one and its inputs still match.
    pub fn accept(&self, ticket: &Ticket, current: InputFingerprint) -> bool {
        let latest = self.latest.load(Ordering::SeqCst);
        if ticket.sequence != latest {
            warn!(
                sequence = ticket.sequence,
                latest, "dropping superseded estimator response"
            );
            return false;
        }
        if ticket.fingerprint != current {
            warn!(
                sequence = ticket.sequence,
                "dropping estimator response for inputs that changed meanwhile"
            );
            return false;
        }
        true
    }

    pub fn latest_sequence(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(orientations: &[Orientation], loss: f64) -> FingerprintInputs<'_> {
        FingerprintInputs {
            module: None,
            inverter: None,
            inverter_quantity: 1,
            orientations,
            coordinates: Coordinates::new(4.6, -74.1).unwrap(),
            total_loss_pct: loss,
            safety_margin: 1.0,
            decomposition_model: None,
            transposition_model: None,
        }
    }

    fn fingerprint(orientations: &[Orientation], loss: f64) -> InputFingerprint {
        InputFingerprint::of(&inputs(orientations, loss))
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        let mut list = vec![Orientation::new("South", 180.0, 10.0)];
        let base = fingerprint(&list, 14.0);
        assert_eq!(base, fingerprint(&list, 14.0));
        assert_ne!(base, fingerprint(&list, 15.0));

        list[0].module_count = 4;
        assert_ne!(base, fingerprint(&list, 14.0));
    }

    #[test]
    fn test_fingerprint_tracks_model_identifiers() {
        let list = vec![Orientation::new("South", 180.0, 10.0)];
        let base = fingerprint(&list, 14.0);

        let perez = FingerprintInputs {
            transposition_model: Some("perez"),
            ..inputs(&list, 14.0)
        };
        assert_ne!(base, InputFingerprint::of(&perez));

        let erbs = FingerprintInputs {
            decomposition_model: Some("erbs"),
            ..inputs(&list, 14.0)
        };
        assert_ne!(base, InputFingerprint::of(&erbs));
        assert_ne!(InputFingerprint::of(&perez), InputFingerprint::of(&erbs));
    }

    #[test]
    fn test_only_latest_ticket_is_accepted() {
        let guard = RecomputeGuard::new();
        let fp = fingerprint(&[], 14.0);
        let first = guard.begin(fp);
        let second = guard.begin(fp);

        assert!(!guard.accept(&first, fp));
        assert!(guard.accept(&second, fp));
        assert_eq!(guard.latest_sequence(), 2);
    }

    #[test]
    fn test_changed_inputs_reject_response() {
        let guard = RecomputeGuard::new();
        let ticket = guard.begin(fingerprint(&[], 14.0));
        assert!(!guard.accept(&ticket, fingerprint(&[], 20.0)));
    }
}
