//! Pseudo-random vehicle records, one per tick.

use chrono::{SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::identity::identifier_for;
use crate::types::*;

/// Sample the five fields uniformly from their domains.
pub fn sample_spec<R: Rng + ?Sized>(rng: &mut R) -> VehicleSpec {
    VehicleSpec {
        vehicle_type: *VehicleType::ALL.choose(rng).unwrap_or(&VehicleType::Sedan),
        power_source: *PowerSource::ALL.choose(rng).unwrap_or(&PowerSource::Gas),
        horsepower: rng.gen_range(HORSEPOWER_RANGE.0..=HORSEPOWER_RANGE.1),
        model_year: rng.gen_range(MODEL_YEAR_RANGE.0..=MODEL_YEAR_RANGE.1),
        top_speed: rng.gen_range(TOP_SPEED_RANGE.0..=TOP_SPEED_RANGE.1),
    }
}

/// Current wall-clock time as an ISO-8601 UTC string (`...T12:00:00.000Z`).
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Owns the random source for one generation run.
pub struct RecordFactory {
    rng: StdRng,
}

impl RecordFactory {
    /// Factory seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible factory.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    pub fn next_spec(&mut self) -> VehicleSpec {
        sample_spec(&mut self.rng)
    }

    /// Sample, hash and stamp one record.
    pub fn next_envelope(&mut self) -> VehicleEnvelope {
        let spec = self.next_spec();
        let identifier = identifier_for(&spec);
        VehicleEnvelope::new(spec, identifier, now_timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fields_within_domains() {
        let mut factory = RecordFactory::seeded(42);
        for _ in 0..2_000 {
            let spec = factory.next_spec();
            assert!((75..=300).contains(&spec.horsepower));
            assert!((1980..=2025).contains(&spec.model_year));
            assert!((120..=320).contains(&spec.top_speed));
        }
    }

    #[test]
    fn test_every_variant_is_sampled() {
        let mut factory = RecordFactory::seeded(1);
        let mut types = HashSet::new();
        let mut powers = HashSet::new();
        for _ in 0..500 {
            let spec = factory.next_spec();
            types.insert(spec.vehicle_type);
            powers.insert(spec.power_source);
        }
        assert_eq!(types.len(), 3);
        assert_eq!(powers.len(), 3);
    }

    #[test]
    fn test_seeded_factories_agree() {
        let mut a = RecordFactory::seeded(99);
        let mut b = RecordFactory::seeded(99);
        for _ in 0..50 {
            assert_eq!(a.next_spec(), b.next_spec());
        }
    }

    #[test]
    fn test_envelope_identifier_matches_data() {
        let mut factory = RecordFactory::from_entropy();
        let envelope = factory.next_envelope();
        assert_eq!(envelope.identifier, identifier_for(&envelope.data));
        assert_eq!(envelope.aggregate_type, AGGREGATE_TYPE);
        assert_eq!(envelope.event_type, EVENT_TYPE);
        assert!(envelope.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&envelope.timestamp).is_ok());
    }
}
