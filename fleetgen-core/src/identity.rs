//! Content identifiers for generated records.
//!
//! The identifier is the hex SHA-256 of the five sampled fields joined with
//! `|` in a fixed order:
//!
//! ```text
//! {vehicleType}|{powerSource}|{horsepower}|{modelYear}|{topSpeed}
//! ```
//!
//! Two records with identical fields always share an identifier, so
//! downstream consumers can deduplicate on it.

use sha2::{Digest, Sha256};

use crate::types::VehicleSpec;

/// Field separator of the canonical form.
pub const CANONICAL_SEPARATOR: char = '|';

/// Canonical string the identifier is computed from.
pub fn canonical_string(spec: &VehicleSpec) -> String {
    format!(
        "{ty}{sep}{power}{sep}{hp}{sep}{year}{sep}{speed}",
        ty = spec.vehicle_type,
        power = spec.power_source,
        hp = spec.horsepower,
        year = spec.model_year,
        speed = spec.top_speed,
        sep = CANONICAL_SEPARATOR,
    )
}

/// 64-char lowercase hex identifier for `spec`.
pub fn identifier_for(spec: &VehicleSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_string(spec).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PowerSource, VehicleType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn spec() -> VehicleSpec {
        VehicleSpec {
            vehicle_type: VehicleType::PickUp,
            power_source: PowerSource::Gas,
            horsepower: 220,
            model_year: 1999,
            top_speed: 180,
        }
    }

    #[test]
    fn test_canonical_order() {
        assert_eq!(canonical_string(&spec()), "PickUp|Gas|220|1999|180");
    }

    #[test]
    fn test_identifier_is_deterministic() {
        let first = identifier_for(&spec());
        let second = identifier_for(&spec());
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_known_digest() {
        // sha256("SUV|Electric|75|1980|120")
        let spec = VehicleSpec {
            vehicle_type: VehicleType::Suv,
            power_source: PowerSource::Electric,
            horsepower: 75,
            model_year: 1980,
            top_speed: 120,
        };
        let expected = hex::encode(Sha256::digest(b"SUV|Electric|75|1980|120"));
        assert_eq!(identifier_for(&spec), expected);
    }

    #[test]
    fn test_each_field_changes_identifier() {
        let base = spec();
        let base_id = identifier_for(&base);

        let variants = [
            VehicleSpec {
                vehicle_type: VehicleType::Sedan,
                ..base
            },
            VehicleSpec {
                power_source: PowerSource::Hybrid,
                ..base
            },
            VehicleSpec {
                horsepower: base.horsepower + 1,
                ..base
            },
            VehicleSpec {
                model_year: base.model_year + 1,
                ..base
            },
            VehicleSpec {
                top_speed: base.top_speed + 1,
                ..base
            },
        ];

        for variant in variants {
            assert_ne!(identifier_for(&variant), base_id, "{variant:?}");
        }
    }

    #[test]
    fn test_no_collisions_in_random_sample() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen: HashMap<String, VehicleSpec> = HashMap::new();

        for _ in 0..5_000 {
            let spec = crate::factory::sample_spec(&mut rng);
            let id = identifier_for(&spec);
            if let Some(previous) = seen.insert(id, spec) {
                assert_eq!(previous, spec, "distinct specs share an identifier");
            }
        }
    }
}
