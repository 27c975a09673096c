use std::collections::HashMap;

use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{
    CapacityCeiling, CapacityState, ClientUnit, CoachCapacity, CoachRecord, UnitEntry,
    UtilizationLevel,
};

/// Utilization at or above this percentage is flagged as nearing capacity.
pub const NEAR_CAPACITY_PERCENT: i64 = 80;

pub fn compute_capacity_state(
    current_units: f64,
    ceiling: CapacityCeiling,
    global_default: f64,
    is_paused: bool,
) -> CapacityState {
    let max_capacity = ceiling.resolve(global_default);
    let effective_capacity = if is_paused { 0.0 } else { max_capacity };

    let utilization_percentage = if effective_capacity == 0.0 {
        0
    } else {
        (current_units / effective_capacity * 100.0).round() as i64
    };

    CapacityState {
        current_units,
        max_capacity,
        effective_capacity,
        available_units: (effective_capacity - current_units).max(0.0),
        is_paused,
        utilization_percentage,
        is_over_capacity: !is_paused && current_units > effective_capacity,
    }
}

/// Sums the units of active clients. Entries for any other status are
/// skipped, never added as zero.
pub fn sum_active_client_units(units_by_client: &HashMap<Uuid, UnitEntry>) -> f64 {
    units_by_client
        .values()
        .filter(|entry| entry.client_status.is_active())
        .map(|entry| entry.units)
        .sum()
}

/// Keeps the most recently calculated unit row per client of `coach_id`.
pub fn latest_units_by_client(units: &[ClientUnit], coach_id: Uuid) -> HashMap<Uuid, UnitEntry> {
    let mut latest: HashMap<Uuid, &ClientUnit> = HashMap::new();

    for unit in units.iter().filter(|unit| unit.coach_id == coach_id) {
        latest
            .entry(unit.client_id)
            .and_modify(|current| {
                if unit.calculated_at > current.calculated_at {
                    *current = unit;
                }
            })
            .or_insert(unit);
    }

    latest
        .into_iter()
        .map(|(client_id, unit)| {
            (
                client_id,
                UnitEntry {
                    units: unit.calculated_units,
                    client_status: unit.status,
                },
            )
        })
        .collect()
}

impl UtilizationLevel {
    pub fn from_state(state: &CapacityState) -> Self {
        if state.is_paused {
            UtilizationLevel::Paused
        } else if state.is_over_capacity {
            UtilizationLevel::OverCapacity
        } else if state.utilization_percentage >= 100 {
            UtilizationLevel::AtCapacity
        } else if state.utilization_percentage >= NEAR_CAPACITY_PERCENT {
            UtilizationLevel::NearCapacity
        } else {
            UtilizationLevel::Available
        }
    }
}

pub fn summarize_coaches(
    coaches: &[CoachRecord],
    units: &[ClientUnit],
    global_default: f64,
) -> Vec<CoachCapacity> {
    let mut summaries: Vec<CoachCapacity> = coaches
        .iter()
        .map(|coach| {
            let by_client = latest_units_by_client(units, coach.coach_id);
            let active_clients = by_client
                .values()
                .filter(|entry| entry.client_status.is_active())
                .count();
            let current_units = sum_active_client_units(&by_client);
            let state =
                compute_capacity_state(current_units, coach.ceiling, global_default, coach.is_paused);

            CoachCapacity {
                coach_id: coach.coach_id,
                coach_name: coach.coach_name.clone(),
                coach_email: coach.coach_email.clone(),
                active_clients,
                level: UtilizationLevel::from_state(&state),
                state,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.state
            .utilization_percentage
            .cmp(&a.state.utilization_percentage)
            .then_with(|| a.coach_name.cmp(&b.coach_name))
    });
    summaries
}

pub fn validate_default_capacity(units: f64) -> Result<f64, ValidationError> {
    if units.is_finite() && units > 0.0 {
        Ok(units)
    } else {
        Err(ValidationError::DefaultCapacityNotPositive(units))
    }
}

pub fn validate_units(units: f64) -> Result<f64, ValidationError> {
    if units.is_finite() && units >= 0.0 {
        Ok(units)
    } else {
        Err(ValidationError::NegativeUnits(units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientStatus;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    fn entry(units: f64, client_status: ClientStatus) -> UnitEntry {
        UnitEntry {
            units,
            client_status,
        }
    }

    fn unit(client_id: Uuid, coach_id: Uuid, units: f64, days_ago: i64) -> ClientUnit {
        ClientUnit {
            client_id,
            coach_id,
            calculated_units: units,
            status: ClientStatus::Active,
            calculated_at: Utc::now() - Duration::days(days_ago),
        }
    }

    fn coach(name: &str, ceiling: CapacityCeiling, is_paused: bool) -> CoachRecord {
        CoachRecord {
            coach_id: Uuid::new_v4(),
            coach_name: name.to_string(),
            coach_email: format!("{}@example.com", name.to_lowercase()),
            ceiling,
            is_paused,
        }
    }

    #[test]
    fn default_capacity_applies_without_override() {
        let state = compute_capacity_state(15.0, CapacityCeiling::UseDefault, 20.0, false);
        assert_eq!(state.max_capacity, 20.0);
        assert_eq!(state.utilization_percentage, 75);
        assert!(!state.is_over_capacity);
        assert_abs_diff_eq!(state.available_units, 5.0);
    }

    #[test]
    fn explicit_override_wins_over_default() {
        let state = compute_capacity_state(25.0, CapacityCeiling::Explicit(20.0), 8.0, false);
        assert_eq!(state.max_capacity, 20.0);
        assert_eq!(state.utilization_percentage, 125);
        assert!(state.is_over_capacity);
        assert_eq!(state.available_units, 0.0);
    }

    #[test]
    fn paused_coach_has_no_effective_capacity() {
        let state = compute_capacity_state(12.0, CapacityCeiling::Explicit(10.0), 20.0, true);
        assert_eq!(state.max_capacity, 10.0);
        assert_eq!(state.effective_capacity, 0.0);
        assert_eq!(state.utilization_percentage, 0);
        assert!(!state.is_over_capacity);
    }

    #[test]
    fn explicit_zero_capacity_is_over_for_any_units() {
        let state = compute_capacity_state(0.5, CapacityCeiling::Explicit(0.0), 20.0, false);
        assert_eq!(state.utilization_percentage, 0);
        assert!(state.is_over_capacity);

        let empty = compute_capacity_state(0.0, CapacityCeiling::Explicit(0.0), 20.0, false);
        assert!(!empty.is_over_capacity);
    }

    #[test]
    fn utilization_rounds_to_nearest_percent() {
        let state = compute_capacity_state(1.0, CapacityCeiling::Explicit(3.0), 20.0, false);
        assert_eq!(state.utilization_percentage, 33);
        let state = compute_capacity_state(2.0, CapacityCeiling::Explicit(3.0), 20.0, false);
        assert_eq!(state.utilization_percentage, 67);
    }

    #[test]
    fn sum_skips_inactive_clients() {
        let mut units = HashMap::new();
        units.insert(Uuid::new_v4(), entry(2.5, ClientStatus::Active));
        units.insert(Uuid::new_v4(), entry(1.5, ClientStatus::Active));
        units.insert(Uuid::new_v4(), entry(4.0, ClientStatus::Churned));
        units.insert(Uuid::new_v4(), entry(3.0, ClientStatus::Paused));

        assert_abs_diff_eq!(sum_active_client_units(&units), 4.0);
        assert_eq!(sum_active_client_units(&HashMap::new()), 0.0);
    }

    #[test]
    fn latest_row_per_client_is_used() {
        let coach_id = Uuid::new_v4();
        let client_id = Uuid::new_v4();
        let other_coach = Uuid::new_v4();
        let units = vec![
            unit(client_id, coach_id, 1.0, 30),
            unit(client_id, coach_id, 2.0, 1),
            unit(client_id, coach_id, 1.5, 10),
            unit(Uuid::new_v4(), other_coach, 9.0, 1),
        ];

        let latest = latest_units_by_client(&units, coach_id);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[&client_id].units, 2.0);
    }

    #[test]
    fn levels_follow_utilization_thresholds() {
        let level = |units: f64, paused: bool| {
            let state = compute_capacity_state(units, CapacityCeiling::Explicit(10.0), 20.0, paused);
            UtilizationLevel::from_state(&state)
        };

        assert_eq!(level(5.0, false), UtilizationLevel::Available);
        assert_eq!(level(7.9, false), UtilizationLevel::Available);
        assert_eq!(level(8.0, false), UtilizationLevel::NearCapacity);
        assert_eq!(level(10.0, false), UtilizationLevel::AtCapacity);
        assert_eq!(level(10.5, false), UtilizationLevel::OverCapacity);
        assert_eq!(level(15.0, true), UtilizationLevel::Paused);
    }

    #[test]
    fn summaries_sort_by_utilization() {
        let busy = coach("Morgan", CapacityCeiling::Explicit(4.0), false);
        let light = coach("Alex", CapacityCeiling::UseDefault, false);
        let paused = coach("Sam", CapacityCeiling::UseDefault, true);
        let mut churned = unit(Uuid::new_v4(), light.coach_id, 6.0, 2);
        churned.status = ClientStatus::Churned;

        let units = vec![
            unit(Uuid::new_v4(), busy.coach_id, 3.0, 2),
            unit(Uuid::new_v4(), busy.coach_id, 2.0, 2),
            unit(Uuid::new_v4(), light.coach_id, 2.0, 2),
            churned,
            unit(Uuid::new_v4(), paused.coach_id, 1.0, 2),
        ];

        let summaries = summarize_coaches(&[light, paused, busy], &units, 10.0);
        let names: Vec<&str> = summaries.iter().map(|s| s.coach_name.as_str()).collect();
        assert_eq!(names, vec!["Morgan", "Alex", "Sam"]);

        assert_eq!(summaries[0].state.utilization_percentage, 125);
        assert_eq!(summaries[0].level, UtilizationLevel::OverCapacity);
        assert_eq!(summaries[0].active_clients, 2);
        assert_eq!(summaries[1].state.current_units, 2.0);
        assert_eq!(summaries[1].active_clients, 1);
        assert_eq!(summaries[2].level, UtilizationLevel::Paused);
    }

    #[test]
    fn input_validation_rejects_bad_capacities() {
        assert!(CapacityCeiling::explicit(0.0).is_err());
        assert!(CapacityCeiling::explicit(f64::NAN).is_err());
        assert_eq!(
            CapacityCeiling::explicit(12.0),
            Ok(CapacityCeiling::Explicit(12.0))
        );
        assert!(validate_default_capacity(0.0).is_err());
        assert_eq!(validate_default_capacity(8.0), Ok(8.0));
        assert!(validate_units(-1.0).is_err());
        assert_eq!(validate_units(0.0), Ok(0.0));
    }

    #[test]
    fn optional_override_maps_to_ceiling() {
        assert_eq!(CapacityCeiling::from(None), CapacityCeiling::UseDefault);
        assert_eq!(CapacityCeiling::from(Some(6.0)), CapacityCeiling::Explicit(6.0));
    }

    proptest! {
        #[test]
        fn zero_effective_capacity_never_divides(units in 0.0f64..1_000.0, paused in any::<bool>()) {
            let ceiling = if paused { CapacityCeiling::Explicit(12.0) } else { CapacityCeiling::Explicit(0.0) };
            let state = compute_capacity_state(units, ceiling, 20.0, paused);
            prop_assert_eq!(state.utilization_percentage, 0);
        }

        #[test]
        fn paused_is_never_over_capacity(units in 0.0f64..10_000.0, cap in prop::option::of(1.0f64..100.0)) {
            let state = compute_capacity_state(units, cap.into(), 20.0, true);
            prop_assert!(!state.is_over_capacity);
        }

        #[test]
        fn inactive_clients_never_affect_sum(
            active in prop::collection::vec(0.0f64..10.0, 0..12),
            inactive in prop::collection::vec(0.0f64..10.0, 0..12),
        ) {
            let mut units: HashMap<Uuid, UnitEntry> = active
                .iter()
                .map(|u| (Uuid::new_v4(), entry(*u, ClientStatus::Active)))
                .collect();
            let before = sum_active_client_units(&units);

            let added: Vec<Uuid> = inactive
                .iter()
                .map(|u| {
                    let id = Uuid::new_v4();
                    units.insert(id, entry(*u, ClientStatus::Inactive));
                    id
                })
                .collect();
            prop_assert!((sum_active_client_units(&units) - before).abs() < 1e-9);

            for id in added {
                units.remove(&id);
            }
            prop_assert!((sum_active_client_units(&units) - before).abs() < 1e-9);
        }
    }
}
