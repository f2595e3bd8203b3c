//! Per-connector charging profile storage (spec §4.B).
//!
//! Owned solely by its session (spec §5) — plain in-memory maps are enough,
//! no `DashMap` sharing is needed here unlike the station/connection registries.

use std::collections::HashMap;

use crate::support::errors::StoreError;

use super::profile::{ChargingProfile, ChargingProfilePurpose};

#[derive(Debug, Default)]
pub struct ProfileStore {
    by_connector: HashMap<u32, Vec<ChargingProfile>>,
}

/// Filters for `clear`; `None` means "don't filter on this field".
#[derive(Debug, Default, Clone, Copy)]
pub struct ClearFilter {
    pub connector_id: Option<u32>,
    pub profile_id: Option<u32>,
    pub purpose: Option<ChargingProfilePurpose>,
    pub stack_level: Option<u32>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace-by-id) a profile on `connector_id`.
    ///
    /// Removes any existing profile with the same `id` on this connector first,
    /// then rejects if a *different* surviving profile already occupies the same
    /// `(purpose, stackLevel)` pair.
    pub fn add(&mut self, connector_id: u32, profile: ChargingProfile) -> Result<(), StoreError> {
        let slot = self.by_connector.entry(connector_id).or_default();
        slot.retain(|p| p.id != profile.id);

        if slot.iter().any(|p| p.stack_key() == profile.stack_key()) {
            // Put the removed-by-id entry's absence aside: conflict detection runs
            // against the post-removal set, so re-adding the same id under a new
            // stackLevel only fails if that new slot is taken by someone else.
            return Err(StoreError::ConflictingStack);
        }

        slot.push(profile);
        Ok(())
    }

    /// AND-filtered clear. Returns the number of profiles removed.
    pub fn clear(&mut self, filter: ClearFilter) -> usize {
        let connector_ids: Vec<u32> = match filter.connector_id {
            Some(c) => vec![c],
            None => self.by_connector.keys().copied().collect(),
        };

        let mut removed = 0;
        for cid in connector_ids {
            if let Some(slot) = self.by_connector.get_mut(&cid) {
                let before = slot.len();
                slot.retain(|p| {
                    let id_match = filter.profile_id.map_or(true, |id| p.id == id);
                    let purpose_match = filter.purpose.map_or(true, |purpose| p.purpose == purpose);
                    let stack_match = filter
                        .stack_level
                        .map_or(true, |level| p.stack_level == level);
                    !(id_match && purpose_match && stack_match)
                });
                removed += before - slot.len();
            }
        }
        removed
    }

    pub fn list_for_connector(&self, connector_id: u32) -> Vec<ChargingProfile> {
        self.by_connector
            .get(&connector_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn connector_ids(&self) -> Vec<u32> {
        self.by_connector.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile::{ChargingProfileKind, ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod};
    use chrono::Utc;

    fn profile(id: u32, purpose: ChargingProfilePurpose, stack_level: u32) -> ChargingProfile {
        ChargingProfile {
            id,
            stack_level,
            purpose,
            kind: ChargingProfileKind::Absolute,
            schedule: ChargingSchedule {
                rate_unit: ChargingRateUnit::Watts,
                periods: vec![ChargingSchedulePeriod {
                    start_period: 0,
                    limit: 1000.0,
                    number_phases: None,
                }],
                duration: None,
                start_schedule: Some(Utc::now()),
                min_charging_rate: None,
            },
            transaction_id: None,
            recurrency_kind: None,
            valid_from: None,
            valid_to: None,
        }
    }

    #[test]
    fn add_rejects_stack_conflict() {
        let mut store = ProfileStore::new();
        store
            .add(1, profile(1, ChargingProfilePurpose::TxDefault, 0))
            .unwrap();
        let err = store
            .add(1, profile(2, ChargingProfilePurpose::TxDefault, 0))
            .unwrap_err();
        assert_eq!(err, StoreError::ConflictingStack);
    }

    #[test]
    fn re_adding_same_id_replaces() {
        let mut store = ProfileStore::new();
        store
            .add(1, profile(1, ChargingProfilePurpose::TxDefault, 0))
            .unwrap();
        store
            .add(1, profile(1, ChargingProfilePurpose::TxDefault, 1))
            .unwrap();
        let list = store.list_for_connector(1);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].stack_level, 1);
    }

    #[test]
    fn clear_by_purpose_and_filter() {
        let mut store = ProfileStore::new();
        store
            .add(1, profile(1, ChargingProfilePurpose::TxDefault, 0))
            .unwrap();
        store
            .add(1, profile(2, ChargingProfilePurpose::ChargePointMax, 0))
            .unwrap();

        let removed = store.clear(ClearFilter {
            connector_id: Some(1),
            purpose: Some(ChargingProfilePurpose::TxDefault),
            ..Default::default()
        });

        assert_eq!(removed, 1);
        let survivors = store.list_for_connector(1);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].id, 2);
    }
}
