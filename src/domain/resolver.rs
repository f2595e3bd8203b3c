//! Instantaneous current-limit query and composite schedule computation (spec §4.C).

use chrono::{DateTime, Duration, Timelike, Utc};

use super::profile::{
    ChargingProfile, ChargingProfileKind, ChargingProfilePurpose, ChargingRateUnit,
    ChargingSchedule, ChargingSchedulePeriod, RecurrencyKind,
};
use super::store::ProfileStore;

/// The currently active transaction, if any: `(transactionId, transactionStart)`.
/// `Relative`-kind profiles use `transactionStart` as their schedule origin;
/// `Tx`-purpose profiles are filtered against `transactionId`.
pub type TransactionContext = Option<(i64, DateTime<Utc>)>;

fn effective_start(profile: &ChargingProfile, now: DateTime<Utc>, tx: TransactionContext) -> Option<DateTime<Utc>> {
    match profile.kind {
        ChargingProfileKind::Absolute => profile.schedule.start_schedule,
        ChargingProfileKind::Recurring => {
            let anchor = profile.schedule.start_schedule?;
            match profile.recurrency_kind {
                Some(RecurrencyKind::Daily) => {
                    let today = now.date_naive();
                    let projected = today.and_time(anchor.time());
                    let projected = DateTime::<Utc>::from_naive_utc_and_offset(projected, Utc);
                    if projected > now {
                        Some(projected - Duration::days(1))
                    } else {
                        Some(projected)
                    }
                }
                Some(RecurrencyKind::Weekly) => {
                    let days_since = (now.weekday().num_days_from_monday() as i64
                        - anchor.weekday().num_days_from_monday() as i64)
                        .rem_euclid(7);
                    let candidate_date = now.date_naive() - Duration::days(days_since);
                    let candidate = candidate_date.and_time(anchor.time());
                    let candidate = DateTime::<Utc>::from_naive_utc_and_offset(candidate, Utc);
                    if candidate > now {
                        Some(candidate - Duration::days(7))
                    } else {
                        Some(candidate)
                    }
                }
                None => None,
            }
        }
        ChargingProfileKind::Relative => tx.map(|(_, tx_start)| tx_start),
    }
}

fn candidate_contribution(profile: &ChargingProfile, now: DateTime<Utc>, tx: TransactionContext) -> Option<f64> {
    if let Some(from) = profile.valid_from {
        if now < from {
            return None;
        }
    }
    if let Some(to) = profile.valid_to {
        if now > to {
            return None;
        }
    }

    if profile.purpose == ChargingProfilePurpose::Tx {
        match tx {
            Some((tx_id, _)) if profile.transaction_id == Some(tx_id) => {}
            _ => return None,
        }
    }

    let start = effective_start(profile, now, tx)?;
    let elapsed = now - start;
    if elapsed < Duration::zero() {
        return None;
    }
    let elapsed_secs = elapsed.num_seconds() as u32;
    if let Some(duration) = profile.schedule.duration {
        if elapsed_secs > duration {
            return None;
        }
    }

    profile
        .schedule
        .periods
        .iter()
        .rev()
        .find(|p| p.start_period <= elapsed_secs)
        .map(|p| p.limit)
}

fn candidates(store: &ProfileStore, connector_id: u32) -> Vec<ChargingProfile> {
    let mut all = store.list_for_connector(0);
    if connector_id != 0 {
        all.extend(store.list_for_connector(connector_id));
    }
    all
}

/// Most restrictive (minimum) limit applicable right now. `None` if no profile applies.
pub fn current_limit(
    store: &ProfileStore,
    connector_id: u32,
    now: DateTime<Utc>,
    tx: TransactionContext,
) -> Option<f64> {
    candidates(store, connector_id)
        .iter()
        .filter_map(|p| candidate_contribution(p, now, tx))
        .fold(None, |acc, v| match acc {
            None => Some(v),
            Some(min) => Some(min.min(v)),
        })
}

/// Per-second sampling + run-length-encoding into periods (reference semantics;
/// an analytical per-profile-segment merge is permitted by spec §9 item 2).
/// `Relative` profiles are always skipped — there is no transaction context here.
pub fn composite_schedule(
    store: &ProfileStore,
    connector_id: u32,
    duration: u32,
    unit: ChargingRateUnit,
    start_time: DateTime<Utc>,
) -> Option<ChargingSchedule> {
    let mut periods = Vec::new();
    let mut current: Option<(u32, f64)> = None;

    for offset in 0..duration {
        let t = start_time + Duration::seconds(offset as i64);
        let limit = current_limit(store, connector_id, t, None);

        current = match (current, limit) {
            (Some((start, cur)), Some(l)) if cur == l => Some((start, cur)),
            (Some((start, cur)), other) => {
                periods.push(ChargingSchedulePeriod {
                    start_period: start,
                    limit: cur,
                    number_phases: None,
                });
                other.map(|l| (offset, l))
            }
            (None, Some(l)) => Some((offset, l)),
            (None, None) => None,
        };
    }
    if let Some((start, limit)) = current {
        periods.push(ChargingSchedulePeriod {
            start_period: start,
            limit,
            number_phases: None,
        });
    }

    if periods.is_empty() {
        return None;
    }

    Some(ChargingSchedule {
        rate_unit: unit,
        periods,
        duration: Some(duration),
        start_schedule: Some(start_time),
        min_charging_rate: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile::{ChargingProfileKind, ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod};
    use crate::domain::store::ProfileStore;
    use chrono::TimeZone;

    fn abs_profile(
        id: u32,
        purpose: ChargingProfilePurpose,
        stack_level: u32,
        start: DateTime<Utc>,
        periods: Vec<(u32, f64)>,
        tx_id: Option<i64>,
        duration: Option<u32>,
    ) -> ChargingProfile {
        ChargingProfile {
            id,
            stack_level,
            purpose,
            kind: ChargingProfileKind::Absolute,
            schedule: ChargingSchedule {
                rate_unit: ChargingRateUnit::Watts,
                periods: periods
                    .into_iter()
                    .map(|(sp, l)| ChargingSchedulePeriod {
                        start_period: sp,
                        limit: l,
                        number_phases: None,
                    })
                    .collect(),
                duration,
                start_schedule: Some(start),
                min_charging_rate: None,
            },
            transaction_id: tx_id,
            recurrency_kind: None,
            valid_from: None,
            valid_to: None,
        }
    }

    #[test]
    fn s1_stack_minimum_wins() {
        let mut store = ProfileStore::new();
        let start = Utc.with_ymd_and_hms(2026, 1, 8, 10, 0, 0).unwrap();
        store
            .add(0, abs_profile(1, ChargingProfilePurpose::ChargePointMax, 0, start, vec![(0, 22000.0)], None, None))
            .unwrap();
        store
            .add(1, abs_profile(2, ChargingProfilePurpose::TxDefault, 0, start, vec![(0, 11000.0)], None, None))
            .unwrap();

        assert_eq!(current_limit(&store, 1, start, None), Some(11000.0));
    }

    #[test]
    fn s2_tx_profile_filters_by_tx_id() {
        let mut store = ProfileStore::new();
        let start = Utc.with_ymd_and_hms(2026, 1, 8, 10, 0, 0).unwrap();
        store
            .add(1, abs_profile(1, ChargingProfilePurpose::Tx, 0, start, vec![(0, 5000.0)], Some(1234), None))
            .unwrap();

        assert_eq!(current_limit(&store, 1, start, Some((1234, start))), Some(5000.0));
        assert_eq!(current_limit(&store, 1, start, Some((5678, start))), None);
    }

    #[test]
    fn s3_recurring_daily() {
        let mut store = ProfileStore::new();
        let anchor = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let mut profile = abs_profile(
            1,
            ChargingProfilePurpose::TxDefault,
            0,
            anchor,
            vec![(0, 11000.0), (3600, 7000.0)],
            None,
            Some(7200),
        );
        profile.kind = ChargingProfileKind::Recurring;
        profile.recurrency_kind = Some(RecurrencyKind::Daily);
        store.add(0, profile).unwrap();

        let at_0830 = Utc.with_ymd_and_hms(2026, 1, 8, 8, 30, 0).unwrap();
        let at_0930 = Utc.with_ymd_and_hms(2026, 1, 8, 9, 30, 0).unwrap();
        let at_1030 = Utc.with_ymd_and_hms(2026, 1, 8, 10, 30, 0).unwrap();

        assert_eq!(current_limit(&store, 1, at_0830, None), Some(11000.0));
        assert_eq!(current_limit(&store, 1, at_0930, None), Some(7000.0));
        assert_eq!(current_limit(&store, 1, at_1030, None), None);
    }

    #[test]
    fn s6_expired_profile_ignored() {
        let mut store = ProfileStore::new();
        let now = Utc::now();
        let mut profile = abs_profile(1, ChargingProfilePurpose::TxDefault, 0, now - Duration::hours(2), vec![(0, 1000.0)], None, None);
        profile.valid_to = Some(now - Duration::hours(1));
        store.add(1, profile).unwrap();

        assert_eq!(current_limit(&store, 1, now, None), None);
        assert_eq!(composite_schedule(&store, 1, 60, ChargingRateUnit::Watts, now), None);
    }

    #[test]
    fn composite_schedule_merges_adjacent_equal_periods() {
        let mut store = ProfileStore::new();
        let start = Utc.with_ymd_and_hms(2026, 1, 8, 10, 0, 0).unwrap();
        store
            .add(1, abs_profile(1, ChargingProfilePurpose::TxDefault, 0, start, vec![(0, 11000.0), (5, 7000.0)], None, None))
            .unwrap();

        let schedule = composite_schedule(&store, 1, 10, ChargingRateUnit::Watts, start).unwrap();
        assert_eq!(schedule.periods.len(), 2);
        assert_eq!(schedule.periods[0], ChargingSchedulePeriod { start_period: 0, limit: 11000.0, number_phases: None });
        assert_eq!(schedule.periods[1], ChargingSchedulePeriod { start_period: 5, limit: 7000.0, number_phases: None });
    }
}
