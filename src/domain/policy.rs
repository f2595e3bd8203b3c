//! Pure charging-decision function (spec §4.D). OCPP profile limits always take
//! precedence over this engine; it is the fallback consulted when no profile applies.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Charge,
    Wait,
    Pause,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
}

impl Decision {
    fn charge(reason: impl Into<String>) -> Self {
        Self { action: Action::Charge, reason: reason.into() }
    }
    fn wait(reason: impl Into<String>) -> Self {
        Self { action: Action::Wait, reason: reason.into() }
    }
    fn pause(reason: impl Into<String>) -> Self {
        Self { action: Action::Pause, reason: reason.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationState {
    pub energy_dispensed_kwh: f64,
    pub charging: bool,
    pub session_active: bool,
}

#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub charge_if_price_below: f64,
    pub max_energy_kwh: f64,
    pub allow_peak_hours: bool,
    pub peak_hours: HashSet<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Env {
    pub current_price: f64,
    pub hour: u32,
}

/// First-match-wins rule order: energy cap, then price, then peak hours, else charge.
pub fn evaluate(state: &StationState, profile: &ProfileConfig, env: &Env) -> Decision {
    if state.energy_dispensed_kwh >= profile.max_energy_kwh {
        return Decision::pause("Energy cap reached");
    }
    if env.current_price > profile.charge_if_price_below {
        return Decision::wait("Price too high");
    }
    if profile.peak_hours.contains(&env.hour) && !profile.allow_peak_hours {
        return Decision::wait("Peak hour block");
    }
    Decision::charge("Conditions OK")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterDecision {
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterValueDecision {
    pub decision: MeterDecision,
    pub reason: String,
}

/// Wh-precise variant for the per-tick meter loop (spec §4.D).
/// `current_energy_wh >= max_energy_wh` stops unconditionally; otherwise the base
/// decision's `pause`/`wait` map to `stop` and `charge` maps to `continue`.
pub fn evaluate_meter_value_decision(
    state: &StationState,
    profile: &ProfileConfig,
    env: &Env,
    current_energy_wh: f64,
    max_energy_wh: f64,
) -> MeterValueDecision {
    if current_energy_wh >= max_energy_wh {
        return MeterValueDecision {
            decision: MeterDecision::Stop,
            reason: "Energy cap reached".to_string(),
        };
    }

    let base = evaluate(state, profile, env);
    let decision = match base.action {
        Action::Charge => MeterDecision::Continue,
        Action::Wait | Action::Pause => MeterDecision::Stop,
    };
    MeterValueDecision { decision, reason: base.reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(energy: f64) -> StationState {
        StationState { energy_dispensed_kwh: energy, charging: true, session_active: true }
    }

    fn profile(max_energy: f64, price_below: f64, allow_peak: bool, peak_hours: &[u32]) -> ProfileConfig {
        ProfileConfig {
            charge_if_price_below: price_below,
            max_energy_kwh: max_energy,
            allow_peak_hours: allow_peak,
            peak_hours: peak_hours.iter().copied().collect(),
        }
    }

    #[test]
    fn s5_policy_ordering_energy_cap_wins_over_price() {
        let decision = evaluate(
            &state(30.0),
            &profile(30.0, 100.0, false, &[18, 19, 20]),
            &Env { current_price: 50.0, hour: 19 },
        );
        assert_eq!(decision.action, Action::Pause);
        assert_eq!(decision.reason, "Energy cap reached");
    }

    #[test]
    fn price_exactly_at_threshold_charges() {
        let decision = evaluate(
            &state(0.0),
            &profile(30.0, 25.0, true, &[]),
            &Env { current_price: 25.0, hour: 10 },
        );
        assert_eq!(decision.action, Action::Charge);
    }

    #[test]
    fn peak_hour_blocks_when_disallowed() {
        let decision = evaluate(
            &state(0.0),
            &profile(30.0, 100.0, false, &[8, 18]),
            &Env { current_price: 10.0, hour: 8 },
        );
        assert_eq!(decision.action, Action::Wait);
        assert_eq!(decision.reason, "Peak hour block");
    }

    #[test]
    fn is_deterministic() {
        let s = state(10.0);
        let p = profile(30.0, 25.0, true, &[8]);
        let e = Env { current_price: 10.0, hour: 8 };
        assert_eq!(evaluate(&s, &p, &e), evaluate(&s, &p, &e));
    }

    #[test]
    fn meter_decision_stops_unconditionally_at_cap() {
        let decision = evaluate_meter_value_decision(
            &state(0.0),
            &profile(30.0, 100.0, true, &[]),
            &Env { current_price: 10.0, hour: 10 },
            30000.0,
            30000.0,
        );
        assert_eq!(decision.decision, MeterDecision::Stop);
    }
}
