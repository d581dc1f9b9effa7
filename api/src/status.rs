use crate::GameState;
use chrono::{DateTime, TimeDelta, Utc};

/// What the upstream record claims, reduced to the signals we trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamSignal {
    Live,
    Final,
    Postponed,
    Delayed,
    /// Scheduled, unknown, or missing. Wall clock decides.
    None,
}

impl UpstreamSignal {
    /// Reduce ESPN's `status.type` fields. The status name wins; `state` and
    /// `completed` only decide when the name is missing or unrecognised.
    pub fn from_espn(name: Option<&str>, state: Option<&str>, completed: Option<bool>) -> Self {
        match name.unwrap_or_default() {
            "STATUS_IN_PROGRESS" | "STATUS_HALFTIME" | "STATUS_END_PERIOD" | "STATUS_OVERTIME" => {
                UpstreamSignal::Live
            }
            "STATUS_FINAL" | "STATUS_FINAL_OT" | "STATUS_FINAL_SO" => UpstreamSignal::Final,
            "STATUS_POSTPONED" | "STATUS_CANCELED" | "STATUS_CANCELLED" | "STATUS_SUSPENDED" => {
                UpstreamSignal::Postponed
            }
            "STATUS_DELAYED" | "STATUS_RAIN_DELAY" => UpstreamSignal::Delayed,
            _ if completed == Some(true) => UpstreamSignal::Final,
            _ => match state {
                Some("in") => UpstreamSignal::Live,
                Some("post") => UpstreamSignal::Final,
                _ => UpstreamSignal::None,
            },
        }
    }
}

/// Display qualifier appended to the upstream status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Warmup,
    Final,
    Delayed,
    PossiblePostponement,
}

impl Qualifier {
    pub fn label(&self) -> &'static str {
        match self {
            Qualifier::Warmup => "Warmup",
            Qualifier::Final => "Final",
            Qualifier::Delayed => "Delayed",
            Qualifier::PossiblePostponement => "Possible Postponement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inference {
    pub state: GameState,
    pub qualifier: Option<Qualifier>,
}

/// Where "now" falls relative to the scheduled start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockBucket {
    Ahead,
    Warmup,
    JustStarted,
    Overdue,
    Stale,
}

/// Window sizes for the wall-clock half of `infer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRules {
    pub warmup_window: TimeDelta,
    pub assume_live_grace: TimeDelta,
    pub postpone_after: TimeDelta,
}

impl Default for StateRules {
    fn default() -> Self {
        Self {
            warmup_window: TimeDelta::minutes(30),
            assume_live_grace: TimeDelta::minutes(5),
            postpone_after: TimeDelta::hours(3),
        }
    }
}

impl StateRules {
    /// The whole lifecycle policy in one table, evaluated once per mapped
    /// record. Nothing downstream patches a status string in place.
    pub fn infer(
        &self,
        signal: UpstreamSignal,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Inference {
        let (state, qualifier) = match (signal, self.bucket(start, now)) {
            (UpstreamSignal::Live, _) => (GameState::Live, None),
            (UpstreamSignal::Final, _) => (GameState::Final, Some(Qualifier::Final)),
            (UpstreamSignal::Postponed, _) => (GameState::Postponed, None),
            (UpstreamSignal::Delayed, _) => (GameState::Delayed, None),
            (UpstreamSignal::None, ClockBucket::Ahead) => (GameState::Scheduled, None),
            (UpstreamSignal::None, ClockBucket::Warmup) => {
                (GameState::Warmup, Some(Qualifier::Warmup))
            }
            (UpstreamSignal::None, ClockBucket::JustStarted) => (GameState::Live, None),
            (UpstreamSignal::None, ClockBucket::Overdue) => {
                (GameState::Delayed, Some(Qualifier::Delayed))
            }
            (UpstreamSignal::None, ClockBucket::Stale) => {
                (GameState::Postponed, Some(Qualifier::PossiblePostponement))
            }
        };
        Inference { state, qualifier }
    }

    fn bucket(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> ClockBucket {
        let since_start = now - start;
        if since_start < -self.warmup_window {
            ClockBucket::Ahead
        } else if since_start < TimeDelta::zero() {
            ClockBucket::Warmup
        } else if since_start <= self.assume_live_grace {
            ClockBucket::JustStarted
        } else if since_start <= self.postpone_after {
            ClockBucket::Overdue
        } else {
            ClockBucket::Stale
        }
    }
}

/// Append a qualifier to upstream text without losing or repeating it.
pub fn annotate(detail: &str, qualifier: Option<Qualifier>) -> String {
    let detail = detail.trim();
    let Some(q) = qualifier else {
        return detail.to_owned();
    };
    if detail.is_empty() {
        return q.label().to_owned();
    }
    if detail.to_ascii_lowercase().contains(&q.label().to_ascii_lowercase()) {
        return detail.to_owned();
    }
    format!("{detail} ({})", q.label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 23, 0, 0).unwrap()
    }

    fn state_at(signal: UpstreamSignal, offset: TimeDelta) -> GameState {
        StateRules::default().infer(signal, start(), start() + offset).state
    }

    #[test]
    fn more_than_thirty_minutes_out_is_scheduled() {
        assert_eq!(state_at(UpstreamSignal::None, TimeDelta::minutes(-31)), GameState::Scheduled);
        assert_eq!(state_at(UpstreamSignal::None, TimeDelta::hours(-20)), GameState::Scheduled);
    }

    #[test]
    fn pre_game_window_is_warmup() {
        assert_eq!(state_at(UpstreamSignal::None, TimeDelta::minutes(-30)), GameState::Warmup);
        assert_eq!(state_at(UpstreamSignal::None, TimeDelta::minutes(-10)), GameState::Warmup);
        assert_eq!(state_at(UpstreamSignal::None, TimeDelta::seconds(-1)), GameState::Warmup);
    }

    #[test]
    fn start_without_signal_assumes_live_for_grace_period() {
        assert_eq!(state_at(UpstreamSignal::None, TimeDelta::zero()), GameState::Live);
        assert_eq!(state_at(UpstreamSignal::None, TimeDelta::minutes(5)), GameState::Live);
        assert_eq!(state_at(UpstreamSignal::None, TimeDelta::minutes(6)), GameState::Delayed);
    }

    #[test]
    fn long_overdue_scheduled_game_is_postponed() {
        let four_hours_late = start() + TimeDelta::hours(4);
        let inference = StateRules::default().infer(UpstreamSignal::None, start(), four_hours_late);
        assert_eq!(inference.state, GameState::Postponed);
        assert_eq!(inference.qualifier, Some(Qualifier::PossiblePostponement));
    }

    #[test]
    fn explicit_signals_beat_the_clock() {
        assert_eq!(state_at(UpstreamSignal::Live, TimeDelta::hours(-2)), GameState::Live);
        assert_eq!(state_at(UpstreamSignal::Final, TimeDelta::hours(5)), GameState::Final);
        assert_eq!(state_at(UpstreamSignal::Postponed, TimeDelta::hours(-5)), GameState::Postponed);
        assert_eq!(state_at(UpstreamSignal::Delayed, TimeDelta::minutes(-40)), GameState::Delayed);
    }

    #[test]
    fn parse_espn_signal() {
        use UpstreamSignal as S;
        assert_eq!(S::from_espn(Some("STATUS_IN_PROGRESS"), Some("in"), Some(false)), S::Live);
        assert_eq!(S::from_espn(Some("STATUS_HALFTIME"), None, None), S::Live);
        assert_eq!(S::from_espn(Some("STATUS_FINAL"), Some("post"), Some(true)), S::Final);
        assert_eq!(S::from_espn(Some("STATUS_POSTPONED"), Some("post"), Some(false)), S::Postponed);
        assert_eq!(S::from_espn(Some("STATUS_RAIN_DELAY"), Some("in"), None), S::Delayed);
        assert_eq!(S::from_espn(Some("STATUS_SCHEDULED"), Some("pre"), Some(false)), S::None);
        assert_eq!(S::from_espn(None, Some("in"), None), S::Live);
        assert_eq!(S::from_espn(Some("STATUS_WHATEVER"), None, Some(true)), S::Final);
        assert_eq!(S::from_espn(None, None, None), S::None);
    }

    #[test]
    fn annotate_preserves_upstream_text() {
        assert_eq!(annotate("7:00 PM ET", Some(Qualifier::Warmup)), "7:00 PM ET (Warmup)");
        assert_eq!(annotate("", Some(Qualifier::Warmup)), "Warmup");
        assert_eq!(annotate("Final/OT", Some(Qualifier::Final)), "Final/OT");
        assert_eq!(annotate("Q3 4:12", None), "Q3 4:12");
    }
}
