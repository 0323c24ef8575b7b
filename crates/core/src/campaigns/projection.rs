//! Display projections for campaign totals.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::time_utils::to_chrono;

/// A value that is either authoritative or a local guess built on top of an
/// authoritative basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projected<T> {
    Confirmed(T),
    Optimistic {
        value: T,
        basis: T,
        since: DateTime<Utc>,
    },
}

impl<T> Projected<T> {
    /// The value to display.
    pub fn value(&self) -> &T {
        match self {
            Projected::Confirmed(value) => value,
            Projected::Optimistic { value, .. } => value,
        }
    }

    pub fn is_optimistic(&self) -> bool {
        matches!(self, Projected::Optimistic { .. })
    }

    /// Resolves to the authoritative `value`, discarding any local guess.
    pub fn confirm(self, value: T) -> Self {
        Projected::Confirmed(value)
    }

    pub fn optimistic_since(&self) -> Option<DateTime<Utc>> {
        match self {
            Projected::Confirmed(_) => None,
            Projected::Optimistic { since, .. } => Some(*since),
        }
    }
}

impl<T: Clone> Projected<T> {
    /// Accepts the current guess as final.
    pub fn settle(self) -> Self {
        match self {
            Projected::Confirmed(_) => self,
            Projected::Optimistic { value, .. } => Projected::Confirmed(value),
        }
    }
}

impl Projected<Decimal> {
    /// Adds `delta` on top of the displayed value. `basis` is kept from an
    /// earlier guess so it always names the last confirmed total.
    pub fn increment(&self, delta: Decimal, now: DateTime<Utc>) -> Self {
        match self {
            Projected::Confirmed(value) => Projected::Optimistic {
                value: *value + delta,
                basis: *value,
                since: now,
            },
            Projected::Optimistic { value, basis, .. } => Projected::Optimistic {
                value: *value + delta,
                basis: *basis,
                since: now,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    /// Played after the viewer's own donation is recorded.
    Celebration,
    /// Played when a push changes the raised amount.
    RemoteUpdate,
}

/// Time-bounded linear interpolation between two amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountAnimation {
    pub kind: AnimationKind,
    pub from: Decimal,
    pub to: Decimal,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl AmountAnimation {
    pub fn new(
        kind: AnimationKind,
        from: Decimal,
        to: Decimal,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            kind,
            from,
            to,
            started_at,
            duration,
        }
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + to_chrono(self.duration)
    }

    pub fn is_finished(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at()
    }

    /// Fraction of the animation elapsed at `now`, in `[0, 1]`.
    pub fn progress(&self, now: DateTime<Utc>) -> Decimal {
        let total = to_chrono(self.duration).num_milliseconds();
        if total <= 0 || self.is_finished(now) {
            return Decimal::ONE;
        }
        let elapsed = (now - self.started_at).num_milliseconds().clamp(0, total);
        Decimal::from(elapsed) / Decimal::from(total)
    }

    /// Interpolated amount at `now`, rounded to cents.
    pub fn value_at(&self, now: DateTime<Utc>) -> Decimal {
        let value = self.from + (self.to - self.from) * self.progress(now);
        value.round_dp(2)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_increment_keeps_confirmed_basis() {
        let confirmed = Projected::Confirmed(dec!(500));
        let first = confirmed.increment(dec!(50), at(0));
        assert_eq!(*first.value(), dec!(550));

        let second = first.increment(dec!(25), at(1));
        match second {
            Projected::Optimistic { value, basis, since } => {
                assert_eq!(value, dec!(575));
                assert_eq!(basis, dec!(500));
                assert_eq!(since, at(1));
            }
            other => panic!("Expected optimistic, got {:?}", other),
        }
    }

    #[test]
    fn test_confirm_discards_guess() {
        let guess = Projected::Confirmed(dec!(100)).increment(dec!(10), at(0));
        assert_eq!(guess.confirm(dec!(130)), Projected::Confirmed(dec!(130)));
    }

    #[test]
    fn test_settle_keeps_guess_value() {
        let guess = Projected::Confirmed(dec!(100)).increment(dec!(10), at(0));
        assert_eq!(guess.settle(), Projected::Confirmed(dec!(110)));
    }

    #[test]
    fn test_animation_interpolates_and_finishes() {
        let animation = AmountAnimation::new(
            AnimationKind::Celebration,
            dec!(100),
            dec!(200),
            at(0),
            Duration::from_secs(2),
        );
        assert_eq!(animation.value_at(at(0)), dec!(100));
        assert_eq!(animation.value_at(at(1)), dec!(150));
        assert_eq!(animation.value_at(at(5)), dec!(200));
        assert!(!animation.is_finished(at(1)));
        assert!(animation.is_finished(at(2)));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(Projected::Confirmed(dec!(5))).unwrap();
        assert!(json.get("confirmed").is_some());
    }
}
