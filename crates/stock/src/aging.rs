//! Cold-storage aging: the maturation window of a carcass part, used for
//! sanitary eligibility and sale-priority ordering.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maturation window, a pure function of calendar days since entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgeClass {
    /// 0–1 days.
    Fresh,
    /// 2–4 days: peak maturation.
    Prime,
    /// 5–7 days.
    Warning,
    /// 8–11 days: still sellable, flagged for priority rotation.
    Attention,
    /// 12 days or more: sanitary hard block.
    Blocked,
}

impl AgeClass {
    /// BLOCKED parts must not be offered or sold.
    pub fn is_sellable(&self) -> bool {
        !matches!(self, AgeClass::Blocked)
    }

    /// Parts the sale listing flags for caller-visible warnings.
    pub fn needs_attention(&self) -> bool {
        matches!(self, AgeClass::Attention)
    }
}

/// Classify elapsed storage days. Negative values (clock skew between the
/// scale terminal and the till) classify as FRESH.
pub fn classify_age(days_in_storage: i64) -> AgeClass {
    match days_in_storage {
        i64::MIN..=1 => AgeClass::Fresh,
        2..=4 => AgeClass::Prime,
        5..=7 => AgeClass::Warning,
        8..=11 => AgeClass::Attention,
        _ => AgeClass::Blocked,
    }
}

/// Calendar days between cold-storage entry and `today`.
pub fn days_in_storage(entry_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - entry_date).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify_age(0), AgeClass::Fresh);
        assert_eq!(classify_age(1), AgeClass::Fresh);
        assert_eq!(classify_age(2), AgeClass::Prime);
        assert_eq!(classify_age(4), AgeClass::Prime);
        assert_eq!(classify_age(5), AgeClass::Warning);
        assert_eq!(classify_age(7), AgeClass::Warning);
        assert_eq!(classify_age(8), AgeClass::Attention);
        assert_eq!(classify_age(11), AgeClass::Attention);
        assert_eq!(classify_age(12), AgeClass::Blocked);
        assert_eq!(classify_age(45), AgeClass::Blocked);
    }

    #[test]
    fn negative_elapsed_days_classify_as_fresh() {
        assert_eq!(classify_age(-1), AgeClass::Fresh);
    }

    #[test]
    fn days_in_storage_counts_calendar_days() {
        let entry = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 27).unwrap();
        assert_eq!(days_in_storage(entry, today), 12);
    }

    proptest! {
        /// Twelve days or more is blocked, everything before is sellable.
        #[test]
        fn blocked_exactly_at_twelve_days(days in -30i64..120) {
            let class = classify_age(days);
            prop_assert_eq!(class == AgeClass::Blocked, days >= 12);
            prop_assert_eq!(class.is_sellable(), days < 12);
        }
    }
}
