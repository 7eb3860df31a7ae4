//! Scheduled preventive maintenance: full-day windows repeating bimonthly.

use chrono::{Months, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{Id, Timestamp};

/// Months between two consecutive maintenance windows of the same vehicle.
pub const REPEAT_MONTHS: u32 = 2;

/// A maintenance window keeping one vehicle off the road for a calendar day,
/// from midnight to 23:59:59 inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maintenance {
    pub vehicle_id: Id,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Maintenance {
    /// A maintenance window covering the whole of `date`.
    pub fn for_date(vehicle_id: impl Into<Id>, date: NaiveDate) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            start: date.and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap()),
            end: date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap()),
        }
    }

    /// Inclusive activity check on `[start, end]`.
    pub fn active_at(&self, at: Timestamp) -> bool {
        self.start <= at && at <= self.end
    }

    /// The next occurrence for the same vehicle, `REPEAT_MONTHS` later.
    pub fn create_next(&self) -> Maintenance {
        Maintenance::for_date(
            self.vehicle_id.clone(),
            self.start.date() + Months::new(REPEAT_MONTHS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_spans_the_whole_day() {
        let m = Maintenance::for_date("TC03", date(2025, 4, 5));
        assert!(m.active_at(m.start));
        assert!(m.active_at(m.end));
        assert!(!m.active_at(m.start - Duration::seconds(1)));
        assert!(!m.active_at(m.end + Duration::seconds(1)));
    }

    #[test]
    fn next_window_is_two_months_later() {
        let m = Maintenance::for_date("TC03", date(2025, 4, 5));
        let next = m.create_next();
        assert_eq!(next.vehicle_id, "TC03");
        assert_eq!(next.start.date(), date(2025, 6, 5));
        assert_eq!(next.end.date(), date(2025, 6, 5));
    }

    #[test]
    fn month_end_dates_clamp() {
        // Dec 31 + 2 months clamps to Feb 28 in a non-leap year.
        let m = Maintenance::for_date("TA01", date(2024, 12, 31));
        assert_eq!(m.create_next().start.date(), date(2025, 2, 28));
    }
}
