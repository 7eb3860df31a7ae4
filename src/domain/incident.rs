//! Vehicle breakdowns and the shift-based availability arithmetic.

use std::fmt;

use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::grid::Position;
use crate::{generate_id, Id, Timestamp};

/// Breakdown severity. Determines immobilisation and return-to-service rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentType {
    /// Minor: 2 h on the spot, then the vehicle continues its route.
    TI1,
    /// Moderate: 2 h on the spot, back in service at the start of the
    /// shift after next; must return to depot.
    TI2,
    /// Severe: 4 h on the spot, back in service on day +3; must return
    /// to depot.
    TI3,
}

impl IncidentType {
    /// Hours the vehicle stays immobilised at the incident location.
    pub fn immobilization_hours(&self) -> i64 {
        match self {
            IncidentType::TI1 | IncidentType::TI2 => 2,
            IncidentType::TI3 => 4,
        }
    }

    /// Classifies an estimated repair duration reported by an operator.
    pub fn from_estimated_hours(hours: f64) -> Self {
        if hours <= 2.0 {
            IncidentType::TI1
        } else if hours <= 24.0 {
            IncidentType::TI2
        } else {
            IncidentType::TI3
        }
    }

    /// Whether the vehicle must be towed back to a depot before resuming.
    pub fn requires_depot_return(&self) -> bool {
        matches!(self, IncidentType::TI2 | IncidentType::TI3)
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentType::TI1 => write!(f, "TI1"),
            IncidentType::TI2 => write!(f, "TI2"),
            IncidentType::TI3 => write!(f, "TI3"),
        }
    }
}

/// One of the three 8-hour windows partitioning a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shift {
    /// 00:00–08:00.
    T1,
    /// 08:00–16:00.
    T2,
    /// 16:00–24:00.
    T3,
}

impl Shift {
    /// The shift containing `at`.
    pub fn of(at: Timestamp) -> Self {
        match at.hour() {
            0..=7 => Shift::T1,
            8..=15 => Shift::T2,
            _ => Shift::T3,
        }
    }

    /// First hour of the shift.
    pub fn start_hour(&self) -> u32 {
        match self {
            Shift::T1 => 0,
            Shift::T2 => 8,
            Shift::T3 => 16,
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shift::T1 => write!(f, "T1"),
            Shift::T2 => write!(f, "T2"),
            Shift::T3 => write!(f, "T3"),
        }
    }
}

/// A breakdown of one vehicle at a point in time and space.
///
/// An incident is resolved either explicitly (repair command) or implicitly
/// once the computed availability time has passed; `is_resolved_at` accepts
/// both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Id,
    pub vehicle_id: Id,
    pub incident_type: IncidentType,
    /// Shift during which the incident occurred; fixed at creation.
    pub shift: Shift,
    pub occurrence_time: Timestamp,
    pub location: Position,
    /// Operator-supplied cause, when reported through the control surface.
    pub reason: Option<String>,
    /// Explicit resolution flag, set by the repair command.
    pub resolved: bool,
}

impl Incident {
    pub fn new(
        vehicle_id: impl Into<Id>,
        incident_type: IncidentType,
        occurrence_time: Timestamp,
        location: Position,
    ) -> Self {
        Self {
            id: generate_id(),
            vehicle_id: vehicle_id.into(),
            incident_type,
            shift: Shift::of(occurrence_time),
            occurrence_time,
            location,
            reason: None,
            resolved: false,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// End of the on-the-spot immobilisation.
    pub fn immobilized_until(&self) -> Timestamp {
        self.occurrence_time + Duration::hours(self.incident_type.immobilization_hours())
    }

    /// Instant the vehicle becomes available again, as a pure function of
    /// (type, shift, occurrence time).
    pub fn availability_time(&self) -> Timestamp {
        let date = self.occurrence_time.date();
        let at_hour =
            |d: chrono::NaiveDate, h: u32| d.and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap());

        match self.incident_type {
            IncidentType::TI1 => self.immobilized_until(),
            IncidentType::TI2 => match self.shift {
                // Available at the start of the shift after next.
                Shift::T1 => at_hour(date, Shift::T3.start_hour()),
                Shift::T2 => at_hour(date + Duration::days(1), Shift::T1.start_hour()),
                Shift::T3 => at_hour(date + Duration::days(1), Shift::T2.start_hour()),
            },
            IncidentType::TI3 => at_hour(date + Duration::days(3), Shift::T1.start_hour()),
        }
    }

    /// Resolved either explicitly or by the availability clock.
    pub fn is_resolved_at(&self, at: Timestamp) -> bool {
        self.resolved || at >= self.availability_time()
    }

    /// Marks the incident explicitly resolved (repair command).
    pub fn resolve(&mut self) {
        self.resolved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn shift_boundaries() {
        assert_eq!(Shift::of(at(0, 0)), Shift::T1);
        assert_eq!(Shift::of(at(7, 59)), Shift::T1);
        assert_eq!(Shift::of(at(8, 0)), Shift::T2);
        assert_eq!(Shift::of(at(15, 59)), Shift::T2);
        assert_eq!(Shift::of(at(16, 0)), Shift::T3);
        assert_eq!(Shift::of(at(23, 59)), Shift::T3);
    }

    #[test]
    fn type_classification_from_estimate() {
        assert_eq!(IncidentType::from_estimated_hours(1.0), IncidentType::TI1);
        assert_eq!(IncidentType::from_estimated_hours(2.0), IncidentType::TI1);
        assert_eq!(IncidentType::from_estimated_hours(8.0), IncidentType::TI2);
        assert_eq!(IncidentType::from_estimated_hours(24.0), IncidentType::TI2);
        assert_eq!(IncidentType::from_estimated_hours(48.0), IncidentType::TI3);
    }

    #[test]
    fn ti1_available_after_two_hours() {
        let i = Incident::new("TA01", IncidentType::TI1, at(9, 30), Position::new(5, 5));
        assert_eq!(i.availability_time(), at(11, 30));
        assert!(!i.incident_type.requires_depot_return());
    }

    #[test]
    fn ti2_shift_arithmetic() {
        // T1 occurrence → same day T3.
        let i = Incident::new("TA01", IncidentType::TI2, at(3, 0), Position::new(5, 5));
        assert_eq!(i.shift, Shift::T1);
        assert_eq!(i.availability_time(), at(16, 0));

        // T2 occurrence → next day T1.
        let i = Incident::new("TA01", IncidentType::TI2, at(10, 0), Position::new(5, 5));
        assert_eq!(
            i.availability_time(),
            NaiveDate::from_ymd_opt(2025, 3, 11)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );

        // T3 occurrence → next day T2.
        let i = Incident::new("TA01", IncidentType::TI2, at(20, 0), Position::new(5, 5));
        assert_eq!(
            i.availability_time(),
            NaiveDate::from_ymd_opt(2025, 3, 11)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap()
        );
        assert!(i.incident_type.requires_depot_return());
    }

    #[test]
    fn ti3_available_three_days_later() {
        let i = Incident::new("TB02", IncidentType::TI3, at(20, 15), Position::new(5, 5));
        assert_eq!(i.immobilized_until(), at(20, 15) + Duration::hours(4));
        assert_eq!(
            i.availability_time(),
            NaiveDate::from_ymd_opt(2025, 3, 13)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn resolution_is_explicit_or_derived() {
        let mut i = Incident::new("TA01", IncidentType::TI1, at(9, 0), Position::new(5, 5));
        assert!(!i.is_resolved_at(at(10, 0)));
        assert!(i.is_resolved_at(at(11, 0))); // derived from the clock

        i.resolve();
        assert!(i.is_resolved_at(at(9, 30))); // explicit wins early
    }
}
