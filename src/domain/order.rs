//! Customer orders: hard deadlines, partial deliveries, and urgency scoring.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::EPSILON;
use crate::grid::Position;
use crate::{generate_id, Id, Timestamp};

/// Priority of an order that has gone past its due time, before adding the
/// hours of lateness.
const OVERDUE_BASE_PRIORITY: f64 = 1_000.0;

/// One completed (possibly partial) delivery against an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Id,
    pub vehicle_id: Id,
    pub order_id: Id,
    pub amount_m3: f64,
    pub time: Timestamp,
}

/// A customer order. Identity (id, arrival, due time, request, position) is
/// immutable; `remaining_m3` and `deliveries` track fulfilment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Id,
    pub arrive_time: Timestamp,
    pub due_time: Timestamp,
    pub glp_request_m3: f64,
    pub position: Position,
    /// Undelivered volume, within `[0, glp_request_m3]`.
    pub remaining_m3: f64,
    pub deliveries: Vec<DeliveryRecord>,
}

impl Order {
    pub fn new(
        id: impl Into<Id>,
        arrive_time: Timestamp,
        due_time: Timestamp,
        glp_request_m3: f64,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            arrive_time,
            due_time,
            glp_request_m3,
            position,
            remaining_m3: glp_request_m3,
            deliveries: Vec::new(),
        }
    }

    /// Fully delivered?
    pub fn delivered(&self) -> bool {
        self.remaining_m3 <= EPSILON
    }

    /// Past due and not fully delivered at `at`.
    pub fn is_overdue_at(&self, at: Timestamp) -> bool {
        at > self.due_time && !self.delivered()
    }

    /// Length of the delivery window.
    pub fn time_window(&self) -> Duration {
        self.due_time - self.arrive_time
    }

    /// Delivered volume so far.
    pub fn delivered_m3(&self) -> f64 {
        self.glp_request_m3 - self.remaining_m3
    }

    /// Urgency at `at`: grows as the due time approaches, jumps to
    /// `1000 + hours_late` once overdue. Zero for delivered orders.
    pub fn priority_at(&self, at: Timestamp) -> f64 {
        if self.delivered() {
            return 0.0;
        }
        let hours = (self.due_time - at).num_seconds() as f64 / 3_600.0;
        if hours >= 0.0 {
            100.0 / (1.0 + hours)
        } else {
            OVERDUE_BASE_PRIORITY - hours
        }
    }

    /// Books a delivery of up to `amount_m3`, capped by the remaining volume.
    /// Returns the volume actually booked and appends the record.
    pub fn record_delivery(&mut self, vehicle_id: &str, amount_m3: f64, time: Timestamp) -> f64 {
        let booked = amount_m3.min(self.remaining_m3).max(0.0);
        if booked <= EPSILON {
            return 0.0;
        }
        self.remaining_m3 = (self.remaining_m3 - booked).max(0.0);
        self.deliveries.push(DeliveryRecord {
            id: generate_id(),
            vehicle_id: vehicle_id.to_string(),
            order_id: self.id.clone(),
            amount_m3: booked,
            time,
        });
        booked
    }

    /// Returns the invariants this order currently violates, as messages.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.remaining_m3 < -EPSILON {
            violations.push(format!(
                "order {}: negative remaining {}",
                self.id, self.remaining_m3
            ));
        }
        if self.remaining_m3 > self.glp_request_m3 + EPSILON {
            violations.push(format!(
                "order {}: remaining {} exceeds request {}",
                self.id, self.remaining_m3, self.glp_request_m3
            ));
        }
        let recorded: f64 = self.deliveries.iter().map(|d| d.amount_m3).sum();
        if (recorded - self.delivered_m3()).abs() > 1e-6 {
            violations.push(format!(
                "order {}: delivery records sum {} but delivered is {}",
                self.id,
                recorded,
                self.delivered_m3()
            ));
        }
        violations
    }
}
