//! Running counters surfaced by the status snapshot.

use serde::Serialize;

/// Aggregate counters since simulation start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimulationStats {
    /// Ticks executed.
    pub ticks: u64,
    /// Events drained and applied.
    pub events_applied: u64,
    /// Successful solver invocations.
    pub replans: u64,
    /// Replan triggers that fired without orders or vehicles to plan.
    pub replans_skipped: u64,
    /// Actions that ran to completion.
    pub actions_completed: u64,
    /// Actions aborted by failed preconditions or breakdowns.
    pub actions_aborted: u64,
    /// Deliveries booked (serve completions with positive volume).
    pub deliveries: u64,
    /// Total volume delivered, m³.
    pub glp_delivered_m3: f64,
    /// Total grid units driven by completed drive actions.
    pub distance_driven: u64,
    /// Wall-clock milliseconds spent inside the solver.
    pub solver_millis: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_all_zero() {
        let stats = SimulationStats::default();
        assert_eq!(stats.ticks, 0);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.glp_delivered_m3, 0.0);
    }
}
