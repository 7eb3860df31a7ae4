//! Typed simulation events and the time-ordered queue that drives them.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::domain::{Blockage, Incident, Maintenance, Order};
use crate::{Id, Timestamp};

/// Payload of a scheduled event.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// A new order enters the world.
    OrderArrival(Order),
    /// A blockage window opens; the payload carries the full blockage.
    BlockageStart(Blockage),
    /// A blockage window closes (the environment drops it on its own; this
    /// exists to trigger replanning at the boundary).
    BlockageEnd { blockage_id: Id },
    /// A vehicle breaks down.
    VehicleBreakdown(Incident),
    /// A maintenance window opens.
    MaintenanceStart(Maintenance),
    /// A maintenance window closes.
    MaintenanceEnd { vehicle_id: Id },
    /// Refill one auxiliary depot, or all of them when no id is given.
    GlpDepotRefill { depot_id: Option<Id> },
    /// Periodic checkpoint forcing a replanning decision.
    PlanCheckpoint,
    /// Terminate the simulation.
    SimulationEnd,
}

impl EventKind {
    /// Short label for logs and stats.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::OrderArrival(_) => "ORDER_ARRIVAL",
            EventKind::BlockageStart(_) => "BLOCKAGE_START",
            EventKind::BlockageEnd { .. } => "BLOCKAGE_END",
            EventKind::VehicleBreakdown(_) => "VEHICLE_BREAKDOWN",
            EventKind::MaintenanceStart(_) => "MAINTENANCE_START",
            EventKind::MaintenanceEnd { .. } => "MAINTENANCE_END",
            EventKind::GlpDepotRefill { .. } => "GLP_DEPOT_REFILL",
            EventKind::PlanCheckpoint => "PLAN_CHECKPOINT",
            EventKind::SimulationEnd => "SIMULATION_END",
        }
    }

    /// Whether applying this event invalidates the current plans.
    pub fn triggers_replanning(&self) -> bool {
        !matches!(
            self,
            EventKind::GlpDepotRefill { .. } | EventKind::SimulationEnd
        )
    }
}

/// A scheduled event.
#[derive(Debug, Clone)]
pub struct Event {
    pub time: Timestamp,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: Timestamp, kind: EventKind) -> Self {
        Self { time, kind }
    }
}

/// Heap entry: ordered by time, then by insertion sequence so same-instant
/// events drain in the order they were pushed.
#[derive(Debug)]
struct QueuedEvent {
    time: Timestamp,
    seq: u64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

/// Min-heap of events keyed `(time, insertion seq)`.
///
/// Pushing while draining is fine: `poll_due` collects its batch up front,
/// and anything pushed afterwards waits in the heap for the next poll.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<QueuedEvent>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        let entry = QueuedEvent {
            time: event.time,
            seq: self.next_seq,
            event,
        };
        self.next_seq += 1;
        self.heap.push(Reverse(entry));
    }

    /// Removes and returns every event with `time ≤ now`, time-ordered and
    /// insertion-ordered within equal times.
    pub fn poll_due(&mut self, now: Timestamp) -> Vec<Event> {
        let mut due = Vec::new();
        while let Some(Reverse(head)) = self.heap.peek() {
            if head.time > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry.event);
            }
        }
        due
    }

    /// Time of the next scheduled event, if any.
    pub fn peek_time(&self) -> Option<Timestamp> {
        self.heap.peek().map(|Reverse(e)| e.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
