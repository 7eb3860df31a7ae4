//! End-to-end scenarios driving the full tick loop.

use chrono::{Duration, NaiveDate};

use super::*;
use crate::config::SimulationConfig;
use crate::domain::{Blockage, Depot, IncidentType, Order, Vehicle, VehicleType};

fn t0() -> Timestamp {
    NaiveDate::from_ymd_opt(2025, 3, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

/// Default world, but replanning on every tick so scenarios react promptly.
fn scenario_config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.ticks_per_replan = 1;
    config
}

fn scenario_orchestrator(start: Timestamp) -> Orchestrator {
    let env = Environment::with_default_roster(scenario_config(), start);
    Orchestrator::new(env)
}

fn order_event(at: Timestamp, id: &str, due_minutes: i64, amount: f64, position: Position) -> Event {
    Event::new(
        at,
        EventKind::OrderArrival(Order::new(
            id,
            at,
            at + Duration::minutes(due_minutes),
            amount,
            position,
        )),
    )
}

fn run_ticks(orchestrator: &mut Orchestrator, ticks: usize) {
    for _ in 0..ticks {
        orchestrator.run_step();
    }
}

// ── Scenario: single order, no blockages ──────────────────────────────────

#[test]
fn single_order_is_planned_on_the_first_tick() {
    let mut orchestrator = scenario_orchestrator(t0());
    orchestrator.push_event(order_event(t0(), "O1", 240, 10.0, Position::new(15, 10)));

    let report = orchestrator.run_step();
    assert!(report.replanned);
    assert!(!orchestrator.plans().is_empty());

    // Some vehicle drives out, serves O1 in full, and drives home.
    let plan = orchestrator
        .plans()
        .values()
        .find(|p| p.served_orders().contains("O1"))
        .expect("O1 must be planned");
    let labels: Vec<_> = plan.actions().iter().map(|a| a.kind.label()).collect();
    assert_eq!(labels, vec!["DRIVE", "SERVE", "DRIVE"]);
    assert_eq!(plan.actions()[0].end_position(), Some(Position::new(15, 10)));
    assert_eq!(plan.end_position(Position::origin()), Position::new(12, 8));
    assert!((plan.total_glp_delivered() - 10.0).abs() < 1e-9);
}

#[test]
fn single_order_is_delivered_and_vehicle_returns() {
    let mut orchestrator = scenario_orchestrator(t0());
    orchestrator.push_event(order_event(t0(), "O1", 240, 10.0, Position::new(15, 10)));

    // 5 units out (~4 min), 15 min serve, 5 units back: well inside 8 ticks.
    run_ticks(&mut orchestrator, 8);

    let order = orchestrator.environment().find_order_by_id("O1").unwrap();
    assert!(order.delivered());
    assert_eq!(order.deliveries.len(), 1);
    assert_eq!(orchestrator.environment().delivered_orders().len(), 1);

    let courier = orchestrator
        .environment()
        .find_vehicle_by_id(&order.deliveries[0].vehicle_id)
        .unwrap();
    assert_eq!(courier.position, Position::new(12, 8));
    assert_eq!(courier.status, VehicleStatus::Available);

    assert_eq!(orchestrator.stats().deliveries, 1);
    assert!((orchestrator.stats().glp_delivered_m3 - 10.0).abs() < 1e-9);
    assert!(orchestrator.stats().distance_driven >= 10);
}

// ── Replanning triggers ───────────────────────────────────────────────────

#[test]
fn time_trigger_waits_for_the_replan_interval() {
    let mut config = SimulationConfig::default();
    config.ticks_per_replan = 1_000; // isolate the time-based trigger
    config.replan_interval_minutes = 15;
    let env = Environment::with_default_roster(config, t0());
    let mut orchestrator = Orchestrator::new(env);
    orchestrator.push_event(order_event(t0(), "O1", 240, 10.0, Position::new(15, 10)));

    // Ticks at 8:00, 8:05, 8:10, 8:15: elapsed ≤ interval, no replan yet.
    for _ in 0..4 {
        let report = orchestrator.run_step();
        assert!(!report.replanned);
    }
    assert!(orchestrator.needs_replanning());

    // Tick at 8:20: 20 min > 15 min.
    let report = orchestrator.run_step();
    assert!(report.replanned);
    assert!(!orchestrator.needs_replanning());
}

#[test]
fn trigger_without_preconditions_still_resets() {
    let mut orchestrator = scenario_orchestrator(t0());
    // An order arrives but the whole fleet is out of service.
    let vehicle_ids: Vec<Id> = orchestrator
        .environment()
        .vehicles()
        .iter()
        .map(|v| v.id.clone())
        .collect();
    for id in &vehicle_ids {
        orchestrator.apply_breakdown(Incident::new(
            id.clone(),
            IncidentType::TI3,
            t0(),
            Position::new(12, 8),
        ));
    }
    orchestrator.push_event(order_event(t0(), "O1", 240, 10.0, Position::new(15, 10)));

    let report = orchestrator.run_step();
    assert!(!report.replanned);
    assert!(orchestrator.plans().is_empty());
    assert_eq!(orchestrator.stats().replans_skipped, 1);
    // The trigger state reset: no wedged replan flag.
    assert!(!orchestrator.needs_replanning());
    assert_eq!(orchestrator.tick_counter(), 0);
}

// ── Scenario: overdue stress ──────────────────────────────────────────────

#[test]
fn overdue_stress_keeps_the_fleet_busy() {
    let mut config = scenario_config();
    config.ticks_per_replan = 3;
    let env = Environment::with_default_roster(config, t0());
    let mut orchestrator = Orchestrator::new(env);

    // 20 small orders, all due in 30 minutes, spread over the city.
    for i in 0..20 {
        let position = Position::new(5 + (i * 3) % 60, 3 + (i * 2) % 45);
        orchestrator.push_event(order_event(t0(), &format!("S{:02}", i), 30, 5.0, position));
    }

    run_ticks(&mut orchestrator, 3);
    let busy = orchestrator.plans().len();
    assert!(busy >= 2, "expected several routes, got {}", busy);

    // Five simulated hours: late orders flow through the fallback solver.
    run_ticks(&mut orchestrator, 57);
    let delivered = orchestrator.environment().delivered_orders().len();
    let pending = orchestrator.environment().pending_orders().len();
    assert_eq!(delivered + pending, 20);
    assert!(delivered >= 10, "only {} of 20 delivered", delivered);
}

// ── Scenario: blockage detour ─────────────────────────────────────────────

#[test]
fn blockage_forces_a_detour() {
    let mut orchestrator = scenario_orchestrator(t0());

    // Vertical wall on x = 30 up to y = 45, active for four hours; the only
    // crossing is along the top edge.
    let wall = Blockage::new(
        "WALL",
        t0(),
        t0() + Duration::hours(4),
        vec![Position::new(30, 0), Position::new(30, 45)],
    )
    .unwrap();
    orchestrator.push_event(Event::new(t0(), EventKind::BlockageStart(wall)));
    orchestrator.push_event(order_event(t0(), "FAR", 8 * 60, 5.0, Position::new(60, 40)));

    orchestrator.run_step();

    let plan = orchestrator
        .plans()
        .values()
        .find(|p| p.served_orders().contains("FAR"))
        .expect("FAR must be planned");
    let ActionKind::Drive { path } = &plan.actions()[0].kind else {
        panic!("plan must start with a drive");
    };

    // The route only crosses the wall line above the blocked stretch.
    assert!(path
        .iter()
        .filter(|p| p.x == 30)
        .all(|p| p.y > 45));
    // And is therefore longer than the Manhattan separation.
    let manhattan = Position::new(12, 8).manhattan_distance(&Position::new(60, 40));
    assert!(plan.actions()[0].distance() > manhattan);
}

// ── Scenario: breakdown then repair ───────────────────────────────────────

#[test]
fn breakdown_aborts_plan_and_repair_requalifies() {
    let mut orchestrator = scenario_orchestrator(t0());
    orchestrator.push_event(order_event(t0(), "O1", 240, 10.0, Position::new(15, 10)));
    orchestrator.run_step();

    let (vehicle_id, _) = orchestrator
        .plans()
        .iter()
        .next()
        .map(|(k, v)| (k.clone(), v.clone()))
        .expect("a plan was assigned");

    orchestrator.apply_breakdown(
        Incident::new(
            vehicle_id.clone(),
            IncidentType::TI3,
            orchestrator.sim_time(),
            Position::new(12, 8),
        )
        .with_reason("axle"),
    );
    assert!(orchestrator.plans().get(&vehicle_id).is_none());
    assert_eq!(
        orchestrator
            .environment()
            .find_vehicle_by_id(&vehicle_id)
            .unwrap()
            .status,
        VehicleStatus::Unavailable
    );
    assert_eq!(orchestrator.stats().actions_aborted, 1);

    // While broken, replans exclude the vehicle.
    orchestrator.run_step();
    assert!(orchestrator.plans().get(&vehicle_id).is_none());

    orchestrator.apply_repair(&vehicle_id);
    assert_eq!(
        orchestrator
            .environment()
            .find_vehicle_by_id(&vehicle_id)
            .unwrap()
            .status,
        VehicleStatus::Available
    );

    // The next replan may assign it again (it is back in the pool).
    let eligible: Vec<_> = orchestrator
        .environment()
        .available_vehicles()
        .iter()
        .map(|v| v.id.clone())
        .collect();
    assert!(eligible.contains(&vehicle_id));
}

// ── Scenario: depot refill across midnight ────────────────────────────────

#[test]
fn midnight_refill_precedes_that_minute_s_events() {
    let late = NaiveDate::from_ymd_opt(2025, 3, 1)
        .unwrap()
        .and_hms_opt(23, 55, 0)
        .unwrap();
    let mut env = Environment::new(scenario_config(), late);
    env.add_depot(Depot::main("MAIN_PLANT", Position::new(12, 8)));
    let mut north = Depot::auxiliary("NORTH_DEPOT", Position::new(42, 42), 5_000.0);
    north.current_glp_m3 = 100.0;
    env.add_depot(north);
    env.add_vehicle(Vehicle::new("TD01", VehicleType::TD, Position::new(12, 8)));
    let mut orchestrator = Orchestrator::new(env);

    let midnight = late + Duration::minutes(5);
    orchestrator.push_event(order_event(midnight, "M1", 240, 5.0, Position::new(20, 20)));

    // First tick ends at 00:00: the refill runs, the event has not yet.
    orchestrator.run_step();
    assert_eq!(orchestrator.sim_time(), midnight);
    assert_eq!(
        orchestrator
            .environment()
            .find_depot_by_id("NORTH_DEPOT")
            .unwrap()
            .current_glp_m3,
        5_000.0
    );
    assert!(orchestrator.environment().pending_orders().is_empty());

    // Second tick drains the 00:00 event against the refilled world.
    orchestrator.run_step();
    assert_eq!(orchestrator.environment().pending_orders().len(), 1);
}

// ── Scenario: explicit depot refill event ─────────────────────────────────

#[test]
fn depot_refill_event_restores_auxiliaries() {
    let mut orchestrator = scenario_orchestrator(t0());
    orchestrator
        .environment_mut()
        .find_depot_by_id_mut("NORTH_DEPOT")
        .unwrap()
        .current_glp_m3 = 1.0;

    orchestrator.push_event(Event::new(t0(), EventKind::GlpDepotRefill { depot_id: None }));
    orchestrator.run_step();

    assert_eq!(
        orchestrator
            .environment()
            .find_depot_by_id("NORTH_DEPOT")
            .unwrap()
            .current_glp_m3,
        crate::config::AUX_DEPOT_CAPACITY_M3
    );
    // A refill alone never forces replanning.
    assert!(!orchestrator.needs_replanning());
}

// ── Event chaining ────────────────────────────────────────────────────────

#[test]
fn maintenance_event_chains_end_and_next_window() {
    let mut orchestrator = scenario_orchestrator(t0());
    let window = crate::domain::Maintenance::for_date(
        "TB01",
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
    );
    orchestrator.push_event(Event::new(t0(), EventKind::MaintenanceStart(window)));

    orchestrator.run_step();

    assert_eq!(
        orchestrator
            .environment()
            .find_vehicle_by_id("TB01")
            .unwrap()
            .status,
        VehicleStatus::Maintenance
    );
    assert_eq!(orchestrator.environment().maintenance_windows().len(), 1);
    // The end event (23:59:59) and the May repetition are booked.
    assert_eq!(orchestrator.pending_event_count(), 2);
}

#[test]
fn blockage_start_schedules_its_end() {
    let mut orchestrator = scenario_orchestrator(t0());
    let short = Blockage::new(
        "B1",
        t0(),
        t0() + Duration::minutes(7),
        vec![Position::new(3, 3)],
    )
    .unwrap();
    orchestrator.push_event(Event::new(t0(), EventKind::BlockageStart(short)));

    orchestrator.run_step(); // applies the start, books the end
    assert_eq!(orchestrator.pending_event_count(), 1);

    orchestrator.run_step(); // at 8:05 the 8:07 end is not yet due
    assert_eq!(orchestrator.pending_event_count(), 1);

    orchestrator.run_step(); // at 8:10 the end event drains
    assert_eq!(orchestrator.pending_event_count(), 0);
}

// ── Action state machine ──────────────────────────────────────────────────

#[test]
fn failed_precondition_aborts_and_flags_replanning() {
    let mut orchestrator = scenario_orchestrator(t0());

    // Hand-built plan whose drive starts away from the vehicle.
    let mut plan = crate::plan::Plan::new();
    plan.push(Action::drive(
        vec![Position::new(40, 40), Position::new(41, 40)],
        t0(),
        t0() + Duration::minutes(1),
    ))
    .unwrap();
    orchestrator.plans.insert("TA01".to_string(), plan);

    orchestrator.run_step();

    assert!(orchestrator.plans().get("TA01").is_none());
    assert_eq!(orchestrator.stats().actions_aborted, 1);
}

#[test]
fn statuses_follow_the_executing_action() {
    let mut orchestrator = scenario_orchestrator(t0());
    orchestrator.push_event(order_event(t0(), "O1", 240, 10.0, Position::new(15, 10)));
    orchestrator.run_step(); // plan assigned at 8:00

    let vehicle_id = orchestrator
        .plans()
        .keys()
        .next()
        .cloned()
        .expect("plan assigned");

    // At 8:05 the short drive has completed and the 15-minute serve runs.
    orchestrator.run_step();
    let vehicle = orchestrator
        .environment()
        .find_vehicle_by_id(&vehicle_id)
        .unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Serving);
    assert_eq!(vehicle.position, Position::new(15, 10));
}

// ── Lifecycle ─────────────────────────────────────────────────────────────

#[test]
fn simulation_end_event_finishes_the_run() {
    let mut orchestrator = scenario_orchestrator(t0());
    orchestrator.push_event(Event::new(
        t0() + Duration::minutes(10),
        EventKind::SimulationEnd,
    ));

    orchestrator.run_step(); // 8:00
    orchestrator.run_step(); // 8:05
    assert!(!orchestrator.is_finished());

    let report = orchestrator.run_step(); // 8:10 drains the end event
    assert!(report.finished);
    assert!(!report.running);

    // Pause/resume cannot restart a finished run.
    orchestrator.set_running(true);
    assert!(!orchestrator.is_running());
}

#[test]
fn invariants_hold_after_every_tick() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut orchestrator = scenario_orchestrator(t0());
    for i in 0..6 {
        let position = Position::new(10 + i * 8, 5 + i * 6);
        orchestrator.push_event(order_event(
            t0() + Duration::minutes(10 * i as i64),
            &format!("O{}", i),
            180,
            6.0,
            position,
        ));
    }

    let mut previous = orchestrator.sim_time();
    for _ in 0..50 {
        orchestrator.run_step();
        assert!(orchestrator.environment().check_invariants().is_empty());
        assert!(orchestrator.sim_time() > previous);
        previous = orchestrator.sim_time();
        for plan in orchestrator.plans().values() {
            assert!(plan.timestamps_monotone());
        }
    }
}
