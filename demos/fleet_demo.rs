// Demonstration: drive the tick loop against the reference city with a
// morning rush of orders and one closed avenue, then print the outcome.
//
// Run from this repo root:
//   cargo run --example fleet_demo -- --ticks 60

use chrono::{Duration, NaiveDate};
use fleetgrid::config::SimulationConfig;
use fleetgrid::control::SimulationHandle;
use fleetgrid::domain::{Blockage, Order};
use fleetgrid::environment::Environment;
use fleetgrid::events::{Event, EventKind};
use fleetgrid::grid::Position;
use fleetgrid::orchestrator::Orchestrator;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let ticks: usize = arg_value(&args, "--ticks")
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);

    let start = NaiveDate::from_ymd_opt(2025, 3, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    let mut config = SimulationConfig::default();
    config.ticks_per_replan = 3;
    let env = Environment::with_default_roster(config, start);
    let handle = SimulationHandle::new(Orchestrator::new(env));

    handle.submit_order(Order::new(
        "O1",
        start,
        start + Duration::hours(4),
        10.0,
        Position::new(15, 10),
    ));
    handle.submit_order(Order::new(
        "O2",
        start,
        start + Duration::hours(3),
        7.5,
        Position::new(45, 30),
    ));
    handle.submit_event(Event::new(
        start + Duration::minutes(30),
        EventKind::OrderArrival(Order::new(
            "O3",
            start + Duration::minutes(30),
            start + Duration::hours(5),
            12.0,
            Position::new(60, 12),
        )),
    ));

    let wall = Blockage::new(
        "AVENUE_30",
        start,
        start + Duration::hours(2),
        vec![Position::new(30, 0), Position::new(30, 40)],
    )
    .unwrap();
    handle.submit_event(Event::new(start, EventKind::BlockageStart(wall)));

    for _ in 0..ticks {
        let report = handle.step_once();
        if report.finished {
            break;
        }
    }

    let status = handle.snapshot_status();
    println!("simulated until {}", status.simulation_time);
    println!(
        "ticks {}  replans {}  deliveries {}  distance {} km",
        status.stats.ticks, status.stats.replans, status.stats.deliveries, status.stats.distance_driven
    );

    for order in handle.snapshot_orders() {
        println!(
            "order {:>3}  remaining {:>5.1} m3  priority {:>8.2}{}",
            order.id,
            order.remaining_m3,
            order.priority,
            if order.overdue { "  OVERDUE" } else { "" }
        );
    }
    for vehicle in handle.snapshot_vehicles() {
        if vehicle.current_action.is_some() {
            println!(
                "{} at {}  glp {:>5.1} m3  fuel {:>5.2} gal  {}  ({})",
                vehicle.id,
                vehicle.position,
                vehicle.glp_m3,
                vehicle.fuel_gal,
                vehicle.status,
                vehicle.current_action.as_deref().unwrap_or("-"),
            );
        }
    }
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
