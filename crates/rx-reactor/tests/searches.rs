//! Steady-state and conversion searches.

use rx_reactor::{Reaction, Reactor, ReactorError, ReactorKind, SteadyStateOptions};
use std::sync::Arc;

fn reversible_pair() -> Vec<Arc<Reaction>> {
    vec![
        Arc::new(Reaction::new("Reaction 1", ["A", "B", "C"], [-1.0, -1.0, 1.0], "0.05*A*B").unwrap()),
        Arc::new(Reaction::new("Reaction 23", ["A", "B", "C"], [1.0, 1.0, -1.0], "0.025*C").unwrap()),
    ]
}

fn abc(a: f64, b: f64, c: f64) -> [(&'static str, f64); 3] {
    [("A", a), ("B", b), ("C", c)]
}

fn reactor_with(kind: ReactorKind, initial_volume: f64) -> Reactor {
    let flow_rate = if kind == ReactorKind::Pfr { 1.0 } else { 0.1 };
    Reactor::builder(kind, 10.0, reversible_pair())
        .initial_concentrations(abc(1.0, 1.0, 0.0))
        .initial_volume(initial_volume)
        .flow_rate(flow_rate)
        .inlet_concentrations(abc(1.0, 1.0, 0.0))
        .build()
        .unwrap()
}

fn reactor(kind: ReactorKind) -> Reactor {
    reactor_with(kind, 0.5)
}

const ALL: [ReactorKind; 4] = [
    ReactorKind::Batch,
    ReactorKind::FedBatch,
    ReactorKind::Cstr,
    ReactorKind::Pfr,
];

#[test]
fn steady_state_closed_vessels() {
    let options = SteadyStateOptions::default();
    for kind in [ReactorKind::Batch, ReactorKind::Pfr] {
        let ss = reactor(kind).find_steady_state(&options).unwrap();
        assert!(ss.point.x > 44.6 && ss.point.x < 44.9, "{kind}: {}", ss.point.x);
        assert_eq!(ss.iterations, 4);
        assert_eq!(ss.horizon, 80.0);
        assert!(ss.point.max_transformation_rate() < options.threshold);
    }
}

#[test]
fn steady_state_fed_batch() {
    let ss = reactor(ReactorKind::FedBatch)
        .find_steady_state(&SteadyStateOptions::default())
        .unwrap();
    assert!(ss.point.x > 115.3 && ss.point.x < 115.8, "{}", ss.point.x);
    assert_eq!(ss.horizon, 160.0);
    assert!((ss.point.volume - 10.0).abs() < 1e-9);
}

#[test]
fn steady_state_cstr_after_three_residence_times() {
    let ss = reactor(ReactorKind::Cstr)
        .find_steady_state(&SteadyStateOptions::default())
        .unwrap();
    assert_eq!(ss.point.x, 300.0);
    assert_eq!(ss.iterations, 0);
    assert!((ss.point.concentrations["A"] - 0.55692).abs() < 5e-4);
    // Outflow balances reaction, so the rates themselves stay finite
    assert!(ss.point.max_transformation_rate() > 1e-3);
}

#[test]
fn cstr_without_reaction_matches_inlet() {
    let inert = Arc::new(Reaction::new("inert", ["A", "B", "C"], [0.0, 0.0, 0.0], "0").unwrap());
    let cstr = Reactor::builder(ReactorKind::Cstr, 10.0, vec![inert])
        .initial_concentrations(abc(0.0, 0.0, 0.0))
        .initial_volume(0.0)
        .flow_rate(1.0)
        .inlet_concentrations(abc(1.0, 1.0, 0.0))
        .build()
        .unwrap();
    let ss = cstr.find_steady_state(&SteadyStateOptions::default()).unwrap();
    assert_eq!(ss.point.x, 30.0);
    for (species, inlet) in abc(1.0, 1.0, 0.0) {
        assert!((ss.point.concentrations[species] - inlet).abs() < 1e-9, "{species}");
    }
}

#[test]
fn steady_state_not_reached() {
    let source = Arc::new(Reaction::new("source", ["A"], [1.0], "1").unwrap());
    let batch = Reactor::builder(ReactorKind::Batch, 1.0, vec![source])
        .initial_concentrations([("A", 0.0)])
        .build()
        .unwrap();
    let options = SteadyStateOptions {
        guess: 1.0,
        max_iterations: 3,
        ..SteadyStateOptions::default()
    };
    match batch.find_steady_state(&options) {
        Err(ReactorError::SteadyStateNotReached {
            iterations,
            horizon,
            max_rate,
        }) => {
            assert_eq!(iterations, 3);
            assert_eq!(horizon, 4.0);
            assert!((max_rate - 1.0).abs() < 1e-12);
        }
        other => panic!("expected SteadyStateNotReached, got {other:?}"),
    }
}

#[test]
fn conversion_times() {
    for (kind, expected, tol) in [
        (ReactorKind::Batch, 18.484, 0.02),
        (ReactorKind::Pfr, 18.484, 0.02),
        (ReactorKind::FedBatch, 56.18, 0.05),
        (ReactorKind::Cstr, 56.18, 0.05),
    ] {
        let cp = reactor(kind).find_conversion("A", 0.4, 10.0).unwrap();
        assert!((cp.point.x - expected).abs() < tol, "{kind}: {}", cp.point.x);
        assert!((cp.point.concentrations["A"] - 0.6).abs() < 1e-3, "{kind}");
        assert!(cp.achievable > 0.4 && cp.achievable < 1.0);
        assert_eq!(cp.species, "A");
    }
}

#[test]
fn fast_kinetics_crossing_is_resolved() {
    let k = 1e4;
    let decay = Arc::new(Reaction::new("decay", ["A", "B"], [-1.0, 1.0], "1e4*A").unwrap());
    let batch = Reactor::builder(ReactorKind::Batch, 1.0, vec![decay])
        .initial_concentrations([("A", 1.0), ("B", 0.0)])
        .build()
        .unwrap();
    let cp = batch.find_conversion("A", 0.5, 10.0).unwrap();
    let half_life = std::f64::consts::LN_2 / k;
    assert!(
        (cp.point.x - half_life).abs() < 1e-3 * half_life,
        "{} vs {half_life}",
        cp.point.x
    );
    assert!((cp.point.concentrations["A"] - 0.5).abs() < 1e-4);
}

#[test]
fn empty_vessel_conversion_uses_initial_concentrations() {
    let cstr = Reactor::builder(ReactorKind::Cstr, 10.0, reversible_pair())
        .initial_concentrations(abc(2.0, 1.0, 0.0))
        .initial_volume(0.0)
        .flow_rate(0.1)
        .inlet_concentrations(abc(1.0, 1.0, 0.0))
        .build()
        .unwrap();
    assert_eq!(cstr.reference_concentrations().as_slice(), [2.0, 1.0, 0.0]);

    // The vessel starts at the inlet concentration, already half converted
    let cp = cstr.find_conversion("A", 0.3, 10.0).unwrap();
    assert_eq!(cp.point.x, 0.0);
    assert_eq!(cp.point.concentrations["A"], 1.0);
    // Measured against 2.0, not the inlet 1.0
    assert!(cp.achievable > 0.6 && cp.achievable < 0.8, "{}", cp.achievable);
}

#[test]
fn zero_target_is_the_start() {
    let cp = reactor(ReactorKind::Batch).find_conversion("A", 0.0, 10.0).unwrap();
    assert_eq!(cp.point.x, 0.0);
}

#[test]
fn full_conversion_unreachable() {
    for kind in ALL {
        let r = reactor_with(kind, 0.0);
        match r.find_conversion("A", 1.0, 10.0) {
            Err(ReactorError::ConversionUnreachable {
                species,
                target,
                achievable,
            }) => {
                assert_eq!(species, "A");
                assert_eq!(target, 1.0);
                assert!(achievable < 1.0, "{kind}");
            }
            other => panic!("{kind}: expected ConversionUnreachable, got {other:?}"),
        }
    }
}

#[test]
fn conversion_argument_errors() {
    let batch = reactor(ReactorKind::Batch);
    for (species, target) in [("D", 0.4), ("A", 1.5), ("A", -0.1), ("C", 0.4)] {
        assert!(
            matches!(
                batch.find_conversion(species, target, 10.0),
                Err(ReactorError::Configuration { .. })
            ),
            "{species} {target}"
        );
    }
}
