//! Integrator accuracy on problems with closed-form solutions.

use nalgebra::DVector;
use proptest::prelude::*;
use rx_sim::{IntegrationOptions, IntegratorType, OdeModel, SimError, SimResult, integrate};

struct Decay {
    k: f64,
}

impl OdeModel for Decay {
    fn dim(&self) -> usize {
        1
    }

    fn initial_state(&self) -> DVector<f64> {
        DVector::from_element(1, 1.0)
    }

    fn rhs(&self, _x: f64, y: &DVector<f64>) -> SimResult<DVector<f64>> {
        Ok(y * -self.k)
    }
}

/// y' = -lambda (y - cos x) - sin x, y(0) = 1, exact y = cos x.
struct StiffCosine {
    lambda: f64,
}

impl OdeModel for StiffCosine {
    fn dim(&self) -> usize {
        1
    }

    fn initial_state(&self) -> DVector<f64> {
        DVector::from_element(1, 1.0)
    }

    fn rhs(&self, x: f64, y: &DVector<f64>) -> SimResult<DVector<f64>> {
        Ok(DVector::from_element(
            1,
            -self.lambda * (y[0] - x.cos()) - x.sin(),
        ))
    }
}

/// Two decoupled modes six orders of magnitude apart.
struct StiffPair;

impl OdeModel for StiffPair {
    fn dim(&self) -> usize {
        2
    }

    fn initial_state(&self) -> DVector<f64> {
        DVector::from_vec(vec![1.0, 1.0])
    }

    fn rhs(&self, _x: f64, y: &DVector<f64>) -> SimResult<DVector<f64>> {
        Ok(DVector::from_vec(vec![-1e4 * y[0] + y[1], -0.01 * y[1]]))
    }
}

#[test]
fn exponential_decay_sdirk2() {
    let mut model = Decay { k: 1.0 };
    let traj = integrate(&mut model, (0.0, 5.0), &IntegrationOptions::default()).unwrap();

    assert_eq!(traj.len(), 1000);
    assert_eq!(traj.x[0], 0.0);
    assert_eq!(*traj.x.last().unwrap(), 5.0);
    for (x, y) in traj.x.iter().zip(&traj.y) {
        assert!((y[0] - (-x).exp()).abs() < 1e-5, "x = {x}, y = {}", y[0]);
    }
}

#[test]
fn exponential_decay_backward_euler() {
    let mut model = Decay { k: 1.0 };
    let opts = IntegrationOptions {
        integrator: IntegratorType::BackwardEuler,
        ..IntegrationOptions::default()
    };
    let traj = integrate(&mut model, (0.0, 2.0), &opts).unwrap();
    let (_, y) = traj.last().unwrap();
    assert!((y[0] - (-2.0f64).exp()).abs() < 1e-3);
}

#[test]
fn samples_are_evenly_spaced() {
    let mut model = Decay { k: 0.5 };
    let opts = IntegrationOptions {
        samples: 11,
        ..IntegrationOptions::default()
    };
    let traj = integrate(&mut model, (0.0, 10.0), &opts).unwrap();
    assert_eq!(traj.len(), 11);
    for (i, x) in traj.x.iter().enumerate() {
        assert!((x - i as f64).abs() < 1e-12);
    }
}

#[test]
fn stiff_cosine_tracks_slow_manifold() {
    let mut model = StiffCosine { lambda: 1e5 };
    let traj = integrate(&mut model, (0.0, 3.0), &IntegrationOptions::default()).unwrap();
    for (x, y) in traj.x.iter().zip(&traj.y) {
        assert!((y[0] - x.cos()).abs() < 1e-4, "x = {x}, y = {}", y[0]);
    }
    // Step count must not scale with the stiffness
    assert!(traj.stats.accepted < 20_000, "{:?}", traj.stats);
}

#[test]
fn stiff_linear_pair() {
    let mut model = StiffPair;
    let traj = integrate(&mut model, (0.0, 100.0), &IntegrationOptions::default()).unwrap();
    let (_, y) = traj.last().unwrap();
    let slow = (-1.0f64).exp();
    assert!((y[1] - slow).abs() < 1e-5);
    // Fast mode relaxes onto y0 = y1 / 1e4
    assert!((y[0] - slow / 1e4).abs() < 1e-7);
}

#[test]
fn reversed_span_rejected() {
    let mut model = Decay { k: 1.0 };
    let err = integrate(&mut model, (1.0, 0.0), &IntegrationOptions::default()).unwrap_err();
    assert!(matches!(err, SimError::InvalidArg { .. }));
}

#[test]
fn step_budget_exhaustion_reports_position() {
    let mut model = Decay { k: 1.0 };
    let opts = IntegrationOptions {
        max_steps: 3,
        ..IntegrationOptions::default()
    };
    match integrate(&mut model, (0.0, 1.0), &opts) {
        Err(SimError::Integration { x, .. }) => assert!(x > 0.0 && x < 1.0),
        other => panic!("expected integration error, got {other:?}"),
    }
}

struct Blowup;

impl OdeModel for Blowup {
    fn dim(&self) -> usize {
        1
    }

    fn initial_state(&self) -> DVector<f64> {
        DVector::from_element(1, 1.0)
    }

    fn rhs(&self, x: f64, y: &DVector<f64>) -> SimResult<DVector<f64>> {
        if x > 1.0 {
            Ok(DVector::from_element(1, f64::NAN))
        } else {
            Ok(y * -1.0)
        }
    }
}

#[test]
fn step_collapse_reports_last_point() {
    let mut model = Blowup;
    match integrate(&mut model, (0.0, 2.0), &IntegrationOptions::default()) {
        Err(SimError::Integration { x, .. }) => assert!(x > 0.99 && x <= 1.0, "x = {x}"),
        other => panic!("expected integration error, got {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn decay_matches_exponential(k in 0.1_f64..50.0, end in 0.5_f64..5.0) {
        let mut model = Decay { k };
        let opts = IntegrationOptions {
            samples: 50,
            ..IntegrationOptions::default()
        };
        let traj = integrate(&mut model, (0.0, end), &opts).unwrap();
        prop_assert_eq!(traj.len(), 50);
        for (x, y) in traj.x.iter().zip(&traj.y) {
            prop_assert!((y[0] - (-k * x).exp()).abs() < 1e-4, "x = {}, y = {}", x, y[0]);
        }
    }
}
