//! Switching point location during integration.

use nalgebra::DVector;
use rx_sim::{IntegrationOptions, OdeModel, SimResult, integrate};

/// A vessel filling at a constant rate until it reaches capacity.
struct FillingVessel {
    rate: f64,
    capacity: f64,
    full: bool,
}

impl OdeModel for FillingVessel {
    fn dim(&self) -> usize {
        1
    }

    fn initial_state(&self) -> DVector<f64> {
        DVector::from_element(1, 0.5)
    }

    fn rhs(&self, _x: f64, _y: &DVector<f64>) -> SimResult<DVector<f64>> {
        let rate = if self.full { 0.0 } else { self.rate };
        Ok(DVector::from_element(1, rate))
    }

    fn event(&self, _x: f64, y: &DVector<f64>) -> Option<f64> {
        (!self.full).then(|| y[0] - self.capacity)
    }

    fn on_event(&mut self, _x: f64, y: &mut DVector<f64>) -> SimResult<()> {
        self.full = true;
        y[0] = self.capacity;
        Ok(())
    }
}

#[test]
fn fill_time_located() {
    let mut model = FillingVessel {
        rate: 0.1,
        capacity: 1.0,
        full: false,
    };
    let traj = integrate(&mut model, (0.0, 10.0), &IntegrationOptions::default()).unwrap();

    assert!(model.full);
    assert_eq!(traj.events.len(), 1);
    let event = traj.events[0];
    assert!((event.x - 5.0).abs() < 1e-8, "event at {}", event.x);
    assert_eq!(traj.x[event.sample], event.x);
    assert_eq!(traj.y[event.sample][0], 1.0);

    // Volume rises at the fill rate, then holds at capacity
    for w in traj.y.windows(2) {
        assert!(w[1][0] >= w[0][0]);
    }
    for (x, y) in traj.x.iter().zip(&traj.y) {
        if *x < event.x {
            assert!((y[0] - (0.5 + 0.1 * x)).abs() < 1e-10);
        } else {
            assert_eq!(y[0], 1.0);
        }
    }
    // One extra sample at the switching point
    assert_eq!(traj.len(), 1001);
}

#[test]
fn no_event_when_starting_full() {
    let mut model = FillingVessel {
        rate: 0.1,
        capacity: 0.5,
        full: true,
    };
    let traj = integrate(&mut model, (0.0, 1.0), &IntegrationOptions::default()).unwrap();
    assert!(traj.events.is_empty());
    assert!(traj.y.iter().all(|y| y[0] == 0.5));
}

#[test]
fn samples_strictly_increase_around_switch() {
    let mut model = FillingVessel {
        rate: 0.1,
        capacity: 1.0,
        full: false,
    };
    let opts = IntegrationOptions {
        samples: 11,
        ..IntegrationOptions::default()
    };
    let traj = integrate(&mut model, (0.0, 10.0), &opts).unwrap();
    assert_eq!(traj.events.len(), 1);
    assert!(traj.len() == 11 || traj.len() == 12);
    assert!(traj.x.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(*traj.x.last().unwrap(), 10.0);
}
