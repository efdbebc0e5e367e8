//! Adapter presenting a reactor to the integrator.

use crate::reactor::{FeedMode, Reactor, ReactorModel};
use nalgebra::DVector;
use rx_sim::{OdeModel, SimResult};

/// One integration pass over a reactor, carrying its feed mode.
///
/// Fed vessels start `Filling` unless they start at design volume. The
/// switching function is `V - V_design`; once it crosses zero the volume is
/// pinned to the design volume and the mode becomes `Full` for the rest of
/// the pass.
pub(crate) struct ReactorOde<'a> {
    reactor: &'a Reactor,
    start: DVector<f64>,
    mode: FeedMode,
}

impl<'a> ReactorOde<'a> {
    pub(crate) fn new(reactor: &'a Reactor) -> Self {
        Self::resume(reactor, reactor.initial_state())
    }

    /// A pass starting from `start` instead of the configured initial state.
    pub(crate) fn resume(reactor: &'a Reactor, start: DVector<f64>) -> Self {
        Self {
            mode: reactor.mode_of(&start),
            reactor,
            start,
        }
    }
}

impl OdeModel for ReactorOde<'_> {
    fn dim(&self) -> usize {
        self.reactor.state_dim()
    }

    fn initial_state(&self) -> DVector<f64> {
        self.start.clone()
    }

    fn rhs(&self, _x: f64, y: &DVector<f64>) -> SimResult<DVector<f64>> {
        Ok(self.reactor.rhs_in_mode(self.mode, y))
    }

    fn event(&self, _x: f64, y: &DVector<f64>) -> Option<f64> {
        match (self.reactor.model(), self.mode) {
            (ReactorModel::FedBatch(_) | ReactorModel::Cstr(_), FeedMode::Filling) => {
                Some(y[self.reactor.network().n_species()] - self.reactor.volume())
            }
            _ => None,
        }
    }

    fn on_event(&mut self, x: f64, y: &mut DVector<f64>) -> SimResult<()> {
        let n = self.reactor.network().n_species();
        y[n] = self.reactor.volume();
        self.mode = FeedMode::Full;
        tracing::debug!(x, kind = %self.reactor.kind(), "vessel full, feed mode switched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ReactorKind;
    use rx_kinetics::Reaction;
    use std::sync::Arc;

    fn reactor(kind: ReactorKind, v0: f64) -> Reactor {
        let r = Arc::new(Reaction::new("R", ["A", "B"], [-1.0, 1.0], "0.1*A").unwrap());
        Reactor::builder(kind, 2.0, vec![r])
            .initial_concentrations([("A", 1.0), ("B", 0.0)])
            .initial_volume(v0)
            .flow_rate(0.5)
            .inlet_concentrations([("A", 2.0), ("B", 0.0)])
            .build()
            .unwrap()
    }

    #[test]
    fn switching_function_only_while_filling() {
        let r = reactor(ReactorKind::FedBatch, 1.0);
        let mut ode = ReactorOde::new(&r);
        let mut y = ode.initial_state();
        assert_eq!(ode.event(0.0, &y), Some(-1.0));

        y[2] = 2.0 + 1e-9;
        ode.on_event(2.0, &mut y).unwrap();
        assert_eq!(y[2], 2.0);
        assert_eq!(ode.event(2.0, &y), None);
        assert_eq!(ode.rhs(2.0, &y).unwrap()[2], 0.0);
    }

    #[test]
    fn batch_and_pfr_never_switch() {
        let r = reactor(ReactorKind::Batch, 0.0);
        let ode = ReactorOde::new(&r);
        assert_eq!(ode.event(0.0, &ode.initial_state()), None);

        let r = reactor(ReactorKind::Pfr, 0.0);
        let ode = ReactorOde::new(&r);
        // Molar flows are inlet concentration times flow rate
        assert_eq!(ode.initial_state().as_slice(), [1.0, 0.0]);
        assert_eq!(ode.event(0.0, &ode.initial_state()), None);
    }

    #[test]
    fn resumed_pass_takes_mode_from_state() {
        let r = reactor(ReactorKind::Cstr, 1.0);
        let filling = ReactorOde::resume(&r, DVector::from_vec(vec![1.5, 0.2, 1.8]));
        assert_eq!(filling.initial_state().as_slice(), [1.5, 0.2, 1.8]);
        assert!(filling.event(0.0, &filling.initial_state()).is_some());

        let full = ReactorOde::resume(&r, DVector::from_vec(vec![1.5, 0.2, 2.0]));
        assert_eq!(full.event(0.0, &full.initial_state()), None);
        assert_eq!(full.rhs(0.0, &full.initial_state()).unwrap()[2], 0.0);
    }
}
