//! Plain reactor runs and the records they produce.

use crate::error::{ReactorError, ReactorResult};
use crate::kind::ReactorKind;
use crate::ode::ReactorOde;
use crate::reactor::Reactor;
use nalgebra::{DMatrix, DVector};
use rx_core::ensure_positive;
use rx_sim::integrate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything known about the reactor at one point of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatePoint {
    /// Time, or volume for a PFR
    pub x: f64,
    /// Liquid volume (PFR: the volume traversed)
    pub volume: f64,
    pub concentrations: BTreeMap<String, f64>,
    /// Moles, or molar flows for a PFR
    pub amounts: BTreeMap<String, f64>,
    /// Rate of each reaction in declaration order; names need not be unique
    pub reaction_rates: Vec<(String, f64)>,
    /// Net transformation rate of each species
    pub transformation_rates: BTreeMap<String, f64>,
}

impl StatePoint {
    /// Largest absolute net transformation rate over all species.
    pub fn max_transformation_rate(&self) -> f64 {
        self.transformation_rates
            .values()
            .fold(0.0_f64, |m, r| m.max(r.abs()))
    }
}

/// Rates derived at each sample of a run.
#[derive(Clone, Debug)]
pub struct DerivedRates {
    /// samples × reactions
    pub reaction_rates: DMatrix<f64>,
    /// samples × species
    pub transformation_rates: DMatrix<f64>,
}

/// Sampled result of [`Reactor::run`].
#[derive(Clone, Debug)]
pub struct ReactorRun {
    pub kind: ReactorKind,
    pub species: Vec<String>,
    pub reaction_names: Vec<String>,
    /// Time, or volume for a PFR, at each sample
    pub x: Vec<f64>,
    /// Liquid volume at each sample
    pub volumes: Vec<f64>,
    /// samples × species; moles, or molar flows for a PFR
    pub amounts: DMatrix<f64>,
    /// samples × species
    pub concentrations: DMatrix<f64>,
    /// Where a fed vessel became full, if it did during the run
    pub switch_point: Option<f64>,
    /// Present when full output was requested
    pub rates: Option<DerivedRates>,
}

impl ReactorRun {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn species_index(&self, species: &str) -> Option<usize> {
        self.species.iter().position(|s| s == species)
    }

    /// Concentration of `species` at every sample.
    pub fn concentration_series(&self, species: &str) -> Option<Vec<f64>> {
        let j = self.species_index(species)?;
        Some(self.concentrations.column(j).iter().copied().collect())
    }

    /// Amount of `species` at every sample.
    pub fn amount_series(&self, species: &str) -> Option<Vec<f64>> {
        let j = self.species_index(species)?;
        Some(self.amounts.column(j).iter().copied().collect())
    }

    /// Largest absolute transformation rate at sample `i`, if rates were derived.
    pub(crate) fn max_rate_at(&self, i: usize) -> Option<f64> {
        let rates = self.rates.as_ref()?;
        Some(
            rates
                .transformation_rates
                .row(i)
                .iter()
                .fold(0.0_f64, |m, r| m.max(r.abs())),
        )
    }
}

impl Reactor {
    /// Integrate from the initial state over `[0, span]`.
    ///
    /// `span` is a time for batch, fed-batch and CSTR reactors and is
    /// required for them; for a PFR it is a volume and defaults to the design
    /// volume. With `full_output` the reaction and transformation rates are
    /// derived at every sample.
    pub fn run(&self, span: Option<f64>, full_output: bool) -> ReactorResult<ReactorRun> {
        let kind = self.kind();
        let end = match span {
            Some(s) => s,
            None if kind.is_flow_through() => self.volume(),
            None => {
                return Err(ReactorError::config(format!(
                    "a time span must be specified for a {kind} reactor"
                )));
            }
        };
        self.run_to(end, full_output)
    }

    pub(crate) fn run_to(&self, end: f64, full_output: bool) -> ReactorResult<ReactorRun> {
        let end = ensure_positive(end, "integration span")?;
        self.run_pass(ReactorOde::new(self), (0.0, end), full_output)
    }

    /// Integrate one pass over `span` and record its samples.
    pub(crate) fn run_pass(
        &self,
        mut ode: ReactorOde<'_>,
        span: (f64, f64),
        full_output: bool,
    ) -> ReactorResult<ReactorRun> {
        let traj = integrate(&mut ode, span, self.integration_options())?;

        let n = self.network().n_species();
        let m = traj.len();
        let conc: Vec<DVector<f64>> = traj.y.iter().map(|y| self.concentrations_of(y)).collect();
        let volumes: Vec<f64> = traj
            .x
            .iter()
            .zip(&traj.y)
            .map(|(&x, y)| self.volume_of(x, y))
            .collect();

        let rates = full_output.then(|| {
            let r = self.network().n_reactions();
            let mut reaction_rates = DMatrix::zeros(m, r);
            let mut transformation_rates = DMatrix::zeros(m, n);
            for (i, c) in conc.iter().enumerate() {
                let rr = self.network().reaction_rates(c.as_slice());
                let tr = self.network().transformation_rates_from(&rr);
                reaction_rates.set_row(i, &rr.transpose());
                transformation_rates.set_row(i, &tr.transpose());
            }
            DerivedRates {
                reaction_rates,
                transformation_rates,
            }
        });

        tracing::debug!(
            kind = %self.kind(),
            start = span.0,
            end = span.1,
            samples = m,
            accepted = traj.stats.accepted,
            rejected = traj.stats.rejected,
            "reactor run finished"
        );

        Ok(ReactorRun {
            kind: self.kind(),
            species: self.species().to_vec(),
            reaction_names: self.network().reaction_names(),
            amounts: DMatrix::from_fn(m, n, |i, j| traj.y[i][j]),
            concentrations: DMatrix::from_fn(m, n, |i, j| conc[i][j]),
            switch_point: traj.events.first().map(|e| e.x),
            x: traj.x,
            volumes,
            rates,
        })
    }

    /// Integration state at sample `i` of `run`.
    pub(crate) fn state_at(&self, run: &ReactorRun, i: usize) -> DVector<f64> {
        let n = self.network().n_species();
        let mut state = DVector::zeros(self.state_dim());
        state.rows_mut(0, n).tr_copy_from(&run.amounts.row(i));
        if self.kind().tracks_volume() {
            state[n] = run.volumes[i];
        }
        state
    }

    /// State point at sample `i` of `run`.
    pub(crate) fn sample_point(&self, run: &ReactorRun, i: usize) -> StatePoint {
        let amounts: Vec<f64> = run.amounts.row(i).iter().copied().collect();
        let conc: Vec<f64> = run.concentrations.row(i).iter().copied().collect();
        self.state_point(run.x[i], run.volumes[i], &amounts, &conc)
    }

    /// State point linearly interpolated between samples `i - 1` and `i`.
    pub(crate) fn interpolated_point(&self, run: &ReactorRun, i: usize, theta: f64) -> StatePoint {
        let mix = |a: f64, b: f64| rx_core::lerp(a, b, theta);
        let row = |mat: &DMatrix<f64>| -> Vec<f64> {
            mat.row(i - 1)
                .iter()
                .zip(mat.row(i).iter())
                .map(|(&a, &b)| mix(a, b))
                .collect()
        };
        let amounts = row(&run.amounts);
        let conc = row(&run.concentrations);
        self.state_point(
            mix(run.x[i - 1], run.x[i]),
            mix(run.volumes[i - 1], run.volumes[i]),
            &amounts,
            &conc,
        )
    }
}
