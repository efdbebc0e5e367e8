//! Reactor construction, validation and right-hand sides.

use crate::error::{ReactorError, ReactorResult};
use crate::kind::ReactorKind;
use crate::run::StatePoint;
use nalgebra::DVector;
use rx_core::{ensure_non_negative, ensure_positive};
use rx_kinetics::{Reaction, ReactionNetwork};
use rx_sim::IntegrationOptions;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Volume below which a filling vessel is treated as empty, relative to the
/// design volume. Concentrations are not formed from `N / V` below it.
pub(crate) const EMPTY_VESSEL_FRACTION: f64 = 1e-12;

/// Parameters of a closed vessel.
#[derive(Clone, Debug)]
pub(crate) struct BatchParams {
    /// Initial concentrations, species order
    pub initial: DVector<f64>,
}

/// Parameters of a vessel fed at a constant rate (fed-batch and CSTR).
#[derive(Clone, Debug)]
pub(crate) struct FeedParams {
    pub initial: DVector<f64>,
    pub initial_volume: f64,
    pub flow_rate: f64,
    pub inlet: DVector<f64>,
}

/// Parameters of a plug flow reactor.
#[derive(Clone, Debug)]
pub(crate) struct PfrParams {
    pub flow_rate: f64,
    pub inlet: DVector<f64>,
}

/// Topology with its parameters.
#[derive(Clone, Debug)]
pub(crate) enum ReactorModel {
    Batch(BatchParams),
    FedBatch(FeedParams),
    Cstr(FeedParams),
    Pfr(PfrParams),
}

/// Feed state of a fed-batch or CSTR vessel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FeedMode {
    /// Below design volume: inflow only
    Filling,
    /// At design volume: fed-batch stops feeding, CSTR overflows
    Full,
}

/// An ideal reactor ready to simulate.
///
/// Reactions are shared, not owned, so one reaction can appear in several
/// reactors. Every run starts from the configured initial state; a reactor
/// holds no state between calls.
#[derive(Clone, Debug)]
pub struct Reactor {
    volume: f64,
    network: ReactionNetwork,
    model: ReactorModel,
    options: IntegrationOptions,
}

impl Reactor {
    /// Start building a reactor of `kind` with design `volume`.
    pub fn builder(kind: ReactorKind, volume: f64, reactions: Vec<Arc<Reaction>>) -> ReactorBuilder {
        ReactorBuilder {
            kind,
            volume,
            reactions,
            initial_concentrations: None,
            initial_volume: None,
            flow_rate: None,
            inlet_concentrations: None,
            options: IntegrationOptions::default(),
        }
    }

    pub fn kind(&self) -> ReactorKind {
        match self.model {
            ReactorModel::Batch(_) => ReactorKind::Batch,
            ReactorModel::FedBatch(_) => ReactorKind::FedBatch,
            ReactorModel::Cstr(_) => ReactorKind::Cstr,
            ReactorModel::Pfr(_) => ReactorKind::Pfr,
        }
    }

    /// Design volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn network(&self) -> &ReactionNetwork {
        &self.network
    }

    pub fn species(&self) -> &[String] {
        self.network.species()
    }

    pub fn reactions(&self) -> &[Arc<Reaction>] {
        self.network.reactions()
    }

    pub fn integration_options(&self) -> &IntegrationOptions {
        &self.options
    }

    pub fn flow_rate(&self) -> Option<f64> {
        match &self.model {
            ReactorModel::Batch(_) => None,
            ReactorModel::FedBatch(p) | ReactorModel::Cstr(p) => Some(p.flow_rate),
            ReactorModel::Pfr(p) => Some(p.flow_rate),
        }
    }

    pub fn initial_volume(&self) -> Option<f64> {
        match &self.model {
            ReactorModel::FedBatch(p) | ReactorModel::Cstr(p) => Some(p.initial_volume),
            _ => None,
        }
    }

    /// Design volume over flow rate, for reactors with a feed.
    pub fn residence_time(&self) -> Option<f64> {
        self.flow_rate().map(|q| self.volume / q)
    }

    /// Reference concentration of each species for conversions: the initial
    /// bulk concentration, or the inlet concentration for a PFR.
    pub fn reference_concentrations(&self) -> &DVector<f64> {
        match &self.model {
            ReactorModel::Batch(p) => &p.initial,
            ReactorModel::FedBatch(p) | ReactorModel::Cstr(p) => &p.initial,
            ReactorModel::Pfr(p) => &p.inlet,
        }
    }

    pub(crate) fn model(&self) -> &ReactorModel {
        &self.model
    }

    /// Number of state variables: amounts per species, plus volume when tracked.
    pub fn state_dim(&self) -> usize {
        self.network.n_species() + usize::from(self.kind().tracks_volume())
    }

    /// Feed mode of a state: a fed vessel below design volume is filling.
    pub(crate) fn mode_of(&self, state: &DVector<f64>) -> FeedMode {
        if self.kind().tracks_volume() && state[self.network.n_species()] < self.volume {
            FeedMode::Filling
        } else {
            FeedMode::Full
        }
    }

    /// Initial state: moles (closed and fed vessels) or molar flows (PFR).
    pub(crate) fn initial_state(&self) -> DVector<f64> {
        match &self.model {
            ReactorModel::Batch(p) => &p.initial * self.volume,
            ReactorModel::FedBatch(p) | ReactorModel::Cstr(p) => {
                let n = p.initial.len();
                let mut y = DVector::zeros(n + 1);
                y.rows_mut(0, n).copy_from(&(&p.initial * p.initial_volume));
                y[n] = p.initial_volume;
                y
            }
            ReactorModel::Pfr(p) => &p.inlet * p.flow_rate,
        }
    }

    /// Liquid volume for a state. For a PFR this is the independent variable.
    pub(crate) fn volume_of(&self, x: f64, state: &DVector<f64>) -> f64 {
        match &self.model {
            ReactorModel::Batch(_) => self.volume,
            ReactorModel::FedBatch(_) | ReactorModel::Cstr(_) => state[self.network.n_species()],
            ReactorModel::Pfr(_) => x,
        }
    }

    fn is_empty_vessel(&self, volume: f64) -> bool {
        volume <= EMPTY_VESSEL_FRACTION * self.volume
    }

    /// Bulk concentrations for a state, species order.
    ///
    /// An empty fed vessel reports its inlet concentrations.
    pub(crate) fn concentrations_of(&self, state: &DVector<f64>) -> DVector<f64> {
        let n = self.network.n_species();
        let amounts = state.rows(0, n);
        match &self.model {
            ReactorModel::Batch(_) => amounts / self.volume,
            ReactorModel::FedBatch(p) | ReactorModel::Cstr(p) => {
                let v = state[n];
                if self.is_empty_vessel(v) {
                    p.inlet.clone()
                } else {
                    amounts / v
                }
            }
            ReactorModel::Pfr(p) => amounts / p.flow_rate,
        }
    }

    /// Right-hand side in a given feed mode.
    pub(crate) fn rhs_in_mode(&self, mode: FeedMode, state: &DVector<f64>) -> DVector<f64> {
        let n = self.network.n_species();
        match &self.model {
            ReactorModel::Batch(_) => {
                let c = self.concentrations_of(state);
                self.network.transformation_rates(c.as_slice()) * self.volume
            }
            ReactorModel::Pfr(_) => {
                let c = self.concentrations_of(state);
                self.network.transformation_rates(c.as_slice())
            }
            ReactorModel::FedBatch(p) | ReactorModel::Cstr(p) => {
                let v = state[n];
                let c = self.concentrations_of(state);
                let mut dn = if self.is_empty_vessel(v) {
                    DVector::zeros(n)
                } else {
                    self.network.transformation_rates(c.as_slice()) * v
                };

                let overflow = matches!(self.model, ReactorModel::Cstr(_));
                let dv = match mode {
                    FeedMode::Filling => {
                        dn += &p.inlet * p.flow_rate;
                        p.flow_rate
                    }
                    FeedMode::Full if overflow => {
                        dn += (&p.inlet - &c) * p.flow_rate;
                        0.0
                    }
                    FeedMode::Full => 0.0,
                };

                let mut out = DVector::zeros(n + 1);
                out.rows_mut(0, n).copy_from(&dn);
                out[n] = dv;
                out
            }
        }
    }

    /// `d(state)/dx` at `(x, state)`.
    ///
    /// The state holds moles per species (followed by the volume for
    /// fed-batch and CSTR) or molar flows for a PFR. A fed vessel whose
    /// volume has reached the design volume is taken to be full.
    pub fn derivative(&self, _x: f64, state: &DVector<f64>) -> ReactorResult<DVector<f64>> {
        if state.len() != self.state_dim() {
            return Err(ReactorError::config(format!(
                "state has {} entries, expected {}",
                state.len(),
                self.state_dim()
            )));
        }
        Ok(self.rhs_in_mode(self.mode_of(state), state))
    }

    /// Full description of one state, with rates evaluated at its concentrations.
    pub(crate) fn state_point(
        &self,
        x: f64,
        volume: f64,
        amounts: &[f64],
        concentrations: &[f64],
    ) -> StatePoint {
        let reaction_rates = self.network.reaction_rates(concentrations);
        let transformation_rates = self.network.transformation_rates_from(&reaction_rates);
        StatePoint {
            x,
            volume,
            concentrations: self.network.map_from_slice(concentrations),
            amounts: self.network.map_from_slice(amounts),
            reaction_rates: self
                .network
                .reaction_names()
                .into_iter()
                .zip(reaction_rates.iter().copied())
                .collect(),
            transformation_rates: self.network.map_from_slice(transformation_rates.as_slice()),
        }
    }
}

fn write_map(f: &mut fmt::Formatter<'_>, map: &BTreeMap<String, f64>) -> fmt::Result {
    f.write_str("{")?;
    for (i, (k, v)) in map.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{k}: {v}")?;
    }
    f.write_str("}")
}

impl fmt::Display for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Volume: {}", self.volume)?;
        f.write_str("Reactions: ")?;
        for (i, r) in self.reactions().iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}. {r}", i + 1)?;
        }

        let species_map = |v: &DVector<f64>| self.network.map_from_slice(v.as_slice());
        match &self.model {
            ReactorModel::Batch(p) => {
                f.write_str("\nInitial bulk concentrations: ")?;
                write_map(f, &species_map(&p.initial))
            }
            ReactorModel::FedBatch(p) | ReactorModel::Cstr(p) => {
                f.write_str("\nInitial bulk concentrations: ")?;
                write_map(f, &species_map(&p.initial))?;
                write!(
                    f,
                    "\nInitial volume: {}\nFlow rate: {}\nInlet concentrations: ",
                    p.initial_volume, p.flow_rate
                )?;
                write_map(f, &species_map(&p.inlet))
            }
            ReactorModel::Pfr(p) => {
                write!(f, "\nFlow rate: {}\nInlet concentrations: ", p.flow_rate)?;
                write_map(f, &species_map(&p.inlet))
            }
        }
    }
}

/// Builder for [`Reactor`].
///
/// Parameters that the selected topology does not use are ignored.
#[derive(Clone, Debug)]
pub struct ReactorBuilder {
    kind: ReactorKind,
    volume: f64,
    reactions: Vec<Arc<Reaction>>,
    initial_concentrations: Option<BTreeMap<String, f64>>,
    initial_volume: Option<f64>,
    flow_rate: Option<f64>,
    inlet_concentrations: Option<BTreeMap<String, f64>>,
    options: IntegrationOptions,
}

fn collect_map<I, K>(values: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = (K, f64)>,
    K: Into<String>,
{
    values.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

impl ReactorBuilder {
    /// Initial bulk concentrations (batch, fed-batch, CSTR).
    pub fn initial_concentrations<I, K>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.initial_concentrations = Some(collect_map(values));
        self
    }

    /// Liquid volume at the start (fed-batch, CSTR).
    pub fn initial_volume(mut self, volume: f64) -> Self {
        self.initial_volume = Some(volume);
        self
    }

    /// Volumetric feed rate (fed-batch, CSTR, PFR).
    pub fn flow_rate(mut self, flow_rate: f64) -> Self {
        self.flow_rate = Some(flow_rate);
        self
    }

    /// Feed concentrations (fed-batch, CSTR, PFR).
    pub fn inlet_concentrations<I, K>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.inlet_concentrations = Some(collect_map(values));
        self
    }

    pub fn integration_options(mut self, options: IntegrationOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate everything and build the reactor.
    ///
    /// # Errors
    ///
    /// `Configuration` when the design volume is not positive, there are no
    /// reactions, a parameter required by the topology is missing or out of
    /// range, or a species lacks a concentration. `UnknownSymbol` cannot occur
    /// here since reactions validate their rate laws on construction.
    pub fn build(self) -> ReactorResult<Reactor> {
        let kind = self.kind;
        let volume = ensure_positive(self.volume, "reactor volume")?;
        self.options.validate()?;
        let network = ReactionNetwork::new(self.reactions)?;

        let missing = |what: &str| ReactorError::config(format!("{what} must be specified for a {kind} reactor"));
        let concentrations = |map: Option<&BTreeMap<String, f64>>, what: &str| -> ReactorResult<DVector<f64>> {
            let map = map.ok_or_else(|| missing(&format!("{what}s")))?;
            let v = network.vector_from_map(map, what)?;
            for (s, c) in network.species().iter().zip(v.iter()) {
                ensure_non_negative(*c, &format!("{what} of '{s}'"))?;
            }
            Ok(v)
        };
        let flow_rate = || -> ReactorResult<f64> {
            let q = self.flow_rate.ok_or_else(|| missing("flow rate"))?;
            Ok(ensure_positive(q, "flow rate")?)
        };

        let model = match kind {
            ReactorKind::Batch => ReactorModel::Batch(BatchParams {
                initial: concentrations(self.initial_concentrations.as_ref(), "initial concentration")?,
            }),
            ReactorKind::FedBatch | ReactorKind::Cstr => {
                let initial =
                    concentrations(self.initial_concentrations.as_ref(), "initial concentration")?;
                let v0 = self.initial_volume.ok_or_else(|| missing("initial volume"))?;
                let v0 = ensure_non_negative(v0, "initial volume")?;
                if v0 > volume {
                    return Err(ReactorError::config(format!(
                        "initial volume {v0} exceeds reactor volume {volume}"
                    )));
                }
                let params = FeedParams {
                    initial,
                    initial_volume: v0,
                    flow_rate: flow_rate()?,
                    inlet: concentrations(self.inlet_concentrations.as_ref(), "inlet concentration")?,
                };
                if kind == ReactorKind::FedBatch {
                    ReactorModel::FedBatch(params)
                } else {
                    ReactorModel::Cstr(params)
                }
            }
            ReactorKind::Pfr => ReactorModel::Pfr(PfrParams {
                flow_rate: flow_rate()?,
                inlet: concentrations(self.inlet_concentrations.as_ref(), "inlet concentration")?,
            }),
        };

        tracing::debug!(
            %kind,
            volume,
            species = network.n_species(),
            reactions = network.n_reactions(),
            "reactor built"
        );

        Ok(Reactor {
            volume,
            network,
            model,
            options: self.options,
        })
    }
}
