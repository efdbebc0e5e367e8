//! Scenario file schema.

use crate::CliError;
use rx_reactor::{
    IntegrationOptions, IntegratorType, Reaction, Reactor, ReactorError, ReactorKind, SteadyStateOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// One reactor set-up: topology, reactions and operating conditions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// batch, fed-batch, cstr or pfr
    pub kind: String,
    pub volume: f64,
    pub reactions: Vec<ReactionDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_concentrations: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inlet_concentrations: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub integration: IntegrationDef,
    #[serde(default)]
    pub steady_state: SteadyStateDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionDef {
    pub name: String,
    pub species: Vec<String>,
    pub coefficients: Vec<f64>,
    pub rate_law: String,
}

/// Overrides of the integrator defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntegrationDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_step_fraction: Option<f64>,
}

/// Overrides of the steady-state search defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SteadyStateDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guess: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
}

impl IntegrationDef {
    pub fn to_options(&self) -> Result<IntegrationOptions, CliError> {
        let mut options = IntegrationOptions::default();
        if let Some(name) = &self.integrator {
            options.integrator = name
                .parse::<IntegratorType>()
                .map_err(|e| CliError::Scenario {
                    what: e.to_string(),
                })?;
        }
        if let Some(rtol) = self.rtol {
            options.rtol = rtol;
        }
        if let Some(atol) = self.atol {
            options.atol = atol;
        }
        if let Some(samples) = self.samples {
            options.samples = samples;
        }
        if let Some(fraction) = self.max_step_fraction {
            options.max_step_fraction = fraction;
        }
        Ok(options)
    }
}

impl SteadyStateDef {
    pub fn to_options(&self) -> SteadyStateOptions {
        let defaults = SteadyStateOptions::default();
        SteadyStateOptions {
            guess: self.guess.unwrap_or(defaults.guess),
            threshold: self.threshold.unwrap_or(defaults.threshold),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
        }
    }
}

impl Scenario {
    pub fn from_yaml(content: &str) -> Result<Self, CliError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn kind(&self) -> Result<ReactorKind, CliError> {
        Ok(self.kind.parse::<ReactorKind>()?)
    }

    /// Build the reactor this scenario describes.
    pub fn build(&self) -> Result<Reactor, CliError> {
        let reactions = self
            .reactions
            .iter()
            .map(|r| {
                Reaction::new(
                    r.name.as_str(),
                    r.species.iter().cloned(),
                    r.coefficients.iter().copied(),
                    &r.rate_law,
                )
                .map(Arc::new)
                .map_err(ReactorError::from)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = Reactor::builder(self.kind()?, self.volume, reactions)
            .integration_options(self.integration.to_options()?);
        if let Some(c) = &self.initial_concentrations {
            builder = builder.initial_concentrations(c.clone());
        }
        if let Some(v0) = self.initial_volume {
            builder = builder.initial_volume(v0);
        }
        if let Some(q) = self.flow_rate {
            builder = builder.flow_rate(q);
        }
        if let Some(c) = &self.inlet_concentrations {
            builder = builder.inlet_concentrations(c.clone());
        }
        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSTR: &str = r#"
name: reversible pair
kind: cstr
volume: 10
reactions:
  - name: Reaction 1
    species: [A, B, C]
    coefficients: [-1, -1, 1]
    rate_law: 0.05*A*B
  - name: Reaction 23
    species: [A, B, C]
    coefficients: [1, 1, -1]
    rate_law: 0.025*C
initial_concentrations: {A: 1, B: 1, C: 0}
initial_volume: 0.5
flow_rate: 0.1
inlet_concentrations: {A: 1, B: 1, C: 0}
integration:
  integrator: backward-euler
  samples: 200
"#;

    #[test]
    fn parses_and_builds() {
        let scenario = Scenario::from_yaml(CSTR).unwrap();
        assert_eq!(scenario.reactions.len(), 2);
        assert_eq!(scenario.steady_state, SteadyStateDef::default());

        let reactor = scenario.build().unwrap();
        assert_eq!(reactor.kind(), ReactorKind::Cstr);
        assert_eq!(reactor.residence_time(), Some(100.0));
        assert_eq!(reactor.integration_options().samples, 200);
        assert_eq!(
            reactor.integration_options().integrator,
            IntegratorType::BackwardEuler
        );
    }

    #[test]
    fn steady_state_overrides() {
        let def = SteadyStateDef {
            guess: Some(50.0),
            ..SteadyStateDef::default()
        };
        let options = def.to_options();
        assert_eq!(options.guess, 50.0);
        assert_eq!(options.threshold, 1e-3);
    }

    #[test]
    fn unknown_kind_and_integrator() {
        let mut scenario = Scenario::from_yaml(CSTR).unwrap();
        scenario.kind = "tubular".to_string();
        assert!(matches!(scenario.build(), Err(CliError::Reactor(_))));

        let mut scenario = Scenario::from_yaml(CSTR).unwrap();
        scenario.integration.integrator = Some("euler".to_string());
        assert!(matches!(scenario.build(), Err(CliError::Scenario { .. })));
    }

    #[test]
    fn missing_parameter_surfaces_reactor_error() {
        let mut scenario = Scenario::from_yaml(CSTR).unwrap();
        scenario.flow_rate = None;
        let err = scenario.build().unwrap_err();
        assert!(err.to_string().contains("flow rate"));
    }

    #[test]
    fn rate_law_errors_surface() {
        let mut scenario = Scenario::from_yaml(CSTR).unwrap();
        scenario.reactions[0].rate_law = "0.05*A*D".to_string();
        assert!(matches!(
            scenario.build(),
            Err(CliError::Reactor(ReactorError::UnknownSymbol { .. }))
        ));
    }

    #[test]
    fn bundled_scenarios_build() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");
        for (file, kind) in [
            ("batch.yaml", ReactorKind::Batch),
            ("fed_batch.yaml", ReactorKind::FedBatch),
            ("cstr.yaml", ReactorKind::Cstr),
            ("pfr.yaml", ReactorKind::Pfr),
        ] {
            let scenario = Scenario::load(&dir.join(file)).unwrap();
            assert_eq!(scenario.build().unwrap().kind(), kind, "{file}");
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Scenario::load(Path::new("does/not/exist.yaml")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
