//! Reaction network: species ordering, stoichiometry and bound rate laws.

use crate::error::{KineticsError, KineticsResult};
use crate::expression::BoundRate;
use crate::reaction::Reaction;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// The set of reactions taking place in one reactor.
///
/// Species are the sorted union of every reaction's species. The
/// stoichiometric matrix has one row per species and one column per
/// reaction, so net transformation rates are `S * r`.
#[derive(Debug, Clone)]
pub struct ReactionNetwork {
    reactions: Vec<Arc<Reaction>>,
    species: Vec<String>,
    stoichiometry: DMatrix<f64>,
    rates: Vec<BoundRate>,
}

impl ReactionNetwork {
    pub fn new(reactions: Vec<Arc<Reaction>>) -> KineticsResult<Self> {
        if reactions.is_empty() {
            return Err(KineticsError::InvalidNetwork {
                what: "at least one reaction is required".to_string(),
            });
        }

        let species: Vec<String> = reactions
            .iter()
            .flat_map(|r| r.species().iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut stoichiometry = DMatrix::zeros(species.len(), reactions.len());
        for (j, reaction) in reactions.iter().enumerate() {
            for (name, coeff) in reaction.species_coeffs() {
                if let Some(i) = species.iter().position(|s| s == name) {
                    stoichiometry[(i, j)] = coeff;
                }
            }
        }

        let rates = reactions
            .iter()
            .map(|r| r.rate_law().bind(&species))
            .collect::<KineticsResult<Vec<_>>>()?;

        Ok(Self {
            reactions,
            species,
            stoichiometry,
            rates,
        })
    }

    pub fn reactions(&self) -> &[Arc<Reaction>] {
        &self.reactions
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    pub fn n_reactions(&self) -> usize {
        self.reactions.len()
    }

    pub fn species_index(&self, species: &str) -> Option<usize> {
        self.species.iter().position(|s| s == species)
    }

    /// Species × reactions matrix of stoichiometric coefficients.
    pub fn stoichiometry(&self) -> &DMatrix<f64> {
        &self.stoichiometry
    }

    pub fn reaction_names(&self) -> Vec<String> {
        self.reactions.iter().map(|r| r.name().to_string()).collect()
    }

    /// Rate of every reaction, concentrations in species order.
    pub fn reaction_rates(&self, concentrations: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            self.rates.len(),
            self.rates.iter().map(|r| r.evaluate(concentrations)),
        )
    }

    /// Net transformation rate of every species given reaction rates.
    pub fn transformation_rates_from(&self, reaction_rates: &DVector<f64>) -> DVector<f64> {
        &self.stoichiometry * reaction_rates
    }

    /// Net transformation rate of every species, concentrations in species order.
    pub fn transformation_rates(&self, concentrations: &[f64]) -> DVector<f64> {
        self.transformation_rates_from(&self.reaction_rates(concentrations))
    }

    /// Dense vector in species order from a name-keyed map.
    ///
    /// Every species must be present; unrelated keys are ignored.
    pub fn vector_from_map(
        &self,
        values: &BTreeMap<String, f64>,
        what: &str,
    ) -> KineticsResult<DVector<f64>> {
        let mut out = DVector::zeros(self.species.len());
        for (i, s) in self.species.iter().enumerate() {
            out[i] = *values.get(s).ok_or_else(|| KineticsError::MissingSpecies {
                species: s.clone(),
                what: what.to_string(),
            })?;
        }
        Ok(out)
    }

    /// Name-keyed map from a dense vector in species order.
    pub fn map_from_slice(&self, values: &[f64]) -> BTreeMap<String, f64> {
        self.species
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect()
    }
}
