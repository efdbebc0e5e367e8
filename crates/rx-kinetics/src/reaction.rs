//! Named reactions with stoichiometry and a rate law.

use crate::error::{KineticsError, KineticsResult};
use crate::expression::{Concentrations, RateExpression};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// A single reaction.
///
/// Coefficients are signed: negative for consumed species, positive for
/// produced ones. Immutable once built; reactors share it through `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    name: String,
    species: Vec<String>,
    coeffs: Vec<f64>,
    rate_law: RateExpression,
}

impl Reaction {
    /// Build a reaction and validate its rate law against its species.
    ///
    /// # Errors
    ///
    /// - `InvalidReaction` if species and coefficients differ in length,
    ///   a species is repeated, the species list is empty, or a coefficient
    ///   is not finite
    /// - `Parse` if the rate law is not a valid algebraic expression
    /// - `UnknownSymbol` if the rate law references a non-species symbol
    pub fn new<N, I, S, C>(name: N, species: I, coeffs: C, rate_law: &str) -> KineticsResult<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: IntoIterator<Item = f64>,
    {
        let name = name.into();
        let species: Vec<String> = species.into_iter().map(Into::into).collect();
        let coeffs: Vec<f64> = coeffs.into_iter().collect();
        let invalid = |what: String| KineticsError::InvalidReaction {
            reaction: name.clone(),
            what,
        };

        if species.len() != coeffs.len() {
            return Err(invalid(format!(
                "{} species but {} coefficients",
                species.len(),
                coeffs.len()
            )));
        }
        if species.is_empty() {
            return Err(invalid("no species given".to_string()));
        }
        let mut seen = HashSet::new();
        for s in &species {
            if !seen.insert(s.as_str()) {
                return Err(invalid(format!("species '{s}' is repeated")));
            }
        }
        if let Some((s, c)) = species.iter().zip(&coeffs).find(|(_, c)| !c.is_finite()) {
            return Err(invalid(format!("coefficient of '{s}' is not finite: {c}")));
        }

        let rate_law = RateExpression::new(rate_law, species.iter().cloned())?;

        Ok(Self {
            name,
            species,
            coeffs,
            rate_law,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn rate_law(&self) -> &RateExpression {
        &self.rate_law
    }

    /// Coefficient of `species`, if it takes part in this reaction.
    pub fn coefficient(&self, species: &str) -> Option<f64> {
        self.species
            .iter()
            .position(|s| s == species)
            .map(|i| self.coeffs[i])
    }

    /// (species, coefficient) pairs in declaration order.
    pub fn species_coeffs(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.species
            .iter()
            .map(String::as_str)
            .zip(self.coeffs.iter().copied())
    }

    /// Reaction rate at the given concentrations.
    pub fn rate<C>(&self, concentrations: &C) -> KineticsResult<f64>
    where
        C: Concentrations + ?Sized,
    {
        self.rate_law.evaluate(concentrations)
    }

    /// Contribution of this reaction to each of its species: `coeff * rate`.
    pub fn transformation_rates<C>(&self, concentrations: &C) -> KineticsResult<BTreeMap<String, f64>>
    where
        C: Concentrations + ?Sized,
    {
        let rate = self.rate(concentrations)?;
        Ok(self
            .species_coeffs()
            .map(|(s, c)| (s.to_string(), c * rate))
            .collect())
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name: {}, Species: {{", self.name)?;
        for (i, (s, c)) in self.species_coeffs().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{s}: {c}")?;
        }
        write!(f, "}}, Rate law: {}", self.rate_law)
    }
}
