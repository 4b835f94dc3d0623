use std::collections::BTreeSet;

use crate::assemble::Recipe;
use crate::params::{
    ParamMap, BOUTON_REDUCTION_FACTOR, CV_SYNS_CONNECTION, MEAN_SYNS_CONNECTION, PMU_A, P_A,
};
use crate::pathway::Pathway;

/// Which parameters a pathway must define: all of `required`, plus either
/// all of `alt_a` or all of `alt_b`. `alt_a` takes precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRules {
    pub required: BTreeSet<String>,
    pub alt_a: BTreeSet<String>,
    pub alt_b: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid { missing: BTreeSet<String> },
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for ParamRules {
    fn default() -> Self {
        Self::new(
            &[BOUTON_REDUCTION_FACTOR],
            &[P_A, PMU_A],
            &[CV_SYNS_CONNECTION, MEAN_SYNS_CONNECTION],
        )
    }
}

impl ParamRules {
    pub fn new(required: &[&str], alt_a: &[&str], alt_b: &[&str]) -> Self {
        Self {
            required: set(required),
            alt_a: set(alt_a),
            alt_b: set(alt_b),
        }
    }

    /// Check `params` for completeness. When the `alt_a` set is complete,
    /// any `alt_b` parameters are removed from `params`.
    pub fn validate(&self, params: &mut ParamMap) -> Validity {
        let missing_required = missing(&self.required, params);
        if !missing_required.is_empty() {
            return Validity::Invalid {
                missing: missing_required,
            };
        }

        let missing_a = missing(&self.alt_a, params);
        if missing_a.is_empty() {
            for name in &self.alt_b {
                params.remove(name);
            }
            return Validity::Valid;
        }
        if missing_a.len() < self.alt_a.len() {
            // alt_a partially present:
            return Validity::Invalid { missing: missing_a };
        }

        let missing_b = missing(&self.alt_b, params);
        if missing_b.is_empty() {
            Validity::Valid
        } else {
            Validity::Invalid { missing: missing_b }
        }
    }
}

fn missing(names: &BTreeSet<String>, params: &ParamMap) -> BTreeSet<String> {
    names
        .iter()
        .filter(|name| !params.contains_key(*name))
        .cloned()
        .collect()
}

/// Remove every pathway that doesn't pass `rules`, warning about each one,
/// and warn about pathways of `mtypes × mtypes` that are not defined at all.
pub fn clean_recipe(recipe: &mut Recipe, mtypes: &[String], rules: &ParamRules) {
    for from in mtypes {
        for to in mtypes {
            if !recipe.contains_key(&Pathway::new(from, to)) {
                log::warn!("Undefined pathway: ({from}, {to})");
            }
        }
    }
    recipe.retain(|pathway, params| match rules.validate(params) {
        Validity::Valid => true,
        Validity::Invalid { missing } => {
            let missing: Vec<&str> = missing.iter().map(String::as_str).collect();
            log::warn!(
                "pathway {pathway} has undefined parameters: {}; skipping",
                missing.join(", ")
            );
            false
        }
    });
}
