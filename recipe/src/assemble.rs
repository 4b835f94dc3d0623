use std::collections::BTreeMap;

use crate::params::ParamMap;
use crate::pathway::{Pathway, PathwayPattern};

/// Resolved pathways and their parameters, ordered by pathway.
pub type Recipe = BTreeMap<Pathway, ParamMap>;

/// Contributions of one strategy, in the order they were produced.
pub type Rules = Vec<(PathwayPattern, ParamMap)>;

/// Assemble a recipe from strategy contributions, in order.
///
/// Wildcard sides are expanded over `mtypes`, and each contribution is merged
/// into every pathway it covers: a parameter set later replaces the same
/// parameter set earlier, while different parameters accumulate.
pub fn init_recipe<I>(mtypes: &[String], rules: I) -> Recipe
where
    I: IntoIterator<Item = (PathwayPattern, ParamMap)>,
{
    let mut recipe = Recipe::new();
    for (pattern, params) in rules {
        for pathway in pattern.expand(mtypes) {
            let entry = recipe.entry(pathway).or_default();
            for (name, value) in &params {
                entry.insert(name.clone(), value.clone());
            }
        }
    }
    recipe
}
