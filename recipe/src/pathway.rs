use std::fmt;

use serde::{Deserialize, Serialize};

pub const WILDCARD: &str = "*";

/// One side of a pathway pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pattern {
    /// Matches every entity type.
    Any,
    /// A single entity type.
    Id(String),
}

impl Pattern {
    pub fn parse(s: &str) -> Self {
        if s == WILDCARD {
            Self::Any
        } else {
            Self::Id(s.to_owned())
        }
    }

    /// Every concrete entity type this side stands for.
    pub fn resolve<'a>(&'a self, universe: &'a [String]) -> Vec<&'a str> {
        match self {
            Self::Any => universe.iter().map(String::as_str).collect(),
            Self::Id(id) => vec![id.as_str()],
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(WILDCARD),
            Self::Id(id) => f.write_str(id),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// `(from, to)` where either side may be a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathwayPattern {
    pub from: Pattern,
    pub to: Pattern,
}

impl PathwayPattern {
    pub fn new(from: impl Into<Pattern>, to: impl Into<Pattern>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// `(*, *)`
    pub fn any() -> Self {
        Self::new(Pattern::Any, Pattern::Any)
    }

    /// Cartesian product of both sides over `universe`, `from`-major.
    pub fn expand(&self, universe: &[String]) -> Vec<Pathway> {
        let froms = self.from.resolve(universe);
        let tos = self.to.resolve(universe);
        let mut pathways = Vec::with_capacity(froms.len() * tos.len());
        for from in &froms {
            for to in &tos {
                pathways.push(Pathway::new(from, to));
            }
        }
        pathways
    }
}

impl From<Pathway> for PathwayPattern {
    fn from(pathway: Pathway) -> Self {
        Self::new(Pattern::Id(pathway.from), Pattern::Id(pathway.to))
    }
}

impl fmt::Display for PathwayPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

/// A fully resolved `(from, to)` pair of entity types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pathway {
    pub from: String,
    pub to: String,
}

impl Pathway {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_owned(),
            to: to.to_owned(),
        }
    }
}

impl fmt::Display for Pathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn universe() -> Vec<String> {
        vec!["A".to_owned(), "B".to_owned(), "C".to_owned()]
    }

    #[test]
    fn test_expand_wildcards() {
        let pathways = PathwayPattern::any().expand(&universe());
        assert_eq!(9, pathways.len());
        assert_eq!(Pathway::new("A", "A"), pathways[0]);
        assert_eq!(Pathway::new("A", "B"), pathways[1]);
        assert_eq!(Pathway::new("C", "C"), pathways[8]);
    }

    #[test]
    fn test_expand_one_side() {
        let pathways = PathwayPattern::new("A", "*").expand(&universe());
        assert_eq!(
            vec![
                Pathway::new("A", "A"),
                Pathway::new("A", "B"),
                Pathway::new("A", "C")
            ],
            pathways
        );
        let pathways = PathwayPattern::new("*", "B").expand(&universe());
        assert_eq!(3, pathways.len());
        assert!(pathways.iter().all(|p| p.to == "B"));
    }

    #[test]
    fn test_expand_concrete() {
        let pathways = PathwayPattern::new("A", "Z").expand(&universe());
        assert_eq!(vec![Pathway::new("A", "Z")], pathways);
    }
}
