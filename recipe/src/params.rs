use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const BOUTON_REDUCTION_FACTOR: &str = "bouton_reduction_factor";
pub const CV_SYNS_CONNECTION: &str = "cv_syns_connection";
pub const MEAN_SYNS_CONNECTION: &str = "mean_syns_connection";
pub const P_A: &str = "p_A";
pub const PMU_A: &str = "pMu_A";

/// A single pathway parameter.
///
/// Most parameters are numeric; selection attributes such as `fromRegion`
/// are kept as text and written verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Interpret an attribute read from a recipe document.
    pub fn from_attr(text: &str) -> Self {
        match text.trim().parse::<f64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(text.to_owned()),
        }
    }

    /// Format for a recipe document: numbers with 3 decimals, text as-is.
    pub fn to_attr(&self) -> String {
        match self {
            Self::Number(n) => format!("{n:.3}"),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Parameters of one pathway, ordered by name.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Build a `ParamMap` with a single entry.
pub fn single(name: &str, value: impl Into<ParamValue>) -> ParamMap {
    let mut map = ParamMap::new();
    map.insert(name.to_owned(), value.into());
    map
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn test_attr() {
        assert_eq!("0.320", ParamValue::from(0.32).to_attr());
        assert_eq!("1.000", ParamValue::from(1.0).to_attr());
        assert_eq!("SSp", ParamValue::from("SSp").to_attr());
        assert_eq!(ParamValue::Number(2.5), ParamValue::from_attr("2.500"));
        assert_eq!(ParamValue::Text("SSp".into()), ParamValue::from_attr("SSp"));
    }

    #[test]
    fn test_deserialize() -> anyhow::Result<()> {
        let map: ParamMap = serde_yaml::from_str("a: 1\nb: 0.5\nc: SSp\n")?;
        assert_eq!(Some(&ParamValue::Number(1.0)), map.get("a"));
        assert_eq!(Some(&ParamValue::Number(0.5)), map.get("b"));
        assert_eq!(Some(&ParamValue::Text("SSp".into())), map.get("c"));
        Ok(())
    }
}
