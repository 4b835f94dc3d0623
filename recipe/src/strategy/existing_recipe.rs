//! Take parameters from an already existing recipe.

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::assemble::Rules;
use crate::task::Task;
use crate::xml::Document;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingRecipe {
    pub recipe_path: PathBuf,
}

impl ExistingRecipe {
    pub fn prepare(&self) -> Vec<Task<Rules>> {
        let path = self.recipe_path.clone();
        vec![Task::new(move |_| {
            let doc = Document::load(&path)?;
            let rules = doc
                .pattern_rules()
                .with_context(|| format!("while reading rules from {:?}", path))?;
            Ok(rules)
        })]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{single, ParamValue};
    use crate::pathway::PathwayPattern;
    use anyhow::Result;

    fn run(text: &str) -> Result<Rules> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("recipe.xml");
        std::fs::write(&path, text)?;
        let strategy = ExistingRecipe { recipe_path: path };
        Ok(strategy.prepare().remove(0).run(0, None, None)?.value)
    }

    #[test]
    fn test_existing_recipe() -> Result<()> {
        let rules = run("<?xml version='1.0' encoding='UTF-8'?>
<ConnectionRules>
  <rule fromMType=\"A\" toMType=\"B\" bouton_reduction_factor=\"0.500\" fromRegion=\"SSp\"/>
  <rule fromMType=\"B\" toMType=\"A\" mean_syns_connection=\"3.000\"/>
</ConnectionRules>
")?;
        let mut first = single("bouton_reduction_factor", 0.5);
        first.insert("fromRegion".to_owned(), ParamValue::from("SSp"));
        assert_eq!(
            vec![
                (PathwayPattern::new("A", "B"), first),
                (PathwayPattern::new("B", "A"), single("mean_syns_connection", 3.0)),
            ],
            rules
        );
        Ok(())
    }

    #[test]
    fn test_legacy_recipe() -> Result<()> {
        let rules = run("<ConnectionRules><mTypeRule from='A' to='B' p_A='1.5'/></ConnectionRules>")?;
        assert_eq!(vec![(PathwayPattern::new("A", "B"), single("p_A", 1.5))], rules);
        Ok(())
    }

    #[test]
    fn test_duplicates_are_fatal() {
        let res = run("<ConnectionRules><rule fromMType='A' toMType='B'/><rule fromMType='A' toMType='B'/></ConnectionRules>");
        assert!(res.is_err());
        let res = run("<ConnectionRules><rule fromMType='A' toMType='B'/><mTypeRule from='B' to='A'/></ConnectionRules>");
        assert!(res.is_err());
    }
}
