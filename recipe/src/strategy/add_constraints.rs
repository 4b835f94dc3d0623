//! Add the same parameters to every pathway, usually selection
//! attributes such as `fromRegion`.

use crate::assemble::Rules;
use crate::params::ParamMap;
use crate::pathway::PathwayPattern;
use crate::task::Task;

pub fn prepare(constraints: &ParamMap) -> Vec<Task<Rules>> {
    let constraints = constraints.clone();
    vec![Task::new(move |_| Ok(vec![(PathwayPattern::any(), constraints)]))]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn test_add_constraints() -> anyhow::Result<()> {
        let mut constraints = ParamMap::new();
        constraints.insert("fromRegion".to_owned(), ParamValue::from("SSp"));
        constraints.insert("toRegion".to_owned(), ParamValue::from("SSp"));
        let mut tasks = prepare(&constraints);
        assert_eq!(1, tasks.len());
        let rules = tasks.remove(0).run(0, None, None)?.value;
        assert_eq!(vec![(PathwayPattern::any(), constraints)], rules);
        Ok(())
    }
}
