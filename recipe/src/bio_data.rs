use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Table is empty")]
    Empty,
    #[error("Table header has no '{0}' column")]
    MissingColumn(&'static str),
    #[error("Line {line}: expected {expected} fields, found {found}")]
    RowLength {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Line {line}: invalid number '{text}'")]
    InvalidNumber { line: usize, text: String },
}

/// Whitespace separated text table with a header row.
struct Table {
    header: Vec<String>,
    rows: Vec<(usize, Vec<String>)>,
}

impl Table {
    fn parse(text: &str) -> Result<Self, Error> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());
        let (_, header) = lines.next().ok_or(Error::Empty)?;
        let header: Vec<String> = header.split_whitespace().map(str::to_owned).collect();
        let mut rows = Vec::with_capacity(32);
        for (line, text) in lines {
            let fields: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
            if fields.len() != header.len() {
                return Err(Error::RowLength {
                    line,
                    expected: header.len(),
                    found: fields.len(),
                });
            }
            rows.push((line, fields));
        }
        Ok(Self { header, rows })
    }

    fn column(&self, name: &'static str) -> Result<usize, Error> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or(Error::MissingColumn(name))
    }
}

fn number(line: usize, text: &str) -> Result<f64, Error> {
    text.parse().map_err(|_| Error::InvalidNumber {
        line,
        text: text.to_owned(),
    })
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("while reading table {:?}", path))
}

/// Mean bouton density per mtype (`mtype mean`); the `*` row is the global value.
#[derive(Debug, Clone, PartialEq)]
pub struct BoutonDensityTable {
    pub rows: Vec<(String, f64)>,
}

impl BoutonDensityTable {
    pub fn parse(text: &str) -> Result<Self, Error> {
        let table = Table::parse(text)?;
        let (mtype, mean) = (table.column("mtype")?, table.column("mean")?);
        let mut rows = Vec::with_capacity(table.rows.len());
        for (line, fields) in &table.rows {
            rows.push((fields[mtype].clone(), number(*line, &fields[mean])?));
        }
        Ok(Self { rows })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&read(path)?).with_context(|| format!("while parsing table {:?}", path))
    }

    pub fn get(&self, mtype: &str) -> Option<f64> {
        self.rows.iter().find(|(m, _)| m == mtype).map(|(_, v)| *v)
    }

    /// Value of the `*` row.
    pub fn global(&self) -> Option<f64> {
        self.get(crate::pathway::WILDCARD)
    }

    /// Keep only rows for known mtypes, warning about the others.
    pub fn retain_known(&mut self, mtypes: &[String]) {
        let (known, unknown): (Vec<_>, Vec<_>) = self
            .rows
            .drain(..)
            .partition(|(m, _)| mtypes.contains(m));
        if !unknown.is_empty() {
            let names: Vec<&str> = unknown.iter().map(|(m, _)| m.as_str()).collect();
            log::warn!("Unused mtypes: {}", names.join(","));
        }
        self.rows = known;
    }
}

/// Mean number of synapses per connection per pathway (`from to mean`).
#[derive(Debug, Clone, PartialEq)]
pub struct SynapseCountTable {
    pub rows: Vec<(String, String, f64)>,
}

impl SynapseCountTable {
    pub fn parse(text: &str) -> Result<Self, Error> {
        let table = Table::parse(text)?;
        let (from, to, mean) = (
            table.column("from")?,
            table.column("to")?,
            table.column("mean")?,
        );
        let mut rows = Vec::with_capacity(table.rows.len());
        for (line, fields) in &table.rows {
            rows.push((
                fields[from].clone(),
                fields[to].clone(),
                number(*line, &fields[mean])?,
            ));
        }
        Ok(Self { rows })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&read(path)?).with_context(|| format!("while parsing table {:?}", path))
    }

    pub fn get(&self, from: &str, to: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|(f, t, _)| f == from && t == to)
            .map(|(_, _, v)| *v)
    }

    /// Keep only rows whose both sides are known mtypes, warning about the others.
    pub fn retain_known(&mut self, mtypes: &[String]) {
        let mut unused = Vec::new();
        self.rows.retain(|(from, to, _)| {
            let mut keep = true;
            if !mtypes.contains(from) {
                unused.push(from.clone());
                keep = false;
            }
            if !mtypes.contains(to) {
                unused.push(to.clone());
                keep = false;
            }
            keep
        });
        if !unused.is_empty() {
            log::warn!("Unused mtypes: {}", unused.join(","));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mtypes() -> Vec<String> {
        vec!["L4_CHC".to_owned(), "L5_TPC".to_owned()]
    }

    #[test]
    fn test_bouton_density() -> Result<()> {
        let mut table = BoutonDensityTable::parse(
            "mtype   mean  std\n\
             *       0.2   0.01\n\
             L5_TPC  0.25  0.02\n\
             \n\
             L6_XYZ  0.3   0.03\n",
        )?;
        assert_eq!(Some(0.2), table.global());
        assert_eq!(Some(0.25), table.get("L5_TPC"));
        table.retain_known(&mtypes());
        assert_eq!(vec![("L5_TPC".to_owned(), 0.25)], table.rows);
        Ok(())
    }

    #[test]
    fn test_synapse_count() -> Result<()> {
        let mut table = SynapseCountTable::parse(
            "from to mean\n\
             L5_TPC L4_CHC 4.5\n\
             L5_TPC L6_XYZ 2.0\n",
        )?;
        assert_eq!(Some(4.5), table.get("L5_TPC", "L4_CHC"));
        assert_eq!(None, table.get("L4_CHC", "L5_TPC"));
        table.retain_known(&mtypes());
        assert_eq!(1, table.rows.len());
        Ok(())
    }

    #[test]
    fn test_errors() {
        assert!(matches!(BoutonDensityTable::parse(""), Err(Error::Empty)));
        assert!(matches!(
            BoutonDensityTable::parse("mtype value\nA 1.0\n"),
            Err(Error::MissingColumn("mean"))
        ));
        assert!(matches!(
            SynapseCountTable::parse("from to mean\nA B\n"),
            Err(Error::RowLength { line: 2, .. })
        ));
        assert!(matches!(
            SynapseCountTable::parse("from to mean\nA B x\n"),
            Err(Error::InvalidNumber { line: 2, .. })
        ));
    }
}
