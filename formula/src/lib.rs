//! Small arithmetic formula language used by recipe strategies,
//! e.g. `"6 * ((n - 1) ** 0.5) - 1"`.
//!
//! Formulas may only reference the variables they are evaluated with,
//! plus a fixed set of math functions and constants ([`FUNCTIONS`], [`CONSTANTS`]).
//! Any other name is rejected before evaluation.

mod ast;
pub use ast::{BinOp, Expr};
mod builtins;
pub use builtins::{CONSTANTS, FUNCTIONS};
mod parse;
pub use parse::parse;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("ParseError in formula '{text}' at position {pos}: {msg}")]
    Parse {
        text: String,
        pos: usize,
        msg: String,
    },
    #[error("The use of '{0}' is not allowed")]
    NameNotAllowed(String),
    #[error("'{0}' is a function and can't be used as a value")]
    NotAValue(String),
    #[error("'{0}' is not a function")]
    NotAFunction(String),
    #[error("Function '{name}' takes {expected} arguments ({got} given)")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },
    #[error("math domain error in '{0}'")]
    Domain(&'static str),
    #[error("division by zero")]
    DivisionByZero,
}

/// A parsed formula, ready to be evaluated any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    root: Expr,
}

impl Expression {
    /// Parse `text` into an `Expression`.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let root = parse(text)?;
        Ok(Self {
            text: text.to_owned(),
            root,
        })
    }

    /// The source text of this formula.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Fail if the formula references any name other than `vars`
    /// and the builtin functions and constants.
    pub fn check_names(&self, vars: &[&str]) -> Result<(), Error> {
        let mut names = Vec::with_capacity(4);
        self.root.collect_names(&mut names);
        for name in names {
            if !vars.contains(&name) && !builtins::is_builtin(name) {
                return Err(Error::NameNotAllowed(name.to_owned()));
            }
        }
        Ok(())
    }

    /// Evaluate with the given variable bindings.
    pub fn eval(&self, vars: &[(&str, f64)]) -> Result<f64, Error> {
        let names: Vec<&str> = vars.iter().map(|(k, _)| *k).collect();
        self.check_names(&names)?;
        self.root.eval(vars)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parse and evaluate `text` in one go.
pub fn evaluate(text: &str, vars: &[(&str, f64)]) -> Result<f64, Error> {
    Expression::parse(text)?.eval(vars)
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_evaluate() -> Result<()> {
        assert_close(evaluate("1 + 2 * 3", &[])?, 7.0);
        assert_close(evaluate("1 + 2 * n", &[("n", 3.0)])?, 7.0);
        assert_close(evaluate("sin(n * pi)", &[("n", 0.5)])?, 1.0);
        assert_close(evaluate("6 * ((n - 1) ** 0.5) - 1", &[("n", 5.0)])?, 11.0);
        assert_close(evaluate("1.5 * n", &[("n", 4.0)])?, 6.0);
        Ok(())
    }

    #[test]
    fn test_nan_propagates() -> Result<()> {
        assert!(evaluate("n * 3", &[("n", f64::NAN)])?.is_nan());
        assert!(evaluate("1 / n", &[("n", f64::NAN)])?.is_nan());
        // negative base with fractional exponent has no real result:
        assert!(evaluate("6 * ((n - 2) ** 0.5) - 1", &[("n", 1.5)])?.is_nan());
        Ok(())
    }

    #[test]
    fn test_evaluate_errors() {
        assert!(matches!(evaluate("1 + 2 *", &[]), Err(Error::Parse { .. })));
        assert_eq!(evaluate("sqrt(-1)", &[]), Err(Error::Domain("sqrt")));
        assert_eq!(evaluate("1 / 0", &[]), Err(Error::DivisionByZero));
        assert_eq!(
            evaluate("sum(1, 2)", &[]),
            Err(Error::NameNotAllowed("sum".to_owned()))
        );
        assert_eq!(
            evaluate("open(n)", &[("n", 1.0)]),
            Err(Error::NameNotAllowed("open".to_owned()))
        );
        assert!(matches!(
            evaluate("__import__('os')", &[]),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_names_checked_before_evaluation() -> Result<()> {
        let expr = Expression::parse("n + m")?;
        assert!(expr.check_names(&["n", "m"]).is_ok());
        assert_eq!(
            expr.check_names(&["n"]),
            Err(Error::NameNotAllowed("m".to_owned()))
        );
        Ok(())
    }
}
