use crate::builtins;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Call(String, Vec<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    /// Append every variable and function name used in this expression to `names`.
    pub fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Number(_) => (),
            Self::Var(name) => names.push(name),
            Self::Call(name, args) => {
                names.push(name);
                for arg in args {
                    arg.collect_names(names);
                }
            }
            Self::Neg(inner) => inner.collect_names(names),
            Self::Binary(_, lhs, rhs) => {
                lhs.collect_names(names);
                rhs.collect_names(names);
            }
        }
    }

    pub fn eval(&self, vars: &[(&str, f64)]) -> Result<f64, Error> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Var(name) => lookup(name, vars),
            Self::Call(name, args) => {
                if vars.iter().any(|(k, _)| k == name) {
                    return Err(Error::NotAFunction(name.clone()));
                }
                let args = args
                    .iter()
                    .map(|arg| arg.eval(vars))
                    .collect::<Result<Vec<_>, _>>()?;
                builtins::call(name, &args)
            }
            Self::Neg(inner) => Ok(-inner.eval(vars)?),
            Self::Binary(op, lhs, rhs) => apply(*op, lhs.eval(vars)?, rhs.eval(vars)?),
        }
    }
}

fn lookup(name: &str, vars: &[(&str, f64)]) -> Result<f64, Error> {
    if let Some((_, val)) = vars.iter().find(|(k, _)| *k == name) {
        return Ok(*val);
    }
    if let Some(val) = builtins::constant(name) {
        return Ok(val);
    }
    if builtins::FUNCTIONS.contains(&name) {
        return Err(Error::NotAValue(name.to_owned()));
    }
    Err(Error::NameNotAllowed(name.to_owned()))
}

fn apply(op: BinOp, lhs: f64, rhs: f64) -> Result<f64, Error> {
    use BinOp::*;
    match op {
        Add => Ok(lhs + rhs),
        Sub => Ok(lhs - rhs),
        Mul => Ok(lhs * rhs),
        Div => {
            if rhs == 0.0 {
                return Err(Error::DivisionByZero);
            }
            Ok(lhs / rhs)
        }
        Mod => {
            if rhs == 0.0 {
                return Err(Error::DivisionByZero);
            }
            // result takes the sign of the divisor:
            let m = lhs % rhs;
            if m != 0.0 && (m < 0.0) != (rhs < 0.0) {
                Ok(m + rhs)
            } else {
                Ok(m)
            }
        }
        Pow => {
            if lhs == 0.0 && rhs < 0.0 {
                return Err(Error::DivisionByZero);
            }
            // negative base with a fractional exponent yields NaN.
            Ok(lhs.powf(rhs))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn test_apply() {
        assert_eq!(Ok(2.0), apply(BinOp::Mod, -7.0, 3.0));
        assert_eq!(Ok(-2.0), apply(BinOp::Mod, 7.0, -3.0));
        assert_eq!(Ok(1.0), apply(BinOp::Mod, 7.0, 3.0));
        assert_eq!(Err(Error::DivisionByZero), apply(BinOp::Mod, 1.0, 0.0));
        assert_eq!(Err(Error::DivisionByZero), apply(BinOp::Pow, 0.0, -1.0));
        assert_eq!(Ok(8.0), apply(BinOp::Pow, 2.0, 3.0));
        assert!(apply(BinOp::Pow, -0.5, 0.5).unwrap().is_nan());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Ok(3.0), lookup("n", &[("n", 3.0)]));
        assert_eq!(Ok(std::f64::consts::PI), lookup("pi", &[]));
        assert_eq!(Err(Error::NotAValue("sqrt".to_owned())), lookup("sqrt", &[]));
        assert_eq!(
            Err(Error::NameNotAllowed("x".to_owned())),
            lookup("x", &[("n", 3.0)])
        );
    }
}
