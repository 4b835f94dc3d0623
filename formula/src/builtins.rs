use std::f64::consts;

use crate::Error;

/// Math functions available to formulas.
pub const FUNCTIONS: &[&str] = &[
    "sqrt", "log", "log10", "log2", "exp", "sin", "cos", "tan", "asin", "acos", "atan", "atan2",
    "sinh", "cosh", "tanh", "floor", "ceil", "fabs", "trunc", "pow", "hypot", "degrees", "radians",
];

/// Named constants available to formulas.
pub const CONSTANTS: &[(&str, f64)] = &[
    ("pi", consts::PI),
    ("e", consts::E),
    ("tau", consts::TAU),
    ("inf", f64::INFINITY),
    ("nan", f64::NAN),
];

pub fn is_builtin(name: &str) -> bool {
    FUNCTIONS.contains(&name) || constant(name).is_some()
}

pub fn constant(name: &str) -> Option<f64> {
    CONSTANTS.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
}

fn arity(name: &str, expected: &'static str, got: usize) -> Error {
    Error::Arity {
        name: name.to_owned(),
        expected,
        got,
    }
}

fn unary(name: &str, args: &[f64]) -> Result<f64, Error> {
    match args {
        [x] => Ok(*x),
        _ => Err(arity(name, "exactly one", args.len())),
    }
}

fn binary(name: &str, args: &[f64]) -> Result<(f64, f64), Error> {
    match args {
        [x, y] => Ok((*x, *y)),
        _ => Err(arity(name, "exactly two", args.len())),
    }
}

fn domain(ok: bool, name: &'static str, val: f64) -> Result<f64, Error> {
    if ok {
        Ok(val)
    } else {
        Err(Error::Domain(name))
    }
}

/// Call the builtin function `name`.
pub fn call(name: &str, args: &[f64]) -> Result<f64, Error> {
    match name {
        "sqrt" => {
            let x = unary(name, args)?;
            domain(!(x < 0.0), "sqrt", x.sqrt())
        }
        "log" => match args {
            [x] => domain(!(*x <= 0.0), "log", x.ln()),
            [x, base] => {
                if *x <= 0.0 || *base <= 0.0 {
                    return Err(Error::Domain("log"));
                }
                if *base == 1.0 {
                    return Err(Error::DivisionByZero);
                }
                Ok(x.ln() / base.ln())
            }
            _ => Err(arity(name, "one or two", args.len())),
        },
        "log10" => {
            let x = unary(name, args)?;
            domain(!(x <= 0.0), "log10", x.log10())
        }
        "log2" => {
            let x = unary(name, args)?;
            domain(!(x <= 0.0), "log2", x.log2())
        }
        "exp" => Ok(unary(name, args)?.exp()),
        "sin" => Ok(unary(name, args)?.sin()),
        "cos" => Ok(unary(name, args)?.cos()),
        "tan" => Ok(unary(name, args)?.tan()),
        "asin" => {
            let x = unary(name, args)?;
            domain(!(x.abs() > 1.0), "asin", x.asin())
        }
        "acos" => {
            let x = unary(name, args)?;
            domain(!(x.abs() > 1.0), "acos", x.acos())
        }
        "atan" => Ok(unary(name, args)?.atan()),
        "atan2" => {
            let (y, x) = binary(name, args)?;
            Ok(y.atan2(x))
        }
        "sinh" => Ok(unary(name, args)?.sinh()),
        "cosh" => Ok(unary(name, args)?.cosh()),
        "tanh" => Ok(unary(name, args)?.tanh()),
        "floor" => Ok(unary(name, args)?.floor()),
        "ceil" => Ok(unary(name, args)?.ceil()),
        "fabs" => Ok(unary(name, args)?.abs()),
        "trunc" => Ok(unary(name, args)?.trunc()),
        "pow" => {
            let (x, y) = binary(name, args)?;
            let ok = !(x == 0.0 && y < 0.0) && !(x < 0.0 && y.is_finite() && y.fract() != 0.0);
            domain(ok, "pow", x.powf(y))
        }
        "hypot" => {
            let (x, y) = binary(name, args)?;
            Ok(x.hypot(y))
        }
        "degrees" => Ok(unary(name, args)?.to_degrees()),
        "radians" => Ok(unary(name, args)?.to_radians()),
        _ => Err(Error::NameNotAllowed(name.to_owned())),
    }
}
