use crate::ast::Expr;
use crate::Error;

/// Parse a formula into an expression tree.
pub fn parse(text: &str) -> Result<Expr, Error> {
    use combine::EasyParser;
    grammar::formula()
        .easy_parse(text)
        .map(|(expr, _remainder)| expr)
        .map_err(|e| {
            let pos = e.position.translate_position(text);
            // combine's errors borrow the input, so stringify here.
            Error::Parse {
                text: text.to_owned(),
                pos,
                msg: format!("{}", e).replace('\n', " ").trim().to_owned(),
            }
        })
}

mod prelude {
    pub use combine::parser::char::{alpha_num, char, digit, letter, spaces, string};
    pub use combine::parser::range::recognize;
    pub use combine::*;
}

mod grammar {
    use super::prelude::*;
    use util::grammar_fn as p;
    use crate::ast::{BinOp, Expr};

    type BinFn = fn(Expr, Expr) -> Expr;

    fn op_fn(op: BinOp) -> BinFn {
        match op {
            BinOp::Add => |l, r| Expr::binary(BinOp::Add, l, r),
            BinOp::Sub => |l, r| Expr::binary(BinOp::Sub, l, r),
            BinOp::Mul => |l, r| Expr::binary(BinOp::Mul, l, r),
            BinOp::Div => |l, r| Expr::binary(BinOp::Div, l, r),
            BinOp::Mod => |l, r| Expr::binary(BinOp::Mod, l, r),
            BinOp::Pow => |l, r| Expr::binary(BinOp::Pow, l, r),
        }
    }

    p! {
        lex(parser), {
            parser.skip(spaces())
        }
    }

    p! {
        parens(parser), {
            lex(char('(')).with(parser).skip(lex(char(')')))
        }
    }

    p! {
        number() -> f64, {
            recognize((
                choice((
                    (skip_many1(digit()), optional((char('.'), skip_many(digit())))).map(|_| ()),
                    (char('.'), skip_many1(digit())).map(|_| ()),
                )),
                optional(attempt((
                    one_of("eE".chars()),
                    optional(one_of("+-".chars())),
                    skip_many1(digit()),
                ))),
            ))
            .and_then(|s: &'a str| s.parse::<f64>())
        }
    }

    p! {
        ident() -> &'a str, {
            recognize((
                char('_').or(letter()),
                skip_many(char('_').or(alpha_num())),
            ))
        }
    }

    p! {
        call_or_var() -> Expr, {
            lex(ident())
                .and(optional(parens(sep_by::<Vec<Expr>, _, _, _>(expr(), lex(char(','))))))
                .map(|(name, args)| match args {
                    Some(args) => Expr::Call(name.to_owned(), args),
                    None => Expr::Var(name.to_owned()),
                })
        }
    }

    p! {
        atom() -> Expr, {
            choice((
                lex(number()).map(Expr::Number),
                call_or_var(),
                parens(expr()),
            ))
        }
    }

    // right-associative, binds tighter than unary minus on its left:
    p! {
        power() -> Expr, {
            atom()
                .and(optional(lex(attempt(string("**"))).with(unary())))
                .map(|(base, exp)| match exp {
                    Some(exp) => Expr::binary(BinOp::Pow, base, exp),
                    None => base,
                })
        }
    }

    p! {
        unary() -> Expr, {
            choice((
                lex(char('-')).with(unary()).map(|e| Expr::Neg(Box::new(e))),
                lex(char('+')).with(unary()),
                power(),
            ))
        }
    }

    p! {
        mul_op() -> BinFn, {
            lex(one_of("*/%".chars())).map(|c| match c {
                '*' => op_fn(BinOp::Mul),
                '/' => op_fn(BinOp::Div),
                _ => op_fn(BinOp::Mod),
            })
        }
    }

    p! {
        add_op() -> BinFn, {
            lex(one_of("+-".chars())).map(|c| match c {
                '+' => op_fn(BinOp::Add),
                _ => op_fn(BinOp::Sub),
            })
        }
    }

    p! {
        term() -> Expr, {
            chainl1(unary(), mul_op())
        }
    }

    p! {
        expr() -> Expr, {
            chainl1(term(), add_op())
        }
    }

    p! {
        formula() -> Expr, {
            spaces().with(expr()).skip(eof())
        }
    }

}
