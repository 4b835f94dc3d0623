/// Declares a `combine` parser over `&str` input, without spelling out
/// the stream bounds each time.
///
/// `name(args) -> Output, { body }` declares a parser;
/// `name(inner), { body }` declares one that wraps another parser and
/// yields its output. Number conversions may be used with `and_then`.
///
/// The calling crate must depend on `combine`.
#[macro_export]
macro_rules! grammar_fn {
    ($name:ident($delegate:ident), $code:expr) => {
        combine::parser! {
            pub fn $name['a, I, P]($delegate: P)(I) -> P::Output
                where
                [I: combine::stream::RangeStream<Range = &'a str, Token = char>,
                 I::Error: combine::ParseError<char, &'a str, <I as combine::stream::StreamOnce>::Position>,
                 <I::Error as combine::ParseError<char, &'a str, <I as combine::stream::StreamOnce>::Position>>::StreamError:
                 From<std::num::ParseFloatError>,
                 P: combine::Parser<I>,
            ]            {
                $code
            }
        }
    };
    ($name:ident( $($arg:ident : $arg_type:ty),* ) -> $ret:ty, $code:expr) => {
        combine::parser! {
            pub fn $name['a, I]($($arg : $arg_type),*)(I) -> $ret
                where
                [I: combine::stream::RangeStream<Range = &'a str, Token = char>,
                 I::Error: combine::ParseError<char, &'a str, <I as combine::stream::StreamOnce>::Position>,
                 <I::Error as combine::ParseError<char, &'a str, <I as combine::stream::StreamOnce>::Position>>::StreamError:
                 From<std::num::ParseFloatError>
            ]            {
                $code
            }
        }
    };
}
