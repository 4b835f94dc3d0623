use std::path::Path;

use anyhow::{Context, Result};

use crate::assemble::Recipe;
use crate::params::{ParamMap, ParamValue};
use crate::pathway::{Pathway, PathwayPattern};

pub const ROOT_TAG: &str = "ConnectionRules";
pub const RULE_TAG: &str = "rule";
pub const LEGACY_RULE_TAG: &str = "mTypeRule";
const FROM_ATTR: &str = "fromMType";
const TO_ATTR: &str = "toMType";
const LEGACY_FROM_ATTR: &str = "from";
const LEGACY_TO_ATTR: &str = "to";

const DECLARATION: &str = "<?xml version='1.0' encoding='UTF-8'?>";

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("Malformed document at byte {pos}: {msg}")]
    Syntax { pos: usize, msg: String },
    #[error("Expected root element <ConnectionRules>, found <{0}>")]
    UnexpectedRoot(String),
    #[error("Element <{tag}> has no '{attr}' attribute")]
    MissingAttr { tag: String, attr: &'static str },
    #[error("Document mixes <rule> and <mTypeRule> elements")]
    MixedSchemas,
    #[error("Pathway {0} is defined more than once")]
    DuplicatePathway(Pathway),
}

/// One child element of the root, with attributes in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl Rule {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A recipe document: an optional leading comment and a flat list of rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub comment: Option<String>,
    pub rules: Vec<Rule>,
}

impl Document {
    /// One `rule` element per pathway, in pathway order.
    pub fn from_recipe(recipe: &Recipe, comment: Option<String>) -> Self {
        let rules = recipe
            .iter()
            .map(|(pathway, params)| {
                let mut attrs = Vec::with_capacity(params.len() + 2);
                attrs.push((FROM_ATTR.to_owned(), pathway.from.clone()));
                attrs.push((TO_ATTR.to_owned(), pathway.to.clone()));
                for (name, value) in params {
                    attrs.push((name.clone(), value.to_attr()));
                }
                Rule {
                    tag: RULE_TAG.to_owned(),
                    attrs,
                }
            })
            .collect();
        Self { comment, rules }
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(128 + self.rules.len() * 128);
        out.push_str(DECLARATION);
        out.push('\n');
        if let Some(comment) = &self.comment {
            out.push_str("<!--");
            // "--" is not allowed inside a comment:
            out.push_str(&comment.replace("--", "- -"));
            out.push_str("-->\n");
        }
        if self.rules.is_empty() {
            out.push_str(&format!("<{ROOT_TAG}/>\n"));
            return out;
        }
        out.push_str(&format!("<{ROOT_TAG}>\n"));
        for rule in &self.rules {
            out.push_str("  <");
            out.push_str(&rule.tag);
            for (k, v) in &rule.attrs {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                escape_into(v, &mut out);
                out.push('"');
            }
            out.push_str("/>\n");
        }
        out.push_str(&format!("</{ROOT_TAG}>\n"));
        out
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        use combine::EasyParser;
        let (tree, _remainder) = grammar::document().easy_parse(text).map_err(|e| {
            let pos = e.position.translate_position(text);
            Error::Syntax {
                pos,
                msg: format!("{}", e).replace('\n', " ").trim().to_owned(),
            }
        })?;
        if tree.root != ROOT_TAG {
            return Err(Error::UnexpectedRoot(tree.root));
        }
        Ok(Self {
            comment: tree.comment,
            rules: tree.rules,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("while reading recipe {:?}", path))?;
        Ok(Self::parse(&text).with_context(|| format!("while parsing recipe {:?}", path))?)
    }

    /// Pathway rules of this document, in document order.
    ///
    /// Accepts either `rule` elements with `fromMType`/`toMType`, or legacy
    /// `mTypeRule` elements with `from`/`to`, but not both. Other elements are ignored.
    pub fn pathway_rules(&self) -> Result<Vec<(Pathway, ParamMap)>, Error> {
        let has = |tag: &str| self.rules.iter().any(|r| r.tag == tag);
        let (tag, from_attr, to_attr) = match (has(RULE_TAG), has(LEGACY_RULE_TAG)) {
            (true, true) => return Err(Error::MixedSchemas),
            (false, true) => (LEGACY_RULE_TAG, LEGACY_FROM_ATTR, LEGACY_TO_ATTR),
            _ => (RULE_TAG, FROM_ATTR, TO_ATTR),
        };

        let mut seen = std::collections::BTreeSet::new();
        let mut result = Vec::with_capacity(self.rules.len());
        for rule in self.rules.iter().filter(|r| r.tag == tag) {
            let side = |attr: &'static str| {
                rule.attr(attr).ok_or_else(|| Error::MissingAttr {
                    tag: rule.tag.clone(),
                    attr,
                })
            };
            let pathway = Pathway::new(side(from_attr)?, side(to_attr)?);
            if !seen.insert(pathway.clone()) {
                return Err(Error::DuplicatePathway(pathway));
            }
            let params: ParamMap = rule
                .attrs
                .iter()
                .filter(|(k, _)| k != from_attr && k != to_attr)
                .map(|(k, v)| (k.clone(), ParamValue::from_attr(v)))
                .collect();
            result.push((pathway, params));
        }
        Ok(result)
    }

    /// Same as [`Document::pathway_rules`], as strategy contributions.
    pub fn pattern_rules(&self) -> Result<Vec<(PathwayPattern, ParamMap)>, Error> {
        Ok(self
            .pathway_rules()?
            .into_iter()
            .map(|(pathway, params)| (pathway.into(), params))
            .collect())
    }
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
}

/// Character named by an entity reference, without `&` and `;`.
fn entity_char(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse().ok()
            } else {
                None
            };
            code.and_then(char::from_u32)
        }
    }
}

/// Syntax tree of a document, before its root is checked.
#[derive(Debug)]
pub struct Tree {
    comment: Option<String>,
    root: String,
    rules: Vec<Rule>,
}

mod prelude {
    pub use combine::error::StreamError;
    pub use combine::parser::char::{char, spaces, string};
    pub use combine::parser::range::{recognize, take_until_range, take_while1};
    pub use combine::stream::StreamErrorFor;
    pub use combine::*;
}

/// The subset of XML that recipe documents use: a declaration, comments,
/// and one root holding childless elements.
mod grammar {
    use super::prelude::*;
    use super::{entity_char, Rule, Tree};
    use util::grammar_fn as p;

    p! {
        lex(parser), {
            parser.skip(spaces())
        }
    }

    p! {
        name() -> &'a str, {
            recognize((
                satisfy(|c: char| c.is_alphabetic() || c == '_' || c == ':'),
                skip_many(satisfy(|c: char| {
                    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
                })),
            ))
        }
    }

    p! {
        declaration() -> (), {
            attempt(string("<?"))
                .with(take_until_range("?>"))
                .skip(string("?>"))
                .map(|_| ())
        }
    }

    p! {
        comment() -> &'a str, {
            attempt(string("<!--"))
                .with(take_until_range("-->"))
                .skip(string("-->"))
        }
    }

    // whitespace and comments; yields the first comment:
    p! {
        misc() -> Option<String>, {
            spaces()
                .with(many::<Vec<&'a str>, _, _>(lex(comment())))
                .map(|comments| comments.first().map(|c| (*c).to_owned()))
        }
    }

    p! {
        entity() -> char, {
            char('&')
                .with(take_while1(|c: char| c.is_alphanumeric() || c == '#'))
                .skip(char(';'))
                .and_then(|name: &'a str| {
                    entity_char(name).ok_or_else(|| {
                        StreamErrorFor::<I>::message_static_message("invalid entity reference")
                    })
                })
        }
    }

    p! {
        quoted(quote: char) -> String, {
            between(
                char(*quote),
                char(*quote),
                many::<String, _, _>(choice((
                    entity(),
                    satisfy(move |c: char| c != *quote && c != '&' && c != '<'),
                ))),
            )
        }
    }

    p! {
        attribute() -> (String, String), {
            (
                lex(name()),
                lex(char('=')),
                lex(choice((quoted('"'), quoted('\'')))),
            )
                .map(|(k, _, v): (&'a str, char, String)| (k.to_owned(), v))
        }
    }

    // `<tag` up to its attributes, failing without consuming on `</` and `<!`:
    p! {
        open_tag() -> (&'a str, Vec<(String, String)>), {
            attempt(char('<').with(name()))
                .skip(spaces())
                .and(many::<Vec<_>, _, _>(attribute()))
        }
    }

    p! {
        close_tag() -> &'a str, {
            string("</").with(lex(name())).skip(char('>'))
        }
    }

    p! {
        element() -> Rule, {
            open_tag()
                .and(choice((
                    string("/>").map(|_| None),
                    lex(char('>')).with(close_tag()).map(Some),
                )))
                .and_then(|((tag, attrs), close): ((&'a str, Vec<(String, String)>), Option<&'a str>)| {
                    match close {
                        Some(close) if close != tag => Err(
                            StreamErrorFor::<I>::message_static_message("mismatched closing tag"),
                        ),
                        _ => Ok(Rule {
                            tag: tag.to_owned(),
                            attrs,
                        }),
                    }
                })
        }
    }

    p! {
        children() -> Vec<Rule>, {
            many::<Vec<Option<Rule>>, _, _>(choice((
                lex(comment()).map(|_| None),
                lex(element()).map(Some),
            )))
            .map(|items| items.into_iter().flatten().collect())
        }
    }

    p! {
        document() -> Tree, {
            (
                spaces().with(optional(lex(declaration()))),
                misc(),
                open_tag(),
                choice((
                    string("/>").map(|_| (Vec::new(), None)),
                    (lex(char('>')), children(), close_tag())
                        .map(|(_, rules, close)| (rules, Some(close))),
                )),
                misc(),
                eof(),
            )
                .and_then(|(_, comment, (root, _attrs), (rules, close), _, _)| {
                    match close {
                        Some(close) if close != root => Err(
                            StreamErrorFor::<I>::message_static_message("mismatched closing tag"),
                        ),
                        _ => Ok(Tree {
                            comment,
                            root: root.to_owned(),
                            rules,
                        }),
                    }
                })
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;
        use combine::EasyParser;

        #[test]
        fn test_quoted() {
            assert_eq!("a<b", quoted('"').easy_parse("\"a&lt;b\"").unwrap().0);
            assert_eq!("it's", quoted('"').easy_parse("\"it&apos;s\"").unwrap().0);
            assert_eq!("say \"hi\"", quoted('\'').easy_parse("'say \"hi\"'").unwrap().0);
            assert_eq!("\n", quoted('"').easy_parse("\"&#10;\"").unwrap().0);
            assert_eq!("A", quoted('"').easy_parse("\"&#x41;\"").unwrap().0);
            assert!(quoted('"').easy_parse("\"&bogus;\"").is_err());
            assert!(quoted('"').easy_parse("\"a<b\"").is_err());
        }

        #[test]
        fn test_element() {
            let (rule, rest) = element()
                .easy_parse("<rule a='1'  b=\"x\" /> tail")
                .unwrap();
            assert_eq!("rule", rule.tag);
            assert_eq!(
                vec![("a".to_owned(), "1".to_owned()), ("b".to_owned(), "x".to_owned())],
                rule.attrs
            );
            assert_eq!(" tail", rest);

            let (rule, _) = element().easy_parse("<x k='v'>\n  </x>").unwrap();
            assert_eq!("x", rule.tag);
            assert!(element().easy_parse("<x></y>").is_err());
            assert!(element().easy_parse("<x>text</x>").is_err());
        }

        #[test]
        fn test_children_skip_comments() {
            let (rules, rest) = children()
                .easy_parse("<a/>\n<!-- note -->\n<b/></root>")
                .unwrap();
            assert_eq!(2, rules.len());
            assert_eq!("</root>", rest);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::single;

    fn recipe() -> Recipe {
        let mut recipe = Recipe::new();
        let mut params = single("bouton_reduction_factor", 1.0);
        params.insert("cv_syns_connection".to_owned(), 0.32.into());
        params.insert("fromRegion".to_owned(), "S&P".into());
        recipe.insert(Pathway::new("B", "A"), params.clone());
        recipe.insert(Pathway::new("A", "B"), params);
        recipe
    }

    #[test]
    fn test_render() {
        let doc = Document::from_recipe(&recipe(), Some("\nGenerated by test\n".to_owned()));
        let expected = "<?xml version='1.0' encoding='UTF-8'?>
<!--
Generated by test
-->
<ConnectionRules>
  <rule fromMType=\"A\" toMType=\"B\" bouton_reduction_factor=\"1.000\" cv_syns_connection=\"0.320\" fromRegion=\"S&amp;P\"/>
  <rule fromMType=\"B\" toMType=\"A\" bouton_reduction_factor=\"1.000\" cv_syns_connection=\"0.320\" fromRegion=\"S&amp;P\"/>
</ConnectionRules>
";
        assert_eq!(expected, doc.render());
    }

    #[test]
    fn test_render_empty() {
        let doc = Document::default();
        assert_eq!(
            "<?xml version='1.0' encoding='UTF-8'?>\n<ConnectionRules/>\n",
            doc.render()
        );
    }

    #[test]
    fn test_comment_escaping() -> Result<()> {
        let doc = Document {
            comment: Some("a -- b".to_owned()),
            rules: Vec::new(),
        };
        let text = doc.render();
        assert!(text.contains("<!--a - - b-->"));
        assert_eq!(Some("a - - b".to_owned()), Document::parse(&text)?.comment);
        Ok(())
    }

    #[test]
    fn test_read_back() -> Result<()> {
        let doc = Document::from_recipe(&recipe(), Some("hi".to_owned()));
        let parsed = Document::parse(&doc.render())?;
        assert_eq!(doc, parsed);
        let rules = parsed.pathway_rules()?;
        assert_eq!(Pathway::new("A", "B"), rules[0].0);
        assert_eq!(Some(&ParamValue::Number(0.32)), rules[0].1.get("cv_syns_connection"));
        assert_eq!(Some(&ParamValue::Text("S&P".into())), rules[0].1.get("fromRegion"));
        Ok(())
    }

    #[test]
    fn test_legacy_schema() -> Result<()> {
        let doc = Document::parse(
            "<?xml version=\"1.0\"?>
<!-- legacy -->
<ConnectionRules>
  <mTypeRule from='L5_TPC' to='L4_CHC' bouton_reduction_factor='0.5' />
  <synapsesReposition pathway='x'></synapsesReposition>
  <mTypeRule from=\"L4_CHC\" to=\"L5_TPC\" mean_syns_connection=\"3\"></mTypeRule>
</ConnectionRules>",
        )?;
        assert_eq!(Some(" legacy ".to_owned()), doc.comment);
        let rules = doc.pathway_rules()?;
        assert_eq!(2, rules.len());
        assert_eq!(Pathway::new("L5_TPC", "L4_CHC"), rules[0].0);
        assert_eq!(single("bouton_reduction_factor", 0.5), rules[0].1);
        assert_eq!(single("mean_syns_connection", 3.0), rules[1].1);
        Ok(())
    }

    #[test]
    fn test_fatal_documents() -> Result<()> {
        let mixed = Document::parse(
            "<ConnectionRules><rule fromMType='A' toMType='B'/><mTypeRule from='A' to='C'/></ConnectionRules>",
        )?;
        assert_eq!(Err(Error::MixedSchemas), mixed.pathway_rules());

        let dup = Document::parse(
            "<ConnectionRules><rule fromMType='A' toMType='B' x='1'/><rule fromMType='A' toMType='B' x='2'/></ConnectionRules>",
        )?;
        assert_eq!(
            Err(Error::DuplicatePathway(Pathway::new("A", "B"))),
            dup.pathway_rules()
        );

        let missing = Document::parse("<ConnectionRules><rule fromMType='A'/></ConnectionRules>")?;
        assert!(matches!(
            missing.pathway_rules(),
            Err(Error::MissingAttr { attr: "toMType", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            Document::parse("<Other/>"),
            Err(Error::UnexpectedRoot(_))
        ));
        assert!(Document::parse("<ConnectionRules><rule a='1'/>").is_err());
        assert!(Document::parse("<ConnectionRules><rule a=1/></ConnectionRules>").is_err());
        assert!(Document::parse("<ConnectionRules/><extra/>").is_err());
        assert!(Document::parse("<ConnectionRules><rule a='&bogus;'/></ConnectionRules>").is_err());
    }
}
