//! Text readers backed by the pest grammar: the block language statement tree, variable
//! references and condition tokens.

use super::error::{ErrorKind, LoadResult};

use pest::iterators::Pair;
use {pest::Parser, pest_derive::Parser};

#[derive(Parser)]
#[grammar = "lib/pest/grammar.pest"]
struct SParser;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// One line of the block language along with the block attached to it.
pub struct Statement {
    /// Trimmed line text, without the opening brace.
    pub line: String,
    /// 1-based line number.
    pub line_number: usize,
    /// Statements of the attached `{ ... }` block, if any.
    pub contents: Vec<Statement>,
}

impl Statement {
    /// Create a statement without contents, mostly useful in tests.
    pub fn new(line: &str, line_number: usize) -> Self {
        Self {
            line: line.trim().to_owned(),
            line_number,
            contents: vec![],
        }
    }

    /// First word of the line, split on spaces and braces like the loaders expect.
    pub fn keyword(&self) -> &str {
        self.line
            .split(|c: char| c == ' ' || c == '{')
            .next()
            .unwrap_or_default()
    }
}

/// Read a whole document into its top-level statements.
pub fn read_statements(text: &str) -> LoadResult<Vec<Statement>> {
    let mut pairs = SParser::parse(Rule::document, text)
        .map_err(|err| ErrorKind::Block(err.to_string()))?;

    let Some(document) = pairs.next() else {
        return Ok(vec![]);
    };

    Ok(document
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::statement)
        .map(read_statement)
        .collect())
}

fn read_statement(statement: Pair<Rule>) -> Statement {
    let mut res = Statement::default();

    for pair in statement.into_inner() {
        match pair.as_rule() {
            Rule::line => {
                res.line_number = pair.as_span().start_pos().line_col().0;
                res.line = pair.as_str().trim().to_owned();
            }
            Rule::contents => {
                res.contents = pair
                    .into_inner()
                    .filter(|pair| pair.as_rule() == Rule::statement)
                    .map(read_statement)
                    .collect();
            }
            _ => {}
        }
    }

    res
}

/// Split a `a.b.c` reference into its dot-separated identifiers.
///
/// Returns `None` when the text is not a well-formed reference (empty part, stray characters).
pub fn split_reference(text: &str) -> Option<Vec<&str>> {
    let mut pairs = SParser::parse(Rule::reference, text.trim()).ok()?;

    Some(
        pairs
            .next()?
            .into_inner()
            .filter(|pair| pair.as_rule() == Rule::identifier)
            .map(|pair| pair.as_str())
            .collect(),
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Identifier found in a condition, with its byte range in the tokenized text.
pub struct ConditionToken<'a> {
    /// Identifier text.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset past the last character.
    pub end: usize,
}

/// Find every identifier of a condition expression, in order.
///
/// Operators, parentheses and whitespace are not reported.
pub fn condition_identifiers(text: &str) -> Vec<ConditionToken<'_>> {
    // The grammar accepts any input, the fallback only guards against future grammar edits.
    let Ok(mut pairs) = SParser::parse(Rule::condition, text) else {
        return vec![];
    };

    pairs
        .next()
        .map(|condition| {
            condition
                .into_inner()
                .filter(|pair| pair.as_rule() == Rule::identifier)
                .map(|pair| {
                    let span = pair.as_span();
                    ConditionToken {
                        text: span.as_str(),
                        start: span.start(),
                        end: span.end(),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nested_blocks() {
        let text = r#"
            Technique {
                VertexShaderNodes {
                    ShaderNode CommonVert {
                        Definition : CommonVert : Common/MatDefs/ShaderNodes/Common/CommonVert.j3sn
                    }
                }
            }
        "#;

        let statements = read_statements(text).unwrap();

        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].line, "Technique");
        assert_eq!(statements[0].line_number, 2);

        let node = &statements[0].contents[0].contents[0];
        assert_eq!(node.line, "ShaderNode CommonVert");
        assert_eq!(node.line_number, 4);
        assert_eq!(
            node.contents[0].line,
            "Definition : CommonVert : Common/MatDefs/ShaderNodes/Common/CommonVert.j3sn"
        );
        assert_eq!(node.contents[0].line_number, 5);
    }

    #[test]
    fn separators_and_comments() {
        let text = "Input { vec4 a; float b // trailing\n /* block\n comment */ vec2 c }";

        let statements = read_statements(text).unwrap();
        let lines = statements[0]
            .contents
            .iter()
            .map(|s| s.line.as_str())
            .collect::<Vec<_>>();

        assert_eq!(lines, ["vec4 a", "float b", "vec2 c"]);
    }

    #[test]
    fn brace_on_next_line() {
        let statements = read_statements("ShaderNode A\n{\n Definition: A\n}\nShaderNode B {}").unwrap();

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].contents.len(), 1);
        assert!(statements[1].contents.is_empty());
    }

    #[test]
    fn unbalanced_braces() {
        let err = read_statements("Technique {\n ShaderNode A {\n}").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Block(_)));
    }

    #[test]
    fn keyword() {
        assert_eq!(Statement::new("ShaderNode Foo", 1).keyword(), "ShaderNode");
        assert_eq!(Statement::new("Input{", 1).keyword(), "Input");
    }

    #[test]
    fn references() {
        assert_eq!(split_reference("MatParam.Color.xyz"), Some(vec!["MatParam", "Color", "xyz"]));
        assert_eq!(split_reference(" texCoord "), Some(vec!["texCoord"]));
        assert_eq!(split_reference("a..b"), None);
        assert_eq!(split_reference(""), None);
    }

    #[test]
    fn condition_tokens() {
        let tokens = condition_identifiers("(A && B_2) || !c");
        let texts = tokens.iter().map(|t| t.text).collect::<Vec<_>>();

        assert_eq!(texts, ["A", "B_2", "c"]);
        assert_eq!((tokens[1].start, tokens[1].end), (6, 9));
    }
}
