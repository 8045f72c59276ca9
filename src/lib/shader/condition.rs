//! Boolean activation conditions over material parameter names.
//!
//! Authors write conditions with plain parameter names (`LightMap && !ColorMap`). The generator
//! needs preprocessor guards, so every identifier is rewritten to `defined(UPPERCASE)`.

use super::parsing::condition_identifiers;

/// Decorations authors may leave around a condition. They carry no meaning.
const DECORATIONS: [&str; 3] = ["#ifdef", "#if", "defined"];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Result of [extract_defines].
pub struct ConditionExpression {
    /// Every identifier in order of appearance, duplicates included.
    pub defines: Vec<String>,
    /// Expression with each identifier replaced by `defined(IDENTIFIER)`.
    pub normalized: String,
}

/// Tokenize a condition, collecting the define names it requires and building its normalized
/// preprocessor form.
///
/// # Example
/// ```
/// use shnode::shader::condition::extract_defines;
///
/// let expr = extract_defines("(LightMap && SeparateTexCoord) || !ColorMap");
/// assert_eq!(expr.defines, ["LightMap", "SeparateTexCoord", "ColorMap"]);
/// assert_eq!(
///     expr.normalized,
///     "(defined(LIGHTMAP) && defined(SEPARATETEXCOORD)) || !defined(COLORMAP)"
/// );
/// ```
pub fn extract_defines(expression: &str) -> ConditionExpression {
    let stripped = DECORATIONS
        .iter()
        .fold(expression.to_owned(), |expr, decoration| expr.replace(decoration, ""));
    let stripped = stripped.trim();

    let tokens = condition_identifiers(stripped);

    let mut normalized = String::with_capacity(stripped.len() + tokens.len() * 10);
    let mut last = 0;
    for token in tokens.iter() {
        normalized.push_str(&stripped[last..token.start]);
        normalized.push_str("defined(");
        normalized.push_str(&token.text.to_uppercase());
        normalized.push(')');
        last = token.end;
    }
    normalized.push_str(&stripped[last..]);

    ConditionExpression {
        defines: tokens.iter().map(|token| token.text.to_owned()).collect(),
        normalized,
    }
}

/// Combine two optional conditions with a boolean operator.
///
/// A missing side yields the other one, equal sides are not repeated.
///
/// # Example
/// ```
/// use shnode::shader::condition::merge;
///
/// assert_eq!(merge(None, Some("defined(A)"), "||").as_deref(), Some("defined(A)"));
/// assert_eq!(
///     merge(Some("defined(A)"), Some("defined(B)"), "||").as_deref(),
///     Some("(defined(A)) || (defined(B))")
/// );
/// ```
pub fn merge(c1: Option<&str>, c2: Option<&str>, operator: &str) -> Option<String> {
    match (c1, c2) {
        (None, c2) => c2.map(str::to_owned),
        (Some(c1), None) => Some(c1.to_owned()),
        (Some(c1), Some(c2)) if c1 == c2 => Some(c1.to_owned()),
        (Some(c1), Some(c2)) => Some(format!("({c1}) {operator} ({c2})")),
    }
}
