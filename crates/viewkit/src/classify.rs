//! Structured classification of template engine errors.
//!
//! The engine reports failures as text. This module turns that text into a
//! [`ClassifiedError`]: which view failed, where, what kind of failure it was
//! and, most importantly for lazy resolution, which missing view it names.
//!
//! # Message Grammar
//!
//! ```text
//! message   := part (": " part)*
//! location  := basename (":" line (":" column)?)?
//! ```
//!
//! With three or more parts the first is a tag, the second a location and
//! the rest the message. The first `:` token of the location is the
//! basename; line and column are each kept only when they parse as
//! integers. A second part containing whitespace is not a location (no
//! basename does), so it stays in the message. Engine errors are first
//! written into this grammar by [`ErrorClassifier::describe`]:
//!
//! ```text
//! minijinja: app/index.html:3:7: unknown function: callfunc is unknown
//! ```
//!
//! # Missing References
//!
//! | Pattern | Raised by |
//! |---------|-----------|
//! | `template "X" not defined` | lookups outside the namespace |
//! | `error calling <fn>: no template "X"` | the `import` control helper |
//! | `non-existing template "X"` | `{% include %}` |
//!
//! Depth-limit failures are classified as [`ErrorKind::Recursion`] and never
//! carry a target.
//!
//! A failure inside an included view reaches the caller wrapped in an
//! include error; classification reads the innermost engine error of the
//! `source()` chain, so the target and position are those of the view that
//! actually failed.

use std::fmt::Write;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::Namespace;
use crate::error::{ClassifiedError, ErrorKind};

/// Prefix the engine's messages carry once described.
pub const ENGINE_TAG: &str = "minijinja";

/// Prefix this crate reports instead of [`ENGINE_TAG`].
pub const SYSTEM_TAG: &str = "render";

static NOT_DEFINED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"template "([^"]*)" not defined"#).expect("pattern is valid"));

static CALL_MISSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"error calling [^:]+: no template "([^"]*)""#).expect("pattern is valid")
});

static INCLUDE_MISSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"non-existing template "([^"]*)""#).expect("pattern is valid"));

static RECURSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)recursion limit|maximum template depth").expect("pattern is valid")
});

/// When the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Execute,
}

/// A message split along the grammar, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    pub tag: Option<String>,
    pub basename: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

/// Splits `input` into tag, location and message.
pub fn parse_message(input: &str) -> ParsedMessage {
    let parts: Vec<&str> = input.split(": ").collect();
    match parts.as_slice() {
        [] | [_] => ParsedMessage {
            message: input.to_string(),
            ..ParsedMessage::default()
        },
        [tag, message] => ParsedMessage {
            tag: Some(normalize_tag(tag)),
            message: (*message).to_string(),
            ..ParsedMessage::default()
        },
        [tag, location, rest @ ..] => match parse_location(location) {
            Some(Location {
                basename,
                line,
                column,
            }) => ParsedMessage {
                tag: Some(normalize_tag(tag)),
                basename: Some(basename.to_string()),
                line,
                column,
                message: rest.join(": "),
            },
            None => ParsedMessage {
                tag: Some(normalize_tag(tag)),
                message: parts[1..].join(": "),
                ..ParsedMessage::default()
            },
        },
    }
}

fn normalize_tag(tag: &str) -> String {
    if tag == ENGINE_TAG {
        SYSTEM_TAG.to_string()
    } else {
        tag.to_string()
    }
}

struct Location<'a> {
    basename: &'a str,
    line: Option<usize>,
    column: Option<usize>,
}

fn parse_location(part: &str) -> Option<Location<'_>> {
    if part.chars().any(char::is_whitespace) {
        return None;
    }
    let mut pieces = part.split(':');
    let basename = pieces.next().filter(|b| !b.is_empty())?;
    Some(Location {
        basename,
        line: pieces.next().and_then(|line| line.parse().ok()),
        column: pieces.next().and_then(|column| column.parse().ok()),
    })
}

/// Returns the missing view named by `input`, if any.
pub fn unresolved_target(input: &str) -> Option<String> {
    [&*NOT_DEFINED, &*CALL_MISSING, &*INCLUDE_MISSING]
        .iter()
        .find_map(|pattern| pattern.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Follows `source()` to the deepest engine error.
///
/// Includes wrap the failure of the included view
/// (`could not render include: error in "b.html"`); the wrapped error names
/// the missing view and the position inside the included file.
pub fn innermost(err: &minijinja::Error) -> &minijinja::Error {
    let mut current = err;
    while let Some(next) = std::error::Error::source(current)
        .and_then(|source| source.downcast_ref::<minijinja::Error>())
    {
        current = next;
    }
    current
}

/// Turns engine failures into [`ClassifiedError`]s.
///
/// The namespace, when given, supplies the source of the view named in the
/// message; the fallback is used when the namespace does not have it (for
/// instance a view that failed to parse and so never entered it).
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier<'a> {
    namespace: Option<&'a Namespace>,
    fallback_root: Option<&'a str>,
}

impl<'a> ErrorClassifier<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: &'a Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn with_fallback(mut self, root: &'a str) -> Self {
        self.fallback_root = Some(root);
        self
    }

    /// Classifies a raw message.
    pub fn classify(&self, input: &str, stage: Stage) -> ClassifiedError {
        let parsed = parse_message(input);

        let root_content = parsed
            .basename
            .as_deref()
            .and_then(|name| self.source(name))
            .or(self.fallback_root)
            .map(str::to_string);

        let (kind, target) = if RECURSION.is_match(input) {
            (ErrorKind::Recursion, None)
        } else if let Some(target) = unresolved_target(input) {
            (ErrorKind::NotDefined, Some(target))
        } else {
            let kind = match stage {
                Stage::Parse => ErrorKind::Parse,
                Stage::Execute => ErrorKind::Execution,
            };
            (kind, None)
        };

        ClassifiedError {
            kind,
            tag: parsed.tag,
            message: parsed.message,
            basename: parsed.basename,
            line: parsed.line,
            column: parsed.column,
            root_content,
            unresolved_target: target,
        }
    }

    /// Classifies an engine error by its innermost cause.
    pub fn classify_engine(&self, err: &minijinja::Error, stage: Stage) -> ClassifiedError {
        self.classify(&self.describe(innermost(err)), stage)
    }

    /// Writes an engine error in the message grammar.
    ///
    /// Only `err` itself is described; see [`innermost`] for wrapped
    /// failures.
    pub fn describe(&self, err: &minijinja::Error) -> String {
        let mut out = String::from(ENGINE_TAG);
        if let Some(name) = err.name() {
            let _ = write!(out, ": {}", name);
            if let Some(line) = err.line() {
                let _ = write!(out, ":{}", line);
                if let Some(column) = self.column(err, name) {
                    let _ = write!(out, ":{}", column);
                }
            }
        }
        let _ = write!(out, ": {}", err.kind());
        if let Some(detail) = err.detail() {
            let _ = write!(out, ": {}", detail);
        }
        out
    }

    fn source(&self, name: &str) -> Option<&'a str> {
        self.namespace.and_then(|ns| ns.source(name))
    }

    fn column(&self, err: &minijinja::Error, name: &str) -> Option<usize> {
        let start = err.range()?.start;
        let source = self.source(name).or(self.fallback_root)?;
        let before = source.get(..start)?;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Some(before[line_start..].chars().count() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // =========================================================================
    // Grammar
    // =========================================================================

    #[test]
    fn test_parse_empty() {
        let parsed = parse_message("");
        assert_eq!(parsed, ParsedMessage::default());
    }

    #[test]
    fn test_parse_message_only() {
        let parsed = parse_message("something broke");
        assert_eq!(parsed.tag, None);
        assert_eq!(parsed.message, "something broke");
    }

    #[test]
    fn test_parse_prefix_and_message() {
        let parsed = parse_message("minijinja: unexpected end of input");
        assert_eq!(parsed.tag.as_deref(), Some(SYSTEM_TAG));
        assert_eq!(parsed.basename, None);
        assert_eq!(parsed.message, "unexpected end of input");
    }

    #[test]
    fn test_parse_full_location() {
        let parsed =
            parse_message("minijinja: app/index.html:11:5: unknown function: callfunc is unknown");
        assert_eq!(parsed.tag.as_deref(), Some("render"));
        assert_eq!(parsed.basename.as_deref(), Some("app/index.html"));
        assert_eq!(parsed.line, Some(11));
        assert_eq!(parsed.column, Some(5));
        assert_eq!(parsed.message, "unknown function: callfunc is unknown");
    }

    #[test]
    fn test_parse_location_without_column() {
        let parsed = parse_message("template: index.html:3: bad thing");
        assert_eq!(parsed.tag.as_deref(), Some("template"));
        assert_eq!(parsed.basename.as_deref(), Some("index.html"));
        assert_eq!(parsed.line, Some(3));
        assert_eq!(parsed.column, None);
    }

    #[test]
    fn test_parse_whitespace_second_part_is_message() {
        let parsed = parse_message("render: not a location: the rest");
        assert_eq!(parsed.basename, None);
        assert_eq!(parsed.message, "not a location: the rest");
    }

    #[test]
    fn test_parse_keeps_basename_without_numeric_line() {
        let parsed = parse_message("render: a.html:x: the rest");
        assert_eq!(parsed.basename.as_deref(), Some("a.html"));
        assert_eq!(parsed.line, None);
        assert_eq!(parsed.column, None);
        assert_eq!(parsed.message, "the rest");
    }

    #[test]
    fn test_parse_line_and_column_independent() {
        let parsed = parse_message("template: index.html:3:abc: boom");
        assert_eq!(parsed.basename.as_deref(), Some("index.html"));
        assert_eq!(parsed.line, Some(3));
        assert_eq!(parsed.column, None);
        assert_eq!(parsed.message, "boom");

        let parsed = parse_message("template: index.html:x:7: boom");
        assert_eq!(parsed.line, None);
        assert_eq!(parsed.column, Some(7));

        let parsed = parse_message("template: index.html:3:7:9: boom");
        assert_eq!(parsed.line, Some(3));
        assert_eq!(parsed.column, Some(7));
        assert_eq!(parsed.message, "boom");
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn test_not_defined_target() {
        let err = ErrorClassifier::new().classify(
            "minijinja: a.html:1: template not found: template \"b.html\" not defined",
            Stage::Execute,
        );
        assert_eq!(err.kind, ErrorKind::NotDefined);
        assert_eq!(err.unresolved_target.as_deref(), Some("b.html"));
        assert_eq!(err.basename.as_deref(), Some("a.html"));
    }

    #[test]
    fn test_call_missing_target() {
        let err = ErrorClassifier::new().classify(
            "template: index.html:2:3: executing \"index.html\" at <import>: error calling import: no template \"case3/load.html\" associated with template \"index.html\"",
            Stage::Execute,
        );
        assert_eq!(err.unresolved_target.as_deref(), Some("case3/load.html"));
    }

    #[test]
    fn test_include_missing_target() {
        let err = ErrorClassifier::new().classify(
            "minijinja: a.html:1: template not found: tried to include non-existing template \"c.html\"",
            Stage::Execute,
        );
        assert_eq!(err.unresolved_target.as_deref(), Some("c.html"));
    }

    #[test]
    fn test_stage_default_kinds() {
        let classifier = ErrorClassifier::new();
        assert_eq!(
            classifier.classify("minijinja: a.html:1: syntax error: oops", Stage::Parse).kind,
            ErrorKind::Parse
        );
        assert_eq!(
            classifier
                .classify("minijinja: a.html:1: invalid operation: oops", Stage::Execute)
                .kind,
            ErrorKind::Execution
        );
    }

    #[test]
    fn test_recursion_has_no_target() {
        let err = ErrorClassifier::new().classify(
            "minijinja: a.html:1: invalid operation: exceeded maximum template depth (32): template \"b.html\" not defined",
            Stage::Execute,
        );
        assert_eq!(err.kind, ErrorKind::Recursion);
        assert_eq!(err.unresolved_target, None);
    }

    #[test]
    fn test_root_content_prefers_namespace() {
        let ns = Namespace::new().add_or_replace("a.html", "source of a").unwrap();
        let classifier = ErrorClassifier::new()
            .with_namespace(&ns)
            .with_fallback("fallback");

        let err = classifier.classify("minijinja: a.html:1: invalid operation: x", Stage::Execute);
        assert_eq!(err.root_content.as_deref(), Some("source of a"));

        let err = classifier.classify("minijinja: z.html:1: invalid operation: x", Stage::Execute);
        assert_eq!(err.root_content.as_deref(), Some("fallback"));
    }

    #[test]
    fn test_classify_engine_syntax_error() {
        let source = "line one\n{{ 1 + }}";
        let err = Namespace::new().add_or_replace("bad.html", source).unwrap_err();
        let classified = ErrorClassifier::new()
            .with_fallback(source)
            .classify_engine(&err, Stage::Parse);

        assert_eq!(classified.kind, ErrorKind::Parse);
        assert_eq!(classified.tag.as_deref(), Some(SYSTEM_TAG));
        assert_eq!(classified.basename.as_deref(), Some("bad.html"));
        assert_eq!(classified.line, Some(2));
        assert!(classified.column.is_some());
        assert_eq!(classified.root_content.as_deref(), Some(source));
    }

    #[test]
    fn test_classify_engine_reads_wrapped_cause() {
        let inner = minijinja::Error::new(
            minijinja::ErrorKind::TemplateNotFound,
            "error calling import: no template \"c.html\" associated with the namespace",
        );
        let outer = minijinja::Error::new(
            minijinja::ErrorKind::BadInclude,
            "error in \"b.html\"",
        )
        .with_source(inner);

        let classified = ErrorClassifier::new().classify_engine(&outer, Stage::Execute);
        assert_eq!(classified.kind, ErrorKind::NotDefined);
        assert_eq!(classified.unresolved_target.as_deref(), Some("c.html"));
        assert_eq!(
            innermost(&outer).kind(),
            minijinja::ErrorKind::TemplateNotFound
        );
    }

    proptest! {
        #[test]
        fn prop_classify_never_panics(input in ".{0,200}") {
            let err = ErrorClassifier::new().classify(&input, Stage::Execute);
            prop_assert!(err.kind != ErrorKind::Parse);
        }

        #[test]
        fn prop_structured_messages_round_trip(
            name in "[a-z]{1,8}/[a-z]{1,8}\\.html",
            line in 1usize..10_000,
            column in 1usize..500,
            detail in "[a-z ]{1,30}",
        ) {
            let input = format!("minijinja: {}:{}:{}: {}", name, line, column, detail);
            let err = ErrorClassifier::new().classify(&input, Stage::Execute);
            prop_assert_eq!(err.basename.as_deref(), Some(name.as_str()));
            prop_assert_eq!(err.line, Some(line));
            prop_assert_eq!(err.column, Some(column));
            prop_assert_eq!(err.message, detail);
        }
    }
}
