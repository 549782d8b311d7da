//! Humanization: rewrite raw fault messages into short spoken sentences.
//!
//! The rule table is the main extensibility seam. A [`Rule`] pairs a
//! matcher (message pattern or bound fault kind) with a renderer; the
//! first rule that applies wins, in registration order. When nothing
//! matches, the message is run through the cleaner and, when a stack is
//! available, suffixed with the top frame's file and line.

use crate::config::NarratorConfig;
use crate::fault::{Fault, FaultKind};
use crate::{BlurtError, Result};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// What a [`Rule`] matches against.
pub enum Matcher {
    /// Regular expression applied to the message text.
    Message(Regex),
    /// Case-insensitive substring of the message text.
    Contains(String),
    /// The fault's declared kind.
    Kind(FaultKind),
    /// Both at once: the declared kind and a message pattern.
    KindAndMessage(FaultKind, Regex),
}

/// Context handed to a renderer when its rule matched.
pub struct RuleMatch<'a> {
    pub message: &'a str,
    captures: Option<Captures<'a>>,
}

impl RuleMatch<'_> {
    /// Returns capture group `i`, or `""` when the matcher had no captures.
    pub fn group(&self, i: usize) -> &str {
        self.captures
            .as_ref()
            .and_then(|c| c.get(i))
            .map(|m| m.as_str())
            .unwrap_or("")
    }
}

type Renderer = Box<dyn Fn(&RuleMatch<'_>) -> Result<String> + Send + Sync>;

/// A single humanization rule.
pub struct Rule {
    matcher: Matcher,
    render: Renderer,
}

impl Rule {
    pub fn new(
        matcher: Matcher,
        render: impl Fn(&RuleMatch<'_>) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Rule {
            matcher,
            render: Box::new(render),
        }
    }

    /// Message-pattern rule. Panics on an invalid expression, so only
    /// call it with literals.
    pub fn pattern(
        re: &str,
        render: impl Fn(&RuleMatch<'_>) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Rule::new(
            Matcher::Message(Regex::new(re).expect("invalid rule pattern")),
            render,
        )
    }

    /// Substring rule with a fixed rendering.
    pub fn contains(needle: &str, sentence: &str) -> Self {
        let sentence = sentence.to_string();
        Rule::new(Matcher::Contains(needle.to_lowercase()), move |_| {
            Ok(sentence.clone())
        })
    }

    /// Kind-bound rule with a fixed rendering.
    pub fn for_kind(kind: FaultKind, sentence: &str) -> Self {
        let sentence = sentence.to_string();
        Rule::new(Matcher::Kind(kind), move |_| Ok(sentence.clone()))
    }

    /// Rule requiring both a declared kind and a message pattern.
    /// Panics on an invalid expression, so only call it with literals.
    pub fn kind_pattern(
        kind: FaultKind,
        re: &str,
        render: impl Fn(&RuleMatch<'_>) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Rule::new(
            Matcher::KindAndMessage(kind, Regex::new(re).expect("invalid rule pattern")),
            render,
        )
    }

    fn try_apply(&self, fault: &Fault, message: &str) -> Option<Result<String>> {
        let ctx = match &self.matcher {
            Matcher::Message(re) => RuleMatch {
                message,
                captures: Some(re.captures(message)?),
            },
            Matcher::Contains(needle) => {
                if !message.to_lowercase().contains(needle) {
                    return None;
                }
                RuleMatch {
                    message,
                    captures: None,
                }
            }
            Matcher::Kind(kind) => {
                if fault.kind.as_ref() != Some(kind) {
                    return None;
                }
                RuleMatch {
                    message,
                    captures: None,
                }
            }
            Matcher::KindAndMessage(kind, re) => {
                if fault.kind.as_ref() != Some(kind) {
                    return None;
                }
                RuleMatch {
                    message,
                    captures: Some(re.captures(message)?),
                }
            }
        };
        Some((self.render)(&ctx))
    }
}

/// Ordered rule table.
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// The built-in table covering the common browser/runtime error shapes.
    pub fn builtin() -> Self {
        let rules = vec![
            Rule::pattern(r"(?i)([\w$.]+) is not a function", |m| {
                Ok(format!(
                    "{} is not a function. Check if it's properly imported or defined.",
                    m.group(1)
                ))
            }),
            Rule::pattern(r"(?i)Cannot read property '([^']+)' of (\S+)", |m| {
                Ok(format!(
                    "Cannot read property {}. The {} might be null or undefined.",
                    m.group(1),
                    m.group(2)
                ))
            }),
            Rule::pattern(
                r"(?i)Cannot read properties of (\S+) \(reading '([^']+)'\)",
                |m| {
                    Ok(format!(
                        "Cannot read property {} of {}. Check if the object exists.",
                        m.group(2),
                        m.group(1)
                    ))
                },
            ),
            Rule::pattern(r"(?i)Unexpected token (\S+) in JSON at position (\d+)", |m| {
                Ok(format!(
                    "JSON syntax error at position {}. Unexpected {}.",
                    m.group(2),
                    m.group(1)
                ))
            }),
            Rule::pattern(r"(?i)Unexpected token (\S+)", |m| {
                Ok(format!(
                    "Syntax error: unexpected {}. Check for missing brackets, commas, or quotes.",
                    m.group(1)
                ))
            }),
            Rule::contains(
                "module not found",
                "Module not found. Check your import path and make sure the package is installed.",
            ),
            Rule::contains(
                "failed to fetch",
                "Network error: Failed to fetch data. Check your internet connection or API endpoint.",
            ),
            Rule::contains(
                "objects are not valid as a react child",
                "React error: Cannot render an object directly. Use JSON.stringify or render object properties individually.",
            ),
            Rule::contains(
                "invalid hook call",
                "React hook error: Hooks can only be called at the top level of function components.",
            ),
            Rule::contains(
                "assignment to constant variable",
                "Cannot reassign a constant variable. Use let or var for variables that need to change.",
            ),
            Rule::kind_pattern(
                FaultKind::ReferenceError,
                r"(?i)([\w$]+) is not defined",
                |m| {
                    Ok(format!(
                        "Reference error: {} is not defined. Check spelling and scope.",
                        m.group(1)
                    ))
                },
            ),
            Rule::for_kind(
                FaultKind::TypeError,
                "Type error: Operation performed on wrong data type. Check your variable types.",
            ),
            Rule::for_kind(
                FaultKind::RangeError,
                "Range error: Value is outside the allowed range.",
            ),
        ];
        RuleSet { rules }
    }

    pub fn empty() -> Self {
        RuleSet { rules: Vec::new() }
    }

    /// Appends a rule, evaluated after all previously registered ones.
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Rewrites a fault into a spoken sentence, bounded by
    /// `config.max_message_length`. Deterministic for a given input.
    pub fn humanize(&self, fault: &Fault, config: &NarratorConfig) -> Result<String> {
        let message = fault.display_message();
        for rule in &self.rules {
            if let Some(rendered) = rule.try_apply(fault, &message) {
                let sentence = rendered
                    .map_err(|e| BlurtError::Humanize(format!("rule renderer failed: {e}")))?;
                return Ok(truncate(&sentence, config.max_message_length));
            }
        }

        let mut cleaned = clean_message(&message);
        if config.include_location {
            if let Some((file, line)) = fault.stack.as_deref().and_then(top_frame) {
                cleaned = format!("{cleaned} in {file} at line {line}");
            }
        }
        Ok(truncate(&cleaned, config.max_message_length))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet::builtin()
    }
}

static BUNDLER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z][a-zA-Z0-9+.-]*://[^\s!]*!").expect("bundler regex"));
static DEPENDENCY_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S*node_modules\S*").expect("dependency regex"));
static PUNCT_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[{}\[\]<>|\\"`^~*#%=+]+"#).expect("punctuation regex"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Strips bundler noise and filesystem detail from a raw message so the
/// result reads aloud tolerably.
pub fn clean_message(message: &str) -> String {
    let text: String = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let text = BUNDLER_PREFIX.replace_all(&text, "");
    let text = text.replace("./", "");
    let text = DEPENDENCY_PATH.replace_all(&text, "dependency");
    let text = PUNCT_NOISE.replace_all(&text, " ");
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

/// Normalization for pre-humanized text handed straight to `speak`:
/// control characters and line breaks become spaces, runs collapse.
pub fn normalize_spoken(text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

static STACK_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\s()]+?):(\d+):\d+").expect("stack frame regex"));

/// Extracts `(file basename, line)` from the top frame of a stack trace.
/// Understands both `at fn (path:line:col)` frames and bare `path:line:col`.
pub fn top_frame(stack: &str) -> Option<(String, u32)> {
    let caps = STACK_FRAME.captures(stack)?;
    let path = caps.get(1)?.as_str();
    let line = caps.get(2)?.as_str().parse().ok()?;
    let file = path
        .rsplit(['/', '\\'])
        .next()
        .filter(|f| !f.is_empty())?
        .to_string();
    Some((file, line))
}

/// Bounds `text` to `max` code points, appending `...` within the budget
/// when anything was cut.
pub fn truncate(text: &str, max: usize) -> String {
    let len = text.chars().count();
    if len <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn humanized(fault: &Fault) -> String {
        RuleSet::builtin()
            .humanize(fault, &NarratorConfig::default())
            .unwrap()
    }

    #[test]
    fn not_a_function() {
        assert_eq!(
            humanized(&Fault::new("map is not a function")),
            "map is not a function. Check if it's properly imported or defined."
        );
        assert_eq!(
            humanized(&Fault::new("TypeError: user.getName is not a function")),
            "user.getName is not a function. Check if it's properly imported or defined."
        );
    }

    #[test]
    fn cannot_read_property_legacy_form() {
        assert_eq!(
            humanized(&Fault::new("Cannot read property 'name' of undefined")),
            "Cannot read property name. The undefined might be null or undefined."
        );
    }

    #[test]
    fn cannot_read_properties_modern_form() {
        assert_eq!(
            humanized(&Fault::new("Cannot read properties of null (reading 'length')")),
            "Cannot read property length of null. Check if the object exists."
        );
    }

    #[test]
    fn json_syntax_error_with_position() {
        assert_eq!(
            humanized(&Fault::new("Unexpected token } in JSON at position 42")),
            "JSON syntax error at position 42. Unexpected }."
        );
    }

    #[test]
    fn unexpected_token_without_position() {
        assert_eq!(
            humanized(&Fault::new("Unexpected token )")),
            "Syntax error: unexpected ). Check for missing brackets, commas, or quotes."
        );
    }

    #[test]
    fn fixed_sentence_rules() {
        assert_eq!(
            humanized(&Fault::new("Module not found: Error: Can't resolve './App'")),
            "Module not found. Check your import path and make sure the package is installed."
        );
        assert_eq!(
            humanized(&Fault::new("Failed to fetch")),
            "Network error: Failed to fetch data. Check your internet connection or API endpoint."
        );
        assert_eq!(
            humanized(&Fault::new(
                "Objects are not valid as a React child (found: object with keys {a})"
            )),
            "React error: Cannot render an object directly. Use JSON.stringify or render object properties individually."
        );
        assert_eq!(
            humanized(&Fault::new("Invalid hook call. Hooks can only be called...")),
            "React hook error: Hooks can only be called at the top level of function components."
        );
        assert_eq!(
            humanized(&Fault::new("Assignment to constant variable.")),
            "Cannot reassign a constant variable. Use let or var for variables that need to change."
        );
    }

    #[test]
    fn reference_error_with_identifier() {
        assert_eq!(
            humanized(&Fault::with_kind(FaultKind::ReferenceError, "foo is not defined")),
            "Reference error: foo is not defined. Check spelling and scope."
        );
    }

    #[test]
    fn not_defined_requires_the_reference_error_kind() {
        // Same message under another kind falls through to that kind's
        // catch-all instead.
        assert_eq!(
            humanized(&Fault::with_kind(FaultKind::TypeError, "foo is not defined")),
            "Type error: Operation performed on wrong data type. Check your variable types."
        );
        // With no declared kind, nothing matches and the cleaner runs.
        assert_eq!(
            humanized(&Fault::new("foo is not defined")),
            "foo is not defined"
        );
    }

    #[test]
    fn kind_catch_alls() {
        assert_eq!(
            humanized(&Fault::with_kind(FaultKind::TypeError, "some unusual type failure")),
            "Type error: Operation performed on wrong data type. Check your variable types."
        );
        assert_eq!(
            humanized(&Fault::with_kind(FaultKind::RangeError, "boom")),
            "Range error: Value is outside the allowed range."
        );
    }

    #[test]
    fn message_rules_win_over_kind_catch_alls() {
        // A TypeError whose message matches a pattern rule gets the
        // specific sentence, not the catch-all.
        assert_eq!(
            humanized(&Fault::with_kind(FaultKind::TypeError, "map is not a function")),
            "map is not a function. Check if it's properly imported or defined."
        );
    }

    #[test]
    fn unmatched_message_is_cleaned() {
        assert_eq!(
            humanized(&Fault::new("something { broke } [badly]")),
            "something broke badly"
        );
    }

    #[test]
    fn cleaner_strips_bundler_and_dependency_paths() {
        assert_eq!(
            clean_message("webpack:///./src/App.js! failed in /app/node_modules/react/index.js"),
            "failed in dependency"
        );
        assert_eq!(clean_message("error in ./src/App.js"), "error in src/App.js");
    }

    #[test]
    fn cleaner_flattens_line_breaks_and_controls() {
        assert_eq!(clean_message("first\nsecond\tthird\r\nfourth"), "first second third fourth");
        assert_eq!(normalize_spoken("a\nb\u{0007}c"), "a b c");
    }

    #[test]
    fn location_appended_from_stack() {
        let fault = Fault::new("weird failure")
            .stack("    at render (http://localhost:3000/static/js/bundle.js:123:45)");
        assert_eq!(humanized(&fault), "weird failure in bundle.js at line 123");
    }

    #[test]
    fn location_skipped_when_disabled() {
        let mut config = NarratorConfig::default();
        config.include_location = false;
        let fault = Fault::new("weird failure").stack("at main (/app/src/index.js:9:1)");
        let text = RuleSet::builtin().humanize(&fault, &config).unwrap();
        assert_eq!(text, "weird failure");
    }

    #[test]
    fn rust_panic_frames_are_understood() {
        assert_eq!(
            top_frame("at src/bin/server.rs:42:9"),
            Some(("server.rs".to_string(), 42))
        );
        assert_eq!(top_frame("no frames here"), None);
    }

    #[test]
    fn truncation_respects_code_point_budget() {
        assert_eq!(truncate("short", 10), "short");
        let long = "x".repeat(30);
        let cut = truncate(&long, 20);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate("abcdef", 2), "ab");
    }

    #[test]
    fn truncation_applies_after_rules() {
        let mut config = NarratorConfig::default();
        config.max_message_length = 25;
        let text = RuleSet::builtin()
            .humanize(&Fault::new("map is not a function"), &config)
            .unwrap();
        assert_eq!(text.chars().count(), 25);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn custom_rules_run_after_builtins_and_may_fail() {
        let mut rules = RuleSet::builtin();
        rules.push(Rule::new(Matcher::Contains("flux capacitor".into()), |_| {
            Err(BlurtError::Humanize("renderer exploded".into()))
        }));
        let err = rules
            .humanize(&Fault::new("flux capacitor drained"), &NarratorConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("renderer exploded"));
    }
}
