//! Fault model: the raw error events the narrator consumes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::PanicHookInfo;

/// Well-known fault tags, with a passthrough for anything else.
///
/// Unknown tags are preserved verbatim in `Other` so severity rules and
/// kind filters can still match on them by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    TypeError,
    ReferenceError,
    SyntaxError,
    RangeError,
    ModuleError,
    Error,
    Unknown,
    Other(String),
}

impl FaultKind {
    /// Parses a short tag such as `TypeError` into a kind, preserving
    /// unrecognized tags verbatim.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "TypeError" => FaultKind::TypeError,
            "ReferenceError" => FaultKind::ReferenceError,
            "SyntaxError" => FaultKind::SyntaxError,
            "RangeError" => FaultKind::RangeError,
            "ModuleError" => FaultKind::ModuleError,
            "Error" => FaultKind::Error,
            "Unknown" => FaultKind::Unknown,
            other => FaultKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FaultKind::TypeError => "TypeError",
            FaultKind::ReferenceError => "ReferenceError",
            FaultKind::SyntaxError => "SyntaxError",
            FaultKind::RangeError => "RangeError",
            FaultKind::ModuleError => "ModuleError",
            FaultKind::Error => "Error",
            FaultKind::Unknown => "Unknown",
            FaultKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single raw fault event.
///
/// Faults are consumed immediately by [`crate::Blurt::handle_fault`]; the
/// engine never retains them.
#[derive(Clone, Debug, Default)]
pub struct Fault {
    /// Human-oriented error text, when the source had one.
    pub message: Option<String>,
    /// Short tag identifying the error class.
    pub kind: Option<FaultKind>,
    /// Raw stack trace text, used only for location extraction.
    pub stack: Option<String>,
    /// The fault that caused this one, if chained.
    pub cause: Option<Box<Fault>>,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Fault {
            message: Some(message.into()),
            ..Fault::default()
        }
    }

    pub fn with_kind(kind: FaultKind, message: impl Into<String>) -> Self {
        Fault {
            message: Some(message.into()),
            kind: Some(kind),
            ..Fault::default()
        }
    }

    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn caused_by(mut self, cause: Fault) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Builds a fault from a panic, capturing the payload as the message
    /// and the panic location as a single synthetic stack frame.
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        let stack = info
            .location()
            .map(|loc| format!("at {}:{}:{}", loc.file(), loc.line(), loc.column()));
        Fault {
            message: Some(message),
            kind: Some(FaultKind::Error),
            stack,
            cause: None,
        }
    }

    /// The message text the pipeline works from: the fault's message when
    /// non-empty, otherwise a rendering of the fault's kind.
    pub fn display_message(&self) -> String {
        match &self.message {
            Some(m) if !m.trim().is_empty() => m.clone(),
            _ => self
                .kind
                .as_ref()
                .unwrap_or(&FaultKind::Error)
                .as_str()
                .to_string(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_preserves_unknown_tags() {
        assert_eq!(FaultKind::parse("TypeError"), FaultKind::TypeError);
        assert_eq!(
            FaultKind::parse("WeirdHostError"),
            FaultKind::Other("WeirdHostError".to_string())
        );
        assert_eq!(FaultKind::parse("WeirdHostError").as_str(), "WeirdHostError");
    }

    #[test]
    fn display_message_falls_back_to_kind() {
        let fault = Fault {
            message: None,
            kind: Some(FaultKind::TypeError),
            stack: None,
            cause: None,
        };
        assert_eq!(fault.display_message(), "TypeError");

        let blank = Fault::new("   ");
        assert_eq!(blank.display_message(), "Error");
    }

    #[test]
    fn builder_chains() {
        let fault = Fault::with_kind(FaultKind::ModuleError, "Module not found: ./missing")
            .stack("at load (/app/src/loader.js:14:3)")
            .caused_by(Fault::new("ENOENT"));
        assert_eq!(fault.kind, Some(FaultKind::ModuleError));
        assert!(fault.stack.is_some());
        assert_eq!(fault.cause.unwrap().display_message(), "ENOENT");
    }
}
