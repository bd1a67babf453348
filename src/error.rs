//! Error types for parsing and interpreting chainline programs.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DslError>;

/// An error raised while parsing or interpreting a program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DslError {
    #[error("[{line}:{col}] syntax error: {message}")]
    Syntax {
        message: String,
        line: usize,
        col: usize,
    },

    #[error("no track context for {call} call and no selected track found")]
    NoTrackContext { call: String },

    #[error("no selected track found in session state")]
    NoSelectedTrack,

    #[error("clip call must specify bar, start, or position")]
    MissingClipAnchor,

    #[error("fx call must specify fxname or instrument")]
    MissingFxTarget,

    #[error("missing required argument '{arg}'")]
    MissingArgument { arg: String },

    #[error("invalid argument '{arg}': expected {expected}, got {got}")]
    InvalidArgument {
        arg: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("unexpected argument '{arg}'")]
    UnexpectedArgument { arg: String },

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("property '{segment}' not found on {kind}")]
    PropertyNotFound { segment: String, kind: &'static str },

    #[error("evaluation error: {message}")]
    Evaluation { message: String },

    #[error("collection must be a list, got {0}")]
    NotASequence(&'static str),

    #[error("unknown function '@{0}'")]
    UnknownFunction(String),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("no actions found in DSL code")]
    NoActionsProduced,

    /// A failure inside a specific call, with the arguments it received.
    #[error("{call}({args}): {source}")]
    Call {
        call: String,
        args: String,
        #[source]
        source: Box<DslError>,
    },
}

impl DslError {
    pub fn syntax(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            line,
            col,
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    pub fn no_track(call: impl Into<String>) -> Self {
        Self::NoTrackContext { call: call.into() }
    }

    pub fn missing(arg: impl Into<String>) -> Self {
        Self::MissingArgument { arg: arg.into() }
    }

    /// Wrap this error with the call that produced it. Already-wrapped errors
    /// keep their innermost call site.
    pub fn in_call(self, call: &str, args: impl Into<String>) -> Self {
        match self {
            wrapped @ Self::Call { .. } => wrapped,
            other => Self::Call {
                call: call.to_string(),
                args: args.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping call-context wrappers.
    pub fn root(&self) -> &DslError {
        match self {
            Self::Call { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unwraps_call_context() {
        let err = DslError::MissingFxTarget.in_call("add_fx", "");
        assert!(matches!(err, DslError::Call { .. }));
        assert_eq!(err.root(), &DslError::MissingFxTarget);
    }

    #[test]
    fn in_call_keeps_innermost_site() {
        let err = DslError::MissingFxTarget
            .in_call("add_fx", "")
            .in_call("for_each", "items, @add_fx");
        match err {
            DslError::Call { call, .. } => assert_eq!(call, "add_fx"),
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn display_includes_call_and_arguments() {
        let err = DslError::no_track("new_clip").in_call("new_clip", "bar=3");
        let text = err.to_string();
        assert!(text.starts_with("new_clip(bar=3):"), "{text}");
        assert!(text.contains("no track context"));
    }

    #[test]
    fn syntax_error_reports_position() {
        let err = DslError::syntax("unexpected ')'", 2, 7);
        assert_eq!(err.to_string(), "[2:7] syntax error: unexpected ')'");
    }
}
