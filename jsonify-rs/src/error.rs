//! Error taxonomy shared by template loading and evaluation.
//!
//! Every fallible operation in the crate returns [`Result`].  Errors raised
//! while a child entry executes are wrapped in [`Error::Node`] on the way up,
//! so the final error carries the dotted path of the entry that failed
//! (`article.title`).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], independent of node wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    CommandNotFound,
    ArgumentBinding,
    TypeConversion,
    Command,
    RecursionLimit,
    Config,
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed template key, command line, type name, or literal.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("command `{0}` not found")]
    CommandNotFound(String),

    /// Too many positional arguments, or an unknown/duplicate keyword.
    #[error("argument binding failed: {0}")]
    ArgumentBinding(String),

    #[error("cannot convert {value} to {target}")]
    TypeConversion { target: String, value: String },

    /// A command ran but rejected its input.
    #[error("{name}: {message}")]
    Command { name: String, message: String },

    #[error("call depth limit of {0} exceeded")]
    RecursionLimit(usize),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("in `{path}`: {source}")]
    Node {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    pub fn command(name: &str, message: impl Into<String>) -> Self {
        Error::Command {
            name: name.to_owned(),
            message: message.into(),
        }
    }

    pub fn binding(message: impl Into<String>) -> Self {
        Error::ArgumentBinding(message.into())
    }

    /// Kind of the innermost error, looking through node wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::Parse,
            Error::CommandNotFound(_) => ErrorKind::CommandNotFound,
            Error::ArgumentBinding(_) => ErrorKind::ArgumentBinding,
            Error::TypeConversion { .. } => ErrorKind::TypeConversion,
            Error::Command { .. } => ErrorKind::Command,
            Error::RecursionLimit(_) => ErrorKind::RecursionLimit,
            Error::Config(_) => ErrorKind::Config,
            Error::Node { source, .. } => source.kind(),
        }
    }

    /// Dotted path of the entry that raised the error, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Node { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Prefix the error's node path with `name`.
    ///
    /// An empty name (the template root) leaves the error untouched.
    pub fn in_node(self, name: &str) -> Self {
        if name.is_empty() {
            return self;
        }
        match self {
            Error::Node { path, source } => Error::Node {
                path: format!("{name}.{path}"),
                source,
            },
            other => Error::Node {
                path: name.to_owned(),
                source: Box::new(other),
            },
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_paths_accumulate_outward() {
        let err = Error::CommandNotFound("nope".into())
            .in_node("title")
            .in_node("article");
        assert_eq!(err.path(), Some("article.title"));
        assert_eq!(err.kind(), ErrorKind::CommandNotFound);
        assert_eq!(
            err.to_string(),
            "in `article.title`: command `nope` not found"
        );
    }

    #[test]
    fn root_name_does_not_wrap() {
        let err = Error::parse("bad").in_node("");
        assert!(err.path().is_none());
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn command_error_display() {
        let err = Error::command("regex", "unknown action `frob`");
        assert_eq!(err.to_string(), "regex: unknown action `frob`");
        assert_eq!(err.kind(), ErrorKind::Command);
    }
}
