use std::path::PathBuf;

use thiserror::Error;

/// Generation-time errors. Every variant is a catalog or programmer mistake
/// and aborts generation; none of them can occur at hook-installation time.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("duplicate method name `{0}` in catalog")]
    DuplicateMethodName(String),

    #[error("`{first}` and `{second}` share exported name `{exported}` and signature `{signature}`")]
    DuplicateSignature {
        exported: String,
        signature: String,
        first: String,
        second: String,
    },

    #[error("argument `{argument}` declared twice in `{method}`")]
    DuplicateArgument { method: String, argument: String },

    #[error("argument `{argument}` of `{method}` is not a valid C identifier")]
    InvalidIdentifier { method: String, argument: String },

    #[error("argument `{argument}` of `{method}` clashes with a name the trampoline uses")]
    ReservedArgument { method: String, argument: String },

    #[error("version tag `{version}` of `{family}` must be letters, digits and `_`")]
    InvalidVersion { family: String, version: String },

    #[error("empty argument name in `{0}`")]
    EmptyArgumentName(String),

    #[error("`{0}` has no arguments")]
    EmptyArguments(String),

    #[error("`{method}` is missing identity argument `{argument}`")]
    MissingIdentityArgument { method: String, argument: String },

    #[error("`{method}` declares identity argument `{argument}` as `{found}`, expected `{expected}`")]
    IdentityTypeMismatch {
        method: String,
        argument: String,
        expected: String,
        found: String,
    },

    #[error("argument `{argument}` of `{method}` has void type")]
    VoidArgument { method: String, argument: String },

    #[error("`{method}` promotes `{argument}`, which `{context}` has no field for")]
    UnknownContextField {
        method: String,
        argument: String,
        context: String,
    },

    #[error("anonymous argument #{index} of `{method}` cannot be promoted")]
    PromotedAnonymous { method: String, index: usize },

    #[error("`{method}` returns `{found}`, family requires `{expected}`")]
    ReturnTypeMismatch {
        method: String,
        expected: String,
        found: String,
    },

    #[error("malformed wire code `{code}`: {reason}")]
    MalformedWireCode { code: String, reason: String },

    #[error("unknown family `{0}`")]
    UnknownFamily(String),

    #[error("failed to read catalog file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors raised while rendering an artifact.
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("JSON render error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),
}
