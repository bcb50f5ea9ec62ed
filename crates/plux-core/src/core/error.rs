//! # Plux Core Errors
//!
//! Defines the error types of the plugin lifecycle.
//!
//! [`PluginError`] covers every failure a [`PluginManager`](crate::runtime::PluginManager)
//! can surface: a plugin that is not in the index, a disabled plugin, a factory
//! or `load` failure, or a conflict while building the index. [`ResolutionError`]
//! covers the failures of turning a raw source (a module binding or an entry point
//! reference) into a [`PluginSpec`](crate::core::PluginSpec).
use std::error::Error as StdError;
use std::sync::Arc;

/// Boxed error returned by plugin code (factories and `load` implementations).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Shared error source, so recorded failures can be cloned and returned again.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Shorthand for results of lifecycle operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("cannot resolve plugin specification from {source_desc}")]
    Unresolvable { source_desc: String },

    #[error("plugin type {type_name} does not declare a {missing}")]
    MissingIdentity {
        type_name: String,
        missing: &'static str,
    },

    #[error("invalid entry point reference '{reference}', expected 'module.path:member'")]
    InvalidReference { reference: String },

    #[error("no module named '{module}'")]
    ModuleNotFound { module: String },

    #[error("error importing module '{module}': {message}")]
    ModuleLoad { module: String, message: String },

    #[error("module '{module}' has no member '{member}'")]
    MemberNotFound { module: String, member: String },

    #[error("plugin {namespace}:{name} is not bound to a module and has no entry point value")]
    Unbound { namespace: String, name: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("plugin {namespace}:{name} is disabled{}", format_reason(.reason))]
    Disabled {
        namespace: String,
        name: String,
        reason: Option<String>,
    },

    #[error("error initializing plugin {namespace}:{name}: {source}")]
    Initialization {
        namespace: String,
        name: String,
        #[source]
        source: SharedError,
    },

    #[error("error loading plugin {namespace}:{name}: {source}")]
    Load {
        namespace: String,
        name: String,
        #[source]
        source: SharedError,
    },

    #[error("no plugin named {name} in namespace {namespace}")]
    NotFound { namespace: String, name: String },

    #[error("duplicate plugin {namespace}:{name}")]
    Conflict { namespace: String, name: String },

    #[error("error reading plugin metadata from {location}: {message}")]
    Metadata { location: String, message: String },

    /// Generic failure raised by plugin or listener code
    #[error("{message}")]
    Other {
        message: String,
        namespace: Option<String>,
        name: Option<String>,
    },

    #[error("internal plugin system error: {0}")]
    Internal(String),
}

fn format_reason(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(", reason: {}", reason),
        None => String::new(),
    }
}

impl PluginError {
    /// Create a `Disabled` error, typically returned by a listener to veto a plugin.
    pub fn disabled(namespace: &str, name: &str, reason: impl Into<String>) -> Self {
        PluginError::Disabled {
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason: Some(reason.into()),
        }
    }

    /// Create a generic error carrying only a message.
    pub fn other(message: impl Into<String>) -> Self {
        PluginError::Other {
            message: message.into(),
            namespace: None,
            name: None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, PluginError::Disabled { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PluginError::NotFound { .. })
    }

    /// The disable reason, if this is a `Disabled` error.
    pub fn disabled_reason(&self) -> Option<&str> {
        match self {
            PluginError::Disabled { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}

impl From<String> for PluginError {
    fn from(message: String) -> Self {
        PluginError::other(message)
    }
}

impl From<&str> for PluginError {
    fn from(message: &str) -> Self {
        PluginError::other(message)
    }
}
