use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arguments handed to [`Plugin::load`](crate::core::Plugin::load).
///
/// A manager carries default arguments; a call site may add its own. See
/// [`LoadArgs::merged`] for the precedence rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadArgs {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl LoadArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn get_kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// Merge manager defaults with call-site arguments.
    ///
    /// Positional arguments are the defaults followed by the call-site
    /// positionals. Keyword arguments start from the defaults; a call-site key
    /// replaces the default with the same key.
    pub fn merged(defaults: &LoadArgs, call: Option<&LoadArgs>) -> LoadArgs {
        let Some(call) = call else {
            return defaults.clone();
        };

        let mut merged = defaults.clone();
        merged.args.extend(call.args.iter().cloned());
        for (key, value) in &call.kwargs {
            merged.kwargs.insert(key.clone(), value.clone());
        }
        merged
    }
}
