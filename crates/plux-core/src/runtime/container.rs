use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::error::PluginError;
use crate::core::plugin::{LoadValue, Plugin};
use crate::core::spec::PluginSpec;

/// Where a container is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// In the index, the factory has not been invoked yet
    Resolved,
    /// The plugin instance exists but is not loaded
    Initialized,
    Loaded,
    Disabled,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Resolved => "resolved",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Loaded => "loaded",
            LifecycleState::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

#[derive(Default)]
pub(crate) struct ContainerStatus {
    pub(crate) initialized: bool,
    pub(crate) loaded: bool,
    pub(crate) load_value: Option<LoadValue>,
    pub(crate) disabled: bool,
    pub(crate) disabled_reason: Option<String>,
    pub(crate) init_error: Option<PluginError>,
    pub(crate) load_error: Option<PluginError>,
}

impl ContainerStatus {
    pub(crate) fn lifecycle(&self) -> LifecycleState {
        if self.disabled {
            LifecycleState::Disabled
        } else if self.loaded {
            LifecycleState::Loaded
        } else if self.initialized {
            LifecycleState::Initialized
        } else {
            LifecycleState::Resolved
        }
    }
}

/// Per-specification record held by a [`PluginManager`](super::PluginManager).
///
/// The plugin instance sits behind a transition lock that is held for the
/// whole of an init or load, so a plugin is instantiated and loaded at most
/// once even when several threads load it at the same time. The observable
/// status has its own lock, which is never held while a listener hook runs:
/// hooks may read any container, but must not load the plugin they are
/// notified about.
pub struct PluginContainer {
    spec: PluginSpec,
    plugin: Mutex<Option<Box<dyn Plugin>>>,
    status: Mutex<ContainerStatus>,
}

impl PluginContainer {
    pub(crate) fn new(spec: PluginSpec) -> Self {
        Self {
            spec,
            plugin: Mutex::new(None),
            status: Mutex::new(ContainerStatus::default()),
        }
    }

    pub(crate) fn new_disabled(spec: PluginSpec, reason: Option<String>) -> Self {
        let container = Self::new(spec);
        {
            let mut status = container.status();
            status.disabled = true;
            status.disabled_reason = reason;
        }
        container
    }

    /// Lock held across a lifecycle transition.
    pub(crate) fn transition(&self) -> MutexGuard<'_, Option<Box<dyn Plugin>>> {
        self.plugin.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn status(&self) -> MutexGuard<'_, ContainerStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn spec(&self) -> &PluginSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn state(&self) -> LifecycleState {
        self.status().lifecycle()
    }

    pub fn is_initialized(&self) -> bool {
        self.status().initialized
    }

    pub fn is_loaded(&self) -> bool {
        self.status().loaded
    }

    pub fn is_disabled(&self) -> bool {
        self.status().disabled
    }

    pub fn disabled_reason(&self) -> Option<String> {
        self.status().disabled_reason.clone()
    }

    /// The cached load result, once loaded.
    pub fn load_value(&self) -> Option<LoadValue> {
        self.status().load_value.clone()
    }

    /// The sticky initialization failure. A listener error raised from
    /// `on_init_after` is recorded here as well.
    pub fn init_error(&self) -> Option<PluginError> {
        self.status().init_error.clone()
    }

    /// The error of the most recent failed load attempt, cleared by a successful load.
    pub fn load_error(&self) -> Option<PluginError> {
        self.status().load_error.clone()
    }

    /// Mark the container disabled unless it is already loaded.
    pub(crate) fn disable(&self, reason: Option<String>) -> bool {
        let mut status = self.status();
        if status.loaded {
            return false;
        }
        status.disabled = true;
        status.disabled_reason = reason;
        true
    }
}

impl fmt::Debug for PluginContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContainer")
            .field("spec", &self.spec)
            .field("state", &self.state())
            .finish()
    }
}
