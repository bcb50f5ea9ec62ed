use crate::core::error::ResolutionError;
use crate::core::spec::{PluginSource, PluginSpec};

/// Finds or creates [`PluginSpec`] instances from sources.
pub trait PluginSpecResolver: Send + Sync {
    /// Tries to create a specification from the given source.
    fn resolve(&self, source: &PluginSource) -> Result<PluginSpec, ResolutionError>;
}

/// Resolver accepting exactly three shapes: an existing specification, a plugin
/// class declaring both namespace and name, and a function carrying an
/// attached specification. Everything else is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSpecResolver;

impl DefaultSpecResolver {
    pub fn new() -> Self {
        Self
    }
}

impl PluginSpecResolver for DefaultSpecResolver {
    fn resolve(&self, source: &PluginSource) -> Result<PluginSpec, ResolutionError> {
        match source {
            PluginSource::Spec(spec) => Ok(spec.clone()),
            PluginSource::Class(class) => {
                if class.namespace().is_empty() {
                    return Err(ResolutionError::MissingIdentity {
                        type_name: class.type_name().to_string(),
                        missing: "namespace",
                    });
                }
                if class.name().is_empty() {
                    return Err(ResolutionError::MissingIdentity {
                        type_name: class.type_name().to_string(),
                        missing: "name",
                    });
                }
                let spec = PluginSpec::new(class.namespace(), class.name(), class.factory().clone());
                Ok(match class.origin() {
                    Some(origin) => spec.with_origin(origin),
                    None => spec,
                })
            }
            PluginSource::Function(function) => {
                let spec = function.spec();
                // closures without an explicit name end up here
                if spec.namespace().is_empty() || spec.name().is_empty() {
                    return Err(ResolutionError::Unresolvable { source_desc: source.describe() });
                }
                Ok(spec.clone())
            }
            PluginSource::Value(_) => Err(ResolutionError::Unresolvable { source_desc: source.describe() }),
        }
    }
}

impl<F> PluginSpecResolver for F
where
    F: Fn(&PluginSource) -> Result<PluginSpec, ResolutionError> + Send + Sync,
{
    fn resolve(&self, source: &PluginSource) -> Result<PluginSpec, ResolutionError> {
        self(source)
    }
}
