use thiserror::Error;

/// Defects in a plugin definition; raised at definition time, never retried
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginDefinitionError {
    #[error("Plugin '{plugin}' must define a non-empty '{field}'")]
    MissingIdentity { field: String, plugin: String },

    #[error("Plugin '{plugin}' declares unknown interface '{interface}'")]
    UnknownInterface { interface: String, plugin: String },

    #[error("Plugin '{plugin}' is code-defined but interface '{interface}' takes documents")]
    NotCodeInterface { interface: String, plugin: String },

    #[error("Plugin '{plugin}' declares family '{family}', which interface '{interface}' does not define")]
    UnknownFamily {
        interface: String,
        family: String,
        plugin: String,
    },

    #[error("Plugin '{plugin}' overrides the entry point 'invoke'; supply 'call' instead")]
    EntryPointOverride { plugin: String },

    #[error("Plugin '{plugin}' does not supply the implementation 'call'")]
    MissingImplementation { plugin: String },

    #[error("Plugin '{plugin}' does not satisfy family '{family}': {reason}")]
    SignatureMismatch {
        plugin: String,
        family: String,
        reason: String,
    },
}

/// Failures while invoking a wrapped plugin
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    #[error("{plugin}() missing required argument '{name}'")]
    MissingArgument { plugin: String, name: String },

    #[error("{plugin}() got an unexpected argument '{name}'")]
    UnexpectedArgument { plugin: String, name: String },

    #[error("{plugin}() got multiple values for argument '{name}'")]
    DuplicateArgument { plugin: String, name: String },

    #[error("{plugin}() takes {expected} positional argument(s) but {given} were given")]
    TooManyPositional {
        plugin: String,
        expected: usize,
        given: usize,
    },

    #[error("{stage} hook of interface '{interface}' failed: {message}")]
    Hook {
        stage: &'static str,
        interface: String,
        message: String,
    },

    #[error("Plugin '{plugin}' failed: {message}")]
    Failed { plugin: String, message: String },
}

impl InvokeError {
    /// Error returned from inside a plugin body
    pub fn failed(plugin: &str, message: impl ToString) -> Self {
        InvokeError::Failed {
            plugin: plugin.to_string(),
            message: message.to_string(),
        }
    }
}
