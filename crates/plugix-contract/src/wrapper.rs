//! Definition step and invocation pipeline for code-defined plugins
//!
//! A [`PluginDefinition`] bundles the identity a code unit declares, the
//! symbols it exports and optionally an abstract base it builds on. [`define`]
//! checks everything up front and hands back either an [`AbstractBase`] to
//! extend or a ready [`WrappedPlugin`].

use crate::errors::{InvokeError, PluginDefinitionError};
use crate::hooks::InterfaceHooks;
use crate::interface::InterfaceCatalog;
use crate::payload::{CallArgs, Payload};
use crate::signature::Signature;
use plugix_registry::InterfaceType;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Public entry point synthesized for every plugin; units may not define it
pub const ENTRY_POINT: &str = "invoke";

/// Implementation symbol every concrete plugin must supply
pub const IMPLEMENTATION: &str = "call";

type CallFn = dyn Fn(Payload, &CallArgs) -> Result<Value, InvokeError> + Send + Sync;

/// A function exported by a code unit together with its signature
#[derive(Clone)]
pub struct Callable {
    signature: Signature,
    func: Arc<CallFn>,
}

impl Callable {
    pub fn new<F>(signature: Signature, func: F) -> Self
    where
        F: Fn(Payload, &CallArgs) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        Callable {
            signature,
            func: Arc::new(func),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("signature", &self.signature.to_string())
            .finish_non_exhaustive()
    }
}

/// What a loaded code unit declares
#[derive(Debug, Clone, Default)]
pub struct CodeUnit {
    pub interface: Option<String>,
    pub family: Option<String>,
    pub name: Option<String>,
    pub docstring: Option<String>,
    pub symbols: BTreeMap<String, Callable>,
}

impl CodeUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    pub fn family(mut self, family: &str) -> Self {
        self.family = Some(family.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn docstring(mut self, docstring: &str) -> Self {
        self.docstring = Some(docstring.to_string());
        self
    }

    pub fn symbol(mut self, symbol: &str, callable: Callable) -> Self {
        self.symbols.insert(symbol.to_string(), callable);
        self
    }

    /// Shorthand for exporting the implementation symbol
    pub fn call(self, callable: Callable) -> Self {
        self.symbol(IMPLEMENTATION, callable)
    }
}

/// Shared identity and symbols that concrete plugins can extend
#[derive(Debug, Clone, Default)]
pub struct AbstractBase {
    unit: CodeUnit,
}

impl AbstractBase {
    pub fn unit(&self) -> &CodeUnit {
        &self.unit
    }
}

#[derive(Debug, Clone)]
pub struct PluginDefinition {
    unit: CodeUnit,
    is_abstract: bool,
    base: Option<AbstractBase>,
}

impl PluginDefinition {
    pub fn new(unit: CodeUnit) -> Self {
        PluginDefinition {
            unit,
            is_abstract: false,
            base: None,
        }
    }

    /// Mark the definition abstract; it skips every check
    pub fn is_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn extends(mut self, base: &AbstractBase) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Own declarations over the base's
    fn merged_unit(&self) -> CodeUnit {
        let Some(base) = &self.base else {
            return self.unit.clone();
        };
        let own = &self.unit;
        let mut symbols = base.unit.symbols.clone();
        symbols.extend(own.symbols.iter().map(|(k, v)| (k.clone(), v.clone())));
        CodeUnit {
            interface: own.interface.clone().or_else(|| base.unit.interface.clone()),
            family: own.family.clone().or_else(|| base.unit.family.clone()),
            name: own.name.clone().or_else(|| base.unit.name.clone()),
            docstring: own.docstring.clone().or_else(|| base.unit.docstring.clone()),
            symbols,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DefinedPlugin {
    Abstract(AbstractBase),
    Concrete(WrappedPlugin),
}

impl DefinedPlugin {
    pub fn into_concrete(self) -> Option<WrappedPlugin> {
        match self {
            DefinedPlugin::Concrete(plugin) => Some(plugin),
            DefinedPlugin::Abstract(_) => None,
        }
    }
}

/// Check a definition against the catalog and wrap its implementation
pub fn define(
    definition: PluginDefinition,
    catalog: &InterfaceCatalog,
) -> Result<DefinedPlugin, PluginDefinitionError> {
    let unit = definition.merged_unit();
    if definition.is_abstract {
        return Ok(DefinedPlugin::Abstract(AbstractBase { unit }));
    }

    let label = unit
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "<unnamed>".to_string());
    let identity = |field: &str, value: &Option<String>| -> Result<String, PluginDefinitionError> {
        value
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PluginDefinitionError::MissingIdentity {
                field: field.to_string(),
                plugin: label.clone(),
            })
    };
    let interface = identity("interface", &unit.interface)?;
    let family = identity("family", &unit.family)?;
    let name = identity("name", &unit.name)?;

    if unit.symbols.contains_key(ENTRY_POINT) {
        return Err(PluginDefinitionError::EntryPointOverride { plugin: name });
    }

    let Some(interface_def) = catalog.get(&interface) else {
        return Err(PluginDefinitionError::UnknownInterface {
            interface,
            plugin: name,
        });
    };
    if interface_def.interface_type != InterfaceType::Code {
        return Err(PluginDefinitionError::NotCodeInterface {
            interface,
            plugin: name,
        });
    }

    let Some(implementation) = unit.symbols.get(IMPLEMENTATION) else {
        return Err(PluginDefinitionError::MissingImplementation { plugin: name });
    };

    let Some(contract) = interface_def.family_contract(&family) else {
        return Err(PluginDefinitionError::UnknownFamily {
            interface,
            family,
            plugin: name,
        });
    };
    contract
        .check(&implementation.signature)
        .map_err(|reason| PluginDefinitionError::SignatureMismatch {
            plugin: name.clone(),
            family: family.clone(),
            reason,
        })?;

    debug!(
        "Defined plugin {}.{} '{}' with signature {}",
        interface, family, name, implementation.signature
    );

    Ok(DefinedPlugin::Concrete(WrappedPlugin {
        interface: Arc::from(interface.as_str()),
        family: Arc::from(family.as_str()),
        name: Arc::from(name.as_str()),
        docstring: Arc::from(unit.docstring.as_deref().unwrap_or_default()),
        implementation: implementation.clone(),
        hooks: Arc::clone(&interface_def.hooks),
    }))
}

/// Uniform call interface of wrapped plugins
pub trait Invoke: Send + Sync {
    /// Signature of the implementation, fixed at definition time
    fn signature(&self) -> &Signature;

    fn invoke(&self, payload: Payload, args: CallArgs) -> Result<Value, InvokeError>;
}

/// A concrete plugin with its pipeline installed
#[derive(Clone)]
pub struct WrappedPlugin {
    interface: Arc<str>,
    family: Arc<str>,
    name: Arc<str>,
    docstring: Arc<str>,
    implementation: Callable,
    hooks: Arc<dyn InterfaceHooks>,
}

impl WrappedPlugin {
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn docstring(&self) -> &str {
        &self.docstring
    }
}

impl fmt::Debug for WrappedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedPlugin")
            .field("interface", &self.interface)
            .field("family", &self.family)
            .field("name", &self.name)
            .field("signature", &self.implementation.signature.to_string())
            .finish_non_exhaustive()
    }
}

impl Invoke for WrappedPlugin {
    fn signature(&self) -> &Signature {
        &self.implementation.signature
    }

    /// `pre -> call -> post`; a `NoData` payload goes straight to `call`
    fn invoke(&self, payload: Payload, args: CallArgs) -> Result<Value, InvokeError> {
        let args = self.implementation.signature.bind(&self.name, &payload, &args)?;
        let call = &self.implementation.func;

        let Payload::Data(data) = payload else {
            trace!("Invoking '{}' without payload", self.name);
            return call(Payload::NoData, &args);
        };

        trace!("Invoking '{}' through {} hooks", self.name, self.interface);
        let data = self.hooks.pre(data, &args)?;
        let result = call(Payload::Data(data), &args)?;
        self.hooks.post(result, &args)
    }
}
