//! Known interfaces and their family contracts

use crate::hooks::{IdentityHooks, InterfaceHooks, OutputListHooks};
use crate::signature::Signature;
use plugix_registry::InterfaceType;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How plugins of an interface are keyed in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    /// Plain plugin name
    Flat,
    /// `(source_name, plugin_name)`
    SourceAndName,
}

/// A keyword argument a family requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedRequirement {
    Plain(Arc<str>),
    /// Must also carry a default value
    WithDefault(Arc<str>),
}

impl NamedRequirement {
    pub fn name(&self) -> &str {
        match self {
            NamedRequirement::Plain(name) | NamedRequirement::WithDefault(name) => name,
        }
    }
}

/// Required call shape of one family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyContract {
    pub family_name: Arc<str>,
    pub required_positional: Vec<Arc<str>>,
    pub required_named: Vec<NamedRequirement>,
}

impl FamilyContract {
    /// Family with no call requirements (all declarative families)
    pub fn open(family_name: &str) -> Self {
        FamilyContract {
            family_name: Arc::from(family_name),
            required_positional: Vec::new(),
            required_named: Vec::new(),
        }
    }

    pub fn positional(mut self, names: &[&str]) -> Self {
        self.required_positional = names.iter().map(|n| Arc::from(*n)).collect();
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.required_named
            .push(NamedRequirement::Plain(Arc::from(name)));
        self
    }

    pub fn named_with_default(mut self, name: &str) -> Self {
        self.required_named
            .push(NamedRequirement::WithDefault(Arc::from(name)));
        self
    }

    /// Check a captured signature; the error names the first mismatch
    pub fn check(&self, signature: &Signature) -> Result<(), String> {
        let positional: Vec<&str> = signature.positional().map(|p| &*p.name).collect();
        for (i, required) in self.required_positional.iter().enumerate() {
            match positional.get(i) {
                Some(found) if *found == &**required => {}
                Some(found) => {
                    return Err(format!(
                        "positional argument {} must be '{}', found '{}'",
                        i + 1,
                        required,
                        found
                    ))
                }
                None => {
                    return Err(format!(
                        "missing positional argument {} '{}'",
                        i + 1,
                        required
                    ))
                }
            }
        }

        for requirement in &self.required_named {
            let Some(param) = signature.find(requirement.name()) else {
                return Err(format!(
                    "missing keyword argument '{}'",
                    requirement.name()
                ));
            };
            if matches!(requirement, NamedRequirement::WithDefault(_)) && !param.has_default() {
                return Err(format!(
                    "keyword argument '{}' must have a default",
                    requirement.name()
                ));
            }
        }
        Ok(())
    }
}

/// One entry of the interface catalog
#[derive(Debug, Clone)]
pub struct InterfaceDefinition {
    pub name: Arc<str>,
    pub interface_type: InterfaceType,
    pub key_shape: KeyShape,
    pub families: BTreeMap<Arc<str>, FamilyContract>,
    pub hooks: Arc<dyn InterfaceHooks>,
    /// Interface holding the defaults documents this interface may reference
    pub defaults_interface: Option<Arc<str>>,
}

impl InterfaceDefinition {
    pub fn new(name: &str, interface_type: InterfaceType) -> Self {
        InterfaceDefinition {
            name: Arc::from(name),
            interface_type,
            key_shape: KeyShape::Flat,
            families: BTreeMap::new(),
            hooks: Arc::new(IdentityHooks),
            defaults_interface: None,
        }
    }

    pub fn keyed_by_source(mut self) -> Self {
        self.key_shape = KeyShape::SourceAndName;
        self
    }

    pub fn family(mut self, contract: FamilyContract) -> Self {
        self.families
            .insert(Arc::clone(&contract.family_name), contract);
        self
    }

    /// Declarative families, which carry no call requirements
    pub fn open_families(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.family(FamilyContract::open(name));
        }
        self
    }

    pub fn hooks(mut self, hooks: impl InterfaceHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn defaults_from(mut self, interface: &str) -> Self {
        self.defaults_interface = Some(Arc::from(interface));
        self
    }

    pub fn family_contract(&self, family: &str) -> Option<&FamilyContract> {
        self.families.get(family)
    }
}

/// The set of interfaces plugins may declare
#[derive(Debug, Clone, Default)]
pub struct InterfaceCatalog {
    interfaces: BTreeMap<Arc<str>, InterfaceDefinition>,
}

impl InterfaceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: InterfaceDefinition) -> &mut Self {
        self.interfaces
            .insert(Arc::clone(&definition.name), definition);
        self
    }

    pub fn with(mut self, definition: InterfaceDefinition) -> Self {
        self.register(definition);
        self
    }

    pub fn get(&self, name: &str) -> Option<&InterfaceDefinition> {
        self.interfaces.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Interface names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.interfaces.keys().map(|name| &**name).collect()
    }

    pub fn of_type(&self, interface_type: InterfaceType) -> impl Iterator<Item = &InterfaceDefinition> {
        self.interfaces
            .values()
            .filter(move |definition| definition.interface_type == interface_type)
    }

    /// Interfaces shipped with plugix
    pub fn standard() -> Self {
        use InterfaceType::{Code, Declarative};

        let sector_family = "list_xarray_list_variables_to_area_def_out_fnames";
        let product_families = [
            "list",
            "algorithm",
            "algorithm_colormapper",
            "interpolator",
            "interpolator_algorithm",
            "interpolator_algorithm_colormapper",
            "algorithm_interpolator_colormapper",
            "unsectored_xarray_dict_to_algorithm_to_output_format",
            "xarray_dict_to_output_format",
        ];

        InterfaceCatalog::new()
            // code-defined
            .with(
                InterfaceDefinition::new("readers", Code).family(
                    FamilyContract::open("standard")
                        .positional(&["fnames"])
                        .named_with_default("metadata_only")
                        .named_with_default("chans")
                        .named_with_default("area_def"),
                ),
            )
            .with(
                InterfaceDefinition::new("algorithms", Code)
                    .family(FamilyContract::open("list_numpy_to_numpy").positional(&["arrays"]))
                    .family(FamilyContract::open("xarray_to_numpy").positional(&["xobj"]))
                    .family(FamilyContract::open("xarray_to_xarray").positional(&["xobj"]))
                    .family(
                        FamilyContract::open("xarray_dict_to_xarray").positional(&["xarray_dict"]),
                    )
                    .family(
                        FamilyContract::open("xarray_dict_area_def_to_numpy")
                            .positional(&["xarray_dict", "area_def"]),
                    ),
            )
            .with(
                InterfaceDefinition::new("colormappers", Code)
                    .family(FamilyContract::open("matplotlib").named_with_default("data_range")),
            )
            .with(
                InterfaceDefinition::new("coverage_checkers", Code).family(
                    FamilyContract::open("standard").positional(&["xarray_obj", "variable_name"]),
                ),
            )
            .with(
                InterfaceDefinition::new("filename_formatters", Code).family(
                    FamilyContract::open("standard")
                        .positional(&["area_def", "xarray_obj", "product_name"])
                        .named_with_default("output_type"),
                ),
            )
            .with(
                InterfaceDefinition::new("interpolators", Code).family(
                    FamilyContract::open("2d")
                        .positional(&["area_def", "input_xarray", "output_xarray", "varlist"]),
                ),
            )
            .with(
                InterfaceDefinition::new("output_formatters", Code)
                    .family(
                        FamilyContract::open("image")
                            .positional(&["area_def", "xarray_obj", "product_name", "output_fnames"]),
                    )
                    .family(
                        FamilyContract::open("xarray_data")
                            .positional(&["xarray_obj", "product_names", "output_fnames"]),
                    )
                    .hooks(OutputListHooks),
            )
            .with(
                InterfaceDefinition::new("procflows", Code).family(
                    FamilyContract::open("standard")
                        .positional(&["fnames"])
                        .named("command_line_args"),
                ),
            )
            .with(
                InterfaceDefinition::new("sector_adjusters", Code)
                    .family(FamilyContract::open(sector_family).positional(&["xarray_objs", "area_def", "variables"])),
            )
            .with(
                InterfaceDefinition::new("sector_metadata_generators", Code)
                    .family(FamilyContract::open("area_def_to_metadata").positional(&["area_def"])),
            )
            .with(
                InterfaceDefinition::new("sector_spec_generators", Code)
                    .family(FamilyContract::open("area_definition").named("area_id")),
            )
            .with(
                InterfaceDefinition::new("title_formatters", Code).family(
                    FamilyContract::open("standard")
                        .positional(&["area_def", "xarray_obj", "product_name_title"]),
                ),
            )
            // declarative
            .with(
                InterfaceDefinition::new("products", Declarative)
                    .keyed_by_source()
                    .open_families(&product_families)
                    .defaults_from("product_defaults"),
            )
            .with(InterfaceDefinition::new("product_defaults", Declarative).open_families(&product_families))
            .with(
                InterfaceDefinition::new("sectors", Declarative)
                    .open_families(&["area_definition_static", "generated"]),
            )
            .with(InterfaceDefinition::new("feature_annotators", Declarative).open_families(&["cartopy"]))
            .with(InterfaceDefinition::new("gridline_annotators", Declarative).open_families(&["cartopy"]))
            .with(InterfaceDefinition::new("workflows", Declarative).open_families(&["order_based"]))
    }
}
