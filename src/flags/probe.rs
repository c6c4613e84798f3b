//! Probes that derive flags from the shape of the target module.

use std::fmt;

use log::debug;

use crate::metadata::Module;

/// Flag set by [`FlagProbe::HostOs`] on Windows hosts.
pub const OS_WINDOWS: &str = "OS:Windows";
/// Flag set by [`FlagProbe::HostOs`] on every other host.
pub const OS_NOT_WINDOWS: &str = "OS:NotWindows";

/// One question asked of the target module, answered as one or two flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlagProbe {
    /// Sets `flag` if any referenced assembly name contains `marker`, and `complement`
    /// (if given) to the opposite value.
    Reference {
        /// Substring searched in the referenced assembly names
        marker: String,
        /// Flag set when the marker is found
        flag: String,
        /// Flag set when the marker is not found
        complement: Option<String>,
    },
    /// Sets `flag` if the type exists.
    TypeExists {
        /// Full type name, nested types separated by `/`
        type_name: String,
        /// Resulting flag
        flag: String,
    },
    /// Sets `flag` if the type does not exist.
    TypeMissing {
        /// Full type name, nested types separated by `/`
        type_name: String,
        /// Resulting flag
        flag: String,
    },
    /// Sets `flag` if the type lacks the field; a missing type lacks every field.
    FieldMissing {
        /// Full name of the declaring type
        type_name: String,
        /// Field name
        field: String,
        /// Resulting flag
        flag: String,
    },
    /// Sets `flag` if the first method called `method` takes exactly `count` parameters.
    MethodParamCount {
        /// Full name of the declaring type
        type_name: String,
        /// Method name
        method: String,
        /// Expected parameter count
        count: usize,
        /// Resulting flag
        flag: String,
    },
    /// Sets [`OS_WINDOWS`] and [`OS_NOT_WINDOWS`] from the host platform.
    HostOs,
}

impl FlagProbe {
    /// Probes for a referenced assembly.
    pub fn reference(marker: impl Into<String>, flag: impl Into<String>) -> Self {
        FlagProbe::Reference {
            marker: marker.into(),
            flag: flag.into(),
            complement: None,
        }
    }

    /// Probes for a referenced assembly, defining a complement flag as well.
    pub fn reference_or(
        marker: impl Into<String>,
        flag: impl Into<String>,
        complement: impl Into<String>,
    ) -> Self {
        FlagProbe::Reference {
            marker: marker.into(),
            flag: flag.into(),
            complement: Some(complement.into()),
        }
    }

    /// Probes for the existence of a type.
    pub fn type_exists(type_name: impl Into<String>, flag: impl Into<String>) -> Self {
        FlagProbe::TypeExists {
            type_name: type_name.into(),
            flag: flag.into(),
        }
    }

    /// Probes for the absence of a type.
    pub fn type_missing(type_name: impl Into<String>, flag: impl Into<String>) -> Self {
        FlagProbe::TypeMissing {
            type_name: type_name.into(),
            flag: flag.into(),
        }
    }

    /// Probes for the absence of a field.
    pub fn field_missing(
        type_name: impl Into<String>,
        field: impl Into<String>,
        flag: impl Into<String>,
    ) -> Self {
        FlagProbe::FieldMissing {
            type_name: type_name.into(),
            field: field.into(),
            flag: flag.into(),
        }
    }

    /// Probes the parameter count of a method.
    pub fn method_params(
        type_name: impl Into<String>,
        method: impl Into<String>,
        count: usize,
        flag: impl Into<String>,
    ) -> Self {
        FlagProbe::MethodParamCount {
            type_name: type_name.into(),
            method: method.into(),
            count,
            flag: flag.into(),
        }
    }

    /// Runs the probe and returns the flags it defines.
    #[must_use]
    pub fn evaluate(&self, module: &Module) -> Vec<(String, bool)> {
        let flags = match self {
            FlagProbe::Reference {
                marker,
                flag,
                complement,
            } => {
                let found = module.references_assembly(marker);
                let mut flags = vec![(flag.clone(), found)];
                if let Some(complement) = complement {
                    flags.push((complement.clone(), !found));
                }
                flags
            }
            FlagProbe::TypeExists { type_name, flag } => {
                vec![(flag.clone(), module.find_type(type_name).is_some())]
            }
            FlagProbe::TypeMissing { type_name, flag } => {
                vec![(flag.clone(), module.find_type(type_name).is_none())]
            }
            FlagProbe::FieldMissing {
                type_name,
                field,
                flag,
            } => {
                let missing = module
                    .find_type(type_name)
                    .and_then(|ty| ty.field(field))
                    .is_none();
                vec![(flag.clone(), missing)]
            }
            FlagProbe::MethodParamCount {
                type_name,
                method,
                count,
                flag,
            } => {
                let matches = module
                    .find_method(type_name, method)
                    .is_some_and(|m| m.signature.params.len() == *count);
                vec![(flag.clone(), matches)]
            }
            FlagProbe::HostOs => {
                let windows = cfg!(windows);
                vec![
                    (OS_WINDOWS.to_string(), windows),
                    (OS_NOT_WINDOWS.to_string(), !windows),
                ]
            }
        };

        for (name, value) in &flags {
            debug!("{self}: {name} = {value}");
        }
        flags
    }
}

impl fmt::Display for FlagProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagProbe::Reference { marker, .. } => write!(f, "reference '{marker}'"),
            FlagProbe::TypeExists { type_name, .. } => write!(f, "type {type_name} exists"),
            FlagProbe::TypeMissing { type_name, .. } => write!(f, "type {type_name} missing"),
            FlagProbe::FieldMissing {
                type_name, field, ..
            } => write!(f, "field {type_name}::{field} missing"),
            FlagProbe::MethodParamCount {
                type_name,
                method,
                count,
                ..
            } => write!(f, "{type_name}::{method} takes {count} parameters"),
            FlagProbe::HostOs => write!(f, "host os"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MethodDefBuilder, TypeDefBuilder, TypeRef};

    fn module() -> Module {
        let mut module = Module::new("Celeste.exe");
        module.add_assembly_ref("FNA", None);
        module.add_assembly_ref("mscorlib", None);

        let renderer = TypeDefBuilder::new("Celeste.CompleteRenderer")
            .build(&mut module)
            .unwrap();
        TypeDefBuilder::new("ImageLayer")
            .nested_in(renderer)
            .field("Scale", TypeRef::new("System.Single"))
            .build(&mut module)
            .unwrap();

        let input = TypeDefBuilder::new("Celeste.Input").build(&mut module).unwrap();
        MethodDefBuilder::new("GuiInputController")
            .static_method()
            .param(TypeRef::int32())
            .build(&mut module, input)
            .unwrap();
        module
    }

    #[test]
    fn test_reference_with_complement() {
        let module = module();
        let flags = FlagProbe::reference_or("FNA", "FNA", "XNA").evaluate(&module);
        assert_eq!(
            flags,
            vec![("FNA".to_string(), true), ("XNA".to_string(), false)]
        );

        let flags = FlagProbe::reference("Steamworks", "Steamworks").evaluate(&module);
        assert_eq!(flags, vec![("Steamworks".to_string(), false)]);
    }

    #[test]
    fn test_member_probes() {
        let module = module();
        let check = |probe: FlagProbe| probe.evaluate(&module)[0].1;

        assert!(check(FlagProbe::type_exists(
            "Celeste.CompleteRenderer/ImageLayer",
            "f"
        )));
        assert!(check(FlagProbe::type_missing(
            "Celeste.BirdTutorialGui/ButtonPrompt",
            "f"
        )));
        assert!(!check(FlagProbe::field_missing(
            "Celeste.CompleteRenderer/ImageLayer",
            "Scale",
            "f"
        )));
        assert!(check(FlagProbe::field_missing("Celeste.Nope", "Scale", "f")));
        assert!(check(FlagProbe::method_params(
            "Celeste.Input",
            "GuiInputController",
            1,
            "f"
        )));
        assert!(!check(FlagProbe::method_params(
            "Celeste.Input",
            "GuiInputController",
            0,
            "f"
        )));
    }

    #[test]
    fn test_host_os_is_exclusive() {
        let flags = FlagProbe::HostOs.evaluate(&Module::new("m"));
        assert_eq!(flags.len(), 2);
        assert_ne!(flags[0].1, flags[1].1);
        assert_eq!(flags[0].0, OS_WINDOWS);
    }
}
