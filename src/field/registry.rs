//! Name-keyed construction of boundary patch fields.
//!
//! Physics code registers extra variants with [`PatchFieldRegistry::register`];
//! the built-in variants are available from [`PatchFieldRegistry::with_builtin`].

use super::coupled::CoupledPatchField;
use super::fixed_gradient::FixedGradientPatchField;
use super::fixed_value::FixedValuePatchField;
use super::mixed::MixedPatchField;
use super::patch_field::PatchField;
use crate::fv_error::FvError;
use crate::topology::PatchDescriptor;
use crate::types::{FieldValue, Scalar};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Configuration of one patch field, as read from a case dictionary.
///
/// ```json
/// { "type": "mixed", "refValue": 1.0, "refGradient": 0.0, "valueFraction": 0.5 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchFieldSpec<T> {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_value: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_gradient: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_fraction: Option<Scalar>,
}

impl<T> PatchFieldSpec<T> {
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: None,
            gradient: None,
            ref_value: None,
            ref_gradient: None,
            value_fraction: None,
        }
    }

    pub fn fixed_value(value: T) -> Self {
        Self {
            value: Some(value),
            ..Self::of_type("fixedValue")
        }
    }

    pub fn fixed_gradient(gradient: T) -> Self {
        Self {
            gradient: Some(gradient),
            ..Self::of_type("fixedGradient")
        }
    }

    pub fn zero_gradient() -> Self {
        Self::of_type("zeroGradient")
    }

    pub fn mixed(ref_value: T, ref_gradient: T, value_fraction: Scalar) -> Self {
        Self {
            ref_value: Some(ref_value),
            ref_gradient: Some(ref_gradient),
            value_fraction: Some(value_fraction),
            ..Self::of_type("mixed")
        }
    }

    pub fn coupled() -> Self {
        Self::of_type("coupled")
    }
}

/// Which patch kinds a variant may be attached to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PatchRequirement {
    Uncoupled,
    Coupled,
}

impl PatchRequirement {
    fn describe(self) -> &'static str {
        match self {
            PatchRequirement::Uncoupled => "uncoupled",
            PatchRequirement::Coupled => "coupled",
        }
    }
}

pub type PatchFieldCtor<T> =
    Box<dyn Fn(&PatchDescriptor, &PatchFieldSpec<T>) -> Result<Box<dyn PatchField<T>>, FvError> + Send + Sync>;

struct Entry<T> {
    requirement: PatchRequirement,
    ctor: PatchFieldCtor<T>,
}

pub struct PatchFieldRegistry<T> {
    entries: HashMap<String, Entry<T>>,
}

impl<T> Default for PatchFieldRegistry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

fn required<T: Copy>(entry: &'static str, type_name: &str, v: Option<T>) -> Result<T, FvError> {
    v.ok_or_else(|| FvError::InvalidConfiguration {
        entry: entry.to_string(),
        reason: format!("required by patch field type '{type_name}'"),
    })
}

impl<T: FieldValue> PatchFieldRegistry<T> {
    /// Registry holding `fixedValue`, `fixedGradient`, `zeroGradient`,
    /// `mixed` and `coupled`.
    pub fn with_builtin() -> Self {
        let mut reg = Self::default();
        reg.register("fixedValue", PatchRequirement::Uncoupled, |patch, spec| {
            let v = required("value", &spec.type_name, spec.value)?;
            Ok(Box::new(FixedValuePatchField::uniform(v, patch.size())))
        });
        reg.register("fixedGradient", PatchRequirement::Uncoupled, |patch, spec| {
            let g = required("gradient", &spec.type_name, spec.gradient)?;
            Ok(Box::new(FixedGradientPatchField::new(vec![g; patch.size()])))
        });
        reg.register("zeroGradient", PatchRequirement::Uncoupled, |patch, _| {
            Ok(Box::new(FixedGradientPatchField::zero_gradient(patch.size())))
        });
        reg.register("mixed", PatchRequirement::Uncoupled, |patch, spec| {
            let n = patch.size();
            let r = required("refValue", &spec.type_name, spec.ref_value)?;
            let g = spec.ref_gradient.unwrap_or_else(T::zero);
            let f = required("valueFraction", &spec.type_name, spec.value_fraction)?;
            if !(0.0..=1.0).contains(&f) {
                return Err(FvError::InvalidConfiguration {
                    entry: "valueFraction".into(),
                    reason: format!("{f} is outside [0, 1]"),
                });
            }
            Ok(Box::new(MixedPatchField::new(vec![r; n], vec![g; n], vec![f; n])?))
        });
        reg.register("coupled", PatchRequirement::Coupled, |patch, _| {
            Ok(Box::new(CoupledPatchField::new(patch.size())))
        });
        reg
    }

    /// Add or replace a constructor under `name`.
    pub fn register<F>(&mut self, name: &str, requirement: PatchRequirement, ctor: F)
    where
        F: Fn(&PatchDescriptor, &PatchFieldSpec<T>) -> Result<Box<dyn PatchField<T>>, FvError>
            + Send
            + Sync
            + 'static,
    {
        self.entries.insert(
            name.to_string(),
            Entry {
                requirement,
                ctor: Box::new(ctor),
            },
        );
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Construct the patch field described by `spec` on `patch` of `field`.
    ///
    /// # Errors
    /// `UnknownName` for an unregistered type, `PatchKindMismatch` when the
    /// variant's coupling requirement disagrees with the patch, and any error
    /// the constructor reports.
    pub fn construct(
        &self,
        field: &str,
        patch: &PatchDescriptor,
        spec: &PatchFieldSpec<T>,
    ) -> Result<Box<dyn PatchField<T>>, FvError> {
        let entry = self.entries.get(&spec.type_name).ok_or_else(|| FvError::UnknownName {
            family: "patchField type",
            name: spec.type_name.clone(),
            context: format!(" for patch '{}' of field '{field}'", patch.name()),
            valid: self.names(),
        })?;
        let wants_coupled = entry.requirement == PatchRequirement::Coupled;
        if wants_coupled != patch.is_coupled() {
            return Err(FvError::PatchKindMismatch {
                field: field.to_string(),
                patch: patch.name().to_string(),
                patch_field_type: spec.type_name.clone(),
                required: entry.requirement.describe(),
                found: patch.coupling().name(),
            });
        }
        let pf = (entry.ctor)(patch, spec)?;
        if pf.values().len() != patch.size() {
            return Err(FvError::size_mismatch(
                format!("patch field '{}' on patch '{}'", spec.type_name, patch.name()),
                patch.size(),
                pf.values().len(),
            ));
        }
        Ok(pf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fv_error::ErrorKind;
    use crate::topology::CouplingKind;
    use crate::types::Vector;

    #[test]
    fn unknown_type_lists_registered_names() {
        let reg = PatchFieldRegistry::<Scalar>::with_builtin();
        let patch = PatchDescriptor::wall("inlet", 4, 2);
        let err = reg
            .construct("T", &patch, &PatchFieldSpec::of_type("fixedValu"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let msg = err.to_string();
        assert!(msg.contains("fixedValu"));
        assert!(msg.contains("coupled, fixedGradient, fixedValue, mixed, zeroGradient"));
    }

    #[test]
    fn coupled_variant_on_wall_is_rejected() {
        let reg = PatchFieldRegistry::<Scalar>::with_builtin();
        let patch = PatchDescriptor::wall("wall", 4, 2);
        let err = reg.construct("T", &patch, &PatchFieldSpec::coupled()).unwrap_err();
        assert!(matches!(err, FvError::PatchKindMismatch { required: "coupled", .. }));
    }

    #[test]
    fn uncoupled_variant_on_processor_patch_is_rejected() {
        let reg = PatchFieldRegistry::<Scalar>::with_builtin();
        let patch = PatchDescriptor::new(
            "procBoundary0to1",
            4,
            2,
            CouplingKind::Processor {
                neighbour_rank: 1,
                tag: 0,
            },
        );
        let err = reg
            .construct("T", &patch, &PatchFieldSpec::fixed_value(1.0))
            .unwrap_err();
        assert!(matches!(err, FvError::PatchKindMismatch { found: "processor", .. }));
    }

    #[test]
    fn spec_parses_from_json() {
        let spec: PatchFieldSpec<Vector> =
            serde_json::from_str(r#"{ "type": "fixedValue", "value": [1.0, 0.0, 0.0] }"#).unwrap();
        assert_eq!(spec, PatchFieldSpec::fixed_value(Vector::new(1.0, 0.0, 0.0)));

        let mixed: PatchFieldSpec<Scalar> =
            serde_json::from_str(r#"{ "type": "mixed", "refValue": 2.0, "valueFraction": 0.25 }"#).unwrap();
        let reg = PatchFieldRegistry::with_builtin();
        let pf = reg.construct("T", &PatchDescriptor::wall("w", 0, 3), &mixed).unwrap();
        assert_eq!(pf.type_name(), "mixed");
        assert_eq!(pf.values().len(), 3);
    }

    #[test]
    fn missing_entry_is_a_configuration_error() {
        let reg = PatchFieldRegistry::<Scalar>::with_builtin();
        let err = reg
            .construct("T", &PatchDescriptor::wall("w", 0, 1), &PatchFieldSpec::of_type("fixedValue"))
            .unwrap_err();
        assert!(matches!(err, FvError::InvalidConfiguration { ref entry, .. } if entry == "value"));
    }
}
