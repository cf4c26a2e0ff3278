//! The validated declarations graph: class declarations, properties,
//! validators and decorators, linked by name across model files.
//!
//! The graph is built from the metamodel AST first and linked by name
//! during validation, so cyclic references between declarations never
//! produce physical pointer cycles.

mod declaration;
mod property;

pub use declaration::{ClassDeclaration, DeclarationKind};
pub use property::{Decorator, DecoratorValue, Property, PropertyKind, TypeRef, Validator};

use crate::error::{ConcertoError, ConcertoResult};
use crate::model_manager::ModelManager;

/// The six primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Boolean,
    DateTime,
    Double,
    Long,
    Integer,
}

impl PrimitiveKind {
    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        match name {
            "String" => Some(PrimitiveKind::String),
            "Boolean" => Some(PrimitiveKind::Boolean),
            "DateTime" => Some(PrimitiveKind::DateTime),
            "Double" => Some(PrimitiveKind::Double),
            "Long" => Some(PrimitiveKind::Long),
            "Integer" => Some(PrimitiveKind::Integer),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "String",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::DateTime => "DateTime",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Integer => "Integer",
        }
    }
}

/// A property's declared type after resolution.
pub enum ResolvedType<'m> {
    Primitive(PrimitiveKind),
    Declaration(&'m ClassDeclaration),
}

/// A property paired with the declaration that owns it. Short-name
/// resolution of the property's type goes through the owner's file, so
/// inherited properties resolve against the imports of the file that
/// declared them.
#[derive(Clone, Copy)]
pub struct OwnedProperty<'m> {
    pub owner: &'m ClassDeclaration,
    pub property: &'m Property,
}

impl<'m> OwnedProperty<'m> {
    pub fn name(&self) -> &str {
        &self.property.name
    }

    pub fn resolve_type(&self, manager: &'m ModelManager) -> ConcertoResult<ResolvedType<'m>> {
        self.owner.resolve_property_type(manager, self.property)
    }

    /// Resolves the target of a field or relationship to its canonical FQN.
    pub fn resolve_type_fqn(&self, manager: &ModelManager) -> ConcertoResult<String> {
        let type_ref = self.property.type_ref().ok_or_else(|| {
            ConcertoError::illegal_model(format!(
                "Enum value \"{}\" has no declared type",
                self.property.name
            ))
        })?;
        if type_ref.is_primitive() {
            return Ok(type_ref.name.clone());
        }
        let file = manager.require_model_file(self.owner.namespace())?;
        file.resolve_type_ref(manager, type_ref)
    }
}
