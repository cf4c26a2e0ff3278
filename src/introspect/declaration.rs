//! Class declarations and their validation pipeline.

use std::collections::HashSet;

use crate::error::{ConcertoError, ConcertoResult};
use crate::introspect::property::{Decorator, Property, PropertyKind, TypeRef};
use crate::introspect::{OwnedProperty, PrimitiveKind, ResolvedType};
use crate::metamodel;
use crate::model_manager::ModelManager;
use crate::model_util;

fn root_type_name(kind: DeclarationKind) -> &'static str {
    match kind {
        DeclarationKind::Asset => "Asset",
        DeclarationKind::Participant => "Participant",
        DeclarationKind::Transaction => "Transaction",
        DeclarationKind::Event => "Event",
        DeclarationKind::Concept | DeclarationKind::Enum => "Concept",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Asset,
    Participant,
    Transaction,
    Event,
    Concept,
    Enum,
}

impl DeclarationKind {
    /// Assets, participants, transactions and events carry an identifier.
    pub fn is_identifiable(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Asset
                | DeclarationKind::Participant
                | DeclarationKind::Transaction
                | DeclarationKind::Event
        )
    }

    /// Transactions and events carry a `$timestamp`.
    pub fn has_timestamp(&self) -> bool {
        matches!(self, DeclarationKind::Transaction | DeclarationKind::Event)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeclarationKind::Asset => "asset",
            DeclarationKind::Participant => "participant",
            DeclarationKind::Transaction => "transaction",
            DeclarationKind::Event => "event",
            DeclarationKind::Concept => "concept",
            DeclarationKind::Enum => "enum",
        }
    }
}

/// One typed entity of a model file. Immutable after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDeclaration {
    kind: DeclarationKind,
    namespace: String,
    name: String,
    is_abstract: bool,
    super_type: Option<TypeRef>,
    identified_by: Option<String>,
    properties: Vec<Property>,
    decorators: Vec<Decorator>,
}

impl ClassDeclaration {
    pub(crate) fn from_ast(namespace: &str, declaration: &metamodel::Declaration) -> Self {
        use metamodel::Declaration as Ast;
        match declaration {
            Ast::Asset {
                name,
                is_abstract,
                identified_by,
                super_type,
                properties,
                decorators,
            } => Self::from_class_parts(
                DeclarationKind::Asset,
                namespace,
                name,
                *is_abstract,
                identified_by,
                super_type,
                properties,
                decorators,
            ),
            Ast::Participant {
                name,
                is_abstract,
                identified_by,
                super_type,
                properties,
                decorators,
            } => Self::from_class_parts(
                DeclarationKind::Participant,
                namespace,
                name,
                *is_abstract,
                identified_by,
                super_type,
                properties,
                decorators,
            ),
            Ast::Transaction {
                name,
                is_abstract,
                identified_by,
                super_type,
                properties,
                decorators,
            } => Self::from_class_parts(
                DeclarationKind::Transaction,
                namespace,
                name,
                *is_abstract,
                identified_by,
                super_type,
                properties,
                decorators,
            ),
            Ast::Event {
                name,
                is_abstract,
                identified_by,
                super_type,
                properties,
                decorators,
            } => Self::from_class_parts(
                DeclarationKind::Event,
                namespace,
                name,
                *is_abstract,
                identified_by,
                super_type,
                properties,
                decorators,
            ),
            Ast::Concept {
                name,
                is_abstract,
                super_type,
                properties,
                decorators,
            } => Self::from_class_parts(
                DeclarationKind::Concept,
                namespace,
                name,
                *is_abstract,
                &None,
                super_type,
                properties,
                decorators,
            ),
            Ast::Enum {
                name,
                properties,
                decorators,
            } => ClassDeclaration {
                kind: DeclarationKind::Enum,
                namespace: namespace.to_string(),
                name: name.clone(),
                is_abstract: false,
                super_type: None,
                identified_by: None,
                properties: properties.iter().map(Property::enum_value_from_ast).collect(),
                decorators: Decorator::from_ast_list(decorators),
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn from_class_parts(
        kind: DeclarationKind,
        namespace: &str,
        name: &str,
        is_abstract: bool,
        identified_by: &Option<String>,
        super_type: &Option<metamodel::TypeIdentifier>,
        properties: &[metamodel::Property],
        decorators: &Option<Vec<metamodel::Decorator>>,
    ) -> Self {
        // outside the root namespace, a declaration with no `extends`
        // implicitly extends its root kind, inheriting $identifier (and
        // $timestamp for transactions and events)
        let super_type = match super_type {
            Some(identifier) => Some(TypeRef::from_ast(identifier)),
            None if namespace != model_util::RESERVED_NAMESPACE => Some(TypeRef {
                name: root_type_name(kind).to_string(),
                namespace: Some(model_util::RESERVED_NAMESPACE.to_string()),
            }),
            None => None,
        };
        ClassDeclaration {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            is_abstract,
            super_type,
            identified_by: identified_by.clone(),
            properties: properties.iter().map(Property::from_ast).collect(),
            decorators: Decorator::from_ast_list(decorators),
        }
    }

    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_enum(&self) -> bool {
        self.kind == DeclarationKind::Enum
    }

    pub fn is_identifiable(&self) -> bool {
        self.kind.is_identifiable()
    }

    pub fn get_fully_qualified_name(&self) -> String {
        model_util::get_fully_qualified_name(&self.namespace, &self.name)
    }

    pub fn super_type(&self) -> Option<&TypeRef> {
        self.super_type.as_ref()
    }

    /// The `identified by` clause as written on this declaration.
    pub fn identified_by(&self) -> Option<&str> {
        self.identified_by.as_deref()
    }

    pub fn decorators(&self) -> &[Decorator] {
        &self.decorators
    }

    pub fn get_own_properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn get_own_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The names of this enum's values, in declaration order.
    pub fn enum_values(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|p| p.is_enum_value())
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Resolves this declaration's super type to its canonical FQN.
    pub fn super_type_fqn(&self, manager: &ModelManager) -> ConcertoResult<Option<String>> {
        match &self.super_type {
            None => Ok(None),
            Some(type_ref) => {
                let file = manager.require_model_file(&self.namespace)?;
                Ok(Some(file.resolve_type_ref(manager, type_ref)?))
            }
        }
    }

    /// Walks the super-type chain, nearest ancestor first. Fails on an
    /// unresolvable super type or a cycle.
    pub fn get_all_super_type_declarations<'m>(
        &self,
        manager: &'m ModelManager,
    ) -> ConcertoResult<Vec<&'m ClassDeclaration>> {
        let mut ancestors = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(self.get_fully_qualified_name());
        let mut next = self.super_type_fqn(manager)?;
        while let Some(fqn) = next {
            if !visited.insert(fqn.clone()) {
                return Err(ConcertoError::illegal_model(format!(
                    "The super-type chain of {} is circular at {}",
                    self.get_fully_qualified_name(),
                    fqn
                )));
            }
            let declaration = manager.get_type(&fqn).map_err(|_| {
                ConcertoError::illegal_model(format!(
                    "Could not find super type {} of {}",
                    fqn,
                    self.get_fully_qualified_name()
                ))
            })?;
            ancestors.push(declaration);
            next = declaration.super_type_fqn(manager)?;
        }
        Ok(ancestors)
    }

    /// All properties, inherited before own, oldest ancestor first.
    pub fn get_properties<'m>(
        &'m self,
        manager: &'m ModelManager,
    ) -> ConcertoResult<Vec<OwnedProperty<'m>>> {
        let mut properties = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let ancestors = self.get_all_super_type_declarations(manager)?;
        for owner in ancestors.iter().rev().copied().chain(std::iter::once(self)) {
            for property in owner.get_own_properties() {
                if seen.insert(property.name.as_str()) {
                    properties.push(OwnedProperty { owner, property });
                }
            }
        }
        Ok(properties)
    }

    /// Finds a property by name across the inherited set.
    pub fn get_property<'m>(
        &'m self,
        manager: &'m ModelManager,
        name: &str,
    ) -> ConcertoResult<Option<OwnedProperty<'m>>> {
        Ok(self
            .get_properties(manager)?
            .into_iter()
            .find(|p| p.property.name == name))
    }

    /// Descends a dotted path through object-typed fields. Fails when a
    /// segment is missing or when an intermediate segment is a primitive,
    /// an enum or a relationship.
    pub fn get_nested_property<'m>(
        &'m self,
        manager: &'m ModelManager,
        path: &str,
    ) -> ConcertoResult<OwnedProperty<'m>> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut declaration = self;
        for (index, segment) in segments.iter().enumerate() {
            let owned = declaration.get_property(manager, segment)?.ok_or_else(|| {
                ConcertoError::illegal_model(format!(
                    "Property {} does not exist on {}",
                    segment,
                    declaration.get_fully_qualified_name()
                ))
            })?;
            if index + 1 == segments.len() {
                return Ok(owned);
            }
            if !owned.property.is_field() {
                return Err(ConcertoError::illegal_model(format!(
                    "Property {} on {} is not an object field",
                    segment,
                    declaration.get_fully_qualified_name()
                )));
            }
            declaration = match owned.resolve_type(manager)? {
                ResolvedType::Declaration(target) if !target.is_enum() => target,
                _ => {
                    return Err(ConcertoError::illegal_model(format!(
                        "Property {} on {} is a primitive or enum and cannot be navigated",
                        segment,
                        declaration.get_fully_qualified_name()
                    )))
                }
            };
        }
        // split() always yields at least one segment
        Err(ConcertoError::illegal_model(format!(
            "Property path \"{}\" is empty",
            path
        )))
    }

    /// Resolves a property's declared type against this declaration's file.
    pub fn resolve_property_type<'m>(
        &self,
        manager: &'m ModelManager,
        property: &Property,
    ) -> ConcertoResult<ResolvedType<'m>> {
        let type_ref = property.type_ref().ok_or_else(|| {
            ConcertoError::illegal_model(format!(
                "Enum value \"{}\" has no declared type",
                property.name
            ))
        })?;
        if type_ref.is_primitive() {
            let kind = PrimitiveKind::from_name(&type_ref.name).ok_or_else(|| {
                ConcertoError::illegal_model(format!("Unknown primitive {}", type_ref.name))
            })?;
            return Ok(ResolvedType::Primitive(kind));
        }
        let file = manager.require_model_file(&self.namespace)?;
        let fqn = file.resolve_type_ref(manager, type_ref)?;
        if model_util::is_primitive(&fqn) {
            let kind = PrimitiveKind::from_name(&fqn).ok_or_else(|| {
                ConcertoError::illegal_model(format!("Unknown primitive {}", fqn))
            })?;
            return Ok(ResolvedType::Primitive(kind));
        }
        let declaration = manager.get_type(&fqn)?;
        Ok(ResolvedType::Declaration(declaration))
    }

    /// The name of this declaration's identifier field: the local
    /// `identified by` clause, or the nearest ancestor's.
    pub fn identifier_field_name(&self, manager: &ModelManager) -> ConcertoResult<Option<String>> {
        if let Some(field) = &self.identified_by {
            return Ok(Some(field.clone()));
        }
        for ancestor in self.get_all_super_type_declarations(manager)? {
            if let Some(field) = &ancestor.identified_by {
                return Ok(Some(field.clone()));
            }
        }
        Ok(None)
    }

    /// System-identified declarations inherit the `$identifier` field from a
    /// root type; explicitly identified ones name their own field.
    pub fn is_system_identified(&self, manager: &ModelManager) -> ConcertoResult<bool> {
        Ok(self.identifier_field_name(manager)?.as_deref()
            == Some(model_util::SYSTEM_IDENTIFIER))
    }

    /// This declaration plus every descendant reachable in the manager, in
    /// registry order.
    pub fn get_assignable_class_declarations<'m>(
        &self,
        manager: &'m ModelManager,
    ) -> ConcertoResult<Vec<&'m ClassDeclaration>> {
        let own_fqn = self.get_fully_qualified_name();
        let mut assignable = Vec::new();
        for candidate in manager.iter_declarations() {
            if manager.derives_from(&candidate.get_fully_qualified_name(), &own_fqn)? {
                assignable.push(candidate);
            }
        }
        Ok(assignable)
    }

    /// The validation pipeline. Order matters: super type, identifier,
    /// properties.
    pub(crate) fn validate(&self, manager: &ModelManager) -> ConcertoResult<()> {
        let fqn = self.get_fully_qualified_name();

        // 1. Super type: must resolve, must not cycle, and must stay within
        // this declaration's family.
        if self.super_type.is_some() {
            let super_fqn = self.super_type_fqn(manager)?.ok_or_else(|| {
                ConcertoError::illegal_model(format!("Unresolvable super type of {}", fqn))
            })?;
            if super_fqn == fqn {
                return Err(ConcertoError::illegal_model(format!(
                    "{} cannot extend itself",
                    fqn
                )));
            }
            let parent = manager.get_type(&super_fqn).map_err(|_| {
                ConcertoError::illegal_model(format!(
                    "Could not find super type {} of {}",
                    super_fqn, fqn
                ))
            })?;
            if parent.kind != self.kind {
                return Err(ConcertoError::illegal_model(format!(
                    "{} ({}) cannot extend {} ({})",
                    fqn,
                    self.kind.label(),
                    super_fqn,
                    parent.kind.label()
                )));
            }
        }
        let ancestors = self.get_all_super_type_declarations(manager)?;

        // 2. Identifier.
        if let Some(field) = &self.identified_by {
            if !self.kind.is_identifiable() {
                return Err(ConcertoError::illegal_model(format!(
                    "{} is a {} and cannot have an identifier",
                    fqn,
                    self.kind.label()
                )));
            }
            let property = self.get_own_property(field).ok_or_else(|| {
                ConcertoError::illegal_model(format!(
                    "The identifier field \"{}\" of {} is not declared locally",
                    field, fqn
                ))
            })?;
            if property.is_array || property.primitive_type() != Some("String") {
                return Err(ConcertoError::illegal_model(format!(
                    "The identifier field \"{}\" of {} must be a non-array String field",
                    field, fqn
                )));
            }
            // a subclass may not redeclare an ancestor's explicit identifier
            if let Some(ancestor) = ancestors.iter().find(|a| {
                a.identified_by.is_some() && a.namespace != model_util::RESERVED_NAMESPACE
            }) {
                return Err(ConcertoError::illegal_model(format!(
                    "{} cannot redeclare the identifier of its super type {}",
                    fqn,
                    ancestor.get_fully_qualified_name()
                )));
            }
        } else if self.kind.is_identifiable()
            && !self.is_abstract
            && self.identifier_field_name(manager)?.is_none()
        {
            return Err(ConcertoError::illegal_model(format!(
                "The {} {} has no identifier",
                self.kind.label(),
                fqn
            )));
        }

        // 3. Properties.
        let mut inherited: HashSet<&str> = HashSet::new();
        for ancestor in &ancestors {
            for property in ancestor.get_own_properties() {
                inherited.insert(property.name.as_str());
            }
        }
        let mut own: HashSet<&str> = HashSet::new();
        for property in &self.properties {
            if inherited.contains(property.name.as_str()) {
                return Err(ConcertoError::illegal_model(format!(
                    "{} redeclares the inherited property \"{}\"",
                    fqn, property.name
                )));
            }
            if !own.insert(property.name.as_str()) {
                return Err(ConcertoError::illegal_model(format!(
                    "{} declares the property \"{}\" more than once",
                    fqn, property.name
                )));
            }
            match &property.kind {
                PropertyKind::EnumValue => {
                    if self.kind != DeclarationKind::Enum {
                        return Err(ConcertoError::illegal_model(format!(
                            "{} is not an enum and cannot declare the enum value \"{}\"",
                            fqn, property.name
                        )));
                    }
                }
                PropertyKind::Field { .. } => {
                    if self.kind == DeclarationKind::Enum {
                        return Err(ConcertoError::illegal_model(format!(
                            "The enum {} can only declare enum values, found field \"{}\"",
                            fqn, property.name
                        )));
                    }
                    self.resolve_property_type(manager, property)?;
                }
                PropertyKind::Relationship { .. } => {
                    if self.kind == DeclarationKind::Enum {
                        return Err(ConcertoError::illegal_model(format!(
                            "The enum {} can only declare enum values, found relationship \"{}\"",
                            fqn, property.name
                        )));
                    }
                    match self.resolve_property_type(manager, property)? {
                        ResolvedType::Declaration(target) if target.is_identifiable() => {}
                        _ => {
                            return Err(ConcertoError::illegal_model(format!(
                                "The relationship \"{}\" of {} must reference an identifiable type",
                                property.name, fqn
                            )))
                        }
                    }
                }
            }
            if let Some(validator) = &property.validator {
                let context = format!("{}.{}", fqn, property.name);
                validator.check_well_formed(&context)?;
            }
        }
        Ok(())
    }
}
