//! Construction of fresh typed instances consistent with a declaration.

use chrono::{SubsecRound, Utc};
use uuid::Uuid;

use crate::error::{ConcertoError, ConcertoResult};
use crate::generator::{GenerationMode, GeneratorOptions, InstanceGenerator};
use crate::instance::{Instance, Relationship, Value};
use crate::introspect::{ClassDeclaration, DeclarationKind};
use crate::model_manager::ModelManager;
use crate::model_util;

/// Flags controlling instance construction.
#[derive(Debug, Clone, Default)]
pub struct InstanceOptions {
    /// When set, every property is filled by the instance generator.
    pub generate: Option<GenerationMode>,
    /// Also fill optional properties during generation.
    pub include_optional_fields: bool,
    /// Fail instead of synthesizing an identifier when none is supplied.
    pub disable_generated_id: bool,
    /// Accept an empty string as identifier.
    pub allow_empty_id: bool,
    /// Do not stamp `$timestamp` on transactions and events.
    pub disable_timestamp: bool,
    /// Property values applied after construction.
    pub initial_values: Vec<(String, Value)>,
}

/// Creates typed instances and relationships from declarations held by a
/// [`ModelManager`].
pub struct Factory<'m> {
    manager: &'m ModelManager,
}

impl<'m> Factory<'m> {
    pub fn new(manager: &'m ModelManager) -> Self {
        Factory { manager }
    }

    pub fn model_manager(&self) -> &'m ModelManager {
        self.manager
    }

    /// Creates an identifiable instance (asset or participant). A missing
    /// identifier is synthesized unless `disable_generated_id` is set.
    pub fn new_resource(
        &self,
        namespace: &str,
        type_name: &str,
        identifier: Option<&str>,
        options: &InstanceOptions,
    ) -> ConcertoResult<Instance> {
        let declaration = self.get_declaration(namespace, type_name)?;
        if !declaration.is_identifiable() {
            return Err(ConcertoError::model_violation(format!(
                "{} is a {} and cannot be created as a resource",
                declaration.get_fully_qualified_name(),
                declaration.kind().label()
            )));
        }
        let mut instance = self.create_instance(declaration, options)?;
        self.apply_identifier(&mut instance, identifier, options)?;
        self.apply_initial_values(&mut instance, options);
        Ok(instance)
    }

    /// Creates a concept instance. Concepts carry no identifier.
    pub fn new_concept(
        &self,
        namespace: &str,
        type_name: &str,
        options: &InstanceOptions,
    ) -> ConcertoResult<Instance> {
        let declaration = self.get_declaration(namespace, type_name)?;
        if declaration.kind() != DeclarationKind::Concept {
            return Err(ConcertoError::model_violation(format!(
                "{} is a {}, not a concept",
                declaration.get_fully_qualified_name(),
                declaration.kind().label()
            )));
        }
        let mut instance = self.create_instance(declaration, options)?;
        self.apply_initial_values(&mut instance, options);
        Ok(instance)
    }

    /// Creates a transaction. A random identifier is synthesized when none
    /// is supplied and `$timestamp` is stamped unless suppressed.
    pub fn new_transaction(
        &self,
        namespace: &str,
        type_name: &str,
        identifier: Option<&str>,
        options: &InstanceOptions,
    ) -> ConcertoResult<Instance> {
        self.new_timestamped(DeclarationKind::Transaction, namespace, type_name, identifier, options)
    }

    /// Creates an event; same identifier and timestamp treatment as
    /// transactions.
    pub fn new_event(
        &self,
        namespace: &str,
        type_name: &str,
        identifier: Option<&str>,
        options: &InstanceOptions,
    ) -> ConcertoResult<Instance> {
        self.new_timestamped(DeclarationKind::Event, namespace, type_name, identifier, options)
    }

    /// Creates a typed reference to an identifiable declaration.
    pub fn new_relationship(
        &self,
        namespace: &str,
        type_name: &str,
        identifier: &str,
    ) -> ConcertoResult<Relationship> {
        let declaration = self.get_declaration(namespace, type_name)?;
        if !declaration.is_identifiable() {
            return Err(ConcertoError::model_violation(format!(
                "Cannot create a relationship to {}: a {} is not identifiable",
                declaration.get_fully_qualified_name(),
                declaration.kind().label()
            )));
        }
        Ok(Relationship::new(
            declaration.get_fully_qualified_name(),
            identifier,
        ))
    }

    fn new_timestamped(
        &self,
        kind: DeclarationKind,
        namespace: &str,
        type_name: &str,
        identifier: Option<&str>,
        options: &InstanceOptions,
    ) -> ConcertoResult<Instance> {
        let declaration = self.get_declaration(namespace, type_name)?;
        if declaration.kind() != kind {
            return Err(ConcertoError::model_violation(format!(
                "{} is a {}, not a {}",
                declaration.get_fully_qualified_name(),
                declaration.kind().label(),
                kind.label()
            )));
        }
        let mut instance = self.create_instance(declaration, options)?;
        let generated;
        let identifier = match identifier {
            Some(id) => id,
            None => {
                generated = Uuid::new_v4().to_string();
                generated.as_str()
            }
        };
        self.set_identifier(&mut instance, identifier)?;
        if !options.disable_timestamp {
            instance.set_property(
                model_util::SYSTEM_TIMESTAMP,
                Value::DateTime(Utc::now().trunc_subsecs(3).fixed_offset()),
            );
        }
        self.apply_initial_values(&mut instance, options);
        Ok(instance)
    }

    fn get_declaration(
        &self,
        namespace: &str,
        type_name: &str,
    ) -> ConcertoResult<&'m ClassDeclaration> {
        let fqn = model_util::get_fully_qualified_name(namespace, type_name);
        self.manager.get_type(&fqn)
    }

    /// Abstract declarations cannot be instantiated directly; with a
    /// generation mode the concrete-subclass picker takes over inside the
    /// generator.
    fn create_instance(
        &self,
        declaration: &'m ClassDeclaration,
        options: &InstanceOptions,
    ) -> ConcertoResult<Instance> {
        match options.generate {
            Some(mode) => {
                let generator = InstanceGenerator::new(
                    self.manager,
                    GeneratorOptions {
                        mode,
                        include_optional_fields: options.include_optional_fields,
                    },
                );
                generator.generate(declaration)
            }
            None => {
                if declaration.is_abstract() {
                    return Err(ConcertoError::model_violation(format!(
                        "Cannot instantiate the abstract type {}",
                        declaration.get_fully_qualified_name()
                    )));
                }
                Ok(Instance::new(declaration.get_fully_qualified_name()))
            }
        }
    }

    fn apply_identifier(
        &self,
        instance: &mut Instance,
        identifier: Option<&str>,
        options: &InstanceOptions,
    ) -> ConcertoResult<()> {
        let generated;
        let identifier = match identifier {
            Some(id) => id,
            None if options.disable_generated_id => {
                return Err(ConcertoError::model_violation(format!(
                    "Missing identifier for {}",
                    instance.class_name()
                )))
            }
            None => {
                generated = Uuid::new_v4().to_string();
                generated.as_str()
            }
        };
        if identifier.is_empty() && !options.allow_empty_id {
            return Err(ConcertoError::model_violation(format!(
                "Invalid or missing identifier for {}",
                instance.class_name()
            )));
        }
        self.set_identifier(instance, identifier)
    }

    /// Writes the identifier into the declaration's identifier field and
    /// keeps the `$identifier` alias in sync.
    fn set_identifier(&self, instance: &mut Instance, identifier: &str) -> ConcertoResult<()> {
        let declaration = self.manager.get_type(instance.class_name())?;
        let field = declaration
            .identifier_field_name(self.manager)?
            .ok_or_else(|| {
                ConcertoError::model_violation(format!(
                    "{} has no identifier field",
                    instance.class_name()
                ))
            })?;
        instance.set_property(field.clone(), Value::String(identifier.to_string()));
        if field != model_util::SYSTEM_IDENTIFIER {
            instance.set_property(
                model_util::SYSTEM_IDENTIFIER,
                Value::String(identifier.to_string()),
            );
        }
        Ok(())
    }

    fn apply_initial_values(&self, instance: &mut Instance, options: &InstanceOptions) {
        for (name, value) in &options.initial_values {
            instance.set_property(name.clone(), value.clone());
        }
    }
}
