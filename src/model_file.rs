//! One namespace's declarations plus its import table.

use indexmap::IndexMap;

use crate::error::{ConcertoError, ConcertoResult};
use crate::introspect::{ClassDeclaration, TypeRef};
use crate::metamodel::{Import, Model};
use crate::model_manager::ModelManager;
use crate::model_util;

/// The declarations of a single namespace. Owned by a
/// [`ModelManager`](crate::ModelManager) and replaced whole on update.
#[derive(Debug, Clone)]
pub struct ModelFile {
    namespace: String,
    ast: Model,
    declarations: Vec<ClassDeclaration>,
    local_types: IndexMap<String, usize>,
    /// imported short name -> source FQN
    imported_types: IndexMap<String, String>,
    /// wildcard-imported namespaces, in declaration order
    imported_namespaces: Vec<String>,
    external: bool,
    concerto_version: Option<String>,
}

impl ModelFile {
    pub(crate) fn from_ast(model: &Model, external: bool) -> ConcertoResult<Self> {
        if model.namespace.is_empty() {
            return Err(ConcertoError::illegal_model(
                "A model file must declare exactly one namespace",
            ));
        }

        let declarations: Vec<ClassDeclaration> = model
            .declarations
            .iter()
            .map(|d| ClassDeclaration::from_ast(&model.namespace, d))
            .collect();

        let mut local_types = IndexMap::new();
        for (index, declaration) in declarations.iter().enumerate() {
            if local_types
                .insert(declaration.name().to_string(), index)
                .is_some()
            {
                return Err(ConcertoError::illegal_model(format!(
                    "Duplicate declaration {} in namespace {}",
                    declaration.name(),
                    model.namespace
                )));
            }
        }

        // every non-root file can use the five root names without an
        // explicit import
        let mut imported_types = IndexMap::new();
        if model.namespace != model_util::RESERVED_NAMESPACE {
            for root_name in model_util::ROOT_TYPE_NAMES {
                imported_types.insert(
                    root_name.to_string(),
                    model_util::get_fully_qualified_name(model_util::RESERVED_NAMESPACE, root_name),
                );
            }
        }
        let mut imported_namespaces = Vec::new();
        for import in &model.imports {
            match import {
                Import::Type {
                    namespace, name, ..
                } => {
                    imported_types.insert(
                        name.clone(),
                        model_util::get_fully_qualified_name(namespace, name),
                    );
                }
                Import::All { namespace, .. } => {
                    imported_namespaces.push(namespace.clone());
                }
            }
        }

        Ok(ModelFile {
            namespace: model.namespace.clone(),
            declarations,
            local_types,
            imported_types,
            imported_namespaces,
            external,
            concerto_version: model.concerto_version.clone(),
            ast: model.clone(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn concerto_version(&self) -> Option<&str> {
        self.concerto_version.as_deref()
    }

    pub fn ast(&self) -> &Model {
        &self.ast
    }

    pub fn imports(&self) -> &[Import] {
        &self.ast.imports
    }

    pub fn declarations(&self) -> &[ClassDeclaration] {
        &self.declarations
    }

    pub fn get_local_type(&self, name: &str) -> Option<&ClassDeclaration> {
        self.local_types
            .get(name)
            .map(|&index| &self.declarations[index])
    }

    /// Resolves a short name used inside this file to a canonical FQN (or
    /// the primitive name itself).
    ///
    /// Order: primitive, local declaration, named import, wildcard imports
    /// in declaration order.
    pub fn resolve_type_name(
        &self,
        manager: &ModelManager,
        name: &str,
    ) -> ConcertoResult<String> {
        if model_util::is_primitive(name) {
            return Ok(name.to_string());
        }
        if self.local_types.contains_key(name) {
            return Ok(model_util::get_fully_qualified_name(&self.namespace, name));
        }
        if let Some(fqn) = self.imported_types.get(name) {
            return Ok(fqn.clone());
        }
        for wildcard in &self.imported_namespaces {
            if let Some(file) = manager.get_model_file(wildcard) {
                if file.get_local_type(name).is_some() {
                    return Ok(model_util::get_fully_qualified_name(wildcard, name));
                }
            }
        }
        Err(ConcertoError::illegal_model(format!(
            "Undeclared type \"{}\" in namespace \"{}\"",
            name, self.namespace
        )))
    }

    /// Resolves a declared type reference. Qualified references are checked
    /// against the manager; short names go through [`Self::resolve_type_name`].
    pub fn resolve_type_ref(
        &self,
        manager: &ModelManager,
        type_ref: &TypeRef,
    ) -> ConcertoResult<String> {
        if type_ref.is_primitive() {
            return Ok(type_ref.name.clone());
        }
        match &type_ref.namespace {
            Some(namespace) => {
                let fqn = model_util::get_fully_qualified_name(namespace, &type_ref.name);
                manager.get_type(&fqn).map_err(|_| {
                    ConcertoError::illegal_model(format!(
                        "Undeclared type \"{}\" in namespace \"{}\"",
                        fqn, self.namespace
                    ))
                })?;
                Ok(fqn)
            }
            None => self.resolve_type_name(manager, &type_ref.name),
        }
    }

    /// Import satisfiability plus per-declaration validation.
    pub(crate) fn validate(&self, manager: &ModelManager) -> ConcertoResult<()> {
        for import in self.imports() {
            let namespace = import.namespace();
            let file = manager.get_model_file(namespace).ok_or_else(|| {
                ConcertoError::illegal_model(format!(
                    "Namespace {} imported by {} has not been loaded",
                    namespace, self.namespace
                ))
            })?;
            if let Import::Type { name, .. } = import {
                if file.get_local_type(name).is_none() {
                    return Err(ConcertoError::illegal_model(format!(
                        "Type {} imported by {} does not exist in namespace {}",
                        name, self.namespace, namespace
                    )));
                }
            }
        }

        if let Some(range) = &self.concerto_version {
            let requirement = semver::VersionReq::parse(range).map_err(|e| {
                ConcertoError::illegal_model(format!(
                    "Invalid concertoVersion range \"{}\" in namespace {}: {}",
                    range, self.namespace, e
                ))
            })?;
            let current = semver::Version::parse(env!("CARGO_PKG_VERSION")).map_err(|e| {
                ConcertoError::illegal_model(format!("Invalid implementation version: {}", e))
            })?;
            if !requirement.matches(&current) {
                return Err(ConcertoError::illegal_model(format!(
                    "Namespace {} requires Concerto version {} but this is {}",
                    self.namespace, range, current
                )));
            }
        }

        for declaration in &self.declarations {
            declaration.validate(manager)?;
        }
        Ok(())
    }

    /// A copy of the AST with every short type reference rewritten to its
    /// canonical namespace-qualified form.
    pub(crate) fn resolved_ast(&self, manager: &ModelManager) -> ConcertoResult<Model> {
        use crate::metamodel::{Declaration, Property, TypeIdentifier};

        let qualify = |identifier: &TypeIdentifier| -> ConcertoResult<TypeIdentifier> {
            let type_ref = TypeRef::from_ast(identifier);
            let fqn = self.resolve_type_ref(manager, &type_ref)?;
            if model_util::is_primitive(&fqn) {
                return Ok(identifier.clone());
            }
            Ok(TypeIdentifier::qualified(
                model_util::get_namespace(&fqn),
                model_util::get_short_name(&fqn),
            ))
        };

        let mut ast = self.ast.clone();
        for declaration in &mut ast.declarations {
            match declaration {
                Declaration::Asset {
                    super_type,
                    properties,
                    ..
                }
                | Declaration::Participant {
                    super_type,
                    properties,
                    ..
                }
                | Declaration::Transaction {
                    super_type,
                    properties,
                    ..
                }
                | Declaration::Event {
                    super_type,
                    properties,
                    ..
                }
                | Declaration::Concept {
                    super_type,
                    properties,
                    ..
                } => {
                    if let Some(identifier) = super_type {
                        *identifier = qualify(identifier)?;
                    }
                    for property in properties {
                        match property {
                            Property::Object {
                                type_identifier, ..
                            }
                            | Property::Relationship {
                                type_identifier, ..
                            } => {
                                *type_identifier = qualify(type_identifier)?;
                            }
                            _ => {}
                        }
                    }
                }
                Declaration::Enum { .. } => {}
            }
        }
        Ok(ast)
    }
}
