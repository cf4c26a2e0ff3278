//! The registry of all model files and the root for cross-file resolution.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::error::{ConcertoError, ConcertoResult};
use crate::introspect::{ClassDeclaration, Validator};
use crate::metamodel::{self, Model, Models};
use crate::model_file::ModelFile;
use crate::model_util;

/// Fetches the text of an externally hosted model. HTTP (or any other
/// transport) is the caller's concern; errors are propagated unchanged and
/// abort the whole update.
pub trait ModelFileDownloader {
    fn download_external_model(&self, uri: &str) -> ConcertoResult<String>;
}

type Snapshot = (IndexMap<String, ModelFile>, HashMap<String, Regex>);

/// Registry of [`ModelFile`]s keyed by namespace. Installs the `concerto`
/// root model at construction and keeps the declaration graph validated
/// across adds, updates and deletes. Failed mutations restore the previous
/// snapshot atomically.
pub struct ModelManager {
    model_files: IndexMap<String, ModelFile>,
    /// Pre-compiled string validator regexes, keyed by `/pattern/flags`.
    regex_cache: HashMap<String, Regex>,
}

impl ModelManager {
    pub fn new() -> ConcertoResult<Self> {
        let root = metamodel::root_model();
        let file = ModelFile::from_ast(&root, false)?;
        let mut model_files = IndexMap::new();
        model_files.insert(root.namespace.clone(), file);
        let mut manager = ModelManager {
            model_files,
            regex_cache: HashMap::new(),
        };
        manager.revalidate()?;
        Ok(manager)
    }

    pub fn get_model_file(&self, namespace: &str) -> Option<&ModelFile> {
        self.model_files.get(namespace)
    }

    pub(crate) fn require_model_file(&self, namespace: &str) -> ConcertoResult<&ModelFile> {
        self.model_files.get(namespace).ok_or_else(|| {
            ConcertoError::illegal_model(format!("Namespace {} has not been loaded", namespace))
        })
    }

    pub fn get_namespaces(&self) -> Vec<&str> {
        self.model_files.keys().map(String::as_str).collect()
    }

    pub fn get_model_files(&self) -> impl Iterator<Item = &ModelFile> {
        self.model_files.values()
    }

    /// Every declaration of every loaded file, in registry order.
    pub fn iter_declarations(&self) -> impl Iterator<Item = &ClassDeclaration> {
        self.model_files
            .values()
            .flat_map(|file| file.declarations().iter())
    }

    /// Looks a declaration up by fully qualified name.
    pub fn get_type(&self, fqn: &str) -> ConcertoResult<&ClassDeclaration> {
        let namespace = model_util::get_namespace(fqn);
        let short_name = model_util::get_short_name(fqn);
        self.model_files
            .get(namespace)
            .and_then(|file| file.get_local_type(short_name))
            .ok_or_else(|| ConcertoError::TypeNotFound {
                type_name: fqn.to_string(),
            })
    }

    /// Returns the canonical FQN for a type name, or fails with an
    /// illegal-model error naming `context`.
    pub fn resolve_type(&self, context: &str, type_name: &str) -> ConcertoResult<String> {
        if model_util::is_primitive(type_name) {
            return Ok(type_name.to_string());
        }
        let namespace = model_util::get_namespace(type_name);
        if namespace.is_empty() {
            return Err(ConcertoError::illegal_model(format!(
                "No namespace for type {} in {}",
                type_name, context
            )));
        }
        let file = self.model_files.get(namespace).ok_or_else(|| {
            ConcertoError::illegal_model(format!(
                "No registered namespace for type {} in {}",
                type_name, context
            ))
        })?;
        let short_name = model_util::get_short_name(type_name);
        if file.get_local_type(short_name).is_none() {
            return Err(ConcertoError::illegal_model(format!(
                "No type {} in namespace {} for {}",
                short_name, namespace, context
            )));
        }
        Ok(type_name.to_string())
    }

    /// True iff `a` equals `b` or `b` is on `a`'s super-type chain.
    pub fn derives_from(&self, a: &str, b: &str) -> ConcertoResult<bool> {
        if a == b {
            return Ok(true);
        }
        let declaration = self.get_type(a)?;
        for ancestor in declaration.get_all_super_type_declarations(self)? {
            if ancestor.get_fully_qualified_name() == b {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Adds one model file. Rejects a duplicate namespace. Unless
    /// `skip_validation` is set, the whole graph is revalidated and the add
    /// is rolled back on failure.
    pub fn add_model(&mut self, model: &Model, skip_validation: bool) -> ConcertoResult<()> {
        self.assert_not_reserved(&model.namespace)?;
        if self.model_files.contains_key(&model.namespace) {
            return Err(ConcertoError::illegal_model(format!(
                "Namespace {} already exists in the model manager",
                model.namespace
            )));
        }
        let file = ModelFile::from_ast(model, false)?;
        let snapshot = self.snapshot();
        self.model_files.insert(model.namespace.clone(), file);
        if !skip_validation {
            if let Err(error) = self.revalidate() {
                self.restore(snapshot);
                return Err(error);
            }
        }
        debug!(namespace = %model.namespace, "added model file");
        Ok(())
    }

    /// Parses a metamodel AST from JSON text and adds it. This is the
    /// entry point fed by the external `.cto` parser.
    pub fn add_model_json(&mut self, json: &str) -> ConcertoResult<()> {
        let model: Model = serde_json::from_str(json)?;
        self.add_model(&model, false)
    }

    /// All-or-nothing batch add: validation is deferred to the end and the
    /// pre-batch snapshot is restored when anything fails.
    pub fn add_models(&mut self, models: &[Model]) -> ConcertoResult<()> {
        let snapshot = self.snapshot();
        let result = self.add_models_inner(models);
        if let Err(error) = result {
            self.restore(snapshot);
            return Err(error);
        }
        Ok(())
    }

    fn add_models_inner(&mut self, models: &[Model]) -> ConcertoResult<()> {
        for model in models {
            self.assert_not_reserved(&model.namespace)?;
            if self.model_files.contains_key(&model.namespace) {
                return Err(ConcertoError::illegal_model(format!(
                    "Namespace {} already exists in the model manager",
                    model.namespace
                )));
            }
            let file = ModelFile::from_ast(model, false)?;
            self.model_files.insert(model.namespace.clone(), file);
        }
        self.revalidate()?;
        debug!(count = models.len(), "added model files");
        Ok(())
    }

    /// Replaces an existing namespace. Fails with not-found when absent.
    pub fn update_model(&mut self, model: &Model) -> ConcertoResult<()> {
        self.assert_not_reserved(&model.namespace)?;
        if !self.model_files.contains_key(&model.namespace) {
            return Err(ConcertoError::illegal_model(format!(
                "Model file for namespace {} not found",
                model.namespace
            )));
        }
        let external = self.model_files[&model.namespace].is_external();
        let file = ModelFile::from_ast(model, external)?;
        let snapshot = self.snapshot();
        self.model_files.insert(model.namespace.clone(), file);
        if let Err(error) = self.revalidate() {
            self.restore(snapshot);
            return Err(error);
        }
        debug!(namespace = %model.namespace, "updated model file");
        Ok(())
    }

    /// Removes one namespace. Fails when absent.
    pub fn delete_model_file(&mut self, namespace: &str) -> ConcertoResult<()> {
        self.assert_not_reserved(namespace)?;
        if self.model_files.shift_remove(namespace).is_none() {
            return Err(ConcertoError::illegal_model(format!(
                "Model file for namespace {} not found",
                namespace
            )));
        }
        debug!(namespace = %namespace, "deleted model file");
        Ok(())
    }

    /// Reinstates only the root model.
    pub fn clear_model_files(&mut self) {
        self.model_files
            .retain(|namespace, _| namespace == model_util::RESERVED_NAMESPACE);
        self.regex_cache.clear();
        debug!("cleared model files");
    }

    /// Downloads every import that names an external URI, adds or updates
    /// the fetched namespaces (flagged external), then revalidates the
    /// whole graph. Any error rolls the manager back. Returns the
    /// namespaces that were written.
    pub fn update_external_models(
        &mut self,
        downloader: &dyn ModelFileDownloader,
    ) -> ConcertoResult<Vec<String>> {
        let snapshot = self.snapshot();
        match self.update_external_models_inner(downloader) {
            Ok(namespaces) => Ok(namespaces),
            Err(error) => {
                self.restore(snapshot);
                Err(error)
            }
        }
    }

    fn update_external_models_inner(
        &mut self,
        downloader: &dyn ModelFileDownloader,
    ) -> ConcertoResult<Vec<String>> {
        let mut pending: VecDeque<String> = VecDeque::new();
        for file in self.model_files.values() {
            for import in file.imports() {
                if let Some(uri) = import.uri() {
                    pending.push_back(uri.to_string());
                }
            }
        }

        let mut processed: HashSet<String> = HashSet::new();
        let mut updated = Vec::new();
        while let Some(uri) = pending.pop_front() {
            if !processed.insert(uri.clone()) {
                continue;
            }
            debug!(uri = %uri, "downloading external model");
            let text = downloader.download_external_model(&uri)?;
            let model: Model = serde_json::from_str(&text)?;
            self.assert_not_reserved(&model.namespace)?;
            let file = ModelFile::from_ast(&model, true)?;
            // the downloaded file may itself import further external models
            for import in file.imports() {
                if let Some(transitive) = import.uri() {
                    pending.push_back(transitive.to_string());
                }
            }
            self.model_files.insert(model.namespace.clone(), file);
            updated.push(model.namespace);
        }
        self.revalidate()?;
        Ok(updated)
    }

    /// Emits the union AST of every user namespace. With `resolve`, short
    /// type references are rewritten to their canonical qualified form.
    pub fn get_ast(&self, resolve: bool) -> ConcertoResult<Models> {
        let mut models = Vec::new();
        for file in self.model_files.values() {
            if file.namespace() == model_util::RESERVED_NAMESPACE {
                continue;
            }
            if resolve {
                models.push(file.resolved_ast(self)?);
            } else {
                models.push(file.ast().clone());
            }
        }
        Ok(Models {
            class: format!("{}.Models", metamodel::METAMODEL_NAMESPACE),
            models,
        })
    }

    /// Replaces the current contents with the namespaces of a union AST.
    pub fn from_ast(&mut self, models: &Models) -> ConcertoResult<()> {
        let snapshot = self.snapshot();
        self.clear_model_files();
        if let Err(error) = self.add_models_inner(&models.models) {
            self.restore(snapshot);
            return Err(error);
        }
        Ok(())
    }

    /// The pre-compiled regex for a string validator, when the graph has
    /// been validated with it.
    pub(crate) fn compiled_regex(&self, validator: &Validator) -> Option<&Regex> {
        match validator {
            Validator::StringRegex { pattern, flags } => {
                self.regex_cache.get(&regex_cache_key(pattern, flags))
            }
            _ => None,
        }
    }

    fn assert_not_reserved(&self, namespace: &str) -> ConcertoResult<()> {
        if namespace == model_util::RESERVED_NAMESPACE {
            return Err(ConcertoError::illegal_model(format!(
                "The namespace {} is reserved",
                model_util::RESERVED_NAMESPACE
            )));
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        (self.model_files.clone(), self.regex_cache.clone())
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.model_files = snapshot.0;
        self.regex_cache = snapshot.1;
    }

    /// Validates every loaded file against the full namespace set, then
    /// rebuilds the validator regex cache.
    fn revalidate(&mut self) -> ConcertoResult<()> {
        for file in self.model_files.values() {
            file.validate(self)?;
        }
        let mut cache = HashMap::new();
        for declaration in self.iter_declarations() {
            for property in declaration.get_own_properties() {
                if let Some(validator) = &property.validator {
                    if let Validator::StringRegex { pattern, flags } = validator {
                        let key = regex_cache_key(pattern, flags);
                        if !cache.contains_key(&key) {
                            cache.insert(key, validator.compile_regex()?);
                        }
                    }
                }
            }
        }
        self.regex_cache = cache;
        Ok(())
    }
}

fn regex_cache_key(pattern: &str, flags: &str) -> String {
    format!("/{}/{}", pattern, flags)
}
