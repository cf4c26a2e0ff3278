//! The metamodel abstract syntax tree.
//!
//! This is the data shape the external `.cto` parser produces and the shape
//! accepted by [`ModelManager::add_model_json`](crate::ModelManager). Nodes
//! are `$class`-tagged so that a serialized AST round-trips through
//! [`ModelManager::get_ast`](crate::ModelManager) and
//! [`ModelManager::from_ast`](crate::ModelManager).

use serde::{Deserialize, Serialize};

use crate::model_util;

pub const METAMODEL_NAMESPACE: &str = "concerto.metamodel";

fn models_class() -> String {
    format!("{}.Models", METAMODEL_NAMESPACE)
}

fn model_class() -> String {
    format!("{}.Model", METAMODEL_NAMESPACE)
}

fn type_identifier_class() -> String {
    format!("{}.TypeIdentifier", METAMODEL_NAMESPACE)
}

fn decorator_class() -> String {
    format!("{}.Decorator", METAMODEL_NAMESPACE)
}

fn enum_property_class() -> String {
    format!("{}.EnumProperty", METAMODEL_NAMESPACE)
}

/// The union AST: one node per loaded namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Models {
    #[serde(rename = "$class", default = "models_class")]
    pub class: String,
    pub models: Vec<Model>,
}

/// One namespace: imports plus declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "$class", default = "model_class")]
    pub class: String,
    pub namespace: String,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    #[serde(rename = "concertoVersion", skip_serializing_if = "Option::is_none")]
    pub concerto_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decorators: Option<Vec<Decorator>>,
}

impl Model {
    pub fn new(namespace: impl Into<String>) -> Self {
        Model {
            class: model_class(),
            namespace: namespace.into(),
            imports: Vec::new(),
            declarations: Vec::new(),
            concerto_version: None,
            decorators: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum Import {
    /// `import <namespace>.<name>`
    #[serde(rename = "concerto.metamodel.ImportType")]
    Type {
        namespace: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        uri: Option<String>,
    },
    /// `import <namespace>.*`
    #[serde(rename = "concerto.metamodel.ImportAll")]
    All {
        namespace: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        uri: Option<String>,
    },
}

impl Import {
    pub fn namespace(&self) -> &str {
        match self {
            Import::Type { namespace, .. } | Import::All { namespace, .. } => namespace,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match self {
            Import::Type { uri, .. } | Import::All { uri, .. } => uri.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeIdentifier {
    #[serde(rename = "$class", default = "type_identifier_class")]
    pub class: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl TypeIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        TypeIdentifier {
            class: type_identifier_class(),
            name: name.into(),
            namespace: None,
        }
    }

    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeIdentifier {
            class: type_identifier_class(),
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decorator {
    #[serde(rename = "$class", default = "decorator_class")]
    pub class: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<DecoratorArgument>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum DecoratorArgument {
    #[serde(rename = "concerto.metamodel.DecoratorString")]
    String { value: String },
    #[serde(rename = "concerto.metamodel.DecoratorNumber")]
    Number { value: f64 },
    #[serde(rename = "concerto.metamodel.DecoratorBoolean")]
    Boolean { value: bool },
    #[serde(rename = "concerto.metamodel.DecoratorTypeReference")]
    TypeReference {
        #[serde(rename = "type")]
        type_identifier: TypeIdentifier,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum Declaration {
    #[serde(rename = "concerto.metamodel.AssetDeclaration")]
    Asset {
        name: String,
        #[serde(rename = "isAbstract", default)]
        is_abstract: bool,
        #[serde(rename = "identifiedBy", skip_serializing_if = "Option::is_none")]
        identified_by: Option<String>,
        #[serde(rename = "superType", skip_serializing_if = "Option::is_none")]
        super_type: Option<TypeIdentifier>,
        #[serde(default)]
        properties: Vec<Property>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.ParticipantDeclaration")]
    Participant {
        name: String,
        #[serde(rename = "isAbstract", default)]
        is_abstract: bool,
        #[serde(rename = "identifiedBy", skip_serializing_if = "Option::is_none")]
        identified_by: Option<String>,
        #[serde(rename = "superType", skip_serializing_if = "Option::is_none")]
        super_type: Option<TypeIdentifier>,
        #[serde(default)]
        properties: Vec<Property>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.TransactionDeclaration")]
    Transaction {
        name: String,
        #[serde(rename = "isAbstract", default)]
        is_abstract: bool,
        #[serde(rename = "identifiedBy", skip_serializing_if = "Option::is_none")]
        identified_by: Option<String>,
        #[serde(rename = "superType", skip_serializing_if = "Option::is_none")]
        super_type: Option<TypeIdentifier>,
        #[serde(default)]
        properties: Vec<Property>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.EventDeclaration")]
    Event {
        name: String,
        #[serde(rename = "isAbstract", default)]
        is_abstract: bool,
        #[serde(rename = "identifiedBy", skip_serializing_if = "Option::is_none")]
        identified_by: Option<String>,
        #[serde(rename = "superType", skip_serializing_if = "Option::is_none")]
        super_type: Option<TypeIdentifier>,
        #[serde(default)]
        properties: Vec<Property>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.ConceptDeclaration")]
    Concept {
        name: String,
        #[serde(rename = "isAbstract", default)]
        is_abstract: bool,
        #[serde(rename = "superType", skip_serializing_if = "Option::is_none")]
        super_type: Option<TypeIdentifier>,
        #[serde(default)]
        properties: Vec<Property>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.EnumDeclaration")]
    Enum {
        name: String,
        #[serde(default)]
        properties: Vec<EnumProperty>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Asset { name, .. }
            | Declaration::Participant { name, .. }
            | Declaration::Transaction { name, .. }
            | Declaration::Event { name, .. }
            | Declaration::Concept { name, .. }
            | Declaration::Enum { name, .. } => name,
        }
    }
}

/// One enum value. Carries no type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumProperty {
    #[serde(rename = "$class", default = "enum_property_class")]
    pub class: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decorators: Option<Vec<Decorator>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum Property {
    #[serde(rename = "concerto.metamodel.StringProperty")]
    String {
        name: String,
        #[serde(rename = "isArray", default)]
        is_array: bool,
        #[serde(rename = "isOptional", default)]
        is_optional: bool,
        #[serde(rename = "defaultValue", skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        validator: Option<StringValidator>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.BooleanProperty")]
    Boolean {
        name: String,
        #[serde(rename = "isArray", default)]
        is_array: bool,
        #[serde(rename = "isOptional", default)]
        is_optional: bool,
        #[serde(rename = "defaultValue", skip_serializing_if = "Option::is_none")]
        default_value: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.DateTimeProperty")]
    DateTime {
        name: String,
        #[serde(rename = "isArray", default)]
        is_array: bool,
        #[serde(rename = "isOptional", default)]
        is_optional: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.DoubleProperty")]
    Double {
        name: String,
        #[serde(rename = "isArray", default)]
        is_array: bool,
        #[serde(rename = "isOptional", default)]
        is_optional: bool,
        #[serde(rename = "defaultValue", skip_serializing_if = "Option::is_none")]
        default_value: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        validator: Option<DoubleValidator>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.IntegerProperty")]
    Integer {
        name: String,
        #[serde(rename = "isArray", default)]
        is_array: bool,
        #[serde(rename = "isOptional", default)]
        is_optional: bool,
        #[serde(rename = "defaultValue", skip_serializing_if = "Option::is_none")]
        default_value: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        validator: Option<IntegerValidator>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.LongProperty")]
    Long {
        name: String,
        #[serde(rename = "isArray", default)]
        is_array: bool,
        #[serde(rename = "isOptional", default)]
        is_optional: bool,
        #[serde(rename = "defaultValue", skip_serializing_if = "Option::is_none")]
        default_value: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        validator: Option<LongValidator>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.ObjectProperty")]
    Object {
        name: String,
        #[serde(rename = "isArray", default)]
        is_array: bool,
        #[serde(rename = "isOptional", default)]
        is_optional: bool,
        #[serde(rename = "type")]
        type_identifier: TypeIdentifier,
        #[serde(rename = "defaultValue", skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
    #[serde(rename = "concerto.metamodel.RelationshipProperty")]
    Relationship {
        name: String,
        #[serde(rename = "isArray", default)]
        is_array: bool,
        #[serde(rename = "isOptional", default)]
        is_optional: bool,
        #[serde(rename = "type")]
        type_identifier: TypeIdentifier,
        #[serde(skip_serializing_if = "Option::is_none")]
        decorators: Option<Vec<Decorator>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum StringValidator {
    #[serde(rename = "concerto.metamodel.StringRegexValidator")]
    Regex {
        pattern: String,
        #[serde(default)]
        flags: String,
    },
    #[serde(rename = "concerto.metamodel.StringLengthValidator")]
    Length {
        #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
        min_length: Option<u32>,
        #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum IntegerValidator {
    #[serde(rename = "concerto.metamodel.IntegerDomainValidator")]
    Domain {
        #[serde(skip_serializing_if = "Option::is_none")]
        lower: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        upper: Option<i32>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum LongValidator {
    #[serde(rename = "concerto.metamodel.LongDomainValidator")]
    Domain {
        #[serde(skip_serializing_if = "Option::is_none")]
        lower: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        upper: Option<i64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum DoubleValidator {
    #[serde(rename = "concerto.metamodel.DoubleDomainValidator")]
    Domain {
        #[serde(skip_serializing_if = "Option::is_none")]
        lower: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        upper: Option<f64>,
    },
}

fn system_identifier_property() -> Property {
    Property::String {
        name: model_util::SYSTEM_IDENTIFIER.to_string(),
        is_array: false,
        is_optional: false,
        default_value: None,
        validator: None,
        decorators: None,
    }
}

fn system_timestamp_property() -> Property {
    Property::DateTime {
        name: model_util::SYSTEM_TIMESTAMP.to_string(),
        is_array: false,
        is_optional: false,
        decorators: None,
    }
}

/// The root model installed by every [`ModelManager`](crate::ModelManager)
/// at construction. User schemas depend on the five root names without a
/// file on disk.
pub fn root_model() -> Model {
    let mut model = Model::new(model_util::RESERVED_NAMESPACE);
    model.declarations = vec![
        Declaration::Concept {
            name: "Concept".to_string(),
            is_abstract: true,
            super_type: None,
            properties: vec![],
            decorators: None,
        },
        Declaration::Asset {
            name: "Asset".to_string(),
            is_abstract: true,
            identified_by: Some(model_util::SYSTEM_IDENTIFIER.to_string()),
            super_type: None,
            properties: vec![system_identifier_property()],
            decorators: None,
        },
        Declaration::Participant {
            name: "Participant".to_string(),
            is_abstract: true,
            identified_by: Some(model_util::SYSTEM_IDENTIFIER.to_string()),
            super_type: None,
            properties: vec![system_identifier_property()],
            decorators: None,
        },
        Declaration::Transaction {
            name: "Transaction".to_string(),
            is_abstract: true,
            identified_by: Some(model_util::SYSTEM_IDENTIFIER.to_string()),
            super_type: None,
            properties: vec![system_identifier_property(), system_timestamp_property()],
            decorators: None,
        },
        Declaration::Event {
            name: "Event".to_string(),
            is_abstract: true,
            identified_by: Some(model_util::SYSTEM_IDENTIFIER.to_string()),
            super_type: None,
            properties: vec![system_identifier_property(), system_timestamp_property()],
            decorators: None,
        },
    ];
    model
}
