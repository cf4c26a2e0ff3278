//! Properties, validators and decorators of the declarations graph.

use regex::Regex;

use crate::error::{ConcertoError, ConcertoResult};
use crate::metamodel;
use crate::model_util;

/// A declared type reference: a short or qualified name, resolved lazily
/// through the owning file's import table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub namespace: Option<String>,
}

impl TypeRef {
    pub(crate) fn from_ast(identifier: &metamodel::TypeIdentifier) -> Self {
        TypeRef {
            name: identifier.name.clone(),
            namespace: identifier.namespace.clone(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.namespace.is_none() && model_util::is_primitive(&self.name)
    }

    /// The reference as written: `ns.Name` when qualified, `Name` otherwise.
    pub fn declared_name(&self) -> String {
        match &self.namespace {
            Some(ns) => model_util::get_fully_qualified_name(ns, &self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// A primitive, object or enum-typed field.
    Field { type_ref: TypeRef },
    /// A by-reference link to an identifiable declaration.
    Relationship { type_ref: TypeRef },
    /// One value of an enum declaration. Carries no type.
    EnumValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
    pub is_array: bool,
    pub is_optional: bool,
    pub default_value: Option<serde_json::Value>,
    pub validator: Option<Validator>,
    pub decorators: Vec<Decorator>,
}

impl Property {
    pub(crate) fn from_ast(property: &metamodel::Property) -> Self {
        use metamodel::Property as Ast;
        let (name, kind, is_array, is_optional, default_value, validator, decorators) =
            match property {
                Ast::String {
                    name,
                    is_array,
                    is_optional,
                    default_value,
                    validator,
                    decorators,
                } => (
                    name,
                    PropertyKind::Field {
                        type_ref: TypeRef {
                            name: "String".to_string(),
                            namespace: None,
                        },
                    },
                    *is_array,
                    *is_optional,
                    default_value.clone().map(serde_json::Value::from),
                    validator.as_ref().map(Validator::from_string_ast),
                    decorators,
                ),
                Ast::Boolean {
                    name,
                    is_array,
                    is_optional,
                    default_value,
                    decorators,
                } => (
                    name,
                    PropertyKind::Field {
                        type_ref: TypeRef {
                            name: "Boolean".to_string(),
                            namespace: None,
                        },
                    },
                    *is_array,
                    *is_optional,
                    default_value.map(serde_json::Value::from),
                    None,
                    decorators,
                ),
                Ast::DateTime {
                    name,
                    is_array,
                    is_optional,
                    decorators,
                } => (
                    name,
                    PropertyKind::Field {
                        type_ref: TypeRef {
                            name: "DateTime".to_string(),
                            namespace: None,
                        },
                    },
                    *is_array,
                    *is_optional,
                    None,
                    None,
                    decorators,
                ),
                Ast::Double {
                    name,
                    is_array,
                    is_optional,
                    default_value,
                    validator,
                    decorators,
                } => (
                    name,
                    PropertyKind::Field {
                        type_ref: TypeRef {
                            name: "Double".to_string(),
                            namespace: None,
                        },
                    },
                    *is_array,
                    *is_optional,
                    default_value.and_then(serde_json::Number::from_f64).map(serde_json::Value::Number),
                    validator.as_ref().map(Validator::from_double_ast),
                    decorators,
                ),
                Ast::Integer {
                    name,
                    is_array,
                    is_optional,
                    default_value,
                    validator,
                    decorators,
                } => (
                    name,
                    PropertyKind::Field {
                        type_ref: TypeRef {
                            name: "Integer".to_string(),
                            namespace: None,
                        },
                    },
                    *is_array,
                    *is_optional,
                    default_value.map(serde_json::Value::from),
                    validator.as_ref().map(Validator::from_integer_ast),
                    decorators,
                ),
                Ast::Long {
                    name,
                    is_array,
                    is_optional,
                    default_value,
                    validator,
                    decorators,
                } => (
                    name,
                    PropertyKind::Field {
                        type_ref: TypeRef {
                            name: "Long".to_string(),
                            namespace: None,
                        },
                    },
                    *is_array,
                    *is_optional,
                    default_value.map(serde_json::Value::from),
                    validator.as_ref().map(Validator::from_long_ast),
                    decorators,
                ),
                Ast::Object {
                    name,
                    is_array,
                    is_optional,
                    type_identifier,
                    default_value,
                    decorators,
                } => (
                    name,
                    PropertyKind::Field {
                        type_ref: TypeRef::from_ast(type_identifier),
                    },
                    *is_array,
                    *is_optional,
                    default_value.clone().map(serde_json::Value::from),
                    None,
                    decorators,
                ),
                Ast::Relationship {
                    name,
                    is_array,
                    is_optional,
                    type_identifier,
                    decorators,
                } => (
                    name,
                    PropertyKind::Relationship {
                        type_ref: TypeRef::from_ast(type_identifier),
                    },
                    *is_array,
                    *is_optional,
                    None,
                    None,
                    decorators,
                ),
            };
        Property {
            name: name.clone(),
            kind,
            is_array,
            is_optional,
            default_value,
            validator,
            decorators: Decorator::from_ast_list(decorators),
        }
    }

    pub(crate) fn enum_value_from_ast(property: &metamodel::EnumProperty) -> Self {
        Property {
            name: property.name.clone(),
            kind: PropertyKind::EnumValue,
            is_array: false,
            is_optional: false,
            default_value: None,
            validator: None,
            decorators: Decorator::from_ast_list(&property.decorators),
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, PropertyKind::Field { .. })
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, PropertyKind::Relationship { .. })
    }

    pub fn is_enum_value(&self) -> bool {
        matches!(self.kind, PropertyKind::EnumValue)
    }

    /// The declared type reference of a field or relationship.
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match &self.kind {
            PropertyKind::Field { type_ref } | PropertyKind::Relationship { type_ref } => {
                Some(type_ref)
            }
            PropertyKind::EnumValue => None,
        }
    }

    /// The primitive type name when this is a primitive field.
    pub fn primitive_type(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Field { type_ref } if type_ref.is_primitive() => {
                Some(type_ref.name.as_str())
            }
            _ => None,
        }
    }
}

/// An instance-level constraint attached to a primitive property.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    StringRegex { pattern: String, flags: String },
    StringLength { min: Option<u32>, max: Option<u32> },
    IntegerRange { lower: Option<i32>, upper: Option<i32> },
    LongRange { lower: Option<i64>, upper: Option<i64> },
    DoubleRange { lower: Option<f64>, upper: Option<f64> },
}

impl Validator {
    fn from_string_ast(validator: &metamodel::StringValidator) -> Self {
        match validator {
            metamodel::StringValidator::Regex { pattern, flags } => Validator::StringRegex {
                pattern: pattern.clone(),
                flags: flags.clone(),
            },
            metamodel::StringValidator::Length {
                min_length,
                max_length,
            } => Validator::StringLength {
                min: *min_length,
                max: *max_length,
            },
        }
    }

    fn from_integer_ast(validator: &metamodel::IntegerValidator) -> Self {
        match validator {
            metamodel::IntegerValidator::Domain { lower, upper } => Validator::IntegerRange {
                lower: *lower,
                upper: *upper,
            },
        }
    }

    fn from_long_ast(validator: &metamodel::LongValidator) -> Self {
        match validator {
            metamodel::LongValidator::Domain { lower, upper } => Validator::LongRange {
                lower: *lower,
                upper: *upper,
            },
        }
    }

    fn from_double_ast(validator: &metamodel::DoubleValidator) -> Self {
        match validator {
            metamodel::DoubleValidator::Domain { lower, upper } => Validator::DoubleRange {
                lower: *lower,
                upper: *upper,
            },
        }
    }

    /// Checks the validator is well formed: the pattern compiles, bounds are
    /// ordered. `context` names the declaration and property for messages.
    pub(crate) fn check_well_formed(&self, context: &str) -> ConcertoResult<()> {
        match self {
            Validator::StringRegex { .. } => {
                self.compile_regex().map(|_| ()).map_err(|e| match e {
                    ConcertoError::IllegalModel { message, location } => {
                        ConcertoError::IllegalModel {
                            message: format!("{}: {}", context, message),
                            location,
                        }
                    }
                    other => other,
                })
            }
            Validator::StringLength { min, max } => match (min, max) {
                (Some(lo), Some(hi)) if lo > hi => Err(ConcertoError::illegal_model(format!(
                    "{}: minLength {} exceeds maxLength {}",
                    context, lo, hi
                ))),
                _ => Ok(()),
            },
            Validator::IntegerRange { lower, upper } => match (lower, upper) {
                (Some(lo), Some(hi)) if lo > hi => Err(ConcertoError::illegal_model(format!(
                    "{}: lower bound {} exceeds upper bound {}",
                    context, lo, hi
                ))),
                _ => Ok(()),
            },
            Validator::LongRange { lower, upper } => match (lower, upper) {
                (Some(lo), Some(hi)) if lo > hi => Err(ConcertoError::illegal_model(format!(
                    "{}: lower bound {} exceeds upper bound {}",
                    context, lo, hi
                ))),
                _ => Ok(()),
            },
            Validator::DoubleRange { lower, upper } => match (lower, upper) {
                (Some(lo), Some(hi)) if lo > hi => Err(ConcertoError::illegal_model(format!(
                    "{}: lower bound {} exceeds upper bound {}",
                    context, lo, hi
                ))),
                _ => Ok(()),
            },
        }
    }

    /// Compiles the regex of a `StringRegex` validator, translating the
    /// supported flag characters into inline groups.
    pub fn compile_regex(&self) -> ConcertoResult<Regex> {
        let (pattern, flags) = match self {
            Validator::StringRegex { pattern, flags } => (pattern, flags),
            _ => {
                return Err(ConcertoError::illegal_model(
                    "not a regular expression validator",
                ))
            }
        };
        let mut inline = String::new();
        for flag in flags.chars() {
            match flag {
                'i' | 'm' | 's' | 'x' => inline.push(flag),
                // unicode matching is the default; global repetition has no
                // meaning for a full-string match
                'u' | 'g' => {}
                other => {
                    return Err(ConcertoError::illegal_model(format!(
                        "unsupported regular expression flag '{}'",
                        other
                    )))
                }
            }
        }
        let full = if inline.is_empty() {
            pattern.clone()
        } else {
            format!("(?{}){}", inline, pattern)
        };
        Regex::new(&full).map_err(|e| {
            ConcertoError::illegal_model(format!("invalid regular expression /{}/: {}", pattern, e))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub name: String,
    pub arguments: Vec<DecoratorValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecoratorValue {
    String(String),
    Number(f64),
    Boolean(bool),
    TypeReference(TypeRef),
}

impl Decorator {
    pub(crate) fn from_ast_list(decorators: &Option<Vec<metamodel::Decorator>>) -> Vec<Decorator> {
        decorators
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|d| Decorator {
                name: d.name.clone(),
                arguments: d
                    .arguments
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .map(|a| match a {
                        metamodel::DecoratorArgument::String { value } => {
                            DecoratorValue::String(value.clone())
                        }
                        metamodel::DecoratorArgument::Number { value } => {
                            DecoratorValue::Number(*value)
                        }
                        metamodel::DecoratorArgument::Boolean { value } => {
                            DecoratorValue::Boolean(*value)
                        }
                        metamodel::DecoratorArgument::TypeReference { type_identifier } => {
                            DecoratorValue::TypeReference(TypeRef::from_ast(type_identifier))
                        }
                    })
                    .collect(),
            })
            .collect()
    }
}
