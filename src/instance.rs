//! Typed runtime records and relationship references.

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{ConcertoError, ConcertoResult};
use crate::model_manager::ModelManager;
use crate::model_util;

/// Characters that are escaped in the identifier part of a relationship
/// URI: everything a URI fragment cannot carry verbatim. Characters such
/// as `@` and `:` stay readable.
const URI_IDENTIFIER_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'%')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'[')
    .add(b']');

/// A typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    DateTime(DateTime<FixedOffset>),
    /// The name of one value of an enum declaration.
    EnumValue(String),
    Array(Vec<Value>),
    Instance(Box<Instance>),
    Relationship(Relationship),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::EnumValue(s) => Some(s),
            _ => None,
        }
    }

    /// A short label for error messages.
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::DateTime(_) => "DateTime",
            Value::EnumValue(_) => "enum value",
            Value::Array(_) => "array",
            Value::Instance(_) => "resource",
            Value::Relationship(_) => "relationship",
        }
    }
}

/// An in-memory record tied to a class declaration by FQN. Depending on
/// the declaration's kind this plays the role of a resource, concept,
/// transaction or event.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    class_name: String,
    values: IndexMap<String, Value>,
}

impl Instance {
    pub fn new(class_name: impl Into<String>) -> Self {
        Instance {
            class_name: class_name.into(),
            values: IndexMap::new(),
        }
    }

    /// The fully qualified name of the declaration this instance conforms to.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn namespace(&self) -> &str {
        model_util::get_namespace(&self.class_name)
    }

    pub fn type_name(&self) -> &str {
        model_util::get_short_name(&self.class_name)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get_property(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The instance's identifier: the value of its declaration's identifier
    /// field, falling back to the `$identifier` alias.
    pub fn identifier(&self, manager: &ModelManager) -> ConcertoResult<Option<String>> {
        let declaration = manager.get_type(&self.class_name)?;
        if let Some(field) = declaration.identifier_field_name(manager)? {
            if let Some(value) = self.values.get(&field).and_then(Value::as_str) {
                return Ok(Some(value.to_string()));
            }
        }
        Ok(self
            .values
            .get(model_util::SYSTEM_IDENTIFIER)
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

/// A by-reference link to an identifiable instance. Encodes a reference,
/// not ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    class_name: String,
    identifier: String,
}

impl Relationship {
    pub fn new(class_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Relationship {
            class_name: class_name.into(),
            identifier: identifier.into(),
        }
    }

    /// The fully qualified name of the target declaration.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Serializes to `resource:<FQN>#<identifier>` with the identifier
    /// percent-encoded.
    pub fn to_uri(&self) -> String {
        format!(
            "resource:{}#{}",
            self.class_name,
            utf8_percent_encode(&self.identifier, URI_IDENTIFIER_SET)
        )
    }

    /// Parses `resource:<FQN>#<identifier>`. The namespace-less short form
    /// `resource:#<identifier>` is accepted when a default namespace and
    /// type are supplied.
    pub fn from_uri(
        uri: &str,
        default_namespace: Option<&str>,
        default_type: Option<&str>,
    ) -> ConcertoResult<Relationship> {
        let invalid = |message: &str| ConcertoError::InvalidUri {
            uri: uri.to_string(),
            message: message.to_string(),
        };
        let rest = uri
            .strip_prefix("resource:")
            .ok_or_else(|| invalid("missing resource scheme"))?;
        let (fqn, fragment) = rest
            .split_once('#')
            .ok_or_else(|| invalid("missing identifier fragment"))?;
        if fragment.is_empty() {
            return Err(invalid("missing identifier fragment"));
        }
        let identifier = percent_decode_str(fragment)
            .decode_utf8()
            .map_err(|_| invalid("identifier is not valid UTF-8"))?
            .into_owned();
        let class_name = if fqn.is_empty() {
            match (default_namespace, default_type) {
                (Some(namespace), Some(type_name)) => {
                    model_util::get_fully_qualified_name(namespace, type_name)
                }
                _ => return Err(invalid("missing type with no default supplied")),
            }
        } else {
            fqn.to_string()
        };
        Ok(Relationship {
            class_name,
            identifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_round_trip() {
        let relationship =
            Relationship::new("org.acme.sample.SampleParticipant", "alice@email.com");
        let uri = relationship.to_uri();
        assert_eq!(
            uri,
            "resource:org.acme.sample.SampleParticipant#alice@email.com"
        );
        let parsed = Relationship::from_uri(&uri, None, None).expect("should parse");
        assert_eq!(parsed, relationship);
    }

    #[test]
    fn test_uri_encodes_reserved_characters() {
        let relationship = Relationship::new("org.acme.Thing", "id with space#and hash");
        let uri = relationship.to_uri();
        assert_eq!(uri, "resource:org.acme.Thing#id%20with%20space%23and%20hash");
        let parsed = Relationship::from_uri(&uri, None, None).expect("should parse");
        assert_eq!(parsed, relationship);
    }

    #[test]
    fn test_short_form_requires_defaults() {
        let parsed = Relationship::from_uri("resource:#42", Some("org.acme"), Some("Car"))
            .expect("short form with defaults");
        assert_eq!(parsed.class_name(), "org.acme.Car");
        assert_eq!(parsed.identifier(), "42");

        assert!(Relationship::from_uri("resource:#42", None, None).is_err());
    }

    #[test]
    fn test_invalid_uris() {
        assert!(Relationship::from_uri("org.acme.Car#42", None, None).is_err());
        assert!(Relationship::from_uri("resource:org.acme.Car", None, None).is_err());
        assert!(Relationship::from_uri("resource:org.acme.Car#", None, None).is_err());
    }
}
