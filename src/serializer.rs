//! Canonical JSON, both directions.
//!
//! `to_json` walks an instance against its declaration and emits the wire
//! form: `$class` first, the system fields, then every property in
//! declaration order. `from_json` reads the wire form back into a
//! validated [`Instance`], trusting the JSON's `$class` after an
//! assignability check. Validation runs before anything is emitted, so a
//! failing instance never produces a partial object.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::{Map, Value as JsonValue};

use crate::error::{ConcertoError, ConcertoResult};
use crate::instance::{Instance, Relationship, Value};
use crate::introspect::{
    ClassDeclaration, OwnedProperty, PrimitiveKind, ResolvedType, Validator,
};
use crate::model_manager::ModelManager;
use crate::model_util;

/// Per-call serializer options. Unset fields inherit the serializer's
/// defaults; set fields override them regardless of value.
#[derive(Debug, Clone, Default)]
pub struct SerializerOptions {
    pub validate: Option<bool>,
    pub convert_resources_to_relationships: Option<bool>,
    pub permit_resources_for_relationships: Option<bool>,
    pub include_optional_fields: Option<bool>,
    /// Minutes east of UTC used when emitting `DateTime` values.
    pub utc_offset: Option<i32>,
}

impl SerializerOptions {
    fn overlay(&self, base: ResolvedOptions) -> ResolvedOptions {
        ResolvedOptions {
            validate: self.validate.unwrap_or(base.validate),
            convert_resources_to_relationships: self
                .convert_resources_to_relationships
                .unwrap_or(base.convert_resources_to_relationships),
            permit_resources_for_relationships: self
                .permit_resources_for_relationships
                .unwrap_or(base.permit_resources_for_relationships),
            include_optional_fields: self
                .include_optional_fields
                .unwrap_or(base.include_optional_fields),
            utc_offset: self.utc_offset.unwrap_or(base.utc_offset),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedOptions {
    validate: bool,
    convert_resources_to_relationships: bool,
    permit_resources_for_relationships: bool,
    include_optional_fields: bool,
    utc_offset: i32,
}

const BUILTIN_OPTIONS: ResolvedOptions = ResolvedOptions {
    validate: true,
    convert_resources_to_relationships: false,
    permit_resources_for_relationships: false,
    include_optional_fields: false,
    utc_offset: 0,
};

/// The bidirectional traversal engine between instances and canonical
/// JSON.
pub struct Serializer<'m> {
    manager: &'m ModelManager,
    defaults: SerializerOptions,
}

impl<'m> Serializer<'m> {
    pub fn new(manager: &'m ModelManager) -> Self {
        Serializer {
            manager,
            defaults: SerializerOptions::default(),
        }
    }

    /// Replaces the per-serializer default options.
    pub fn set_default_options(&mut self, defaults: SerializerOptions) {
        self.defaults = defaults;
    }

    fn resolve_options(&self, overrides: Option<&SerializerOptions>) -> ResolvedOptions {
        let base = self.defaults.overlay(BUILTIN_OPTIONS);
        match overrides {
            Some(options) => options.overlay(base),
            None => base,
        }
    }

    /// Emits the canonical JSON form of an instance.
    pub fn to_json(
        &self,
        instance: &Instance,
        options: Option<&SerializerOptions>,
    ) -> ConcertoResult<JsonValue> {
        let resolved = self.resolve_options(options);
        self.instance_to_json(instance, resolved)
    }

    /// Constructs a validated instance from canonical JSON.
    pub fn from_json(
        &self,
        json: &JsonValue,
        options: Option<&SerializerOptions>,
    ) -> ConcertoResult<Instance> {
        let resolved = self.resolve_options(options);
        self.json_to_instance(json, None, resolved)
    }

    /// Convenience wrapper parsing JSON text first.
    pub fn from_json_str(
        &self,
        json: &str,
        options: Option<&SerializerOptions>,
    ) -> ConcertoResult<Instance> {
        let value: JsonValue = serde_json::from_str(json)?;
        self.from_json(&value, options)
    }

    fn instance_to_json(
        &self,
        instance: &Instance,
        options: ResolvedOptions,
    ) -> ConcertoResult<JsonValue> {
        let declaration = self.manager.get_type(instance.class_name())?;
        if declaration.is_enum() {
            return Err(ConcertoError::model_violation(format!(
                "The enum {} cannot be serialized as an instance",
                instance.class_name()
            )));
        }
        let fqn = declaration.get_fully_qualified_name();
        let identifier = instance.identifier(self.manager)?;
        let subject = describe(&fqn, identifier.as_deref());

        let properties = declaration.get_properties(self.manager)?;
        if options.validate {
            let declared: HashSet<&str> = properties.iter().map(|p| p.name()).collect();
            for name in instance.property_names() {
                if !declared.contains(name) {
                    return Err(ConcertoError::model_violation(format!(
                        "Unexpected property \"{}\" for type {}",
                        name, fqn
                    )));
                }
            }
        }

        let mut object = Map::new();
        object.insert("$class".to_string(), JsonValue::String(fqn.clone()));
        for owned in &properties {
            let name = owned.name();
            let alias;
            let mut value = instance.get_property(name);
            // the $identifier alias mirrors an explicit identifier field
            if value.is_none() && name == model_util::SYSTEM_IDENTIFIER {
                if let Some(id) = &identifier {
                    alias = Value::String(id.clone());
                    value = Some(&alias);
                }
            }
            match value {
                None => {
                    if !owned.property.is_optional && options.validate {
                        return Err(missing_required(&subject, name));
                    }
                }
                Some(Value::Null) => {
                    if owned.property.is_optional {
                        if options.include_optional_fields {
                            object.insert(name.to_string(), JsonValue::Null);
                        }
                    } else if options.validate {
                        return Err(missing_required(&subject, name));
                    }
                }
                Some(value) => {
                    let json = self.value_to_json(&subject, owned, value, options)?;
                    object.insert(name.to_string(), json);
                }
            }
        }
        Ok(JsonValue::Object(object))
    }

    fn value_to_json(
        &self,
        subject: &str,
        owned: &OwnedProperty<'m>,
        value: &Value,
        options: ResolvedOptions,
    ) -> ConcertoResult<JsonValue> {
        if owned.property.is_array {
            let items = match value {
                Value::Array(items) => items,
                other => {
                    return Err(type_mismatch(subject, owned.name(), "an array", other))
                }
            };
            let mut array = Vec::with_capacity(items.len());
            for item in items {
                array.push(self.single_value_to_json(subject, owned, item, options)?);
            }
            return Ok(JsonValue::Array(array));
        }
        self.single_value_to_json(subject, owned, value, options)
    }

    fn single_value_to_json(
        &self,
        subject: &str,
        owned: &OwnedProperty<'m>,
        value: &Value,
        options: ResolvedOptions,
    ) -> ConcertoResult<JsonValue> {
        let property = owned.property;
        if property.is_relationship() {
            let target_fqn = owned.resolve_type_fqn(self.manager)?;
            return match value {
                Value::Relationship(relationship) => {
                    if options.validate
                        && !self
                            .manager
                            .derives_from(relationship.class_name(), &target_fqn)?
                    {
                        return Err(ConcertoError::model_violation(format!(
                            "The relationship \"{}\" of {} must reference a {} but found {}",
                            property.name,
                            subject,
                            target_fqn,
                            relationship.class_name()
                        )));
                    }
                    Ok(JsonValue::String(relationship.to_uri()))
                }
                Value::Instance(nested) => {
                    if options.convert_resources_to_relationships {
                        let identifier =
                            nested.identifier(self.manager)?.ok_or_else(|| {
                                ConcertoError::model_violation(format!(
                                    "Cannot convert {} to a relationship: it has no identifier",
                                    nested.class_name()
                                ))
                            })?;
                        let relationship =
                            Relationship::new(nested.class_name(), identifier);
                        Ok(JsonValue::String(relationship.to_uri()))
                    } else if options.permit_resources_for_relationships {
                        self.instance_to_json(nested, options)
                    } else {
                        Err(type_mismatch(subject, &property.name, "a relationship", value))
                    }
                }
                other => Err(type_mismatch(subject, &property.name, "a relationship", other)),
            };
        }

        match owned.resolve_type(self.manager)? {
            ResolvedType::Primitive(kind) => {
                self.primitive_to_json(subject, owned, kind, value, options)
            }
            ResolvedType::Declaration(target) if target.is_enum() => {
                let name = value.as_str().ok_or_else(|| {
                    type_mismatch(subject, &property.name, "an enum value", value)
                })?;
                if !target.enum_values().contains(&name) {
                    return Err(ConcertoError::model_violation(format!(
                        "The value \"{}\" of field \"{}\" of {} is not a value of {}",
                        name,
                        property.name,
                        subject,
                        target.get_fully_qualified_name()
                    )));
                }
                Ok(JsonValue::String(name.to_string()))
            }
            ResolvedType::Declaration(target) => match value {
                Value::Instance(nested) => {
                    if options.validate
                        && !self.manager.derives_from(
                            nested.class_name(),
                            &target.get_fully_qualified_name(),
                        )?
                    {
                        return Err(ConcertoError::model_violation(format!(
                            "The field \"{}\" of {} expects {} but found {}",
                            property.name,
                            subject,
                            target.get_fully_qualified_name(),
                            nested.class_name()
                        )));
                    }
                    self.instance_to_json(nested, options)
                }
                other => Err(type_mismatch(subject, &property.name, "a resource", other)),
            },
        }
    }

    fn primitive_to_json(
        &self,
        subject: &str,
        owned: &OwnedProperty<'m>,
        kind: PrimitiveKind,
        value: &Value,
        options: ResolvedOptions,
    ) -> ConcertoResult<JsonValue> {
        let property = owned.property;
        match (kind, value) {
            (PrimitiveKind::String, Value::String(text)) => {
                if options.validate {
                    self.apply_string_validator(subject, property.validator.as_ref(), &property.name, text)?;
                }
                Ok(JsonValue::String(text.clone()))
            }
            (PrimitiveKind::Boolean, Value::Boolean(flag)) => Ok(JsonValue::Bool(*flag)),
            (PrimitiveKind::Integer, Value::Integer(number)) => {
                if options.validate {
                    apply_integer_validator(subject, property.validator.as_ref(), &property.name, *number)?;
                }
                Ok(JsonValue::from(*number))
            }
            (PrimitiveKind::Long, Value::Long(number)) => {
                if options.validate {
                    apply_long_validator(subject, property.validator.as_ref(), &property.name, *number)?;
                }
                Ok(JsonValue::from(*number))
            }
            (PrimitiveKind::Double, Value::Double(number)) => {
                if !number.is_finite() {
                    return Err(non_finite(subject, &property.name, *number));
                }
                if options.validate {
                    apply_double_validator(subject, property.validator.as_ref(), &property.name, *number)?;
                }
                serde_json::Number::from_f64(*number)
                    .map(JsonValue::Number)
                    .ok_or_else(|| non_finite(subject, &property.name, *number))
            }
            (PrimitiveKind::DateTime, Value::DateTime(datetime)) => Ok(JsonValue::String(
                format_datetime(datetime, options.utc_offset)?,
            )),
            (expected, actual) => {
                Err(type_mismatch(subject, &property.name, expected.name(), actual))
            }
        }
    }

    fn json_to_instance(
        &self,
        json: &JsonValue,
        expected: Option<&ClassDeclaration>,
        options: ResolvedOptions,
    ) -> ConcertoResult<Instance> {
        let object = json.as_object().ok_or_else(|| {
            ConcertoError::model_violation("Expected a JSON object".to_string())
        })?;
        let class_name = object
            .get("$class")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                ConcertoError::model_violation(
                    "The JSON object is missing the $class property".to_string(),
                )
            })?;
        let declaration = self.manager.get_type(class_name)?;
        let fqn = declaration.get_fully_qualified_name();
        if let Some(expected) = expected {
            let expected_fqn = expected.get_fully_qualified_name();
            if !self.manager.derives_from(&fqn, &expected_fqn)? {
                return Err(ConcertoError::model_violation(format!(
                    "The $class {} is not assignable to the declared type {}",
                    fqn, expected_fqn
                )));
            }
        }
        if declaration.is_abstract() {
            return Err(ConcertoError::model_violation(format!(
                "Cannot instantiate the abstract type {}",
                fqn
            )));
        }
        if declaration.is_enum() {
            return Err(ConcertoError::model_violation(format!(
                "The enum {} cannot be deserialized as an instance",
                fqn
            )));
        }

        let properties = declaration.get_properties(self.manager)?;
        let mut instance = Instance::new(fqn.clone());
        for (key, json_value) in object {
            if key == "$class" {
                continue;
            }
            let owned = properties.iter().find(|p| p.name() == key);
            match owned {
                Some(owned) => {
                    if json_value.is_null() {
                        continue;
                    }
                    let subject = fqn.clone();
                    let value =
                        self.json_to_value(&subject, owned, json_value, options)?;
                    instance.set_property(key.clone(), value);
                }
                None => {
                    // an unknown key whose value is missing is tolerated
                    if json_value.is_null() {
                        continue;
                    }
                    return Err(ConcertoError::model_violation(format!(
                        "Unexpected property \"{}\" for type {}",
                        key, fqn
                    )));
                }
            }
        }

        if options.validate {
            let identifier = instance.identifier(self.manager)?;
            let subject = describe(&fqn, identifier.as_deref());
            for owned in &properties {
                if owned.property.is_optional {
                    continue;
                }
                let name = owned.name();
                if instance.get_property(name).is_some() {
                    continue;
                }
                // the alias is satisfied by the concrete identifier field
                if name == model_util::SYSTEM_IDENTIFIER && identifier.is_some() {
                    continue;
                }
                return Err(missing_required(&subject, name));
            }
        }
        Ok(instance)
    }

    fn json_to_value(
        &self,
        subject: &str,
        owned: &OwnedProperty<'_>,
        json: &JsonValue,
        options: ResolvedOptions,
    ) -> ConcertoResult<Value> {
        if owned.property.is_array {
            let items = json.as_array().ok_or_else(|| {
                json_type_mismatch(subject, owned.name(), "an array", json)
            })?;
            let mut array = Vec::with_capacity(items.len());
            for item in items {
                array.push(self.json_to_single_value(subject, owned, item, options)?);
            }
            return Ok(Value::Array(array));
        }
        self.json_to_single_value(subject, owned, json, options)
    }

    fn json_to_single_value(
        &self,
        subject: &str,
        owned: &OwnedProperty<'_>,
        json: &JsonValue,
        options: ResolvedOptions,
    ) -> ConcertoResult<Value> {
        let property = owned.property;
        if property.is_relationship() {
            let target_fqn = owned.resolve_type_fqn(self.manager)?;
            return match json {
                JsonValue::String(uri) => {
                    let relationship = Relationship::from_uri(
                        uri,
                        Some(model_util::get_namespace(&target_fqn)),
                        Some(model_util::get_short_name(&target_fqn)),
                    )?;
                    if options.validate
                        && !self
                            .manager
                            .derives_from(relationship.class_name(), &target_fqn)?
                    {
                        return Err(ConcertoError::model_violation(format!(
                            "The relationship \"{}\" of {} must reference a {} but found {}",
                            property.name,
                            subject,
                            target_fqn,
                            relationship.class_name()
                        )));
                    }
                    Ok(Value::Relationship(relationship))
                }
                JsonValue::Object(_) if options.permit_resources_for_relationships => {
                    let target = self.manager.get_type(&target_fqn)?;
                    let nested = self.json_to_instance(json, Some(target), options)?;
                    Ok(Value::Instance(Box::new(nested)))
                }
                other => Err(json_type_mismatch(
                    subject,
                    &property.name,
                    "a relationship URI",
                    other,
                )),
            };
        }

        match owned.resolve_type(self.manager)? {
            ResolvedType::Primitive(kind) => {
                self.json_to_primitive(subject, owned, kind, json, options)
            }
            ResolvedType::Declaration(target) if target.is_enum() => {
                let name = json.as_str().ok_or_else(|| {
                    json_type_mismatch(subject, &property.name, "an enum value", json)
                })?;
                if !target.enum_values().contains(&name) {
                    return Err(ConcertoError::model_violation(format!(
                        "The value \"{}\" of field \"{}\" of {} is not a value of {}",
                        name,
                        property.name,
                        subject,
                        target.get_fully_qualified_name()
                    )));
                }
                Ok(Value::EnumValue(name.to_string()))
            }
            ResolvedType::Declaration(target) => {
                if !json.is_object() {
                    return Err(json_type_mismatch(subject, &property.name, "an object", json));
                }
                let nested = self.json_to_instance(json, Some(target), options)?;
                Ok(Value::Instance(Box::new(nested)))
            }
        }
    }

    fn json_to_primitive(
        &self,
        subject: &str,
        owned: &OwnedProperty<'_>,
        kind: PrimitiveKind,
        json: &JsonValue,
        options: ResolvedOptions,
    ) -> ConcertoResult<Value> {
        let property = owned.property;
        match kind {
            PrimitiveKind::String => {
                let text = json.as_str().ok_or_else(|| {
                    json_type_mismatch(subject, &property.name, "String", json)
                })?;
                if options.validate {
                    self.apply_string_validator(subject, property.validator.as_ref(), &property.name, text)?;
                }
                Ok(Value::String(text.to_string()))
            }
            PrimitiveKind::Boolean => json
                .as_bool()
                .map(Value::Boolean)
                .ok_or_else(|| json_type_mismatch(subject, &property.name, "Boolean", json)),
            PrimitiveKind::Integer => {
                let number = json.as_i64().ok_or_else(|| {
                    json_type_mismatch(subject, &property.name, "Integer", json)
                })?;
                let number = i32::try_from(number).map_err(|_| {
                    ConcertoError::model_violation(format!(
                        "The value {} of field \"{}\" of {} is out of range for Integer",
                        number, property.name, subject
                    ))
                })?;
                if options.validate {
                    apply_integer_validator(subject, property.validator.as_ref(), &property.name, number)?;
                }
                Ok(Value::Integer(number))
            }
            PrimitiveKind::Long => {
                let number = json.as_i64().ok_or_else(|| {
                    json_type_mismatch(subject, &property.name, "Long", json)
                })?;
                if options.validate {
                    apply_long_validator(subject, property.validator.as_ref(), &property.name, number)?;
                }
                Ok(Value::Long(number))
            }
            PrimitiveKind::Double => {
                let number = json.as_f64().ok_or_else(|| {
                    json_type_mismatch(subject, &property.name, "Double", json)
                })?;
                if !number.is_finite() {
                    return Err(non_finite(subject, &property.name, number));
                }
                if options.validate {
                    apply_double_validator(subject, property.validator.as_ref(), &property.name, number)?;
                }
                Ok(Value::Double(number))
            }
            PrimitiveKind::DateTime => {
                let text = json.as_str().ok_or_else(|| {
                    json_type_mismatch(subject, &property.name, "DateTime", json)
                })?;
                let datetime = DateTime::parse_from_rfc3339(text).map_err(|_| {
                    ConcertoError::model_violation(format!(
                        "The value \"{}\" of field \"{}\" of {} is not an ISO-8601 date",
                        text, property.name, subject
                    ))
                })?;
                Ok(Value::DateTime(datetime))
            }
        }
    }

    fn apply_string_validator(
        &self,
        subject: &str,
        validator: Option<&Validator>,
        field: &str,
        text: &str,
    ) -> ConcertoResult<()> {
        match validator {
            Some(validator @ Validator::StringRegex { pattern, .. }) => {
                let fresh;
                let regex = match self.manager.compiled_regex(validator) {
                    Some(regex) => regex,
                    None => {
                        fresh = validator.compile_regex()?;
                        &fresh
                    }
                };
                if !regex.is_match(text) {
                    return Err(ConcertoError::model_violation(format!(
                        "The value \"{}\" of field \"{}\" of {} does not match /{}/",
                        text, field, subject, pattern
                    )));
                }
                Ok(())
            }
            Some(Validator::StringLength { min, max }) => {
                let length = text.chars().count() as u32;
                if min.map_or(false, |lo| length < lo) || max.map_or(false, |hi| length > hi) {
                    return Err(ConcertoError::model_violation(format!(
                        "The value \"{}\" of field \"{}\" of {} violates the length constraint",
                        text, field, subject
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn describe(fqn: &str, identifier: Option<&str>) -> String {
    match identifier {
        Some(id) => format!("{}#{}", fqn, id),
        None => fqn.to_string(),
    }
}

fn missing_required(subject: &str, field: &str) -> ConcertoError {
    ConcertoError::model_violation(format!(
        "The instance \"{}\" is missing the required field \"{}\".",
        subject, field
    ))
}

fn non_finite(subject: &str, field: &str, value: f64) -> ConcertoError {
    ConcertoError::model_violation(format!(
        "The instance \"{}\" has a non-finite value \"{}\" for the field \"{}\".",
        subject,
        format_double(value),
        field
    ))
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        value.to_string()
    }
}

fn type_mismatch(subject: &str, field: &str, expected: &str, actual: &Value) -> ConcertoError {
    ConcertoError::model_violation(format!(
        "The field \"{}\" of {} expects {} but found {}",
        field,
        subject,
        expected,
        actual.type_label()
    ))
}

fn json_type_mismatch(
    subject: &str,
    field: &str,
    expected: &str,
    actual: &JsonValue,
) -> ConcertoError {
    let label = match actual {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    };
    ConcertoError::model_violation(format!(
        "The field \"{}\" of {} expects {} but found {}",
        field, subject, expected, label
    ))
}

fn apply_integer_validator(
    subject: &str,
    validator: Option<&Validator>,
    field: &str,
    value: i32,
) -> ConcertoResult<()> {
    if let Some(Validator::IntegerRange { lower, upper }) = validator {
        if lower.map_or(false, |lo| value < lo) || upper.map_or(false, |hi| value > hi) {
            return Err(range_violation(subject, field, &value.to_string()));
        }
    }
    Ok(())
}

fn apply_long_validator(
    subject: &str,
    validator: Option<&Validator>,
    field: &str,
    value: i64,
) -> ConcertoResult<()> {
    if let Some(Validator::LongRange { lower, upper }) = validator {
        if lower.map_or(false, |lo| value < lo) || upper.map_or(false, |hi| value > hi) {
            return Err(range_violation(subject, field, &value.to_string()));
        }
    }
    Ok(())
}

fn apply_double_validator(
    subject: &str,
    validator: Option<&Validator>,
    field: &str,
    value: f64,
) -> ConcertoResult<()> {
    if let Some(Validator::DoubleRange { lower, upper }) = validator {
        if lower.map_or(false, |lo| value < lo) || upper.map_or(false, |hi| value > hi) {
            return Err(range_violation(subject, field, &value.to_string()));
        }
    }
    Ok(())
}

fn range_violation(subject: &str, field: &str, value: &str) -> ConcertoError {
    ConcertoError::model_violation(format!(
        "The value {} of field \"{}\" of {} is outside the declared range",
        value, field, subject
    ))
}

fn format_datetime(datetime: &DateTime<FixedOffset>, utc_offset: i32) -> ConcertoResult<String> {
    let offset = FixedOffset::east_opt(utc_offset * 60).ok_or_else(|| {
        ConcertoError::model_violation(format!("The utcOffset {} is out of range", utc_offset))
    })?;
    Ok(datetime
        .with_timezone(&offset)
        .to_rfc3339_opts(SecondsFormat::Millis, true))
}
