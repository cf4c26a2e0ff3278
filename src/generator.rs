//! Sample instance construction over the declarations graph.
//!
//! The generator walks a declaration's inherited property set and asks a
//! pluggable [`ValueGenerator`] for primitive values. A stack of the FQNs
//! currently being generated guards against unbounded recursion through
//! self-referential models.

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use rand::Rng;

use crate::error::{ConcertoError, ConcertoResult};
use crate::instance::{Instance, Relationship, Value};
use crate::introspect::{ClassDeclaration, OwnedProperty, PrimitiveKind, ResolvedType, Validator};
use crate::model_manager::ModelManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Zero-like values, empty arrays.
    Empty,
    /// Plausible sample values, one element per array.
    Sample,
}

#[derive(Debug, Clone, Copy)]
pub struct GeneratorOptions {
    pub mode: GenerationMode,
    pub include_optional_fields: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            mode: GenerationMode::Empty,
            include_optional_fields: false,
        }
    }
}

/// Supplies primitive values during generation. Bounds come from a
/// property's range validator, when present.
pub trait ValueGenerator {
    fn string_value(&mut self) -> String;
    fn boolean_value(&mut self) -> bool;
    fn integer_value(&mut self, lower: Option<i32>, upper: Option<i32>) -> i32;
    fn long_value(&mut self, lower: Option<i64>, upper: Option<i64>) -> i64;
    fn double_value(&mut self, lower: Option<f64>, upper: Option<f64>) -> f64;
    fn date_time_value(&mut self) -> DateTime<FixedOffset>;
    /// Index of the enum value to pick.
    fn enum_pick(&mut self, count: usize) -> usize;
    /// Number of elements for a generated array.
    fn array_length(&mut self) -> usize;
    /// Identifier for a generated relationship target.
    fn relationship_identifier(&mut self) -> String;
}

/// Produces zero-like values and empty arrays.
pub struct EmptyValueGenerator;

impl ValueGenerator for EmptyValueGenerator {
    fn string_value(&mut self) -> String {
        String::new()
    }

    fn boolean_value(&mut self) -> bool {
        false
    }

    fn integer_value(&mut self, lower: Option<i32>, upper: Option<i32>) -> i32 {
        lower.or(upper).unwrap_or(0)
    }

    fn long_value(&mut self, lower: Option<i64>, upper: Option<i64>) -> i64 {
        lower.or(upper).unwrap_or(0)
    }

    fn double_value(&mut self, lower: Option<f64>, upper: Option<f64>) -> f64 {
        lower.or(upper).unwrap_or(0.0)
    }

    fn date_time_value(&mut self) -> DateTime<FixedOffset> {
        Utc::now().trunc_subsecs(3).fixed_offset()
    }

    fn enum_pick(&mut self, _count: usize) -> usize {
        0
    }

    fn array_length(&mut self) -> usize {
        0
    }

    fn relationship_identifier(&mut self) -> String {
        "0000".to_string()
    }
}

const SAMPLE_WORDS: [&str; 8] = [
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "tempor",
    "incididunt",
    "labore",
    "dolore",
];

/// Produces plausible random sample values.
pub struct SampleValueGenerator {
    rng: rand::rngs::ThreadRng,
}

impl SampleValueGenerator {
    pub fn new() -> Self {
        SampleValueGenerator {
            rng: rand::thread_rng(),
        }
    }
}

impl Default for SampleValueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueGenerator for SampleValueGenerator {
    fn string_value(&mut self) -> String {
        SAMPLE_WORDS[self.rng.gen_range(0..SAMPLE_WORDS.len())].to_string()
    }

    fn boolean_value(&mut self) -> bool {
        self.rng.gen()
    }

    fn integer_value(&mut self, lower: Option<i32>, upper: Option<i32>) -> i32 {
        let lo = lower.unwrap_or(0);
        let hi = upper.unwrap_or_else(|| lo.saturating_add(50_000));
        self.rng.gen_range(lo..=hi)
    }

    fn long_value(&mut self, lower: Option<i64>, upper: Option<i64>) -> i64 {
        let lo = lower.unwrap_or(0);
        let hi = upper.unwrap_or_else(|| lo.saturating_add(50_000));
        self.rng.gen_range(lo..=hi)
    }

    fn double_value(&mut self, lower: Option<f64>, upper: Option<f64>) -> f64 {
        let lo = lower.unwrap_or(0.0);
        let hi = upper.unwrap_or(lo + 1000.0);
        // two decimal places keep the value stable through JSON
        (self.rng.gen_range(lo..=hi) * 100.0).round() / 100.0
    }

    fn date_time_value(&mut self) -> DateTime<FixedOffset> {
        Utc::now().trunc_subsecs(3).fixed_offset()
    }

    fn enum_pick(&mut self, _count: usize) -> usize {
        0
    }

    fn array_length(&mut self) -> usize {
        1
    }

    fn relationship_identifier(&mut self) -> String {
        format!("{:04}", self.rng.gen_range(0..10_000))
    }
}

/// Builds a sample instance of a declaration.
pub struct InstanceGenerator<'m> {
    manager: &'m ModelManager,
    options: GeneratorOptions,
}

impl<'m> InstanceGenerator<'m> {
    pub fn new(manager: &'m ModelManager, options: GeneratorOptions) -> Self {
        InstanceGenerator { manager, options }
    }

    /// Generates an instance using the value generator implied by the
    /// configured mode.
    pub fn generate(&self, declaration: &'m ClassDeclaration) -> ConcertoResult<Instance> {
        match self.options.mode {
            GenerationMode::Empty => {
                self.generate_with(declaration, &mut EmptyValueGenerator)
            }
            GenerationMode::Sample => {
                self.generate_with(declaration, &mut SampleValueGenerator::new())
            }
        }
    }

    /// Generates an instance with a caller-supplied value generator.
    pub fn generate_with(
        &self,
        declaration: &'m ClassDeclaration,
        values: &mut dyn ValueGenerator,
    ) -> ConcertoResult<Instance> {
        let concrete = self.pick_concrete(declaration)?;
        let mut stack = vec![concrete.get_fully_qualified_name()];
        self.generate_instance(concrete, values, &mut stack)
    }

    /// The concrete-subclass picker: an abstract declaration is replaced by
    /// its first non-abstract assignable descendant in registry order.
    fn pick_concrete(
        &self,
        declaration: &'m ClassDeclaration,
    ) -> ConcertoResult<&'m ClassDeclaration> {
        if !declaration.is_abstract() {
            return Ok(declaration);
        }
        declaration
            .get_assignable_class_declarations(self.manager)?
            .into_iter()
            .find(|candidate| !candidate.is_abstract())
            .ok_or_else(|| {
                ConcertoError::model_violation(format!(
                    "No concrete extending type for the abstract type {}",
                    declaration.get_fully_qualified_name()
                ))
            })
    }

    fn generate_instance(
        &self,
        declaration: &'m ClassDeclaration,
        values: &mut dyn ValueGenerator,
        stack: &mut Vec<String>,
    ) -> ConcertoResult<Instance> {
        let mut instance = Instance::new(declaration.get_fully_qualified_name());
        for owned in declaration.get_properties(self.manager)? {
            if owned.property.is_optional && !self.options.include_optional_fields {
                continue;
            }
            let value = self.generate_property_value(&owned, values, stack)?;
            instance.set_property(owned.property.name.clone(), value);
        }
        Ok(instance)
    }

    fn generate_property_value(
        &self,
        owned: &OwnedProperty<'m>,
        values: &mut dyn ValueGenerator,
        stack: &mut Vec<String>,
    ) -> ConcertoResult<Value> {
        let property = owned.property;
        if property.is_relationship() {
            let target_fqn = owned.resolve_type_fqn(self.manager)?;
            let target = self.manager.get_type(&target_fqn)?;
            let concrete = self.pick_concrete(target)?;
            let make = |identifier: String| {
                Value::Relationship(Relationship::new(
                    concrete.get_fully_qualified_name(),
                    identifier,
                ))
            };
            if property.is_array {
                let mut elements = Vec::new();
                for _ in 0..values.array_length() {
                    elements.push(make(values.relationship_identifier()));
                }
                return Ok(Value::Array(elements));
            }
            return Ok(make(values.relationship_identifier()));
        }

        match owned.resolve_type(self.manager)? {
            ResolvedType::Primitive(kind) => {
                if property.is_array {
                    let mut elements = Vec::new();
                    for _ in 0..values.array_length() {
                        elements.push(generate_primitive(kind, property.validator.as_ref(), values));
                    }
                    Ok(Value::Array(elements))
                } else {
                    Ok(generate_primitive(kind, property.validator.as_ref(), values))
                }
            }
            ResolvedType::Declaration(target) if target.is_enum() => {
                let names = target.enum_values();
                if names.is_empty() {
                    return Err(ConcertoError::model_violation(format!(
                        "The enum {} has no values to pick from",
                        target.get_fully_qualified_name()
                    )));
                }
                let pick = |index: usize| Value::EnumValue(names[index % names.len()].to_string());
                if property.is_array {
                    let mut elements = Vec::new();
                    for _ in 0..values.array_length() {
                        elements.push(pick(values.enum_pick(names.len())));
                    }
                    Ok(Value::Array(elements))
                } else {
                    Ok(pick(values.enum_pick(names.len())))
                }
            }
            ResolvedType::Declaration(target) => {
                let concrete = self.pick_concrete(target)?;
                let fqn = concrete.get_fully_qualified_name();
                if stack.contains(&fqn) {
                    // recursion: empty array, null optional, error otherwise
                    if property.is_array {
                        return Ok(Value::Array(Vec::new()));
                    }
                    if property.is_optional {
                        return Ok(Value::Null);
                    }
                    return Err(ConcertoError::Recursion {
                        type_name: fqn,
                        field: property.name.clone(),
                    });
                }
                if property.is_array {
                    let mut elements = Vec::new();
                    for _ in 0..values.array_length() {
                        stack.push(fqn.clone());
                        let child = self.generate_instance(concrete, values, stack);
                        stack.pop();
                        elements.push(Value::Instance(Box::new(child?)));
                    }
                    Ok(Value::Array(elements))
                } else {
                    stack.push(fqn.clone());
                    let child = self.generate_instance(concrete, values, stack);
                    stack.pop();
                    Ok(Value::Instance(Box::new(child?)))
                }
            }
        }
    }
}

fn generate_primitive(
    kind: PrimitiveKind,
    validator: Option<&Validator>,
    values: &mut dyn ValueGenerator,
) -> Value {
    match kind {
        PrimitiveKind::String => {
            let mut value = values.string_value();
            if let Some(Validator::StringLength { min, max }) = validator {
                if let Some(min) = min {
                    while (value.len() as u32) < *min {
                        value.push('a');
                    }
                }
                if let Some(max) = max {
                    value.truncate(*max as usize);
                }
            }
            Value::String(value)
        }
        PrimitiveKind::Boolean => Value::Boolean(values.boolean_value()),
        PrimitiveKind::Integer => {
            let (lower, upper) = match validator {
                Some(Validator::IntegerRange { lower, upper }) => (*lower, *upper),
                _ => (None, None),
            };
            Value::Integer(values.integer_value(lower, upper))
        }
        PrimitiveKind::Long => {
            let (lower, upper) = match validator {
                Some(Validator::LongRange { lower, upper }) => (*lower, *upper),
                _ => (None, None),
            };
            Value::Long(values.long_value(lower, upper))
        }
        PrimitiveKind::Double => {
            let (lower, upper) = match validator {
                Some(Validator::DoubleRange { lower, upper }) => (*lower, *upper),
                _ => (None, None),
            };
            Value::Double(values.double_value(lower, upper))
        }
        PrimitiveKind::DateTime => Value::DateTime(values.date_time_value()),
    }
}
