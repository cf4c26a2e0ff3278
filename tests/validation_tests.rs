//! Schema-load validation failures and introspection queries.

use concerto_rs::{
    ConcertoError, Factory, GenerationMode, InstanceOptions, ModelManager, Serializer,
    SerializerOptions, Value,
};
use pretty_assertions::assert_eq;

fn try_load(json: &str) -> Result<ModelManager, ConcertoError> {
    let mut manager = ModelManager::new()?;
    manager.add_model_json(json)?;
    Ok(manager)
}

fn load(json: &str) -> ModelManager {
    try_load(json).expect("model should load")
}

fn assert_illegal(json: &str, needle: &str) {
    match try_load(json) {
        Err(ConcertoError::IllegalModel { message, .. }) => assert!(
            message.contains(needle),
            "expected message containing {:?}, got {:?}",
            needle,
            message
        ),
        Err(other) => panic!("expected IllegalModel, got {}", other),
        Ok(_) => panic!("model should have been rejected"),
    }
}

#[test]
fn test_concept_cannot_extend_an_identifiable_root() {
    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Sneaky",
                    "superType": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Asset" },
                    "properties": []
                }
            ]
        }"#,
        "cannot extend",
    );
}

#[test]
fn test_asset_cannot_extend_a_different_family() {
    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.EventDeclaration",
                    "name": "Crash",
                    "properties": []
                },
                {
                    "$class": "concerto.metamodel.AssetDeclaration",
                    "name": "Wreck",
                    "identifiedBy": "wreckId",
                    "superType": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Crash" },
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "wreckId" }
                    ]
                }
            ]
        }"#,
        "cannot extend",
    );
}

#[test]
fn test_self_extension_is_a_cycle() {
    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Loop",
                    "superType": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Loop" },
                    "properties": []
                }
            ]
        }"#,
        "extend itself",
    );
}

#[test]
fn test_subclass_cannot_redeclare_the_identifier() {
    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.AssetDeclaration",
                    "name": "Vehicle",
                    "identifiedBy": "vin",
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "vin" }
                    ]
                },
                {
                    "$class": "concerto.metamodel.AssetDeclaration",
                    "name": "Car",
                    "identifiedBy": "plate",
                    "superType": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Vehicle" },
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "plate" }
                    ]
                }
            ]
        }"#,
        "redeclare the identifier",
    );
}

#[test]
fn test_identifier_must_be_a_local_string_field() {
    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.AssetDeclaration",
                    "name": "Counter",
                    "identifiedBy": "count",
                    "properties": [
                        { "$class": "concerto.metamodel.IntegerProperty", "name": "count" }
                    ]
                }
            ]
        }"#,
        "non-array String",
    );

    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.AssetDeclaration",
                    "name": "Ghost",
                    "identifiedBy": "nowhere",
                    "properties": []
                }
            ]
        }"#,
        "not declared locally",
    );
}

#[test]
fn test_duplicate_declarations_and_properties() {
    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                { "$class": "concerto.metamodel.ConceptDeclaration", "name": "Twin", "properties": [] },
                { "$class": "concerto.metamodel.ConceptDeclaration", "name": "Twin", "properties": [] }
            ]
        }"#,
        "Duplicate declaration",
    );

    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Sloppy",
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "twice" },
                        { "$class": "concerto.metamodel.StringProperty", "name": "twice" }
                    ]
                }
            ]
        }"#,
        "more than once",
    );

    // an inherited name may not be shadowed either
    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Base",
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "label" }
                    ]
                },
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Derived",
                    "superType": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Base" },
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "label" }
                    ]
                }
            ]
        }"#,
        "redeclares the inherited property",
    );
}

#[test]
fn test_relationship_must_target_an_identifiable() {
    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Address",
                    "properties": []
                },
                {
                    "$class": "concerto.metamodel.AssetDeclaration",
                    "name": "House",
                    "identifiedBy": "houseId",
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "houseId" },
                        {
                            "$class": "concerto.metamodel.RelationshipProperty",
                            "name": "location",
                            "type": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Address" }
                        }
                    ]
                }
            ]
        }"#,
        "identifiable",
    );
}

#[test]
fn test_malformed_regex_validator_fails_the_model() {
    assert_illegal(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Strict",
                    "properties": [
                        {
                            "$class": "concerto.metamodel.StringProperty",
                            "name": "code",
                            "validator": {
                                "$class": "concerto.metamodel.StringRegexValidator",
                                "pattern": "(["
                            }
                        }
                    ]
                }
            ]
        }"#,
        "regular expression",
    );
}

const VALIDATED_MODEL: &str = r#"{
    "$class": "concerto.metamodel.Model",
    "namespace": "org.acme.checked",
    "declarations": [
        {
            "$class": "concerto.metamodel.ConceptDeclaration",
            "name": "Reading",
            "properties": [
                {
                    "$class": "concerto.metamodel.StringProperty",
                    "name": "sensor",
                    "validator": {
                        "$class": "concerto.metamodel.StringRegexValidator",
                        "pattern": "^S-[0-9]+$"
                    }
                },
                {
                    "$class": "concerto.metamodel.IntegerProperty",
                    "name": "percent",
                    "validator": {
                        "$class": "concerto.metamodel.IntegerDomainValidator",
                        "lower": 0,
                        "upper": 100
                    }
                }
            ]
        }
    ]
}"#;

#[test]
fn test_instance_validators_are_enforced() {
    let manager = load(VALIDATED_MODEL);
    let serializer = Serializer::new(&manager);

    let good = serde_json::json!({
        "$class": "org.acme.checked.Reading",
        "sensor": "S-42",
        "percent": 99
    });
    serializer.from_json(&good, None).expect("valid instance");

    let bad_pattern = serde_json::json!({
        "$class": "org.acme.checked.Reading",
        "sensor": "X-42",
        "percent": 99
    });
    let error = serializer.from_json(&bad_pattern, None).expect_err("regex must fire");
    assert!(error.to_string().contains("sensor"), "got {}", error);

    let bad_range = serde_json::json!({
        "$class": "org.acme.checked.Reading",
        "sensor": "S-42",
        "percent": 101
    });
    let error = serializer.from_json(&bad_range, None).expect_err("range must fire");
    assert!(error.to_string().contains("percent"), "got {}", error);

    // present keys override defaults, so validate=false lets both through
    let lenient = SerializerOptions {
        validate: Some(false),
        ..SerializerOptions::default()
    };
    serializer
        .from_json(&bad_range, Some(&lenient))
        .expect("lenient deserialization");
}

#[test]
fn test_empty_string_is_a_valid_string_value() {
    let manager = load(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Note",
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "text" }
                    ]
                }
            ]
        }"#,
    );
    let serializer = Serializer::new(&manager);
    let json = serde_json::json!({ "$class": "org.acme.Note", "text": "" });
    let note = serializer.from_json(&json, None).expect("empty string is valid");
    assert_eq!(note.get_property("text"), Some(&Value::String(String::new())));
}

#[test]
fn test_abstract_type_cannot_be_instantiated() {
    let manager = load(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Shape",
                    "isAbstract": true,
                    "properties": []
                }
            ]
        }"#,
    );
    let factory = Factory::new(&manager);
    let error = factory
        .new_concept("org.acme", "Shape", &InstanceOptions::default())
        .expect_err("abstract instantiation must fail");
    assert!(matches!(error, ConcertoError::ModelViolation { .. }));
}

#[test]
fn test_abstract_field_with_no_concrete_subclass_fails_generation() {
    let manager = load(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Shape",
                    "isAbstract": true,
                    "properties": []
                },
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Drawing",
                    "properties": [
                        {
                            "$class": "concerto.metamodel.ObjectProperty",
                            "name": "shape",
                            "type": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Shape" }
                        }
                    ]
                }
            ]
        }"#,
    );
    let factory = Factory::new(&manager);
    let error = factory
        .new_concept(
            "org.acme",
            "Drawing",
            &InstanceOptions {
                generate: Some(GenerationMode::Sample),
                ..InstanceOptions::default()
            },
        )
        .expect_err("no concrete subclass must fail");
    assert!(
        error.to_string().contains("No concrete extending type"),
        "got {}",
        error
    );
}

#[test]
fn test_abstract_field_picks_the_first_concrete_subclass() {
    let manager = load(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Shape",
                    "isAbstract": true,
                    "properties": []
                },
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Circle",
                    "superType": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Shape" },
                    "properties": [
                        { "$class": "concerto.metamodel.DoubleProperty", "name": "radius" }
                    ]
                },
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Square",
                    "superType": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Shape" },
                    "properties": [
                        { "$class": "concerto.metamodel.DoubleProperty", "name": "side" }
                    ]
                },
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Drawing",
                    "properties": [
                        {
                            "$class": "concerto.metamodel.ObjectProperty",
                            "name": "shape",
                            "type": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Shape" }
                        }
                    ]
                }
            ]
        }"#,
    );
    let factory = Factory::new(&manager);
    let drawing = factory
        .new_concept(
            "org.acme",
            "Drawing",
            &InstanceOptions {
                generate: Some(GenerationMode::Empty),
                ..InstanceOptions::default()
            },
        )
        .expect("generation");
    let Some(Value::Instance(shape)) = drawing.get_property("shape") else {
        panic!("expected a generated shape");
    };
    assert_eq!(shape.class_name(), "org.acme.Circle");
}

#[test]
fn test_enum_round_trip_and_membership() {
    let manager = load(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.EnumDeclaration",
                    "name": "Color",
                    "properties": [
                        { "$class": "concerto.metamodel.EnumProperty", "name": "RED" },
                        { "$class": "concerto.metamodel.EnumProperty", "name": "GREEN" },
                        { "$class": "concerto.metamodel.EnumProperty", "name": "BLUE" }
                    ]
                },
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Paint",
                    "properties": [
                        {
                            "$class": "concerto.metamodel.ObjectProperty",
                            "name": "color",
                            "type": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Color" }
                        }
                    ]
                }
            ]
        }"#,
    );
    let serializer = Serializer::new(&manager);

    let good = serde_json::json!({ "$class": "org.acme.Paint", "color": "GREEN" });
    let paint = serializer.from_json(&good, None).expect("valid enum value");
    assert_eq!(
        paint.get_property("color"),
        Some(&Value::EnumValue("GREEN".to_string()))
    );
    let emitted = serializer.to_json(&paint, None).expect("serialize");
    assert_eq!(emitted, good);

    let bad = serde_json::json!({ "$class": "org.acme.Paint", "color": "MAUVE" });
    assert!(serializer.from_json(&bad, None).is_err());

    // the first declared value is the deterministic sample pick
    let factory = Factory::new(&manager);
    let sample = factory
        .new_concept(
            "org.acme",
            "Paint",
            &InstanceOptions {
                generate: Some(GenerationMode::Sample),
                ..InstanceOptions::default()
            },
        )
        .expect("sample");
    assert_eq!(
        sample.get_property("color"),
        Some(&Value::EnumValue("RED".to_string()))
    );
}

#[test]
fn test_nested_property_navigation() {
    let manager = load(
        r#"{
            "$class": "concerto.metamodel.Model",
            "namespace": "org.acme",
            "declarations": [
                {
                    "$class": "concerto.metamodel.ConceptDeclaration",
                    "name": "Address",
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "city" }
                    ]
                },
                {
                    "$class": "concerto.metamodel.ParticipantDeclaration",
                    "name": "Person",
                    "identifiedBy": "email",
                    "properties": [
                        { "$class": "concerto.metamodel.StringProperty", "name": "email" },
                        {
                            "$class": "concerto.metamodel.ObjectProperty",
                            "name": "home",
                            "type": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Address" }
                        }
                    ]
                }
            ]
        }"#,
    );
    let person = manager.get_type("org.acme.Person").expect("type");
    let city = person
        .get_nested_property(&manager, "home.city")
        .expect("nested property");
    assert_eq!(city.name(), "city");

    // a primitive segment cannot be navigated through
    assert!(person.get_nested_property(&manager, "email.anything").is_err());
    assert!(person.get_nested_property(&manager, "home.missing").is_err());
}
