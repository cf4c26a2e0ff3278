//! Serializer option semantics: default merging, relationship
//! conversions, timestamps and polymorphism.

use chrono::{DateTime, FixedOffset};
use concerto_rs::{
    Factory, InstanceOptions, ModelManager, Relationship, Serializer, SerializerOptions, Value,
};
use pretty_assertions::assert_eq;

const MODEL: &str = r#"{
    "$class": "concerto.metamodel.Model",
    "namespace": "org.acme.library",
    "declarations": [
        {
            "$class": "concerto.metamodel.ParticipantDeclaration",
            "name": "Member",
            "identifiedBy": "email",
            "properties": [
                { "$class": "concerto.metamodel.StringProperty", "name": "email" },
                { "$class": "concerto.metamodel.StringProperty", "name": "nickname", "isOptional": true }
            ]
        },
        {
            "$class": "concerto.metamodel.ParticipantDeclaration",
            "name": "Librarian",
            "superType": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Member" },
            "properties": [
                { "$class": "concerto.metamodel.StringProperty", "name": "desk" }
            ]
        },
        {
            "$class": "concerto.metamodel.AssetDeclaration",
            "name": "Book",
            "identifiedBy": "isbn",
            "properties": [
                { "$class": "concerto.metamodel.StringProperty", "name": "isbn" },
                {
                    "$class": "concerto.metamodel.RelationshipProperty",
                    "name": "borrower",
                    "type": { "$class": "concerto.metamodel.TypeIdentifier", "name": "Member" }
                },
                { "$class": "concerto.metamodel.DateTimeProperty", "name": "dueDate", "isOptional": true }
            ]
        }
    ]
}"#;

fn loaded_manager() -> ModelManager {
    let mut manager = ModelManager::new().expect("manager");
    manager.add_model_json(MODEL).expect("model should load");
    manager
}

fn member(manager: &ModelManager, email: &str) -> concerto_rs::Instance {
    Factory::new(manager)
        .new_resource(
            "org.acme.library",
            "Member",
            Some(email),
            &InstanceOptions::default(),
        )
        .expect("member")
}

#[test]
fn test_default_options_merge_per_call() {
    let manager = loaded_manager();
    let mut serializer = Serializer::new(&manager);

    let book = Factory::new(&manager)
        .new_resource(
            "org.acme.library",
            "Book",
            Some("0141439513"),
            &InstanceOptions::default(),
        )
        .expect("book");
    // borrower is missing, so default validation fails
    assert!(serializer.to_json(&book, None).is_err());

    // a per-serializer default of validate=false lets it through
    serializer.set_default_options(SerializerOptions {
        validate: Some(false),
        ..SerializerOptions::default()
    });
    serializer.to_json(&book, None).expect("lenient default");

    // a present per-call key overrides the default, even back to true
    let strict = SerializerOptions {
        validate: Some(true),
        ..SerializerOptions::default()
    };
    assert!(serializer.to_json(&book, Some(&strict)).is_err());
}

#[test]
fn test_relationship_value_and_conversion_options() {
    let manager = loaded_manager();
    let serializer = Serializer::new(&manager);
    let factory = Factory::new(&manager);

    let mut book = factory
        .new_resource(
            "org.acme.library",
            "Book",
            Some("0141439513"),
            &InstanceOptions::default(),
        )
        .expect("book");
    // a full resource sitting in a relationship slot
    book.set_property(
        "borrower",
        Value::Instance(Box::new(member(&manager, "alice@email.com"))),
    );

    // rejected by default
    assert!(serializer.to_json(&book, None).is_err());

    // convertResourcesToRelationships collapses it to a URI
    let convert = SerializerOptions {
        convert_resources_to_relationships: Some(true),
        ..SerializerOptions::default()
    };
    let json = serializer.to_json(&book, Some(&convert)).expect("converted");
    assert_eq!(
        json.get("borrower").and_then(|v| v.as_str()),
        Some("resource:org.acme.library.Member#alice@email.com")
    );

    // permitResourcesForRelationships embeds the full resource instead
    let permit = SerializerOptions {
        permit_resources_for_relationships: Some(true),
        ..SerializerOptions::default()
    };
    let json = serializer.to_json(&book, Some(&permit)).expect("embedded");
    assert_eq!(
        json.get("borrower")
            .and_then(|v| v.get("$class"))
            .and_then(|v| v.as_str()),
        Some("org.acme.library.Member")
    );
    let restored = serializer.from_json(&json, Some(&permit)).expect("read back");
    assert!(matches!(
        restored.get_property("borrower"),
        Some(Value::Instance(_))
    ));
}

#[test]
fn test_relationship_short_uri_uses_declared_target() {
    let manager = loaded_manager();
    let serializer = Serializer::new(&manager);
    let json = serde_json::json!({
        "$class": "org.acme.library.Book",
        "isbn": "0141439513",
        "borrower": "resource:#bob@email.com"
    });
    let book = serializer.from_json(&json, None).expect("short form");
    assert_eq!(
        book.get_property("borrower"),
        Some(&Value::Relationship(Relationship::new(
            "org.acme.library.Member",
            "bob@email.com"
        )))
    );
}

#[test]
fn test_polymorphic_relationship_and_field() {
    let manager = loaded_manager();
    let serializer = Serializer::new(&manager);

    // a Librarian is assignable where a Member is declared
    let json = serde_json::json!({
        "$class": "org.acme.library.Book",
        "$identifier": "0141439513",
        "isbn": "0141439513",
        "borrower": "resource:org.acme.library.Librarian#carol@email.com"
    });
    let book = serializer.from_json(&json, None).expect("subtype relationship");
    let emitted = serializer.to_json(&book, None).expect("serialize");
    assert_eq!(emitted, json);

    // a Book is not
    let bad = serde_json::json!({
        "$class": "org.acme.library.Book",
        "isbn": "0141439513",
        "borrower": "resource:org.acme.library.Book#999"
    });
    assert!(serializer.from_json(&bad, None).is_err());
}

#[test]
fn test_deserialization_trusts_the_concrete_class() {
    let manager = loaded_manager();
    let serializer = Serializer::new(&manager);
    let json = serde_json::json!({
        "$class": "org.acme.library.Librarian",
        "email": "carol@email.com",
        "desk": "front"
    });
    let librarian = serializer.from_json(&json, None).expect("deserialize");
    assert_eq!(librarian.class_name(), "org.acme.library.Librarian");
    // inherited and own properties both present, ancestors first
    let emitted = serializer.to_json(&librarian, None).expect("serialize");
    assert_eq!(
        serde_json::to_string(&emitted).expect("stringify"),
        r#"{"$class":"org.acme.library.Librarian","$identifier":"carol@email.com","email":"carol@email.com","desk":"front"}"#
    );
}

#[test]
fn test_missing_class_and_unresolvable_class() {
    let manager = loaded_manager();
    let serializer = Serializer::new(&manager);

    let missing = serde_json::json!({ "email": "x@y.z" });
    assert!(serializer.from_json(&missing, None).is_err());

    let unknown = serde_json::json!({ "$class": "org.acme.library.Ghost" });
    let error = serializer.from_json(&unknown, None).expect_err("unknown type");
    assert!(matches!(error, concerto_rs::ConcertoError::TypeNotFound { .. }));
}

#[test]
fn test_datetime_offset_emission() {
    let manager = loaded_manager();
    let serializer = Serializer::new(&manager);

    let timestamp: DateTime<FixedOffset> =
        DateTime::parse_from_rfc3339("2023-06-01T12:00:00.000Z").expect("timestamp");
    let mut book = Factory::new(&manager)
        .new_resource(
            "org.acme.library",
            "Book",
            Some("0141439513"),
            &InstanceOptions::default(),
        )
        .expect("book");
    book.set_property(
        "borrower",
        Value::Relationship(Relationship::new("org.acme.library.Member", "alice@email.com")),
    );
    book.set_property("dueDate", Value::DateTime(timestamp));

    let utc = serializer.to_json(&book, None).expect("utc");
    assert_eq!(
        utc.get("dueDate").and_then(|v| v.as_str()),
        Some("2023-06-01T12:00:00.000Z")
    );

    let offset = SerializerOptions {
        utc_offset: Some(120),
        ..SerializerOptions::default()
    };
    let shifted = serializer.to_json(&book, Some(&offset)).expect("offset");
    assert_eq!(
        shifted.get("dueDate").and_then(|v| v.as_str()),
        Some("2023-06-01T14:00:00.000+02:00")
    );

    // both spellings denote the same instant when read back
    let restored = serializer.from_json(&shifted, None).expect("read back");
    assert_eq!(restored.get_property("dueDate"), Some(&Value::DateTime(timestamp)));
}

#[test]
fn test_include_optional_fields_emits_nulls() {
    let manager = loaded_manager();
    let serializer = Serializer::new(&manager);
    let mut carol = member(&manager, "carol@email.com");
    carol.set_property("nickname", Value::Null);

    let bare = serializer.to_json(&carol, None).expect("bare");
    assert!(bare.get("nickname").is_none());

    let with_optionals = SerializerOptions {
        include_optional_fields: Some(true),
        ..SerializerOptions::default()
    };
    let json = serializer.to_json(&carol, Some(&with_optionals)).expect("with nulls");
    assert_eq!(json.get("nickname"), Some(&serde_json::Value::Null));
}
