//! Concerto RS
//!
//! A Rust runtime for Accord Project Concerto data models: load metamodel
//! ASTs into a validated, namespace-aware declaration graph, then build
//! typed instances against it, round-trip them through the canonical JSON
//! wire form, and generate sample instances.
//!
//! The textual `.cto` parser is an external collaborator; this crate
//! consumes the JSON AST it produces (see [`metamodel`]) via
//! [`ModelManager::add_model_json`].
//!
//! ```
//! use concerto_rs::{Factory, InstanceOptions, ModelManager, Serializer};
//!
//! # fn main() -> concerto_rs::ConcertoResult<()> {
//! let mut manager = ModelManager::new()?;
//! manager.add_model_json(
//!     r#"{
//!         "$class": "concerto.metamodel.Model",
//!         "namespace": "org.acme.sample",
//!         "declarations": [
//!             {
//!                 "$class": "concerto.metamodel.AssetDeclaration",
//!                 "name": "SampleAsset",
//!                 "identifiedBy": "assetId",
//!                 "properties": [
//!                     { "$class": "concerto.metamodel.StringProperty", "name": "assetId" }
//!                 ]
//!             }
//!         ]
//!     }"#,
//! )?;
//!
//! let factory = Factory::new(&manager);
//! let asset = factory.new_resource(
//!     "org.acme.sample",
//!     "SampleAsset",
//!     Some("1"),
//!     &InstanceOptions::default(),
//! )?;
//!
//! let serializer = Serializer::new(&manager);
//! let json = serializer.to_json(&asset, None)?;
//! assert_eq!(json["$identifier"], "1");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod factory;
pub mod generator;
pub mod instance;
pub mod introspect;
pub mod metamodel;
pub mod model_file;
pub mod model_manager;
pub mod model_util;
pub mod serializer;
pub mod visitor;
pub mod writer;

pub use error::{ConcertoError, ConcertoResult};
pub use factory::{Factory, InstanceOptions};
pub use generator::{
    EmptyValueGenerator, GenerationMode, GeneratorOptions, InstanceGenerator,
    SampleValueGenerator, ValueGenerator,
};
pub use instance::{Instance, Relationship, Value};
pub use introspect::{ClassDeclaration, DeclarationKind, Property, PropertyKind};
pub use model_file::ModelFile;
pub use model_manager::{ModelFileDownloader, ModelManager};
pub use serializer::{Serializer, SerializerOptions};
pub use visitor::{Node, Visitor};
pub use writer::{FileWriter, InMemoryFileWriter};

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MODEL: &str = r#"{
        "$class": "concerto.metamodel.Model",
        "namespace": "org.acme.sample",
        "declarations": [
            {
                "$class": "concerto.metamodel.AssetDeclaration",
                "name": "SampleAsset",
                "identifiedBy": "assetId",
                "properties": [
                    { "$class": "concerto.metamodel.StringProperty", "name": "assetId" },
                    {
                        "$class": "concerto.metamodel.RelationshipProperty",
                        "name": "owner",
                        "type": { "$class": "concerto.metamodel.TypeIdentifier", "name": "SampleParticipant" }
                    },
                    { "$class": "concerto.metamodel.StringProperty", "name": "stringValue" },
                    { "$class": "concerto.metamodel.DoubleProperty", "name": "doubleValue" }
                ]
            },
            {
                "$class": "concerto.metamodel.ParticipantDeclaration",
                "name": "SampleParticipant",
                "identifiedBy": "participantId",
                "properties": [
                    { "$class": "concerto.metamodel.StringProperty", "name": "participantId" },
                    { "$class": "concerto.metamodel.StringProperty", "name": "firstName" },
                    { "$class": "concerto.metamodel.StringProperty", "name": "lastName" }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_load_and_introspect() {
        let mut manager = ModelManager::new().expect("manager");
        manager.add_model_json(SAMPLE_MODEL).expect("model should load");

        let asset = manager.get_type("org.acme.sample.SampleAsset").expect("type");
        assert_eq!(asset.name(), "SampleAsset");
        assert!(asset.is_identifiable());
        assert_eq!(
            asset.identifier_field_name(&manager).expect("id"),
            Some("assetId".to_string())
        );
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let mut manager = ModelManager::new().expect("manager");
        let result = manager.add_model_json("{ invalid json }");
        assert!(result.is_err(), "invalid JSON should fail to load");
    }

    #[test]
    fn test_end_to_end_round_trip() {
        let mut manager = ModelManager::new().expect("manager");
        manager.add_model_json(SAMPLE_MODEL).expect("model should load");

        let factory = Factory::new(&manager);
        let mut asset = factory
            .new_resource(
                "org.acme.sample",
                "SampleAsset",
                Some("1"),
                &InstanceOptions::default(),
            )
            .expect("asset");
        asset.set_property(
            "owner",
            Value::Relationship(
                factory
                    .new_relationship("org.acme.sample", "SampleParticipant", "alice@email.com")
                    .expect("relationship"),
            ),
        );
        asset.set_property("stringValue", Value::String("the value".to_string()));
        asset.set_property("doubleValue", Value::Double(3.14));

        let serializer = Serializer::new(&manager);
        let json = serializer.to_json(&asset, None).expect("serialize");
        let restored = serializer.from_json(&json, None).expect("deserialize");
        assert_eq!(restored, asset);
    }
}
