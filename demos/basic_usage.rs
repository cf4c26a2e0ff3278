use concerto_rs::{
    Factory, GenerationMode, InstanceOptions, ModelManager, Serializer, SerializerOptions, Value,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example 1: load a model and build an asset by hand
    println!("=== Example 1: build and serialize an asset ===");

    let mut manager = ModelManager::new()?;
    manager.add_model_json(include_str!("sample_model.json"))?;

    let factory = Factory::new(&manager);
    let mut asset = factory.new_resource(
        "org.acme.sample",
        "SampleAsset",
        Some("1"),
        &InstanceOptions::default(),
    )?;
    asset.set_property(
        "owner",
        Value::Relationship(factory.new_relationship(
            "org.acme.sample",
            "SampleParticipant",
            "alice@email.com",
        )?),
    );
    asset.set_property("stringValue", Value::String("the value".to_string()));
    asset.set_property("doubleValue", Value::Double(3.14));

    let serializer = Serializer::new(&manager);
    let json = serializer.to_json(&asset, None)?;
    println!("{}", serde_json::to_string_pretty(&json)?);

    // Example 2: round-trip the JSON back into an instance
    println!("\n=== Example 2: deserialize the canonical JSON ===");
    let restored = serializer.from_json(&json, None)?;
    println!(
        "restored {} with identifier {:?}",
        restored.class_name(),
        restored.identifier(&manager)?
    );

    // Example 3: generate a sample participant without validation noise
    println!("\n=== Example 3: generate a sample instance ===");
    let sample = factory.new_resource(
        "org.acme.sample",
        "SampleParticipant",
        None,
        &InstanceOptions {
            generate: Some(GenerationMode::Sample),
            ..InstanceOptions::default()
        },
    )?;
    let options = SerializerOptions {
        validate: Some(false),
        ..SerializerOptions::default()
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serializer.to_json(&sample, Some(&options))?)?
    );

    Ok(())
}
