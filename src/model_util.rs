//! Pure helpers for namespace and type-name handling.

/// The reserved namespace that hosts the five root types.
pub const RESERVED_NAMESPACE: &str = "concerto";

/// Short names of the declarations installed by the root-model bootstrap.
pub const ROOT_TYPE_NAMES: [&str; 5] = ["Concept", "Asset", "Participant", "Transaction", "Event"];

/// The canonical system identifier field.
pub const SYSTEM_IDENTIFIER: &str = "$identifier";

/// The canonical timestamp field carried by transactions and events.
pub const SYSTEM_TIMESTAMP: &str = "$timestamp";

const PRIMITIVE_TYPES: [&str; 6] = ["String", "Boolean", "DateTime", "Double", "Long", "Integer"];

/// Returns the namespace part of a fully qualified name, or the empty
/// string when `fqn` has no namespace segment.
pub fn get_namespace(fqn: &str) -> &str {
    match fqn.rfind('.') {
        Some(idx) => &fqn[..idx],
        None => "",
    }
}

/// Returns the short name part of a fully qualified name.
pub fn get_short_name(fqn: &str) -> &str {
    match fqn.rfind('.') {
        Some(idx) => &fqn[idx + 1..],
        None => fqn,
    }
}

/// Joins a namespace and a short name into a fully qualified name.
/// A short name with no namespace is returned unchanged.
pub fn get_fully_qualified_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Whether `name` is one of the closed set of primitive type names.
pub fn is_primitive(name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&name)
}

/// Whether an import target of the form `org.acme.*` imports a whole
/// namespace rather than a single type.
pub fn is_wildcard_import(target: &str) -> bool {
    target.ends_with(".*")
}

/// Strips the trailing `.*` from a wildcard import target.
pub fn strip_wildcard(target: &str) -> &str {
    target.strip_suffix(".*").unwrap_or(target)
}

/// Whether a property name is one of the `$`-prefixed system fields.
pub fn is_system_property(name: &str) -> bool {
    name == SYSTEM_IDENTIFIER || name == SYSTEM_TIMESTAMP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_and_short_name_splitting() {
        assert_eq!(get_namespace("org.acme.sample.SampleAsset"), "org.acme.sample");
        assert_eq!(get_short_name("org.acme.sample.SampleAsset"), "SampleAsset");
        assert_eq!(get_namespace("SampleAsset"), "");
        assert_eq!(get_short_name("SampleAsset"), "SampleAsset");
        assert_eq!(
            get_fully_qualified_name("org.acme.sample", "SampleAsset"),
            "org.acme.sample.SampleAsset"
        );
        assert_eq!(get_fully_qualified_name("", "String"), "String");
    }

    #[test]
    fn test_primitive_recognition() {
        for p in ["String", "Boolean", "DateTime", "Double", "Long", "Integer"] {
            assert!(is_primitive(p), "{} should be primitive", p);
        }
        assert!(!is_primitive("string"));
        assert!(!is_primitive("Concept"));
        assert!(!is_primitive("Float"));
    }

    #[test]
    fn test_wildcard_import_normalization() {
        assert!(is_wildcard_import("org.acme.*"));
        assert!(!is_wildcard_import("org.acme.Vehicle"));
        assert_eq!(strip_wildcard("org.acme.*"), "org.acme");
        assert_eq!(strip_wildcard("org.acme.Vehicle"), "org.acme.Vehicle");
    }
}
