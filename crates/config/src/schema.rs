use jsonschema::Validator;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

const SCHEMA_JSON: &str = include_str!("../../../assets/hosts.schema.json");

/// A validation error with path and message.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Result of registry validation.
#[derive(Debug)]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<ValidationError>),
}

/// Returns the embedded JSON schema of the host registry.
pub fn schema() -> &'static str {
    SCHEMA_JSON
}

fn validator() -> &'static Validator {
    static VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
        let schema: Value =
            serde_json::from_str(SCHEMA_JSON).expect("embedded schema should be valid JSON");
        Validator::new(&schema).expect("embedded schema should be a valid JSON Schema")
    });
    &VALIDATOR
}

/// Turns a JSON pointer such as `/gpu1/user` into `gpu1.user`.
fn field_path(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

/// Checks a decoded registry document: a mapping of alias to a flat mapping
/// of string fields.
///
/// # Panics
///
/// Panics if the embedded schema is invalid JSON or not a valid JSON Schema.
/// The schema is embedded at compile time and covered by tests.
pub fn validate(value: &Value) -> ValidationResult {
    let errors: Vec<ValidationError> = validator()
        .iter_errors(value)
        .map(|e| ValidationError {
            path: field_path(&e.instance_path.to_string()),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        return ValidationResult::Valid;
    }
    ValidationResult::Invalid(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_valid_json() {
        let schema: Value = serde_json::from_str(schema()).unwrap();
        assert!(schema.is_object());
        assert!(schema.get("$schema").is_some());
    }

    #[test]
    fn test_validate_valid_registry() {
        let value = serde_json::json!({
            "gpu1": {"host": "gpu1", "user": "alice", "hostname": "gpu1.lab"},
            "login": {"host": "login", "custom_field": "kept"}
        });
        assert!(matches!(validate(&value), ValidationResult::Valid));
    }

    #[test]
    fn test_validate_rejects_non_mapping_host() {
        let value = serde_json::json!({"gpu1": ["not", "a", "mapping"]});
        assert!(matches!(validate(&value), ValidationResult::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_nested_values() {
        let value = serde_json::json!({"gpu1": {"host": "gpu1", "ports": [22, 2222]}});
        match validate(&value) {
            ValidationResult::Invalid(errors) => {
                assert!(errors.iter().any(|e| e.path.contains("ports")));
            }
            ValidationResult::Valid => panic!("Expected validation error"),
        }
    }

    #[test]
    fn test_validate_rejects_empty_alias() {
        let value = serde_json::json!({"gpu1": {"host": ""}});
        assert!(matches!(validate(&value), ValidationResult::Invalid(_)));
    }

    #[test]
    fn test_error_paths_name_host_and_field() {
        let value = serde_json::json!({"gpu1": {"host": "gpu1", "user": 7}});
        let ValidationResult::Invalid(errors) = validate(&value) else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].path, "gpu1.user");
        assert!(errors[0].to_string().starts_with("gpu1.user: "));
    }

    #[test]
    fn test_field_path() {
        assert_eq!(field_path(""), "");
        assert_eq!(field_path("/gpu1/user"), "gpu1.user");
        assert_eq!(field_path("/a~1b/c~0d"), "a/b.c~d");
    }
}
