//! Tagged input schemas
//!
//! Tools and prompts declare their inputs as an ordered list of
//! `name -> primitive type` entries. The same declaration renders the JSON
//! Schema shown in `tools/list`, the argument list shown in `prompts/list`,
//! and validates incoming arguments before any handler runs.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Number, Value};

use crate::types::prompt::PromptArgument;
use crate::types::tool::ToolSchema;

/// Primitive type tag for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamType {
    /// JSON Schema `type` keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
        }
    }

    /// Prompt arguments arrive as strings; lift one into this type.
    fn coerce(&self, raw: &str) -> Option<Value> {
        match self {
            ParamType::String => Some(Value::String(raw.to_string())),
            ParamType::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            ParamType::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            ParamType::Boolean => match raw.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
}

/// Ordered parameter declarations for one tool or prompt.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        });
        self
    }

    pub fn optional(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            param_type,
            required: false,
            description: description.into(),
        });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Check a tool argument map.
    ///
    /// Declared parameters are type-checked and required ones must be present.
    /// A `null` for an optional parameter counts as absent. Undeclared keys are
    /// dropped from the validated arguments.
    pub fn validate(&self, args: &Map<String, Value>) -> Validation {
        let mut validated = Map::new();

        for spec in &self.params {
            match args.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Validation::Invalid(format!(
                        "Missing required argument: {}",
                        spec.name
                    ));
                }
                None | Some(Value::Null) => {}
                Some(value) if spec.param_type.accepts(value) => {
                    validated.insert(spec.name.clone(), value.clone());
                }
                Some(value) => {
                    return Validation::Invalid(format!(
                        "Invalid type for argument '{}': expected {}, got {}",
                        spec.name,
                        spec.param_type,
                        json_type_name(value)
                    ));
                }
            }
        }

        Validation::Valid(ValidatedArgs(validated))
    }

    /// Check prompt arguments, which MCP always sends as strings.
    pub fn validate_strings(&self, args: &HashMap<String, String>) -> Validation {
        let mut validated = Map::new();

        for spec in &self.params {
            match args.get(&spec.name) {
                None if spec.required => {
                    return Validation::Invalid(format!(
                        "Missing required argument: {}",
                        spec.name
                    ));
                }
                None => {}
                Some(raw) => match spec.param_type.coerce(raw) {
                    Some(value) => {
                        validated.insert(spec.name.clone(), value);
                    }
                    None => {
                        return Validation::Invalid(format!(
                            "Invalid value for argument '{}': expected {}",
                            spec.name, spec.param_type
                        ));
                    }
                },
            }
        }

        Validation::Valid(ValidatedArgs(validated))
    }

    /// JSON Schema object for `tools/list`.
    pub fn to_tool_schema(&self) -> ToolSchema {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for spec in &self.params {
            let mut prop = Map::new();
            prop.insert("type".to_string(), Value::from(spec.param_type.as_str()));
            if !spec.description.is_empty() {
                prop.insert(
                    "description".to_string(),
                    Value::from(spec.description.clone()),
                );
            }
            properties.insert(spec.name.clone(), Value::Object(prop));
            if spec.required {
                required.push(spec.name.clone());
            }
        }

        ToolSchema::object(properties, required)
    }

    /// Argument list for `prompts/list`.
    pub fn to_prompt_arguments(&self) -> Vec<PromptArgument> {
        self.params
            .iter()
            .map(|spec| PromptArgument::new(&spec.name, &spec.description, spec.required))
            .collect()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Outcome of checking arguments against an [`InputSchema`].
#[derive(Debug, Clone)]
pub enum Validation {
    Valid(ValidatedArgs),
    Invalid(String),
}

/// Arguments that passed validation: only declared keys, each of its declared type.
#[derive(Debug, Clone, Default)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query_schema() -> InputSchema {
        InputSchema::new()
            .required("cypher", ParamType::String, "Cypher statement")
            .optional("limit", ParamType::Integer, "")
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_arguments_pass() {
        match query_schema().validate(&args(json!({ "cypher": "RETURN 1", "limit": 5 }))) {
            Validation::Valid(v) => {
                assert_eq!(v.str("cypher"), Some("RETURN 1"));
                assert_eq!(v.i64("limit"), Some(5));
            }
            Validation::Invalid(reason) => panic!("unexpected: {}", reason),
        }
    }

    #[test]
    fn test_missing_required_rejected() {
        match query_schema().validate(&Map::new()) {
            Validation::Invalid(reason) => assert!(reason.contains("cypher")),
            Validation::Valid(_) => panic!("missing cypher should be rejected"),
        }
    }

    #[test]
    fn test_wrong_type_rejected() {
        match query_schema().validate(&args(json!({ "cypher": 42 }))) {
            Validation::Invalid(reason) => {
                assert!(reason.contains("expected string"));
                assert!(reason.contains("got integer"));
            }
            Validation::Valid(_) => panic!("numeric cypher should be rejected"),
        }
    }

    #[test]
    fn test_float_is_not_integer() {
        assert!(matches!(
            query_schema().validate(&args(json!({ "cypher": "x", "limit": 1.5 }))),
            Validation::Invalid(_)
        ));
        assert!(ParamType::Number.accepts(&json!(1)));
    }

    #[test]
    fn test_undeclared_keys_dropped() {
        match query_schema().validate(&args(json!({ "cypher": "x", "extra": true }))) {
            Validation::Valid(v) => {
                assert!(v.get("extra").is_none());
                assert_eq!(v.into_inner().len(), 1);
            }
            Validation::Invalid(reason) => panic!("unexpected: {}", reason),
        }
    }

    #[test]
    fn test_null_optional_is_absent() {
        match query_schema().validate(&args(json!({ "cypher": "x", "limit": null }))) {
            Validation::Valid(v) => assert!(v.get("limit").is_none()),
            Validation::Invalid(reason) => panic!("unexpected: {}", reason),
        }
    }

    #[test]
    fn test_string_arguments_coerced() {
        let schema = InputSchema::new()
            .required("question", ParamType::String, "")
            .optional("depth", ParamType::Integer, "");
        let raw = HashMap::from([
            ("question".to_string(), "count nodes".to_string()),
            ("depth".to_string(), "3".to_string()),
        ]);

        match schema.validate_strings(&raw) {
            Validation::Valid(v) => {
                assert_eq!(v.str("question"), Some("count nodes"));
                assert_eq!(v.i64("depth"), Some(3));
            }
            Validation::Invalid(reason) => panic!("unexpected: {}", reason),
        }

        let bad = HashMap::from([
            ("question".to_string(), "q".to_string()),
            ("depth".to_string(), "deep".to_string()),
        ]);
        assert!(matches!(schema.validate_strings(&bad), Validation::Invalid(_)));
    }

    #[test]
    fn test_tool_schema_rendering() {
        let json = serde_json::to_value(query_schema().to_tool_schema()).unwrap();

        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"]["cypher"]["type"], "string");
        assert_eq!(json["properties"]["cypher"]["description"], "Cypher statement");
        assert!(json["properties"]["limit"].get("description").is_none());
        assert_eq!(json["required"], json!(["cypher"]));
    }

    #[test]
    fn test_prompt_arguments_rendering() {
        let arguments = query_schema().to_prompt_arguments();
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[0].name, "cypher");
        assert_eq!(arguments[0].required, Some(true));
        assert_eq!(arguments[1].required, Some(false));
    }
}
