//! The subset of OpenAPI 3.0 schema objects the gateway understands.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

const REF_PREFIX: &str = "#/components/schemas/";

/// Longest chain of `$ref` hops followed before giving up
pub const MAX_REF_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl SchemaType {
    fn name(self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            SchemaType::String => value.is_string(),
            SchemaType::Integer => value.is_i64() || value.is_u64(),
            SchemaType::Number => value.is_number(),
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Object => value.is_object(),
            SchemaType::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<Schema>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<SchemaType>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Schema>,
    pub additional_properties: Option<AdditionalProperties>,
    pub items: Option<Box<Schema>>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    #[serde(rename = "enum")]
    pub enumeration: Option<Vec<Value>>,
}

/// A value that does not satisfy its schema
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} at '{pointer}'")]
pub struct SchemaViolation {
    /// JSON pointer of the offending value, `/` for the root
    pub pointer: String,
    pub reason: String,
}

fn violation(pointer: &str, reason: impl Into<String>) -> SchemaViolation {
    SchemaViolation {
        pointer: if pointer.is_empty() {
            "/".to_string()
        } else {
            pointer.to_string()
        },
        reason: reason.into(),
    }
}

/// Name of the component a `$ref` points at, if it is a local schema ref
pub fn ref_target(reference: &str) -> Option<&str> {
    reference.strip_prefix(REF_PREFIX)
}

impl Schema {
    /// Follow `$ref` links until a concrete schema is reached.
    pub fn resolve<'a>(
        &'a self,
        components: &'a BTreeMap<String, Schema>,
    ) -> Result<&'a Schema, String> {
        let mut current = self;
        for _ in 0..MAX_REF_DEPTH {
            let Some(reference) = &current.reference else {
                return Ok(current);
            };
            current = ref_target(reference)
                .and_then(|name| components.get(name))
                .ok_or_else(|| reference.clone())?;
        }
        Err(format!("reference chain deeper than {}", MAX_REF_DEPTH))
    }

    /// Collect every `$ref` reachable from this schema without resolving.
    pub fn references<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(reference) = &self.reference {
            out.push(reference);
        }
        for prop in self.properties.values() {
            prop.references(out);
        }
        if let Some(items) = &self.items {
            items.references(out);
        }
        if let Some(AdditionalProperties::Schema(extra)) = &self.additional_properties {
            extra.references(out);
        }
    }

    /// Check `value` against this schema.
    pub fn validate(
        &self,
        value: &Value,
        components: &BTreeMap<String, Schema>,
    ) -> Result<(), SchemaViolation> {
        self.validate_at(value, components, "")
    }

    fn validate_at(
        &self,
        value: &Value,
        components: &BTreeMap<String, Schema>,
        pointer: &str,
    ) -> Result<(), SchemaViolation> {
        let schema = self
            .resolve(components)
            .map_err(|r| violation(pointer, format!("unresolvable schema reference {}", r)))?;

        if value.is_null() && schema.nullable {
            return Ok(());
        }

        if let Some(kind) = schema.kind {
            if !kind.matches(value) {
                return Err(violation(
                    pointer,
                    format!("expected {}, found {}", kind.name(), json_type(value)),
                ));
            }
        }

        if let Some(allowed) = &schema.enumeration {
            if !allowed.contains(value) {
                return Err(violation(pointer, "value is not one of the allowed values"));
            }
        }

        match value {
            Value::String(s) => schema.check_length(s, pointer)?,
            Value::Number(n) => schema.check_range(n.as_f64(), pointer)?,
            Value::Array(items) => {
                if let Some(item_schema) = &schema.items {
                    for (i, item) in items.iter().enumerate() {
                        item_schema.validate_at(item, components, &format!("{}/{}", pointer, i))?;
                    }
                }
            }
            Value::Object(map) => {
                for name in &schema.required {
                    if !map.contains_key(name) {
                        return Err(violation(
                            pointer,
                            format!("missing required property '{}'", name),
                        ));
                    }
                }
                for (name, field) in map {
                    let field_pointer = format!("{}/{}", pointer, name);
                    match (schema.properties.get(name), &schema.additional_properties) {
                        (Some(prop), _) => prop.validate_at(field, components, &field_pointer)?,
                        (None, Some(AdditionalProperties::Allowed(false))) => {
                            return Err(violation(
                                pointer,
                                format!("property '{}' is not allowed", name),
                            ));
                        }
                        (None, Some(AdditionalProperties::Schema(extra))) => {
                            extra.validate_at(field, components, &field_pointer)?
                        }
                        (None, _) => {}
                    }
                }
            }
            Value::Null | Value::Bool(_) => {}
        }

        Ok(())
    }

    fn check_length(&self, s: &str, pointer: &str) -> Result<(), SchemaViolation> {
        let len = s.chars().count();
        if let Some(min) = self.min_length {
            if len < min {
                return Err(violation(
                    pointer,
                    format!("string shorter than minLength {}", min),
                ));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(violation(
                    pointer,
                    format!("string longer than maxLength {}", max),
                ));
            }
        }
        Ok(())
    }

    fn check_range(&self, n: Option<f64>, pointer: &str) -> Result<(), SchemaViolation> {
        let Some(n) = n else { return Ok(()) };
        if let Some(min) = self.minimum {
            if n < min {
                return Err(violation(pointer, format!("number below minimum {}", min)));
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                return Err(violation(pointer, format!("number above maximum {}", max)));
            }
        }
        Ok(())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
