//! Core value types shared by every part of the framework
//!
//! Terraform exchanges configuration and state as dynamically typed values.
//! [`Dynamic`] models those values, [`DynamicValue`] adds wire encoding and
//! path-based access, and [`Diagnostic`] carries errors and warnings back to
//! Terraform.

use crate::error::{Result, TfplugError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A Terraform value of any type.
///
/// All numbers are f64 to match Terraform's number type. Objects and maps are
/// both represented as `Map`.
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Dynamic>),
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (only appears during planning)
    Unknown,
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => serializer.serialize_f64(*n),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
            Dynamic::Unknown => {
                if serializer.is_human_readable() {
                    serializer.serialize_str("__unknown__")
                } else {
                    // Terraform's msgpack encoding carries unknown as
                    // extension type 0 with a single zero payload byte.
                    serializer.serialize_newtype_struct(rmp_serde::MSGPACK_EXT_STRUCT_NAME, &UnknownExt)
                }
            }
        }
    }
}

/// The (tag, payload) pair rmp-serde turns into a msgpack extension value.
struct UnknownExt;

impl Serialize for UnknownExt {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTuple;

        struct Payload;

        impl Serialize for Payload {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_bytes(&[0])
            }
        }

        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&0i8)?;
        tuple.serialize_element(&Payload)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a terraform value")
            }

            fn visit_unit<E>(self) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Null)
            }

            fn visit_none<E>(self) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Null)
            }

            fn visit_bool<E>(self, value: bool) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E>(self, value: u64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E>(self, value: f64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                if value == "__unknown__" {
                    Ok(Dynamic::Unknown)
                } else {
                    Ok(Dynamic::String(value.to_string()))
                }
            }

            fn visit_string<E>(self, value: String) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                if value == "__unknown__" {
                    Ok(Dynamic::Unknown)
                } else {
                    Ok(Dynamic::String(value))
                }
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Dynamic::List(vec))
            }

            fn visit_newtype_struct<D>(
                self,
                deserializer: D,
            ) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                // msgpack extension value. Terraform uses ext type 0 for
                // unknown; refined unknowns carry other tags and collapse
                // to plain unknown here.
                struct ExtVisitor;

                impl<'de> Visitor<'de> for ExtVisitor {
                    type Value = ();

                    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                        formatter.write_str("a msgpack extension")
                    }

                    fn visit_seq<V>(self, mut seq: V) -> std::result::Result<(), V::Error>
                    where
                        V: de::SeqAccess<'de>,
                    {
                        let _tag: Option<i8> = seq.next_element()?;
                        let _payload: Option<de::IgnoredAny> = seq.next_element()?;
                        Ok(())
                    }
                }

                deserializer.deserialize_tuple(2, ExtVisitor)?;
                Ok(Dynamic::Unknown)
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut values = HashMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    values.insert(key, value);
                }
                Ok(Dynamic::Map(values))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// A [`Dynamic`] with wire encoding and typed path access.
///
/// This is what crosses the protocol boundary: configuration and state travel
/// as msgpack (with a JSON fallback) inside the protocol's DynamicValue
/// message.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: Dynamic::Unknown,
        }
    }

    /// Empty object value, the usual starting point when building state
    pub fn empty_object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    pub fn encode_msgpack(&self) -> Result<Vec<u8>> {
        match &self.value {
            Dynamic::Null => Ok(vec![]),
            Dynamic::Map(map) => rmp_serde::encode::to_vec(map)
                .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e))),
            _ => rmp_serde::encode::to_vec(&self.value)
                .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e))),
        }
    }

    pub fn decode_msgpack(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }

        // Terraform usually sends an object at the root, so try that first,
        // then a bare value, then a nullable object.
        if let Ok(map) = rmp_serde::decode::from_slice::<HashMap<String, Dynamic>>(data) {
            return Ok(Self {
                value: Dynamic::Map(map),
            });
        }
        if let Ok(value) = rmp_serde::decode::from_slice::<Dynamic>(data) {
            return Ok(Self { value });
        }
        match rmp_serde::decode::from_slice::<Option<HashMap<String, Dynamic>>>(data) {
            Ok(None) => Ok(Self::null()),
            Ok(Some(map)) => Ok(Self {
                value: Dynamic::Map(map),
            }),
            Err(e) => Err(TfplugError::DecodingError(format!(
                "msgpack decoding failed: {}",
                e
            ))),
        }
    }

    pub fn encode_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.value)
            .map_err(|e| TfplugError::EncodingError(format!("json encoding failed: {}", e)))
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        let value = serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?;
        Ok(Self { value })
    }

    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        match self.navigate(path)? {
            Dynamic::String(s) => Ok(s.clone()),
            other => Err(TfplugError::TypeMismatch {
                expected: "string".to_string(),
                actual: type_name(other).to_string(),
            }),
        }
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        match self.navigate(path)? {
            Dynamic::Number(n) => Ok(*n),
            other => Err(TfplugError::TypeMismatch {
                expected: "number".to_string(),
                actual: type_name(other).to_string(),
            }),
        }
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        match self.navigate(path)? {
            Dynamic::Bool(b) => Ok(*b),
            other => Err(TfplugError::TypeMismatch {
                expected: "bool".to_string(),
                actual: type_name(other).to_string(),
            }),
        }
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        match self.navigate(path)? {
            Dynamic::List(l) => Ok(l.clone()),
            other => Err(TfplugError::TypeMismatch {
                expected: "list".to_string(),
                actual: type_name(other).to_string(),
            }),
        }
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        match self.navigate(path)? {
            Dynamic::Map(m) => Ok(m.clone()),
            other => Err(TfplugError::TypeMismatch {
                expected: "map".to_string(),
                actual: type_name(other).to_string(),
            }),
        }
    }

    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    pub fn set_map(&mut self, path: &AttributePath, value: HashMap<String, Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::Map(value))
    }

    pub fn set_null(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Null)
    }

    /// Returns the value at `path`, or null when the path does not resolve.
    pub fn get_value(&self, path: &AttributePath) -> DynamicValue {
        match self.navigate(path) {
            Ok(value) => DynamicValue::new(value.clone()),
            Err(_) => DynamicValue::null(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.value, Dynamic::Unknown)
    }

    fn navigate<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    m.get(name).ok_or_else(|| {
                        TfplugError::Custom(format!("attribute '{}' not found", name))
                    })?
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let idx = *idx as usize;
                    l.get(idx).ok_or_else(|| {
                        TfplugError::Custom(format!("list index {} out of bounds", idx))
                    })?
                }
                _ => return Err(TfplugError::Custom("invalid path navigation".to_string())),
            };
        }

        Ok(current)
    }

    pub fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        if path.steps.is_empty() {
            self.value = new_value;
            return Ok(());
        }

        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        let last_idx = path.steps.len() - 1;

        for (idx, step) in path.steps.iter().enumerate() {
            if idx == last_idx {
                match (current, step) {
                    (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                    | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                        m.insert(name.clone(), new_value);
                        return Ok(());
                    }
                    (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                        let i = *i as usize;
                        if i < l.len() {
                            l[i] = new_value;
                            return Ok(());
                        }
                        return Err(TfplugError::Custom(format!(
                            "list index {} out of bounds",
                            i
                        )));
                    }
                    _ => return Err(TfplugError::Custom("invalid path navigation".to_string())),
                }
            }

            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m
                    .entry(name.clone())
                    .or_insert_with(|| match path.steps.get(idx + 1) {
                        Some(AttributePathStep::ElementKeyInt(_)) => Dynamic::List(Vec::new()),
                        _ => Dynamic::Map(HashMap::new()),
                    }),
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                    let i = *i as usize;
                    if i >= l.len() {
                        return Err(TfplugError::Custom(format!(
                            "list index {} out of bounds",
                            i
                        )));
                    }
                    &mut l[i]
                }
                _ => return Err(TfplugError::Custom("invalid path navigation".to_string())),
            };
        }

        Err(TfplugError::Custom("failed to set value".to_string()))
    }
}

/// Human-readable name of a value's kind, for diagnostics.
pub fn type_name(value: &Dynamic) -> &'static str {
    match value {
        Dynamic::Null => "null",
        Dynamic::Bool(_) => "bool",
        Dynamic::Number(_) => "number",
        Dynamic::String(_) => "string",
        Dynamic::List(_) => "list",
        Dynamic::Map(_) => "map",
        Dynamic::Unknown => "unknown",
    }
}

/// Path to an attribute within a [`DynamicValue`]
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    AttributeName(String),
    ElementKeyString(String),
    ElementKeyInt(i64),
}

/// Stored state handed to the provider for schema upgrades
#[derive(Debug, Clone)]
pub struct RawState {
    pub json: Option<Vec<u8>>,
    pub flatmap: Option<HashMap<String, String>>,
}

/// A warning or error reported back to Terraform
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

/// Capabilities this server reports to Terraform
#[derive(Debug, Clone)]
pub struct ServerCapabilities {
    pub plan_destroy: bool,
    pub get_provider_schema_optional: bool,
    pub move_resource_state: bool,
}

/// Capabilities the Terraform client reported to us
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub deferral_allowed: bool,
    pub write_only_attributes_allowed: bool,
}

/// Configuration values as sent by Terraform
pub type Config = DynamicValue;

/// Resource state values
pub type State = DynamicValue;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_value_string_access() {
        let mut dv = DynamicValue::empty_object();
        dv.set_string(&AttributePath::new("name"), "transit".to_string())
            .unwrap();

        let result = dv.get_string(&AttributePath::new("name")).unwrap();
        assert_eq!(result, "transit");
    }

    #[test]
    fn dynamic_value_nested_access() {
        let mut dv = DynamicValue::empty_object();
        let path = AttributePath::new("config").attribute("controller_ip");
        dv.set_string(&path, "10.0.0.5".to_string()).unwrap();

        let result = dv.get_string(&path).unwrap();
        assert_eq!(result, "10.0.0.5");
    }

    #[test]
    fn dynamic_value_type_mismatch_reports_actual_type() {
        let mut dv = DynamicValue::empty_object();
        dv.set_bool(&AttributePath::new("enabled"), true).unwrap();

        let err = dv.get_string(&AttributePath::new("enabled")).unwrap_err();
        assert!(err.to_string().contains("expected string"));
    }

    #[test]
    fn msgpack_round_trip_preserves_object() {
        let mut dv = DynamicValue::empty_object();
        dv.set_string(&AttributePath::new("gw_name"), "gw1".to_string())
            .unwrap();
        dv.set_number(&AttributePath::new("asn"), 65001.0).unwrap();

        let encoded = dv.encode_msgpack().unwrap();
        let decoded = DynamicValue::decode_msgpack(&encoded).unwrap();

        assert_eq!(
            decoded.get_string(&AttributePath::new("gw_name")).unwrap(),
            "gw1"
        );
        assert_eq!(
            decoded.get_number(&AttributePath::new("asn")).unwrap(),
            65001.0
        );
    }

    #[test]
    fn unknown_encodes_as_msgpack_extension() {
        let encoded = DynamicValue::unknown().encode_msgpack().unwrap();
        assert_eq!(encoded, vec![0xd4, 0x00, 0x00]);

        let decoded = DynamicValue::decode_msgpack(&encoded).unwrap();
        assert!(decoded.is_unknown());
    }

    #[test]
    fn nested_unknown_survives_msgpack_round_trip() {
        let mut dv = DynamicValue::empty_object();
        dv.set_string(&AttributePath::new("gw_name"), "gw1".to_string())
            .unwrap();
        dv.set_value(&AttributePath::new("public_ip"), Dynamic::Unknown)
            .unwrap();

        let encoded = dv.encode_msgpack().unwrap();
        let decoded = DynamicValue::decode_msgpack(&encoded).unwrap();

        assert!(decoded.get_value(&AttributePath::new("public_ip")).is_unknown());
        assert_eq!(
            decoded.get_string(&AttributePath::new("gw_name")).unwrap(),
            "gw1"
        );
    }

    #[test]
    fn empty_msgpack_decodes_to_null() {
        let decoded = DynamicValue::decode_msgpack(&[]).unwrap();
        assert!(decoded.is_null());
    }

    #[test]
    fn list_access() {
        let mut dv = DynamicValue::empty_object();
        dv.set_list(
            &AttributePath::new("cidrs"),
            vec![
                Dynamic::String("10.0.0.0/16".to_string()),
                Dynamic::String("10.1.0.0/16".to_string()),
            ],
        )
        .unwrap();

        let list = dv.get_list(&AttributePath::new("cidrs")).unwrap();
        assert_eq!(list.len(), 2);

        let first = dv
            .get_string(&AttributePath::new("cidrs").index(0))
            .unwrap();
        assert_eq!(first, "10.0.0.0/16");
    }
}
