//! Ordered metadata tree carried by every product

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Typed value of a metadata attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Double(f64),
    Utc(DateTime<Utc>),
}

impl AttributeValue {
    /// Convert to the variant of `template`, used when a key already has a schema type.
    /// Conversions that cannot succeed keep the incoming value unchanged.
    fn coerce_like(self, template: &AttributeValue) -> AttributeValue {
        match (template, self) {
            (AttributeValue::Int(_), AttributeValue::Double(v)) => AttributeValue::Int(v as i64),
            (AttributeValue::Double(_), AttributeValue::Int(v)) => AttributeValue::Double(v as f64),
            (AttributeValue::String(_), AttributeValue::Int(v)) => AttributeValue::String(v.to_string()),
            (AttributeValue::String(_), AttributeValue::Double(v)) => AttributeValue::String(v.to_string()),
            (_, value) => value,
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{}", s),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Double(v) => write!(f, "{}", v),
            AttributeValue::Utc(t) => write!(f, "{}", t.format("%d-%b-%Y %H:%M:%S%.6f")),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttributeValue::Utc(v)
    }
}

/// Named, unit-tagged attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataAttribute {
    pub name: String,
    pub value: AttributeValue,
    pub unit: String,
    pub description: String,
}

impl MetadataAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: String::new(),
            description: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: &str, description: &str) -> Self {
        self.unit = unit.to_string();
        self.description = description.to_string();
        self
    }
}

/// Metadata element with ordered attributes and child elements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataElement {
    name: String,
    attributes: Vec<MetadataAttribute>,
    elements: Vec<MetadataElement>,
}

impl MetadataElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn attributes(&self) -> &[MetadataAttribute] {
        &self.attributes
    }

    pub fn elements(&self) -> &[MetadataElement] {
        &self.elements
    }

    pub fn element(&self, name: &str) -> Option<&MetadataElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn element_mut(&mut self, name: &str) -> Option<&mut MetadataElement> {
        self.elements.iter_mut().find(|e| e.name == name)
    }

    pub fn add_element(&mut self, element: MetadataElement) {
        self.elements.push(element);
    }

    /// Child element by name, created empty if missing
    pub fn element_or_insert(&mut self, name: &str) -> &mut MetadataElement {
        let idx = match self.elements.iter().position(|e| e.name == name) {
            Some(idx) => idx,
            None => {
                self.elements.push(MetadataElement::new(name));
                self.elements.len() - 1
            }
        };
        &mut self.elements[idx]
    }

    pub fn attribute(&self, name: &str) -> Option<&MetadataAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Append an attribute, replacing any previous one with the same name in place
    pub fn add_attribute(&mut self, attribute: MetadataAttribute) {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    /// Set a value. An existing attribute keeps its unit, description and value type.
    pub fn set_value(&mut self, name: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value.coerce_like(&existing.value),
            None => self.attributes.push(MetadataAttribute::new(name, value)),
        }
    }

    pub fn attribute_string(&self, name: &str, default: &str) -> String {
        match self.attribute(name).map(|a| &a.value) {
            Some(AttributeValue::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => default.to_string(),
        }
    }

    /// Present string value, `None` if the attribute is missing
    pub fn attribute_string_opt(&self, name: &str) -> Option<String> {
        self.attribute(name).map(|a| match &a.value {
            AttributeValue::String(s) => s.clone(),
            value => value.to_string(),
        })
    }

    pub fn attribute_int(&self, name: &str, default: i64) -> i64 {
        match self.attribute(name).map(|a| &a.value) {
            Some(AttributeValue::Int(v)) => *v,
            Some(AttributeValue::Double(v)) => *v as i64,
            Some(AttributeValue::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn attribute_double(&self, name: &str, default: f64) -> f64 {
        match self.attribute(name).map(|a| &a.value) {
            Some(AttributeValue::Double(v)) => *v,
            Some(AttributeValue::Int(v)) => *v as f64,
            Some(AttributeValue::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn attribute_utc(&self, name: &str, default: DateTime<Utc>) -> DateTime<Utc> {
        match self.attribute(name).map(|a| &a.value) {
            Some(AttributeValue::Utc(t)) => *t,
            _ => default,
        }
    }
}
