use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use std::hash::{Hash, Hasher};

use super::socket::SocketType;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Vec3 {
    pub x: OrderedFloat<f64>,
    pub y: OrderedFloat<f64>,
    pub z: OrderedFloat<f64>,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: OrderedFloat(x),
            y: OrderedFloat(y),
            z: OrderedFloat(z),
        }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x.into_inner(), self.y.into_inner(), self.z.into_inner()]
    }
}

/// A stored node configuration value or socket default.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(untagged)]
pub enum PropertyValue {
    Integer(i64),
    Number(OrderedFloat<f64>),
    Boolean(bool),
    String(String),
    Vec3(Vec3),
    Array(Vec<PropertyValue>),
}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            PropertyValue::Integer(i) => i.hash(state),
            PropertyValue::Number(n) => n.hash(state),
            PropertyValue::Boolean(b) => b.hash(state),
            PropertyValue::String(s) => s.hash(state),
            PropertyValue::Vec3(v) => v.hash(state),
            PropertyValue::Array(arr) => arr.hash(state),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(OrderedFloat(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(values: Vec<f64>) -> Self {
        PropertyValue::Array(values.into_iter().map(PropertyValue::from).collect())
    }
}

impl From<Vec3> for PropertyValue {
    fn from(value: Vec3) -> Self {
        PropertyValue::Vec3(value)
    }
}

// Define a trait for type-safe extraction from PropertyValue
pub trait TryGetProperty<T> {
    fn try_get(p: &PropertyValue) -> Option<T>;
}

impl TryGetProperty<f64> for f64 {
    fn try_get(p: &PropertyValue) -> Option<f64> {
        match p {
            PropertyValue::Number(v) => Some(v.into_inner()),
            PropertyValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl TryGetProperty<i64> for i64 {
    fn try_get(p: &PropertyValue) -> Option<i64> {
        match p {
            PropertyValue::Integer(v) => Some(*v),
            PropertyValue::Number(v) => {
                // Only convert if it's a whole number and fits in i64
                if v.fract().abs() < f64::EPSILON
                    && *v >= OrderedFloat(i64::MIN as f64)
                    && *v <= OrderedFloat(i64::MAX as f64)
                {
                    Some(v.into_inner() as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl TryGetProperty<String> for String {
    fn try_get(p: &PropertyValue) -> Option<String> {
        match p {
            PropertyValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl PropertyValue {
    pub fn get_as<T: TryGetProperty<T>>(&self) -> Option<T> {
        T::try_get(self)
    }
}

/// Named configuration values stored on a node.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq, Debug)]
#[serde(transparent)]
pub struct PropertyMap {
    properties: HashMap<String, PropertyValue>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self {
            properties: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.properties.iter()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|pv| pv.get_as::<f64>())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|pv| pv.get_as::<i64>())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|pv| pv.get_as::<String>())
    }
}

impl<K: Into<String>> FromIterator<(K, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, PropertyValue)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Declares a node property: its name, type and default value.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    pub name: String,
    pub label: String,
    pub property_type: SocketType,
    pub default_value: PropertyValue,
}

impl PropertyDefinition {
    pub fn new(
        name: &str,
        label: &str,
        property_type: SocketType,
        default_value: PropertyValue,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            property_type,
            default_value,
        }
    }
}
