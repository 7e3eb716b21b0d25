//! Runtime values passed into and out of node functions.

use std::fmt;

use serde::Serialize;

use crate::error::NodeError;
use crate::model::property::PropertyValue;
use crate::model::socket::SocketType;

pub const IDENTITY: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// One atomic payload held by a level-0 container.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    Vector([f64; 3]),
    Matrix([[f64; 4]; 4]),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn socket_type(&self) -> SocketType {
        match self {
            Value::Float(_) => SocketType::Float,
            Value::Int(_) => SocketType::Int,
            Value::Bool(_) => SocketType::Bool,
            Value::Vector(_) => SocketType::Vector,
            Value::Matrix(_) => SocketType::Matrix,
            Value::Text(_) => SocketType::Text,
            Value::List(_) => SocketType::List,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<[f64; 3]> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<[[f64; 4]; 4]> {
        match self {
            Value::Matrix(m) => Some(*m),
            _ => None,
        }
    }

    /// Builds a runtime value from a stored property, coerced to `declared`
    /// where the stored representation differs (e.g. `0` for a float socket).
    pub fn from_property(value: &PropertyValue, declared: SocketType) -> Value {
        let raw = Value::from(value);
        match (declared, &raw) {
            (SocketType::Float, Value::Int(i)) => Value::Float(*i as f64),
            (SocketType::Int, Value::Float(f)) if f.fract() == 0.0 => Value::Int(*f as i64),
            (SocketType::Vector, Value::Float(f)) => Value::Vector([*f, *f, *f]),
            (SocketType::Vector, Value::List(items)) if items.len() == 3 => {
                let xs: Vec<f64> = items.iter().filter_map(Value::as_float).collect();
                if xs.len() == 3 {
                    Value::Vector([xs[0], xs[1], xs[2]])
                } else {
                    raw
                }
            }
            (SocketType::Matrix, Value::List(items)) if items.len() == 16 => {
                let xs: Vec<f64> = items.iter().filter_map(Value::as_float).collect();
                if xs.len() == 16 {
                    let mut m = [[0.0; 4]; 4];
                    for (i, x) in xs.into_iter().enumerate() {
                        m[i / 4][i % 4] = x;
                    }
                    Value::Matrix(m)
                } else {
                    raw
                }
            }
            _ => raw,
        }
    }
}

/// Row-major flattening of a matrix, as stored in property arrays.
pub fn flatten_matrix(m: &[[f64; 4]; 4]) -> Vec<f64> {
    m.iter().flat_map(|row| row.iter().copied()).collect()
}

impl From<&PropertyValue> for Value {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Integer(i) => Value::Int(*i),
            PropertyValue::Number(n) => Value::Float(n.into_inner()),
            PropertyValue::Boolean(b) => Value::Bool(*b),
            PropertyValue::String(s) => Value::Text(s.clone()),
            PropertyValue::Vec3(v) => Value::Vector(v.to_array()),
            PropertyValue::Array(items) => Value::List(items.iter().map(Value::from).collect()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Vector([x, y, z]) => write!(f, "({}, {}, {})", x, y, z),
            Value::Matrix(m) => write!(f, "{:?}", m),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// An argument to, or a result of, one function call.
///
/// Level-0 parameters and returns carry `One`; level-1 parameters and returns
/// carry the whole flat sequence as `Many`.
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    One(Value),
    Many(Vec<Value>),
}

impl Data {
    pub fn values(&self) -> &[Value] {
        match self {
            Data::One(v) => std::slice::from_ref(v),
            Data::Many(vs) => vs,
        }
    }

    pub fn value(&self, index: usize) -> Result<&Value, NodeError> {
        match self {
            Data::One(v) => Ok(v),
            Data::Many(_) => Err(NodeError::invalid_input(index, "expected a single value")),
        }
    }

    /// Reads a level-0 float argument. `index` names the parameter in errors.
    pub fn float(&self, index: usize) -> Result<f64, NodeError> {
        self.value(index)?
            .as_float()
            .ok_or_else(|| NodeError::invalid_input(index, "expected a number"))
    }

    pub fn int(&self, index: usize) -> Result<i64, NodeError> {
        self.value(index)?
            .as_int()
            .ok_or_else(|| NodeError::invalid_input(index, "expected an integer"))
    }

    pub fn vector(&self, index: usize) -> Result<[f64; 3], NodeError> {
        self.value(index)?
            .as_vector()
            .ok_or_else(|| NodeError::invalid_input(index, "expected a vector"))
    }

    pub fn matrix(&self, index: usize) -> Result<[[f64; 4]; 4], NodeError> {
        self.value(index)?
            .as_matrix()
            .ok_or_else(|| NodeError::invalid_input(index, "expected a matrix"))
    }
}

/// What a function call hands back to the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Returned {
    /// Pure side effect; nothing to write.
    Nothing,
    /// One entry per declared output, positionally aligned.
    Outputs(Vec<Data>),
    /// One row per produced element, each row holding one value per declared
    /// output. Transposed into per-output columns before writing.
    Rows(Vec<Vec<Value>>),
}

impl Returned {
    pub fn one(value: impl Into<Value>) -> Self {
        Returned::Outputs(vec![Data::One(value.into())])
    }

    pub fn many(values: Vec<Value>) -> Self {
        Returned::Outputs(vec![Data::Many(values)])
    }
}
