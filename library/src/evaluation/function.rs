//! Compiled, introspectable node signatures.

use std::fmt;

use super::value::{Data, Returned};
use crate::error::NodeError;
use crate::model::socket::SocketType;

/// Callable behind a function descriptor.
///
/// Stateless functions only implement `call`. Stateful ones also implement
/// `start`/`stop`, which bracket every call made for one node in one run.
pub trait NodeFunction: Send {
    fn call(&mut self, args: &[Data]) -> Result<Returned, NodeError>;

    fn start(&mut self) -> Result<(), NodeError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), NodeError> {
        Ok(())
    }
}

/// Adapts a plain closure into a stateless [`NodeFunction`].
pub struct PureFn<F>(pub F);

impl<F> NodeFunction for PureFn<F>
where
    F: Fn(&[Data]) -> Result<Returned, NodeError> + Send,
{
    fn call(&mut self, args: &[Data]) -> Result<Returned, NodeError> {
        (self.0)(args)
    }
}

/// Where a parameter's argument comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    /// Input socket index on the node.
    Socket(usize),
    /// Named node property; always read as a level-0 payload.
    Property(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub source: ParamSource,
    pub level: usize,
    pub socket_type: SocketType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Return {
    pub socket_type: SocketType,
    pub level: usize,
}

pub struct FunctionDescriptor {
    /// Function identity, used as the timing report key.
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub returns: Vec<Return>,
    pub is_stateful: bool,
    function: Box<dyn NodeFunction>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, function: Box<dyn NodeFunction>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            returns: Vec::new(),
            is_stateful: false,
            function,
        }
    }

    /// Descriptor for a stateless closure.
    pub fn pure<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Data]) -> Result<Returned, NodeError> + Send + 'static,
    {
        Self::new(name, Box::new(PureFn(f)))
    }

    pub fn with_socket_param(mut self, index: usize, level: usize, socket_type: SocketType) -> Self {
        self.parameters.push(Parameter {
            source: ParamSource::Socket(index),
            level,
            socket_type,
        });
        self
    }

    pub fn with_property_param(mut self, name: &str, socket_type: SocketType) -> Self {
        self.parameters.push(Parameter {
            source: ParamSource::Property(name.to_string()),
            level: 0,
            socket_type,
        });
        self
    }

    pub fn with_return(mut self, socket_type: SocketType, level: usize) -> Self {
        self.returns.push(Return { socket_type, level });
        self
    }

    pub fn stateful(mut self) -> Self {
        self.is_stateful = true;
        self
    }

    pub fn in_levels(&self) -> Vec<usize> {
        self.parameters.iter().map(|p| p.level).collect()
    }

    pub fn out_levels(&self) -> Vec<usize> {
        self.returns.iter().map(|r| r.level).collect()
    }

    /// The parameter fed by input socket `index`, if the function reads it.
    pub fn socket_parameter(&self, index: usize) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.source == ParamSource::Socket(index))
    }

    pub fn function_mut(&mut self) -> &mut dyn NodeFunction {
        self.function.as_mut()
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("returns", &self.returns)
            .field("is_stateful", &self.is_stateful)
            .finish()
    }
}
