//! Implicit type adapters between socket types.

use std::collections::HashMap;

use crate::model::socket::SocketType;

/// How to splice an adapter node into a mismatched link.
///
/// The adapter always takes the link's source on `input` and replaces the
/// link with its `output`. It may additionally feed other inputs of the
/// destination node (`routes`) and take some of its own inputs from the
/// destination's socket defaults (`defaults`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Node kind instantiated as the adapter.
    pub adapter_type: String,
    /// Adapter input fed by the original link's source.
    pub input: usize,
    /// Adapter output feeding the original link's destination.
    pub output: usize,
    /// Extra `(adapter output, destination input)` links.
    pub routes: Vec<(usize, usize)>,
    /// `(adapter input, destination input)` pairs; the adapter input takes
    /// the destination socket's default value.
    pub defaults: Vec<(usize, usize)>,
}

impl Conversion {
    pub fn new(adapter_type: &str) -> Self {
        Self {
            adapter_type: adapter_type.to_string(),
            input: 0,
            output: 0,
            routes: Vec::new(),
            defaults: Vec::new(),
        }
    }

    pub fn with_route(mut self, adapter_output: usize, destination_input: usize) -> Self {
        self.routes.push((adapter_output, destination_input));
        self
    }

    pub fn with_default_from(mut self, adapter_input: usize, destination_input: usize) -> Self {
        self.defaults.push((adapter_input, destination_input));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversionRegistry {
    conversions: HashMap<(SocketType, SocketType), Conversion>,
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, from: SocketType, to: SocketType, conversion: Conversion) {
        self.conversions.insert((from, to), conversion);
    }

    /// Whether a link from `from` into `to` cannot be used as-is.
    pub fn needs_conversion(&self, from: SocketType, to: SocketType) -> bool {
        !from.is_compatible(to)
    }

    pub fn get_conversion(&self, from: SocketType, to: SocketType) -> Option<&Conversion> {
        self.conversions.get(&(from, to))
    }

    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_never_needs_conversion() {
        let registry = ConversionRegistry::new();
        assert!(!registry.needs_conversion(SocketType::Any, SocketType::Vector));
        assert!(!registry.needs_conversion(SocketType::Float, SocketType::Any));
        assert!(!registry.needs_conversion(SocketType::Float, SocketType::Float));
        assert!(registry.needs_conversion(SocketType::Int, SocketType::Float));
    }

    #[test]
    fn test_lookup_is_directional() {
        let mut registry = ConversionRegistry::new();
        registry.register(
            SocketType::Int,
            SocketType::Float,
            Conversion::new("convert.int_to_float"),
        );
        assert_eq!(
            registry
                .get_conversion(SocketType::Int, SocketType::Float)
                .map(|c| c.adapter_type.as_str()),
            Some("convert.int_to_float")
        );
        assert!(registry.get_conversion(SocketType::Float, SocketType::Int).is_none());
    }

    #[test]
    fn test_routes_and_defaults_builder() {
        let conversion = Conversion::new("convert.split")
            .with_route(1, 1)
            .with_default_from(1, 1);
        assert_eq!(conversion.routes, vec![(1, 1)]);
        assert_eq!(conversion.defaults, vec![(1, 1)]);
        assert_eq!((conversion.input, conversion.output), (0, 0));
    }
}
