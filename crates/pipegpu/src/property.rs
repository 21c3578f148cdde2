//! Descriptor bags naming the resources a holder uses

use crate::device::Device;
use crate::res::{Buffer, Sampler, Texture};
use crate::{PropertyFormat, ResourceId};
use std::collections::BTreeMap;
use std::rc::Rc;

/// A named slot's resource reference and kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Property {
    pub id: ResourceId,
    pub format: PropertyFormat,
}

/// Anything that can be placed in a property bag
pub trait AsProperty {
    fn property(&self) -> Property;
}

impl AsProperty for Property {
    fn property(&self) -> Property {
        *self
    }
}

impl<D: Device> AsProperty for Buffer<D> {
    fn property(&self) -> Property {
        Property {
            id: self.id(),
            format: self.kind().property_format(),
        }
    }
}

impl<D: Device> AsProperty for Texture<D> {
    fn property(&self) -> Property {
        Property {
            id: self.id(),
            format: self.kind().property_format(),
        }
    }
}

impl<D: Device> AsProperty for Sampler<D> {
    fn property(&self) -> Property {
        Property {
            id: self.id(),
            format: PropertyFormat::TextureSampler,
        }
    }
}

impl<T: AsProperty> AsProperty for Rc<T> {
    fn property(&self) -> Property {
        self.as_ref().property()
    }
}

/// Vertex buffers keyed by the vertex input name they feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    properties: BTreeMap<String, Property>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `resource` to the vertex input `name`, replacing any earlier assignment
    pub fn assign(&mut self, name: impl Into<String>, resource: &impl AsProperty) -> &mut Self {
        self.properties.insert(name.into(), resource.property());
        self
    }

    pub fn get(&self, name: &str) -> Option<Property> {
        self.properties.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Property)> {
        self.properties.iter().map(|(name, property)| (name.as_str(), *property))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Buffers, textures and samplers keyed by the shader global they are bound to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uniforms {
    properties: BTreeMap<String, Property>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `resource` to the shader global `name`, replacing any earlier assignment
    pub fn assign(&mut self, name: impl Into<String>, resource: &impl AsProperty) -> &mut Self {
        self.properties.insert(name.into(), resource.property());
        self
    }

    pub fn get(&self, name: &str) -> Option<Property> {
        self.properties.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Property)> {
        self.properties.iter().map(|(name, property)| (name.as_str(), *property))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that names are unique within a bag
    #[test]
    fn test_assign_replaces() {
        let first = Property {
            id: ResourceId::mint(),
            format: PropertyFormat::UniformBuffer,
        };
        let second = Property {
            id: ResourceId::mint(),
            format: PropertyFormat::StorageBuffer,
        };

        let mut uniforms = Uniforms::new();
        uniforms.assign("camera", &first).assign("camera", &second);
        assert_eq!(uniforms.len(), 1);
        assert_eq!(uniforms.get("camera"), Some(second));
        assert_eq!(uniforms.get("model"), None);
    }
}
