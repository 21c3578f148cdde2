//! Uniform parsing and the per-frame uniform sync handler

use crate::device::Device;
use crate::registry::Registry;
use crate::res::{Buffer, Texture};
use crate::{CompileError, FrameStage, PropertyFormat, ResourceError, ResourceId, Uniforms};
use std::collections::BTreeMap;
use tracing::trace;

/// A shader global name resolved to the resource bound to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformRecord {
    pub name: String,
    pub format: PropertyFormat,
    pub resource: ResourceId,
}

/// Uniform records keyed by name and grouped by owning resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformRecords {
    by_name: BTreeMap<String, UniformRecord>,
    by_resource: BTreeMap<ResourceId, Vec<String>>,
}

impl UniformRecords {
    pub fn get(&self, name: &str) -> Option<&UniformRecord> {
        self.by_name.get(name)
    }

    /// Names bound to each resource
    pub fn by_resource(&self) -> &BTreeMap<ResourceId, Vec<String>> {
        &self.by_resource
    }

    /// Whether `id` is referenced by any record
    pub fn contains_resource(&self, id: ResourceId) -> bool {
        self.by_resource.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Refreshes every buffer and texture of a uniform bag at one frame stage
pub type UniformSyncHandler<D> = Box<dyn Fn(&D, FrameStage, &mut <D as Device>::CommandEncoder, &Registry<Buffer<D>>, &Registry<Texture<D>>) -> Result<(), ResourceError>>;

enum SyncTarget {
    Buffer,
    Texture,
    None,
}

fn sync_target(format: PropertyFormat) -> Option<SyncTarget> {
    use PropertyFormat as P;
    match format {
        P::UniformBuffer | P::StorageBuffer | P::IndexedStorageBuffer | P::IndirectBuffer | P::IndexedIndirectBuffer | P::MapBuffer => Some(SyncTarget::Buffer),
        P::Texture2D | P::TextureStorage2D | P::Texture2DArray | P::TextureCube | P::TextureSurface => Some(SyncTarget::Texture),
        P::TextureSampler => Some(SyncTarget::None),
        P::VertexBuffer | P::IndexBuffer => None,
    }
}

/// Walks a uniform bag into uniform records and a sync handler
///
/// The handler acquires every buffer and texture of the bag, in id order, at
/// the stage it is called with. An empty bag yields a handler that does nothing.
///
/// # Returns
/// The records and the handler, or [`CompileError::UnsupportedUniform`] for vertex and index buffers
pub fn parse_uniform<D: Device>(uniforms: &Uniforms) -> Result<(UniformRecords, UniformSyncHandler<D>), CompileError> {
    let mut records = UniformRecords::default();
    let mut buffer_ids = Vec::new();
    let mut texture_ids = Vec::new();

    for (name, property) in uniforms.iter() {
        let target = sync_target(property.format).ok_or_else(|| CompileError::UnsupportedUniform {
            name: name.to_string(),
            format: property.format,
        })?;

        let names = records.by_resource.entry(property.id).or_default();
        if names.is_empty() {
            match target {
                SyncTarget::Buffer => buffer_ids.push(property.id),
                SyncTarget::Texture => texture_ids.push(property.id),
                SyncTarget::None => {}
            }
        }
        names.push(name.to_string());
        records.by_name.insert(
            name.to_string(),
            UniformRecord {
                name: name.to_string(),
                format: property.format,
                resource: property.id,
            },
        );
    }

    if buffer_ids.is_empty() && texture_ids.is_empty() {
        let noop: UniformSyncHandler<D> = Box::new(|_, _, _, _, _| Ok(()));
        return Ok((records, noop));
    }

    buffer_ids.sort();
    texture_ids.sort();
    let handler: UniformSyncHandler<D> = Box::new(move |device, stage, encoder, buffers, textures| {
        trace!(?stage, buffers = buffer_ids.len(), textures = texture_ids.len(), "syncing uniforms");
        for id in &buffer_ids {
            buffers.get(*id)?.acquire(device, encoder, stage)?;
        }
        for id in &texture_ids {
            textures.get(*id)?.acquire(device, stage)?;
        }
        Ok(())
    });
    Ok((records, handler))
}
