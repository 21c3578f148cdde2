//! Resource objects
//!
//! Every resource owns its device object(s), creates them lazily on first use
//! and exposes the views each usage needs.

mod attachment;
mod buffer;
mod sampler;
mod shader;
mod texture;

pub use attachment::{ColorAttachment, ColorAttachmentDesc, DepthStencilAttachment, DepthStencilAttachmentDesc};
pub use buffer::{Buffer, BufferDesc, BufferHandler, BufferKind, BufferUpdate, BufferWrite, DISPATCH_INDIRECT_SIZE, DRAW_INDEXED_INDIRECT_SIZE, DRAW_INDIRECT_SIZE};
pub use sampler::{Sampler, SamplerDesc, SamplerKind};
pub use shader::{Shader, ShaderDesc};
pub use texture::{StorageMipViews, Texture, TextureDesc, TextureHandler, TextureKind, TextureUpdate, TextureUsageMode, TextureWrite, max_mip_level_count};
