//! Sparse memory binding operations.
//! These are executed in queue order right before the submission they belong to.

use crate::backend::Backend;

/// Range of a sparse resource bound to memory, or unbound if `memory` is `None`.
#[derive(Derivative)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
pub struct MemoryBind<B: Backend> {
    /// Offset within the resource.
    pub resource_offset: u64,

    /// Size of the range.
    pub size: u64,

    /// Memory to bind. `None` unbinds the range.
    pub memory: Option<B::Memory>,

    /// Offset within the memory.
    pub memory_offset: u64,
}

/// Subresource of a sparse image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageSubresource {
    /// Aspect bits.
    pub aspects: u32,

    /// Mip level.
    pub level: u32,

    /// Array layer.
    pub layer: u32,
}

/// Region of a sparse image bound to memory.
#[derive(Derivative)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
pub struct ImageBind<B: Backend> {
    /// Subresource.
    pub subresource: ImageSubresource,

    /// Texel offset of the region.
    pub offset: [i32; 3],

    /// Texel extent of the region.
    pub extent: [u32; 3],

    /// Memory to bind. `None` unbinds the region.
    pub memory: Option<B::Memory>,

    /// Offset within the memory.
    pub memory_offset: u64,
}

/// Single sparse binding operation.
#[derive(Derivative)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
pub enum SparseBind<B: Backend> {
    /// Bind ranges of a buffer.
    Buffer {
        /// Sparse buffer.
        buffer: B::Buffer,

        /// Ranges.
        binds: Vec<MemoryBind<B>>,
    },

    /// Bind opaque ranges of an image (mip tail and metadata).
    ImageOpaque {
        /// Sparse image.
        image: B::Image,

        /// Ranges.
        binds: Vec<MemoryBind<B>>,
    },

    /// Bind regions of an image.
    Image {
        /// Sparse image.
        image: B::Image,

        /// Regions.
        binds: Vec<ImageBind<B>>,
    },
}

impl<B> SparseBind<B>
where
    B: Backend,
{
    /// Number of ranges or regions in this operation.
    pub fn len(&self) -> usize {
        match self {
            SparseBind::Buffer { binds, .. } | SparseBind::ImageOpaque { binds, .. } => {
                binds.len()
            }
            SparseBind::Image { binds, .. } => binds.len(),
        }
    }

    /// Check if operation binds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
