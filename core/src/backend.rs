use {crate::preamble::PreambleRequirements, std::fmt::Debug, std::hash::Hash};

/// Set of types the queue engine is parametrized with.
///
/// Backend implementation supplies raw handles.
/// The engine never looks inside them, it only moves them between the caller
/// and the collaborators [`SyncobjDevice`](crate::SyncobjDevice) and [`Winsys`](crate::Winsys).
pub trait Backend: Debug + Send + Sync + Sized + 'static {
    /// Raw handle of kernel synchronization object.
    /// Either binary or timeline, the kernel does not distinguish.
    type Syncobj: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    /// Recorded command buffer.
    type CommandBuffer: Submittable + Debug + Send + Sync + 'static;

    /// Sparse buffer handle.
    type Buffer: Clone + Debug + Send + Sync + 'static;

    /// Sparse image handle.
    type Image: Clone + Debug + Send + Sync + 'static;

    /// Memory object that can be bound to sparse resources.
    type Memory: Clone + Debug + Send + Sync + 'static;

    /// Driver generated commands prepended to user command buffers.
    type Preamble: Debug + Send + Sync + 'static;
}

/// Command buffer that can be submitted to a queue.
pub trait Submittable {
    /// Shared queue resources this command buffer needs during execution.
    fn requirements(&self) -> PreambleRequirements {
        PreambleRequirements::default()
    }
}

/// Type of the queue family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QueueType {
    /// Capable of graphics, compute and transfer.
    General,

    /// Capable of compute and transfer.
    Compute,

    /// Capable of transfer only.
    Transfer,
}

impl QueueType {
    /// Check if queues of this type execute graphics work and therefore need ring buffers.
    pub fn supports_graphics(&self) -> bool {
        match self {
            QueueType::General => true,
            _ => false,
        }
    }
}

/// Family id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FamilyId {
    /// Family index.
    pub index: usize,
}

/// Queue id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueId {
    /// Family id of the queue.
    pub family: FamilyId,

    /// Index of the queue.
    pub index: usize,
}

impl QueueId {
    /// Create queue id from family id and index.
    pub fn new(family: FamilyId, index: usize) -> Self {
        QueueId { family, index }
    }

    /// Get family id.
    pub fn family(&self) -> FamilyId {
        self.family
    }

    /// Get index within the family.
    pub fn index(&self) -> usize {
        self.index
    }
}
