//! Shared per-queue resources that command buffers may require.
//!
//! A queue keeps a single preamble generated for the high-water mark of all
//! requirements it has seen. Requirements only ever grow.

/// Sizes and flags of shared resources needed to execute command buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreambleRequirements {
    /// Scratch bytes per wave for graphics shaders.
    pub scratch_size_per_wave: u32,

    /// Number of graphics waves that use scratch concurrently.
    pub scratch_waves: u32,

    /// Scratch bytes per wave for compute shaders.
    pub compute_scratch_size_per_wave: u32,

    /// Number of compute waves that use scratch concurrently.
    pub compute_scratch_waves: u32,

    /// Size of the export-to-geometry ring.
    pub esgs_ring_size: u32,

    /// Size of the geometry-to-vertex ring.
    pub gsvs_ring_size: u32,

    /// Tessellation factor and offchip rings.
    pub tess_rings: bool,

    /// Global data share.
    pub gds: bool,

    /// Global data share ordered append.
    pub gds_oa: bool,

    /// Custom sample positions table.
    pub sample_positions: bool,
}

impl PreambleRequirements {
    /// Requirements of command buffers that need nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Grow `self` so that it covers `other` as well.
    pub fn merge(&mut self, other: &Self) {
        self.scratch_size_per_wave = self.scratch_size_per_wave.max(other.scratch_size_per_wave);
        self.scratch_waves = self.scratch_waves.max(other.scratch_waves);
        self.compute_scratch_size_per_wave = self
            .compute_scratch_size_per_wave
            .max(other.compute_scratch_size_per_wave);
        self.compute_scratch_waves = self.compute_scratch_waves.max(other.compute_scratch_waves);
        self.esgs_ring_size = self.esgs_ring_size.max(other.esgs_ring_size);
        self.gsvs_ring_size = self.gsvs_ring_size.max(other.gsvs_ring_size);
        self.tess_rings |= other.tess_rings;
        self.gds |= other.gds;
        self.gds_oa |= other.gds_oa;
        self.sample_positions |= other.sample_positions;
    }

    /// Element-wise maximum of two requirements.
    pub fn union(mut self, other: &Self) -> Self {
        self.merge(other);
        self
    }

    /// Check if resources sized for `self` satisfy `other`.
    pub fn covers(&self, other: &Self) -> bool {
        self.union(other) == *self
    }

    /// Graphics scratch buffer size in bytes.
    pub fn scratch_size(&self) -> u64 {
        u64::from(self.scratch_size_per_wave) * u64::from(self.scratch_waves)
    }

    /// Compute scratch buffer size in bytes.
    pub fn compute_scratch_size(&self) -> u64 {
        u64::from(self.compute_scratch_size_per_wave) * u64::from(self.compute_scratch_waves)
    }

    /// Requirements of the preamble for all of `iter`.
    pub fn collect<'a, I>(iter: I) -> Self
    where
        I: IntoIterator<Item = &'a PreambleRequirements>,
    {
        iter.into_iter().fold(Self::none(), |acc, req| acc.union(req))
    }
}
