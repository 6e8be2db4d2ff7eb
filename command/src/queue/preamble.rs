//! Growth-only cache of the queue preamble.

use {
    sluice_core::{Backend, OutOfMemory, PreambleRequirements, QueueId, Winsys},
    std::{mem::ManuallyDrop, sync::Arc},
};

/// Preamble generated by the winsys. Destroyed through it when the last user is gone.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct Preamble<B: Backend> {
    raw: ManuallyDrop<B::Preamble>,
    requirements: PreambleRequirements,
    #[derivative(Debug = "ignore")]
    winsys: Arc<dyn Winsys<B>>,
}

impl<B> Preamble<B>
where
    B: Backend,
{
    /// Get raw preamble.
    pub fn raw(&self) -> &B::Preamble {
        &self.raw
    }

    /// Requirements this preamble was generated for.
    pub fn requirements(&self) -> &PreambleRequirements {
        &self.requirements
    }
}

impl<B> Drop for Preamble<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        // `self.raw` is not accessed after this.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        self.winsys.destroy_preamble(raw);
    }
}

/// Preamble sized for the high-water mark of all requirements seen by the queue.
#[derive(Debug)]
pub(crate) struct PreambleCache<B: Backend> {
    queue: QueueId,
    high_water: PreambleRequirements,
    current: Option<Arc<Preamble<B>>>,
    generations: usize,
}

impl<B> PreambleCache<B>
where
    B: Backend,
{
    pub fn new(queue: QueueId) -> Self {
        PreambleCache {
            queue,
            high_water: PreambleRequirements::none(),
            current: None,
            generations: 0,
        }
    }

    /// Number of times the preamble was generated.
    pub fn generations(&self) -> usize {
        self.generations
    }

    /// Get preamble that covers `required`.
    /// Generates new one only if `required` exceeds the high-water mark.
    pub fn get(
        &mut self,
        winsys: &Arc<dyn Winsys<B>>,
        required: &PreambleRequirements,
    ) -> Result<Arc<Preamble<B>>, OutOfMemory> {
        if let Some(current) = &self.current {
            if self.high_water.covers(required) {
                return Ok(current.clone());
            }
        }

        let requirements = self.high_water.union(required);
        log::debug!(
            "Generate preamble for {:?}: {:?}",
            self.queue,
            requirements
        );
        let raw = winsys.create_preamble(self.queue, &requirements)?;

        let preamble = Arc::new(Preamble {
            raw: ManuallyDrop::new(raw),
            requirements,
            winsys: winsys.clone(),
        });
        self.high_water = requirements;
        self.current = Some(preamble.clone());
        self.generations += 1;
        Ok(preamble)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        sluice_core::FamilyId,
        sluice_soft::{SoftBackend, SoftSyncobjs, SoftWinsys},
    };

    fn cache() -> (Arc<SoftWinsys>, Arc<dyn Winsys<SoftBackend>>, PreambleCache<SoftBackend>) {
        let soft = Arc::new(SoftWinsys::new(Arc::new(SoftSyncobjs::new())));
        let winsys: Arc<dyn Winsys<SoftBackend>> = soft.clone();
        let queue = QueueId::new(FamilyId { index: 0 }, 0);
        (soft, winsys, PreambleCache::new(queue))
    }

    #[test]
    fn generated_once_for_empty_requirements() {
        let (soft, winsys, mut cache) = cache();
        cache.get(&winsys, &PreambleRequirements::none()).unwrap();
        cache.get(&winsys, &PreambleRequirements::none()).unwrap();
        assert_eq!(cache.generations(), 1);
        assert_eq!(soft.preambles_created(), 1);
    }

    #[test]
    fn no_allocation_within_high_water() {
        let (soft, winsys, mut cache) = cache();
        let big = PreambleRequirements {
            scratch_size_per_wave: 4096,
            scratch_waves: 32,
            esgs_ring_size: 1 << 16,
            ..PreambleRequirements::none()
        };
        cache.get(&winsys, &big).unwrap();

        for waves in 1..32 {
            let small = PreambleRequirements {
                scratch_size_per_wave: 1024,
                scratch_waves: waves,
                ..PreambleRequirements::none()
            };
            let preamble = cache.get(&winsys, &small).unwrap();
            assert_eq!(preamble.requirements(), &big);
        }

        assert_eq!(soft.preambles_created(), 1);
    }

    #[test]
    fn grows_by_element_wise_maximum() {
        let (soft, winsys, mut cache) = cache();
        cache
            .get(
                &winsys,
                &PreambleRequirements {
                    gsvs_ring_size: 256,
                    ..PreambleRequirements::none()
                },
            )
            .unwrap();
        let preamble = cache
            .get(
                &winsys,
                &PreambleRequirements {
                    tess_rings: true,
                    ..PreambleRequirements::none()
                },
            )
            .unwrap();

        assert_eq!(preamble.requirements().gsvs_ring_size, 256);
        assert!(preamble.requirements().tess_rings);
        assert_eq!(cache.generations(), 2);

        drop(preamble);
        drop(cache);
        assert_eq!(soft.preambles_created(), 2);
        assert_eq!(soft.preambles_alive(), 0);
    }
}
