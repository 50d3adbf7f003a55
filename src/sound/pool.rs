/// Free list of reusable instances
///
/// Instances must be fully reset (`destroy`ed) before release; acquiring
/// hands back the most recently released instance of the media's backend, or
/// a fresh one when none is free.
use crate::media::{BackendKind, InstanceId, Media, MediaInstance};

#[derive(Debug, Default)]
pub struct InstancePool {
    free: Vec<Box<dyn MediaInstance>>,
}

impl InstancePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a free instance (or allocate one) and bind it to `media`
    pub fn acquire(&mut self, media: &dyn Media) -> Box<dyn MediaInstance> {
        let kind = media.kind();
        let mut instance = match self.free.iter().rposition(|i| i.kind() == kind) {
            Some(index) => {
                let instance = self.free.remove(index);
                tracing::debug!("Reusing pooled instance {}", instance.id());
                instance
            }
            None => media.create(),
        };
        instance.init(media);
        instance
    }

    /// Return a destroyed instance to the free list
    pub fn release(&mut self, instance: Box<dyn MediaInstance>) {
        debug_assert!(
            instance.is_reset(),
            "Instance {} must be destroyed before it is pooled",
            instance.id()
        );
        if !instance.is_reset() {
            tracing::warn!("Dropping instance {} that was not reset", instance.id());
            return;
        }
        self.free.push(instance);
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.free.iter().any(|i| i.id() == id)
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn count(&self, kind: BackendKind) -> usize {
        self.free.iter().filter(|i| i.kind() == kind).count()
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }
}
