use burn::data::dataset::Dataset;

use crate::domain::instance::EntityInstance;

/// In-memory collection of entity instances for Burn's DataLoader.
pub struct ProparaDataset {
    instances: Vec<EntityInstance>,
}

impl ProparaDataset {
    pub fn new(instances: Vec<EntityInstance>) -> Self { Self { instances } }

    pub fn instance_count(&self) -> usize { self.instances.len() }

    /// True when every instance carries gold states and locations
    pub fn is_labelled(&self) -> bool {
        self.instances
            .iter()
            .all(|i| i.gold_states.is_some() && i.gold_locations.is_some())
    }

    /// Number of batches one pass produces
    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.instances.len().div_ceil(batch_size.max(1))
    }
}

impl Dataset<EntityInstance> for ProparaDataset {
    fn get(&self, index: usize) -> Option<EntityInstance> {
        self.instances.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.instances.len()
    }
}
