//! The remote store the coordinators sit in front of.
use std::{fmt, hash::Hash};

use async_trait::async_trait;

/// A record that can be written to a [`Store`].
pub trait Resource: Clone + fmt::Debug + Send + Sync + 'static {
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// the identifying key, `None` if the record doesn't carry a usable one
    fn key(&self) -> Option<&Self::Key>;
}

/// shorthand for the key type of a store's records
pub type Key<S> = <<S as Store>::Resource as Resource>::Key;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    // send/sync/static required for async trait bounds & spawned fetches
    type Resource: Resource;
    /// what a caller hands over so a missing record can be created
    type Seed: fmt::Debug + Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// point lookup, `Ok(None)` when there is no such record
    async fn read(
        &self,
        key: &<Self::Resource as Resource>::Key,
    ) -> Result<Option<Self::Resource>, Self::Error>;
    async fn create(&self, seed: Self::Seed) -> Result<Self::Resource, Self::Error>;
    /// upsert
    async fn write(&self, resource: &Self::Resource) -> Result<(), Self::Error>;
}
