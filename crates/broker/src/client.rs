//! Broker contract consumed by the tracking engine

use crate::models::{DuplicatesStrategy, ImportResults, ListQuery, ServerInfo};
use crate::Result;
use async_trait::async_trait;
use grain::{Grain, GrainId};
use std::collections::{BTreeSet, HashMap};
use tokio_util::sync::CancellationToken;

/// Remote grain store
///
/// Every call takes a cancellation token; a cancelled call resolves to
/// `BrokerError::Cancelled` without waiting for the transport.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Base URL, for diagnostics
    fn url(&self) -> &str;

    async fn server_info(&self, cancel: &CancellationToken) -> Result<ServerInfo>;

    /// `None` when the broker has no such grain
    async fn get_grain(&self, id: GrainId, cancel: &CancellationToken) -> Result<Option<Grain>>;

    async fn get_grain_by_path(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Grain>>;

    /// Ancestors of a grain from the root down, the grain itself last
    async fn grain_path(&self, id: GrainId, cancel: &CancellationToken) -> Result<Vec<Grain>>;

    /// Grains under a root, sorted by path
    async fn list_grains(&self, query: &ListQuery, cancel: &CancellationToken)
        -> Result<Vec<Grain>>;

    /// Existence flag for every requested id
    async fn check_exist(
        &self,
        ids: &[GrainId],
        cancel: &CancellationToken,
    ) -> Result<HashMap<GrainId, bool>>;

    /// Full records for the requested ids (unknown ids are omitted)
    async fn pull_grains(&self, ids: &[GrainId], cancel: &CancellationToken)
        -> Result<Vec<Grain>>;

    /// Bulk import of grains to store and ids to delete
    async fn push_grains(
        &self,
        store: &[Grain],
        delete: &BTreeSet<GrainId>,
        strategy: DuplicatesStrategy,
        cancel: &CancellationToken,
    ) -> Result<ImportResults>;
}
