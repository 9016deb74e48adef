use crate::model::{
    ConfirmationRecord, ConfirmationWrite, GovernanceAppend, GovernanceRecord, RequestUpdate,
};
use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use haven_types::{RequestId, RequestStatus, ResidentId, ResidentRequest};

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

/// Storage interface for resident request records.
///
/// Reads are read-after-write consistent within the process: the
/// orchestrator persists a transition and immediately reads the record back
/// to drive the next stage.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a freshly submitted request. Conflict if the id exists.
    async fn create_request(&self, request: ResidentRequest) -> StorageResult<()>;

    /// Get one request by id.
    async fn get_request(&self, id: &RequestId) -> StorageResult<Option<ResidentRequest>>;

    /// List a resident's requests, newest-first.
    async fn list_by_resident(
        &self,
        resident: &ResidentId,
        window: QueryWindow,
    ) -> StorageResult<Vec<ResidentRequest>>;

    /// Conditional update: applies `update` only if the record's current
    /// status equals `expected` and `expected -> update.new_status` is a
    /// legal transition. Returns the updated record.
    async fn update_request(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        update: RequestUpdate,
    ) -> StorageResult<ResidentRequest>;
}

/// Storage interface for the append-only governance log.
#[async_trait]
pub trait GovernanceStore: Send + Sync {
    /// Append an entry and return the canonical, hash-linked stored record.
    async fn append_governance(&self, event: GovernanceAppend) -> StorageResult<GovernanceRecord>;

    /// All entries for one request, oldest-first.
    async fn governance_for_request(
        &self,
        id: &RequestId,
    ) -> StorageResult<Vec<GovernanceRecord>>;

    /// Entries whose timestamp falls within `[from, to)`, oldest-first.
    async fn governance_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        window: QueryWindow,
    ) -> StorageResult<Vec<GovernanceRecord>>;

    /// The latest hash anchor of the chain.
    async fn latest_governance_hash(&self) -> StorageResult<Option<String>>;
}

/// Storage interface for the dispatch idempotency table.
#[async_trait]
pub trait ConfirmationStore: Send + Sync {
    /// Insert-if-absent keyed by `(request_id, option_id)`. When a token is
    /// already recorded for the pair, the stored record wins and is returned
    /// as [`ConfirmationWrite::Existing`].
    async fn record_confirmation(
        &self,
        record: ConfirmationRecord,
    ) -> StorageResult<ConfirmationWrite>;

    /// Look up a previously recorded confirmation.
    async fn get_confirmation(
        &self,
        id: &RequestId,
        option_id: &str,
    ) -> StorageResult<Option<ConfirmationRecord>>;
}

/// Unified storage bundle used by the orchestrator and dispatcher.
pub trait HavenStorage: RequestStore + GovernanceStore + ConfirmationStore + Send + Sync {}

impl<T> HavenStorage for T where T: RequestStore + GovernanceStore + ConfirmationStore + Send + Sync {}
