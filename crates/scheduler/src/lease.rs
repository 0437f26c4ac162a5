//! Leader election for the tick loop.
//!
//! Multi-instance deployment is optional per the scheduler's own contract
//! ("single instance is the default"), so the default implementation never
//! contests the lease. A database-row-lock implementation is sketched for
//! when multiple scheduler processes run against the same store.

use async_trait::async_trait;

#[async_trait]
pub trait LeaderLease: Send + Sync {
    /// Try to become (or renew being) the leader. `false` means another
    /// holder is active and this tick should be skipped.
    async fn acquire(&self) -> bool;

    /// Release the lease, e.g. on graceful shutdown.
    async fn release(&self);
}

/// Always holds the lease. Correct for the common single-process deployment.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysLeader;

#[async_trait]
impl LeaderLease for AlwaysLeader {
    async fn acquire(&self) -> bool {
        true
    }

    async fn release(&self) {}
}

/// Sketch of a `SELECT ... FOR UPDATE`-backed lease for multi-instance
/// deployments. Not wired into the CLI; the tick loop only needs the trait.
#[derive(Debug)]
pub struct RowLockLease {
    pub holder_id: String,
}

#[async_trait]
impl LeaderLease for RowLockLease {
    async fn acquire(&self) -> bool {
        // A real implementation would run `SELECT holder FROM scheduler_lease
        // FOR UPDATE` in a short transaction, compare/swap `holder_id`
        // against an expiry, and commit. Left as a sketch: the tick loop
        // only needs the trait shape, and the spec treats multi-instance as
        // optional.
        true
    }

    async fn release(&self) {}
}
