//! # Sync Engine
//!
//! Uploads PENDING rows for one business and marks them SYNCED once the
//! remote has accepted them.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Sync Cycle                                  │
//! │                                                                         │
//! │  1. Live rows, parents before children                                 │
//! │     businesses → users → products → customers → subscriptions          │
//! │       → transactions ──┐                                               │
//! │       │                └─► transaction_items of the accepted ones      │
//! │       → cash_shifts → activity_logs                                    │
//! │       → stock_receipts ─┐                                              │
//! │                         └─► stock_receipt_items of the accepted ones   │
//! │                                                                         │
//! │     A parent is marked SYNCED only after every one of its lines was    │
//! │     accepted. Otherwise it stays PENDING and goes again next cycle.    │
//! │                                                                         │
//! │  2. Tombstones (deleted = 1), in reverse order                         │
//! │                                                                         │
//! │  3. Beacon + app_meta.last_sync_at                                     │
//! │                                                                         │
//! │  Per-row rejection  → row stays PENDING, cycle continues               │
//! │  Remote unreachable → cycle stops, nothing unsent is touched           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Marking is conditional on the `updated_at` read for upload, so a sale
//! that touches a product mid-upload leaves that product PENDING.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use tally_core::clock::now_millis;
use tally_core::{
    ActivityLog, Business, CashShift, Customer, Product, StockReceipt, StockReceiptItem,
    Subscription, SyncTable, Transaction, TransactionItem, User,
};
use tally_db::{Database, PendingCount};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::dto::{ChildRecord, ToRemote};
use crate::error::{SyncError, SyncResult};
use crate::remote::{HttpRemoteStore, RemoteAck, RemoteStore, SyncBeacon, UpsertRequest};

/// Outcome of one [`SyncEngine::run`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Upserts the remote accepted (tombstones included).
    pub uploaded: usize,
    /// Tombstones the remote accepted.
    pub tombstones: usize,
    /// Rows flipped to SYNCED.
    pub marked: usize,
    /// Accepted rows left PENDING because they changed during the upload.
    pub raced: usize,
    /// Rows the remote refused.
    pub failed: usize,
    /// Parents left PENDING because a line was refused.
    pub held_back: usize,
    /// Why the cycle stopped early, if it did.
    pub aborted: Option<String>,
    pub completed_at: Option<i64>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none() && self.completed_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub batch_size: u32,
    /// Falls back to the ledger's own device id.
    pub device_id: Option<String>,
    pub device_name: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            batch_size: 100,
            device_id: None,
            device_name: "POS Terminal".to_string(),
        }
    }
}

impl From<&SyncConfig> for EngineOptions {
    fn from(config: &SyncConfig) -> Self {
        EngineOptions {
            batch_size: config.sync.batch_size,
            device_id: config.device.id.clone(),
            device_name: config.device.name.clone(),
        }
    }
}

/// Clears the running flag when a cycle ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    db: Database,
    remote: Arc<dyn RemoteStore>,
    options: EngineOptions,
    running: AtomicBool,
}

impl SyncEngine {
    pub fn new(db: Database, remote: Arc<dyn RemoteStore>, options: EngineOptions) -> Self {
        SyncEngine {
            db,
            remote,
            options,
            running: AtomicBool::new(false),
        }
    }

    /// Engine talking HTTP to the configured remote store.
    pub fn from_config(db: Database, config: &SyncConfig) -> SyncResult<Self> {
        let remote = HttpRemoteStore::new(&config.sync)?;
        Ok(Self::new(db, Arc::new(remote), EngineOptions::from(config)))
    }

    /// Rows still waiting for upload, per table.
    pub async fn pending_summary(&self) -> SyncResult<Vec<PendingCount>> {
        Ok(self.db.sync().pending_summary().await?)
    }

    pub async fn last_sync_at(&self) -> SyncResult<Option<i64>> {
        Ok(self.db.meta().get().await?.last_sync_at)
    }

    fn try_begin(&self) -> SyncResult<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyRunning)?;
        Ok(RunGuard(&self.running))
    }

    /// Runs one full cycle for `business_id`.
    ///
    /// An unreachable remote is not an error: the report says the cycle was
    /// aborted and every unsent row is still PENDING. Local database
    /// failures are returned as errors.
    pub async fn run(&self, business_id: &str) -> SyncResult<SyncReport> {
        let _guard = self.try_begin()?;
        let started = Instant::now();
        let mut report = SyncReport::default();

        info!(business_id = %business_id, "Sync cycle starting");

        match self.upload_all(business_id, &mut report).await {
            Ok(()) => {}
            Err(e) if e.aborts_cycle() => {
                warn!(
                    error = %e,
                    uploaded = report.uploaded,
                    "Remote store unreachable, sync cycle aborted"
                );
                report.aborted = Some(e.to_string());
                return Ok(report);
            }
            Err(e) => {
                error!(error = %e, "Sync cycle failed");
                return Err(e);
            }
        }

        let device_id = match self.options.device_id {
            Some(ref id) => id.clone(),
            None => self.db.meta().ensure_device_id().await?,
        };
        let completed_at = now_millis();
        let beacon = SyncBeacon {
            business_id: business_id.to_string(),
            device_id,
            device_name: self.options.device_name.clone(),
            completed_at,
            uploaded: report.uploaded,
            failed: report.failed,
        };
        if let Err(e) = self.remote.beacon(&beacon).await {
            warn!(error = %e, "Sync beacon not delivered");
        }

        self.db.meta().record_sync_completed(completed_at).await?;
        report.completed_at = Some(completed_at);

        info!(
            uploaded = report.uploaded,
            marked = report.marked,
            failed = report.failed,
            held_back = report.held_back,
            elapsed = ?started.elapsed(),
            "Sync cycle complete"
        );
        Ok(report)
    }

    async fn upload_all(&self, business_id: &str, report: &mut SyncReport) -> SyncResult<()> {
        for table in SyncTable::UPLOAD_ORDER {
            self.upload_live(table, business_id, report).await?;
        }

        for table in SyncTable::UPLOAD_ORDER.into_iter().rev() {
            self.upload_tombstones(table, business_id, report).await?;
        }

        Ok(())
    }

    async fn upload_live(
        &self,
        table: SyncTable,
        business_id: &str,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        match table {
            SyncTable::Businesses => self.upload_rows::<Business>(business_id, false, report).await,
            SyncTable::Users => self.upload_rows::<User>(business_id, false, report).await,
            SyncTable::Products => self.upload_rows::<Product>(business_id, false, report).await,
            SyncTable::Customers => self.upload_rows::<Customer>(business_id, false, report).await,
            SyncTable::Subscriptions => {
                self.upload_rows::<Subscription>(business_id, false, report).await
            }
            SyncTable::Transactions => {
                self.upload_with_children::<Transaction, TransactionItem>(business_id, report)
                    .await
            }
            SyncTable::CashShifts => self.upload_rows::<CashShift>(business_id, false, report).await,
            SyncTable::ActivityLogs => {
                self.upload_rows::<ActivityLog>(business_id, false, report).await
            }
            SyncTable::StockReceipts => {
                self.upload_with_children::<StockReceipt, StockReceiptItem>(business_id, report)
                    .await
            }
            // Lines travel with their parent
            SyncTable::TransactionItems | SyncTable::StockReceiptItems => Ok(()),
        }
    }

    async fn upload_tombstones(
        &self,
        table: SyncTable,
        business_id: &str,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        match table {
            SyncTable::Businesses => self.upload_rows::<Business>(business_id, true, report).await,
            SyncTable::Users => self.upload_rows::<User>(business_id, true, report).await,
            SyncTable::Products => self.upload_rows::<Product>(business_id, true, report).await,
            SyncTable::Customers => self.upload_rows::<Customer>(business_id, true, report).await,
            SyncTable::Subscriptions => {
                self.upload_rows::<Subscription>(business_id, true, report).await
            }
            SyncTable::Transactions => {
                self.upload_rows::<Transaction>(business_id, true, report).await
            }
            SyncTable::TransactionItems => {
                self.upload_rows::<TransactionItem>(business_id, true, report).await
            }
            SyncTable::CashShifts => self.upload_rows::<CashShift>(business_id, true, report).await,
            SyncTable::ActivityLogs => {
                self.upload_rows::<ActivityLog>(business_id, true, report).await
            }
            SyncTable::StockReceipts => {
                self.upload_rows::<StockReceipt>(business_id, true, report).await
            }
            SyncTable::StockReceiptItems => {
                self.upload_rows::<StockReceiptItem>(business_id, true, report).await
            }
        }
    }

    /// Uploads and marks the pending rows of one flat table.
    async fn upload_rows<T>(
        &self,
        business_id: &str,
        tombstones: bool,
        report: &mut SyncReport,
    ) -> SyncResult<()>
    where
        T: ToRemote + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let rows: Vec<T> = self
            .db
            .sync()
            .fetch_pending(T::TABLE, business_id, tombstones, self.options.batch_size)
            .await?;
        if rows.is_empty() {
            return Ok(());
        }

        debug!(table = %T::TABLE, tombstones, count = rows.len(), "Uploading pending rows");

        for row in &rows {
            if let Some(ack) = self.push_row(business_id, row, report).await? {
                if tombstones {
                    report.tombstones += 1;
                }
                self.mark(row, &ack, report).await?;
            }
        }

        Ok(())
    }

    /// Uploads parents, then the lines of the parents the remote accepted.
    /// A parent is marked only when all of its lines made it.
    async fn upload_with_children<P, C>(
        &self,
        business_id: &str,
        report: &mut SyncReport,
    ) -> SyncResult<()>
    where
        P: ToRemote + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
        C: ChildRecord + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        debug_assert_eq!(P::TABLE.child(), Some(C::TABLE));

        let parents: Vec<P> = self
            .db
            .sync()
            .fetch_pending(P::TABLE, business_id, false, self.options.batch_size)
            .await?;
        if parents.is_empty() {
            return Ok(());
        }

        debug!(table = %P::TABLE, count = parents.len(), "Uploading pending parents");

        let mut accepted: Vec<(P, RemoteAck)> = Vec::with_capacity(parents.len());
        for parent in parents {
            if let Some(ack) = self.push_row(business_id, &parent, report).await? {
                accepted.push((parent, ack));
            }
        }
        if accepted.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = accepted.iter().map(|(p, _)| p.id().to_string()).collect();
        let children: Vec<C> = self
            .db
            .sync()
            .fetch_pending_children(C::TABLE, &ids)
            .await?;

        let mut incomplete: HashSet<String> = HashSet::new();
        for child in &children {
            match self.push_row(business_id, child, report).await? {
                Some(ack) => self.mark(child, &ack, report).await?,
                None => {
                    incomplete.insert(child.parent_id().to_string());
                }
            }
        }

        for (parent, ack) in &accepted {
            if incomplete.contains(parent.id()) {
                debug!(table = %P::TABLE, id = %parent.id(), "Lines not all accepted, parent left pending");
                report.held_back += 1;
                continue;
            }
            self.mark(parent, ack, report).await?;
        }

        Ok(())
    }

    /// Sends one record. `Ok(None)` means the remote refused it and the
    /// cycle goes on; an error means the cycle stops.
    async fn push_row<T: ToRemote>(
        &self,
        business_id: &str,
        row: &T,
        report: &mut SyncReport,
    ) -> SyncResult<Option<RemoteAck>> {
        let payload = match row.to_remote() {
            Ok(payload) => payload,
            Err(e) => {
                error!(table = %T::TABLE, id = %row.id(), error = %e, "Could not encode row");
                report.failed += 1;
                return Ok(None);
            }
        };

        let request = UpsertRequest {
            table: T::TABLE,
            business_id: business_id.to_string(),
            record_id: row.id().to_string(),
            payload,
        };

        match self.remote.upsert(&request).await {
            Ok(ack) => {
                report.uploaded += 1;
                Ok(Some(ack))
            }
            Err(e) if e.aborts_cycle() => Err(e),
            Err(e) => {
                warn!(table = %T::TABLE, id = %row.id(), error = %e, "Upload failed, row stays pending");
                report.failed += 1;
                Ok(None)
            }
        }
    }

    async fn mark<T: ToRemote>(
        &self,
        row: &T,
        ack: &RemoteAck,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let marked = self
            .db
            .sync()
            .mark_synced(T::TABLE, row.id(), row.updated_at(), ack.remote_id.as_deref())
            .await?;

        if marked {
            report.marked += 1;
        } else {
            report.raced += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRemote;
    use tally_core::clock::new_id;
    use tally_core::{CreateSaleInput, PaymentMethod, SaleLine, SyncStatus};
    use tally_db::{BusinessProfile, DbConfig, NewProduct};

    struct Shop {
        db: Database,
        business: Business,
        remote: MemoryRemote,
        engine: SyncEngine,
        cashier_id: String,
    }

    async fn shop() -> Shop {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let business = db
            .businesses()
            .create(BusinessProfile {
                name: "Chitungwiza Hardware".to_string(),
                currency: "USD".to_string(),
                address: None,
                phone: None,
                email: None,
                tax_rate_bps: 0,
            })
            .await
            .unwrap();

        let remote = MemoryRemote::new();
        let engine = SyncEngine::new(
            db.clone(),
            Arc::new(remote.clone()),
            EngineOptions {
                device_id: Some("till-1".to_string()),
                ..EngineOptions::default()
            },
        );

        Shop {
            db,
            business,
            remote,
            engine,
            cashier_id: new_id(),
        }
    }

    impl Shop {
        async fn product(&self, name: &str, price_cents: i64) -> Product {
            self.db
                .products()
                .create(
                    NewProduct {
                        business_id: self.business.id.clone(),
                        name: name.to_string(),
                        category: None,
                        sku: None,
                        barcode: None,
                        price_cents,
                        cost_cents: 0,
                        stock: 50,
                        low_stock_threshold: 5,
                    },
                    &self.cashier_id,
                )
                .await
                .unwrap()
        }

        async fn sell(&self, lines: &[(&Product, i64)]) -> Transaction {
            self.db
                .sales()
                .create_sale(CreateSaleInput {
                    business_id: self.business.id.clone(),
                    lines: lines
                        .iter()
                        .map(|(p, qty)| SaleLine {
                            product_id: p.id.clone(),
                            unit_price_cents: p.price_cents,
                            quantity: *qty,
                        })
                        .collect(),
                    discount_cents: 0,
                    payment_method: PaymentMethod::Card,
                    amount_tendered_cents: 0,
                    cashier_id: self.cashier_id.clone(),
                    customer_id: None,
                    tax_rate_bps: 0,
                    enforce_stock: false,
                })
                .await
                .unwrap()
                .transaction
        }

        async fn pending_total(&self) -> i64 {
            self.engine
                .pending_summary()
                .await
                .unwrap()
                .iter()
                .map(|c| c.live + c.tombstones)
                .sum()
        }
    }

    #[tokio::test]
    async fn test_full_cycle_uploads_everything_once() {
        let s = shop().await;
        let nails = s.product("Nails 1kg", 300).await;
        let glue = s.product("Wood Glue", 450).await;
        let tx = s.sell(&[(&nails, 2), (&glue, 1)]).await;

        let report = s.engine.run(&s.business.id).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.failed, 0);
        assert_eq!(report.marked, report.uploaded);
        assert_eq!(s.pending_total().await, 0);

        assert!(s.remote.record(SyncTable::Businesses, &s.business.id).is_some());
        assert_eq!(s.remote.record_count(SyncTable::TransactionItems), 2);
        let remote_tx = s.remote.record(SyncTable::Transactions, &tx.id).unwrap();
        assert_eq!(remote_tx["receiptNo"], 1);
        assert_eq!(remote_tx["totalCents"], 1050);

        let stored = s.db.sales().get(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.remote_id, Some(format!("remote-{}", tx.id)));

        // Nothing pending: a second cycle sends nothing
        let calls = s.remote.calls().len();
        let again = s.engine.run(&s.business.id).await.unwrap();
        assert_eq!(again.uploaded, 0);
        assert_eq!(s.remote.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_parents_go_before_children() {
        let s = shop().await;
        let cement = s.product("Cement 50kg", 1100).await;
        s.sell(&[(&cement, 1)]).await;

        s.engine.run(&s.business.id).await.unwrap();

        let order: Vec<SyncTable> = s.remote.calls().into_iter().map(|(t, _)| t).collect();
        let first = |table: SyncTable| order.iter().position(|t| *t == table).unwrap();
        assert_eq!(order[0], SyncTable::Businesses);
        assert!(first(SyncTable::Products) < first(SyncTable::Transactions));
        assert!(first(SyncTable::Transactions) < first(SyncTable::TransactionItems));
    }

    #[tokio::test]
    async fn test_refused_line_holds_back_its_sale() {
        let s = shop().await;
        let paint = s.product("Paint 5L", 2500).await;
        let brush = s.product("Brush", 300).await;
        let held = s.sell(&[(&paint, 1), (&brush, 1)]).await;
        let clean = s.sell(&[(&brush, 2)]).await;

        let items = s.db.sales().get_items(&held.id).await.unwrap();
        s.remote.reject(&items[1].id);

        let report = s.engine.run(&s.business.id).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.failed, 1);
        assert_eq!(report.held_back, 1);

        let held_row = s.db.sales().get(&held.id).await.unwrap().unwrap();
        assert_eq!(held_row.sync_status, SyncStatus::Pending);
        let clean_row = s.db.sales().get(&clean.id).await.unwrap().unwrap();
        assert_eq!(clean_row.sync_status, SyncStatus::Synced);

        // Once the remote accepts the line, the sale completes
        s.remote.accept_all();
        let report = s.engine.run(&s.business.id).await.unwrap();
        assert_eq!(report.failed, 0);
        let held_row = s.db.sales().get(&held.id).await.unwrap().unwrap();
        assert_eq!(held_row.sync_status, SyncStatus::Synced);
        assert_eq!(s.pending_total().await, 0);

        // The sale went out twice but the remote holds it once
        let sends = s
            .remote
            .calls()
            .into_iter()
            .filter(|(t, id)| *t == SyncTable::Transactions && *id == held.id)
            .count();
        assert_eq!(sends, 2);
        assert_eq!(s.remote.record_count(SyncTable::Transactions), 2);
        assert_eq!(s.remote.record_count(SyncTable::TransactionItems), 3);
    }

    #[tokio::test]
    async fn test_unreachable_remote_aborts_cycle() {
        let s = shop().await;
        for name in ["Hinge", "Padlock", "Bolt"] {
            s.product(name, 100).await;
        }
        let before = s.pending_total().await;

        s.remote.go_offline_after(2);
        let report = s.engine.run(&s.business.id).await.unwrap();

        assert!(!report.is_complete());
        assert!(report.aborted.is_some());
        assert_eq!(report.uploaded, 2);
        assert!(s.remote.beacons().is_empty());
        assert_eq!(s.engine.last_sync_at().await.unwrap(), None);
        assert_eq!(s.pending_total().await, before - 2);

        s.remote.go_online();
        let report = s.engine.run(&s.business.id).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(s.pending_total().await, 0);
    }

    #[tokio::test]
    async fn test_tombstones_upload_after_live_rows() {
        let s = shop().await;
        let old = s.product("Discontinued Rake", 900).await;
        s.engine.run(&s.business.id).await.unwrap();

        s.db.products().soft_delete(&old.id, &s.cashier_id).await.unwrap();
        let report = s.engine.run(&s.business.id).await.unwrap();

        assert_eq!(report.tombstones, 1);
        let remote = s.remote.record(SyncTable::Products, &old.id).unwrap();
        assert_eq!(remote["deleted"], true);

        let stored = s.db.products().get(&old.id).await.unwrap().unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.sync_status, SyncStatus::Synced);

        // The deletion's own audit entry went up in the live pass before it
        let calls = s.remote.calls();
        let tombstone_at = calls.iter().rposition(|(_, id)| *id == old.id).unwrap();
        assert!(calls[..tombstone_at]
            .iter()
            .any(|(t, _)| *t == SyncTable::ActivityLogs));
    }

    #[tokio::test]
    async fn test_beacon_and_last_sync_recorded() {
        let s = shop().await;
        assert_eq!(s.engine.last_sync_at().await.unwrap(), None);

        let report = s.engine.run(&s.business.id).await.unwrap();

        let beacons = s.remote.beacons();
        assert_eq!(beacons.len(), 1);
        assert_eq!(beacons[0].device_id, "till-1");
        assert_eq!(beacons[0].business_id, s.business.id);
        assert_eq!(beacons[0].uploaded, report.uploaded);
        assert_eq!(s.engine.last_sync_at().await.unwrap(), report.completed_at);
    }

    #[tokio::test]
    async fn test_one_cycle_at_a_time() {
        let s = shop().await;

        let guard = s.engine.try_begin().unwrap();
        assert!(matches!(
            s.engine.run(&s.business.id).await,
            Err(SyncError::AlreadyRunning)
        ));

        drop(guard);
        assert!(s.engine.run(&s.business.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_business_untouched() {
        let s = shop().await;
        let other = s
            .db
            .businesses()
            .create(BusinessProfile {
                name: "Next Door Spares".to_string(),
                currency: "USD".to_string(),
                address: None,
                phone: None,
                email: None,
                tax_rate_bps: 0,
            })
            .await
            .unwrap();

        s.engine.run(&s.business.id).await.unwrap();

        assert!(s.remote.record(SyncTable::Businesses, &other.id).is_none());
        let stored = s.db.businesses().get(&other.id).await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Pending);
    }
}
