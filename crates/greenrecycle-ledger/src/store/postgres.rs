//! Postgres ledger store.
//!
//! Row locks are `SELECT … FOR UPDATE`; money is `NUMERIC`, never float.
//! Appends to the audit chain take a transaction-scoped advisory lock so the
//! head (last `seq` and `entry_hash`) is read and extended by one writer at
//! a time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenrecycle_types::{
    AuditEntry, AuditRecord, Collector, CollectorId, EntityType, GENESIS_HASH, InventoryEntry,
    Material, MaterialId, Order, OrderId, PricingRule, PricingRuleId, RecycleError, Result, User,
    UserId, Withdrawal, WithdrawalId,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::{LedgerStore, LedgerTx};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Key of the advisory lock serializing audit chain appends.
const AUDIT_CHAIN_LOCK: i64 = 0x4752_4155_4449_5400;

pub(crate) fn storage_error(err: sqlx::Error) -> RecycleError {
    RecycleError::Storage(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Connection settings for [`PgLedgerStore::connect`].
#[derive(Debug, Clone)]
pub struct PgConnectOptions {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: std::time::Duration,
}

/// [`LedgerStore`] over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool with the given settings.
    pub async fn connect(options: &PgConnectOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .min_connections(options.min_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(&options.url)
            .await
            .map_err(storage_error)?;
        info!(
            max_connections = options.max_connections,
            "Connected to ledger database"
        );
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create missing tables and indexes.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        info!("Ledger schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await.map_err(storage_error)?;
        Ok(Box::new(PgLedgerTx { tx }))
    }
}

/// Open Postgres transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

// =========================================================================
// Row mapping
// =========================================================================

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    material_id: Uuid,
    collector_id: Option<Uuid>,
    status: String,
    address: String,
    unit_price_snapshot: Option<Decimal>,
    weight_actual: Option<Decimal>,
    impurity_percent: Decimal,
    applied_bonus_amount: Decimal,
    amount_final: Option<Decimal>,
    appointment_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RecycleError;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Self {
            id: OrderId(row.id),
            user_id: UserId(row.user_id),
            material_id: MaterialId(row.material_id),
            collector_id: row.collector_id.map(CollectorId),
            status: row.status.parse()?,
            address: row.address,
            unit_price_snapshot: row.unit_price_snapshot,
            weight_actual: row.weight_actual,
            impurity_percent: row.impurity_percent,
            applied_bonus_amount: row.applied_bonus_amount,
            amount_final: row.amount_final,
            appointment_time: row.appointment_time,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    display_name: String,
    balance: Decimal,
    points: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id),
            display_name: row.display_name,
            balance: row.balance,
            points: row.points,
        }
    }
}

#[derive(FromRow)]
struct CollectorRow {
    id: Uuid,
    user_id: Option<Uuid>,
    name: String,
    balance: Decimal,
}

impl From<CollectorRow> for Collector {
    fn from(row: CollectorRow) -> Self {
        Self {
            id: CollectorId(row.id),
            user_id: row.user_id.map(UserId),
            name: row.name,
            balance: row.balance,
        }
    }
}

#[derive(FromRow)]
struct MaterialRow {
    id: Uuid,
    name: String,
    category: String,
    current_price: Decimal,
}

impl From<MaterialRow> for Material {
    fn from(row: MaterialRow) -> Self {
        Self {
            id: MaterialId(row.id),
            name: row.name,
            category: row.category,
            current_price: row.current_price,
        }
    }
}

#[derive(FromRow)]
struct RuleRow {
    id: Uuid,
    material_id: Uuid,
    name: String,
    min_weight: Decimal,
    bonus_percent: Decimal,
    priority: i32,
}

impl From<RuleRow> for PricingRule {
    fn from(row: RuleRow) -> Self {
        Self {
            id: PricingRuleId(row.id),
            material_id: MaterialId(row.material_id),
            name: row.name,
            min_weight: row.min_weight,
            bonus_percent: row.bonus_percent,
            priority: row.priority,
        }
    }
}

#[derive(FromRow)]
struct InventoryRow {
    material_id: Uuid,
    weight: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryEntry {
    fn from(row: InventoryRow) -> Self {
        Self {
            material_id: MaterialId(row.material_id),
            weight: row.weight,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct WithdrawalRow {
    id: Uuid,
    user_id: Uuid,
    collector_id: Option<Uuid>,
    order_id: Option<Uuid>,
    amount: Decimal,
    status: String,
    channel: String,
    requested_at: DateTime<Utc>,
}

impl TryFrom<WithdrawalRow> for Withdrawal {
    type Error = RecycleError;

    fn try_from(row: WithdrawalRow) -> Result<Self> {
        Ok(Self {
            id: WithdrawalId(row.id),
            user_id: UserId(row.user_id),
            collector_id: row.collector_id.map(CollectorId),
            order_id: row.order_id.map(OrderId),
            amount: row.amount,
            status: row.status.parse()?,
            channel: row.channel,
            requested_at: row.requested_at,
        })
    }
}

#[derive(FromRow)]
struct AuditRow {
    seq: i64,
    entity_type: String,
    entity_id: Uuid,
    action: String,
    old_value: Option<String>,
    new_value: Option<String>,
    operator_type: String,
    operator_id: Option<Uuid>,
    recorded_at: DateTime<Utc>,
    prev_hash: Vec<u8>,
    entry_hash: Vec<u8>,
}

fn hash32(bytes: Vec<u8>, seq: i64) -> Result<[u8; 32]> {
    bytes.try_into().map_err(|_| {
        RecycleError::Serialization(format!("audit entry {seq} has a malformed hash"))
    })
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = RecycleError;

    fn try_from(row: AuditRow) -> Result<Self> {
        let seq = u64::try_from(row.seq)
            .map_err(|_| RecycleError::Serialization(format!("negative audit seq {}", row.seq)))?;
        Ok(Self {
            seq,
            record: AuditRecord {
                entity_type: row.entity_type.parse()?,
                entity_id: row.entity_id,
                action: row.action.parse()?,
                old_value: row.old_value,
                new_value: row.new_value,
                operator_type: row.operator_type.parse()?,
                operator_id: row.operator_id,
            },
            recorded_at: row.recorded_at,
            prev_hash: hash32(row.prev_hash, row.seq)?,
            entry_hash: hash32(row.entry_hash, row.seq)?,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, material_id, collector_id, status, address, \
     unit_price_snapshot, weight_actual, impurity_percent, applied_bonus_amount, \
     amount_final, appointment_time, created_at";

const WITHDRAWAL_COLUMNS: &str =
    "id, user_id, collector_id, order_id, amount, status, channel, requested_at";

const AUDIT_COLUMNS: &str = "seq, entity_type, entity_id, action, old_value, new_value, \
     operator_type, operator_id, recorded_at, prev_hash, entry_hash";

// =========================================================================
// Transaction
// =========================================================================

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage_error)?
            .map(Order::try_from)
            .transpose()
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let sql = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        );
        sqlx::query(&sql)
            .bind(order.id.0)
            .bind(order.user_id.0)
            .bind(order.material_id.0)
            .bind(order.collector_id.map(|c| c.0))
            .bind(order.status.as_str())
            .bind(&order.address)
            .bind(order.unit_price_snapshot)
            .bind(order.weight_actual)
            .bind(order.impurity_percent)
            .bind(order.applied_bonus_amount)
            .bind(order.amount_final)
            .bind(order.appointment_time)
            .bind(order.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET collector_id = $2, status = $3, unit_price_snapshot = $4, \
             weight_actual = $5, impurity_percent = $6, applied_bonus_amount = $7, \
             amount_final = $8 WHERE id = $1",
        )
        .bind(order.id.0)
        .bind(order.collector_id.map(|c| c.0))
        .bind(order.status.as_str())
        .bind(order.unit_price_snapshot)
        .bind(order.weight_actual)
        .bind(order.impurity_percent)
        .bind(order.applied_bonus_amount)
        .bind(order.amount_final)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(RecycleError::OrderNotFound(order.id));
        }
        Ok(())
    }

    async fn stale_order_ids(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<OrderId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE status = 'pending' AND created_at < $1 \
             ORDER BY created_at, id",
        )
        .bind(cutoff)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(ids.into_iter().map(OrderId).collect())
    }

    async fn user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, display_name, balance, points FROM users WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(row.map(User::from))
    }

    async fn user_for_update(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, display_name, balance, points FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(row.map(User::from))
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, display_name, balance, points) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.id.0)
        .bind(&user.display_name)
        .bind(user.balance)
        .bind(user.points)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<()> {
        let result = sqlx::query("UPDATE users SET balance = $2, points = $3 WHERE id = $1")
            .bind(user.id.0)
            .bind(user.balance)
            .bind(user.points)
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(RecycleError::UserNotFound(user.id));
        }
        Ok(())
    }

    async fn collector_for_update(&mut self, id: CollectorId) -> Result<Option<Collector>> {
        let row = sqlx::query_as::<_, CollectorRow>(
            "SELECT id, user_id, name, balance FROM collectors WHERE id = $1 FOR UPDATE",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(row.map(Collector::from))
    }

    async fn insert_collector(&mut self, collector: &Collector) -> Result<()> {
        sqlx::query("INSERT INTO collectors (id, user_id, name, balance) VALUES ($1, $2, $3, $4)")
            .bind(collector.id.0)
            .bind(collector.user_id.map(|u| u.0))
            .bind(&collector.name)
            .bind(collector.balance)
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn update_collector(&mut self, collector: &Collector) -> Result<()> {
        let result = sqlx::query("UPDATE collectors SET balance = $2 WHERE id = $1")
            .bind(collector.id.0)
            .bind(collector.balance)
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(RecycleError::CollectorNotFound(collector.id));
        }
        Ok(())
    }

    async fn material(&mut self, id: MaterialId) -> Result<Option<Material>> {
        let row = sqlx::query_as::<_, MaterialRow>(
            "SELECT id, name, category, current_price FROM materials WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(row.map(Material::from))
    }

    async fn upsert_material(&mut self, material: &Material) -> Result<()> {
        sqlx::query(
            "INSERT INTO materials (id, name, category, current_price) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             category = EXCLUDED.category, current_price = EXCLUDED.current_price",
        )
        .bind(material.id.0)
        .bind(&material.name)
        .bind(&material.category)
        .bind(material.current_price)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn pricing_rules(&mut self, material_id: MaterialId) -> Result<Vec<PricingRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, material_id, name, min_weight, bonus_percent, priority \
             FROM pricing_rules WHERE material_id = $1 ORDER BY id",
        )
        .bind(material_id.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(rows.into_iter().map(PricingRule::from).collect())
    }

    async fn insert_pricing_rule(&mut self, rule: &PricingRule) -> Result<()> {
        sqlx::query(
            "INSERT INTO pricing_rules (id, material_id, name, min_weight, bonus_percent, priority) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(rule.id.0)
        .bind(rule.material_id.0)
        .bind(&rule.name)
        .bind(rule.min_weight)
        .bind(rule.bonus_percent)
        .bind(rule.priority)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn inventory_for_update(
        &mut self,
        material_id: MaterialId,
    ) -> Result<Option<InventoryEntry>> {
        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT material_id, weight, updated_at FROM inventory \
             WHERE material_id = $1 FOR UPDATE",
        )
        .bind(material_id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(row.map(InventoryEntry::from))
    }

    async fn upsert_inventory(&mut self, entry: &InventoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO inventory (material_id, weight, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (material_id) DO UPDATE SET weight = EXCLUDED.weight, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(entry.material_id.0)
        .bind(entry.weight)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn withdrawal_for_update(&mut self, id: WithdrawalId) -> Result<Option<Withdrawal>> {
        let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, WithdrawalRow>(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage_error)?
            .map(Withdrawal::try_from)
            .transpose()
    }

    async fn withdrawal_for_order(&mut self, order_id: OrderId) -> Result<Option<Withdrawal>> {
        let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE order_id = $1");
        sqlx::query_as::<_, WithdrawalRow>(&sql)
            .bind(order_id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage_error)?
            .map(Withdrawal::try_from)
            .transpose()
    }

    async fn insert_withdrawal(&mut self, withdrawal: &Withdrawal) -> Result<()> {
        let sql = format!(
            "INSERT INTO withdrawals ({WITHDRAWAL_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        );
        sqlx::query(&sql)
            .bind(withdrawal.id.0)
            .bind(withdrawal.user_id.0)
            .bind(withdrawal.collector_id.map(|c| c.0))
            .bind(withdrawal.order_id.map(|o| o.0))
            .bind(withdrawal.amount)
            .bind(withdrawal.status.as_str())
            .bind(&withdrawal.channel)
            .bind(withdrawal.requested_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|err| match withdrawal.order_id {
                Some(order_id) if is_unique_violation(&err) => {
                    RecycleError::OrderAlreadyWithdrawn(order_id)
                }
                _ => storage_error(err),
            })?;
        Ok(())
    }

    async fn update_withdrawal(&mut self, withdrawal: &Withdrawal) -> Result<()> {
        let result = sqlx::query("UPDATE withdrawals SET status = $2 WHERE id = $1")
            .bind(withdrawal.id.0)
            .bind(withdrawal.status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(RecycleError::WithdrawalNotFound(withdrawal.id));
        }
        Ok(())
    }

    async fn stale_withdrawal_ids(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<WithdrawalId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM withdrawals WHERE status = 'pending' AND requested_at < $1 \
             ORDER BY requested_at, id",
        )
        .bind(cutoff)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        Ok(ids.into_iter().map(WithdrawalId).collect())
    }

    async fn pending_withdrawal_total(&mut self, user_id: UserId) -> Result<Decimal> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM withdrawals \
             WHERE user_id = $1 AND status = 'pending'",
        )
        .bind(user_id.0)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(storage_error)
    }

    async fn append_audit(&mut self, record: AuditRecord) -> Result<AuditEntry> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(AUDIT_CHAIN_LOCK)
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;

        let head: Option<(i64, Vec<u8>)> =
            sqlx::query_as("SELECT seq, entry_hash FROM audit_log ORDER BY seq DESC LIMIT 1")
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(storage_error)?;
        let (seq, prev_hash) = match head {
            Some((seq, hash)) => (
                u64::try_from(seq + 1)
                    .map_err(|_| RecycleError::Serialization(format!("bad audit seq {seq}")))?,
                hash32(hash, seq)?,
            ),
            None => (1, GENESIS_HASH),
        };

        let entry = AuditEntry::seal(record, seq, prev_hash, Utc::now());
        let sql = format!(
            "INSERT INTO audit_log ({AUDIT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        sqlx::query(&sql)
            .bind(i64::try_from(entry.seq).map_err(|e| RecycleError::Internal(e.to_string()))?)
            .bind(entry.record.entity_type.as_str())
            .bind(entry.record.entity_id)
            .bind(entry.record.action.as_str())
            .bind(entry.record.old_value.as_deref())
            .bind(entry.record.new_value.as_deref())
            .bind(entry.record.operator_type.as_str())
            .bind(entry.record.operator_id)
            .bind(entry.recorded_at)
            .bind(entry.prev_hash.as_slice())
            .bind(entry.entry_hash.as_slice())
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;
        Ok(entry)
    }

    async fn audit_for_entity(
        &mut self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<AuditEntry>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log \
             WHERE entity_type = $1 AND entity_id = $2 ORDER BY seq"
        );
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(entity_type.as_str())
            .bind(entity_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage_error)?;
        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    async fn audit_log(&mut self) -> Result<Vec<AuditEntry>> {
        let sql = format!("SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY seq");
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage_error)?;
        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(storage_error)
    }
}
