//! The default [`PersistenceStore`]: everything held in memory, optionally
//! backed by a write-ahead journal for crash recovery.

#[cfg(feature = "journal")]
use super::journal::{FileJournal, JournalRecord};
use super::{PersistenceError, PersistenceStore};
use crate::domain::{Liquidation, Order, Position, Trade, Trader};
use crate::market::stats::MarketStats;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
#[cfg(feature = "journal")]
use std::path::Path;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    traders: HashMap<Uuid, Trader>,
    orders: HashMap<Uuid, Order>,
    positions: HashMap<(Uuid, String), Position>,
    trades: Vec<Trade>,
    liquidations: Vec<Liquidation>,
    fund_balance: Decimal,
    fund_total_in: Decimal,
    fund_total_out: Decimal,
    market_stats: Option<MarketStats>,
}

/// In-memory backing for the kernel's six persisted tables.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(feature = "journal")]
    journal: Option<FileJournal>,
}

impl MemoryStore {
    /// A fresh, empty store with no durability.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            #[cfg(feature = "journal")]
            journal: None,
        }
    }

    /// A store backed by a write-ahead journal at `path`. Every mutating
    /// call appends a record here before updating the in-memory tables.
    #[cfg(feature = "journal")]
    pub fn with_journal(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        Ok(Self {
            tables: RwLock::new(Tables::default()),
            journal: Some(FileJournal::open(path)?),
        })
    }

    /// Rebuild a store by replaying every record in the journal at `path`,
    /// in order, then continue journaling new writes to the same file.
    #[cfg(feature = "journal")]
    pub fn recover(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let records = FileJournal::replay(&path)?;
        let store = Self::with_journal(path)?;
        {
            let mut tables = store.tables.write();
            for record in records {
                apply_record(&mut tables, record);
            }
        }
        Ok(store)
    }

    #[cfg(feature = "journal")]
    fn journal_append(&self, record: JournalRecord) -> Result<(), PersistenceError> {
        if let Some(journal) = &self.journal {
            journal.append(&record)?;
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "journal")]
fn apply_record(tables: &mut Tables, record: JournalRecord) {
    match record {
        JournalRecord::TraderUpserted(trader) => {
            tables.traders.insert(trader.id, trader);
        }
        JournalRecord::OrderUpserted(order) => {
            tables.orders.insert(order.id, order);
        }
        JournalRecord::PositionUpserted(position) => {
            tables
                .positions
                .insert((position.trader_id, position.instrument.clone()), position);
        }
        JournalRecord::PositionDeleted {
            trader_id,
            instrument,
        } => {
            tables.positions.remove(&(trader_id, instrument));
        }
        JournalRecord::TradeAppended(trade) => tables.trades.push(trade),
        JournalRecord::LiquidationAppended(liquidation) => tables.liquidations.push(liquidation),
        JournalRecord::InsuranceFundBalance {
            balance,
            total_in,
            total_out,
        } => {
            tables.fund_balance = balance;
            tables.fund_total_in = total_in;
            tables.fund_total_out = total_out;
        }
        JournalRecord::MarketStatsUpserted(stats) => {
            tables.market_stats = Some(stats);
        }
    }
}

impl PersistenceStore for MemoryStore {
    fn put_trader(&self, trader: &Trader) -> Result<(), PersistenceError> {
        #[cfg(feature = "journal")]
        self.journal_append(JournalRecord::TraderUpserted(trader.clone()))?;
        self.tables.write().traders.insert(trader.id, trader.clone());
        Ok(())
    }

    fn load_traders(&self) -> Result<Vec<Trader>, PersistenceError> {
        Ok(self.tables.read().traders.values().cloned().collect())
    }

    fn put_order(&self, order: &Order) -> Result<(), PersistenceError> {
        #[cfg(feature = "journal")]
        self.journal_append(JournalRecord::OrderUpserted(order.clone()))?;
        self.tables.write().orders.insert(order.id, order.clone());
        Ok(())
    }

    fn put_position(&self, position: &Position) -> Result<(), PersistenceError> {
        #[cfg(feature = "journal")]
        self.journal_append(JournalRecord::PositionUpserted(position.clone()))?;
        self.tables
            .write()
            .positions
            .insert((position.trader_id, position.instrument.clone()), position.clone());
        Ok(())
    }

    fn delete_position(&self, trader_id: Uuid, instrument: &str) -> Result<(), PersistenceError> {
        #[cfg(feature = "journal")]
        self.journal_append(JournalRecord::PositionDeleted {
            trader_id,
            instrument: instrument.to_string(),
        })?;
        self.tables
            .write()
            .positions
            .remove(&(trader_id, instrument.to_string()));
        Ok(())
    }

    fn append_trade(&self, trade: &Trade) -> Result<(), PersistenceError> {
        #[cfg(feature = "journal")]
        self.journal_append(JournalRecord::TradeAppended(trade.clone()))?;
        self.tables.write().trades.push(trade.clone());
        Ok(())
    }

    fn append_liquidation(&self, liquidation: &Liquidation) -> Result<(), PersistenceError> {
        #[cfg(feature = "journal")]
        self.journal_append(JournalRecord::LiquidationAppended(liquidation.clone()))?;
        self.tables.write().liquidations.push(liquidation.clone());
        Ok(())
    }

    fn put_insurance_fund_balance(
        &self,
        balance: Decimal,
        total_in: Decimal,
        total_out: Decimal,
    ) -> Result<(), PersistenceError> {
        #[cfg(feature = "journal")]
        self.journal_append(JournalRecord::InsuranceFundBalance {
            balance,
            total_in,
            total_out,
        })?;
        let mut tables = self.tables.write();
        tables.fund_balance = balance;
        tables.fund_total_in = total_in;
        tables.fund_total_out = total_out;
        Ok(())
    }

    fn load_resting_orders(&self) -> Result<Vec<Order>, PersistenceError> {
        Ok(self
            .tables
            .read()
            .orders
            .values()
            .filter(|o| o.status.is_resting())
            .cloned()
            .collect())
    }

    fn load_positions(&self) -> Result<Vec<Position>, PersistenceError> {
        Ok(self.tables.read().positions.values().cloned().collect())
    }

    fn recent_trades(&self, limit: usize) -> Result<Vec<Trade>, PersistenceError> {
        let tables = self.tables.read();
        Ok(tables.trades.iter().rev().take(limit).cloned().collect())
    }

    fn trades_for_trader(&self, trader_id: Uuid, limit: usize) -> Result<Vec<Trade>, PersistenceError> {
        let tables = self.tables.read();
        Ok(tables
            .trades
            .iter()
            .rev()
            .filter(|t| t.buyer_id == trader_id || t.seller_id == trader_id)
            .take(limit)
            .cloned()
            .collect())
    }

    fn recent_liquidations(&self, limit: usize) -> Result<Vec<Liquidation>, PersistenceError> {
        let tables = self.tables.read();
        Ok(tables
            .liquidations
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    fn trades_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Trade>, PersistenceError> {
        let tables = self.tables.read();
        Ok(tables
            .trades
            .iter()
            .filter(|t| t.timestamp >= since && t.timestamp <= until)
            .cloned()
            .collect())
    }

    fn load_insurance_fund_balance(
        &self,
    ) -> Result<Option<(Decimal, Decimal, Decimal)>, PersistenceError> {
        let tables = self.tables.read();
        if tables.fund_balance.is_zero() && tables.fund_total_in.is_zero() && tables.fund_total_out.is_zero() {
            return Ok(None);
        }
        Ok(Some((
            tables.fund_balance,
            tables.fund_total_in,
            tables.fund_total_out,
        )))
    }

    fn put_market_stats(&self, stats: &MarketStats) -> Result<(), PersistenceError> {
        #[cfg(feature = "journal")]
        self.journal_append(JournalRecord::MarketStatsUpserted(*stats))?;
        self.tables.write().market_stats = Some(*stats);
        Ok(())
    }

    fn get_market_stats(&self) -> Result<Option<MarketStats>, PersistenceError> {
        Ok(self.tables.read().market_stats)
    }
}
