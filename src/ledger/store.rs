//! Read-side access to posted ledger entries.
//!
//! Entries are only ever written by the voucher engine's posting step; this
//! module provides the queries the rest of the system (and its UI) read
//! balances and listings from.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::LedgerStorage;
use crate::types::*;

/// Default page size for entry listings
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Maximum page size for entry listings
pub const MAX_PAGE_LIMIT: u32 = 500;

/// One row of an account statement: the entry plus the balance after it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementLine {
    pub entry: LedgerEntry,
    /// Account balance (on its normal side) after applying this entry
    pub balance_after: BigDecimal,
}

/// Read-side store over posted ledger entries
pub struct EntryStore<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> EntryStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Filtered, paginated entry listing. The statistics cover the full
    /// filtered set, not just the returned page.
    pub async fn query_entries(&self, query: &EntryQuery) -> LedgerResult<EntryPage> {
        let mut query = query.clone();
        if query.page == 0 {
            query.page = 1;
        }
        if query.limit == 0 {
            query.limit = DEFAULT_PAGE_LIMIT;
        }
        query.limit = query.limit.min(MAX_PAGE_LIMIT);
        self.storage.query_entries(&query).await
    }

    /// The balance of an account, derived by summing its entries up to and
    /// including `as_of` (all entries when `None`). Debit-normal accounts
    /// sum debit minus credit; credit-normal accounts the reverse. This is
    /// the single source of truth for any balance shown anywhere.
    pub async fn account_balance(
        &self,
        account_id: Uuid,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let entries = self.storage.entries_for_account(account_id, as_of).await?;
        Ok(entries
            .iter()
            .map(|e| e.movement(account.normal_side))
            .sum())
    }

    /// Account statement over a date range with a running balance per row.
    /// The running balance starts from the account's balance the day before
    /// `from` (zero when `from` is `None`).
    pub async fn account_statement(
        &self,
        account_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<Vec<StatementLine>> {
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let mut balance = match from.and_then(|d| d.pred_opt()) {
            Some(day_before) => self.account_balance(account_id, Some(day_before)).await?,
            None => BigDecimal::from(0),
        };

        let entries = self.storage.entries_for_account(account_id, to).await?;
        let mut lines = Vec::new();
        for entry in entries {
            if let Some(from) = from {
                if entry.date < from {
                    continue;
                }
            }
            balance += entry.movement(account.normal_side);
            lines.push(StatementLine {
                entry,
                balance_after: balance.clone(),
            });
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::account::AccountRegistry;
    use crate::ledger::voucher::{VoucherBuilder, VoucherEngine};
    use crate::utils::memory_storage::MemoryStorage;

    fn dec(v: i64) -> BigDecimal {
        BigDecimal::from(v)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        storage: MemoryStorage,
        cash: Account,
        sales: Account,
        rent: Account,
    }

    async fn fixture() -> Fixture {
        let storage = MemoryStorage::new();
        let registry = AccountRegistry::new(storage.clone());
        let cash = registry
            .create_account(
                "1000".to_string(),
                "Cash".to_string(),
                AccountType::Asset,
                AccountClass::Cash,
            )
            .await
            .unwrap();
        let sales = registry
            .create_account(
                "4000".to_string(),
                "Parts Sales".to_string(),
                AccountType::Income,
                AccountClass::General,
            )
            .await
            .unwrap();
        let rent = registry
            .create_account(
                "6100".to_string(),
                "Rent Expense".to_string(),
                AccountType::Expense,
                AccountClass::General,
            )
            .await
            .unwrap();
        Fixture {
            storage,
            cash,
            sales,
            rent,
        }
    }

    async fn post(
        fx: &Fixture,
        day: NaiveDate,
        narration: &str,
        debit: (Uuid, i64),
        credit: (Uuid, i64),
    ) {
        let engine = VoucherEngine::new(fx.storage.clone());
        let input = VoucherBuilder::new(VoucherType::Journal, day, narration)
            .created_by("tester")
            .debit(debit.0, dec(debit.1))
            .credit(credit.0, dec(credit.1))
            .build()
            .unwrap();
        let voucher = engine.create_voucher(input).await.unwrap();
        engine.post_voucher(voucher.id).await.unwrap();
    }

    #[tokio::test]
    async fn balances_follow_the_normal_side() {
        let fx = fixture().await;
        post(
            &fx,
            date(2024, 6, 1),
            "sale",
            (fx.cash.id, 500),
            (fx.sales.id, 500),
        )
        .await;
        post(
            &fx,
            date(2024, 6, 2),
            "rent",
            (fx.rent.id, 200),
            (fx.cash.id, 200),
        )
        .await;

        let store = EntryStore::new(fx.storage.clone());
        assert_eq!(store.account_balance(fx.cash.id, None).await.unwrap(), dec(300));
        assert_eq!(
            store.account_balance(fx.sales.id, None).await.unwrap(),
            dec(500)
        );
        assert_eq!(store.account_balance(fx.rent.id, None).await.unwrap(), dec(200));

        // point-in-time balance ignores later entries
        assert_eq!(
            store
                .account_balance(fx.cash.id, Some(date(2024, 6, 1)))
                .await
                .unwrap(),
            dec(500)
        );
    }

    #[tokio::test]
    async fn statistics_cover_the_full_filtered_set() {
        let fx = fixture().await;
        for day in 1..=5 {
            post(
                &fx,
                date(2024, 6, day),
                "sale",
                (fx.cash.id, 100),
                (fx.sales.id, 100),
            )
            .await;
        }

        let store = EntryStore::new(fx.storage.clone());
        let page = store
            .query_entries(&EntryQuery {
                account_id: Some(fx.cash.id),
                page: 1,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pagination.total, 5);
        assert_eq!(page.pagination.pages, 3);
        // statistics span all five cash entries, not just the page
        assert_eq!(page.statistics.entries_count, 5);
        assert_eq!(page.statistics.total_debit, dec(500));
        assert_eq!(page.statistics.total_credit, dec(0));
        assert_eq!(page.statistics.difference, dec(500));
    }

    #[tokio::test]
    async fn search_matches_narration_and_voucher_number() {
        let fx = fixture().await;
        post(
            &fx,
            date(2024, 6, 1),
            "Brake pads for WO-17",
            (fx.cash.id, 250),
            (fx.sales.id, 250),
        )
        .await;
        post(
            &fx,
            date(2024, 6, 2),
            "Oil change",
            (fx.cash.id, 80),
            (fx.sales.id, 80),
        )
        .await;

        let store = EntryStore::new(fx.storage.clone());
        let page = store
            .query_entries(&EntryQuery {
                search: Some("wo-17".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.statistics.entries_count, 2);

        let page = store
            .query_entries(&EntryQuery {
                search: Some("JRN-000002".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.statistics.entries_count, 2);
        assert!(page.items.iter().all(|e| e.narration == "Oil change"));
    }

    #[tokio::test]
    async fn statement_carries_a_running_balance() {
        let fx = fixture().await;
        post(
            &fx,
            date(2024, 5, 31),
            "opening sale",
            (fx.cash.id, 1000),
            (fx.sales.id, 1000),
        )
        .await;
        post(
            &fx,
            date(2024, 6, 1),
            "sale",
            (fx.cash.id, 500),
            (fx.sales.id, 500),
        )
        .await;
        post(
            &fx,
            date(2024, 6, 2),
            "rent",
            (fx.rent.id, 200),
            (fx.cash.id, 200),
        )
        .await;

        let store = EntryStore::new(fx.storage.clone());
        let lines = store
            .account_statement(fx.cash.id, Some(date(2024, 6, 1)), Some(date(2024, 6, 30)))
            .await
            .unwrap();

        assert_eq!(lines.len(), 2);
        // opening balance of 1000 from May carries forward
        assert_eq!(lines[0].balance_after, dec(1500));
        assert_eq!(lines[1].balance_after, dec(1300));
    }
}
