//! In-memory storage implementation for testing and embedding

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::traits::LedgerStorage;
use crate::types::*;

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    account_numbers: HashMap<String, Uuid>,
    vouchers: HashMap<Uuid, Voucher>,
    entries: Vec<LedgerEntry>,
    sequences: HashMap<VoucherType, u64>,
    closings: HashMap<Uuid, ClosingPeriod>,
}

/// In-memory storage implementation.
///
/// All state lives behind a single lock, so the multi-step writes the
/// `LedgerStorage` contract requires to be atomic (posting, closing
/// reservation) are performed under one write guard and can never be
/// observed half-applied.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        let mut inner = self.write();
        *inner = Inner::default();
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap()
    }

    fn sorted(mut entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
        entries.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));
        entries
    }

    /// Write a raw, unbalanced entry straight into the store, bypassing the
    /// posting path. Exists to exercise the integrity alarms.
    #[cfg(test)]
    pub(crate) async fn inject_unbalanced_entry(
        &self,
        date: NaiveDate,
        debit: bigdecimal::BigDecimal,
    ) {
        let now = chrono::Utc::now().naive_utc();
        self.write().entries.push(LedgerEntry {
            id: Uuid::new_v4(),
            voucher_id: Uuid::new_v4(),
            voucher_number: "XXX-000000".to_string(),
            voucher_type: VoucherType::Journal,
            account_id: Uuid::new_v4(),
            debit,
            credit: bigdecimal::BigDecimal::from(0),
            date,
            narration: "bypassed posting path".to_string(),
            reference_type: None,
            reference_id: None,
            is_reversal: false,
            reversal_reason: None,
            created_by: "nobody".to_string(),
            created_at: now,
        });
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn insert_account(&self, account: &Account) -> LedgerResult<()> {
        let mut inner = self.write();
        if inner.account_numbers.contains_key(&account.number) {
            return Err(LedgerError::DuplicateAccountNumber(account.number.clone()));
        }
        inner
            .account_numbers
            .insert(account.number.clone(), account.id);
        inner.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> LedgerResult<Option<Account>> {
        Ok(self.read().accounts.get(&id).cloned())
    }

    async fn get_account_by_number(&self, number: &str) -> LedgerResult<Option<Account>> {
        let inner = self.read();
        Ok(inner
            .account_numbers
            .get(number)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>> {
        let inner = self.read();
        let mut accounts: Vec<Account> = inner
            .accounts
            .values()
            .filter(|a| account_type.is_none_or(|t| a.account_type == t))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(accounts)
    }

    async fn update_account(&self, account: &Account) -> LedgerResult<()> {
        let mut inner = self.write();
        if !inner.accounts.contains_key(&account.id) {
            return Err(LedgerError::AccountNotFound(account.id));
        }
        inner.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn delete_account(&self, id: Uuid) -> LedgerResult<()> {
        let mut inner = self.write();
        if inner.entries.iter().any(|e| e.account_id == id) {
            return Err(LedgerError::AccountInUse(id));
        }
        match inner.accounts.remove(&id) {
            Some(account) => {
                inner.account_numbers.remove(&account.number);
                Ok(())
            }
            None => Err(LedgerError::AccountNotFound(id)),
        }
    }

    async fn account_has_entries(&self, id: Uuid) -> LedgerResult<bool> {
        Ok(self.read().entries.iter().any(|e| e.account_id == id))
    }

    async fn next_voucher_sequence(&self, voucher_type: VoucherType) -> LedgerResult<u64> {
        let mut inner = self.write();
        let counter = inner.sequences.entry(voucher_type).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_voucher(&self, voucher: &Voucher) -> LedgerResult<()> {
        self.write().vouchers.insert(voucher.id, voucher.clone());
        Ok(())
    }

    async fn get_voucher(&self, id: Uuid) -> LedgerResult<Option<Voucher>> {
        Ok(self.read().vouchers.get(&id).cloned())
    }

    async fn update_voucher(&self, voucher: &Voucher) -> LedgerResult<()> {
        let mut inner = self.write();
        if !inner.vouchers.contains_key(&voucher.id) {
            return Err(LedgerError::VoucherNotFound(voucher.id));
        }
        inner.vouchers.insert(voucher.id, voucher.clone());
        Ok(())
    }

    async fn find_reversal_of(&self, voucher_id: Uuid) -> LedgerResult<Option<Voucher>> {
        let target = voucher_id.to_string();
        Ok(self
            .read()
            .vouchers
            .values()
            .find(|v| {
                v.reference_type == Some(ReferenceType::Reversal)
                    && v.reference_id.as_deref() == Some(target.as_str())
                    && v.status.is_posted()
            })
            .cloned())
    }

    async fn commit_posting(
        &self,
        voucher: &Voucher,
        entries: &[LedgerEntry],
    ) -> LedgerResult<()> {
        // one write guard covers both the append and the status transition
        let mut inner = self.write();
        if !inner.vouchers.contains_key(&voucher.id) {
            return Err(LedgerError::VoucherNotFound(voucher.id));
        }
        inner.entries.extend_from_slice(entries);
        inner.vouchers.insert(voucher.id, voucher.clone());
        Ok(())
    }

    async fn entries_for_account(
        &self,
        account_id: Uuid,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = self
            .read()
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .filter(|e| as_of.is_none_or(|cutoff| e.date <= cutoff))
            .cloned()
            .collect();
        Ok(Self::sorted(entries))
    }

    async fn entries_in_range(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = self
            .read()
            .entries
            .iter()
            .filter(|e| from.is_none_or(|f| e.date >= f))
            .filter(|e| to.is_none_or(|t| e.date <= t))
            .cloned()
            .collect();
        Ok(Self::sorted(entries))
    }

    async fn query_entries(&self, query: &EntryQuery) -> LedgerResult<EntryPage> {
        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let filtered: Vec<LedgerEntry> = {
            let inner = self.read();
            inner
                .entries
                .iter()
                .filter(|e| query.account_id.is_none_or(|id| e.account_id == id))
                .filter(|e| query.voucher_type.is_none_or(|t| e.voucher_type == t))
                .filter(|e| {
                    query
                        .reference_type
                        .is_none_or(|t| e.reference_type == Some(t))
                })
                .filter(|e| query.from_date.is_none_or(|f| e.date >= f))
                .filter(|e| query.to_date.is_none_or(|t| e.date <= t))
                .filter(|e| {
                    needle.as_ref().is_none_or(|needle| {
                        e.narration.to_lowercase().contains(needle)
                            || e.voucher_number.to_lowercase().contains(needle)
                            || e.reference_id
                                .as_ref()
                                .is_some_and(|r| r.to_lowercase().contains(needle))
                    })
                })
                .cloned()
                .collect()
        };
        let filtered = Self::sorted(filtered);

        // statistics span the full filtered set, not just the page
        let total_debit: bigdecimal::BigDecimal = filtered.iter().map(|e| &e.debit).sum();
        let total_credit: bigdecimal::BigDecimal = filtered.iter().map(|e| &e.credit).sum();
        let statistics = EntryStatistics {
            difference: &total_debit - &total_credit,
            total_debit,
            total_credit,
            entries_count: filtered.len() as u64,
        };

        let page = query.page.max(1);
        let limit = query.limit.max(1);
        let pagination = Pagination::new(page, limit, filtered.len() as u64);
        let items = filtered
            .into_iter()
            .skip(((page - 1) * limit) as usize)
            .take(limit as usize)
            .collect();

        Ok(EntryPage {
            items,
            pagination,
            statistics,
        })
    }

    async fn reserve_closing(&self, closing: &ClosingPeriod) -> LedgerResult<()> {
        // the overlap check and the insert share one write guard, so exactly
        // one of two concurrent closers wins
        let mut inner = self.write();
        if let Some(existing) = inner.closings.values().find(|c| {
            c.closing_type == closing.closing_type
                && c.period_start <= closing.period_end
                && closing.period_start <= c.period_end
        }) {
            return Err(LedgerError::AlreadyClosed {
                closing_type: existing.closing_type,
                period_start: existing.period_start,
            });
        }
        inner.closings.insert(closing.id, closing.clone());
        Ok(())
    }

    async fn update_closing(&self, closing: &ClosingPeriod) -> LedgerResult<()> {
        let mut inner = self.write();
        if !inner.closings.contains_key(&closing.id) {
            return Err(LedgerError::ClosingNotFound(closing.id));
        }
        inner.closings.insert(closing.id, closing.clone());
        Ok(())
    }

    async fn remove_closing(&self, id: Uuid) -> LedgerResult<()> {
        match self.write().closings.remove(&id) {
            Some(_) => Ok(()),
            None => Err(LedgerError::ClosingNotFound(id)),
        }
    }

    async fn get_closing(&self, id: Uuid) -> LedgerResult<Option<ClosingPeriod>> {
        Ok(self.read().closings.get(&id).cloned())
    }

    async fn list_closings(
        &self,
        closing_type: Option<ClosingType>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<Vec<ClosingPeriod>> {
        let mut closings: Vec<ClosingPeriod> = self
            .read()
            .closings
            .values()
            .filter(|c| closing_type.is_none_or(|t| c.closing_type == t))
            .filter(|c| from.is_none_or(|f| c.period_start >= f))
            .filter(|c| to.is_none_or(|t| c.period_start <= t))
            .cloned()
            .collect();
        closings.sort_by_key(|c| c.period_start);
        Ok(closings)
    }

    async fn closing_covering(&self, date: NaiveDate) -> LedgerResult<Option<ClosingPeriod>> {
        Ok(self
            .read()
            .closings
            .values()
            .find(|c| {
                c.status.blocks_posting() && c.period_start <= date && date <= c.period_end
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn sequences_are_monotonic_and_never_reused() {
        let storage = MemoryStorage::new();
        assert_eq!(
            storage
                .next_voucher_sequence(VoucherType::Journal)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            storage
                .next_voucher_sequence(VoucherType::Journal)
                .await
                .unwrap(),
            2
        );
        // an independent counter per type
        assert_eq!(
            storage
                .next_voucher_sequence(VoucherType::Payment)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn account_numbers_are_unique() {
        let storage = MemoryStorage::new();
        let first = Account::new(
            "1000".to_string(),
            "Cash".to_string(),
            AccountType::Asset,
            AccountClass::Cash,
        );
        storage.insert_account(&first).await.unwrap();

        let second = Account::new(
            "1000".to_string(),
            "Other".to_string(),
            AccountType::Asset,
            AccountClass::General,
        );
        let err = storage.insert_account(&second).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateAccountNumber(_)));

        let by_number = storage.get_account_by_number("1000").await.unwrap();
        assert_eq!(by_number.map(|a| a.id), Some(first.id));
    }

    #[tokio::test]
    async fn overlapping_reservations_lose() {
        let storage = MemoryStorage::new();
        let base = ClosingPeriod {
            id: Uuid::new_v4(),
            closing_type: ClosingType::Day,
            closing_date: date(2024, 6, 1),
            period_start: date(2024, 6, 1),
            period_end: date(2024, 6, 1),
            status: ClosingStatus::Pending,
            snapshot: FinancialSnapshot::default(),
            closed_by: "owner".to_string(),
            closed_at: chrono::Utc::now().naive_utc(),
            notes: None,
        };
        storage.reserve_closing(&base).await.unwrap();

        let rival = ClosingPeriod {
            id: Uuid::new_v4(),
            ..base.clone()
        };
        let err = storage.reserve_closing(&rival).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyClosed { .. }));

        // a pending reservation already blocks posting into its range
        let covering = storage.closing_covering(date(2024, 6, 1)).await.unwrap();
        assert_eq!(covering.map(|c| c.id), Some(base.id));
    }

    #[tokio::test]
    async fn delete_account_refuses_when_entries_reference_it() {
        let storage = MemoryStorage::new();
        let account = Account::new(
            "1000".to_string(),
            "Cash".to_string(),
            AccountType::Asset,
            AccountClass::Cash,
        );
        storage.insert_account(&account).await.unwrap();

        let now = chrono::Utc::now().naive_utc();
        let voucher = Voucher {
            id: Uuid::new_v4(),
            number: "JRN-000001".to_string(),
            voucher_type: VoucherType::Journal,
            date: date(2024, 6, 1),
            narration: "test".to_string(),
            status: VoucherStatus::Draft,
            reference_type: None,
            reference_id: None,
            created_by: "tester".to_string(),
            created_at: now,
            updated_at: now,
            lines: vec![
                VoucherLine::debit(account.id, BigDecimal::from(10)),
                VoucherLine::credit(account.id, BigDecimal::from(10)),
            ],
        };
        storage.insert_voucher(&voucher).await.unwrap();

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            voucher_id: voucher.id,
            voucher_number: voucher.number.clone(),
            voucher_type: voucher.voucher_type,
            account_id: account.id,
            debit: BigDecimal::from(10),
            credit: BigDecimal::from(0),
            date: voucher.date,
            narration: voucher.narration.clone(),
            reference_type: None,
            reference_id: None,
            is_reversal: false,
            reversal_reason: None,
            created_by: "tester".to_string(),
            created_at: now,
        };
        storage.commit_posting(&voucher, &[entry]).await.unwrap();

        let err = storage.delete_account(account.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountInUse(id) if id == account.id));
        assert!(storage.account_has_entries(account.id).await.unwrap());
    }
}
