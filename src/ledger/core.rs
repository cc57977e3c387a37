//! Main engine facade that coordinates accounts, vouchers, entries,
//! reports and closings

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::closing::{ClosingManager, SalesComparison};
use crate::ledger::account::AccountRegistry;
use crate::ledger::store::{EntryStore, StatementLine};
use crate::ledger::voucher::{CreateVoucher, VoucherEngine};
use crate::reporting::{ReportCalculator, Statement, TrialBalance};
use crate::traits::*;
use crate::types::*;

/// The double-entry ledger and period-closing engine.
///
/// One instance wraps a storage backend and exposes the whole engine
/// surface: chart of accounts, voucher lifecycle, entry queries, trial
/// balance and statements, and period closings. External modules (sales,
/// purchases, expenses, the voucher UI, the reporting UI) all go through
/// this type; none of them computes balances itself.
pub struct LedgerEngine<S: LedgerStorage + Clone> {
    storage: S,
    accounts: AccountRegistry<S>,
    vouchers: VoucherEngine<S>,
    entries: EntryStore<S>,
    reports: ReportCalculator<S>,
    closings: ClosingManager<S>,
}

impl<S: LedgerStorage + Clone> LedgerEngine<S> {
    /// Create a new engine with the default validators
    pub fn new(storage: S) -> Self {
        Self {
            accounts: AccountRegistry::new(storage.clone()),
            vouchers: VoucherEngine::new(storage.clone()),
            entries: EntryStore::new(storage.clone()),
            reports: ReportCalculator::new(storage.clone()),
            closings: ClosingManager::new(storage.clone()),
            storage,
        }
    }

    /// Create a new engine with custom validators
    pub fn with_validators(
        storage: S,
        account_validator: Box<dyn AccountValidator>,
        voucher_validator: Box<dyn VoucherValidator>,
    ) -> Self {
        Self {
            accounts: AccountRegistry::with_validator(storage.clone(), account_validator),
            vouchers: VoucherEngine::with_validator(storage.clone(), voucher_validator),
            entries: EntryStore::new(storage.clone()),
            reports: ReportCalculator::new(storage.clone()),
            closings: ClosingManager::new(storage.clone()),
            storage,
        }
    }

    /// The account registry
    pub fn accounts(&self) -> &AccountRegistry<S> {
        &self.accounts
    }

    // Account operations
    /// Create a new account
    pub async fn create_account(
        &self,
        number: String,
        name: String,
        account_type: AccountType,
        class: AccountClass,
    ) -> LedgerResult<Account> {
        self.accounts
            .create_account(number, name, account_type, class)
            .await
    }

    /// Get an account by id
    pub async fn get_account(&self, id: Uuid) -> LedgerResult<Account> {
        self.accounts.get_account(id).await
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.accounts.list_accounts().await
    }

    /// Deactivate an account
    pub async fn deactivate_account(&self, id: Uuid) -> LedgerResult<Account> {
        self.accounts.deactivate_account(id).await
    }

    // Voucher operations
    /// Create a draft voucher
    pub async fn create_voucher(&self, input: CreateVoucher) -> LedgerResult<Voucher> {
        self.vouchers.create_voucher(input).await
    }

    /// Get a voucher by id
    pub async fn get_voucher(&self, id: Uuid) -> LedgerResult<Voucher> {
        self.vouchers.get_voucher(id).await
    }

    /// Post a draft voucher to the ledger
    pub async fn post_voucher(&self, id: Uuid) -> LedgerResult<(Voucher, Vec<LedgerEntry>)> {
        self.vouchers.post_voucher(id).await
    }

    /// Sign off a posted voucher
    pub async fn approve_voucher(&self, id: Uuid) -> LedgerResult<Voucher> {
        self.vouchers.approve_voucher(id).await
    }

    /// Void a draft voucher
    pub async fn void_voucher(&self, id: Uuid) -> LedgerResult<Voucher> {
        self.vouchers.void_voucher(id).await
    }

    /// Reverse a posted voucher on its original date
    pub async fn reverse_voucher(
        &self,
        id: Uuid,
        reason: &str,
        reversed_by: &str,
    ) -> LedgerResult<Voucher> {
        self.vouchers.reverse_voucher(id, reason, reversed_by).await
    }

    /// Reverse a posted voucher on an explicit (later, open) date
    pub async fn reverse_voucher_dated(
        &self,
        id: Uuid,
        reason: &str,
        reversed_by: &str,
        date: NaiveDate,
    ) -> LedgerResult<Voucher> {
        self.vouchers
            .reverse_voucher_dated(id, reason, reversed_by, date)
            .await
    }

    // Entry queries
    /// Filtered, paginated entry listing with full-set statistics
    pub async fn query_entries(&self, query: &EntryQuery) -> LedgerResult<EntryPage> {
        self.entries.query_entries(query).await
    }

    /// Account balance derived by summing entries up to `as_of`
    pub async fn account_balance(
        &self,
        account_id: Uuid,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        self.entries.account_balance(account_id, as_of).await
    }

    /// Account statement with a running balance per row
    pub async fn account_statement(
        &self,
        account_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<Vec<StatementLine>> {
        self.entries.account_statement(account_id, from, to).await
    }

    // Reporting
    /// Trial balance over a date range
    pub async fn trial_balance(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<TrialBalance> {
        self.reports.trial_balance(from, to).await
    }

    /// Profit & loss and cash/bank/stock statement over a period
    pub async fn statement(
        &self,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> LedgerResult<Statement> {
        self.reports.statement(period_start, period_end).await
    }

    // Closings
    /// Close a day or month into an immutable snapshot
    pub async fn close_period(
        &self,
        closing_type: ClosingType,
        date: NaiveDate,
        closed_by: &str,
        notes: Option<String>,
    ) -> LedgerResult<ClosingPeriod> {
        self.closings
            .close_period(closing_type, date, closed_by, notes)
            .await
    }

    /// Lock a closed period
    pub async fn lock_closing(&self, id: Uuid) -> LedgerResult<ClosingPeriod> {
        self.closings.lock_closing(id).await
    }

    /// Get a closing by id
    pub async fn get_closing(&self, id: Uuid) -> LedgerResult<ClosingPeriod> {
        self.closings.get_closing(id).await
    }

    /// List closings
    pub async fn list_closings(
        &self,
        closing_type: Option<ClosingType>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<Vec<ClosingPeriod>> {
        self.closings.list_closings(closing_type, from, to).await
    }

    /// Compare a closing's revenue against prior closings of the same type
    pub async fn sales_comparison(&self, id: Uuid) -> LedgerResult<SalesComparison> {
        self.closings.sales_comparison(id).await
    }

    /// Set up the standard automotive-workshop chart of accounts
    pub async fn setup_workshop_chart(
        &self,
    ) -> LedgerResult<std::collections::HashMap<&'static str, Account>> {
        crate::ledger::account::chart::create_workshop_chart(&self.accounts).await
    }

    /// Check the ledger's integrity up to a date. Unlike the trial-balance
    /// calculator this collects problems into a report instead of failing,
    /// so operators can inspect a broken store.
    pub async fn verify_integrity(&self, as_of: NaiveDate) -> LedgerResult<LedgerIntegrityReport> {
        let entry_count = self
            .storage
            .entries_in_range(None, Some(as_of))
            .await?
            .len() as u64;

        match self.reports.trial_balance(None, Some(as_of)).await {
            Ok(trial) => Ok(LedgerIntegrityReport {
                as_of,
                is_valid: true,
                issues: Vec::new(),
                total_debit: trial.total_debit,
                total_credit: trial.total_credit,
                entry_count,
            }),
            Err(LedgerError::TrialBalanceMismatch { debit, credit }) => {
                Ok(LedgerIntegrityReport {
                    as_of,
                    is_valid: false,
                    issues: vec![format!(
                        "ledger entries do not balance: debits = {debit}, credits = {credit}"
                    )],
                    total_debit: debit,
                    total_credit: credit,
                    entry_count,
                })
            }
            Err(other) => Err(other),
        }
    }
}

/// Report on ledger integrity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub as_of: NaiveDate,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    pub entry_count: u64,
}
