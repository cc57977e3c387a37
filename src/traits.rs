//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::types::*;

/// Storage abstraction for the ledger engine.
///
/// This trait allows the engine to work with any storage backend
/// (PostgreSQL, MySQL, SQLite, in-memory, etc.) by implementing these
/// methods. Methods take `&self`; implementations are expected to use
/// interior mutability or a connection pool, so the engine can be shared
/// across concurrent request tasks.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    // ----- accounts -----

    /// Insert a new account. Fails with `DuplicateAccountNumber` if an
    /// account with the same number already exists.
    async fn insert_account(&self, account: &Account) -> LedgerResult<()>;

    /// Get an account by id
    async fn get_account(&self, id: Uuid) -> LedgerResult<Option<Account>>;

    /// Get an account by its human-readable number
    async fn get_account_by_number(&self, number: &str) -> LedgerResult<Option<Account>>;

    /// List all accounts, optionally filtered by type
    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>>;

    /// Update an existing account
    async fn update_account(&self, account: &Account) -> LedgerResult<()>;

    /// Delete an account. Fails with `AccountInUse` when any ledger entry
    /// references it.
    async fn delete_account(&self, id: Uuid) -> LedgerResult<()>;

    /// Whether any ledger entry references the account
    async fn account_has_entries(&self, id: Uuid) -> LedgerResult<bool>;

    // ----- voucher numbering -----

    /// Allocate the next sequence number for a voucher type. Sequences are
    /// monotonic per type and never reused, even when the surrounding
    /// operation later fails: gaps are acceptable, duplicates are not.
    async fn next_voucher_sequence(&self, voucher_type: VoucherType) -> LedgerResult<u64>;

    // ----- vouchers -----

    /// Insert a new voucher (normally in Draft status)
    async fn insert_voucher(&self, voucher: &Voucher) -> LedgerResult<()>;

    /// Get a voucher by id, including its lines
    async fn get_voucher(&self, id: Uuid) -> LedgerResult<Option<Voucher>>;

    /// Update a voucher (status transitions only; posted vouchers are
    /// otherwise immutable)
    async fn update_voucher(&self, voucher: &Voucher) -> LedgerResult<()>;

    /// Find the posted voucher that reverses the given voucher, if any
    async fn find_reversal_of(&self, voucher_id: Uuid) -> LedgerResult<Option<Voucher>>;

    // ----- posting -----

    /// Atomically append the entries and persist the voucher's transition to
    /// Posted. This is the only write path for ledger entries, and it must
    /// be all-or-nothing: a failure partway through leaves neither the
    /// entries nor the status change behind.
    async fn commit_posting(&self, voucher: &Voucher, entries: &[LedgerEntry])
        -> LedgerResult<()>;

    // ----- entries (read-only) -----

    /// All entries for one account, up to and including `as_of` when given,
    /// ordered by (date, created_at)
    async fn entries_for_account(
        &self,
        account_id: Uuid,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<Vec<LedgerEntry>>;

    /// All entries within the inclusive date range, ordered by
    /// (date, created_at)
    async fn entries_in_range(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<Vec<LedgerEntry>>;

    /// Filtered, paginated entry listing with aggregate statistics computed
    /// over the full filtered set
    async fn query_entries(&self, query: &EntryQuery) -> LedgerResult<EntryPage>;

    // ----- closings -----

    /// Atomically reserve a closing period. Fails with `AlreadyClosed` when
    /// a period of the same type overlapping the reservation already exists
    /// in any status; the overlap check and the insert must be one atomic
    /// step so that exactly one of two concurrent closers wins.
    async fn reserve_closing(&self, closing: &ClosingPeriod) -> LedgerResult<()>;

    /// Update an existing closing (finalize a reservation, or lock a closed
    /// period)
    async fn update_closing(&self, closing: &ClosingPeriod) -> LedgerResult<()>;

    /// Remove a closing; used to roll back a reservation whose snapshot
    /// computation failed
    async fn remove_closing(&self, id: Uuid) -> LedgerResult<()>;

    /// Get a closing by id
    async fn get_closing(&self, id: Uuid) -> LedgerResult<Option<ClosingPeriod>>;

    /// List closings, optionally filtered by type and period-start range
    async fn list_closings(
        &self,
        closing_type: Option<ClosingType>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<Vec<ClosingPeriod>>;

    /// The closing period (of any type) whose range contains the date and
    /// whose status blocks posting, if one exists
    async fn closing_covering(&self, date: NaiveDate) -> LedgerResult<Option<ClosingPeriod>>;
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom voucher validation rules
pub trait VoucherValidator: Send + Sync {
    /// Validate a voucher before it is persisted or posted
    fn validate_voucher(&self, voucher: &Voucher) -> LedgerResult<()>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        if account.number.trim().is_empty() {
            return Err(LedgerError::Validation(
                "account number cannot be empty".to_string(),
            ));
        }
        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "account name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default voucher validator enforcing the double-entry rules
pub struct DefaultVoucherValidator;

impl VoucherValidator for DefaultVoucherValidator {
    fn validate_voucher(&self, voucher: &Voucher) -> LedgerResult<()> {
        voucher.validate()
    }
}
