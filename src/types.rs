//! Core types and data structures for the ledger engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Parts Stock, Equipment, etc.)
    Asset,
    /// Liabilities - what the business owes (Loans, Accounts Payable, etc.)
    Liability,
    /// Equity - owner's interest in the business
    Equity,
    /// Income/Revenue - money earned by the business
    Income,
    /// Expenses - costs incurred by the business
    Expense,
}

impl AccountType {
    /// Returns the normal balance side for this account type.
    /// Assets and Expenses normally carry debit balances;
    /// Liabilities, Equity, and Income normally carry credit balances.
    pub fn normal_side(&self) -> BalanceSide {
        match self {
            AccountType::Asset | AccountType::Expense => BalanceSide::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Income => {
                BalanceSide::Credit
            }
        }
    }
}

/// The two sides of a double-entry posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceSide {
    Debit,
    Credit,
}

/// Statement classification of an account, used to derive the cash, bank
/// and stock figures of a closing snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountClass {
    /// Ordinary ledger account with no special statement treatment
    General,
    /// Cash-in-hand account
    Cash,
    /// Bank account
    Bank,
    /// Stock/inventory asset account
    Inventory,
}

/// A chart-of-accounts entry.
///
/// Balances are never stored on the account itself - they are always derived
/// by summing ledger entries, so a stored figure can never drift from the
/// ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: Uuid,
    /// Unique, human-readable account number (e.g. "1000")
    pub number: String,
    /// Human-readable account name
    pub name: String,
    /// Type of account (Asset, Liability, etc.)
    pub account_type: AccountType,
    /// The side on which this account normally carries its balance
    pub normal_side: BalanceSide,
    /// Statement classification (cash, bank, stock or general)
    pub class: AccountClass,
    /// Inactive accounts cannot be posted to
    pub active: bool,
    /// When the account was created
    pub created_at: NaiveDateTime,
    /// When the account was last updated
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Create a new active account with its normal side derived from the type
    pub fn new(
        number: String,
        name: String,
        account_type: AccountType,
        class: AccountClass,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            number,
            name,
            normal_side: account_type.normal_side(),
            account_type,
            class,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Voucher types recognized by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherType {
    /// Outgoing payment
    Payment,
    /// Incoming receipt
    Receipt,
    /// General journal entry
    Journal,
    /// Cash/bank transfer
    Contra,
    /// System-generated voucher (sales, purchases, expenses)
    System,
}

impl VoucherType {
    /// Prefix used when formatting voucher numbers (e.g. "PAY-000042")
    pub fn prefix(&self) -> &'static str {
        match self {
            VoucherType::Payment => "PAY",
            VoucherType::Receipt => "RCT",
            VoucherType::Journal => "JRN",
            VoucherType::Contra => "CTR",
            VoucherType::System => "SYS",
        }
    }

    /// Format a sequence number into a voucher number for this type
    pub fn format_number(&self, sequence: u64) -> String {
        format!("{}-{:06}", self.prefix(), sequence)
    }
}

/// Voucher lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    /// Being drafted; no ledger entries exist yet
    Draft,
    /// Posted to the ledger (immutable)
    Posted,
    /// Posted and signed off
    Approved,
    /// Voided before posting (immutable)
    Void,
}

impl VoucherStatus {
    /// Only drafts can be posted or voided
    pub fn is_draft(&self) -> bool {
        matches!(self, VoucherStatus::Draft)
    }

    /// Posted and approved vouchers have live ledger entries
    pub fn is_posted(&self) -> bool {
        matches!(self, VoucherStatus::Posted | VoucherStatus::Approved)
    }
}

/// Source of a voucher, used by the statement calculator to classify
/// entries. Kept as a closed enum so a new reference kind cannot slip past
/// revenue/COGS/expense classification unnoticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// Completed sale (revenue and cost-of-sale legs)
    Sale,
    /// Completed purchase of parts or consumables
    Purchase,
    /// Recorded operating expense
    Expense,
    /// Opening balance import
    OpeningBalance,
    /// Manual adjustment entry
    Adjustment,
    /// Reversal of a previously posted voucher
    Reversal,
    /// Manually entered voucher
    Manual,
    /// Cash/bank transfer
    Transfer,
}

/// A single debit-or-credit line of a voucher.
///
/// Exactly one of `debit`/`credit` is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherLine {
    /// Account being affected
    pub account_id: Uuid,
    /// Debit amount (zero when this is a credit line)
    pub debit: BigDecimal,
    /// Credit amount (zero when this is a debit line)
    pub credit: BigDecimal,
}

impl VoucherLine {
    /// Create a debit line
    pub fn debit(account_id: Uuid, amount: BigDecimal) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: BigDecimal::from(0),
        }
    }

    /// Create a credit line
    pub fn credit(account_id: Uuid, amount: BigDecimal) -> Self {
        Self {
            account_id,
            debit: BigDecimal::from(0),
            credit: amount,
        }
    }

    /// Check that exactly one side is set and no amount is negative
    pub fn validate(&self) -> LedgerResult<()> {
        let zero = BigDecimal::from(0);
        if self.debit < zero || self.credit < zero {
            return Err(LedgerError::InvalidLine(
                "line amounts cannot be negative".to_string(),
            ));
        }
        match (self.debit == zero, self.credit == zero) {
            (true, true) => Err(LedgerError::InvalidLine(
                "line must carry a debit or a credit amount".to_string(),
            )),
            (false, false) => Err(LedgerError::InvalidLine(
                "line cannot carry both a debit and a credit amount".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// A financial transaction request composed of balanced debit/credit lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    /// Unique identifier for the voucher
    pub id: Uuid,
    /// Sequential voucher number, unique per type (e.g. "JRN-000007")
    pub number: String,
    /// Type of voucher
    pub voucher_type: VoucherType,
    /// Business date of the voucher
    pub date: NaiveDate,
    /// Free-text narration
    pub narration: String,
    /// Lifecycle status
    pub status: VoucherStatus,
    /// Source of the voucher, if it references another record
    pub reference_type: Option<ReferenceType>,
    /// Identifier of the referenced record (sale id, original voucher id, ...)
    pub reference_id: Option<String>,
    /// Identity of the creator
    pub created_by: String,
    /// When the voucher was created
    pub created_at: NaiveDateTime,
    /// When the voucher was last updated
    pub updated_at: NaiveDateTime,
    /// Ordered debit/credit lines
    pub lines: Vec<VoucherLine>,
}

impl Voucher {
    /// Calculate total debits across all lines
    pub fn total_debit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    /// Calculate total credits across all lines
    pub fn total_credit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    /// Check whether debits equal credits to the currency precision
    pub fn is_balanced(&self) -> bool {
        amounts_match(&self.total_debit(), &self.total_credit())
    }

    /// Validate line structure and the balance invariant
    pub fn validate(&self) -> LedgerResult<()> {
        if self.lines.len() < 2 {
            return Err(LedgerError::InvalidLine(
                "voucher must have at least two lines".to_string(),
            ));
        }
        for line in &self.lines {
            line.validate()?;
        }
        if !self.is_balanced() {
            return Err(LedgerError::UnbalancedVoucher {
                debit: self.total_debit(),
                credit: self.total_credit(),
            });
        }
        Ok(())
    }
}

/// One immutable posted line of a voucher, tied to one account.
///
/// Entries are never updated or deleted; corrections are made by posting a
/// reversing voucher whose lines mirror the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier for the entry
    pub id: Uuid,
    /// Voucher this entry was posted from
    pub voucher_id: Uuid,
    /// Voucher number, denormalized for listings
    pub voucher_number: String,
    /// Voucher type, denormalized for filtering
    pub voucher_type: VoucherType,
    /// Account affected
    pub account_id: Uuid,
    /// Debit amount (zero for credit entries)
    pub debit: BigDecimal,
    /// Credit amount (zero for debit entries)
    pub credit: BigDecimal,
    /// Business date (copied from the voucher)
    pub date: NaiveDate,
    /// Narration (copied from the voucher)
    pub narration: String,
    /// Reference metadata (copied from the voucher)
    pub reference_type: Option<ReferenceType>,
    /// Identifier of the referenced record
    pub reference_id: Option<String>,
    /// True when this entry belongs to a reversal voucher
    pub is_reversal: bool,
    /// Reason given for the reversal, if any
    pub reversal_reason: Option<String>,
    /// Identity of the creator
    pub created_by: String,
    /// When the entry was posted
    pub created_at: NaiveDateTime,
}

impl LedgerEntry {
    /// Net movement of this entry: debit minus credit
    pub fn signed_amount(&self) -> BigDecimal {
        &self.debit - &self.credit
    }

    /// Net movement presented on the account's normal side
    pub fn movement(&self, normal_side: BalanceSide) -> BigDecimal {
        match normal_side {
            BalanceSide::Debit => &self.debit - &self.credit,
            BalanceSide::Credit => &self.credit - &self.debit,
        }
    }
}

/// Kind of closing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosingType {
    Day,
    Month,
}

impl fmt::Display for ClosingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosingType::Day => write!(f, "day"),
            ClosingType::Month => write!(f, "month"),
        }
    }
}

/// Closing lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosingStatus {
    /// Period reserved while the snapshot is being computed
    Pending,
    /// Snapshot persisted; the period is frozen
    Closed,
    /// Closed and locked against any further change
    Locked,
}

impl ClosingStatus {
    /// Any reserved or closed period blocks posting into its date range
    pub fn blocks_posting(&self) -> bool {
        matches!(
            self,
            ClosingStatus::Pending | ClosingStatus::Closed | ClosingStatus::Locked
        )
    }
}

/// Financial figures frozen into a closing record.
///
/// All figures are copies computed at closing time; reversals posted later
/// never retroactively change a closed snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    /// Net revenue over the period
    pub revenue: BigDecimal,
    /// Cost of goods sold over the period
    pub cogs: BigDecimal,
    /// Total purchases over the period (capitalized and expensed)
    pub purchases: BigDecimal,
    /// Operating expenses over the period (excluding COGS)
    pub expenses: BigDecimal,
    /// revenue - cogs
    pub gross_profit: BigDecimal,
    /// gross_profit - expensed purchases - expenses
    pub net_profit: BigDecimal,
    /// Cash-in-hand balance at period start
    pub opening_cash: BigDecimal,
    /// Cash-in-hand balance at period end
    pub closing_cash: BigDecimal,
    /// Bank balance at period start
    pub opening_bank: BigDecimal,
    /// Bank balance at period end
    pub closing_bank: BigDecimal,
    /// Stock value at period start
    pub opening_stock: BigDecimal,
    /// Stock value at period end
    pub closing_stock: BigDecimal,
    /// Number of ledger entries dated within the period
    pub ledger_entry_count: u64,
    /// Sum of all debits within the period
    pub total_debit: BigDecimal,
    /// Sum of all credits within the period
    pub total_credit: BigDecimal,
    /// Whether total debits matched total credits at closing time
    pub trial_balance_matched: bool,
}

/// A frozen snapshot of a day's or month's financial aggregates.
///
/// Not a live view: it aggregates ledger entries by date range at closing
/// time and is never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingPeriod {
    /// Unique identifier for the closing
    pub id: Uuid,
    /// Day or month closing
    pub closing_type: ClosingType,
    /// The date the closing was requested for
    pub closing_date: NaiveDate,
    /// First date covered by the period
    pub period_start: NaiveDate,
    /// Last date covered by the period
    pub period_end: NaiveDate,
    /// Lifecycle status
    pub status: ClosingStatus,
    /// Frozen financial figures
    pub snapshot: FinancialSnapshot,
    /// Identity of the closer
    pub closed_by: String,
    /// When the closing was finalized
    pub closed_at: NaiveDateTime,
    /// Optional operator notes
    pub notes: Option<String>,
}

/// Filters for paginated ledger-entry queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryQuery {
    /// Restrict to one account
    pub account_id: Option<Uuid>,
    /// Restrict to one voucher type
    pub voucher_type: Option<VoucherType>,
    /// Restrict to one reference type
    pub reference_type: Option<ReferenceType>,
    /// Inclusive lower date bound
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper date bound
    pub to_date: Option<NaiveDate>,
    /// Case-insensitive match against narration, voucher number or reference id
    pub search: Option<String>,
    /// 1-based page number (0 is treated as 1)
    pub page: u32,
    /// Page size (0 is treated as the default of 50)
    pub limit: u32,
}

/// Pagination metadata for list responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
}

impl Pagination {
    /// Build pagination metadata from a total row count
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if total == 0 {
            1
        } else {
            ((total + u64::from(limit) - 1) / u64::from(limit)) as u32
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// Aggregate statistics over the full filtered entry set, not just the
/// returned page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryStatistics {
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    pub entries_count: u64,
    /// total_debit - total_credit
    pub difference: BigDecimal,
}

/// One page of ledger entries plus full-set statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPage {
    pub items: Vec<LedgerEntry>,
    pub pagination: Pagination,
    pub statistics: EntryStatistics,
}

/// Errors that can occur in the ledger engine
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    // validation errors
    #[error("account number '{0}' already exists")]
    DuplicateAccountNumber(String),
    #[error("invalid voucher line: {0}")]
    InvalidLine(String),
    #[error("voucher is not balanced: debit {debit}, credit {credit}")]
    UnbalancedVoucher {
        debit: BigDecimal,
        credit: BigDecimal,
    },
    #[error("validation error: {0}")]
    Validation(String),

    // state errors
    #[error("account not found: {0}")]
    AccountNotFound(Uuid),
    #[error("account {0} is inactive")]
    AccountInactive(Uuid),
    #[error("account {0} is referenced by ledger entries and can only be deactivated")]
    AccountInUse(Uuid),
    #[error("voucher not found: {0}")]
    VoucherNotFound(Uuid),
    #[error("voucher {0} is not posted")]
    NotPosted(Uuid),
    #[error("voucher {0} is not a draft")]
    NotDraft(Uuid),
    #[error("voucher {0} is already posted")]
    AlreadyPosted(Uuid),
    #[error("voucher {0} has already been reversed")]
    AlreadyReversed(Uuid),
    #[error("the period containing {0} is closed")]
    PeriodLocked(NaiveDate),
    #[error("a {closing_type} closing starting {period_start} already exists")]
    AlreadyClosed {
        closing_type: ClosingType,
        period_start: NaiveDate,
    },
    #[error("closing not found: {0}")]
    ClosingNotFound(Uuid),

    // integrity errors
    #[error("trial balance mismatch: debit {debit}, credit {credit}")]
    TrialBalanceMismatch {
        debit: BigDecimal,
        credit: BigDecimal,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Machine-readable error kind for API responses
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateAccountNumber(_) => "DUPLICATE_ACCOUNT_NUMBER",
            Self::InvalidLine(_) => "INVALID_LINE",
            Self::UnbalancedVoucher { .. } => "UNBALANCED_VOUCHER",
            Self::Validation(_) => "VALIDATION",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::AccountInUse(_) => "ACCOUNT_IN_USE",
            Self::VoucherNotFound(_) => "VOUCHER_NOT_FOUND",
            Self::NotPosted(_) => "NOT_POSTED",
            Self::NotDraft(_) => "NOT_DRAFT",
            Self::AlreadyPosted(_) => "ALREADY_POSTED",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::PeriodLocked(_) => "PERIOD_LOCKED",
            Self::AlreadyClosed { .. } => "ALREADY_CLOSED",
            Self::ClosingNotFound(_) => "CLOSING_NOT_FOUND",
            Self::TrialBalanceMismatch { .. } => "TRIAL_BALANCE_MISMATCH",
            Self::Storage(_) => "STORAGE",
        }
    }

    /// True for errors that indicate the store itself is inconsistent.
    /// These are operator alarms, not user errors, and map to 5xx responses.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::TrialBalanceMismatch { .. } | Self::Storage(_))
    }

    /// HTTP status code equivalent for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Self::DuplicateAccountNumber(_)
            | Self::InvalidLine(_)
            | Self::UnbalancedVoucher { .. }
            | Self::Validation(_)
            | Self::AccountInactive(_)
            | Self::AccountInUse(_)
            | Self::NotPosted(_)
            | Self::NotDraft(_)
            | Self::AlreadyPosted(_)
            | Self::AlreadyReversed(_)
            | Self::PeriodLocked(_) => 400,
            Self::AccountNotFound(_) | Self::VoucherNotFound(_) | Self::ClosingNotFound(_) => 404,
            Self::AlreadyClosed { .. } => 409,
            Self::TrialBalanceMismatch { .. } | Self::Storage(_) => 500,
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// One cent: the configured currency precision
pub fn one_cent() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Compare two amounts to the currency precision
pub fn amounts_match(a: &BigDecimal, b: &BigDecimal) -> bool {
    (a - b).abs() < one_cent()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> BigDecimal {
        BigDecimal::from(v)
    }

    #[test]
    fn normal_sides_follow_account_type() {
        assert_eq!(AccountType::Asset.normal_side(), BalanceSide::Debit);
        assert_eq!(AccountType::Expense.normal_side(), BalanceSide::Debit);
        assert_eq!(AccountType::Liability.normal_side(), BalanceSide::Credit);
        assert_eq!(AccountType::Equity.normal_side(), BalanceSide::Credit);
        assert_eq!(AccountType::Income.normal_side(), BalanceSide::Credit);
    }

    #[test]
    fn voucher_number_formatting() {
        assert_eq!(VoucherType::Payment.format_number(42), "PAY-000042");
        assert_eq!(VoucherType::System.format_number(1), "SYS-000001");
    }

    #[test]
    fn line_must_have_exactly_one_side() {
        let account = Uuid::new_v4();
        assert!(VoucherLine::debit(account, dec(100)).validate().is_ok());
        assert!(VoucherLine::credit(account, dec(100)).validate().is_ok());

        let empty = VoucherLine {
            account_id: account,
            debit: dec(0),
            credit: dec(0),
        };
        assert!(matches!(empty.validate(), Err(LedgerError::InvalidLine(_))));

        let both = VoucherLine {
            account_id: account,
            debit: dec(10),
            credit: dec(10),
        };
        assert!(matches!(both.validate(), Err(LedgerError::InvalidLine(_))));

        let negative = VoucherLine {
            account_id: account,
            debit: dec(-10),
            credit: dec(0),
        };
        assert!(matches!(
            negative.validate(),
            Err(LedgerError::InvalidLine(_))
        ));
    }

    #[test]
    fn amounts_match_within_a_cent() {
        let a = BigDecimal::from(100);
        let b = &a + one_cent() / BigDecimal::from(2);
        assert!(amounts_match(&a, &b));
        let c = &a + one_cent();
        assert!(!amounts_match(&a, &c));
    }

    #[test]
    fn pagination_page_counts() {
        assert_eq!(Pagination::new(1, 50, 0).pages, 1);
        assert_eq!(Pagination::new(1, 50, 50).pages, 1);
        assert_eq!(Pagination::new(1, 50, 51).pages, 2);
        assert_eq!(Pagination::new(2, 10, 95).pages, 10);
    }

    #[test]
    fn error_kinds_and_classification() {
        let err = LedgerError::UnbalancedVoucher {
            debit: dec(100),
            credit: dec(90),
        };
        assert_eq!(err.kind(), "UNBALANCED_VOUCHER");
        assert_eq!(err.http_status(), 400);
        assert!(!err.is_integrity());

        let mismatch = LedgerError::TrialBalanceMismatch {
            debit: dec(100),
            credit: dec(90),
        };
        assert_eq!(mismatch.http_status(), 500);
        assert!(mismatch.is_integrity());
    }
}
