//! # Autoshop Ledger
//!
//! The double-entry ledger and period-closing engine behind an automotive
//! workshop's back office: every financial event is recorded as balanced
//! debit/credit entries, balances are derived by summation, and a day or
//! month can be closed into an immutable, reconciled snapshot.
//!
//! ## Features
//!
//! - **Double-entry vouchers**: payment, receipt, journal, contra and
//!   system-generated vouchers, validated and balanced before posting
//! - **Append-only ledger**: entries are never updated or deleted;
//!   corrections are additive reversals that preserve the audit history
//! - **Derived balances**: every balance is computed from entries at read
//!   time, so stored figures can never drift from the ledger
//! - **Trial balance & statements**: per-account aggregation with a
//!   debits-equal-credits integrity self-check, profit & loss, and
//!   cash/bank/stock movement
//! - **Period closings**: day/month snapshots that freeze the range and
//!   lock it against further posting
//! - **Storage abstraction**: database-agnostic design with a trait-based
//!   storage backend
//!
//! ## Quick Start
//!
//! ```rust
//! use autoshop_ledger::{
//!     LedgerEngine, MemoryStorage, VoucherBuilder, VoucherType,
//! };
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), autoshop_ledger::LedgerError> {
//! let engine = LedgerEngine::new(MemoryStorage::new());
//! let accounts = engine.setup_workshop_chart().await?;
//!
//! let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
//! let input = VoucherBuilder::new(VoucherType::Journal, date, "Cash sale")
//!     .created_by("owner")
//!     .debit(accounts["cash"].id, BigDecimal::from(500))
//!     .credit(accounts["parts_sales"].id, BigDecimal::from(500))
//!     .build()?;
//! let voucher = engine.create_voucher(input).await?;
//! engine.post_voucher(voucher.id).await?;
//!
//! assert_eq!(
//!     engine.account_balance(accounts["cash"].id, None).await?,
//!     BigDecimal::from(500)
//! );
//! # Ok(())
//! # }
//! ```

pub mod closing;
pub mod ledger;
pub mod reporting;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use closing::*;
pub use ledger::*;
pub use reporting::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStorage;

// Re-export the system-voucher constructors for convenience
pub use ledger::voucher::patterns;
