//! Voucher lifecycle: validation, numbering, posting, reversal

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// Request to create a new voucher
#[derive(Debug, Clone)]
pub struct CreateVoucher {
    /// Type of voucher (drives the number sequence)
    pub voucher_type: VoucherType,
    /// Business date
    pub date: NaiveDate,
    /// Free-text narration
    pub narration: String,
    /// Debit/credit lines (at least two, balanced)
    pub lines: Vec<VoucherLine>,
    /// Source of the voucher, if it references another record
    pub reference_type: Option<ReferenceType>,
    /// Identifier of the referenced record
    pub reference_id: Option<String>,
    /// Identity of the creator
    pub created_by: String,
}

impl CreateVoucher {
    /// Calculate total debits across all lines
    pub fn total_debit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    /// Calculate total credits across all lines
    pub fn total_credit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }
}

/// Engine for the voucher lifecycle.
///
/// Posting through this engine is the only path that ever creates ledger
/// entries: system modules (sale/purchase/expense completion) build their
/// vouchers with the [`patterns`] helpers and go through `create_voucher` +
/// `post_voucher` like everything else.
pub struct VoucherEngine<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn VoucherValidator>,
}

impl<S: LedgerStorage> VoucherEngine<S> {
    /// Create a new voucher engine with the default validator
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultVoucherValidator),
        }
    }

    /// Create a new voucher engine with a custom validator
    pub fn with_validator(storage: S, validator: Box<dyn VoucherValidator>) -> Self {
        Self { storage, validator }
    }

    /// Validate a voucher request, allocate its number and persist it as a
    /// draft.
    ///
    /// The sequence number is allocated after validation succeeds but before
    /// the insert; a failed insert leaves a gap in the numbering, never a
    /// duplicate.
    pub async fn create_voucher(&self, input: CreateVoucher) -> LedgerResult<Voucher> {
        let now = chrono::Utc::now().naive_utc();
        let mut voucher = Voucher {
            id: Uuid::new_v4(),
            number: String::new(),
            voucher_type: input.voucher_type,
            date: input.date,
            narration: input.narration,
            status: VoucherStatus::Draft,
            reference_type: input.reference_type,
            reference_id: input.reference_id,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            lines: input.lines,
        };

        self.validator.validate_voucher(&voucher)?;
        self.check_line_accounts(&voucher).await?;

        let sequence = self
            .storage
            .next_voucher_sequence(voucher.voucher_type)
            .await?;
        voucher.number = voucher.voucher_type.format_number(sequence);

        self.storage.insert_voucher(&voucher).await?;
        debug!(voucher = %voucher.number, "voucher drafted");
        Ok(voucher)
    }

    /// Get a voucher by id, failing with `VoucherNotFound`
    pub async fn get_voucher(&self, id: Uuid) -> LedgerResult<Voucher> {
        self.storage
            .get_voucher(id)
            .await?
            .ok_or(LedgerError::VoucherNotFound(id))
    }

    /// Post a draft voucher: re-validate the balance, refuse dates inside a
    /// closed period, then atomically append one ledger entry per line and
    /// transition the voucher to Posted.
    ///
    /// Posting an already-posted voucher fails with `AlreadyPosted`; it
    /// never double-posts.
    pub async fn post_voucher(&self, id: Uuid) -> LedgerResult<(Voucher, Vec<LedgerEntry>)> {
        let voucher = self.get_voucher(id).await?;
        match voucher.status {
            VoucherStatus::Draft => {}
            VoucherStatus::Posted | VoucherStatus::Approved => {
                return Err(LedgerError::AlreadyPosted(id))
            }
            VoucherStatus::Void => return Err(LedgerError::NotDraft(id)),
        }
        self.post_draft(voucher, false, None).await
    }

    /// Sign off a posted voucher
    pub async fn approve_voucher(&self, id: Uuid) -> LedgerResult<Voucher> {
        let mut voucher = self.get_voucher(id).await?;
        if voucher.status != VoucherStatus::Posted {
            return Err(LedgerError::NotPosted(id));
        }
        voucher.status = VoucherStatus::Approved;
        voucher.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_voucher(&voucher).await?;
        Ok(voucher)
    }

    /// Void a draft voucher. Posted vouchers have live ledger entries and
    /// can only be corrected by reversal.
    pub async fn void_voucher(&self, id: Uuid) -> LedgerResult<Voucher> {
        let mut voucher = self.get_voucher(id).await?;
        if !voucher.status.is_draft() {
            return Err(LedgerError::NotDraft(id));
        }
        voucher.status = VoucherStatus::Void;
        voucher.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_voucher(&voucher).await?;
        Ok(voucher)
    }

    /// Reverse a posted voucher on its original date.
    ///
    /// Creates a new voucher of the same type with every line's debit and
    /// credit swapped, posts it immediately, and links it to the original.
    /// The original voucher and its entries are never mutated. Fails with
    /// `PeriodLocked` when the original date has since been closed; use
    /// [`reverse_voucher_dated`](Self::reverse_voucher_dated) to target a
    /// later open period instead.
    pub async fn reverse_voucher(
        &self,
        id: Uuid,
        reason: &str,
        reversed_by: &str,
    ) -> LedgerResult<Voucher> {
        let original = self.get_voucher(id).await?;
        let date = original.date;
        self.reverse(original, reason, reversed_by, date).await
    }

    /// Reverse a posted voucher on an explicit (later, open) date
    pub async fn reverse_voucher_dated(
        &self,
        id: Uuid,
        reason: &str,
        reversed_by: &str,
        date: NaiveDate,
    ) -> LedgerResult<Voucher> {
        let original = self.get_voucher(id).await?;
        self.reverse(original, reason, reversed_by, date).await
    }

    async fn reverse(
        &self,
        original: Voucher,
        reason: &str,
        reversed_by: &str,
        date: NaiveDate,
    ) -> LedgerResult<Voucher> {
        if !original.status.is_posted() {
            return Err(LedgerError::NotPosted(original.id));
        }
        if self.storage.find_reversal_of(original.id).await?.is_some() {
            return Err(LedgerError::AlreadyReversed(original.id));
        }

        let mirrored = original
            .lines
            .iter()
            .map(|line| VoucherLine {
                account_id: line.account_id,
                debit: line.credit.clone(),
                credit: line.debit.clone(),
            })
            .collect();

        let draft = self
            .create_voucher(CreateVoucher {
                voucher_type: original.voucher_type,
                date,
                narration: format!("Reversal of {}: {}", original.number, reason),
                lines: mirrored,
                reference_type: Some(ReferenceType::Reversal),
                reference_id: Some(original.id.to_string()),
                created_by: reversed_by.to_string(),
            })
            .await?;

        let (posted, _) = self.post_draft(draft, true, Some(reason.to_string())).await?;
        info!(
            original = %original.number,
            reversal = %posted.number,
            "voucher reversed"
        );
        Ok(posted)
    }

    /// Shared posting step. The caller has already checked the status.
    async fn post_draft(
        &self,
        mut voucher: Voucher,
        is_reversal: bool,
        reversal_reason: Option<String>,
    ) -> LedgerResult<(Voucher, Vec<LedgerEntry>)> {
        // Re-validate: the draft may have been edited since creation
        self.validator.validate_voucher(&voucher)?;
        self.check_line_accounts(&voucher).await?;

        if self.storage.closing_covering(voucher.date).await?.is_some() {
            return Err(LedgerError::PeriodLocked(voucher.date));
        }

        let now = chrono::Utc::now().naive_utc();
        voucher.status = VoucherStatus::Posted;
        voucher.updated_at = now;

        let entries: Vec<LedgerEntry> = voucher
            .lines
            .iter()
            .map(|line| LedgerEntry {
                id: Uuid::new_v4(),
                voucher_id: voucher.id,
                voucher_number: voucher.number.clone(),
                voucher_type: voucher.voucher_type,
                account_id: line.account_id,
                debit: line.debit.clone(),
                credit: line.credit.clone(),
                date: voucher.date,
                narration: voucher.narration.clone(),
                reference_type: voucher.reference_type,
                reference_id: voucher.reference_id.clone(),
                is_reversal,
                reversal_reason: reversal_reason.clone(),
                created_by: voucher.created_by.clone(),
                created_at: now,
            })
            .collect();

        self.storage.commit_posting(&voucher, &entries).await?;
        info!(
            voucher = %voucher.number,
            date = %voucher.date,
            entries = entries.len(),
            "voucher posted"
        );
        Ok((voucher, entries))
    }

    async fn check_line_accounts(&self, voucher: &Voucher) -> LedgerResult<()> {
        for line in &voucher.lines {
            let account = self
                .storage
                .get_account(line.account_id)
                .await?
                .ok_or(LedgerError::AccountNotFound(line.account_id))?;
            if !account.active {
                return Err(LedgerError::AccountInactive(account.id));
            }
        }
        Ok(())
    }
}

/// Fluent builder for voucher requests
#[derive(Debug)]
pub struct VoucherBuilder {
    input: CreateVoucher,
}

impl VoucherBuilder {
    /// Start a new voucher request
    pub fn new(voucher_type: VoucherType, date: NaiveDate, narration: impl Into<String>) -> Self {
        Self {
            input: CreateVoucher {
                voucher_type,
                date,
                narration: narration.into(),
                lines: Vec::new(),
                reference_type: None,
                reference_id: None,
                created_by: String::new(),
            },
        }
    }

    /// Set the reference metadata
    pub fn reference(mut self, reference_type: ReferenceType, reference_id: impl Into<String>) -> Self {
        self.input.reference_type = Some(reference_type);
        self.input.reference_id = Some(reference_id.into());
        self
    }

    /// Set the creator identity
    pub fn created_by(mut self, who: impl Into<String>) -> Self {
        self.input.created_by = who.into();
        self
    }

    /// Add a debit line
    pub fn debit(mut self, account_id: Uuid, amount: BigDecimal) -> Self {
        self.input.lines.push(VoucherLine::debit(account_id, amount));
        self
    }

    /// Add a credit line
    pub fn credit(mut self, account_id: Uuid, amount: BigDecimal) -> Self {
        self.input.lines.push(VoucherLine::credit(account_id, amount));
        self
    }

    /// Add a pre-built line
    pub fn line(mut self, line: VoucherLine) -> Self {
        self.input.lines.push(line);
        self
    }

    /// Validate the line structure and balance, then return the request
    pub fn build(self) -> LedgerResult<CreateVoucher> {
        if self.input.lines.len() < 2 {
            return Err(LedgerError::InvalidLine(
                "voucher must have at least two lines".to_string(),
            ));
        }
        for line in &self.input.lines {
            line.validate()?;
        }
        let debit = self.input.total_debit();
        let credit = self.input.total_credit();
        if !amounts_match(&debit, &credit) {
            return Err(LedgerError::UnbalancedVoucher { debit, credit });
        }
        Ok(self.input)
    }
}

/// System-voucher constructors for the sale, purchase and expense modules.
///
/// These build the voucher request only; callers still go through
/// `create_voucher` + `post_voucher`.
pub mod patterns {
    use super::*;

    /// Cost-of-sale leg of a completed sale: moves the cost of the parts
    /// sold out of stock and into COGS.
    #[derive(Debug, Clone)]
    pub struct CostOfSale {
        /// COGS expense account
        pub cogs_account_id: Uuid,
        /// Stock asset account the parts leave
        pub stock_account_id: Uuid,
        /// Cost of the parts sold
        pub cost: BigDecimal,
    }

    /// Voucher for a completed sale: debit cash/receivables, credit revenue,
    /// plus the optional cost-of-sale leg.
    pub fn sale_completion(
        sale_id: &str,
        date: NaiveDate,
        cash_or_receivables_account_id: Uuid,
        revenue_account_id: Uuid,
        amount: BigDecimal,
        cost_of_sale: Option<CostOfSale>,
        created_by: &str,
    ) -> LedgerResult<CreateVoucher> {
        let mut builder = VoucherBuilder::new(
            VoucherType::System,
            date,
            format!("Sale {sale_id} completed"),
        )
        .reference(ReferenceType::Sale, sale_id)
        .created_by(created_by)
        .debit(cash_or_receivables_account_id, amount.clone())
        .credit(revenue_account_id, amount);

        if let Some(cogs) = cost_of_sale {
            builder = builder
                .debit(cogs.cogs_account_id, cogs.cost.clone())
                .credit(cogs.stock_account_id, cogs.cost);
        }
        builder.build()
    }

    /// Voucher for a completed purchase: debit stock (or an expense account
    /// for consumables expensed on arrival), credit cash/payables.
    pub fn purchase_completion(
        purchase_id: &str,
        date: NaiveDate,
        stock_or_expense_account_id: Uuid,
        cash_or_payables_account_id: Uuid,
        amount: BigDecimal,
        created_by: &str,
    ) -> LedgerResult<CreateVoucher> {
        VoucherBuilder::new(
            VoucherType::System,
            date,
            format!("Purchase {purchase_id} completed"),
        )
        .reference(ReferenceType::Purchase, purchase_id)
        .created_by(created_by)
        .debit(stock_or_expense_account_id, amount.clone())
        .credit(cash_or_payables_account_id, amount)
        .build()
    }

    /// Voucher for a recorded expense: debit the expense account, credit
    /// cash/bank.
    pub fn expense_payment(
        expense_id: &str,
        date: NaiveDate,
        expense_account_id: Uuid,
        cash_or_bank_account_id: Uuid,
        amount: BigDecimal,
        created_by: &str,
    ) -> LedgerResult<CreateVoucher> {
        VoucherBuilder::new(
            VoucherType::System,
            date,
            format!("Expense {expense_id} recorded"),
        )
        .reference(ReferenceType::Expense, expense_id)
        .created_by(created_by)
        .debit(expense_account_id, amount.clone())
        .credit(cash_or_bank_account_id, amount)
        .build()
    }

    /// Contra voucher moving money between cash and bank accounts
    pub fn contra_transfer(
        date: NaiveDate,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: BigDecimal,
        created_by: &str,
    ) -> LedgerResult<CreateVoucher> {
        VoucherBuilder::new(VoucherType::Contra, date, "Cash/bank transfer")
            .reference(ReferenceType::Transfer, date.to_string())
            .created_by(created_by)
            .debit(to_account_id, amount.clone())
            .credit(from_account_id, amount)
            .build()
    }

    /// Journal voucher importing opening balances
    pub fn opening_balance(
        date: NaiveDate,
        lines: Vec<VoucherLine>,
        created_by: &str,
    ) -> LedgerResult<CreateVoucher> {
        let mut builder = VoucherBuilder::new(VoucherType::Journal, date, "Opening balances")
            .reference(ReferenceType::OpeningBalance, date.to_string())
            .created_by(created_by);
        for line in lines {
            builder = builder.line(line);
        }
        builder.build()
    }
}
