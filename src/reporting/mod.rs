//! Trial balance and statement calculation.
//!
//! Everything here is read-only: calculations never write, so a caller that
//! cancels by dropping the future mid-computation leaves no partial side
//! effects behind.

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::traits::LedgerStorage;
use crate::types::*;

/// Per-account debit and credit sums over a trial-balance range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: Uuid,
    pub account_number: String,
    pub account_name: String,
    pub account_type: AccountType,
    /// Sum of debits to the account over the range
    pub debit: BigDecimal,
    /// Sum of credits to the account over the range
    pub credit: BigDecimal,
}

/// The check that total debits equal total credits across the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Per-account rows, sorted by account number
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    /// Number of entries aggregated
    pub entry_count: u64,
}

/// Profit & loss and cash/bank/stock figures over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Net credit movement on income accounts
    pub revenue: BigDecimal,
    /// Net debit movement on expense accounts from cost-of-sale legs
    pub cogs: BigDecimal,
    /// Purchases capitalized into stock or other non-cash assets
    pub purchases_capitalized: BigDecimal,
    /// Purchases expensed on arrival
    pub purchases_expensed: BigDecimal,
    /// Remaining net debit movement on expense accounts
    pub expenses: BigDecimal,
    /// revenue - cogs
    pub gross_profit: BigDecimal,
    /// gross_profit - purchases_expensed - expenses
    pub net_profit: BigDecimal,
    pub opening_cash: BigDecimal,
    /// Debits to cash accounts over the period (receipts)
    pub cash_in: BigDecimal,
    /// Credits to cash accounts over the period (payments)
    pub cash_out: BigDecimal,
    pub closing_cash: BigDecimal,
    pub opening_bank: BigDecimal,
    pub bank_in: BigDecimal,
    pub bank_out: BigDecimal,
    pub closing_bank: BigDecimal,
    pub opening_stock: BigDecimal,
    pub closing_stock: BigDecimal,
    pub entry_count: u64,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
}

impl Statement {
    /// Total purchases over the period, capitalized and expensed
    pub fn purchases(&self) -> BigDecimal {
        &self.purchases_capitalized + &self.purchases_expensed
    }

    /// Freeze this statement into the figures of a closing record
    pub fn into_snapshot(self) -> FinancialSnapshot {
        let purchases = self.purchases();
        FinancialSnapshot {
            revenue: self.revenue,
            cogs: self.cogs,
            purchases,
            expenses: self.expenses,
            gross_profit: self.gross_profit,
            net_profit: self.net_profit,
            opening_cash: self.opening_cash,
            closing_cash: self.closing_cash,
            opening_bank: self.opening_bank,
            closing_bank: self.closing_bank,
            opening_stock: self.opening_stock,
            closing_stock: self.closing_stock,
            ledger_entry_count: self.entry_count,
            total_debit: self.total_debit,
            total_credit: self.total_credit,
            trial_balance_matched: true,
        }
    }
}

/// Calculator for trial balances and period statements
pub struct ReportCalculator<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> ReportCalculator<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Sum debits and credits per account over the range.
    ///
    /// The calculator self-checks that total debits equal total credits to
    /// the currency precision. A violation means the store itself is
    /// inconsistent (e.g. a bypassed posting path); it is logged at error
    /// severity and surfaced as `TrialBalanceMismatch`, never reported as a
    /// silently unbalanced figure.
    pub async fn trial_balance(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<TrialBalance> {
        let entries = self.storage.entries_in_range(from, to).await?;
        let accounts = self.account_index().await?;

        let mut sums: HashMap<Uuid, (BigDecimal, BigDecimal)> = HashMap::new();
        let mut total_debit = BigDecimal::from(0);
        let mut total_credit = BigDecimal::from(0);

        for entry in &entries {
            let slot = sums
                .entry(entry.account_id)
                .or_insert_with(|| (BigDecimal::from(0), BigDecimal::from(0)));
            slot.0 += &entry.debit;
            slot.1 += &entry.credit;
            total_debit += &entry.debit;
            total_credit += &entry.credit;
        }

        if !amounts_match(&total_debit, &total_credit) {
            error!(
                %total_debit,
                %total_credit,
                "trial balance mismatch: ledger entries do not balance"
            );
            return Err(LedgerError::TrialBalanceMismatch {
                debit: total_debit,
                credit: total_credit,
            });
        }

        let mut rows: Vec<TrialBalanceRow> = sums
            .into_iter()
            .map(|(account_id, (debit, credit))| {
                let account = accounts.get(&account_id);
                TrialBalanceRow {
                    account_id,
                    account_number: account.map(|a| a.number.clone()).unwrap_or_default(),
                    account_name: account.map(|a| a.name.clone()).unwrap_or_default(),
                    account_type: account
                        .map(|a| a.account_type)
                        .unwrap_or(AccountType::Asset),
                    debit,
                    credit,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.account_number.cmp(&b.account_number));

        Ok(TrialBalance {
            from,
            to,
            rows,
            total_debit,
            total_credit,
            entry_count: entries.len() as u64,
        })
    }

    /// Compute the profit & loss and cash/bank/stock statement for one
    /// period. Every entry is classified exactly once by its account type
    /// and reference type; reversal entries are attributed to the bucket of
    /// the voucher they reverse so a reversed sale takes its cost leg back
    /// out of COGS rather than distorting expenses.
    pub async fn statement(
        &self,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> LedgerResult<Statement> {
        let accounts = self.account_index().await?;
        let entries = self
            .storage
            .entries_in_range(Some(period_start), Some(period_end))
            .await?;

        let zero = || BigDecimal::from(0);
        let mut revenue = zero();
        let mut cogs = zero();
        let mut purchases_capitalized = zero();
        let mut purchases_expensed = zero();
        let mut expenses = zero();
        let mut cash_in = zero();
        let mut cash_out = zero();
        let mut bank_in = zero();
        let mut bank_out = zero();
        let mut stock_movement = zero();
        let mut total_debit = zero();
        let mut total_credit = zero();

        let mut reversal_origins: HashMap<Uuid, Option<ReferenceType>> = HashMap::new();

        for entry in &entries {
            let account = accounts.get(&entry.account_id).ok_or_else(|| {
                LedgerError::Storage(format!(
                    "ledger entry {} references unknown account {}",
                    entry.id, entry.account_id
                ))
            })?;

            total_debit += &entry.debit;
            total_credit += &entry.credit;

            match account.class {
                AccountClass::Cash => {
                    cash_in += &entry.debit;
                    cash_out += &entry.credit;
                }
                AccountClass::Bank => {
                    bank_in += &entry.debit;
                    bank_out += &entry.credit;
                }
                AccountClass::Inventory => {
                    stock_movement += entry.signed_amount();
                }
                AccountClass::General => {}
            }

            let reference = self
                .effective_reference(entry, &mut reversal_origins)
                .await?;

            match account.account_type {
                AccountType::Income => {
                    revenue += &entry.credit - &entry.debit;
                }
                AccountType::Expense => match reference {
                    Some(ReferenceType::Sale) => cogs += entry.signed_amount(),
                    Some(ReferenceType::Purchase) => {
                        purchases_expensed += entry.signed_amount()
                    }
                    Some(ReferenceType::Expense)
                    | Some(ReferenceType::OpeningBalance)
                    | Some(ReferenceType::Adjustment)
                    | Some(ReferenceType::Manual)
                    | Some(ReferenceType::Transfer)
                    | Some(ReferenceType::Reversal)
                    | None => expenses += entry.signed_amount(),
                },
                AccountType::Asset => {
                    // the payment leg of a purchase moves cash/bank, not the
                    // purchases figure
                    if reference == Some(ReferenceType::Purchase)
                        && !matches!(account.class, AccountClass::Cash | AccountClass::Bank)
                    {
                        purchases_capitalized += entry.signed_amount();
                    }
                }
                AccountType::Liability | AccountType::Equity => {}
            }
        }

        let day_before = period_start.pred_opt();
        let (opening_cash, opening_bank, opening_stock) =
            self.opening_figures(&accounts, day_before).await?;

        let closing_cash = &opening_cash + &cash_in - &cash_out;
        let closing_bank = &opening_bank + &bank_in - &bank_out;
        let closing_stock = &opening_stock + &stock_movement;

        let gross_profit = &revenue - &cogs;
        let net_profit = &gross_profit - &purchases_expensed - &expenses;

        Ok(Statement {
            period_start,
            period_end,
            revenue,
            cogs,
            purchases_capitalized,
            purchases_expensed,
            expenses,
            gross_profit,
            net_profit,
            opening_cash,
            cash_in,
            cash_out,
            closing_cash,
            opening_bank,
            bank_in,
            bank_out,
            closing_bank,
            opening_stock,
            closing_stock,
            entry_count: entries.len() as u64,
            total_debit,
            total_credit,
        })
    }

    /// Resolve the reference a reversal entry should be classified under:
    /// the reference of the voucher it reverses.
    async fn effective_reference(
        &self,
        entry: &LedgerEntry,
        cache: &mut HashMap<Uuid, Option<ReferenceType>>,
    ) -> LedgerResult<Option<ReferenceType>> {
        if entry.reference_type != Some(ReferenceType::Reversal) {
            return Ok(entry.reference_type);
        }
        let original_id = match entry
            .reference_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
        {
            Some(id) => id,
            None => return Ok(Some(ReferenceType::Reversal)),
        };
        if let Some(found) = cache.get(&original_id) {
            return Ok(*found);
        }
        let reference = self
            .storage
            .get_voucher(original_id)
            .await?
            .and_then(|v| v.reference_type);
        cache.insert(original_id, reference);
        Ok(reference)
    }

    /// Cash, bank and stock balances as of the day before the period starts
    async fn opening_figures(
        &self,
        accounts: &HashMap<Uuid, Account>,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<(BigDecimal, BigDecimal, BigDecimal)> {
        let mut cash = BigDecimal::from(0);
        let mut bank = BigDecimal::from(0);
        let mut stock = BigDecimal::from(0);

        let as_of = match as_of {
            Some(date) => date,
            // a period starting at the epoch of the calendar has no history
            None => return Ok((cash, bank, stock)),
        };

        let prior = self.storage.entries_in_range(None, Some(as_of)).await?;
        for entry in &prior {
            let Some(account) = accounts.get(&entry.account_id) else {
                continue;
            };
            match account.class {
                AccountClass::Cash => cash += entry.signed_amount(),
                AccountClass::Bank => bank += entry.signed_amount(),
                AccountClass::Inventory => stock += entry.signed_amount(),
                AccountClass::General => {}
            }
        }
        Ok((cash, bank, stock))
    }

    async fn account_index(&self) -> LedgerResult<HashMap<Uuid, Account>> {
        let accounts = self.storage.list_accounts(None).await?;
        Ok(accounts.into_iter().map(|a| (a.id, a)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::account::{chart, AccountRegistry};
    use crate::ledger::voucher::{patterns, VoucherEngine};
    use crate::utils::memory_storage::MemoryStorage;
    use std::collections::HashMap as Map;

    fn dec(v: i64) -> BigDecimal {
        BigDecimal::from(v)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn workshop(storage: &MemoryStorage) -> Map<&'static str, Account> {
        let registry = AccountRegistry::new(storage.clone());
        chart::create_workshop_chart(&registry).await.unwrap()
    }

    async fn run(engine: &VoucherEngine<MemoryStorage>, input: crate::ledger::voucher::CreateVoucher) {
        let voucher = engine.create_voucher(input).await.unwrap();
        engine.post_voucher(voucher.id).await.unwrap();
    }

    #[tokio::test]
    async fn empty_ledger_has_a_balanced_trial() {
        let storage = MemoryStorage::new();
        let calc = ReportCalculator::new(storage);
        let trial = calc.trial_balance(None, None).await.unwrap();
        assert_eq!(trial.entry_count, 0);
        assert_eq!(trial.total_debit, dec(0));
        assert_eq!(trial.total_credit, dec(0));
    }

    #[tokio::test]
    async fn trial_balance_sums_per_account() {
        let storage = MemoryStorage::new();
        let accounts = workshop(&storage).await;
        let engine = VoucherEngine::new(storage.clone());

        run(
            &engine,
            patterns::sale_completion(
                "s-1",
                date(2024, 6, 1),
                accounts["cash"].id,
                accounts["parts_sales"].id,
                dec(900),
                None,
                "system",
            )
            .unwrap(),
        )
        .await;

        let calc = ReportCalculator::new(storage);
        let trial = calc.trial_balance(None, None).await.unwrap();
        assert_eq!(trial.total_debit, dec(900));
        assert_eq!(trial.total_credit, dec(900));
        assert_eq!(trial.rows.len(), 2);

        let cash_row = trial
            .rows
            .iter()
            .find(|r| r.account_id == accounts["cash"].id)
            .unwrap();
        assert_eq!(cash_row.debit, dec(900));
        assert_eq!(cash_row.credit, dec(0));
    }

    #[tokio::test]
    async fn statement_classifies_without_double_counting() {
        let storage = MemoryStorage::new();
        let accounts = workshop(&storage).await;
        let engine = VoucherEngine::new(storage.clone());

        // stock purchased for 600, capitalized
        run(
            &engine,
            patterns::purchase_completion(
                "p-1",
                date(2024, 6, 1),
                accounts["parts_stock"].id,
                accounts["payables"].id,
                dec(600),
                "system",
            )
            .unwrap(),
        )
        .await;

        // sale for 900 with a 600 cost-of-sale leg
        run(
            &engine,
            patterns::sale_completion(
                "s-1",
                date(2024, 6, 2),
                accounts["cash"].id,
                accounts["parts_sales"].id,
                dec(900),
                Some(patterns::CostOfSale {
                    cogs_account_id: accounts["cogs"].id,
                    stock_account_id: accounts["parts_stock"].id,
                    cost: dec(600),
                }),
                "system",
            )
            .unwrap(),
        )
        .await;

        // 100 of rent paid from cash
        run(
            &engine,
            patterns::expense_payment(
                "e-1",
                date(2024, 6, 3),
                accounts["rent"].id,
                accounts["cash"].id,
                dec(100),
                "system",
            )
            .unwrap(),
        )
        .await;

        let calc = ReportCalculator::new(storage);
        let statement = calc
            .statement(date(2024, 6, 1), date(2024, 6, 30))
            .await
            .unwrap();

        assert_eq!(statement.revenue, dec(900));
        assert_eq!(statement.cogs, dec(600));
        assert_eq!(statement.gross_profit, dec(300));
        // the capitalized purchase reaches P&L only through COGS
        assert_eq!(statement.purchases_capitalized, dec(600));
        assert_eq!(statement.purchases_expensed, dec(0));
        assert_eq!(statement.expenses, dec(100));
        assert_eq!(statement.net_profit, dec(200));

        assert_eq!(statement.opening_cash, dec(0));
        assert_eq!(statement.cash_in, dec(900));
        assert_eq!(statement.cash_out, dec(100));
        assert_eq!(statement.closing_cash, dec(800));
        // 600 in, 600 out at sale time
        assert_eq!(statement.closing_stock, dec(0));
        assert_eq!(statement.entry_count, 8);
    }

    #[tokio::test]
    async fn reversal_entries_return_to_their_original_bucket() {
        let storage = MemoryStorage::new();
        let accounts = workshop(&storage).await;
        let engine = VoucherEngine::new(storage.clone());

        let input = patterns::sale_completion(
            "s-9",
            date(2024, 6, 2),
            accounts["cash"].id,
            accounts["parts_sales"].id,
            dec(900),
            Some(patterns::CostOfSale {
                cogs_account_id: accounts["cogs"].id,
                stock_account_id: accounts["parts_stock"].id,
                cost: dec(600),
            }),
            "system",
        )
        .unwrap();
        let voucher = engine.create_voucher(input).await.unwrap();
        engine.post_voucher(voucher.id).await.unwrap();
        engine
            .reverse_voucher(voucher.id, "wrong customer", "back-office")
            .await
            .unwrap();

        let calc = ReportCalculator::new(storage);
        let statement = calc
            .statement(date(2024, 6, 1), date(2024, 6, 30))
            .await
            .unwrap();

        // the reversal cancels revenue and COGS, not the expenses bucket
        assert_eq!(statement.revenue, dec(0));
        assert_eq!(statement.cogs, dec(0));
        assert_eq!(statement.expenses, dec(0));
        assert_eq!(statement.net_profit, dec(0));
    }

    #[tokio::test]
    async fn opening_figures_carry_into_the_period() {
        let storage = MemoryStorage::new();
        let accounts = workshop(&storage).await;
        let engine = VoucherEngine::new(storage.clone());

        run(
            &engine,
            patterns::sale_completion(
                "s-0",
                date(2024, 5, 20),
                accounts["cash"].id,
                accounts["parts_sales"].id,
                dec(1000),
                None,
                "system",
            )
            .unwrap(),
        )
        .await;
        run(
            &engine,
            patterns::sale_completion(
                "s-1",
                date(2024, 6, 5),
                accounts["cash"].id,
                accounts["parts_sales"].id,
                dec(400),
                None,
                "system",
            )
            .unwrap(),
        )
        .await;

        let calc = ReportCalculator::new(storage);
        let statement = calc
            .statement(date(2024, 6, 1), date(2024, 6, 30))
            .await
            .unwrap();

        assert_eq!(statement.opening_cash, dec(1000));
        assert_eq!(statement.closing_cash, dec(1400));
        // only June's sale is revenue for the period
        assert_eq!(statement.revenue, dec(400));
    }
}
