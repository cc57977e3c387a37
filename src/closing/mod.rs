//! Period closing: freezing a day or month into an immutable snapshot.
//!
//! A closing reserves its period first and computes figures second, so no
//! voucher can slip into the range between the calculation and the freeze.
//! Period boundaries are a pure function of (closing type, date); there is
//! no "current open period" state anywhere.

use bigdecimal::BigDecimal;
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::reporting::ReportCalculator;
use crate::traits::LedgerStorage;
use crate::types::*;

/// The inclusive date range a closing of the given type covers
pub fn period_bounds(closing_type: ClosingType, date: NaiveDate) -> (NaiveDate, NaiveDate) {
    match closing_type {
        ClosingType::Day => (date, date),
        ClosingType::Month => {
            let start = date.with_day(1).unwrap_or(date);
            let end = start
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                .unwrap_or(date);
            (start, end)
        }
    }
}

/// Read-only comparison of one closing's revenue against the average of
/// prior closings of the same type in the containing month (day closings)
/// or year (month closings)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesComparison {
    pub closing_id: Uuid,
    /// Revenue frozen in this closing
    pub revenue: BigDecimal,
    /// Average revenue of the prior closings, when any exist
    pub average_revenue: Option<BigDecimal>,
    /// revenue - average_revenue (zero when there is no history)
    pub difference: BigDecimal,
    /// Number of prior closings averaged
    pub periods_considered: u64,
}

/// Orchestrates period closings
pub struct ClosingManager<S: LedgerStorage + Clone> {
    storage: S,
    reports: ReportCalculator<S>,
}

impl<S: LedgerStorage + Clone> ClosingManager<S> {
    pub fn new(storage: S) -> Self {
        Self {
            reports: ReportCalculator::new(storage.clone()),
            storage,
        }
    }

    /// Close a day or month: reserve the period, compute the trial balance
    /// and statement over it, and persist the frozen snapshot.
    ///
    /// Fails with `AlreadyClosed` when an overlapping period of the same
    /// type exists (exactly one of two concurrent closers wins), and with
    /// `TrialBalanceMismatch` when the ledger fails its integrity
    /// self-check - in that case the reservation is rolled back and nothing
    /// is persisted.
    pub async fn close_period(
        &self,
        closing_type: ClosingType,
        date: NaiveDate,
        closed_by: &str,
        notes: Option<String>,
    ) -> LedgerResult<ClosingPeriod> {
        let (period_start, period_end) = period_bounds(closing_type, date);
        let mut closing = ClosingPeriod {
            id: Uuid::new_v4(),
            closing_type,
            closing_date: date,
            period_start,
            period_end,
            status: ClosingStatus::Pending,
            snapshot: FinancialSnapshot::default(),
            closed_by: closed_by.to_string(),
            closed_at: chrono::Utc::now().naive_utc(),
            notes,
        };

        // Freeze first: the reservation blocks posting into the range while
        // the figures are computed.
        self.storage.reserve_closing(&closing).await?;

        let snapshot = match self.compute_snapshot(period_start, period_end).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                if let Err(rollback) = self.storage.remove_closing(closing.id).await {
                    error!(error = %rollback, "failed to roll back closing reservation");
                }
                return Err(err);
            }
        };

        closing.snapshot = snapshot;
        closing.status = ClosingStatus::Closed;
        closing.closed_at = chrono::Utc::now().naive_utc();
        self.storage.update_closing(&closing).await?;

        info!(
            closing_type = %closing_type,
            period_start = %period_start,
            period_end = %period_end,
            entries = closing.snapshot.ledger_entry_count,
            "period closed"
        );
        Ok(closing)
    }

    async fn compute_snapshot(
        &self,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> LedgerResult<FinancialSnapshot> {
        // the trial balance self-check gates the closing
        self.reports
            .trial_balance(Some(period_start), Some(period_end))
            .await?;
        let statement = self.reports.statement(period_start, period_end).await?;
        Ok(statement.into_snapshot())
    }

    /// Lock a closed period against any further change
    pub async fn lock_closing(&self, id: Uuid) -> LedgerResult<ClosingPeriod> {
        let mut closing = self.get_closing(id).await?;
        if closing.status != ClosingStatus::Closed {
            return Err(LedgerError::Validation(
                "only closed periods can be locked".to_string(),
            ));
        }
        closing.status = ClosingStatus::Locked;
        self.storage.update_closing(&closing).await?;
        Ok(closing)
    }

    /// Get a closing by id, failing with `ClosingNotFound`
    pub async fn get_closing(&self, id: Uuid) -> LedgerResult<ClosingPeriod> {
        self.storage
            .get_closing(id)
            .await?
            .ok_or(LedgerError::ClosingNotFound(id))
    }

    /// List closings, optionally filtered by type and period-start range
    pub async fn list_closings(
        &self,
        closing_type: Option<ClosingType>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<Vec<ClosingPeriod>> {
        self.storage.list_closings(closing_type, from, to).await
    }

    /// Compare a closing's revenue against the average of the prior
    /// closings of the same type within its containing month (day closings)
    /// or year (month closings). Performs no writes.
    pub async fn sales_comparison(&self, id: Uuid) -> LedgerResult<SalesComparison> {
        let closing = self.get_closing(id).await?;

        let (container_start, container_end) = match closing.closing_type {
            ClosingType::Day => period_bounds(ClosingType::Month, closing.closing_date),
            ClosingType::Month => {
                let year = closing.closing_date.year();
                let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(closing.closing_date);
                let end = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(closing.closing_date);
                (start, end)
            }
        };

        let prior: Vec<ClosingPeriod> = self
            .storage
            .list_closings(
                Some(closing.closing_type),
                Some(container_start),
                Some(container_end),
            )
            .await?
            .into_iter()
            .filter(|c| c.id != closing.id && c.period_start < closing.period_start)
            .filter(|c| matches!(c.status, ClosingStatus::Closed | ClosingStatus::Locked))
            .collect();

        let revenue = closing.snapshot.revenue.clone();
        if prior.is_empty() {
            return Ok(SalesComparison {
                closing_id: closing.id,
                revenue,
                average_revenue: None,
                difference: BigDecimal::from(0),
                periods_considered: 0,
            });
        }

        let total: BigDecimal = prior.iter().map(|c| &c.snapshot.revenue).sum();
        let average = total / BigDecimal::from(prior.len() as u64);
        let difference = &revenue - &average;

        Ok(SalesComparison {
            closing_id: closing.id,
            revenue,
            average_revenue: Some(average),
            difference,
            periods_considered: prior.len() as u64,
        })
    }
}
