//! Validation utilities

use crate::traits::*;
use crate::types::*;

/// Validate an account number: non-empty, at most 20 characters,
/// alphanumeric plus dashes and underscores
pub fn validate_account_number(number: &str) -> LedgerResult<()> {
    if number.trim().is_empty() {
        return Err(LedgerError::Validation(
            "account number cannot be empty".to_string(),
        ));
    }
    if number.len() > 20 {
        return Err(LedgerError::Validation(
            "account number cannot exceed 20 characters".to_string(),
        ));
    }
    if !number
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LedgerError::Validation(
            "account number can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }
    Ok(())
}

/// Validate an account name: non-empty, at most 100 characters
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "account name cannot be empty".to_string(),
        ));
    }
    if name.len() > 100 {
        return Err(LedgerError::Validation(
            "account name cannot exceed 100 characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate a voucher narration: non-empty, at most 500 characters
pub fn validate_narration(narration: &str) -> LedgerResult<()> {
    if narration.trim().is_empty() {
        return Err(LedgerError::Validation(
            "narration cannot be empty".to_string(),
        ));
    }
    if narration.len() > 500 {
        return Err(LedgerError::Validation(
            "narration cannot exceed 500 characters".to_string(),
        ));
    }
    Ok(())
}

/// Voucher validator with detailed checks on top of the double-entry rules
pub struct EnhancedVoucherValidator;

impl VoucherValidator for EnhancedVoucherValidator {
    fn validate_voucher(&self, voucher: &Voucher) -> LedgerResult<()> {
        voucher.validate()?;
        validate_narration(&voucher.narration)?;

        // the same account may not appear twice on the same side
        let mut seen = std::collections::HashSet::new();
        for line in &voucher.lines {
            let zero = bigdecimal::BigDecimal::from(0);
            let side = if line.debit > zero {
                BalanceSide::Debit
            } else {
                BalanceSide::Credit
            };
            if !seen.insert((line.account_id, side)) {
                return Err(LedgerError::InvalidLine(format!(
                    "account {} appears more than once on the {side:?} side",
                    line.account_id
                )));
            }
        }
        Ok(())
    }
}

/// Account validator with detailed checks
pub struct EnhancedAccountValidator;

impl AccountValidator for EnhancedAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        validate_account_number(&account.number)?;
        validate_account_name(&account.name)?;
        Ok(())
    }
}
