//! Chart-of-accounts registry

use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// Registry for chart-of-accounts operations.
///
/// Holds no balances: every balance in the system is derived by summing
/// ledger entries at read time.
pub struct AccountRegistry<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: LedgerStorage> AccountRegistry<S> {
    /// Create a new registry with the default validator
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultAccountValidator),
        }
    }

    /// Create a new registry with a custom validator
    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Create a new account. Fails with `DuplicateAccountNumber` if the
    /// number is already taken.
    pub async fn create_account(
        &self,
        number: String,
        name: String,
        account_type: AccountType,
        class: AccountClass,
    ) -> LedgerResult<Account> {
        let account = Account::new(number, name, account_type, class);
        self.validator.validate_account(&account)?;

        if self
            .storage
            .get_account_by_number(&account.number)
            .await?
            .is_some()
        {
            return Err(LedgerError::DuplicateAccountNumber(account.number));
        }

        self.storage.insert_account(&account).await?;
        Ok(account)
    }

    /// Get an account by id, failing with `AccountNotFound`
    pub async fn get_account(&self, id: Uuid) -> LedgerResult<Account> {
        self.storage
            .get_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Get an account by its human-readable number
    pub async fn get_account_by_number(&self, number: &str) -> LedgerResult<Option<Account>> {
        self.storage.get_account_by_number(number).await
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(None).await
    }

    /// List accounts of one type
    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(Some(account_type)).await
    }

    /// Rename an account
    pub async fn rename_account(&self, id: Uuid, name: String) -> LedgerResult<Account> {
        let mut account = self.get_account(id).await?;
        account.name = name;
        account.updated_at = chrono::Utc::now().naive_utc();
        self.validator.validate_account(&account)?;
        self.storage.update_account(&account).await?;
        Ok(account)
    }

    /// Deactivate an account so no further voucher may post to it.
    /// History is preserved; existing entries keep referencing it.
    pub async fn deactivate_account(&self, id: Uuid) -> LedgerResult<Account> {
        self.set_active(id, false).await
    }

    /// Reactivate a previously deactivated account
    pub async fn reactivate_account(&self, id: Uuid) -> LedgerResult<Account> {
        self.set_active(id, true).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> LedgerResult<Account> {
        let mut account = self.get_account(id).await?;
        account.active = active;
        account.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_account(&account).await?;
        Ok(account)
    }

    /// Delete an account. Fails with `AccountInUse` once any ledger entry
    /// references it; such accounts can only be deactivated.
    pub async fn delete_account(&self, id: Uuid) -> LedgerResult<()> {
        // Ensure the account exists before consulting entry references
        self.get_account(id).await?;
        if self.storage.account_has_entries(id).await? {
            return Err(LedgerError::AccountInUse(id));
        }
        self.storage.delete_account(id).await
    }
}

/// Utility functions for working with accounts
pub mod chart {
    use super::*;
    use std::collections::HashMap;

    /// Create the standard chart of accounts for an automotive workshop.
    /// Returns the created accounts keyed by a stable slug.
    pub async fn create_workshop_chart<S: LedgerStorage>(
        registry: &AccountRegistry<S>,
    ) -> LedgerResult<HashMap<&'static str, Account>> {
        let plan: [(&str, &str, &str, AccountType, AccountClass); 14] = [
            ("cash", "1000", "Cash in Hand", AccountType::Asset, AccountClass::Cash),
            ("bank", "1100", "Bank Account", AccountType::Asset, AccountClass::Bank),
            (
                "receivables",
                "1200",
                "Accounts Receivable",
                AccountType::Asset,
                AccountClass::General,
            ),
            (
                "parts_stock",
                "1300",
                "Parts Stock",
                AccountType::Asset,
                AccountClass::Inventory,
            ),
            (
                "workshop_equipment",
                "1500",
                "Workshop Equipment",
                AccountType::Asset,
                AccountClass::General,
            ),
            (
                "payables",
                "2000",
                "Accounts Payable",
                AccountType::Liability,
                AccountClass::General,
            ),
            (
                "owners_equity",
                "3000",
                "Owner's Equity",
                AccountType::Equity,
                AccountClass::General,
            ),
            (
                "parts_sales",
                "4000",
                "Parts Sales",
                AccountType::Income,
                AccountClass::General,
            ),
            (
                "service_revenue",
                "4100",
                "Service Revenue",
                AccountType::Income,
                AccountClass::General,
            ),
            (
                "cogs",
                "5000",
                "Cost of Goods Sold",
                AccountType::Expense,
                AccountClass::General,
            ),
            (
                "wages",
                "6000",
                "Wages Expense",
                AccountType::Expense,
                AccountClass::General,
            ),
            (
                "rent",
                "6100",
                "Rent Expense",
                AccountType::Expense,
                AccountClass::General,
            ),
            (
                "utilities",
                "6200",
                "Utilities Expense",
                AccountType::Expense,
                AccountClass::General,
            ),
            (
                "consumables",
                "6300",
                "Workshop Consumables",
                AccountType::Expense,
                AccountClass::General,
            ),
        ];

        let mut accounts = HashMap::new();
        for (slug, number, name, account_type, class) in plan {
            let account = registry
                .create_account(number.to_string(), name.to_string(), account_type, class)
                .await?;
            accounts.insert(slug, account);
        }
        Ok(accounts)
    }
}
