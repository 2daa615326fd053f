//! Store-wide settings edited from the back office.

use super::{require_text, ValidationError};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Bank account shown in payment QR codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Bank short code or BIN understood by the QR provider.
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub shop_name: String,
    pub hotline: Option<String>,
    pub address: Option<String>,
    pub bank_account: Option<BankAccount>,
    /// Offset used to bucket orders into calendar days for reports.
    pub utc_offset_minutes: i32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            shop_name: "BrewHub Coffee".to_string(),
            hotline: None,
            address: None,
            bank_account: None,
            utc_offset_minutes: 7 * 60,
        }
    }
}

impl StoreSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("shop_name", &self.shop_name)?;
        if let Some(bank) = &self.bank_account {
            require_text("bank_account.bank_code", &bank.bank_code)?;
            require_text("bank_account.account_number", &bank.account_number)?;
            require_text("bank_account.account_name", &bank.account_name)?;
            if !bank.account_number.chars().all(|c| c.is_ascii_digit()) {
                return Err(ValidationError::Invalid(
                    "bank account number must contain digits only",
                ));
            }
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ValidationError::Invalid("utc offset is out of range"));
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}
