//! Bank-transfer payment QR links.
//!
//! Links point at the VietQR image service:
//! `https://img.vietqr.io/image/<bank>-<account>-<template>.png?amount=..&addInfo=..&accountName=..`

use crate::model::settings::StoreSettings;
use crate::model::Amount;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use url::Url;

const VIETQR_BASE_URL: &str = "https://img.vietqr.io/image/";
pub const DEFAULT_QR_TEMPLATE: &str = "compact2";

static TEMPLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid qr template regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentQrError {
    /// Store settings carry no bank account.
    MissingBankAccount,
    NonPositiveAmount(Amount),
    /// Template name is not a plain `[A-Za-z0-9_]+` identifier.
    InvalidTemplate(String),
    InvalidUrl(String),
}

impl Display for PaymentQrError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingBankAccount => write!(f, "store has no bank account configured"),
            Self::NonPositiveAmount(amount) => {
                write!(f, "payment amount must be positive, got {amount}")
            }
            Self::InvalidTemplate(template) => {
                write!(f, "invalid payment qr template `{template}`")
            }
            Self::InvalidUrl(message) => write!(f, "cannot build payment qr url: {message}"),
        }
    }
}

impl Error for PaymentQrError {}

/// Builds the QR image URL for transferring `amount` with `order_code` as
/// the transfer memo.
pub fn build_payment_qr_url(
    settings: &StoreSettings,
    amount: Amount,
    order_code: &str,
) -> Result<Url, PaymentQrError> {
    build_payment_qr_url_with_template(settings, amount, order_code, DEFAULT_QR_TEMPLATE)
}

pub fn build_payment_qr_url_with_template(
    settings: &StoreSettings,
    amount: Amount,
    order_code: &str,
    template: &str,
) -> Result<Url, PaymentQrError> {
    let bank = settings
        .bank_account
        .as_ref()
        .ok_or(PaymentQrError::MissingBankAccount)?;
    if amount <= 0 {
        return Err(PaymentQrError::NonPositiveAmount(amount));
    }
    let template = template.trim();
    if !TEMPLATE_RE.is_match(template) {
        return Err(PaymentQrError::InvalidTemplate(template.to_string()));
    }

    let path = format!(
        "{}-{}-{}.png",
        bank.bank_code.trim(),
        bank.account_number.trim(),
        template
    );
    let mut url = Url::parse(VIETQR_BASE_URL)
        .and_then(|base| base.join(&path))
        .map_err(|err| PaymentQrError::InvalidUrl(err.to_string()))?;
    url.query_pairs_mut()
        .append_pair("amount", &amount.to_string())
        .append_pair("addInfo", order_code.trim())
        .append_pair("accountName", bank.account_name.trim());
    Ok(url)
}
