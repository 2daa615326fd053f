//! Store settings use-cases.

use crate::access::{AccessError, Actor, Permission};
use crate::model::settings::StoreSettings;
use crate::model::ValidationError;
use crate::repo::common::RepoError;
use crate::repo::settings_repo::SettingsRepository;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum SettingsServiceError {
    Validation(ValidationError),
    Access(AccessError),
    Repo(RepoError),
}

impl Display for SettingsServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SettingsServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for SettingsServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for SettingsServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AccessError> for SettingsServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

pub struct SettingsService<R: SettingsRepository> {
    repo: R,
}

impl<R: SettingsRepository> SettingsService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Current settings, defaults when nothing was saved yet.
    pub fn load(&self) -> Result<StoreSettings, SettingsServiceError> {
        Ok(self.repo.load_store_settings()?.unwrap_or_default())
    }

    pub fn update(
        &self,
        actor: &Actor,
        mut settings: StoreSettings,
    ) -> Result<StoreSettings, SettingsServiceError> {
        actor.ensure(Permission::ManageSettings)?;
        settings.shop_name = settings.shop_name.trim().to_string();
        settings.validate()?;
        self.repo.save_store_settings(&settings)?;
        info!(
            "event=settings_update module=settings status=ok has_bank_account={} utc_offset_minutes={}",
            settings.bank_account.is_some(),
            settings.utc_offset_minutes
        );
        self.load()
    }
}
