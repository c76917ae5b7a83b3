//! Application state.

use std::sync::Arc;

use jhive_firestore::{
    ApplicationsRepository, CompaniesRepository, FirestoreClient, JobsRepository, UsersRepository,
};
use jhive_mailer::Mailer;
use jhive_storage::MediaStorage;

use crate::auth::TokenService;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub firestore: Arc<FirestoreClient>,
    pub storage: Arc<MediaStorage>,
    pub mailer: Arc<Mailer>,
    pub tokens: TokenService,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let firestore = FirestoreClient::from_env().await?;
        let storage = MediaStorage::from_env()?;
        let mailer = Mailer::from_env()?;
        let tokens = TokenService::new(&config);

        Ok(Self {
            config,
            firestore: Arc::new(firestore),
            storage: Arc::new(storage),
            mailer: Arc::new(mailer),
            tokens,
        })
    }

    /// Users repository.
    pub fn users(&self) -> UsersRepository {
        UsersRepository::new((*self.firestore).clone())
    }

    /// Companies repository.
    pub fn companies(&self) -> CompaniesRepository {
        CompaniesRepository::new((*self.firestore).clone())
    }

    /// Jobs repository.
    pub fn jobs(&self) -> JobsRepository {
        JobsRepository::new((*self.firestore).clone())
    }

    /// Applications repository.
    pub fn applications(&self) -> ApplicationsRepository {
        ApplicationsRepository::new((*self.firestore).clone())
    }
}
