use anyhow::Context;
use edgeguard_auth::{AuthService, InMemoryDeviceStore, LicenseService, SqliteStore};
use edgeguard_core::{Clock, Config, SystemClock};
use edgeguard_crypto::build_verifier;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AppState {
    pub config: Config,
    pub auth: Arc<AuthService>,
    pub license: Option<Arc<LicenseService>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let verifier = build_verifier(&config.zkp).context("initializing proof verifier")?;
        info!(backend = verifier.backend_name(), "Proof verifier ready");

        let mut builder = AuthService::builder(verifier)
            .settings(&config.auth)
            .clock(clock.clone());

        match &config.storage.database_path {
            Some(path) => {
                let store = Arc::new(SqliteStore::open(path).context("opening auth database")?);
                builder = builder
                    .device_store(store.clone())
                    .challenge_store(store.clone())
                    .session_store(store);
            }
            None => {
                warn!("No database configured; devices, challenges and sessions are in-memory");
                builder = builder.device_store(Arc::new(InMemoryDeviceStore::new()));
            }
        }

        let license = if config.license.enabled {
            let service = Arc::new(
                LicenseService::from_config(&config.license, clock).context("loading license")?,
            );
            builder = builder.license_gate(service.clone());
            Some(service)
        } else {
            None
        };

        let auth = builder.build().context("building auth service")?;
        if auth.sessions().is_ephemeral() {
            warn!("Session tokens are signed with an ephemeral secret");
        }

        Ok(AppState {
            config,
            auth: Arc::new(auth),
            license,
        })
    }

    /// State around an already-built service, used by tests.
    #[cfg(test)]
    pub fn with_service(config: Config, auth: AuthService) -> Self {
        AppState {
            config,
            auth: Arc::new(auth),
            license: None,
        }
    }
}
