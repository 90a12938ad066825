use std::sync::Arc;

use anyhow::Context;
use clusterplane::{
    api::{build_router, start_api_server, AppState},
    auth::{ClusterHashSource, PasswordValidator},
    config::AppConfig,
    observability::{init_observability, log_config_info, MetricsRecorder},
    preflight::{PmmKeyIssuer, S3AccessCheck, SkipStorageCheck, StorageAccessCheck},
    proxy::ReverseProxy,
    remote::{ClusterConnector, KubeConnector},
    secrets::{open_vault, PhysicalBackend, PostgresBackend, SecretVault},
    services::{ClusterService, CredentialService, Housekeeper, Preflight},
    storage::{create_pool, ClusterRepository, ClusterStore, CredentialRepository, CredentialStore},
    APP_NAME, VERSION,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        // Another provider may already be installed.
        let _ = ring::default_provider().install_default();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    install_rustls_provider();

    // Load .env file if it exists (optional - won't fail if missing)
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let config = AppConfig::from_env().context("loading configuration")?;
    init_observability(&config.observability).await?;
    MetricsRecorder::new().describe();

    info!(app_name = APP_NAME, version = VERSION, "Starting Clusterplane control plane");
    log_config_info(&config);

    let pool = create_pool(&config.database).await.context("connecting to the metadata store")?;

    let physical: Arc<dyn PhysicalBackend> = Arc::new(PostgresBackend::new(pool.clone()));
    let master_key = config.vault.master_key()?;
    let vault: Arc<dyn SecretVault> =
        Arc::new(open_vault(physical, &master_key).await.context("unsealing the secret vault")?);
    drop(master_key);

    let cluster_store: Arc<dyn ClusterStore> = Arc::new(ClusterRepository::new(pool.clone()));
    let credential_store: Arc<dyn CredentialStore> = Arc::new(CredentialRepository::new(pool));
    let connector: Arc<dyn ClusterConnector> =
        Arc::new(KubeConnector::new(vault.clone(), config.remote.clone()));

    let storage_check: Arc<dyn StorageAccessCheck> = if config.preflight.verify_storage_access {
        Arc::new(S3AccessCheck::new(&config.preflight))
    } else {
        warn!("Object storage access checks are disabled");
        Arc::new(SkipStorageCheck)
    };
    let preflight = Preflight {
        storage: storage_check,
        keys: Arc::new(PmmKeyIssuer::new(&config.preflight)?),
    };

    let clusters = ClusterService::new(cluster_store.clone(), vault.clone(), connector.clone());
    let credentials = CredentialService::new(
        credential_store.clone(),
        cluster_store.clone(),
        vault.clone(),
        connector.clone(),
        preflight,
    );
    let proxy = ReverseProxy::new(cluster_store.clone(), connector.clone(), credentials.clone());

    let password = match (config.auth.enabled, config.auth.cluster_name.as_deref()) {
        (true, Some(cluster_name)) => {
            let source = ClusterHashSource::new(cluster_store.clone(), connector.clone(), cluster_name);
            Some(Arc::new(PasswordValidator::new(Arc::new(source), config.auth.hash_ttl())))
        }
        (true, None) => anyhow::bail!("authentication is enabled but no password cluster is configured"),
        (false, _) => {
            warn!("API authentication is disabled");
            None
        }
    };

    let router = build_router(AppState { clusters, credentials, proxy }, password);

    let shutdown = CancellationToken::new();
    let housekeeper = Housekeeper::new(cluster_store, credential_store);
    let housekeeping = tokio::spawn(
        housekeeper.run(config.observability.housekeeping_interval(), shutdown.clone()),
    );

    let server_config = config.server.clone();
    let server_shutdown = shutdown.clone();
    let mut server =
        tokio::spawn(async move { start_api_server(&server_config, router, server_shutdown).await });

    tokio::select! {
        result = &mut server => {
            shutdown.cancel();
            result.context("API server task panicked")??;
            return Ok(());
        }
        signal = signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    }

    match tokio::time::timeout(config.server.shutdown_grace(), server).await {
        Ok(joined) => joined.context("API server task panicked")??,
        Err(_) => warn!("In-flight requests did not drain before the grace period elapsed"),
    }
    if let Err(e) = housekeeping.await {
        error!(error = %e, "Housekeeping task failed");
    }

    info!("Clusterplane stopped");
    Ok(())
}
