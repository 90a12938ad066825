//! PostgreSQL test database backed by Testcontainers.
//!
//! Each [`TestDatabase`] starts a fresh container with all migrations
//! applied. Keep the value alive for the duration of the test.

use clusterplane::config::DatabaseConfig;
use clusterplane::storage::{create_pool, DbPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

/// Remove containers left behind by earlier runs. Async drop does not
/// complete once the runtime shuts down, so they accumulate otherwise.
fn cleanup_stale_testcontainers() {
    use std::process::Command;

    static CLEANUP_ONCE: std::sync::Once = std::sync::Once::new();
    CLEANUP_ONCE.call_once(|| {
        let output = Command::new("docker")
            .args([
                "ps",
                "-q",
                "--filter",
                "label=org.testcontainers.managed-by=testcontainers",
                "--filter",
                "ancestor=postgres",
            ])
            .output();

        let ids = match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
            _ => return,
        };
        let ids: Vec<&str> = ids.lines().filter(|line| !line.is_empty()).collect();
        if ids.is_empty() {
            return;
        }

        eprintln!("[postgres] removing {} stale container(s)", ids.len());
        let mut rm_args = vec!["rm", "-f"];
        rm_args.extend(&ids);
        let _ = Command::new("docker").args(&rm_args).output();
    });
}

pub struct TestDatabase {
    pub pool: DbPool,
    _container: ContainerAsync<Postgres>,
}

impl TestDatabase {
    pub async fn new(prefix: &str) -> Self {
        cleanup_stale_testcontainers();

        let container = Postgres::default().start().await.unwrap_or_else(|e| {
            panic!("Failed to start PostgreSQL container for {}: {}", prefix, e)
        });
        let host = container
            .get_host()
            .await
            .unwrap_or_else(|e| panic!("Failed to get container host for {}: {}", prefix, e));
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .unwrap_or_else(|e| panic!("Failed to get container port for {}: {}", prefix, e));

        let config = DatabaseConfig {
            url: format!("postgresql://postgres:postgres@{}:{}/postgres", host, port),
            auto_migrate: true,
            max_connections: 5,
            min_connections: 1,
            ..Default::default()
        };
        let pool = create_pool(&config)
            .await
            .unwrap_or_else(|e| panic!("Failed to create test pool for {}: {}", prefix, e));

        Self { pool, _container: container }
    }
}
