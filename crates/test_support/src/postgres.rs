use anyhow::{Context, Result};
use sqlx::{Connection, PgConnection};
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};
use tokio::time::{Duration, sleep};

use crate::unique_name;

const POSTGRES_PORT: u16 = 5432;
const READY_ATTEMPTS: usize = 20;

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    image: String,
    tag: String,
    user: String,
    password: String,
    db_name: String,
}

impl PostgresConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            image: "postgres".to_string(),
            tag: "17".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            db_name: "postgres".to_string(),
        }
    }

    #[must_use]
    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct PostgresContainer {
    // Dropping the handle stops the container.
    _container: ContainerAsync<GenericImage>,
    host_port: u16,
    config: PostgresConfig,
}

impl PostgresContainer {
    /// Start a Postgres container in `network`.
    ///
    /// # Errors
    /// Returns an error if the container fails to start or the port cannot be resolved.
    pub async fn start_with_config(network: &str, config: PostgresConfig) -> Result<Self> {
        crate::runtime::ensure_container_runtime()?;
        let image = GenericImage::new(&config.image, &config.tag)
            .with_exposed_port(POSTGRES_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_USER", &config.user)
            .with_env_var("POSTGRES_PASSWORD", &config.password)
            .with_env_var("POSTGRES_DB", &config.db_name)
            .with_network(network)
            .with_container_name(unique_name("folio-postgres"));

        let container = image
            .start()
            .await
            .context("Failed to start Postgres container")?;
        let host_port = container
            .get_host_port_ipv4(POSTGRES_PORT.tcp())
            .await
            .context("Failed to resolve Postgres host port")?;

        Ok(Self {
            _container: container,
            host_port,
            config,
        })
    }

    /// DSN with the superuser credentials the container was started with.
    #[must_use]
    pub fn admin_dsn(&self) -> String {
        format!(
            "postgres://{}:{}@127.0.0.1:{}/{}?sslmode=disable",
            self.config.user, self.config.password, self.host_port, self.config.db_name
        )
    }

    /// Retry connecting until Postgres accepts connections, about five seconds.
    ///
    /// # Errors
    /// Returns the last connection error if Postgres never becomes ready.
    pub async fn wait_until_ready(&self) -> Result<()> {
        let dsn = self.admin_dsn();
        let mut last_error = None;
        for _ in 0..READY_ATTEMPTS {
            match PgConnection::connect(&dsn).await {
                Ok(connection) => return connection.close().await.map_err(Into::into),
                Err(err) => last_error = Some(err),
            }
            sleep(Duration::from_millis(250)).await;
        }
        match last_error {
            Some(err) => Err(err).context("Postgres did not become ready"),
            None => Ok(()),
        }
    }
}
