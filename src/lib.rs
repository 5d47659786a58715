pub mod batch;
pub mod bulk;
pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;

pub use batch::{BatchFile, batch_ranges, write_batches};
pub use bulk::{BatchSink, LoadSummary, bulk_load, load_batches};
pub use config::{DatabaseConfig, LoaderConfig};
pub use error::{BatchError, BulkLoadError, ConfigError, LoadError, PipelineError};
pub use loader::{LoadOptions, LoadedTable, Table, load_table};
pub use pipeline::{RunSummary, SplitOutcome, run, run_with_sink};

pub mod test_support {
    pub use self::database::{TestDatabase, TestDatabaseError};

    pub mod database {
        use log::LevelFilter;
        use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use sqlx::{ConnectOptions, PgPool};
        use testcontainers::core::error::TestcontainersError;
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{ContainerAsync, runners::AsyncRunner};
        use thiserror::Error;
        use uuid::Uuid;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Scratch database inside a disposable Postgres container.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            options: PgConnectOptions,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Start a container and create a uniquely named database in it.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let admin_options: PgConnectOptions = admin_url.parse()?;
                let admin_options = admin_options.log_statements(LevelFilter::Off);

                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let database_name = format!("loader_{}", Uuid::new_v4().simple());
                sqlx::query(&format!("CREATE DATABASE \"{}\" TEMPLATE template0", database_name))
                    .execute(&admin_pool)
                    .await?;
                admin_pool.close().await;

                let options = admin_options.database(&database_name);
                let pool = PgPoolOptions::new()
                    .max_connections(2)
                    .connect_with(options.clone())
                    .await?;

                Ok(Self {
                    pool: Some(pool),
                    options,
                    container: Some(container),
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Options pointing at the scratch database, for code that opens its own connection.
            pub fn connect_options(&self) -> &PgConnectOptions {
                &self.options
            }

            /// Close the pool and stop the container.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }
                if let Some(container) = self.container.take() {
                    container.stop().await?;
                }
                Ok(())
            }
        }
    }
}
