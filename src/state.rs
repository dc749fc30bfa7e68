use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

use crate::analysis::{HttpAnalyzer, MealAnalyzer};
use crate::config::{AppConfig, StoreBackend};
use crate::meals::memory::InMemoryMealStore;
use crate::meals::repo::{MealStore, PgMealStore};
use crate::meals::{NutritionCaches, NutritionService};
use crate::storage::{MemoryStorage, Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service: Arc<NutritionService>,
    /// Present for the Postgres backend; used to run migrations.
    pub db: Option<PgPool>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (store, db): (Arc<dyn MealStore>, Option<PgPool>) = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                (Arc::new(PgMealStore::new(db.clone())), Some(db))
            }
            StoreBackend::Memory => {
                info!("using in-memory meal store");
                (Arc::new(InMemoryMealStore::new()), None)
            }
        };

        // real S3/MinIO when configured
        let storage: Arc<dyn StorageClient> = match &config.storage {
            Some(s) => Arc::new(
                Storage::new(&s.endpoint, &s.bucket, &s.access_key, &s.secret_key, &s.region)
                    .await?,
            ),
            None => {
                info!("MINIO_ENDPOINT not set; keeping photos in memory");
                Arc::new(MemoryStorage::new())
            }
        };

        let analyzer: Arc<dyn MealAnalyzer> = Arc::new(HttpAnalyzer::new(
            config.analyzer.url.clone(),
            config.analyzer.timeout(),
        )?);

        let service = Arc::new(NutritionService::new(
            store,
            analyzer,
            storage,
            NutritionCaches::new(config.cache_ttl()),
            config.analyzer.default_language.clone(),
        ));

        Ok(Self {
            config,
            service,
            db,
        })
    }

    /// Applies the embedded migrations. A failure is fatal: the Postgres store
    /// cannot serve without the `meals` table.
    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        sqlx::migrate!("./migrations")
            .run(db)
            .await
            .context("run database migrations")?;
        info!("database migrations applied");
        Ok(())
    }

    pub fn from_parts(config: Arc<AppConfig>, service: Arc<NutritionService>, db: Option<PgPool>) -> Self {
        Self {
            config,
            service,
            db,
        }
    }

    /// In-memory state for handler tests. The store is returned so tests can seed rows.
    #[cfg(test)]
    pub fn fake() -> (Self, Arc<InMemoryMealStore>) {
        use crate::analysis::MealAnalysis;
        use crate::config::AnalyzerConfig;
        use crate::testing::ScriptedAnalyzer;

        let config = Arc::new(AppConfig {
            store_backend: StoreBackend::Memory,
            database_url: None,
            storage: None,
            analyzer: AnalyzerConfig {
                url: "http://analyzer.invalid/analyze".into(),
                timeout_secs: 5,
                default_language: "en".into(),
            },
            cache_ttl_secs: 300,
        });

        let store = Arc::new(InMemoryMealStore::new());
        let service = Arc::new(NutritionService::new(
            store.clone(),
            Arc::new(ScriptedAnalyzer::returning(MealAnalysis::default())),
            Arc::new(MemoryStorage::new()),
            NutritionCaches::new(config.cache_ttl()),
            "en",
        ));
        (Self::from_parts(config, service, None), store)
    }
}
