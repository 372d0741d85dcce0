// src/db.rs

use anyhow::{Context, Result};
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use log::{debug, info, warn};
use std::time::Duration;
use tokio_postgres::{Config, NoTls};

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

const CACHE_TABLE_DDL: &str = "
    CREATE TABLE IF NOT EXISTS enrichment_cache (
        cache_key       TEXT PRIMARY KEY,
        domain          TEXT NOT NULL,
        provider        TEXT NOT NULL,
        enrichment_type TEXT NOT NULL,
        company_name    TEXT,
        profile         JSONB NOT NULL DEFAULT '{}'::jsonb,
        success         BOOLEAN NOT NULL,
        error_message   TEXT,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        accessed_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
        access_count    BIGINT NOT NULL DEFAULT 1
    );
    CREATE INDEX IF NOT EXISTS enrichment_cache_domain_idx ON enrichment_cache (domain);
";

/// Reads environment variables and constructs a PostgreSQL config.
fn build_pg_config() -> Config {
    let mut config = Config::new();
    let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("POSTGRES_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(5432);
    let dbname = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "crm_cleaner".to_string());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();

    info!(
        "DB Config: Host={}, Port={}, DB={}, User={}",
        host, port, dbname, user
    );
    config
        .host(&host)
        .port(port)
        .dbname(&dbname)
        .user(&user)
        .password(&password);
    config.application_name("crm_cleaner_cache");
    config.connect_timeout(Duration::from_secs(10));
    config
}

/// Initializes the connection pool backing the persistent enrichment cache.
pub async fn connect() -> Result<PgPool> {
    let config = build_pg_config();
    info!("Connecting to PostgreSQL enrichment cache...");
    let manager = PostgresConnectionManager::new(config, NoTls);

    // Enrichment is sequential; a small pool is plenty.
    let pool = Pool::builder()
        .max_size(4)
        .min_idle(Some(1))
        .idle_timeout(Some(Duration::from_secs(180)))
        .connection_timeout(Duration::from_secs(15))
        .build(manager)
        .await
        .context("Failed to build database connection pool")?;

    let conn = pool
        .get()
        .await
        .context("Failed to get test connection from pool")?;
    conn.query_one("SELECT 1", &[])
        .await
        .context("Test query 'SELECT 1' failed")?;
    drop(conn);
    info!("Database connection pool initialized successfully.");
    Ok(pool)
}

/// Creates the `enrichment_cache` table if it does not exist yet.
pub async fn ensure_cache_schema(pool: &PgPool) -> Result<()> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for ensure_cache_schema")?;
    conn.batch_execute(CACHE_TABLE_DDL)
        .await
        .context("Failed to create enrichment_cache table")?;
    debug!("enrichment_cache schema ensured");
    Ok(())
}

fn is_secret(key: &str) -> bool {
    ["_KEY", "_TOKEN", "_PASSWORD"]
        .iter()
        .any(|suffix| key.ends_with(suffix))
}

/// Loads environment variables from a .env file. Variables already set in the
/// process environment win. A missing file is not an error.
///
/// # Safety
///
/// Writes the process environment with `std::env::set_var`. Call it at
/// start-up, before any other thread (including a multi-threaded tokio
/// runtime) is spawned; concurrent environment reads are undefined behaviour.
pub unsafe fn load_env_from_file(file_path: &str) -> Result<()> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    info!(
        "Attempting to load environment variables from: {}",
        file_path
    );
    let file = match File::open(file_path) {
        Ok(file) => file,
        Err(e) => {
            warn!(
                "Could not open env file '{}': {}. Proceeding with system environment variables.",
                file_path, e
            );
            return Ok(());
        }
    };

    for line in BufReader::new(file).lines() {
        let line = line.context("Failed to read line from env file")?;
        let line = line.trim();
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().trim_start_matches("export ").trim();
        let value = value.trim().trim_matches('"');
        if std::env::var(key).is_err() {
            // SAFETY: the caller upholds this function's contract that no
            // other thread is running.
            unsafe { std::env::set_var(key, value) };
            debug!(
                "Set env var from file: {} = {}",
                key,
                if is_secret(key) { "[hidden]" } else { value }
            );
        }
    }
    info!("Successfully processed env file: {}", file_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_keys_are_detected() {
        assert!(is_secret("OPENAI_API_KEY"));
        assert!(is_secret("POSTGRES_PASSWORD"));
        assert!(is_secret("CLOUDFLARE_API_TOKEN"));
        assert!(!is_secret("POSTGRES_HOST"));
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        assert!(unsafe { load_env_from_file("/definitely/not/here/.env") }.is_ok());
    }

    #[test]
    fn env_file_values_do_not_override_existing() {
        let dir = std::env::temp_dir().join(format!("crm_cleaner_env_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        std::fs::write(
            &path,
            "# comment\nCRM_CLEANER_TEST_FRESH=\"from-file\"\nexport CRM_CLEANER_TEST_SET=from-file\n",
        )
        .unwrap();
        unsafe { std::env::set_var("CRM_CLEANER_TEST_SET", "already") };

        unsafe { load_env_from_file(path.to_str().unwrap()) }.unwrap();

        assert_eq!(std::env::var("CRM_CLEANER_TEST_FRESH").unwrap(), "from-file");
        assert_eq!(std::env::var("CRM_CLEANER_TEST_SET").unwrap(), "already");
        std::fs::remove_dir_all(&dir).ok();
    }
}
