use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::models::{q, schema, CorpusStats};
use crate::source::{CorpusSource, SourceError};
use crate::suggest::FieldKey;

/// Install database schema.
pub async fn install_schema(db_path: &str, prompt: bool) -> Result<(), Box<dyn std::error::Error>> {
    if prompt {
        println!("\n** Initialize new database at '{}'? **\n", db_path);
        print!("continue (y/n)?  ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        if input.trim().to_lowercase() != "y" {
            println!("install cancelled");
            return Ok(());
        }
    }

    // Create new database.
    let db = init(db_path, 1, false).await?;

    sqlx::raw_sql(&schema.schema.query).execute(&db).await?;

    log::info!("successfully installed schema");
    Ok(())
}

/// Check if the DB file exists and exit with error message if not.
pub fn exists(path: &PathBuf) {
    if !path.exists() {
        log::error!(
            "database '{}' not found. Run `install` to create a new one.",
            path.display()
        );
        std::process::exit(1);
    }
}

/// Create a SQLite connection pool.
pub async fn init(
    db_path: &str,
    max_conns: u32,
    read_only: bool,
) -> Result<SqlitePool, sqlx::Error> {
    let mode = if read_only { "ro" } else { "rwc" };
    let db = SqlitePoolOptions::new()
        .max_connections(max_conns)
        .connect(&format!("sqlite://{}?mode={}", db_path, mode))
        .await?;

    // Apply SQLite DB pragmas.
    sqlx::raw_sql(&schema.pragma.query).execute(&db).await?;

    Ok(db)
}

/// Record one raw value entered into a (collection, field) pair.
pub async fn record_value(
    db: &SqlitePool,
    key: &FieldKey,
    value: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(&q.insert_value.query)
        .bind(&key.collection)
        .bind(&key.field)
        .bind(value)
        .execute(db)
        .await?;
    Ok(())
}

/// All (collection, field) pairs present in the corpus.
pub async fn distinct_keys(db: &SqlitePool) -> Result<Vec<FieldKey>, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(&q.distinct_keys.query).fetch_all(db).await?;
    Ok(rows.into_iter().map(|(c, f)| FieldKey::new(c, f)).collect())
}

/// Corpus-wide counters for the stats API.
pub async fn corpus_stats(db: &SqlitePool) -> Result<CorpusStats, sqlx::Error> {
    sqlx::query_as(&q.corpus_stats.query).fetch_one(db).await
}

/// Corpus source backed by the field_values table.
pub struct SqliteCorpus {
    db: SqlitePool,
}

impl SqliteCorpus {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CorpusSource for SqliteCorpus {
    async fn fetch_raw_values(&self, key: &FieldKey) -> Result<Vec<String>, SourceError> {
        let rows: Vec<(String,)> = sqlx::query_as(&q.fetch_values.query)
            .bind(&key.collection)
            .bind(&key.field)
            .fetch_all(&self.db)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().map(|(v,)| v).collect())
    }
}
