use std::path::Path;

use crate::{db, models::q};

const INSERT_BATCH_SIZE: usize = 5000;
const COL_COUNT: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Validation(String),
}

/// Import corpus values from a headerless CSV of collection,field,value
/// rows. Inserts are batched in transactions.
pub async fn import_csv(file_path: &Path, db_path: &str) -> Result<(), ImportError> {
    let db = db::init(db_path, 1, false).await?;

    log::info!("importing data from {} ...", file_path.display());

    let file = std::fs::File::open(file_path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(file);

    let mut tx = db.begin().await?;
    let mut n: usize = 0;

    for (i, result) in reader.records().enumerate() {
        let record = result?;

        if record.len() != COL_COUNT {
            return Err(ImportError::Validation(format!(
                "line {}: expected {} columns, got {}",
                i + 1,
                COL_COUNT,
                record.len()
            )));
        }

        let collection = record.get(0).unwrap_or("").trim();
        let field = record.get(1).unwrap_or("").trim();
        let value = record.get(2).unwrap_or("").trim();

        if collection.is_empty() || field.is_empty() || value.is_empty() {
            return Err(ImportError::Validation(format!(
                "line {}: empty column",
                i + 1
            )));
        }

        sqlx::query(&q.insert_value.query)
            .bind(collection)
            .bind(field)
            .bind(value)
            .execute(&mut *tx)
            .await?;

        n += 1;
        if n % INSERT_BATCH_SIZE == 0 {
            tx.commit().await?;
            tx = db.begin().await?;
            log::info!("imported {} values", n);
        }
    }

    tx.commit().await?;
    log::info!("finished importing {} values", n);

    Ok(())
}
