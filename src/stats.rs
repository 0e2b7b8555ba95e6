//! Database statistics and health overview.
//!
//! Provides a quick summary of what's indexed: document and chunk counts,
//! the collection's pinned model version, and a per-source-type
//! breakdown. Used by `rag stats` to confirm ingestion worked.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

struct SourceStats {
    source_type: String,
    doc_count: i64,
    chunk_count: i64,
}

/// Run the stats command: query the database and print a summary.
///
/// Fails if the database file does not exist; connecting would silently
/// create an empty one and report zero documents for a mistyped path.
pub async fn run_stats(config: &Config) -> Result<()> {
    if !config.db.path.exists() {
        anyhow::bail!(
            "database not found at {} (run `rag init` first)",
            config.db.path.display()
        );
    }
    let pool = db::connect(&config.db.path).await?;

    let total_docs: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(&config.collection)
            .fetch_one(&pool)
            .await?;

    let total_chunks: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM index_entries WHERE collection = ?")
            .bind(&config.collection)
            .fetch_one(&pool)
            .await?;

    let version: Option<(String, i64)> = sqlx::query_as(
        "SELECT model_version, dims FROM collections WHERE name = ?",
    )
    .bind(&config.collection)
    .fetch_optional(&pool)
    .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Ragline — Collection Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", config.collection);
    match version {
        Some((model, dims)) => println!("  Model:       {} ({} dims)", model, dims),
        None => println!("  Model:       (no entries yet)"),
    }
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Chunks:      {}", total_chunks);

    let source_rows = sqlx::query(
        r#"
        SELECT
            d.source_type,
            COUNT(DISTINCT d.id) AS doc_count,
            COUNT(e.chunk_id) AS chunk_count
        FROM documents d
        LEFT JOIN index_entries e ON e.document_id = d.id
        WHERE d.collection = ?
        GROUP BY d.source_type
        ORDER BY doc_count DESC
        "#,
    )
    .bind(&config.collection)
    .fetch_all(&pool)
    .await?;

    if !source_rows.is_empty() {
        println!();
        println!("  By source type:");
        for row in &source_rows {
            let stats = SourceStats {
                source_type: row.get("source_type"),
                doc_count: row.get("doc_count"),
                chunk_count: row.get("chunk_count"),
            };
            println!(
                "    {:<8} {} documents, {} chunks",
                stats.source_type, stats.doc_count, stats.chunk_count
            );
        }
    }

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GiB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KiB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
