use anyhow::Context;
use b3scan_core::domain::stock::{NewStock, UpsertOutcome};
use b3scan_core::storage::SnapshotStore;
use std::path::Path;

/// Validates every entry first, then upserts them. Returns the number of descriptors written.
pub async fn seed_from_file(store: &dyn SnapshotStore, path: &Path) -> anyhow::Result<usize> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {} failed", path.display()))?;
    seed_from_json(store, &text).await
}

pub async fn seed_from_json(store: &dyn SnapshotStore, text: &str) -> anyhow::Result<usize> {
    let entries: Vec<NewStock> =
        serde_json::from_str(text).context("seed file must be a JSON array of stocks")?;

    let mut stocks = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let stock = entry
            .validate()
            .with_context(|| format!("invalid seed entry at index {idx}"))?;
        stocks.push(stock);
    }

    let mut created: usize = 0;
    for stock in &stocks {
        if store.upsert_stock(stock).await? == UpsertOutcome::Created {
            created += 1;
        }
    }
    tracing::debug!(total = stocks.len(), created, "seeded stocks");
    Ok(stocks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use b3scan_core::storage::memory::MemoryStore;

    #[tokio::test]
    async fn seeds_valid_entries() {
        let store = MemoryStore::new();
        let json = r#"[
            {"ticker": "petr4", "name": "Petrobras", "sector": "Petróleo", "is_state_owned": true},
            {"ticker": "WEGE3", "name": "Weg S.A."}
        ]"#;

        let n = seed_from_json(&store, json).await.unwrap();
        assert_eq!(n, 2);

        let petr = store.find_stock("PETR4").await.unwrap().unwrap();
        assert!(petr.is_state_owned);
        assert_eq!(petr.sector, "Petróleo");
        let wege = store.find_stock("WEGE3").await.unwrap().unwrap();
        assert_eq!(wege.sector, "Unknown");
    }

    #[tokio::test]
    async fn invalid_entry_aborts_before_writing() {
        let store = MemoryStore::new();
        let json = r#"[
            {"ticker": "WEGE3", "name": "Weg S.A."},
            {"ticker": "", "name": "Nameless"}
        ]"#;

        let err = seed_from_json(&store, json).await.unwrap_err();
        assert!(format!("{err:#}").contains("index 1"));
        assert!(store.find_stock("WEGE3").await.unwrap().is_none());
    }
}
