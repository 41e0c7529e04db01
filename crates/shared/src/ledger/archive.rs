//! Keeps the history table bounded by relocating old entries to the
//! archive table. Runs opportunistically at session start.

use tracing::info;

use crate::sheets::{Table, layout};

use super::{LedgerError, LedgerService};

impl LedgerService {
    /// Relocates all but the most recent `archive_retain` history rows to
    /// the archive once the table grows past `archive_threshold`, keeping
    /// append order. Returns how many rows moved.
    ///
    /// Holds the history lock for the whole relocation so no append can
    /// interleave with the move-then-delete pair.
    pub async fn archive_history(&self) -> Result<usize, LedgerError> {
        let _history_guard = self.history_lock.lock().await;

        let rows = self.store.read_all_rows(Table::History).await?;
        let data_rows = rows.len().saturating_sub(1);
        if data_rows <= self.archive_threshold {
            return Ok(0);
        }

        let moved = data_rows - self.archive_retain;
        let relocated: Vec<Vec<String>> = rows[1..1 + moved].to_vec();

        self.store.append_rows(Table::Archive, &relocated).await?;
        self.store
            .delete_rows(Table::History, layout::FIRST_DATA_ROW, moved as u32)
            .await?;

        info!(moved, retained = self.archive_retain, "archived history rows");
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::sheets::{LedgerTables, MemorySheets};

    use super::*;

    fn history_row(n: usize) -> Vec<String> {
        vec![
            format!("actor-{n}"),
            "-".to_string(),
            "-".to_string(),
            "GEM 3500".to_string(),
            "150".to_string(),
            "1".to_string(),
            "01.06.2026".to_string(),
            "01.01.2026 09:00".to_string(),
            "Add".to_string(),
        ]
    }

    async fn seeded_service(data_rows: usize) -> (Arc<MemorySheets>, LedgerService) {
        let store = Arc::new(MemorySheets::new());
        let rows: Vec<Vec<String>> = (0..data_rows).map(history_row).collect();
        store
            .append_rows(Table::History, &rows)
            .await
            .expect("seed should succeed");
        let ledger = LedgerService::new(store.clone(), 1000, 100);
        (store, ledger)
    }

    #[tokio::test]
    async fn below_threshold_nothing_moves() {
        let (store, ledger) = seeded_service(1000).await;
        let moved = ledger.archive_history().await.expect("archive should run");
        assert_eq!(moved, 0);
        assert_eq!(store.row_count(Table::History).await, 1001);
        assert_eq!(store.row_count(Table::Archive).await, 1);
    }

    #[tokio::test]
    async fn above_threshold_moves_all_but_the_retained_tail() {
        let (store, ledger) = seeded_service(1001).await;
        let moved = ledger.archive_history().await.expect("archive should run");
        assert_eq!(moved, 901);

        let history = store.rows(Table::History).await;
        let archive = store.rows(Table::Archive).await;
        // Header plus retained tail / header plus relocated rows.
        assert_eq!(history.len(), 101);
        assert_eq!(archive.len(), 902);

        // Order preserved: the archive got the oldest rows, history keeps
        // the newest, and together they are the original set.
        assert_eq!(archive[1][0], "actor-0");
        assert_eq!(archive[901][0], "actor-900");
        assert_eq!(history[1][0], "actor-901");
        assert_eq!(history[100][0], "actor-1000");

        let mut recombined: Vec<String> = archive[1..]
            .iter()
            .chain(history[1..].iter())
            .map(|row| row[0].clone())
            .collect();
        recombined.sort();
        recombined.dedup();
        assert_eq!(recombined.len(), 1001);
    }
}
