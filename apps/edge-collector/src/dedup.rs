// [apps/edge-collector/src/dedup.rs]
/*!
 * Deduplicador de comandos ya ejecutados, respaldado por un archivo JSON
 * (spec §4.7). El edge es el único garante de "exactly-once" del lado de
 * ejecución: el cloud puede reentregar un comando `PULLED` tras un corte
 * de red antes del ACK, y este conjunto evita una segunda ejecución física.
 *
 * Tope de 1000 entradas, recorte de las más antiguas primero -- igual que
 * el original de Python. La E/S de archivo es síncrona (poco frecuente,
 * fuera de la ruta caliente del poll) y se despacha vía `spawn_blocking`
 * para no bloquear el runtime async.
 */

use std::collections::HashSet;
use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::warn;

const MAX_ENTRIES: usize = 1000;

pub struct CommandDeduplicator {
    path: PathBuf,
    executed: Mutex<Vec<String>>,
}

impl CommandDeduplicator {
    /// Carga el conjunto persistido en `path`, o arranca vacío si el
    /// archivo no existe o está corrupto (nunca falla la ignición por esto).
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let read_path = path.clone();
        let executed = tokio::task::spawn_blocking(move || read_entries(&read_path))
            .await
            .unwrap_or_default();
        Self { path, executed: Mutex::new(executed) }
    }

    pub async fn is_executed(&self, command_id: &str) -> bool {
        self.executed.lock().await.iter().any(|id| id == command_id)
    }

    /// Registra `command_id` como ejecutado y persiste el conjunto,
    /// recortando las entradas más antiguas si se excede `MAX_ENTRIES`.
    pub async fn mark_executed(&self, command_id: String) {
        let mut guard = self.executed.lock().await;
        if guard.iter().any(|id| id == &command_id) {
            return;
        }
        guard.push(command_id);
        if guard.len() > MAX_ENTRIES {
            let overflow = guard.len() - MAX_ENTRIES;
            guard.drain(0..overflow);
        }

        let snapshot = guard.clone();
        let path = self.path.clone();
        drop(guard);

        if let Err(err) = tokio::task::spawn_blocking(move || write_entries(&path, &snapshot)).await {
            warn!(error = %err, "dedup persistence task panicked");
        }
    }
}

fn read_entries(path: &std::path::Path) -> Vec<String> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(&contents) {
        Ok(entries) => {
            let mut seen = HashSet::with_capacity(entries.len());
            entries.into_iter().filter(|id| seen.insert(id.clone())).collect()
        }
        Err(_) => Vec::new(),
    }
}

fn write_entries(path: &std::path::Path, entries: &[String]) -> std::io::Result<()> {
    let serialized = serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string());
    std::fs::write(path, serialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_store_has_no_executed_commands() {
        let dir = tempfile::tempdir().unwrap();
        let dedup = CommandDeduplicator::load(dir.path().join("dedup.json")).await;
        assert!(!dedup.is_executed("cmd-1").await);
    }

    #[tokio::test]
    async fn marked_command_is_reported_executed_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dedup.json");

        let dedup = CommandDeduplicator::load(&path).await;
        dedup.mark_executed("cmd-1".to_string()).await;
        assert!(dedup.is_executed("cmd-1").await);

        let reloaded = CommandDeduplicator::load(&path).await;
        assert!(reloaded.is_executed("cmd-1").await);
    }

    #[tokio::test]
    async fn caps_at_max_entries_dropping_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let dedup = CommandDeduplicator::load(dir.path().join("dedup.json")).await;

        for i in 0..(MAX_ENTRIES + 5) {
            dedup.mark_executed(format!("cmd-{i}")).await;
        }

        assert!(!dedup.is_executed("cmd-0").await);
        assert!(dedup.is_executed(&format!("cmd-{}", MAX_ENTRIES + 4)).await);
    }
}
