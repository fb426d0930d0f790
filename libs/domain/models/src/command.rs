// [libs/domain/models/src/command.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandStatus {
    Queued,
    Pulled,
    Succeeded,
    Failed,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetStatus {
    Succeeded,
    Failed,
}

/// Un resultado por miner objetivo, reportado en el ACK del edge (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetResult {
    pub miner_id: i64,
    pub status: TargetStatus,
    pub message: String,
    #[serde(default)]
    pub metrics: HashMap<String, Value>,
}

/// Lado-cloud de C7. `command_type` se valida contra
/// `fleetctl_domain_adapters::CommandType` en el límite HTTP, no aquí:
/// este crate es la capa de modelos más baja y no depende de `adapters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command_id: String,
    pub tenant_id: i64,
    pub site_id: i64,
    pub device_id: i64,
    pub command_type: String,
    pub payload: Value,
    pub target_ids: Vec<i64>,
    pub status: CommandStatus,
    pub results: Vec<TargetResult>,
    pub created_at: DateTime<Utc>,
    pub pulled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CommandRecord {
    /// Resuelve el estado final a partir del multiset de resultados por
    /// objetivo: todos `SUCCEEDED` -> `Succeeded`; todos `FAILED` ->
    /// `Failed`; mezcla -> `Partial` (spec §4.7).
    pub fn resolve_status(results: &[TargetResult]) -> CommandStatus {
        if results.is_empty() {
            return CommandStatus::Failed;
        }
        let succeeded = results.iter().filter(|r| r.status == TargetStatus::Succeeded).count();
        if succeeded == results.len() {
            CommandStatus::Succeeded
        } else if succeeded == 0 {
            CommandStatus::Failed
        } else {
            CommandStatus::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: TargetStatus) -> TargetResult {
        TargetResult { miner_id: 1, status, message: String::new(), metrics: HashMap::new() }
    }

    #[test]
    fn all_succeeded_resolves_succeeded() {
        let results = vec![result(TargetStatus::Succeeded), result(TargetStatus::Succeeded)];
        assert_eq!(CommandRecord::resolve_status(&results), CommandStatus::Succeeded);
    }

    #[test]
    fn all_failed_resolves_failed() {
        let results = vec![result(TargetStatus::Failed)];
        assert_eq!(CommandRecord::resolve_status(&results), CommandStatus::Failed);
    }

    #[test]
    fn mixed_resolves_partial() {
        let results = vec![result(TargetStatus::Succeeded), result(TargetStatus::Failed)];
        assert_eq!(CommandRecord::resolve_status(&results), CommandStatus::Partial);
    }
}
