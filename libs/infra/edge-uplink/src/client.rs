// [libs/infra/edge-uplink/src/client.rs]
/*!
 * =================================================================
 * APARATO: UPLINK SOBERANO DEL RUNTIME DE BORDE (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: NEGOCIACIÓN HTTPS ENTRE EL EDGE Y EL PLANO DE CONTROL
 * =================================================================
 */

use crate::errors::UplinkError;
use crate::wire::{
    CommandAckRequest, CommandAckResponse, CommandPollResponse, DevicePubkeyResponse, EdgeAckRequest,
    EdgeAckResponse, EdgeSecretsResponse, EdgeStatusResponse, HeartbeatResponse, ScanClaimRequest,
    ScanClaimResponse, ScanProgressReport, ScanResultsReport,
};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::instrument;

const DEVICE_ID_HEADER: &str = "X-Edge-Device-ID";

pub struct EdgeUplinkClient {
    network_session_client: Client,
    control_plane_base_url: String,
    device_id: i64,
}

impl EdgeUplinkClient {
    pub fn new(base_url: String, device_token: String, device_id: i64) -> Self {
        let mut header_map = reqwest::header::HeaderMap::new();
        let auth_value = reqwest::header::HeaderValue::from_str(&format!("Bearer {device_token}"))
            .expect("device_token must be a valid header value");
        header_map.insert(reqwest::header::AUTHORIZATION, auth_value);
        header_map.insert(
            DEVICE_ID_HEADER,
            reqwest::header::HeaderValue::from_str(&device_id.to_string()).expect("device_id is numeric"),
        );

        Self {
            network_session_client: Client::builder()
                .default_headers(header_map)
                .user_agent("fleetctl-edge-collector/1.0")
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("FATAL: reqwest client initialization failed"),
            control_plane_base_url: base_url.trim_end_matches('/').to_string(),
            device_id,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UplinkError> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if let Some(required) = body.get("required_level").and_then(Value::as_i64) {
                    return Err(UplinkError::CapabilityDenied {
                        reason: body.get("error").and_then(Value::as_str).unwrap_or("denied").to_string(),
                        required_level: Some(required as i32),
                        miner_level: body.get("miner_level").and_then(Value::as_i64).map(|v| v as i32),
                    });
                }
                Err(UplinkError::Unauthorized)
            }
            status => Err(UplinkError::ServerRejection(format!("HTTP_{status}"))),
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch_device_pubkey(&self) -> Result<DevicePubkeyResponse, UplinkError> {
        let url = format!("{}/devices/{}/pubkey", self.control_plane_base_url, self.device_id);
        let response = self.network_session_client.get(&url).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    #[instrument(skip(self))]
    pub async fn send_heartbeat(&self) -> Result<HeartbeatResponse, UplinkError> {
        let url = format!("{}/devices/{}/heartbeat", self.control_plane_base_url, self.device_id);
        let response = self.network_session_client.post(&url).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    #[instrument(skip(self))]
    pub async fn pull_secrets(&self, site_id: i64, since_counter: i64) -> Result<EdgeSecretsResponse, UplinkError> {
        let url = format!(
            "{}/edge/secrets?since_counter={}&site_id={}",
            self.control_plane_base_url, since_counter, site_id
        );
        let response = self.network_session_client.get(&url).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    /// Devuelve `Err(CapabilityDenied)` cuando el nivel del miner no
    /// alcanza `CONTROL` (spec §8, escenario 3) — el caller decide cómo
    /// degradar (p. ej. omitir el miner del lote).
    #[instrument(skip(self))]
    pub async fn pull_single_secret(&self, miner_id: i64) -> Result<Value, UplinkError> {
        let url = format!("{}/edge/secrets/{}", self.control_plane_base_url, miner_id);
        let response = self.network_session_client.get(&url).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    #[instrument(skip(self))]
    pub async fn fetch_status(&self) -> Result<EdgeStatusResponse, UplinkError> {
        let url = format!("{}/edge/status", self.control_plane_base_url);
        let response = self.network_session_client.get(&url).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    #[instrument(skip(self, request))]
    pub async fn ack_secret_receipts(&self, request: &EdgeAckRequest) -> Result<EdgeAckResponse, UplinkError> {
        let url = format!("{}/edge/ack", self.control_plane_base_url);
        let response = self.network_session_client.post(&url).json(request).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    #[instrument(skip(self))]
    pub async fn poll_commands(&self, site_id: i64, limit: i64) -> Result<CommandPollResponse, UplinkError> {
        let url = format!(
            "{}/edge/v1/commands/poll?site_id={}&limit={}",
            self.control_plane_base_url, site_id, limit
        );
        let response = self.network_session_client.get(&url).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    #[instrument(skip(self, request))]
    pub async fn ack_command(&self, command_id: &str, request: &CommandAckRequest) -> Result<CommandAckResponse, UplinkError> {
        let url = format!("{}/edge/v1/commands/{}/ack", self.control_plane_base_url, command_id);
        let response = self.network_session_client.post(&url).json(request).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    /// Reclama el siguiente job de escaneo `PENDING` del sitio (spec
    /// §4.3: "picked up by an edge"). `scan_job` viene `None` cuando no
    /// hay nada pendiente -- no es un error.
    #[instrument(skip(self, request))]
    pub async fn claim_scan(&self, request: &ScanClaimRequest) -> Result<ScanClaimResponse, UplinkError> {
        let url = format!("{}/edge/scan", self.control_plane_base_url);
        let response = self.network_session_client.post(&url).json(request).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    #[instrument(skip(self, progress))]
    pub async fn report_scan_progress(&self, scan_job_id: &str, progress: &ScanProgressReport) -> Result<(), UplinkError> {
        let url = format!("{}/edge/scan/{}/progress", self.control_plane_base_url, scan_job_id);
        let response = self.network_session_client.post(&url).json(progress).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self, results))]
    pub async fn report_scan_results(&self, scan_job_id: &str, results: &ScanResultsReport) -> Result<(), UplinkError> {
        let url = format!("{}/edge/scan/{}/results", self.control_plane_base_url, scan_job_id);
        let response = self.network_session_client.post(&url).json(results).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let client = EdgeUplinkClient::new("https://control.example.com/".to_string(), "tok".to_string(), 1);
        assert_eq!(client.control_plane_base_url, "https://control.example.com");
    }

    #[tokio::test]
    async fn unreachable_host_surfaces_network_fault() {
        let client = EdgeUplinkClient::new("http://127.0.0.1:1".to_string(), "tok".to_string(), 1);
        let result = client.fetch_status().await;
        assert!(matches!(result, Err(UplinkError::NetworkFault(_))));
    }
}
