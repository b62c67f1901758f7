//! External settlement provider client. Calls are fire-and-forget: they run
//! on a spawned task, at most once, and a failure is logged without ever
//! touching the state transition that triggered them.

use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use tradehub_core::config::SettlementConfig;
use tradehub_core::domain::escrow::EscrowId;
use tradehub_core::domain::transaction::TransactionId;

#[derive(Clone)]
pub struct SettlementClient {
    enabled: bool,
    endpoint: Option<String>,
    api_key: Option<SecretString>,
    client: Client,
    timeout: Duration,
}

impl SettlementClient {
    pub fn from_config(config: &SettlementConfig) -> Self {
        Self {
            enabled: config.enabled,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            client: Client::new(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// A client that never talks to the network. Used in tests and when no
    /// provider is configured.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.endpoint.is_some()
    }

    pub fn notify_release(
        &self,
        transaction_id: &TransactionId,
        escrow_id: &EscrowId,
        amount: Decimal,
        currency: &str,
    ) {
        self.dispatch(
            "escrow.released",
            json!({
                "event": "escrow.released",
                "transaction_id": transaction_id.0,
                "escrow_id": escrow_id.0,
                "amount": amount,
                "currency": currency,
            }),
        );
    }

    pub fn notify_refund(
        &self,
        transaction_id: &TransactionId,
        escrow_id: &EscrowId,
        amount: Decimal,
        currency: &str,
    ) {
        self.dispatch(
            "escrow.refunded",
            json!({
                "event": "escrow.refunded",
                "transaction_id": transaction_id.0,
                "escrow_id": escrow_id.0,
                "amount": amount,
                "currency": currency,
            }),
        );
    }

    fn dispatch(&self, event: &'static str, payload: Value) {
        let endpoint = match (&self.endpoint, self.enabled) {
            (Some(endpoint), true) => endpoint.clone(),
            _ => {
                debug!(
                    event_name = "settlement.dispatch_skipped",
                    settlement_event = event,
                    "settlement provider not configured, skipping dispatch"
                );
                return;
            }
        };

        let client = self.client.clone();
        let api_key = self.api_key.as_ref().map(|key| key.expose_secret().to_string());
        let timeout = self.timeout;

        tokio::spawn(async move {
            let mut request = client.post(&endpoint).timeout(timeout).json(&payload);
            if let Some(api_key) = api_key {
                request = request.bearer_auth(api_key);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(
                        event_name = "settlement.dispatched",
                        settlement_event = event,
                        "settlement provider acknowledged event"
                    );
                }
                Ok(response) => {
                    warn!(
                        event_name = "settlement.dispatch_rejected",
                        settlement_event = event,
                        status = %response.status(),
                        "settlement provider rejected event"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "settlement.dispatch_failed",
                        settlement_event = event,
                        error = %error,
                        "settlement provider call failed"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use tradehub_core::config::SettlementConfig;
    use tradehub_core::domain::escrow::EscrowId;
    use tradehub_core::domain::transaction::TransactionId;

    use super::SettlementClient;

    #[test]
    fn disabled_client_reports_not_enabled() {
        assert!(!SettlementClient::disabled().is_enabled());
    }

    #[test]
    fn enabled_requires_an_endpoint() {
        let client = SettlementClient::from_config(&SettlementConfig {
            enabled: true,
            endpoint: None,
            api_key: None,
            timeout_secs: 5,
        });
        assert!(!client.is_enabled());

        let client = SettlementClient::from_config(&SettlementConfig {
            enabled: true,
            endpoint: Some("https://settle.example/api".to_string()),
            api_key: None,
            timeout_secs: 5,
        });
        assert!(client.is_enabled());
    }

    #[tokio::test]
    async fn disabled_dispatch_is_a_quiet_no_op() {
        let client = SettlementClient::disabled();
        client.notify_release(
            &TransactionId("TXN-1".to_string()),
            &EscrowId("ESC-1".to_string()),
            Decimal::new(100_00, 2),
            "USD",
        );
        client.notify_refund(
            &TransactionId("TXN-1".to_string()),
            &EscrowId("ESC-1".to_string()),
            Decimal::new(100_00, 2),
            "USD",
        );
    }
}
