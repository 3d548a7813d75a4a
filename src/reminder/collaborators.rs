//! Outbound capabilities the engine calls but does not own.
//!
//! [`PlatformNotifier`] is the live alert surface, [`FamilyAlert`] escalates
//! missed doses, and [`AlarmSound`] is the audible dose alarm. Each has a
//! concrete implementation suitable for the command-line host.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FamilyAlertConfig;

/// Platform notification permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; may be requested.
    Default,
}

/// A live alert handed to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformAlert {
    pub title: String,
    pub body: String,
    /// Alerts sharing a tag replace each other on the platform surface.
    pub tag: String,
    pub require_interaction: bool,
}

/// Live platform alert surface (desktop notifications, push, ...).
#[async_trait]
pub trait PlatformNotifier: Send + Sync {
    fn permission(&self) -> Permission;
    async fn request_permission(&self) -> Permission;
    async fn show(&self, alert: &PlatformAlert) -> Result<()>;
}

/// Escalation channel for missed doses.
#[async_trait]
pub trait FamilyAlert: Send + Sync {
    async fn send_missed_dose_alert(
        &self,
        user_id: &str,
        medicine_name: &str,
        time: &str,
    ) -> Result<()>;
}

/// Audible dose alarm.
pub trait AlarmSound: Send + Sync {
    fn play(&self);
}

/// Notifier for headless hosts: every alert becomes a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl PlatformNotifier for LogNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn show(&self, alert: &PlatformAlert) -> Result<()> {
        tracing::info!(
            tag = %alert.tag,
            require_interaction = alert.require_interaction,
            title = %alert.title,
            "{}",
            alert.body
        );
        Ok(())
    }
}

/// Posts missed-dose alerts as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpFamilyAlert {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFamilyAlert {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// JSON body sent to the family-alert endpoint.
pub fn missed_dose_payload(user_id: &str, medicine_name: &str, time: &str) -> serde_json::Value {
    serde_json::json!({
        "userId": user_id,
        "medicineName": medicine_name,
        "time": time,
    })
}

#[async_trait]
impl FamilyAlert for HttpFamilyAlert {
    async fn send_missed_dose_alert(
        &self,
        user_id: &str,
        medicine_name: &str,
        time: &str,
    ) -> Result<()> {
        let body = missed_dose_payload(user_id, medicine_name, time);
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {}", self.endpoint))?;

        anyhow::ensure!(
            response.status().is_success(),
            "family alert failed with HTTP {}",
            response.status()
        );
        Ok(())
    }
}

/// Used when no family-alert endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFamilyAlert;

#[async_trait]
impl FamilyAlert for NoopFamilyAlert {
    async fn send_missed_dose_alert(
        &self,
        user_id: &str,
        medicine_name: &str,
        time: &str,
    ) -> Result<()> {
        tracing::info!(
            user_id = %user_id,
            medicine = %medicine_name,
            time = %time,
            "missed dose (no family alert endpoint configured)"
        );
        Ok(())
    }
}

/// Build the family-alert collaborator from config.
pub fn create_family_alert(config: &FamilyAlertConfig) -> Result<Arc<dyn FamilyAlert>> {
    match config.endpoint.as_deref() {
        Some(endpoint) => {
            let alert = HttpFamilyAlert::new(endpoint, Duration::from_secs(config.timeout_secs))?;
            Ok(Arc::new(alert))
        }
        None => Ok(Arc::new(NoopFamilyAlert)),
    }
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalAlarm;

impl AlarmSound for TerminalAlarm {
    fn play(&self) {
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            tracing::debug!(error = %e, "alarm bell failed");
        }
    }
}

/// No audible alarm.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAlarm;

impl AlarmSound for SilentAlarm {
    fn play(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_camel_case_keys() {
        let body = missed_dose_payload("u1", "Aspirin", "09:00");
        assert_eq!(body["userId"], "u1");
        assert_eq!(body["medicineName"], "Aspirin");
        assert_eq!(body["time"], "09:00");
    }

    #[test]
    fn config_without_endpoint_builds_noop() {
        let config = FamilyAlertConfig::default();
        assert!(create_family_alert(&config).is_ok());
    }

    #[test]
    fn http_alert_keeps_endpoint() {
        let alert = HttpFamilyAlert::new("http://127.0.0.1:9/alert", Duration::from_secs(1)).unwrap();
        assert_eq!(alert.endpoint(), "http://127.0.0.1:9/alert");
    }

    #[tokio::test]
    async fn http_alert_errors_when_unreachable() {
        // Port 9 (discard) is closed on test machines; connect fails fast.
        let alert =
            HttpFamilyAlert::new("http://127.0.0.1:9/alert", Duration::from_millis(500)).unwrap();
        assert!(alert.send_missed_dose_alert("u1", "Aspirin", "09:00").await.is_err());
    }
}
