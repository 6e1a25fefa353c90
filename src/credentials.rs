//! Ephemeral realtime credential minting
//!
//! Clients never receive a long-lived provider key. The gateway mints a
//! short-lived client secret with the upstream realtime API and hands that
//! to the browser instead.

use serde::{Deserialize, Serialize};

use crate::config::CredentialConfig;
use crate::{Error, Result};

const REALTIME_SECRETS_URL: &str = "https://api.openai.com/v1/realtime/client_secrets";

/// Maximum mint attempts before giving up
const MAX_RETRIES: u32 = 3;

/// Backoff unit between attempts
const RETRY_BACKOFF_MS: u64 = 250;

/// A minted ephemeral credential, forwarded verbatim to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EphemeralCredential {
    /// Upstream session identifier
    pub id: String,
    /// The short-lived client secret
    pub client_secret: ClientSecret,
}

/// Short-lived client secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSecret {
    /// Secret value
    pub value: String,
    /// Expiry (unix seconds)
    pub expires_at: i64,
}

/// Session parameters sent with a mint request
#[derive(Debug, Serialize)]
struct MintRequest<'a> {
    session: MintSession<'a>,
}

#[derive(Debug, Serialize)]
struct MintSession<'a> {
    model: &'a str,
    voice: &'a str,
    instructions: &'a str,
    modalities: [&'a str; 2],
    input_audio_format: &'a str,
    output_audio_format: &'a str,
    turn_detection: TurnDetection<'a>,
}

#[derive(Debug, Serialize)]
struct TurnDetection<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

/// Mints ephemeral realtime credentials with the upstream provider
pub struct CredentialMinter {
    client: reqwest::Client,
    config: CredentialConfig,
}

impl CredentialMinter {
    /// Create a minter over the given configuration
    #[must_use]
    pub fn new(config: CredentialConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Mint an ephemeral credential, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured or every attempt fails.
    pub async fn mint(&self) -> Result<EphemeralCredential> {
        let Some(api_key) = self.config.openai_api_key.as_deref() else {
            return Err(Error::Credential(
                "OPENAI_API_KEY is required to mint ephemeral credentials".to_string(),
            ));
        };

        let request = MintRequest {
            session: MintSession {
                model: &self.config.realtime_model,
                voice: "alloy",
                instructions: "You are a multimodal assistant with persistent visual memory. \
                               You can see the user's screen and camera.",
                modalities: ["text", "audio"],
                input_audio_format: "pcm16",
                output_audio_format: "pcm16",
                turn_detection: TurnDetection { kind: "server_vad" },
            },
        };

        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            match self.attempt_mint(api_key, &request).await {
                Ok(credential) => return Ok(credential),
                Err(e) => {
                    tracing::error!(error = %e, attempt, "ephemeral credential mint failed");
                    last_error = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        let backoff = RETRY_BACKOFF_MS * u64::from(attempt + 1);
                        tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Credential("unable to mint credential".to_string())))
    }

    async fn attempt_mint(
        &self,
        api_key: &str,
        request: &MintRequest<'_>,
    ) -> Result<EphemeralCredential> {
        let response = self
            .client
            .post(REALTIME_SECRETS_URL)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Credential(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Credential(format!(
                "mint rejected: {status} {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Credential(format!("parse error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let minter = CredentialMinter::new(CredentialConfig {
            openai_api_key: None,
            realtime_model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
        });

        let result = minter.mint().await;
        assert!(matches!(result, Err(Error::Credential(_))));
    }

    #[test]
    fn credential_round_trips_through_json() {
        let raw = r#"{"id":"sess_1","client_secret":{"value":"ek_abc","expires_at":1730000000}}"#;
        let parsed: EphemeralCredential = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.id, "sess_1");
        assert_eq!(parsed.client_secret.value, "ek_abc");

        let encoded = serde_json::to_string(&parsed).unwrap();
        assert!(encoded.contains("ek_abc"));
    }
}
