//! Circle Iris attestation client.
//!
//! `GET {api}/attestations/0x{keccak256(message)}` answers
//! `{"status": "...", "attestation": "0x..."}`. Only `complete` carries a
//! usable attestation; a 404 means Iris has not seen the burn yet.

use crate::{CircleClient, SettlementError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

#[derive(Debug, Deserialize)]
struct AttestationResponse {
	status: String,
	#[serde(default)]
	attestation: Option<String>,
}

impl AttestationResponse {
	fn into_attestation(self) -> Result<Option<Vec<u8>>, SettlementError> {
		if self.status != "complete" {
			return Ok(None);
		}
		let encoded = self.attestation.ok_or_else(|| {
			SettlementError::Malformed("Complete attestation without signature".to_string())
		})?;
		hex::decode(encoded.trim_start_matches("0x"))
			.map(Some)
			.map_err(|e| SettlementError::Malformed(format!("Bad attestation encoding: {}", e)))
	}
}

#[derive(Debug, Clone)]
pub struct IrisClient {
	client: reqwest::Client,
	api_url: String,
}

impl IrisClient {
	pub fn new(api_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			api_url: api_url.into().trim_end_matches('/').to_string(),
		}
	}

	fn attestation_url(&self, message_hash: &[u8; 32]) -> String {
		format!(
			"{}/attestations/0x{}",
			self.api_url,
			hex::encode(message_hash)
		)
	}
}

#[async_trait]
impl CircleClient for IrisClient {
	async fn get_attestation(
		&self,
		message_hash: &[u8; 32],
	) -> Result<Option<Vec<u8>>, SettlementError> {
		let url = self.attestation_url(message_hash);
		trace!(url, "Iris request");

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| SettlementError::Network(e.to_string()))?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(None);
		}
		if !response.status().is_success() {
			return Err(SettlementError::Network(format!(
				"Iris returned {}",
				response.status()
			)));
		}

		response
			.json::<AttestationResponse>()
			.await
			.map_err(|e| SettlementError::Malformed(e.to_string()))?
			.into_attestation()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(json: &str) -> Result<Option<Vec<u8>>, SettlementError> {
		serde_json::from_str::<AttestationResponse>(json)
			.unwrap()
			.into_attestation()
	}

	#[test]
	fn test_complete_attestation() {
		let attestation = parse(r#"{"status":"complete","attestation":"0xdeadbeef"}"#).unwrap();
		assert_eq!(attestation, Some(vec![0xde, 0xad, 0xbe, 0xef]));
	}

	#[test]
	fn test_pending_attestation() {
		assert_eq!(
			parse(r#"{"status":"pending_confirmations","attestation":"PENDING"}"#).unwrap(),
			None
		);
		assert_eq!(parse(r#"{"status":"pending_confirmations"}"#).unwrap(), None);
	}

	#[test]
	fn test_complete_without_signature_is_malformed() {
		assert!(matches!(
			parse(r#"{"status":"complete","attestation":"zz"}"#),
			Err(SettlementError::Malformed(_))
		));
		assert!(matches!(
			parse(r#"{"status":"complete"}"#),
			Err(SettlementError::Malformed(_))
		));
	}

	#[test]
	fn test_attestation_url() {
		let client = IrisClient::new("https://iris-api.circle.com/");
		assert_eq!(
			client.attestation_url(&[0xab; 32]),
			format!("https://iris-api.circle.com/attestations/0x{}", "ab".repeat(32))
		);
	}
}
