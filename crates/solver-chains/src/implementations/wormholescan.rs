//! Wormholescan REST client.
//!
//! Signed VAAs are served under `/api/v1/vaas/{chain}/{emitter}[/{sequence}]`
//! with the VAA bytes base64 encoded. A VAA the guardians have not signed yet
//! is a 404, which maps to `Ok(None)` so callers can poll.

use crate::{ChainError, SignedVaa, WormholeClient};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use tracing::trace;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
	data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaaItem {
	#[serde(deserialize_with = "number_or_string")]
	sequence: u64,
	vaa: String,
	#[serde(default)]
	tx_hash: Option<String>,
}

impl VaaItem {
	fn into_signed(self) -> Result<SignedVaa, ChainError> {
		let bytes = BASE64
			.decode(self.vaa.as_bytes())
			.map_err(|e| ChainError::InvalidResponse(format!("Bad VAA encoding: {}", e)))?;
		let tx_hash = self
			.tx_hash
			.filter(|hash| !hash.is_empty())
			.map(|hash| {
				if hash.starts_with("0x") {
					hash
				} else {
					format!("0x{}", hash)
				}
			});
		Ok(SignedVaa {
			sequence: self.sequence,
			bytes,
			tx_hash,
		})
	}
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(u64),
		Text(String),
	}

	match Raw::deserialize(deserializer)? {
		Raw::Number(n) => Ok(n),
		Raw::Text(s) => s.parse().map_err(de::Error::custom),
	}
}

/// HTTP client for a Wormholescan deployment.
#[derive(Debug, Clone)]
pub struct WormholescanClient {
	client: reqwest::Client,
	api_url: String,
}

impl WormholescanClient {
	pub fn new(api_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			api_url: api_url.into().trim_end_matches('/').to_string(),
		}
	}

	fn emitter_url(&self, chain: u16, emitter: &[u8; 32]) -> String {
		format!(
			"{}/api/v1/vaas/{}/{}",
			self.api_url,
			chain,
			hex::encode(emitter)
		)
	}

	async fn get_json<T: DeserializeOwned>(
		&self,
		url: &str,
	) -> Result<Option<T>, ChainError> {
		trace!(url, "Wormholescan request");
		let response = self
			.client
			.get(url)
			.send()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(None);
		}
		if !response.status().is_success() {
			return Err(ChainError::Network(format!(
				"Wormholescan returned {}",
				response.status()
			)));
		}

		response
			.json::<T>()
			.await
			.map(Some)
			.map_err(|e| ChainError::InvalidResponse(e.to_string()))
	}
}

#[async_trait]
impl WormholeClient for WormholescanClient {
	async fn get_vaa(
		&self,
		chain: u16,
		emitter: &[u8; 32],
		sequence: u64,
	) -> Result<Option<SignedVaa>, ChainError> {
		let url = format!("{}/{}", self.emitter_url(chain, emitter), sequence);
		match self.get_json::<Envelope<VaaItem>>(&url).await? {
			Some(envelope) => envelope.data.into_signed().map(Some),
			None => Ok(None),
		}
	}

	async fn recent_vaas(
		&self,
		chain: u16,
		emitter: &[u8; 32],
		limit: usize,
	) -> Result<Vec<SignedVaa>, ChainError> {
		let url = format!(
			"{}?page=0&pageSize={}",
			self.emitter_url(chain, emitter),
			limit
		);
		let items = self
			.get_json::<Envelope<Vec<VaaItem>>>(&url)
			.await?
			.map(|envelope| envelope.data)
			.unwrap_or_default();
		items.into_iter().map(VaaItem::into_signed).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_single_vaa_shape() {
		let body = r#"{
			"data": {
				"sequence": 4821,
				"id": "6/000000000000000000000000aaaa/4821",
				"vaa": "AQID",
				"txHash": "9f1c"
			}
		}"#;
		let envelope: Envelope<VaaItem> = serde_json::from_str(body).unwrap();
		let vaa = envelope.data.into_signed().unwrap();

		assert_eq!(vaa.sequence, 4821);
		assert_eq!(vaa.bytes, vec![1, 2, 3]);
		assert_eq!(vaa.tx_hash.as_deref(), Some("0x9f1c"));
	}

	#[test]
	fn test_list_shape_with_string_sequence() {
		let body = r#"{
			"data": [
				{ "sequence": "12", "vaa": "AQ==", "txHash": "0xab" },
				{ "sequence": 11, "vaa": "Ag==", "txHash": "" }
			],
			"pagination": { "next": "" }
		}"#;
		let envelope: Envelope<Vec<VaaItem>> = serde_json::from_str(body).unwrap();
		let vaas: Vec<SignedVaa> = envelope
			.data
			.into_iter()
			.map(VaaItem::into_signed)
			.collect::<Result<_, _>>()
			.unwrap();

		assert_eq!(vaas[0].sequence, 12);
		assert_eq!(vaas[0].tx_hash.as_deref(), Some("0xab"));
		assert_eq!(vaas[1].tx_hash, None);
	}

	#[test]
	fn test_bad_base64_is_invalid_response() {
		let item = VaaItem {
			sequence: 1,
			vaa: "not base64!".to_string(),
			tx_hash: None,
		};
		assert!(matches!(
			item.into_signed(),
			Err(ChainError::InvalidResponse(_))
		));
	}

	#[test]
	fn test_emitter_url() {
		let client = WormholescanClient::new("https://api.wormholescan.io/");
		let url = client.emitter_url(6, &[0xab; 32]);
		assert_eq!(
			url,
			format!("https://api.wormholescan.io/api/v1/vaas/6/{}", "ab".repeat(32))
		);
	}
}
