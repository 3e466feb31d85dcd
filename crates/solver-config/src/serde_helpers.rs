//! Serde helpers for configuration deserialization

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// Deserializes a table keyed by Wormhole chain id.
///
/// TOML table keys are always strings, so `[pricing.6]` arrives as `"6"`.
pub fn deserialize_chain_id_map<'de, D, T>(deserializer: D) -> Result<HashMap<u16, T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	let map = HashMap::<String, T>::deserialize(deserializer)?;

	map.into_iter()
		.map(|(k, v)| {
			k.parse::<u16>()
				.map(|id| (id, v))
				.map_err(|_| serde::de::Error::custom(format!("Invalid chain ID: {}", k)))
		})
		.collect()
}

/// Serializes a chain-id keyed map back to string keys.
pub fn serialize_chain_id_map<S, T>(map: &HashMap<u16, T>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
	T: Serialize,
{
	let string_map: HashMap<String, &T> = map.iter().map(|(k, v)| (k.to_string(), v)).collect();

	string_map.serialize(serializer)
}

/// Addresses written as base58 strings, e.g. `offer_token = "9xQe..."`.
pub mod base58 {
	use super::*;

	pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
		T: Display,
	{
		serializer.collect_str(value)
	}

	pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
	where
		D: Deserializer<'de>,
		T: FromStr,
		T::Err: Display,
	{
		let text = <String as Deserialize>::deserialize(deserializer)?;
		text.parse()
			.map_err(|e| serde::de::Error::custom(format!("Invalid address {}: {}", text, e)))
	}
}

pub mod base58_option {
	use super::*;

	pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
		T: Display,
	{
		match value {
			Some(value) => serializer.collect_str(value),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
	where
		D: Deserializer<'de>,
		T: FromStr,
		T::Err: Display,
	{
		<Option<String> as Deserialize>::deserialize(deserializer)?
			.map(|text| {
				text.parse().map_err(|e| {
					serde::de::Error::custom(format!("Invalid address {}: {}", text, e))
				})
			})
			.transpose()
	}
}

pub mod base58_vec {
	use super::*;

	pub fn serialize<S, T>(values: &[T], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
		T: Display,
	{
		let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
		rendered.serialize(serializer)
	}

	pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
	where
		D: Deserializer<'de>,
		T: FromStr,
		T::Err: Display,
	{
		<Vec<String> as Deserialize>::deserialize(deserializer)?
			.into_iter()
			.map(|text| {
				text.parse().map_err(|e| {
					serde::de::Error::custom(format!("Invalid address {}: {}", text, e))
				})
			})
			.collect()
	}
}
