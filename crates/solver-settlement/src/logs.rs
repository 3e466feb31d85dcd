//! Locating the CCTP message behind a finalized VAA.
//!
//! The token router burns through CCTP and then publishes through the
//! Wormhole core bridge in the same transaction, so the `MessageSent` log
//! that belongs to a published sequence is the closest one emitted before it
//! with no other publish in between.

use crate::SettlementError;
use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::SolEvent;
use solver_chains::SourceLog;
use tracing::debug;

sol! {
	/// Circle message transmitter.
	event MessageSent(bytes message);

	/// Wormhole core bridge.
	event LogMessagePublished(
		address indexed sender,
		uint64 sequence,
		uint32 nonce,
		bytes payload,
		uint8 consistencyLevel
	);
}

fn is_event<E: SolEvent>(log: &SourceLog) -> bool {
	log.topics.first() == Some(&E::SIGNATURE_HASH)
}

fn decode<E: SolEvent>(log: &SourceLog) -> Result<E, SettlementError> {
	E::decode_raw_log(log.topics.iter().copied(), &log.data).map_err(|e| {
		SettlementError::Malformed(format!("Undecodable {} log: {}", E::SIGNATURE, e))
	})
}

/// Returns the CCTP message published alongside `(emitter, sequence)`.
///
/// Scans the logs in order, remembering the latest `MessageSent`, and stops
/// at the `LogMessagePublished` from `emitter` carrying `sequence`. Any other
/// publish consumes the remembered message.
pub fn find_cctp_message(
	logs: &[SourceLog],
	emitter: &[u8; 32],
	sequence: u64,
) -> Result<Vec<u8>, SettlementError> {
	let mut last_sent: Option<Vec<u8>> = None;

	for log in logs {
		if is_event::<MessageSent>(log) {
			last_sent = Some(decode::<MessageSent>(log)?.message.to_vec());
			continue;
		}
		if !is_event::<LogMessagePublished>(log) {
			continue;
		}

		let published = decode::<LogMessagePublished>(log)?;
		let sender: B256 = published.sender.into_word();
		if sender.0 != *emitter || published.sequence != sequence {
			last_sent = None;
			continue;
		}

		debug!(sequence, "Found publish log for finalized VAA");
		return last_sent.ok_or_else(|| {
			SettlementError::Malformed(format!(
				"No MessageSent log precedes sequence {}",
				sequence
			))
		});
	}

	Err(SettlementError::Malformed(format!(
		"No LogMessagePublished log for sequence {}",
		sequence
	)))
}
