//! Wormhole VAA envelope.
//!
//! A VAA is a guardian-signed body. Only the body participates in hashing;
//! signatures are carried through untouched.

use crate::messages::{CodecError, Reader, Writer};
use crate::pubkey::Pubkey;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

const GUARDIAN_SIGNATURE_LEN: usize = 66;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vaa {
	pub version: u8,
	pub guardian_set_index: u32,
	/// Raw guardian signatures (index byte followed by a 65-byte signature).
	pub signatures: Vec<Vec<u8>>,
	pub body: VaaBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaaBody {
	pub timestamp: u32,
	pub nonce: u32,
	pub emitter_chain: u16,
	pub emitter_address: [u8; 32],
	pub sequence: u64,
	pub consistency_level: u8,
	pub payload: Vec<u8>,
}

impl Vaa {
	pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
		let mut reader = Reader::new(bytes);
		let version = reader.read_u8()?;
		let guardian_set_index = reader.read_u32()?;
		let num_signatures = usize::from(reader.read_u8()?);
		let mut signatures = Vec::with_capacity(num_signatures);
		for _ in 0..num_signatures {
			signatures.push(reader.read_bytes(GUARDIAN_SIGNATURE_LEN)?.to_vec());
		}
		let body = VaaBody::read(&mut reader)?;

		Ok(Self {
			version,
			guardian_set_index,
			signatures,
			body,
		})
	}

	pub fn serialize(&self) -> Vec<u8> {
		let mut writer = Writer::default();
		writer.put_u8(self.version);
		writer.put_u32(self.guardian_set_index);
		writer.put_u8(self.signatures.len() as u8);
		for signature in &self.signatures {
			writer.put_slice(signature);
		}
		writer.put_slice(&self.body.serialize());
		writer.into_inner()
	}

	/// `keccak256(body)`, the seed of the posted-VAA account.
	pub fn message_hash(&self) -> [u8; 32] {
		keccak256(&self.body.serialize())
	}

	/// `keccak256(keccak256(body))`, the identifier auctions are keyed by.
	pub fn digest(&self) -> [u8; 32] {
		keccak256(&self.message_hash())
	}
}

impl VaaBody {
	fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
		Ok(Self {
			timestamp: reader.read_u32()?,
			nonce: reader.read_u32()?,
			emitter_chain: reader.read_u16()?,
			emitter_address: reader.read_array()?,
			sequence: reader.read_u64()?,
			consistency_level: reader.read_u8()?,
			payload: reader.rest().to_vec(),
		})
	}

	pub fn serialize(&self) -> Vec<u8> {
		let mut writer = Writer::default();
		writer.put_u32(self.timestamp);
		writer.put_u32(self.nonce);
		writer.put_u16(self.emitter_chain);
		writer.put_slice(&self.emitter_address);
		writer.put_u64(self.sequence);
		writer.put_u8(self.consistency_level);
		writer.put_slice(&self.payload);
		writer.into_inner()
	}
}

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
	Keccak256::digest(bytes).into()
}

const POSTED_VAA_MAGIC: &[u8; 3] = b"vaa";

/// A VAA verified and posted to the core bridge on Solana.
///
/// Account data is the `vaa` magic followed by a borsh body.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PostedVaa {
	pub vaa_version: u8,
	pub consistency_level: u8,
	pub timestamp: u32,
	pub signature_set: Pubkey,
	pub submission_time: u32,
	pub nonce: u32,
	pub sequence: u64,
	pub emitter_chain: u16,
	pub emitter_address: [u8; 32],
	pub payload: Vec<u8>,
}

impl PostedVaa {
	pub fn try_from_account_data(data: &[u8]) -> Result<Self, CodecError> {
		if data.len() < POSTED_VAA_MAGIC.len() || &data[..3] != POSTED_VAA_MAGIC {
			return Err(CodecError::LengthMismatch {
				expected: POSTED_VAA_MAGIC.len(),
				actual: data.len().min(POSTED_VAA_MAGIC.len()),
			});
		}
		let mut body = &data[3..];
		Self::deserialize(&mut body).map_err(|_| CodecError::Truncated {
			needed: data.len() + 1,
			remaining: data.len(),
		})
	}
}
