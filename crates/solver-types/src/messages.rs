//! Liquidity-layer message codec.
//!
//! Every message starts with a one-byte discriminator followed by big-endian
//! fixed-width fields. Variable-length fields (embedded deposit payloads and
//! redeemer messages) carry a 2-byte big-endian length prefix. Decoding is
//! strict: a message must consume its input exactly.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of any length-prefixed field.
pub const MAX_VARIABLE_LENGTH: usize = u16::MAX as usize;

/// Errors produced while encoding or decoding liquidity-layer messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
	/// The leading discriminator does not name a known variant.
	#[error("Unknown discriminator: {0}")]
	UnknownDiscriminator(u8),
	/// Fewer bytes remain than the next field requires.
	#[error("Truncated: needed {needed} bytes, {remaining} remaining")]
	Truncated { needed: usize, remaining: usize },
	/// Bytes remain after the message, or an embedded payload disagrees with its prefix.
	#[error("Length mismatch: expected {expected} bytes, got {actual}")]
	LengthMismatch { expected: usize, actual: usize },
	/// A field cannot be represented in the wire layout.
	#[error("Field {field} does not fit the wire layout")]
	FieldOverflow { field: &'static str },
}

/// Width of the `FastFill` amount field.
///
/// Deployments disagree on this width, so it is pinned per protocol version
/// rather than guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountWidth {
	U64,
	U128,
}

impl AmountWidth {
	pub fn from_bytes(bytes: u8) -> Option<Self> {
		match bytes {
			8 => Some(Self::U64),
			16 => Some(Self::U128),
			_ => None,
		}
	}

	pub fn len(self) -> usize {
		match self {
			Self::U64 => 8,
			Self::U128 => 16,
		}
	}
}

/// Layout parameters that vary between protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLayout {
	pub fast_fill_amount: AmountWidth,
}

impl MessageLayout {
	pub fn new(fast_fill_amount: AmountWidth) -> Self {
		Self { fast_fill_amount }
	}

	/// Decodes a complete liquidity-layer message.
	pub fn decode(&self, bytes: &[u8]) -> Result<LiquidityLayerMessage, CodecError> {
		let mut reader = Reader::new(bytes);
		let message = match reader.read_u8()? {
			CctpDeposit::ID => LiquidityLayerMessage::CctpDeposit(CctpDeposit::read(&mut reader)?),
			FastMarketOrder::ID => {
				LiquidityLayerMessage::FastMarketOrder(FastMarketOrder::read(&mut reader)?)
			}
			FastFill::ID => LiquidityLayerMessage::FastFill(FastFill::read(&mut reader, self)?),
			other => return Err(CodecError::UnknownDiscriminator(other)),
		};
		reader.finish()?;
		Ok(message)
	}

	/// Encodes a message; the output decodes back to an equal value.
	pub fn encode(&self, message: &LiquidityLayerMessage) -> Result<Vec<u8>, CodecError> {
		let mut writer = Writer::default();
		match message {
			LiquidityLayerMessage::CctpDeposit(deposit) => {
				writer.put_u8(CctpDeposit::ID);
				deposit.write(&mut writer)?;
			}
			LiquidityLayerMessage::FastMarketOrder(order) => {
				writer.put_u8(FastMarketOrder::ID);
				order.write(&mut writer)?;
			}
			LiquidityLayerMessage::FastFill(fill) => {
				writer.put_u8(FastFill::ID);
				fill.write(&mut writer, self)?;
			}
		}
		Ok(writer.into_inner())
	}
}

/// The tagged union carried across chains by the token router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityLayerMessage {
	CctpDeposit(CctpDeposit),
	FastMarketOrder(FastMarketOrder),
	FastFill(FastFill),
}

impl LiquidityLayerMessage {
	pub fn as_fast_market_order(&self) -> Option<&FastMarketOrder> {
		match self {
			Self::FastMarketOrder(order) => Some(order),
			_ => None,
		}
	}

	pub fn as_cctp_deposit(&self) -> Option<&CctpDeposit> {
		match self {
			Self::CctpDeposit(deposit) => Some(deposit),
			_ => None,
		}
	}
}

/// A stablecoin-bridge deposit with an embedded liquidity-layer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CctpDeposit {
	pub token_address: [u8; 32],
	pub amount: U256,
	pub source_cctp_domain: u32,
	pub destination_cctp_domain: u32,
	pub cctp_nonce: u64,
	pub burn_source: [u8; 32],
	pub mint_recipient: [u8; 32],
	pub payload: DepositPayload,
}

impl CctpDeposit {
	pub const ID: u8 = 1;

	fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
		let token_address = reader.read_array()?;
		let amount = U256::from_be_bytes::<32>(reader.read_array()?);
		let source_cctp_domain = reader.read_u32()?;
		let destination_cctp_domain = reader.read_u32()?;
		let cctp_nonce = reader.read_u64()?;
		let burn_source = reader.read_array()?;
		let mint_recipient = reader.read_array()?;
		let payload_bytes = reader.read_prefixed()?;

		let mut inner = Reader::new(payload_bytes);
		let payload = DepositPayload::read(&mut inner)?;
		inner.finish()?;

		Ok(Self {
			token_address,
			amount,
			source_cctp_domain,
			destination_cctp_domain,
			cctp_nonce,
			burn_source,
			mint_recipient,
			payload,
		})
	}

	fn write(&self, writer: &mut Writer) -> Result<(), CodecError> {
		writer.put_slice(&self.token_address);
		writer.put_slice(&self.amount.to_be_bytes::<32>());
		writer.put_u32(self.source_cctp_domain);
		writer.put_u32(self.destination_cctp_domain);
		writer.put_u64(self.cctp_nonce);
		writer.put_slice(&self.burn_source);
		writer.put_slice(&self.mint_recipient);

		let mut payload = Writer::default();
		self.payload.write(&mut payload)?;
		writer.put_prefixed(&payload.into_inner(), "payload")
	}

	pub fn slow_order_response(&self) -> Option<&SlowOrderResponse> {
		match &self.payload {
			DepositPayload::SlowOrderResponse(response) => Some(response),
			_ => None,
		}
	}
}

/// Payloads that may be embedded in a [`CctpDeposit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositPayload {
	Fill(Fill),
	SlowOrderResponse(SlowOrderResponse),
}

impl DepositPayload {
	fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
		match reader.read_u8()? {
			Fill::ID => Ok(Self::Fill(Fill::read(reader)?)),
			SlowOrderResponse::ID => Ok(Self::SlowOrderResponse(SlowOrderResponse {
				base_fee: reader.read_u64()?,
			})),
			other => Err(CodecError::UnknownDiscriminator(other)),
		}
	}

	fn write(&self, writer: &mut Writer) -> Result<(), CodecError> {
		match self {
			Self::Fill(fill) => {
				writer.put_u8(Fill::ID);
				fill.write(writer)
			}
			Self::SlowOrderResponse(response) => {
				writer.put_u8(SlowOrderResponse::ID);
				writer.put_u64(response.base_fee);
				Ok(())
			}
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
	pub source_chain: u16,
	pub order_sender: [u8; 32],
	pub redeemer: [u8; 32],
	pub redeemer_message: Vec<u8>,
}

impl Fill {
	pub const ID: u8 = 1;

	fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
		Ok(Self {
			source_chain: reader.read_u16()?,
			order_sender: reader.read_array()?,
			redeemer: reader.read_array()?,
			redeemer_message: reader.read_prefixed()?.to_vec(),
		})
	}

	fn write(&self, writer: &mut Writer) -> Result<(), CodecError> {
		writer.put_u16(self.source_chain);
		writer.put_slice(&self.order_sender);
		writer.put_slice(&self.redeemer);
		writer.put_prefixed(&self.redeemer_message, "redeemer_message")
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowOrderResponse {
	pub base_fee: u64,
}

impl SlowOrderResponse {
	pub const ID: u8 = 2;
}

/// A transfer intent that opens a fee auction on the destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastMarketOrder {
	pub amount_in: u64,
	pub min_amount_out: u64,
	pub target_chain: u16,
	pub redeemer: [u8; 32],
	pub sender: [u8; 32],
	pub refund_address: [u8; 32],
	pub max_fee: u64,
	pub init_auction_fee: u64,
	/// Absolute chain time (unix seconds); zero means no deadline.
	pub deadline: u32,
	pub redeemer_message: Vec<u8>,
}

impl FastMarketOrder {
	pub const ID: u8 = 11;

	fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
		Ok(Self {
			amount_in: reader.read_u64()?,
			min_amount_out: reader.read_u64()?,
			target_chain: reader.read_u16()?,
			redeemer: reader.read_array()?,
			sender: reader.read_array()?,
			refund_address: reader.read_array()?,
			max_fee: reader.read_u64()?,
			init_auction_fee: reader.read_u64()?,
			deadline: reader.read_u32()?,
			redeemer_message: reader.read_prefixed()?.to_vec(),
		})
	}

	fn write(&self, writer: &mut Writer) -> Result<(), CodecError> {
		writer.put_u64(self.amount_in);
		writer.put_u64(self.min_amount_out);
		writer.put_u16(self.target_chain);
		writer.put_slice(&self.redeemer);
		writer.put_slice(&self.sender);
		writer.put_slice(&self.refund_address);
		writer.put_u64(self.max_fee);
		writer.put_u64(self.init_auction_fee);
		writer.put_u32(self.deadline);
		writer.put_prefixed(&self.redeemer_message, "redeemer_message")
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastFill {
	pub amount: u128,
	pub fill: Fill,
}

impl FastFill {
	pub const ID: u8 = 12;

	fn read(reader: &mut Reader<'_>, layout: &MessageLayout) -> Result<Self, CodecError> {
		let amount = match layout.fast_fill_amount {
			AmountWidth::U64 => u128::from(reader.read_u64()?),
			AmountWidth::U128 => reader.read_u128()?,
		};
		Ok(Self {
			amount,
			fill: Fill::read(reader)?,
		})
	}

	fn write(&self, writer: &mut Writer, layout: &MessageLayout) -> Result<(), CodecError> {
		match layout.fast_fill_amount {
			AmountWidth::U64 => {
				let amount = u64::try_from(self.amount)
					.map_err(|_| CodecError::FieldOverflow { field: "amount" })?;
				writer.put_u64(amount);
			}
			AmountWidth::U128 => writer.put_u128(self.amount),
		}
		self.fill.write(writer)
	}
}

/// Cursor over a byte slice with strict bounds checks.
pub(crate) struct Reader<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	pub(crate) fn new(buf: &'a [u8]) -> Self {
		Self { buf, pos: 0 }
	}

	pub(crate) fn remaining(&self) -> usize {
		self.buf.len() - self.pos
	}

	pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
		if self.remaining() < len {
			return Err(CodecError::Truncated {
				needed: len,
				remaining: self.remaining(),
			});
		}
		let bytes = &self.buf[self.pos..self.pos + len];
		self.pos += len;
		Ok(bytes)
	}

	pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
		let mut out = [0u8; N];
		out.copy_from_slice(self.read_bytes(N)?);
		Ok(out)
	}

	pub(crate) fn read_u8(&mut self) -> Result<u8, CodecError> {
		Ok(self.read_array::<1>()?[0])
	}

	pub(crate) fn read_u16(&mut self) -> Result<u16, CodecError> {
		Ok(u16::from_be_bytes(self.read_array()?))
	}

	pub(crate) fn read_u32(&mut self) -> Result<u32, CodecError> {
		Ok(u32::from_be_bytes(self.read_array()?))
	}

	pub(crate) fn read_u64(&mut self) -> Result<u64, CodecError> {
		Ok(u64::from_be_bytes(self.read_array()?))
	}

	pub(crate) fn read_u128(&mut self) -> Result<u128, CodecError> {
		Ok(u128::from_be_bytes(self.read_array()?))
	}

	fn read_prefixed(&mut self) -> Result<&'a [u8], CodecError> {
		let len = usize::from(self.read_u16()?);
		self.read_bytes(len)
	}

	pub(crate) fn rest(&mut self) -> &'a [u8] {
		let rest = &self.buf[self.pos..];
		self.pos = self.buf.len();
		rest
	}

	pub(crate) fn finish(&self) -> Result<(), CodecError> {
		if self.remaining() != 0 {
			return Err(CodecError::LengthMismatch {
				expected: self.pos,
				actual: self.buf.len(),
			});
		}
		Ok(())
	}
}

#[derive(Default)]
pub(crate) struct Writer {
	buf: Vec<u8>,
}

impl Writer {
	pub(crate) fn put_u8(&mut self, value: u8) {
		self.buf.push(value);
	}

	pub(crate) fn put_u16(&mut self, value: u16) {
		self.buf.extend_from_slice(&value.to_be_bytes());
	}

	pub(crate) fn put_u32(&mut self, value: u32) {
		self.buf.extend_from_slice(&value.to_be_bytes());
	}

	pub(crate) fn put_u64(&mut self, value: u64) {
		self.buf.extend_from_slice(&value.to_be_bytes());
	}

	fn put_u128(&mut self, value: u128) {
		self.buf.extend_from_slice(&value.to_be_bytes());
	}

	pub(crate) fn put_slice(&mut self, bytes: &[u8]) {
		self.buf.extend_from_slice(bytes);
	}

	fn put_prefixed(&mut self, bytes: &[u8], field: &'static str) -> Result<(), CodecError> {
		let len = u16::try_from(bytes.len()).map_err(|_| CodecError::FieldOverflow { field })?;
		self.put_u16(len);
		self.put_slice(bytes);
		Ok(())
	}

	pub(crate) fn into_inner(self) -> Vec<u8> {
		self.buf
	}
}
