//! Fair-value offer strategy.
//!
//! `fair_value = amount_in * probability`, `with_edge = fair_value * (1 + edge)`,
//! with `probability` and `edge` fixed-point over [`PRECISION`]. An offer is
//! made at `with_edge` whenever it does not exceed the price the auction
//! currently allows.

use crate::{OfferContext, OfferDecision, OfferKind, OfferStrategy, SkipReason};
use solver_config::PricingConfig;
use std::collections::HashMap;

/// Denominator of `probability` and `edge_pct_of_fv`.
pub const PRECISION: u64 = 10_000;

/// Expected value of settling `amount_in` with the given success probability.
pub fn fair_value(amount_in: u64, probability: u64) -> u64 {
	let value = u128::from(amount_in) * u128::from(probability) / u128::from(PRECISION);
	u64::try_from(value).unwrap_or(u64::MAX)
}

/// Fair value plus the configured margin.
pub fn fair_value_with_edge(amount_in: u64, pricing: &PricingConfig) -> u64 {
	let fv = fair_value(amount_in, pricing.probability);
	let edge = u128::from(fv) * u128::from(pricing.edge_pct_of_fv) / u128::from(PRECISION);
	fv.saturating_add(u64::try_from(edge).unwrap_or(u64::MAX))
}

pub struct FairValueStrategy {
	pricing: HashMap<u16, PricingConfig>,
}

impl FairValueStrategy {
	pub fn new(pricing: HashMap<u16, PricingConfig>) -> Self {
		Self { pricing }
	}
}

impl OfferStrategy for FairValueStrategy {
	fn evaluate(&self, ctx: &OfferContext) -> OfferDecision {
		match ctx.kind {
			OfferKind::Initial if ctx.auction_started => {
				return OfferDecision::Skip(SkipReason::AuctionAlreadyStarted);
			}
			OfferKind::Improve { end_slot } if ctx.current_slot > end_slot => {
				return OfferDecision::Skip(SkipReason::AuctionEnded {
					end_slot,
					current_slot: ctx.current_slot,
				});
			}
			_ => {}
		}

		let Some(pricing) = self.pricing.get(&ctx.source_chain) else {
			return OfferDecision::Skip(SkipReason::NoPricing {
				source_chain: ctx.source_chain,
			});
		};

		let fair_value_with_edge = fair_value_with_edge(ctx.amount_in, pricing);
		if fair_value_with_edge > ctx.candidate_price {
			return OfferDecision::Skip(SkipReason::FeeTooLow {
				fair_value_with_edge,
				candidate_price: ctx.candidate_price,
			});
		}

		let required = ctx
			.amount_in
			.saturating_add(ctx.candidate_price)
			.saturating_add(ctx.security_deposit);
		if ctx.available_balance < required {
			return OfferDecision::Skip(SkipReason::InsufficientBalance {
				required,
				available: ctx.available_balance,
			});
		}

		OfferDecision::Bid {
			offer_price: fair_value_with_edge,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn strategy() -> FairValueStrategy {
		FairValueStrategy::new(HashMap::from([(
			6,
			PricingConfig {
				probability: 9_800,
				edge_pct_of_fv: 100,
			},
		)]))
	}

	fn initial(amount_in: u64, max_fee: u64) -> OfferContext {
		OfferContext {
			kind: OfferKind::Initial,
			source_chain: 6,
			amount_in,
			candidate_price: max_fee,
			security_deposit: 0,
			available_balance: u64::MAX,
			auction_started: false,
			current_slot: 100,
		}
	}

	#[test]
	fn test_scenario_fair_value_with_edge() {
		let pricing = PricingConfig {
			probability: 9_800,
			edge_pct_of_fv: 100,
		};
		assert_eq!(fair_value(1_000_000, 9_800), 980_000);
		assert_eq!(fair_value_with_edge(1_000_000, &pricing), 989_800);
	}

	#[test]
	fn test_scenario_bid_and_skip() {
		let strategy = strategy();

		assert_eq!(
			strategy.evaluate(&initial(1_000_000, 990_000)),
			OfferDecision::Bid {
				offer_price: 989_800
			}
		);
		assert_eq!(
			strategy.evaluate(&initial(1_000_000, 989_000)),
			OfferDecision::Skip(SkipReason::FeeTooLow {
				fair_value_with_edge: 989_800,
				candidate_price: 989_000,
			})
		);
	}

	#[test]
	fn test_boundary_is_inclusive() {
		assert_eq!(
			strategy().evaluate(&initial(1_000_000, 989_800)),
			OfferDecision::Bid {
				offer_price: 989_800
			}
		);
	}

	#[test]
	fn test_monotonic_in_amount() {
		let strategy = strategy();
		let pricing = strategy.pricing[&6];
		let mut previous = 0;

		for amount_in in (0..=5_000_000u64).step_by(12_345) {
			let with_edge = fair_value_with_edge(amount_in, &pricing);
			assert!(with_edge >= previous);
			previous = with_edge;

			// Any max fee at or above the fair value with edge bids.
			for slack in [0, 1, 1_000] {
				assert!(matches!(
					strategy.evaluate(&initial(amount_in, with_edge + slack)),
					OfferDecision::Bid { .. }
				));
			}
		}
	}

	#[test]
	fn test_unknown_source_chain() {
		let mut ctx = initial(1_000_000, 990_000);
		ctx.source_chain = 30;
		assert_eq!(
			strategy().evaluate(&ctx),
			OfferDecision::Skip(SkipReason::NoPricing { source_chain: 30 })
		);
	}

	#[test]
	fn test_started_auction_is_not_offered_on() {
		let mut ctx = initial(1_000_000, 990_000);
		ctx.auction_started = true;
		assert_eq!(
			strategy().evaluate(&ctx),
			OfferDecision::Skip(SkipReason::AuctionAlreadyStarted)
		);
	}

	#[test]
	fn test_improvement_after_end_slot() {
		let mut ctx = initial(1_000_000, 990_000);
		ctx.kind = OfferKind::Improve { end_slot: 99 };
		assert_eq!(
			strategy().evaluate(&ctx),
			OfferDecision::Skip(SkipReason::AuctionEnded {
				end_slot: 99,
				current_slot: 100
			})
		);

		ctx.kind = OfferKind::Improve { end_slot: 100 };
		assert!(matches!(
			strategy().evaluate(&ctx),
			OfferDecision::Bid { .. }
		));
	}

	#[test]
	fn test_insufficient_balance() {
		let mut ctx = initial(1_000_000, 990_000);
		ctx.security_deposit = 10_000;
		ctx.available_balance = 1_999_999;
		assert_eq!(
			strategy().evaluate(&ctx),
			OfferDecision::Skip(SkipReason::InsufficientBalance {
				required: 2_000_000,
				available: 1_999_999,
			})
		);

		ctx.available_balance = 2_000_000;
		assert!(matches!(
			strategy().evaluate(&ctx),
			OfferDecision::Bid { .. }
		));
	}
}
