// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Seat pricing.
//!
//! # Example
//!
//! ```
//! use flight_reservations_rs::PricingCalculator;
//! use rust_decimal_macros::dec;
//!
//! let pricing = PricingCalculator::new();
//! assert_eq!(pricing.compute_price(dec!(100.00), Some(dec!(1.5))), dec!(150.00));
//! assert_eq!(pricing.compute_price(dec!(100.00), None), dec!(100.00));
//! ```

use rust_decimal::{Decimal, RoundingStrategy};

/// Stateless price calculator: `base price × seat type multiplier`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingCalculator;

impl PricingCalculator {
    /// Minor units of the currency (cents).
    pub const CURRENCY_PRECISION: u32 = 2;

    pub fn new() -> Self {
        Self
    }

    /// Computes the reservation price, rounding half-up to cents.
    ///
    /// Seats without a type price at the base fare (multiplier 1).
    pub fn compute_price(&self, base_price: Decimal, multiplier: Option<Decimal>) -> Decimal {
        let multiplier = multiplier.unwrap_or(Decimal::ONE);
        (base_price * multiplier).round_dp_with_strategy(
            Self::CURRENCY_PRECISION,
            RoundingStrategy::MidpointAwayFromZero,
        )
    }
}
