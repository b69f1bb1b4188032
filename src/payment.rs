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

//! Payment collaborator.
//!
//! The engine never talks to a payment provider directly. It asks a
//! [`PaymentGateway`] to charge a reservation and only records the result.

use crate::reservation::Reservation;
use thiserror::Error;
use uuid::Uuid;

/// Successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// Provider transaction reference stored on the reservation.
    pub reference: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct PaymentDeclined {
    pub reason: String,
}

impl PaymentDeclined {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub trait PaymentGateway: Send + Sync {
    /// Charges `reservation.price` for the reservation.
    fn charge(&self, reservation: &Reservation) -> Result<PaymentReceipt, PaymentDeclined>;
}

/// Gateway that approves every charge with a random reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedGateway;

impl PaymentGateway for SimulatedGateway {
    fn charge(&self, reservation: &Reservation) -> Result<PaymentReceipt, PaymentDeclined> {
        tracing::debug!(
            reservation_id = %reservation.id,
            amount = %reservation.price,
            "simulated charge approved"
        );
        Ok(PaymentReceipt {
            reference: format!("SIM-{}", Uuid::new_v4().simple()),
        })
    }
}
