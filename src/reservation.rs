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

//! Reservation records.
//!
//! Reservations follow a state machine:
//! - [`Pending`] → [`Confirmed`] (confirm) or [`Cancelled`] (cancel)
//! - [`Confirmed`] → [`Paid`] (pay)
//! - [`Confirmed`] / [`Paid`] → [`Cancelled`] only through the administrative override
//!
//! [`Pending`]: ReservationStatus::Pending
//! [`Confirmed`]: ReservationStatus::Confirmed
//! [`Paid`]: ReservationStatus::Paid
//! [`Cancelled`]: ReservationStatus::Cancelled

use crate::base::{FlightId, PassengerId, ReservationCode, ReservationId, SeatId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Paid,
    Cancelled,
}

impl ReservationStatus {
    /// Active reservations hold their seat and count against the passenger.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    pub fn is_ticket_eligible(self) -> bool {
        matches!(self, Self::Confirmed | Self::Paid)
    }

    /// Whether the ordinary lifecycle allows moving to `next`.
    ///
    /// With `override_cancel`, confirmed and paid reservations may also be
    /// cancelled (refund path).
    pub fn can_transition_to(self, next: ReservationStatus, override_cancel: bool) -> bool {
        use ReservationStatus::*;
        match (self, next) {
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Paid) => true,
            (Confirmed, Cancelled) | (Paid, Cancelled) => override_cancel,
            _ => false,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Request to claim a seat on a flight for a passenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NewReservation {
    pub flight_id: FlightId,
    pub passenger_id: PassengerId,
    pub seat_id: SeatId,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub code: ReservationCode,
    pub flight_id: FlightId,
    pub passenger_id: PassengerId,
    pub seat_id: SeatId,
    pub status: ReservationStatus,
    pub price: Decimal,
    /// Gateway transaction reference, set once paid.
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}
