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

//! Core identifier types for catalog entities, reservations and tickets.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                u64::from(id.0)
            }
        }
    };
}

define_id!(
    /// Identifier of a scheduled flight.
    FlightId(u32)
);

define_id!(
    /// Identifier of an aircraft. Seats belong to exactly one aircraft.
    AircraftId(u32)
);

define_id!(
    /// Identifier of a physical seat, assigned by the [`SeatInventory`](crate::SeatInventory).
    SeatId(u32)
);

define_id!(
    /// Identifier of a seat class (economy, business, ...).
    SeatTypeId(u32)
);

define_id!(
    /// Identifier of a passenger in the passenger directory.
    PassengerId(u32)
);

define_id!(
    /// Identifier of a reservation.
    ///
    /// Assigned sequentially by the [`ReservationLedger`](crate::ReservationLedger),
    /// starting at 1.
    ReservationId(u64)
);

define_id!(
    /// Identifier of a ticket, assigned sequentially by the [`TicketIssuer`](crate::TicketIssuer).
    TicketId(u64)
);

/// Opaque booking reference handed to the passenger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ReservationCode(String);

impl ReservationCode {
    pub const LENGTH: usize = 20;

    /// Draws a fresh random alphanumeric code.
    ///
    /// Uniqueness is not guaranteed here; the ledger regenerates on collision.
    pub fn generate() -> Self {
        let code = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::LENGTH)
            .map(char::from)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ReservationCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
