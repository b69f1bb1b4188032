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

//! Append-only booking history.
//!
//! Entries survive cancellation and deletion of the reservation they
//! describe; they record what was booked, not what is currently held.

use crate::base::{FlightId, PassengerId, ReservationId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightHistoryEntry {
    pub passenger_id: PassengerId,
    pub flight_id: FlightId,
    pub reservation_id: ReservationId,
    pub seat_number: String,
    pub price_paid: Decimal,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct FlightHistory {
    entries: RwLock<Vec<FlightHistoryEntry>>,
}

impl FlightHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: FlightHistoryEntry) {
        self.entries.write().push(entry);
    }

    /// Entries of one passenger, oldest first.
    pub fn for_passenger(&self, passenger_id: PassengerId) -> Vec<FlightHistoryEntry> {
        self.filter(|entry| entry.passenger_id == passenger_id)
    }

    /// Entries of one flight, oldest first.
    pub fn for_flight(&self, flight_id: FlightId) -> Vec<FlightHistoryEntry> {
        self.filter(|entry| entry.flight_id == flight_id)
    }

    fn filter(&self, keep: impl Fn(&FlightHistoryEntry) -> bool) -> Vec<FlightHistoryEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| keep(entry))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
