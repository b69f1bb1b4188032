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

//! Seat inventory.
//!
//! Seat status follows a small state machine:
//! - [`Available`] → [`Reserved`] (booking)
//! - [`Reserved`] → [`Available`] (release) or [`Occupied`] (payment)
//! - [`Occupied`] → [`Available`] (refund)
//!
//! The status is an aircraft-wide cache. One aircraft serves many flights, so
//! availability for a particular flight is always answered from the
//! reservation ledger; see [`ReservationEngine::get_available_seats`].
//!
//! [`Available`]: SeatStatus::Available
//! [`Reserved`]: SeatStatus::Reserved
//! [`Occupied`]: SeatStatus::Occupied
//! [`ReservationEngine::get_available_seats`]: crate::ReservationEngine::get_available_seats
//!
//! # Example
//!
//! ```
//! use flight_reservations_rs::{AircraftId, SeatInventory, SeatStatus};
//!
//! let inventory = SeatInventory::new();
//! let seats = inventory.provision(AircraftId(1), 1..=2, "AB", None).unwrap();
//! assert_eq!(seats.len(), 4);
//! assert_eq!(seats[0].number(), "1A");
//! assert_eq!(seats[0].status, SeatStatus::Available);
//! ```

use crate::base::{AircraftId, SeatId, SeatTypeId};
use crate::error::{EntityKind, ReservationError, ValidationError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SeatStatus {
    Available,
    Reserved,
    Occupied,
}

impl SeatStatus {
    pub fn can_transition_to(self, next: SeatStatus) -> bool {
        use SeatStatus::*;
        matches!(
            (self, next),
            (Available, Reserved) | (Reserved, Available) | (Reserved, Occupied) | (Occupied, Available)
        )
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Occupied => "occupied",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub aircraft_id: AircraftId,
    pub row: u16,
    pub column: char,
    pub seat_type: Option<SeatTypeId>,
    pub status: SeatStatus,
}

impl Seat {
    /// Printed seat number, e.g. `12C`.
    pub fn number(&self) -> String {
        format!("{}{}", self.row, self.column)
    }
}

/// Thread-safe store of every provisioned seat.
///
/// Positions are unique per aircraft; the position index is claimed through
/// the [`DashMap`] entry API so concurrent provisioning cannot create two
/// seats at the same place.
#[derive(Debug)]
pub struct SeatInventory {
    seats: DashMap<SeatId, Seat>,
    positions: DashMap<(AircraftId, u16, char), SeatId>,
    next_id: AtomicU32,
}

impl SeatInventory {
    pub fn new() -> Self {
        Self {
            seats: DashMap::new(),
            positions: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Adds a single seat to an aircraft.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidSeatPosition`] - Row is zero or column is not one letter.
    /// - [`ValidationError::DuplicateSeatPosition`] - Aircraft already has that seat.
    pub fn add_seat(
        &self,
        aircraft_id: AircraftId,
        row: u16,
        column: &str,
        seat_type: Option<SeatTypeId>,
    ) -> Result<Seat, ReservationError> {
        let column = parse_column(row, column)?;

        match self.positions.entry((aircraft_id, row, column)) {
            Entry::Occupied(_) => Err(ValidationError::DuplicateSeatPosition {
                aircraft_id,
                row,
                column,
            }
            .into()),
            Entry::Vacant(entry) => {
                let seat = Seat {
                    id: SeatId(self.next_id.fetch_add(1, Ordering::Relaxed)),
                    aircraft_id,
                    row,
                    column,
                    seat_type,
                    status: SeatStatus::Available,
                };
                self.seats.insert(seat.id, seat.clone());
                entry.insert(seat.id);
                Ok(seat)
            }
        }
    }

    /// Provisions a full grid of seats, one per (row, column) pair.
    ///
    /// Stops at the first invalid or duplicate position; seats created
    /// before it are kept.
    pub fn provision(
        &self,
        aircraft_id: AircraftId,
        rows: RangeInclusive<u16>,
        columns: &str,
        seat_type: Option<SeatTypeId>,
    ) -> Result<Vec<Seat>, ReservationError> {
        let mut seats = Vec::new();
        for row in rows {
            for column in columns.chars() {
                let mut buf = [0u8; 4];
                seats.push(self.add_seat(aircraft_id, row, column.encode_utf8(&mut buf), seat_type)?);
            }
        }
        Ok(seats)
    }

    /// Returns all seats of an aircraft ordered by row, then column.
    pub fn list_seats(&self, aircraft_id: AircraftId) -> Vec<Seat> {
        let mut seats: Vec<Seat> = self
            .seats
            .iter()
            .filter(|seat| seat.aircraft_id == aircraft_id)
            .map(|seat| seat.value().clone())
            .collect();
        seats.sort_by_key(|seat| (seat.row, seat.column));
        seats
    }

    pub fn get_seat(&self, seat_id: SeatId) -> Result<Seat, ReservationError> {
        self.seats
            .get(&seat_id)
            .map(|seat| seat.clone())
            .ok_or_else(|| ReservationError::not_found(EntityKind::Seat, seat_id))
    }

    /// Moves a seat to `status`.
    ///
    /// Only the engine calls this, always while holding the seat's lock and
    /// always paired with the reservation change that motivates it. Setting
    /// the current status again is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Seat does not exist.
    /// - [`ValidationError::InvalidSeatTransition`] - Move is not allowed.
    pub(crate) fn set_status(
        &self,
        seat_id: SeatId,
        status: SeatStatus,
    ) -> Result<Seat, ReservationError> {
        let mut seat = self
            .seats
            .get_mut(&seat_id)
            .ok_or_else(|| ReservationError::not_found(EntityKind::Seat, seat_id))?;

        if seat.status != status {
            if !seat.status.can_transition_to(status) {
                return Err(ValidationError::InvalidSeatTransition {
                    seat_id,
                    from: seat.status,
                    to: status,
                }
                .into());
            }
            seat.status = status;
        }
        Ok(seat.clone())
    }

    #[cfg(test)]
    pub(crate) fn remove_seat(&self, seat_id: SeatId) -> Option<Seat> {
        self.seats.remove(&seat_id).map(|(_, seat)| seat)
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}

impl Default for SeatInventory {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_column(row: u16, column: &str) -> Result<char, ReservationError> {
    let mut chars = column.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if row > 0 && c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
        _ => Err(ValidationError::InvalidSeatPosition {
            row,
            column: column.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_status_transitions() {
        use SeatStatus::*;
        assert!(Available.can_transition_to(Reserved));
        assert!(Reserved.can_transition_to(Available));
        assert!(Reserved.can_transition_to(Occupied));
        assert!(Occupied.can_transition_to(Available));

        assert!(!Available.can_transition_to(Occupied));
        assert!(!Occupied.can_transition_to(Reserved));
        assert!(!Available.can_transition_to(Available));
    }

    #[test]
    fn column_is_normalised_to_uppercase() {
        let inventory = SeatInventory::new();
        let seat = inventory.add_seat(AircraftId(1), 3, "c", None).unwrap();
        assert_eq!(seat.column, 'C');
        assert_eq!(seat.number(), "3C");
    }

    #[test]
    fn rejects_invalid_positions() {
        let inventory = SeatInventory::new();
        for (row, column) in [(0, "A"), (1, "AB"), (1, "1"), (1, "")] {
            let result = inventory.add_seat(AircraftId(1), row, column, None);
            assert!(
                matches!(
                    result,
                    Err(ReservationError::Validation(ValidationError::InvalidSeatPosition { .. }))
                ),
                "row {row}, column {column:?} should be rejected"
            );
        }
        assert!(inventory.is_empty());
    }

    #[test]
    fn rejects_duplicate_position_on_same_aircraft() {
        let inventory = SeatInventory::new();
        inventory.add_seat(AircraftId(1), 1, "A", None).unwrap();

        let result = inventory.add_seat(AircraftId(1), 1, "a", None);
        assert_eq!(
            result,
            Err(ValidationError::DuplicateSeatPosition {
                aircraft_id: AircraftId(1),
                row: 1,
                column: 'A',
            }
            .into())
        );

        // Same position on another aircraft is fine
        inventory.add_seat(AircraftId(2), 1, "A", None).unwrap();
        assert_eq!(inventory.len(), 2);
    }

    #[test]
    fn list_seats_orders_by_row_then_column() {
        let inventory = SeatInventory::new();
        inventory.add_seat(AircraftId(1), 2, "B", None).unwrap();
        inventory.add_seat(AircraftId(1), 10, "A", None).unwrap();
        inventory.add_seat(AircraftId(1), 2, "A", None).unwrap();
        inventory.add_seat(AircraftId(9), 1, "A", None).unwrap();

        let numbers: Vec<String> = inventory
            .list_seats(AircraftId(1))
            .iter()
            .map(Seat::number)
            .collect();
        assert_eq!(numbers, vec!["2A", "2B", "10A"]);
    }

    #[test]
    fn set_status_follows_state_machine() {
        let inventory = SeatInventory::new();
        let seat = inventory.add_seat(AircraftId(1), 1, "A", None).unwrap();

        let result = inventory.set_status(seat.id, SeatStatus::Occupied);
        assert_eq!(
            result,
            Err(ValidationError::InvalidSeatTransition {
                seat_id: seat.id,
                from: SeatStatus::Available,
                to: SeatStatus::Occupied,
            }
            .into())
        );

        inventory.set_status(seat.id, SeatStatus::Reserved).unwrap();
        inventory.set_status(seat.id, SeatStatus::Occupied).unwrap();
        let seat = inventory.set_status(seat.id, SeatStatus::Available).unwrap();
        assert_eq!(seat.status, SeatStatus::Available);
    }

    #[test]
    fn set_status_to_current_is_noop() {
        let inventory = SeatInventory::new();
        let seat = inventory.add_seat(AircraftId(1), 1, "A", None).unwrap();
        let same = inventory.set_status(seat.id, SeatStatus::Available).unwrap();
        assert_eq!(same, seat);
    }

    #[test]
    fn unknown_seat_is_not_found() {
        let inventory = SeatInventory::new();
        assert_eq!(
            inventory.get_seat(SeatId(99)),
            Err(ReservationError::NotFound {
                entity: EntityKind::Seat,
                id: 99,
            })
        );
        assert!(inventory.set_status(SeatId(99), SeatStatus::Reserved).is_err());
    }
}
