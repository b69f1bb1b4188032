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

//! Error types for reservation processing.
//!
//! Every operation returns one of three kinds: a missing entity
//! ([`ReservationError::NotFound`]), a rejected business rule
//! ([`ReservationError::Validation`]) or an internal inconsistency
//! ([`ReservationError::Internal`]). Validation errors are always detected
//! before any state is mutated.

use crate::base::{AircraftId, FlightId, PassengerId, ReservationId, SeatId, TicketId};
use crate::reservation::ReservationStatus;
use crate::seat::SeatStatus;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Kind of entity referenced by a [`ReservationError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Flight,
    Aircraft,
    Seat,
    SeatType,
    Passenger,
    Reservation,
    Ticket,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Flight => "flight",
            Self::Aircraft => "aircraft",
            Self::Seat => "seat",
            Self::SeatType => "seat type",
            Self::Passenger => "passenger",
            Self::Reservation => "reservation",
            Self::Ticket => "ticket",
        };
        f.write_str(name)
    }
}

/// Top-level error returned by the engine and its components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// Referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: u64 },

    /// A business rule rejected the operation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Stored state is inconsistent; the operation was aborted
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReservationError {
    pub(crate) fn not_found(entity: EntityKind, id: impl Into<u64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the validation error, if this is one.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Business rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Seat already held by an active reservation on this flight
    #[error("seat {seat_id} is already reserved on flight {flight_id}")]
    DuplicateSeat { flight_id: FlightId, seat_id: SeatId },

    /// Passenger already holds an active reservation on this flight
    #[error("passenger {passenger_id} already has a reservation on flight {flight_id}")]
    DuplicatePassengerOnFlight {
        flight_id: FlightId,
        passenger_id: PassengerId,
    },

    /// Reservation state machine forbids the move
    #[error("reservation {reservation_id} cannot move from {from} to {to}")]
    InvalidTransition {
        reservation_id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    },

    /// Seat state machine forbids the move
    #[error("seat {seat_id} cannot move from {from} to {to}")]
    InvalidSeatTransition {
        seat_id: SeatId,
        from: SeatStatus,
        to: SeatStatus,
    },

    /// Tickets are only issued for confirmed or paid reservations
    #[error("reservation {reservation_id} is {status} and not eligible for a ticket")]
    NotTicketEligible {
        reservation_id: ReservationId,
        status: ReservationStatus,
    },

    /// Ticket was already used for boarding
    #[error("ticket {ticket_id} has already been used")]
    AlreadyUsed { ticket_id: TicketId },

    /// Ticket was already cancelled
    #[error("ticket {ticket_id} is already cancelled")]
    TicketAlreadyCancelled { ticket_id: TicketId },

    /// Seat belongs to a different aircraft than the one operating the flight
    #[error("seat {seat_id} is not on the aircraft operating flight {flight_id}")]
    SeatNotOnAircraft { flight_id: FlightId, seat_id: SeatId },

    /// Flight has already departed
    #[error("flight {flight_id} has already departed")]
    FlightDeparted { flight_id: FlightId },

    /// Price is zero or negative
    #[error("invalid price {0} (must be positive)")]
    InvalidPrice(Decimal),

    /// Seat type multiplier is zero or negative
    #[error("invalid price multiplier {0} (must be positive)")]
    InvalidMultiplier(Decimal),

    /// Arrival is not after departure
    #[error("flight {flight_id} must arrive after it departs")]
    InvalidSchedule { flight_id: FlightId },

    /// Flight departure lies in the past
    #[error("flight {flight_id} cannot depart in the past")]
    DepartureInPast { flight_id: FlightId },

    /// Row must be positive and column a single letter
    #[error("invalid seat position row {row}, column {column:?}")]
    InvalidSeatPosition { row: u16, column: String },

    /// Aircraft already has a seat at this position
    #[error("aircraft {aircraft_id} already has seat {row}{column}")]
    DuplicateSeatPosition {
        aircraft_id: AircraftId,
        row: u16,
        column: char,
    },

    /// Catalog already contains an entry with this ID
    #[error("duplicate {entity} ID {id}")]
    DuplicateEntry { entity: EntityKind, id: u64 },

    /// Passenger record has an empty first name
    #[error("passenger {passenger_id} must have a first name")]
    MissingPassengerName { passenger_id: PassengerId },

    /// Payment gateway refused the charge
    #[error("payment for reservation {reservation_id} declined: {reason}")]
    PaymentDeclined {
        reservation_id: ReservationId,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            ReservationError::not_found(EntityKind::Flight, FlightId(3)).to_string(),
            "flight 3 not found"
        );
        assert_eq!(
            ReservationError::from(ValidationError::DuplicateSeat {
                flight_id: FlightId(1),
                seat_id: SeatId(12),
            })
            .to_string(),
            "seat 12 is already reserved on flight 1"
        );
        assert_eq!(
            ValidationError::InvalidTransition {
                reservation_id: ReservationId(5),
                from: ReservationStatus::Cancelled,
                to: ReservationStatus::Confirmed,
            }
            .to_string(),
            "reservation 5 cannot move from cancelled to confirmed"
        );
        assert_eq!(
            ValidationError::InvalidPrice(dec!(-1.00)).to_string(),
            "invalid price -1.00 (must be positive)"
        );
        assert_eq!(
            ValidationError::DuplicateSeatPosition {
                aircraft_id: AircraftId(1),
                row: 12,
                column: 'C',
            }
            .to_string(),
            "aircraft 1 already has seat 12C"
        );
        assert_eq!(
            ReservationError::Internal("seat index out of sync".into()).to_string(),
            "internal error: seat index out of sync"
        );
    }

    #[test]
    fn validation_accessor() {
        let err = ReservationError::from(ValidationError::AlreadyUsed {
            ticket_id: TicketId(1),
        });
        assert_eq!(
            err.validation(),
            Some(&ValidationError::AlreadyUsed {
                ticket_id: TicketId(1)
            })
        );
        assert_eq!(
            ReservationError::not_found(EntityKind::Ticket, TicketId(1)).validation(),
            None
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = ReservationError::from(ValidationError::FlightDeparted {
            flight_id: FlightId(9),
        });
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
