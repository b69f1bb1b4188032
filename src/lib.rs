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

//! # Flight Reservations
//!
//! Seat inventory and reservation engine for airline bookings. Turns a seat
//! selection into a confirmed, paid and ticketed reservation while keeping
//! every seat claimed by at most one active reservation per flight.
//!
//! ## Core Components
//!
//! - [`ReservationEngine`]: Orchestrates every reservation and seat change
//! - [`SeatInventory`]: Seats per aircraft and their cached status
//! - [`ReservationLedger`]: Reservation records and their uniqueness constraints
//! - [`TicketIssuer`]: Tickets, one per confirmed or paid reservation
//! - [`PricingCalculator`]: Base fare times seat type multiplier, in cents
//! - [`ReservationError`]: Error types for rejected operations
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use flight_reservations_rs::{
//!     AircraftId, Flight, FlightId, InMemoryCatalog, Passenger, PassengerId,
//!     ReservationEngine, ReservationStatus, SeatInventory, SimulatedGateway,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(InMemoryCatalog::new());
//! let departure = Utc::now() + Duration::days(3);
//! catalog.add_flight(Flight {
//!     id: FlightId(1),
//!     aircraft_id: AircraftId(1),
//!     origin: "Lisbon".into(),
//!     destination: "Porto".into(),
//!     departure,
//!     arrival: departure + Duration::hours(1),
//!     base_price: dec!(80.00),
//! }).unwrap();
//! catalog.add_passenger(Passenger {
//!     id: PassengerId(1),
//!     first_name: "Ana".into(),
//!     last_name: None,
//!     email: "ana@example.com".into(),
//! }).unwrap();
//!
//! let inventory = Arc::new(SeatInventory::new());
//! let seats = inventory.provision(AircraftId(1), 1..=10, "ABCD", None).unwrap();
//!
//! let engine = ReservationEngine::new(catalog.clone(), catalog, inventory);
//! let reservation = engine
//!     .create_reservation(FlightId(1), PassengerId(1), seats[0].id, None)
//!     .unwrap();
//! assert_eq!(reservation.price, dec!(80.00));
//!
//! engine.confirm_reservation(reservation.id).unwrap();
//! let paid = engine.pay_reservation(reservation.id, &SimulatedGateway).unwrap();
//! assert_eq!(paid.status, ReservationStatus::Paid);
//!
//! let ticket = engine.issue_ticket(reservation.id).unwrap();
//! assert_eq!(engine.issue_ticket(reservation.id).unwrap(), ticket);
//! assert_eq!(engine.get_available_seats(FlightId(1)).unwrap().len(), 39);
//! ```
//!
//! ## Thread Safety
//!
//! All components are `Send + Sync` and take `&self`. The engine serialises
//! operations per seat, so bookings on different seats run in parallel.

mod base;
pub mod catalog;
mod engine;
pub mod error;
pub mod history;
mod ledger;
pub mod notify;
pub mod payment;
mod pricing;
mod reservation;
mod seat;
mod ticket;

pub use base::{
    AircraftId, FlightId, PassengerId, ReservationCode, ReservationId, SeatId, SeatTypeId,
    TicketId,
};
pub use catalog::{Flight, FlightCatalog, InMemoryCatalog, Passenger, PassengerDirectory, SeatType};
pub use engine::ReservationEngine;
pub use error::{EntityKind, ReservationError, ValidationError};
pub use history::{FlightHistory, FlightHistoryEntry};
pub use ledger::ReservationLedger;
pub use notify::{NotificationSink, QueueNotifier, ReservationEvent, TracingNotifier};
pub use payment::{PaymentDeclined, PaymentGateway, PaymentReceipt, SimulatedGateway};
pub use pricing::PricingCalculator;
pub use reservation::{Reservation, ReservationStatus};
pub use seat::{Seat, SeatInventory, SeatStatus};
pub use ticket::{Ticket, TicketIssuer, TicketStatus};
