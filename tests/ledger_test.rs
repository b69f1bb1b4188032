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

//! Component-level integration tests: seat inventory and pricing used
//! directly, and the read-only ledger and ticket views the engine exposes.

use chrono::{Duration, Utc};
use flight_reservations_rs::{
    AircraftId, EntityKind, Flight, FlightId, InMemoryCatalog, Passenger, PassengerId,
    PricingCalculator, ReservationEngine, ReservationError, ReservationId, ReservationStatus, Seat,
    SeatId, SeatInventory, SeatStatus, SeatTypeId, TicketStatus, ValidationError,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

// =============================================================================
// SeatInventory
// =============================================================================

#[test]
fn provision_assigns_sequential_ids_and_types() {
    let inventory = SeatInventory::new();
    let business = inventory
        .provision(AircraftId(7), 1..=2, "AC", Some(SeatTypeId(2)))
        .unwrap();
    let economy = inventory.provision(AircraftId(7), 3..=3, "ABCD", None).unwrap();

    assert_eq!(business.len(), 4);
    assert_eq!(economy.len(), 4);
    assert_eq!(business[0].id, SeatId(1));
    assert_eq!(economy[3].id, SeatId(8));
    assert!(business.iter().all(|s| s.seat_type == Some(SeatTypeId(2))));
    assert!(inventory
        .list_seats(AircraftId(7))
        .iter()
        .all(|s| s.status == SeatStatus::Available));
}

#[test]
fn provision_stops_at_duplicate_position() {
    let inventory = SeatInventory::new();
    inventory.add_seat(AircraftId(1), 2, "B", None).unwrap();

    let result = inventory.provision(AircraftId(1), 1..=2, "AB", None);
    assert_eq!(
        result,
        Err(ValidationError::DuplicateSeatPosition {
            aircraft_id: AircraftId(1),
            row: 2,
            column: 'B',
        }
        .into())
    );
    // 1A, 1B and 2A were created before the clash
    assert_eq!(inventory.list_seats(AircraftId(1)).len(), 4);
}

#[test]
fn list_seats_of_unknown_aircraft_is_empty() {
    let inventory = SeatInventory::new();
    inventory.provision(AircraftId(1), 1..=1, "A", None).unwrap();
    assert!(inventory.list_seats(AircraftId(2)).is_empty());
}

// =============================================================================
// Ledger and ticket views
// =============================================================================

fn booking_engine() -> (ReservationEngine, Vec<Seat>) {
    let catalog = Arc::new(InMemoryCatalog::new());
    let departure = Utc::now() + Duration::days(5);
    catalog
        .add_flight(Flight {
            id: FlightId(1),
            aircraft_id: AircraftId(1),
            origin: "OPO".into(),
            destination: "FNC".into(),
            departure,
            arrival: departure + Duration::minutes(100),
            base_price: dec!(90.00),
        })
        .unwrap();
    for (id, name) in [(1, "Rita"), (2, "Nuno")] {
        catalog
            .add_passenger(Passenger {
                id: PassengerId(id),
                first_name: name.into(),
                last_name: None,
                email: format!("{}@example.com", name.to_lowercase()),
            })
            .unwrap();
    }

    let inventory = Arc::new(SeatInventory::new());
    let seats = inventory.provision(AircraftId(1), 1..=2, "AB", None).unwrap();
    let engine = ReservationEngine::new(catalog.clone(), catalog, inventory);
    (engine, seats)
}

#[test]
fn ledger_view_follows_engine_writes() {
    let (engine, seats) = booking_engine();
    let first = engine
        .create_reservation(FlightId(1), PassengerId(1), seats[0].id, None)
        .unwrap();
    let second = engine
        .create_reservation(FlightId(1), PassengerId(2), seats[1].id, None)
        .unwrap();
    engine.cancel_reservation(second.id).unwrap();

    let ledger = engine.ledger();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.list_by_passenger(PassengerId(1)), vec![first.clone()]);
    assert_eq!(ledger.find_by_code(first.code.as_str()), Some(first.clone()));
    assert_eq!(ledger.active_for_seat(seats[0].id), vec![first]);
    assert!(ledger.active_for_seat(seats[1].id).is_empty());
    assert_eq!(
        ledger.active_seat_ids(FlightId(1)).into_iter().collect::<Vec<_>>(),
        vec![seats[0].id]
    );
    assert_eq!(
        ledger.get(ReservationId(9)),
        Err(ReservationError::NotFound {
            entity: EntityKind::Reservation,
            id: 9,
        })
    );
}

#[test]
fn ticket_view_follows_engine_writes() {
    let (engine, seats) = booking_engine();
    let reservation = engine
        .create_reservation(FlightId(1), PassengerId(1), seats[2].id, None)
        .unwrap();
    engine.confirm_reservation(reservation.id).unwrap();
    let ticket = engine.issue_ticket(reservation.id).unwrap();
    engine.use_ticket(ticket.id).unwrap();

    let tickets = engine.tickets();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets.get(ticket.id).unwrap().status, TicketStatus::Used);
    assert_eq!(
        tickets.for_reservation(reservation.id).map(|t| t.id),
        Some(ticket.id)
    );
    assert!(tickets.for_reservation(ReservationId(9)).is_none());
}

#[test]
fn seat_status_stays_with_reservation_status() {
    let (engine, seats) = booking_engine();
    let seat = seats[3].id;
    let reservation = engine
        .create_reservation(FlightId(1), PassengerId(2), seat, None)
        .unwrap();

    // Cancelling is only possible through the engine, which frees the seat
    let cancelled = engine.cancel_reservation(reservation.id).unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(
        engine.ledger().get(reservation.id).unwrap().status,
        ReservationStatus::Cancelled
    );
    assert_eq!(
        engine.inventory().get_seat(seat).unwrap().status,
        SeatStatus::Available
    );
}

// =============================================================================
// PricingCalculator
// =============================================================================

#[test]
fn pricing_is_exact_and_half_up() {
    let pricing = PricingCalculator::new();
    assert_eq!(pricing.compute_price(dec!(100.00), Some(dec!(1.5))), dec!(150.00));
    assert_eq!(pricing.compute_price(dec!(200.00), Some(dec!(1.5))), dec!(300.00));
    assert_eq!(pricing.compute_price(dec!(0.01), Some(dec!(0.5))), dec!(0.01));
    assert_eq!(pricing.compute_price(dec!(33.33), Some(dec!(3))), dec!(99.99));
    assert_eq!(PricingCalculator::CURRENCY_PRECISION, 2);
}
