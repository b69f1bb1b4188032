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

//! Reservation processing engine.
//!
//! The [`ReservationEngine`] is the only component that changes reservation
//! or seat status. It pairs every reservation transition with the seat
//! status change it implies and runs both under one lock.
//!
//! # Operations
//!
//! - **Create**: Claims a seat on a flight for a passenger (pending).
//! - **Confirm**: Pending reservation becomes confirmed.
//! - **Pay**: Charges a confirmed reservation; the seat becomes occupied.
//! - **Cancel**: Releases a pending reservation and its seat.
//! - **Force cancel**: Administrative refund path from any active status.
//! - **Delete**: Erases a reservation and its ticket.
//! - **Tickets**: Issue (get-or-create), cancel and use.
//!
//! # Thread Safety
//!
//! Mutations take a per-seat [`Mutex`] for their whole duration. The lock
//! spans the ledger write and the seat status write, so no other operation
//! on the same seat can observe one without the other. Different seats
//! proceed in parallel.
//!
//! # Seat status
//!
//! One aircraft flies many flights, so `seat.status` is an aircraft-wide
//! cache derived from every active reservation of the seat: occupied if any
//! of them is paid, reserved if any is pending or confirmed, available
//! otherwise. Per-flight availability always comes from the ledger; see
//! [`ReservationEngine::get_available_seats`].

use crate::base::{FlightId, PassengerId, ReservationId, SeatId, TicketId};
use crate::catalog::{FlightCatalog, PassengerDirectory};
use crate::error::{EntityKind, ReservationError, ValidationError};
use crate::history::{FlightHistory, FlightHistoryEntry};
use crate::ledger::ReservationLedger;
use crate::notify::{NotificationSink, ReservationEvent, TracingNotifier};
use crate::payment::PaymentGateway;
use crate::pricing::PricingCalculator;
use crate::reservation::{NewReservation, Reservation, ReservationStatus};
use crate::seat::{Seat, SeatInventory, SeatStatus};
use crate::ticket::{Ticket, TicketIssuer, TicketStatus};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates seats, reservations and tickets.
///
/// Collaborators are injected at construction; the engine owns no global
/// state.
///
/// # Invariants
///
/// - At most one active reservation per (flight, seat).
/// - At most one active reservation per (flight, passenger).
/// - A seat with a paid active reservation is occupied; a seat with only
///   pending or confirmed ones is reserved; a seat with none is available.
/// - Cancelling a reservation cancels its ticket unless the ticket was used.
pub struct ReservationEngine {
    catalog: Arc<dyn FlightCatalog>,
    passengers: Arc<dyn PassengerDirectory>,
    inventory: Arc<SeatInventory>,
    ledger: ReservationLedger,
    tickets: TicketIssuer,
    pricing: PricingCalculator,
    history: Arc<FlightHistory>,
    notifier: Arc<dyn NotificationSink>,
    /// Transaction boundary per seat, created on first use.
    seat_locks: DashMap<SeatId, Arc<Mutex<()>>>,
}

impl ReservationEngine {
    /// Creates an engine with an empty ledger, ticket store and history.
    ///
    /// Events go to a [`TracingNotifier`] until
    /// [`with_notifier`](Self::with_notifier) replaces it.
    pub fn new(
        catalog: Arc<dyn FlightCatalog>,
        passengers: Arc<dyn PassengerDirectory>,
        inventory: Arc<SeatInventory>,
    ) -> Self {
        Self {
            catalog,
            passengers,
            inventory,
            ledger: ReservationLedger::new(),
            tickets: TicketIssuer::new(),
            pricing: PricingCalculator::new(),
            history: Arc::new(FlightHistory::new()),
            notifier: Arc::new(TracingNotifier),
            seat_locks: DashMap::new(),
        }
    }

    pub fn with_history(mut self, history: Arc<FlightHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn catalog(&self) -> &dyn FlightCatalog {
        self.catalog.as_ref()
    }

    pub fn inventory(&self) -> &SeatInventory {
        &self.inventory
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    pub fn tickets(&self) -> &TicketIssuer {
        &self.tickets
    }

    pub fn history(&self) -> &FlightHistory {
        &self.history
    }

    /// Reserves `seat_id` on `flight_id` for a passenger.
    ///
    /// When `price` is `None` it is computed from the flight's base price and
    /// the seat type's multiplier. The reservation starts pending and the
    /// seat becomes reserved. If the seat update fails the reservation is
    /// rolled back.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown flight, seat, passenger or seat type.
    /// - [`ValidationError::SeatNotOnAircraft`] - Seat belongs to another aircraft.
    /// - [`ValidationError::FlightDeparted`] - Flight has already left.
    /// - [`ValidationError::InvalidPrice`] - Explicit price is not positive.
    /// - [`ValidationError::DuplicateSeat`] - Seat already held on this flight.
    /// - [`ValidationError::DuplicatePassengerOnFlight`] - Passenger already booked on this flight.
    pub fn create_reservation(
        &self,
        flight_id: FlightId,
        passenger_id: PassengerId,
        seat_id: SeatId,
        price: Option<Decimal>,
    ) -> Result<Reservation, ReservationError> {
        let flight = self
            .catalog
            .flight(flight_id)
            .ok_or_else(|| ReservationError::not_found(EntityKind::Flight, flight_id))?;
        let seat = self.inventory.get_seat(seat_id)?;
        if self.passengers.passenger(passenger_id).is_none() {
            return Err(ReservationError::not_found(EntityKind::Passenger, passenger_id));
        }

        if seat.aircraft_id != flight.aircraft_id {
            return Err(ValidationError::SeatNotOnAircraft { flight_id, seat_id }.into());
        }
        if flight.has_departed(Utc::now()) {
            return Err(ValidationError::FlightDeparted { flight_id }.into());
        }

        let price = match price {
            Some(price) => price,
            None => {
                let multiplier = match seat.seat_type {
                    Some(type_id) => Some(
                        self.catalog
                            .seat_type(type_id)
                            .ok_or_else(|| ReservationError::not_found(EntityKind::SeatType, type_id))?
                            .price_multiplier,
                    ),
                    None => None,
                };
                self.pricing.compute_price(flight.base_price, multiplier)
            }
        };

        let lock = self.seat_lock(seat_id);
        let _guard = lock.lock();

        let reservation = self.ledger.create(NewReservation {
            flight_id,
            passenger_id,
            seat_id,
            price,
        })?;

        if let Err(err) = self.sync_seat(seat_id) {
            warn!(reservation_id = %reservation.id, %err, "seat update failed, rolling back reservation");
            self.ledger.remove(reservation.id)?;
            return Err(err);
        }

        self.history.record(FlightHistoryEntry {
            passenger_id,
            flight_id,
            reservation_id: reservation.id,
            seat_number: seat.number(),
            price_paid: reservation.price,
            booked_at: reservation.created_at,
        });

        info!(
            reservation_id = %reservation.id,
            %flight_id,
            %passenger_id,
            seat = %seat.number(),
            price = %reservation.price,
            "reservation created"
        );
        self.notifier.notify(&ReservationEvent::Created {
            reservation_id: reservation.id,
            flight_id,
            passenger_id,
            seat_id,
        });
        Ok(reservation)
    }

    /// Confirms a pending reservation.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown reservation.
    /// - [`ValidationError::InvalidTransition`] - Reservation is not pending.
    pub fn confirm_reservation(&self, id: ReservationId) -> Result<Reservation, ReservationError> {
        let seat_id = self.ledger.get(id)?.seat_id;
        let lock = self.seat_lock(seat_id);
        let _guard = lock.lock();

        let reservation = self.ledger.transition(id, ReservationStatus::Confirmed)?;
        info!(reservation_id = %id, "reservation confirmed");
        self.notifier
            .notify(&ReservationEvent::Confirmed { reservation_id: id });
        Ok(reservation)
    }

    /// Charges a confirmed reservation and marks it paid.
    ///
    /// The gateway is called before anything changes. A declined charge
    /// leaves the reservation confirmed.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown reservation.
    /// - [`ValidationError::InvalidTransition`] - Reservation is not confirmed.
    /// - [`ValidationError::PaymentDeclined`] - Gateway refused the charge.
    pub fn pay_reservation(
        &self,
        id: ReservationId,
        gateway: &dyn PaymentGateway,
    ) -> Result<Reservation, ReservationError> {
        let seat_id = self.ledger.get(id)?.seat_id;
        let lock = self.seat_lock(seat_id);
        let _guard = lock.lock();

        let current = self.ledger.get(id)?;
        if current.status != ReservationStatus::Confirmed {
            return Err(ValidationError::InvalidTransition {
                reservation_id: id,
                from: current.status,
                to: ReservationStatus::Paid,
            }
            .into());
        }

        let receipt = gateway.charge(&current).map_err(|declined| {
            warn!(reservation_id = %id, reason = %declined.reason, "payment declined");
            ValidationError::PaymentDeclined {
                reservation_id: id,
                reason: declined.reason,
            }
        })?;

        let paid = self.ledger.mark_paid(id, receipt.reference.clone())?;
        if let Err(err) = self.sync_or_restore(seat_id, current) {
            warn!(reservation_id = %id, reference = %receipt.reference, "charge left without a paid reservation");
            return Err(err);
        }

        info!(reservation_id = %id, reference = %receipt.reference, "reservation paid");
        self.notifier.notify(&ReservationEvent::Paid {
            reservation_id: id,
            payment_reference: receipt.reference,
        });
        Ok(paid)
    }

    /// Cancels a pending reservation.
    ///
    /// Confirmed and paid reservations are refused here; they go through
    /// [`force_cancel_reservation`](Self::force_cancel_reservation).
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown reservation.
    /// - [`ValidationError::InvalidTransition`] - Reservation is not pending.
    pub fn cancel_reservation(&self, id: ReservationId) -> Result<Reservation, ReservationError> {
        self.cancel(id, false)
    }

    /// Cancels a reservation from any active status (refund path).
    pub fn force_cancel_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Reservation, ReservationError> {
        self.cancel(id, true)
    }

    fn cancel(&self, id: ReservationId, forced: bool) -> Result<Reservation, ReservationError> {
        let seat_id = self.ledger.get(id)?.seat_id;
        let lock = self.seat_lock(seat_id);
        let _guard = lock.lock();

        let previous = self.ledger.get(id)?;
        let cancelled = if forced {
            self.ledger.override_cancel(id)?
        } else {
            self.ledger.transition(id, ReservationStatus::Cancelled)?
        };
        self.sync_or_restore(seat_id, previous)?;
        self.cancel_issued_ticket(id);

        info!(reservation_id = %id, forced, "reservation cancelled");
        self.notifier.notify(&ReservationEvent::Cancelled {
            reservation_id: id,
            forced,
        });
        Ok(cancelled)
    }

    /// Cancels the reservation's ticket if it is still issued.
    fn cancel_issued_ticket(&self, reservation_id: ReservationId) {
        let Some(ticket) = self.tickets.for_reservation(reservation_id) else {
            return;
        };
        if ticket.status != TicketStatus::Issued {
            debug!(ticket_id = %ticket.id, status = %ticket.status, "ticket kept");
            return;
        }
        match self.tickets.cancel(ticket.id) {
            Ok(ticket) => self.notifier.notify(&ReservationEvent::TicketCancelled {
                ticket_id: ticket.id,
                reservation_id,
            }),
            // Used for boarding in the meantime
            Err(err) => debug!(ticket_id = %ticket.id, %err, "ticket kept"),
        }
    }

    /// Erases a reservation and its ticket, releasing the seat.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown reservation.
    pub fn delete_reservation(&self, id: ReservationId) -> Result<Reservation, ReservationError> {
        let seat_id = self.ledger.get(id)?.seat_id;
        let lock = self.seat_lock(seat_id);
        let _guard = lock.lock();

        let removed = self.ledger.remove(id)?;
        self.sync_or_restore(seat_id, removed.clone())?;
        self.tickets.remove_for_reservation(id);

        info!(reservation_id = %id, "reservation deleted");
        self.notifier
            .notify(&ReservationEvent::Deleted { reservation_id: id });
        Ok(removed)
    }

    /// Issues the ticket for a confirmed or paid reservation.
    ///
    /// Calling it again returns the same ticket.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown reservation.
    /// - [`ValidationError::NotTicketEligible`] - Reservation is pending or cancelled.
    pub fn issue_ticket(&self, reservation_id: ReservationId) -> Result<Ticket, ReservationError> {
        let seat_id = self.ledger.get(reservation_id)?.seat_id;
        let lock = self.seat_lock(seat_id);
        let _guard = lock.lock();

        let reservation = self.ledger.get(reservation_id)?;
        let issued = self.tickets.issue(&reservation)?;
        if issued.newly_issued {
            info!(%reservation_id, ticket_id = %issued.ticket.id, "ticket issued");
            self.notifier.notify(&ReservationEvent::TicketIssued {
                ticket_id: issued.ticket.id,
                reservation_id,
            });
        } else {
            debug!(%reservation_id, ticket_id = %issued.ticket.id, "ticket already issued");
        }
        Ok(issued.ticket)
    }

    /// Cancels an issued ticket. The reservation is left as it is.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown ticket.
    /// - [`ValidationError::AlreadyUsed`] - Ticket was used for boarding.
    /// - [`ValidationError::TicketAlreadyCancelled`] - Ticket is already cancelled.
    pub fn cancel_ticket(&self, ticket_id: TicketId) -> Result<Ticket, ReservationError> {
        let ticket = self.tickets.cancel(ticket_id)?;
        info!(%ticket_id, "ticket cancelled");
        self.notifier.notify(&ReservationEvent::TicketCancelled {
            ticket_id,
            reservation_id: ticket.reservation_id,
        });
        Ok(ticket)
    }

    /// Marks a ticket as used at boarding.
    pub fn use_ticket(&self, ticket_id: TicketId) -> Result<Ticket, ReservationError> {
        let ticket = self.tickets.mark_used(ticket_id)?;
        info!(%ticket_id, "ticket used");
        self.notifier.notify(&ReservationEvent::TicketUsed {
            ticket_id,
            reservation_id: ticket.reservation_id,
        });
        Ok(ticket)
    }

    /// Seats of the flight's aircraft not held by an active reservation on
    /// this flight, ordered by row then column.
    ///
    /// This is a set difference over the ledger. `seat.status` in the result
    /// reflects the aircraft as a whole and may be `Reserved` because of
    /// another flight.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown flight.
    pub fn get_available_seats(&self, flight_id: FlightId) -> Result<Vec<Seat>, ReservationError> {
        let flight = self
            .catalog
            .flight(flight_id)
            .ok_or_else(|| ReservationError::not_found(EntityKind::Flight, flight_id))?;
        let held = self.ledger.active_seat_ids(flight_id);

        let seats: Vec<Seat> = self
            .inventory
            .list_seats(flight.aircraft_id)
            .into_iter()
            .filter(|seat| !held.contains(&seat.id))
            .collect();
        debug!(%flight_id, available = seats.len(), "available seats listed");
        Ok(seats)
    }

    pub fn get_reservation(&self, id: ReservationId) -> Result<Reservation, ReservationError> {
        self.ledger.get(id)
    }

    pub fn find_reservation_by_code(&self, code: &str) -> Option<Reservation> {
        self.ledger.find_by_code(code)
    }

    /// Every reservation of a passenger, any status, ordered by ID.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown passenger.
    pub fn list_reservations_by_passenger(
        &self,
        passenger_id: PassengerId,
    ) -> Result<Vec<Reservation>, ReservationError> {
        if self.passengers.passenger(passenger_id).is_none() {
            return Err(ReservationError::not_found(EntityKind::Passenger, passenger_id));
        }
        Ok(self.ledger.list_by_passenger(passenger_id))
    }

    /// Every reservation on a flight, any status, ordered by ID.
    pub fn list_reservations_by_flight(
        &self,
        flight_id: FlightId,
    ) -> Result<Vec<Reservation>, ReservationError> {
        if self.catalog.flight(flight_id).is_none() {
            return Err(ReservationError::not_found(EntityKind::Flight, flight_id));
        }
        Ok(self.ledger.list_by_flight(flight_id))
    }

    /// Passengers holding a seat on a flight: every pending, confirmed or
    /// paid reservation, ordered by ID.
    pub fn passenger_manifest(
        &self,
        flight_id: FlightId,
    ) -> Result<Vec<Reservation>, ReservationError> {
        let mut reservations = self.list_reservations_by_flight(flight_id)?;
        reservations.retain(|reservation| reservation.status.is_active());
        Ok(reservations)
    }

    pub fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, ReservationError> {
        self.tickets.get(ticket_id)
    }

    pub fn ticket_for_reservation(&self, reservation_id: ReservationId) -> Option<Ticket> {
        self.tickets.for_reservation(reservation_id)
    }

    pub fn flight_history_for_passenger(&self, passenger_id: PassengerId) -> Vec<FlightHistoryEntry> {
        self.history.for_passenger(passenger_id)
    }

    pub fn flight_history_for_flight(&self, flight_id: FlightId) -> Vec<FlightHistoryEntry> {
        self.history.for_flight(flight_id)
    }

    fn seat_lock(&self, seat_id: SeatId) -> Arc<Mutex<()>> {
        // Clone out so the map shard is released before blocking on the mutex
        Arc::clone(self.seat_locks.entry(seat_id).or_default().value())
    }

    /// Syncs the seat after a ledger change, putting `previous` back in the
    /// ledger if the seat cannot follow.
    fn sync_or_restore(&self, seat_id: SeatId, previous: Reservation) -> Result<(), ReservationError> {
        if let Err(err) = self.sync_seat(seat_id) {
            warn!(reservation_id = %previous.id, %err, "seat update failed, restoring reservation");
            self.ledger.restore(previous)?;
            return Err(err);
        }
        Ok(())
    }

    /// Recomputes the cached seat status from the seat's active reservations.
    ///
    /// Caller must hold the seat lock.
    fn sync_seat(&self, seat_id: SeatId) -> Result<Seat, ReservationError> {
        let active = self.ledger.active_for_seat(seat_id);
        let target = if active
            .iter()
            .any(|reservation| reservation.status == ReservationStatus::Paid)
        {
            SeatStatus::Occupied
        } else if active.is_empty() {
            SeatStatus::Available
        } else {
            SeatStatus::Reserved
        };

        let internal =
            |err: ReservationError| ReservationError::Internal(format!("seat {seat_id}: {err}"));

        let current = self.inventory.get_seat(seat_id).map_err(internal)?;
        if current.status == target {
            return Ok(current);
        }
        if !current.status.can_transition_to(target) {
            // Occupied -> Reserved and Available -> Occupied take two steps
            let via = match current.status {
                SeatStatus::Occupied => SeatStatus::Available,
                _ => SeatStatus::Reserved,
            };
            self.inventory.set_status(seat_id, via).map_err(internal)?;
        }
        let seat = self.inventory.set_status(seat_id, target).map_err(internal)?;
        debug!(%seat_id, status = %seat.status, "seat status updated");
        Ok(seat)
    }
}
