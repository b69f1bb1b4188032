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

//! Thread-safe reservation ledger with uniqueness constraints.
//!
//! Two claim indexes act as unique constraints restricted to active
//! reservations: one keyed by `(flight, seat)` and one keyed by
//! `(flight, passenger)`. Claims are taken through the [`DashMap`] entry API,
//! so of two concurrent writers on the same key exactly one succeeds.
//!
//! Lock order is always seat claims, then passenger claims, then codes, then
//! reservation rows. No method holds a row guard while touching an index.

use crate::base::{FlightId, PassengerId, ReservationCode, ReservationId, SeatId};
use crate::error::{EntityKind, ReservationError, ValidationError};
use crate::reservation::{NewReservation, Reservation, ReservationStatus};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reservation records plus the claim indexes that keep them unique.
///
/// Only [`ReservationEngine`](crate::ReservationEngine) writes to the ledger,
/// so a reservation never changes status without its seat following. Outside
/// the crate the ledger is read-only:
///
/// ```compile_fail
/// use flight_reservations_rs::{ReservationId, ReservationLedger, ReservationStatus};
///
/// let ledger = ReservationLedger::new();
/// ledger.transition(ReservationId(1), ReservationStatus::Cancelled);
/// ```
#[derive(Debug)]
pub struct ReservationLedger {
    reservations: DashMap<ReservationId, Reservation>,
    seat_claims: DashMap<(FlightId, SeatId), ReservationId>,
    passenger_claims: DashMap<(FlightId, PassengerId), ReservationId>,
    codes: DashMap<ReservationCode, ReservationId>,
    next_id: AtomicU64,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self {
            reservations: DashMap::new(),
            seat_claims: DashMap::new(),
            passenger_claims: DashMap::new(),
            codes: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Records a new pending reservation.
    ///
    /// The seat constraint is checked before the passenger constraint.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidPrice`] - Price is zero or negative.
    /// - [`ValidationError::DuplicateSeat`] - Seat already held on this flight.
    /// - [`ValidationError::DuplicatePassengerOnFlight`] - Passenger already booked on this flight.
    pub(crate) fn create(&self, request: NewReservation) -> Result<Reservation, ReservationError> {
        let NewReservation {
            flight_id,
            passenger_id,
            seat_id,
            price,
        } = request;

        if price <= Decimal::ZERO {
            return Err(ValidationError::InvalidPrice(price).into());
        }

        let seat_slot = match self.seat_claims.entry((flight_id, seat_id)) {
            Entry::Occupied(_) => {
                return Err(ValidationError::DuplicateSeat { flight_id, seat_id }.into());
            }
            Entry::Vacant(slot) => slot,
        };
        let passenger_slot = match self.passenger_claims.entry((flight_id, passenger_id)) {
            Entry::Occupied(_) => {
                return Err(ValidationError::DuplicatePassengerOnFlight {
                    flight_id,
                    passenger_id,
                }
                .into());
            }
            Entry::Vacant(slot) => slot,
        };

        let id = ReservationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let reservation = Reservation {
            id,
            code: self.claim_code(id),
            flight_id,
            passenger_id,
            seat_id,
            status: ReservationStatus::Pending,
            price,
            payment_reference: None,
            created_at: Utc::now(),
        };

        self.reservations.insert(id, reservation.clone());
        passenger_slot.insert(id);
        seat_slot.insert(id);
        Ok(reservation)
    }

    /// Draws codes until one is free, then reserves it for `id`.
    fn claim_code(&self, id: ReservationId) -> ReservationCode {
        loop {
            if let Entry::Vacant(slot) = self.codes.entry(ReservationCode::generate()) {
                let code = slot.key().clone();
                slot.insert(id);
                return code;
            }
        }
    }

    /// Moves a reservation along the ordinary lifecycle.
    ///
    /// Entering [`ReservationStatus::Cancelled`] releases the seat and
    /// passenger claims.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown reservation.
    /// - [`ValidationError::InvalidTransition`] - Move not allowed from the current status.
    pub(crate) fn transition(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation, ReservationError> {
        self.apply(id, status, false, None)
    }

    /// Cancels a reservation from any active status (refund path).
    pub(crate) fn override_cancel(&self, id: ReservationId) -> Result<Reservation, ReservationError> {
        self.apply(id, ReservationStatus::Cancelled, true, None)
    }

    /// Moves a confirmed reservation to paid, recording the payment reference.
    pub(crate) fn mark_paid(
        &self,
        id: ReservationId,
        payment_reference: String,
    ) -> Result<Reservation, ReservationError> {
        self.apply(id, ReservationStatus::Paid, false, Some(payment_reference))
    }

    fn apply(
        &self,
        id: ReservationId,
        status: ReservationStatus,
        override_cancel: bool,
        payment_reference: Option<String>,
    ) -> Result<Reservation, ReservationError> {
        let updated = {
            let mut reservation = self
                .reservations
                .get_mut(&id)
                .ok_or_else(|| ReservationError::not_found(EntityKind::Reservation, id))?;

            if !reservation.status.can_transition_to(status, override_cancel) {
                return Err(ValidationError::InvalidTransition {
                    reservation_id: id,
                    from: reservation.status,
                    to: status,
                }
                .into());
            }

            reservation.status = status;
            if payment_reference.is_some() {
                reservation.payment_reference = payment_reference;
            }
            reservation.clone()
        };

        if !updated.status.is_active() {
            self.release_claims(&updated);
        }
        Ok(updated)
    }

    fn release_claims(&self, reservation: &Reservation) {
        let id = reservation.id;
        self.seat_claims
            .remove_if(&(reservation.flight_id, reservation.seat_id), |_, owner| {
                *owner == id
            });
        self.passenger_claims.remove_if(
            &(reservation.flight_id, reservation.passenger_id),
            |_, owner| *owner == id,
        );
        debug_assert!(
            self.seat_claims
                .get(&(reservation.flight_id, reservation.seat_id))
                .is_none_or(|owner| *owner != id),
            "Invariant violated: released reservation {id} still claims its seat"
        );
    }

    /// Physically deletes a reservation and releases its claims.
    ///
    /// Used for administrative deletion and to abort an insert whose
    /// enclosing transaction failed.
    pub(crate) fn remove(&self, id: ReservationId) -> Result<Reservation, ReservationError> {
        let (_, reservation) = self
            .reservations
            .remove(&id)
            .ok_or_else(|| ReservationError::not_found(EntityKind::Reservation, id))?;
        self.release_claims(&reservation);
        self.codes.remove(&reservation.code);
        Ok(reservation)
    }

    /// Puts a reservation back exactly as it was before a change whose
    /// enclosing transaction failed, re-taking its claims if it was active.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::Internal`] - Another reservation holds one of its claims.
    pub(crate) fn restore(&self, previous: Reservation) -> Result<(), ReservationError> {
        let id = previous.id;
        if previous.status.is_active() {
            let seat_key = (previous.flight_id, previous.seat_id);
            let seat_taken = reclaim(&self.seat_claims, seat_key, id)?;
            if let Err(err) = reclaim(
                &self.passenger_claims,
                (previous.flight_id, previous.passenger_id),
                id,
            ) {
                if seat_taken {
                    self.seat_claims.remove_if(&seat_key, |_, owner| *owner == id);
                }
                return Err(err);
            }
        }
        self.codes.insert(previous.code.clone(), id);
        self.reservations.insert(id, previous);
        Ok(())
    }

    pub fn get(&self, id: ReservationId) -> Result<Reservation, ReservationError> {
        self.reservations
            .get(&id)
            .map(|reservation| reservation.clone())
            .ok_or_else(|| ReservationError::not_found(EntityKind::Reservation, id))
    }

    pub fn find_by_code(&self, code: &str) -> Option<Reservation> {
        let id = *self.codes.get(code)?;
        self.reservations.get(&id).map(|reservation| reservation.clone())
    }

    /// All reservations for a flight, any status, ordered by ID.
    pub fn list_by_flight(&self, flight_id: FlightId) -> Vec<Reservation> {
        self.collect(|reservation| reservation.flight_id == flight_id)
    }

    /// All reservations of a passenger, any status, ordered by ID.
    pub fn list_by_passenger(&self, passenger_id: PassengerId) -> Vec<Reservation> {
        self.collect(|reservation| reservation.passenger_id == passenger_id)
    }

    /// Every reservation, ordered by ID.
    pub fn list_all(&self) -> Vec<Reservation> {
        self.collect(|_| true)
    }

    /// Active reservations holding `seat_id` on any flight.
    pub fn active_for_seat(&self, seat_id: SeatId) -> Vec<Reservation> {
        let owners: Vec<ReservationId> = self
            .seat_claims
            .iter()
            .filter(|claim| claim.key().1 == seat_id)
            .map(|claim| *claim.value())
            .collect();
        let mut reservations: Vec<Reservation> = owners
            .into_iter()
            .filter_map(|id| self.reservations.get(&id).map(|row| row.clone()))
            .filter(|reservation| reservation.status.is_active())
            .collect();
        reservations.sort_by_key(|reservation| reservation.id);
        reservations
    }

    /// Seats claimed by active reservations on a flight.
    pub fn active_seat_ids(&self, flight_id: FlightId) -> HashSet<SeatId> {
        self.seat_claims
            .iter()
            .filter(|claim| claim.key().0 == flight_id)
            .map(|claim| claim.key().1)
            .collect()
    }

    fn collect(&self, filter: impl Fn(&Reservation) -> bool) -> Vec<Reservation> {
        let mut reservations: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|reservation| filter(reservation.value()))
            .map(|reservation| reservation.value().clone())
            .collect();
        reservations.sort_by_key(|reservation| reservation.id);
        reservations
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }
}

/// Claims `key` for `id`. Returns whether the claim was newly taken.
fn reclaim<K: Eq + Hash>(
    claims: &DashMap<K, ReservationId>,
    key: K,
    id: ReservationId,
) -> Result<bool, ReservationError> {
    match claims.entry(key) {
        Entry::Occupied(slot) if *slot.get() != id => Err(ReservationError::Internal(format!(
            "reservation {id} lost its claim to reservation {}",
            slot.get()
        ))),
        Entry::Occupied(_) => Ok(false),
        Entry::Vacant(slot) => {
            slot.insert(id);
            Ok(true)
        }
    }
}

impl Default for ReservationLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(flight: u32, passenger: u32, seat: u32) -> NewReservation {
        NewReservation {
            flight_id: FlightId(flight),
            passenger_id: PassengerId(passenger),
            seat_id: SeatId(seat),
            price: dec!(120.00),
        }
    }

    #[test]
    fn create_starts_pending_with_sequential_ids() {
        let ledger = ReservationLedger::new();
        let first = ledger.create(request(1, 1, 1)).unwrap();
        let second = ledger.create(request(1, 2, 2)).unwrap();

        assert_eq!(first.id, ReservationId(1));
        assert_eq!(second.id, ReservationId(2));
        assert_eq!(first.status, ReservationStatus::Pending);
        assert_eq!(first.code.as_str().len(), ReservationCode::LENGTH);
        assert_ne!(first.code, second.code);
    }

    #[test]
    fn seat_conflict_is_reported_before_passenger_conflict() {
        let ledger = ReservationLedger::new();
        ledger.create(request(1, 1, 1)).unwrap();

        // Same seat and same passenger: the seat wins
        let result = ledger.create(request(1, 1, 1));
        assert_eq!(
            result,
            Err(ValidationError::DuplicateSeat {
                flight_id: FlightId(1),
                seat_id: SeatId(1),
            }
            .into())
        );
    }

    #[test]
    fn rejected_create_leaves_no_claims() {
        let ledger = ReservationLedger::new();
        ledger.create(request(1, 1, 1)).unwrap();

        // Passenger conflict on a fresh seat must not leave seat 2 claimed
        assert!(ledger.create(request(1, 1, 2)).is_err());
        assert!(!ledger.active_seat_ids(FlightId(1)).contains(&SeatId(2)));
        ledger.create(request(1, 2, 2)).unwrap();
    }

    #[test]
    fn rejects_non_positive_price() {
        let ledger = ReservationLedger::new();
        let mut free = request(1, 1, 1);
        free.price = Decimal::ZERO;
        assert_eq!(
            ledger.create(free),
            Err(ValidationError::InvalidPrice(Decimal::ZERO).into())
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn cancel_releases_claims() {
        let ledger = ReservationLedger::new();
        let reservation = ledger.create(request(1, 1, 1)).unwrap();
        ledger
            .transition(reservation.id, ReservationStatus::Cancelled)
            .unwrap();

        assert!(ledger.active_seat_ids(FlightId(1)).is_empty());
        // Same passenger may now take the same seat again
        ledger.create(request(1, 1, 1)).unwrap();
    }

    #[test]
    fn mark_paid_records_reference() {
        let ledger = ReservationLedger::new();
        let reservation = ledger.create(request(1, 1, 1)).unwrap();
        ledger
            .transition(reservation.id, ReservationStatus::Confirmed)
            .unwrap();
        let paid = ledger.mark_paid(reservation.id, "txn-1".into()).unwrap();

        assert_eq!(paid.status, ReservationStatus::Paid);
        assert_eq!(paid.payment_reference.as_deref(), Some("txn-1"));
    }

    #[test]
    fn mark_paid_requires_confirmation() {
        let ledger = ReservationLedger::new();
        let reservation = ledger.create(request(1, 1, 1)).unwrap();
        let result = ledger.mark_paid(reservation.id, "txn-1".into());
        assert_eq!(
            result,
            Err(ValidationError::InvalidTransition {
                reservation_id: reservation.id,
                from: ReservationStatus::Pending,
                to: ReservationStatus::Paid,
            }
            .into())
        );
        assert_eq!(ledger.get(reservation.id).unwrap().payment_reference, None);
    }

    #[test]
    fn remove_frees_code_and_claims() {
        let ledger = ReservationLedger::new();
        let reservation = ledger.create(request(1, 1, 1)).unwrap();
        let code = reservation.code.clone();

        ledger.remove(reservation.id).unwrap();
        assert!(ledger.find_by_code(code.as_str()).is_none());
        assert!(ledger.active_seat_ids(FlightId(1)).is_empty());
        assert_eq!(
            ledger.get(reservation.id),
            Err(ReservationError::NotFound {
                entity: EntityKind::Reservation,
                id: reservation.id.0,
            })
        );
    }

    #[test]
    fn lists_by_flight_and_passenger() {
        let ledger = ReservationLedger::new();
        ledger.create(request(1, 1, 1)).unwrap();
        ledger.create(request(1, 2, 2)).unwrap();
        ledger.create(request(2, 1, 1)).unwrap();

        assert_eq!(ledger.list_by_flight(FlightId(1)).len(), 2);
        assert_eq!(ledger.list_by_passenger(PassengerId(1)).len(), 2);
        assert_eq!(ledger.list_all().len(), 3);
        assert!(ledger.list_by_flight(FlightId(3)).is_empty());
    }

    #[test]
    fn passenger_conflict_on_another_seat() {
        let ledger = ReservationLedger::new();
        ledger.create(request(1, 1, 1)).unwrap();

        assert_eq!(
            ledger.create(request(1, 1, 2)),
            Err(ValidationError::DuplicatePassengerOnFlight {
                flight_id: FlightId(1),
                passenger_id: PassengerId(1),
            }
            .into())
        );
    }

    #[test]
    fn override_cancel_releases_paid_claims() {
        let ledger = ReservationLedger::new();
        let reservation = ledger.create(request(1, 1, 1)).unwrap();
        ledger
            .transition(reservation.id, ReservationStatus::Confirmed)
            .unwrap();
        ledger.mark_paid(reservation.id, "ref".into()).unwrap();

        assert!(ledger
            .transition(reservation.id, ReservationStatus::Cancelled)
            .is_err());
        let cancelled = ledger.override_cancel(reservation.id).unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert!(ledger.active_seat_ids(FlightId(1)).is_empty());
        assert!(ledger.active_for_seat(SeatId(1)).is_empty());
    }

    #[test]
    fn cancelled_is_terminal_even_with_override() {
        let ledger = ReservationLedger::new();
        let reservation = ledger.create(request(1, 1, 1)).unwrap();
        ledger
            .transition(reservation.id, ReservationStatus::Cancelled)
            .unwrap();

        assert_eq!(
            ledger.override_cancel(reservation.id),
            Err(ValidationError::InvalidTransition {
                reservation_id: reservation.id,
                from: ReservationStatus::Cancelled,
                to: ReservationStatus::Cancelled,
            }
            .into())
        );
    }

    #[test]
    fn find_by_code() {
        let ledger = ReservationLedger::new();
        let reservation = ledger.create(request(1, 1, 1)).unwrap();

        assert_eq!(
            ledger.find_by_code(reservation.code.as_str()),
            Some(reservation)
        );
        assert_eq!(ledger.find_by_code("NOPE"), None);
    }

    #[test]
    fn transition_unknown_reservation() {
        let ledger = ReservationLedger::new();
        assert_eq!(
            ledger.transition(ReservationId(5), ReservationStatus::Confirmed),
            Err(ReservationError::NotFound {
                entity: EntityKind::Reservation,
                id: 5,
            })
        );
    }

    #[test]
    fn restore_undoes_cancel() {
        let ledger = ReservationLedger::new();
        let reservation = ledger.create(request(1, 1, 1)).unwrap();
        let confirmed = ledger
            .transition(reservation.id, ReservationStatus::Confirmed)
            .unwrap();
        ledger.override_cancel(reservation.id).unwrap();

        ledger.restore(confirmed.clone()).unwrap();
        assert_eq!(ledger.get(reservation.id), Ok(confirmed));
        assert!(ledger.active_seat_ids(FlightId(1)).contains(&SeatId(1)));
        // Claims are back: the seat and the passenger are both taken again
        assert!(ledger.create(request(1, 2, 1)).is_err());
        assert!(ledger.create(request(1, 1, 2)).is_err());
    }

    #[test]
    fn restore_undoes_remove() {
        let ledger = ReservationLedger::new();
        let reservation = ledger.create(request(1, 1, 1)).unwrap();
        let removed = ledger.remove(reservation.id).unwrap();

        ledger.restore(removed).unwrap();
        assert_eq!(
            ledger.find_by_code(reservation.code.as_str()),
            Some(reservation)
        );
        assert_eq!(ledger.active_for_seat(SeatId(1)).len(), 1);
    }

    #[test]
    fn restore_fails_when_seat_was_taken() {
        let ledger = ReservationLedger::new();
        let first = ledger.create(request(1, 1, 1)).unwrap();
        ledger
            .transition(first.id, ReservationStatus::Cancelled)
            .unwrap();
        let second = ledger.create(request(1, 2, 1)).unwrap();

        assert!(matches!(
            ledger.restore(first.clone()),
            Err(ReservationError::Internal(_))
        ));
        assert_eq!(ledger.active_for_seat(SeatId(1)), vec![second]);
        assert_eq!(ledger.get(first.id).unwrap().status, ReservationStatus::Cancelled);
    }

    #[test]
    fn active_for_seat_spans_flights() {
        let ledger = ReservationLedger::new();
        let a = ledger.create(request(1, 1, 7)).unwrap();
        ledger.create(request(2, 1, 7)).unwrap();
        ledger.transition(a.id, ReservationStatus::Cancelled).unwrap();

        let active = ledger.active_for_seat(SeatId(7));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].flight_id, FlightId(2));
    }
}
