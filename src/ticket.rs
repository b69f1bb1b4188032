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

//! Ticket issuance.
//!
//! Tickets are 1:1 with reservations and follow a state machine:
//!
//! ```text
//!  Issued ──use────► Used
//!    │
//!    └────cancel───► Cancelled
//! ```

use crate::base::{ReservationId, TicketId};
use crate::error::{EntityKind, ReservationError, ValidationError};
use crate::reservation::Reservation;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    Issued,
    Cancelled,
    Used,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Issued => "issued",
            Self::Cancelled => "cancelled",
            Self::Used => "used",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub reservation_id: ReservationId,
    /// Printed on the boarding pass; doubles as the ticket number.
    pub barcode: String,
    pub status: TicketStatus,
    pub issued_at: DateTime<Utc>,
}

/// Result of [`TicketIssuer::issue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Issued {
    pub ticket: Ticket,
    /// `false` when an earlier call already issued this ticket.
    pub newly_issued: bool,
}

/// Ticket store, at most one ticket per reservation.
///
/// Tickets are issued, cancelled and used through
/// [`ReservationEngine`](crate::ReservationEngine); this type only exposes
/// lookups outside the crate.
#[derive(Debug)]
pub struct TicketIssuer {
    tickets: DashMap<TicketId, Ticket>,
    /// One ticket per reservation; doubles as the get-or-create lock.
    by_reservation: DashMap<ReservationId, TicketId>,
    next_id: AtomicU64,
}

impl TicketIssuer {
    pub fn new() -> Self {
        Self {
            tickets: DashMap::new(),
            by_reservation: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Issues the ticket for a reservation, or returns the one already issued.
    ///
    /// Retrying after a timeout therefore never produces a second ticket.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NotTicketEligible`] - Reservation is not confirmed or paid.
    pub(crate) fn issue(&self, reservation: &Reservation) -> Result<Issued, ReservationError> {
        if !reservation.status.is_ticket_eligible() {
            return Err(ValidationError::NotTicketEligible {
                reservation_id: reservation.id,
                status: reservation.status,
            }
            .into());
        }

        match self.by_reservation.entry(reservation.id) {
            Entry::Occupied(existing) => {
                let ticket = self.get(*existing.get())?;
                Ok(Issued {
                    ticket,
                    newly_issued: false,
                })
            }
            Entry::Vacant(slot) => {
                let ticket = Ticket {
                    id: TicketId(self.next_id.fetch_add(1, Ordering::Relaxed)),
                    reservation_id: reservation.id,
                    barcode: Uuid::new_v4().simple().to_string().to_uppercase(),
                    status: TicketStatus::Issued,
                    issued_at: Utc::now(),
                };
                self.tickets.insert(ticket.id, ticket.clone());
                slot.insert(ticket.id);
                Ok(Issued {
                    ticket,
                    newly_issued: true,
                })
            }
        }
    }

    /// Cancels an issued ticket.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - Unknown ticket.
    /// - [`ValidationError::AlreadyUsed`] - Ticket was used for boarding.
    /// - [`ValidationError::TicketAlreadyCancelled`] - Ticket is already cancelled.
    pub(crate) fn cancel(&self, ticket_id: TicketId) -> Result<Ticket, ReservationError> {
        self.advance(ticket_id, TicketStatus::Cancelled)
    }

    /// Marks an issued ticket as used at boarding.
    pub(crate) fn mark_used(&self, ticket_id: TicketId) -> Result<Ticket, ReservationError> {
        self.advance(ticket_id, TicketStatus::Used)
    }

    fn advance(&self, ticket_id: TicketId, status: TicketStatus) -> Result<Ticket, ReservationError> {
        let mut ticket = self
            .tickets
            .get_mut(&ticket_id)
            .ok_or_else(|| ReservationError::not_found(EntityKind::Ticket, ticket_id))?;

        match ticket.status {
            TicketStatus::Used => Err(ValidationError::AlreadyUsed { ticket_id }.into()),
            TicketStatus::Cancelled => {
                Err(ValidationError::TicketAlreadyCancelled { ticket_id }.into())
            }
            TicketStatus::Issued => {
                ticket.status = status;
                Ok(ticket.clone())
            }
        }
    }

    pub fn get(&self, ticket_id: TicketId) -> Result<Ticket, ReservationError> {
        self.tickets
            .get(&ticket_id)
            .map(|ticket| ticket.clone())
            .ok_or_else(|| ReservationError::not_found(EntityKind::Ticket, ticket_id))
    }

    pub fn for_reservation(&self, reservation_id: ReservationId) -> Option<Ticket> {
        let ticket_id = *self.by_reservation.get(&reservation_id)?;
        self.tickets.get(&ticket_id).map(|ticket| ticket.clone())
    }

    /// Deletes the ticket of a deleted reservation.
    pub(crate) fn remove_for_reservation(&self, reservation_id: ReservationId) -> Option<Ticket> {
        let (_, ticket_id) = self.by_reservation.remove(&reservation_id)?;
        self.tickets.remove(&ticket_id).map(|(_, ticket)| ticket)
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

impl Default for TicketIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{FlightId, PassengerId, ReservationCode, SeatId};
    use crate::reservation::ReservationStatus;
    use rust_decimal_macros::dec;

    fn reservation(id: u64, status: ReservationStatus) -> Reservation {
        Reservation {
            id: ReservationId(id),
            code: ReservationCode::generate(),
            flight_id: FlightId(1),
            passenger_id: PassengerId(1),
            seat_id: SeatId(1),
            status,
            price: dec!(100.00),
            payment_reference: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issue_is_idempotent() {
        let issuer = TicketIssuer::new();
        let confirmed = reservation(1, ReservationStatus::Confirmed);

        let first = issuer.issue(&confirmed).unwrap();
        let second = issuer.issue(&confirmed).unwrap();

        assert!(first.newly_issued);
        assert!(!second.newly_issued);
        assert_eq!(first.ticket, second.ticket);
        assert_eq!(issuer.len(), 1);
    }

    #[test]
    fn pending_and_cancelled_are_not_eligible() {
        let issuer = TicketIssuer::new();
        for status in [ReservationStatus::Pending, ReservationStatus::Cancelled] {
            let result = issuer.issue(&reservation(1, status));
            assert_eq!(
                result,
                Err(ValidationError::NotTicketEligible {
                    reservation_id: ReservationId(1),
                    status,
                }
                .into())
            );
        }
        assert!(issuer.is_empty());
    }

    #[test]
    fn barcodes_are_unique() {
        let issuer = TicketIssuer::new();
        let a = issuer.issue(&reservation(1, ReservationStatus::Paid)).unwrap();
        let b = issuer.issue(&reservation(2, ReservationStatus::Paid)).unwrap();
        assert_ne!(a.ticket.barcode, b.ticket.barcode);
        assert_eq!(a.ticket.barcode.len(), 32);
    }

    #[test]
    fn used_ticket_cannot_be_cancelled() {
        let issuer = TicketIssuer::new();
        let ticket = issuer
            .issue(&reservation(1, ReservationStatus::Paid))
            .unwrap()
            .ticket;
        issuer.mark_used(ticket.id).unwrap();

        assert_eq!(
            issuer.mark_used(ticket.id),
            Err(ValidationError::AlreadyUsed {
                ticket_id: ticket.id
            }
            .into())
        );
        assert_eq!(
            issuer.cancel(ticket.id),
            Err(ValidationError::AlreadyUsed {
                ticket_id: ticket.id
            }
            .into())
        );
        assert_eq!(issuer.get(ticket.id).unwrap().status, TicketStatus::Used);
    }

    #[test]
    fn cancelled_ticket_cannot_be_used_or_cancelled_again() {
        let issuer = TicketIssuer::new();
        let ticket = issuer
            .issue(&reservation(1, ReservationStatus::Confirmed))
            .unwrap()
            .ticket;
        issuer.cancel(ticket.id).unwrap();

        let expected: Result<Ticket, ReservationError> = Err(ValidationError::TicketAlreadyCancelled {
            ticket_id: ticket.id,
        }
        .into());
        assert_eq!(issuer.cancel(ticket.id), expected);
        assert_eq!(issuer.mark_used(ticket.id), expected);
    }

    #[test]
    fn remove_for_reservation_drops_both_indexes() {
        let issuer = TicketIssuer::new();
        let confirmed = reservation(1, ReservationStatus::Confirmed);
        let ticket = issuer.issue(&confirmed).unwrap().ticket;

        assert_eq!(issuer.remove_for_reservation(confirmed.id), Some(ticket.clone()));
        assert!(issuer.for_reservation(confirmed.id).is_none());
        assert!(issuer.get(ticket.id).is_err());
    }
}
