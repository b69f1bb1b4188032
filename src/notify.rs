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

//! Reservation event notifications.
//!
//! The engine emits a [`ReservationEvent`] after every committed state
//! change. Sinks are fire-and-forget: they cannot fail or veto a change.

use crate::base::{FlightId, PassengerId, ReservationId, SeatId, TicketId};
use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEvent {
    Created {
        reservation_id: ReservationId,
        flight_id: FlightId,
        passenger_id: PassengerId,
        seat_id: SeatId,
    },
    Confirmed {
        reservation_id: ReservationId,
    },
    Paid {
        reservation_id: ReservationId,
        payment_reference: String,
    },
    Cancelled {
        reservation_id: ReservationId,
        /// Set when the administrative override was used.
        forced: bool,
    },
    Deleted {
        reservation_id: ReservationId,
    },
    TicketIssued {
        ticket_id: TicketId,
        reservation_id: ReservationId,
    },
    TicketCancelled {
        ticket_id: TicketId,
        reservation_id: ReservationId,
    },
    TicketUsed {
        ticket_id: TicketId,
        reservation_id: ReservationId,
    },
}

impl ReservationEvent {
    pub fn reservation_id(&self) -> ReservationId {
        match self {
            Self::Created { reservation_id, .. }
            | Self::Confirmed { reservation_id }
            | Self::Paid { reservation_id, .. }
            | Self::Cancelled { reservation_id, .. }
            | Self::Deleted { reservation_id }
            | Self::TicketIssued { reservation_id, .. }
            | Self::TicketCancelled { reservation_id, .. }
            | Self::TicketUsed { reservation_id, .. } => *reservation_id,
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &ReservationEvent);
}

/// Logs every event at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, event: &ReservationEvent) {
        tracing::info!(reservation_id = %event.reservation_id(), ?event, "reservation event");
    }
}

/// Buffers events in arrival order until a consumer drains them.
///
/// Lock-free; any number of engine threads may push concurrently.
#[derive(Debug, Default)]
pub struct QueueNotifier {
    events: SegQueue<ReservationEvent>,
}

impl QueueNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every buffered event, oldest first.
    pub fn drain(&self) -> Vec<ReservationEvent> {
        std::iter::from_fn(|| self.events.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl NotificationSink for QueueNotifier {
    fn notify(&self, event: &ReservationEvent) {
        self.events.push(event.clone());
    }
}
