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

//! Flight, seat type and passenger lookups.
//!
//! The engine only reads these records. Catalog management lives outside the
//! engine and is reached through [`FlightCatalog`] and [`PassengerDirectory`];
//! [`InMemoryCatalog`] implements both for the CLI and for tests.

use crate::base::{AircraftId, FlightId, PassengerId, SeatTypeId};
use crate::error::{EntityKind, ReservationError, ValidationError};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub id: FlightId,
    pub aircraft_id: AircraftId,
    pub origin: String,
    pub destination: String,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub base_price: Decimal,
}

impl Flight {
    pub fn duration(&self) -> Duration {
        self.arrival - self.departure
    }

    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        self.departure <= now
    }

    /// Checks schedule and fare as of `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.arrival <= self.departure {
            return Err(ValidationError::InvalidSchedule { flight_id: self.id });
        }
        if self.departure < now {
            return Err(ValidationError::DepartureInPast { flight_id: self.id });
        }
        if self.base_price <= Decimal::ZERO {
            return Err(ValidationError::InvalidPrice(self.base_price));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatType {
    pub id: SeatTypeId,
    pub name: String,
    pub code: String,
    pub price_multiplier: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub id: PassengerId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
}

impl Passenger {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

/// Read-only flight and seat type lookups.
pub trait FlightCatalog: Send + Sync {
    fn flight(&self, id: FlightId) -> Option<Flight>;

    fn seat_type(&self, id: SeatTypeId) -> Option<SeatType>;
}

/// Read-only passenger identity resolution.
pub trait PassengerDirectory: Send + Sync {
    fn passenger(&self, id: PassengerId) -> Option<Passenger>;
}

/// Catalog held in memory, keyed by caller-chosen IDs.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    flights: DashMap<FlightId, Flight>,
    seat_types: DashMap<SeatTypeId, SeatType>,
    passengers: DashMap<PassengerId, Passenger>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flight departing in the future.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidSchedule`] - Arrival not after departure.
    /// - [`ValidationError::DepartureInPast`] - Departure already passed.
    /// - [`ValidationError::InvalidPrice`] - Base price not positive.
    /// - [`ValidationError::DuplicateEntry`] - Flight ID already used.
    pub fn add_flight(&self, flight: Flight) -> Result<(), ReservationError> {
        flight.validate(Utc::now())?;
        insert_unique(&self.flights, flight.id, flight, EntityKind::Flight)
    }

    pub fn add_seat_type(&self, seat_type: SeatType) -> Result<(), ReservationError> {
        if seat_type.price_multiplier <= Decimal::ZERO {
            return Err(ValidationError::InvalidMultiplier(seat_type.price_multiplier).into());
        }
        insert_unique(&self.seat_types, seat_type.id, seat_type, EntityKind::SeatType)
    }

    pub fn add_passenger(&self, passenger: Passenger) -> Result<(), ReservationError> {
        if passenger.first_name.trim().is_empty() {
            return Err(ValidationError::MissingPassengerName {
                passenger_id: passenger.id,
            }
            .into());
        }
        insert_unique(&self.passengers, passenger.id, passenger, EntityKind::Passenger)
    }
}

fn insert_unique<K, V>(
    map: &DashMap<K, V>,
    key: K,
    value: V,
    entity: EntityKind,
) -> Result<(), ReservationError>
where
    K: Eq + std::hash::Hash + Copy + Into<u64>,
{
    match map.entry(key) {
        Entry::Occupied(_) => Err(ValidationError::DuplicateEntry {
            entity,
            id: key.into(),
        }
        .into()),
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
    }
}

impl FlightCatalog for InMemoryCatalog {
    fn flight(&self, id: FlightId) -> Option<Flight> {
        self.flights.get(&id).map(|flight| flight.clone())
    }

    fn seat_type(&self, id: SeatTypeId) -> Option<SeatType> {
        self.seat_types.get(&id).map(|seat_type| seat_type.clone())
    }
}

impl PassengerDirectory for InMemoryCatalog {
    fn passenger(&self, id: PassengerId) -> Option<Passenger> {
        self.passengers.get(&id).map(|passenger| passenger.clone())
    }
}
