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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use flight_reservations_rs::{
    AircraftId, EntityKind, Flight, FlightCatalog, FlightId, InMemoryCatalog, Passenger, PassengerId,
    ReservationEngine, ReservationError, ReservationId, SeatId, SeatInventory, SeatType,
    SeatTypeId, SimulatedGateway,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "flight_reservations_rs=info,flight_reservations=info";

/// Flight Reservations - Process booking command CSV files
///
/// Loads flights, aircraft seat maps and passengers from a JSON catalog,
/// applies booking commands from a CSV file and writes the resulting
/// reservations to stdout.
#[derive(Parser, Debug)]
#[command(name = "flight-reservations")]
#[command(about = "A seat reservation engine that processes booking command CSVs", long_about = None)]
struct Args {
    /// Path to the JSON catalog (seat types, aircraft, flights, passengers)
    #[arg(long, value_name = "CATALOG")]
    catalog: PathBuf,

    /// Path to CSV file with booking commands
    ///
    /// Expected format: type,flight,passenger,seat,reservation,price
    /// Example: flight-reservations --catalog catalog.json commands.csv > reservations.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Log filter, overrides RUST_LOG (e.g. "debug" or "flight_reservations_rs=debug")
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let catalog = match File::open(&args.catalog) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening catalog '{}': {}", args.catalog.display(), e);
            process::exit(1);
        }
    };
    let engine = match load_catalog(BufReader::new(catalog)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error loading catalog: {}", e);
            process::exit(1);
        }
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };
    if let Err(e) = process_commands(&engine, BufReader::new(file)) {
        eprintln!("Error processing commands: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_reservations(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Logs go to stderr; stdout carries only the CSV output.
fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Error)]
enum CatalogError {
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Rejected(#[from] ReservationError),
}

/// Catalog fixture.
///
/// ```json
/// {
///   "seat_types": [{ "id": 1, "name": "Business", "code": "BUS", "price_multiplier": "1.5" }],
///   "aircraft": [{ "id": 1, "rows": 20, "columns": "ABCD",
///                  "seat_types": [{ "from_row": 1, "to_row": 3, "seat_type": 1 }] }],
///   "flights": [{ "id": 1, "aircraft_id": 1, "origin": "MAD", "destination": "BCN",
///                 "departure": "2030-05-01T08:00:00Z", "arrival": "2030-05-01T09:15:00Z",
///                 "base_price": "120.00" }],
///   "passengers": [{ "id": 1, "first_name": "Lucia", "email": "lucia@example.com" }]
/// }
/// ```
#[derive(Debug, Deserialize)]
struct CatalogFixture {
    #[serde(default)]
    seat_types: Vec<SeatType>,
    #[serde(default)]
    aircraft: Vec<AircraftLayout>,
    #[serde(default)]
    flights: Vec<Flight>,
    #[serde(default)]
    passengers: Vec<Passenger>,
}

/// Seat grid of one aircraft. Rows outside every range have no seat type.
#[derive(Debug, Deserialize)]
struct AircraftLayout {
    id: AircraftId,
    rows: u16,
    columns: String,
    #[serde(default)]
    seat_types: Vec<RowRange>,
}

#[derive(Debug, Deserialize)]
struct RowRange {
    from_row: u16,
    to_row: u16,
    seat_type: SeatTypeId,
}

impl AircraftLayout {
    fn seat_type_for(&self, row: u16) -> Option<SeatTypeId> {
        self.seat_types
            .iter()
            .find(|range| (range.from_row..=range.to_row).contains(&row))
            .map(|range| range.seat_type)
    }
}

/// Builds an engine from a JSON catalog.
///
/// Unlike command rows, catalog entries are not skipped: one invalid entry
/// rejects the whole catalog.
fn load_catalog<R: Read>(reader: R) -> Result<ReservationEngine, CatalogError> {
    let fixture: CatalogFixture = serde_json::from_reader(reader)?;
    build_engine(fixture)
}

fn build_engine(fixture: CatalogFixture) -> Result<ReservationEngine, CatalogError> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let inventory = Arc::new(SeatInventory::new());

    for seat_type in fixture.seat_types {
        catalog.add_seat_type(seat_type)?;
    }
    for layout in &fixture.aircraft {
        for row in 1..=layout.rows {
            inventory.provision(layout.id, row..=row, &layout.columns, layout.seat_type_for(row))?;
        }
        let seats = usize::from(layout.rows) * layout.columns.chars().count();
        info!(aircraft_id = %layout.id, seats, "aircraft provisioned");
    }
    for flight in fixture.flights {
        catalog.add_flight(flight)?;
    }
    for passenger in fixture.passengers {
        catalog.add_passenger(passenger)?;
    }

    Ok(ReservationEngine::new(catalog.clone(), catalog, inventory))
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, flight, passenger, seat, reservation, price`
#[derive(Debug, Deserialize)]
struct CommandRecord {
    #[serde(rename = "type")]
    command: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    flight: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    passenger: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    seat: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    reservation: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Reserve {
        flight_id: FlightId,
        passenger_id: PassengerId,
        seat: String,
        price: Option<Decimal>,
    },
    Confirm(ReservationId),
    Pay(ReservationId),
    Cancel(ReservationId),
    ForceCancel(ReservationId),
    Delete(ReservationId),
    Issue(ReservationId),
    CancelTicket(ReservationId),
    UseTicket(ReservationId),
}

impl CommandRecord {
    /// Converts CSV record to a Command.
    ///
    /// Returns `None` for unknown command types or missing required fields.
    fn into_command(self) -> Option<Command> {
        if self.command.eq_ignore_ascii_case("reserve") {
            return Some(Command::Reserve {
                flight_id: FlightId(self.flight?),
                passenger_id: PassengerId(self.passenger?),
                seat: self.seat?,
                price: self.price,
            });
        }

        let id = ReservationId(self.reservation?);
        let command = match self.command.to_lowercase().as_str() {
            "confirm" => Command::Confirm(id),
            "pay" => Command::Pay(id),
            "cancel" => Command::Cancel(id),
            "force_cancel" => Command::ForceCancel(id),
            "delete" => Command::Delete(id),
            "issue" => Command::Issue(id),
            "cancel_ticket" => Command::CancelTicket(id),
            "use_ticket" => Command::UseTicket(id),
            _ => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Error)]
enum CommandError {
    #[error(transparent)]
    Rejected(#[from] ReservationError),

    #[error("flight {flight_id} has no seat {seat}")]
    UnknownSeat { flight_id: FlightId, seat: String },

    #[error("reservation {0} has no ticket")]
    NoTicket(ReservationId),
}

fn apply(engine: &ReservationEngine, command: Command) -> Result<(), CommandError> {
    match command {
        Command::Reserve {
            flight_id,
            passenger_id,
            seat,
            price,
        } => {
            let seat_id = resolve_seat(engine, flight_id, &seat)?;
            engine.create_reservation(flight_id, passenger_id, seat_id, price)?;
        }
        Command::Confirm(id) => {
            engine.confirm_reservation(id)?;
        }
        Command::Pay(id) => {
            engine.pay_reservation(id, &SimulatedGateway)?;
        }
        Command::Cancel(id) => {
            engine.cancel_reservation(id)?;
        }
        Command::ForceCancel(id) => {
            engine.force_cancel_reservation(id)?;
        }
        Command::Delete(id) => {
            engine.delete_reservation(id)?;
        }
        Command::Issue(id) => {
            engine.issue_ticket(id)?;
        }
        Command::CancelTicket(id) => {
            let ticket = engine.ticket_for_reservation(id).ok_or(CommandError::NoTicket(id))?;
            engine.cancel_ticket(ticket.id)?;
        }
        Command::UseTicket(id) => {
            let ticket = engine.ticket_for_reservation(id).ok_or(CommandError::NoTicket(id))?;
            engine.use_ticket(ticket.id)?;
        }
    }
    Ok(())
}

/// Finds a seat by its printed number (`12C`) on the flight's aircraft.
fn resolve_seat(
    engine: &ReservationEngine,
    flight_id: FlightId,
    number: &str,
) -> Result<SeatId, CommandError> {
    let aircraft_id = engine
        .catalog()
        .flight(flight_id)
        .map(|flight| flight.aircraft_id)
        .ok_or(ReservationError::NotFound {
            entity: EntityKind::Flight,
            id: flight_id.into(),
        })?;
    engine
        .inventory()
        .list_seats(aircraft_id)
        .into_iter()
        .find(|seat| seat.number().eq_ignore_ascii_case(number))
        .map(|seat| seat.id)
        .ok_or_else(|| CommandError::UnknownSeat {
            flight_id,
            seat: number.to_string(),
        })
}

/// Process booking commands from a CSV reader.
///
/// Rows are streamed. Malformed rows and rejected commands are logged and
/// skipped; they never stop processing.
///
/// # CSV Format
///
/// Expected columns: `type, flight, passenger, seat, reservation, price`
/// - `type`: reserve, confirm, pay, cancel, force_cancel, delete, issue,
///   cancel_ticket, use_ticket
/// - `flight`, `passenger`, `seat`: required by `reserve`; seat is a number like `12C`
/// - `reservation`: Reservation ID for every other command (IDs start at 1)
/// - `price`: optional explicit price for `reserve`
///
/// # Example
///
/// ```csv
/// type,flight,passenger,seat,reservation,price
/// reserve,1,1,12C,,
/// confirm,,,,1,
/// pay,,,,1,
/// issue,,,,1,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
fn process_commands<R: Read>(engine: &ReservationEngine, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (index, result) in rdr.deserialize::<CommandRecord>().enumerate() {
        let line = index + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "skipping malformed row");
                continue;
            }
        };

        let Some(command) = record.into_command() else {
            warn!(line, "skipping invalid command record");
            continue;
        };

        if let Err(e) = apply(engine, command.clone()) {
            warn!(line, ?command, error = %e, "command rejected");
        }
    }

    Ok(())
}

/// Output row, one per reservation.
#[derive(Debug, Serialize)]
struct ReservationRow {
    reservation: u64,
    code: String,
    flight: u32,
    passenger: u32,
    seat: String,
    status: String,
    price: Decimal,
    ticket: Option<String>,
    ticket_status: Option<String>,
}

/// Write reservations to a CSV writer, ordered by ID.
///
/// # CSV Format
///
/// Columns: `reservation, code, flight, passenger, seat, status, price, ticket, ticket_status`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_reservations<W: Write>(engine: &ReservationEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for reservation in engine.ledger().list_all() {
        let seat = engine
            .inventory()
            .get_seat(reservation.seat_id)
            .map(|seat| seat.number())
            .unwrap_or_default();
        let ticket = engine.ticket_for_reservation(reservation.id);
        wtr.serialize(ReservationRow {
            reservation: reservation.id.0,
            code: reservation.code.to_string(),
            flight: reservation.flight_id.0,
            passenger: reservation.passenger_id.0,
            seat,
            status: reservation.status.to_string(),
            price: reservation.price,
            ticket: ticket.as_ref().map(|ticket| ticket.barcode.clone()),
            ticket_status: ticket.map(|ticket| ticket.status.to_string()),
        })?;
    }

    wtr.flush()?;
    Ok(())
}
