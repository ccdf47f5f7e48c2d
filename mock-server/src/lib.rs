use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// (location, room, washers, dryers)
const ROOMS: &[(&str, &str, u32, u32)] = &[
    ("Yale", "Branford", 6, 6),
    ("Yale", "Saybrook", 4, 5),
    ("Yale", "Silliman", 8, 8),
    ("Harvard", "Adams House", 5, 4),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub location: String,
    pub washers: u32,
    pub dryers: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineCount {
    pub method: String,
    pub location: String,
    pub washers: u32,
    pub dryers: u32,
}

#[derive(Deserialize)]
pub struct RoomsQuery {
    pub location: Option<String>,
}

#[derive(Deserialize)]
pub struct MachinesQuery {
    pub method: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Default)]
struct Counters {
    remaining_failures: AtomicU32,
    hits: AtomicU32,
}

/// Shared server state. Clones observe the same counters, so a test can keep
/// one and read `hits()` after handing the other to the server.
#[derive(Clone, Debug, Default)]
pub struct MockState(Arc<Counters>);

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next `failures` data requests with 404, like the real
    /// backend does before it "finds" a resource.
    pub fn flaky(failures: u32) -> Self {
        let state = Self::default();
        state.0.remaining_failures.store(failures, Ordering::SeqCst);
        state
    }

    /// Data-route requests seen so far, failed ones included.
    pub fn hits(&self) -> u32 {
        self.0.hits.load(Ordering::SeqCst)
    }

    pub fn remaining_failures(&self) -> u32 {
        self.0.remaining_failures.load(Ordering::SeqCst)
    }

    fn record_hit(&self) -> Result<(), StatusCode> {
        let hit = self.0.hits.fetch_add(1, Ordering::SeqCst) + 1;
        let spurious = self
            .0
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if spurious {
            tracing::debug!(hit, "answering with spurious 404");
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(())
    }
}

pub fn app() -> Router {
    app_with(MockState::new())
}

pub fn app_with(state: MockState) -> Router {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/machines", get(count_machines))
        .route("/garbage", get(garbage))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(state)).await
}

fn rooms_at(location: &str) -> impl Iterator<Item = Room> + '_ {
    ROOMS
        .iter()
        .filter(move |(loc, ..)| *loc == location)
        .map(|&(loc, name, washers, dryers)| Room {
            name: name.to_string(),
            location: loc.to_string(),
            washers,
            dryers,
        })
}

/// A third of the machines are always busy.
fn available(total: u32) -> u32 {
    total - total / 3
}

async fn list_rooms(
    State(state): State<MockState>,
    Query(query): Query<RoomsQuery>,
) -> Result<Json<Vec<Room>>, StatusCode> {
    state.record_hit()?;
    let location = query.location.ok_or(StatusCode::BAD_REQUEST)?;
    Ok(Json(rooms_at(&location).collect()))
}

async fn count_machines(
    State(state): State<MockState>,
    Query(query): Query<MachinesQuery>,
) -> Result<Json<MachineCount>, StatusCode> {
    state.record_hit()?;
    let (Some(method), Some(location)) = (query.method, query.location) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let (washers, dryers) = rooms_at(&location).fold((0, 0), |(w, d), room| (w + room.washers, d + room.dryers));
    let (washers, dryers) = match method.as_str() {
        "getTotal" => (washers, dryers),
        "getNumAvailable" => (available(washers), available(dryers)),
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    Ok(Json(MachineCount {
        method,
        location,
        washers,
        dryers,
    }))
}

async fn garbage(State(state): State<MockState>) -> Result<&'static str, StatusCode> {
    state.record_hit()?;
    Ok("{not json")
}
