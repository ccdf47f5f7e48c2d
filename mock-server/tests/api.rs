use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with, MachineCount, MockState, Room};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- rooms ---

#[tokio::test]
async fn rooms_for_location() {
    let resp = app().oneshot(get("/rooms?location=Yale")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let rooms: Vec<Room> = body_json(resp).await;
    assert_eq!(rooms.len(), 3);
    assert_eq!(rooms[0].name, "Branford");
}

#[tokio::test]
async fn rooms_for_unknown_location_is_empty() {
    let resp = app().oneshot(get("/rooms?location=Mars")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let rooms: Vec<Room> = body_json(resp).await;
    assert!(rooms.is_empty());
}

#[tokio::test]
async fn rooms_without_location_returns_400() {
    let resp = app().oneshot(get("/rooms")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- machines ---

#[tokio::test]
async fn machine_totals() {
    let resp = app()
        .oneshot(get("/machines?method=getTotal&location=Yale"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let count: MachineCount = body_json(resp).await;
    assert_eq!(count.method, "getTotal");
    assert_eq!(count.location, "Yale");
    assert_eq!(count.washers, 18);
    assert_eq!(count.dryers, 19);
}

#[tokio::test]
async fn machines_available_is_below_total() {
    let resp = app()
        .oneshot(get("/machines?method=getNumAvailable&location=Yale"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let count: MachineCount = body_json(resp).await;
    assert_eq!(count.washers, 12);
    assert_eq!(count.dryers, 13);
}

#[tokio::test]
async fn machines_unknown_method_returns_400() {
    let resp = app()
        .oneshot(get("/machines?method=getBroken&location=Yale"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- garbage ---

#[tokio::test]
async fn garbage_is_not_json() {
    let resp = app().oneshot(get("/garbage")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    assert_eq!(&body[..], b"{not json");
    assert!(serde_json::from_slice::<serde_json::Value>(&body).is_err());
}

// --- flakiness ---

#[tokio::test]
async fn flaky_server_recovers_after_configured_failures() {
    use tower::Service;

    let state = MockState::flaky(2);
    let mut app = app_with(state.clone()).into_service();

    for expected in [StatusCode::NOT_FOUND, StatusCode::NOT_FOUND, StatusCode::OK] {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(get("/rooms?location=Yale"))
            .await
            .unwrap();
        assert_eq!(resp.status(), expected);
    }

    assert_eq!(state.hits(), 3);
    assert_eq!(state.remaining_failures(), 0);
}

#[tokio::test]
async fn unknown_route_is_not_counted() {
    let state = MockState::new();
    let resp = app_with(state.clone()).oneshot(get("/dryers")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(state.hits(), 0);
}
