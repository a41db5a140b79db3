//! Integration tests for watchlists and shared watchlist cars

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{request, send, setup_test_app, token_for, TestApp};

async fn create_watchlist(test: &TestApp, token: &str, name: &str) -> u64 {
    let (status, body) = send(
        &test.app,
        request("POST", "/watchlists/", Some(token), Some(json!({ "name": name }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_u64().unwrap()
}

async fn add_car(test: &TestApp, token: &str, watchlist_id: u64, payload: Value) -> (StatusCode, Value) {
    send(
        &test.app,
        request(
            "POST",
            &format!("/watchlists/{watchlist_id}/cars/"),
            Some(token),
            Some(payload),
        ),
    )
    .await
}

async fn car_ids(test: &TestApp, token: &str, watchlist_id: u64) -> Vec<u64> {
    let (status, body) = send(
        &test.app,
        request("GET", &format!("/watchlists/{watchlist_id}/cars/"), Some(token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body.as_array()
        .unwrap()
        .iter()
        .map(|item| item["car_id"].as_u64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_watchlist_crud() {
    let test = setup_test_app();
    let token = token_for("user_a");

    let id = create_watchlist(&test, &token, "Weekend projects").await;

    let (status, body) = send(&test.app, request("GET", &format!("/watchlists/{id}"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Weekend projects");
    assert_eq!(body["cars"], json!([]));

    let (status, body) = send(
        &test.app,
        request("PATCH", &format!("/watchlists/{id}"), Some(&token), Some(json!({ "name": "Auction picks" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Auction picks");

    let (_, list) = send(&test.app, request("GET", "/watchlists/", Some(&token), None)).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["name"], "Auction picks");

    let (status, _) = send(&test.app, request("DELETE", &format!("/watchlists/{id}"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&test.app, request("GET", &format!("/watchlists/{id}"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_watchlist_names_are_unique() {
    let test = setup_test_app();
    let token = token_for("user_a");

    create_watchlist(&test, &token, "Trucks").await;
    let second = create_watchlist(&test, &token, "Vans").await;

    let (status, _) = send(
        &test.app,
        request("POST", "/watchlists/", Some(&token), Some(json!({ "name": "Trucks" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &test.app,
        request("PATCH", &format!("/watchlists/{second}"), Some(&token), Some(json!({ "name": "Trucks" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &test.app,
        request("POST", "/watchlists/", Some(&token), Some(json!({ "name": "   " }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_watchlist_without_name_is_bad_request() {
    let test = setup_test_app();
    let token = token_for("user_a");

    let (status, body) = send(&test.app, request("POST", "/watchlists/", Some(&token), Some(json!({})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let id = create_watchlist(&test, &token, "Keep").await;
    let (status, _) = send(
        &test.app,
        request("PATCH", &format!("/watchlists/{id}"), Some(&token), Some(json!({ "title": "x" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&test.app, request("GET", "/watchlists/?limit=many", Some(&token), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_watchlist_is_not_found() {
    let test = setup_test_app();
    let token = token_for("user_a");

    let (status, body) = send(
        &test.app,
        request("PATCH", "/watchlists/42", Some(&token), Some(json!({ "name": "Ghost" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = send(&test.app, request("DELETE", "/watchlists/42", Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the failed rename did not reserve the name
    create_watchlist(&test, &token, "Ghost").await;
}

#[tokio::test]
async fn test_renamed_watchlist_frees_old_name() {
    let test = setup_test_app();
    let token = token_for("user_a");

    let id = create_watchlist(&test, &token, "Old").await;
    send(
        &test.app,
        request("PATCH", &format!("/watchlists/{id}"), Some(&token), Some(json!({ "name": "New" }))),
    )
    .await;

    create_watchlist(&test, &token, "Old").await;
}

#[tokio::test]
async fn test_list_pagination() {
    let test = setup_test_app();
    let token = token_for("user_a");
    for i in 1..=5 {
        create_watchlist(&test, &token, &format!("List {i}")).await;
    }

    let (_, page) = send(&test.app, request("GET", "/watchlists/?skip=3&limit=10", Some(&token), None)).await;
    let names: Vec<&str> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["List 4", "List 5"]);

    let (_, page) = send(&test.app, request("GET", "/watchlists/?limit=2", Some(&token), None)).await;
    assert_eq!(page.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_add_car_always_creates_new_row() {
    let test = setup_test_app();
    let token = token_for("user_a");
    let id = create_watchlist(&test, &token, "Sedans").await;
    let payload = json!({ "vin": "VIN-DUP", "details": { "price": 5000 } });

    let (status, first) = add_car(&test, &token, id, payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["car"]["vin"], "VIN-DUP");
    assert_eq!(first["car"]["details"]["price"], 5000);

    let (status, second) = add_car(&test, &token, id, payload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(first["car_id"], second["car_id"]);

    assert_eq!(car_ids(&test, &token, id).await.len(), 2);
}

#[tokio::test]
async fn test_add_car_to_missing_watchlist() {
    let test = setup_test_app();
    let token = token_for("user_a");

    let (status, _) = add_car(&test, &token, 99, json!({ "vin": "X" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&test.app, request("GET", "/watchlists/99/cars/", Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shared_car_is_deleted_with_last_reference() {
    let test = setup_test_app();
    let token = token_for("user_a");
    let list_a = create_watchlist(&test, &token, "A").await;
    let list_b = create_watchlist(&test, &token, "B").await;

    let (_, item) = add_car(&test, &token, list_a, json!({ "vin": "SHARED" })).await;
    let car_id = item["car_id"].as_u64().unwrap();

    let (status, _) = add_car(&test, &token, list_b, json!({ "car_id": car_id })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = add_car(&test, &token, list_b, json!({ "car_id": car_id })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // removing from A leaves the car reachable through B
    let (status, removal) = send(
        &test.app,
        request("DELETE", &format!("/watchlists/{list_a}/cars/{car_id}"), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removal["car_deleted"], false);
    assert_eq!(car_ids(&test, &token, list_a).await, Vec::<u64>::new());
    assert_eq!(car_ids(&test, &token, list_b).await, vec![car_id]);

    // removing from B as well deletes the car
    let (status, removal) = send(
        &test.app,
        request("DELETE", &format!("/watchlists/{list_b}/cars/{car_id}"), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removal["car_deleted"], true);

    let (status, _) = add_car(&test, &token, list_a, json!({ "car_id": car_id })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_car_not_in_watchlist() {
    let test = setup_test_app();
    let token = token_for("user_a");
    let list_a = create_watchlist(&test, &token, "A").await;
    let list_b = create_watchlist(&test, &token, "B").await;
    let (_, item) = add_car(&test, &token, list_a, json!({ "vin": "ONLY-A" })).await;
    let car_id = item["car_id"].as_u64().unwrap();

    let (status, _) = send(
        &test.app,
        request("DELETE", &format!("/watchlists/{list_b}/cars/{car_id}"), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the failed removal changed nothing
    assert_eq!(car_ids(&test, &token, list_a).await, vec![car_id]);
}

#[tokio::test]
async fn test_delete_watchlist_collects_orphans_only() {
    let test = setup_test_app();
    let token = token_for("user_a");
    let list_a = create_watchlist(&test, &token, "A").await;
    let list_b = create_watchlist(&test, &token, "B").await;

    let (_, only_a) = add_car(&test, &token, list_a, json!({ "vin": "ONLY-A" })).await;
    let (_, shared) = add_car(&test, &token, list_a, json!({ "vin": "SHARED" })).await;
    let shared_id = shared["car_id"].as_u64().unwrap();
    add_car(&test, &token, list_b, json!({ "car_id": shared_id })).await;

    let (status, body) = send(&test.app, request("DELETE", &format!("/watchlists/{list_a}"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_car_ids"], json!([only_a["car_id"]]));

    let (_, detail) = send(&test.app, request("GET", &format!("/watchlists/{list_b}"), Some(&token), None)).await;
    assert_eq!(detail["cars"][0]["car"]["vin"], "SHARED");

    // the deleted watchlist's name can be reused
    create_watchlist(&test, &token, "A").await;
}

#[tokio::test]
async fn test_watchlists_require_auth() {
    let test = setup_test_app();
    let (status, _) = send(&test.app, request("GET", "/watchlists/", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
