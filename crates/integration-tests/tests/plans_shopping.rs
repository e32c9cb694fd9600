//! Plan locks, cooking and the shopping list.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use chefs_journal_integration_tests::{TestApp, family_of};
use serde_json::{Value, json};

const DATE: &str = "2026-10-18";

async fn family(app: &TestApp) -> String {
    family_of(&app.login("13800138000", "Mei").await)
}

async fn toggle(app: &TestApp, family: &str, recipe: &str, user: &str) -> (StatusCode, Value) {
    app.post(
        "/api/plans/toggle",
        &json!({ "familyId": family, "date": DATE, "recipeId": recipe, "userId": user }),
    )
    .await
}

async fn lock(app: &TestApp, family: &str, user: &str, locked: bool) -> (StatusCode, Value) {
    app.post(
        "/api/plans/lock",
        &json!({ "familyId": family, "date": DATE, "userId": user, "locked": locked }),
    )
    .await
}

#[tokio::test]
async fn test_only_lock_holder_edits_and_unlocks() {
    let app = TestApp::new();
    let family = family(&app).await;

    let (status, body) = toggle(&app, &family, "r1", "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recipeIds"], json!(["r1"]));

    let (status, body) = lock(&app, &family, "alice", true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lockedBy"], "alice");
    assert!(body["data"]["lockExpiresAt"].as_i64().unwrap() > body["data"]["lockedAt"].as_i64().unwrap());

    let (status, body) = toggle(&app, &family, "r2", "bob").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("alice"));

    let (status, _) = lock(&app, &family, "bob", false).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = lock(&app, &family, "bob", true).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = toggle(&app, &family, "r1", "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recipeIds"], json!([]));

    let (status, body) = lock(&app, &family, "alice", false).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("lockedBy").is_none());

    let (status, _) = toggle(&app, &family, "r2", "bob").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_push_cannot_overwrite_locked_plan() {
    let app = TestApp::new();
    let family = family(&app).await;
    toggle(&app, &family, "r1", "alice").await;
    lock(&app, &family, "alice", true).await;

    let (status, _) = app
        .post(
            "/api/sync",
            &json!({
                "familyId": family,
                "userId": "bob",
                "data": { "plans": [{ "date": DATE, "recipeIds": [] }] }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let plans = app.pull(&family).await["plans"].clone();
    assert_eq!(plans[0]["recipeIds"], json!(["r1"]));
    assert_eq!(plans[0]["lockedBy"], "alice");
}

#[tokio::test]
async fn test_plan_operations_need_plan_and_family() {
    let app = TestApp::new();
    let family = family(&app).await;

    let (status, _) = lock(&app, &family, "alice", true).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/api/plans/cooked", &json!({ "familyId": family, "date": DATE }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = toggle(&app, "NOSUCH01", "r1", "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "family not found");

    let (status, _) = app.post("/api/plans/toggle", &json!({ "familyId": family })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cooked_copies_plan_into_meal_log() {
    let app = TestApp::new();
    let family = family(&app).await;
    toggle(&app, &family, "r1", "alice").await;
    toggle(&app, &family, "r2", "alice").await;

    let body = json!({ "familyId": family, "date": DATE });
    let (status, log) = app.post("/api/plans/cooked", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["data"]["cookedRecipeIds"], json!(["r1", "r2"]));

    let (_, again) = app.post("/api/plans/cooked", &body).await;
    assert_eq!(again["data"]["cookedRecipeIds"], json!(["r1", "r2"]));
    assert_eq!(again["data"]["id"], log["data"]["id"]);

    let logs = app.pull(&family).await["mealLogs"].clone();
    assert_eq!(logs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_shopping_groups_share_one_cart_record() {
    let app = TestApp::new();
    let family = family(&app).await;
    app.push(
        &family,
        json!({ "recipes": [
            { "id": "r1", "title": "Mapo tofu", "ingredients": [
                { "id": "i1", "name": "Tofu", "amount": "1 block" }
            ] },
            { "id": "r2", "title": "Tofu soup", "ingredients": [
                { "id": "i2", "name": " tofu ", "amount": "200g" },
                { "id": "i3", "name": "Scallion", "amount": "2" }
            ] }
        ] }),
    )
    .await;
    toggle(&app, &family, "r1", "alice").await;
    toggle(&app, &family, "r2", "alice").await;

    let list_uri = format!("/api/shopping?familyId={family}&date={DATE}");
    let (status, list) = app.get(&list_uri).await;
    assert_eq!(status, StatusCode::OK);
    let groups = list["data"]["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["key"], "2026-10-18:tofu");
    assert_eq!(groups[0]["items"].as_array().unwrap().len(), 2);

    let (status, entry) = app
        .post(
            "/api/shopping",
            &json!({ "familyId": family, "date": DATE, "name": "TOFU", "bought": true, "cost": 12.5 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{entry}");
    assert_eq!(entry["data"]["bought"], true);
    assert_eq!(entry["data"]["cost"].as_f64(), Some(12.5));

    let (_, list) = app.get(&list_uri).await;
    assert_eq!(list["data"]["totalActual"].as_f64(), Some(12.5));
    assert_eq!(list["data"]["groups"][0]["entry"]["bought"], true);
    assert_eq!(list["data"]["groups"][1]["entry"]["bought"], false);

    let cart = app.pull(&family).await["shoppingCart"].clone();
    assert_eq!(cart.as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_shopping_validation() {
    let app = TestApp::new();
    let family = family(&app).await;

    let (status, body) = app
        .post(
            "/api/shopping",
            &json!({ "familyId": family, "date": DATE, "name": "  ", "bought": true }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Ingredient name is required");

    let (status, _) = app
        .get(&format!("/api/shopping?familyId=NOSUCH01&date={DATE}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/shopping?familyId=NOSUCH01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
