use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde_json::{Value, json};
use tracing::{error, warn};

use super::db::BoardDb;
use super::validate;
use crate::errors::{BoardError, Entity};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: BoardDb,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        match self {
            BoardError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            BoardError::NotFound { entity } => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("{} not found", entity) })),
            )
                .into_response(),
            BoardError::Persistence(e) => {
                error!(error = %e, "Persistence failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

/// Turns an extractor rejection into a `body` field error.
fn body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, BoardError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "Rejected request body");
            Err(BoardError::invalid(
                "body",
                format!("Request body must be valid JSON: {}", rejection.body_text()),
            ))
        }
    }
}

fn deleted(entity: Entity) -> Json<Value> {
    Json(json!({ "message": format!("{} deleted successfully", entity) }))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/verify", get(verify))
        .route("/api/boards", get(list_boards).post(create_board))
        .route(
            "/api/boards/{uuid}",
            get(get_board).put(update_board).delete(delete_board),
        )
        .route("/api/boards/{uuid}/lanes", get(list_lanes).post(create_lane))
        .route(
            "/api/lanes/{uuid}",
            get(get_lane).put(update_lane).delete(delete_lane),
        )
        .route("/api/lanes/{uuid}/cards", get(list_cards).post(create_card))
        .route(
            "/api/cards/{uuid}",
            get(get_card).put(update_card).delete(delete_card),
        )
        .route("/api/cards/{uuid}/move", put(move_card))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn verify(State(state): State<SharedState>) -> impl IntoResponse {
    let report = state.db.verify().await;
    let status = if report.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

async fn list_boards(State(state): State<SharedState>) -> Result<impl IntoResponse, BoardError> {
    Ok(Json(state.db.list_boards().await?))
}

async fn create_board(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, BoardError> {
    let new = validate::new_board(&body(payload)?)?;
    let board = state.db.create_board(&new).await?;
    Ok((StatusCode::CREATED, Json(board)))
}

async fn get_board(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    Ok(Json(state.db.get_board(&uuid).await?))
}

async fn update_board(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, BoardError> {
    let patch = validate::board_patch(&body(payload)?)?;
    Ok(Json(state.db.update_board(&uuid, &patch).await?))
}

async fn delete_board(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    state.db.delete_board(&uuid).await?;
    Ok(deleted(Entity::Board))
}

async fn list_lanes(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    Ok(Json(state.db.list_lanes(&uuid).await?))
}

async fn create_lane(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, BoardError> {
    let new = validate::new_lane(&body(payload)?)?;
    let lane = state.db.create_lane(&uuid, &new).await?;
    Ok((StatusCode::CREATED, Json(lane)))
}

async fn get_lane(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    Ok(Json(state.db.get_lane(&uuid).await?))
}

async fn update_lane(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, BoardError> {
    let patch = validate::lane_patch(&body(payload)?)?;
    Ok(Json(state.db.update_lane(&uuid, &patch).await?))
}

async fn delete_lane(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    state.db.delete_lane(&uuid).await?;
    Ok(deleted(Entity::Lane))
}

async fn list_cards(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    Ok(Json(state.db.list_cards(&uuid).await?))
}

async fn create_card(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, BoardError> {
    let new = validate::new_card(&body(payload)?)?;
    let card = state.db.create_card(&uuid, &new).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

async fn get_card(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    Ok(Json(state.db.get_card(&uuid).await?))
}

async fn update_card(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, BoardError> {
    let patch = validate::card_patch(&body(payload)?)?;
    Ok(Json(state.db.update_card(&uuid, &patch).await?))
}

async fn move_card(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, BoardError> {
    let mv = validate::move_card(&body(payload)?)?;
    Ok(Json(state.db.move_card(&uuid, &mv.lane_uuid, mv.position).await?))
}

async fn delete_card(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    state.db.delete_card(&uuid).await?;
    Ok(deleted(Entity::Card))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::proxy::SqliteProxy;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let proxy = SqliteProxy::open_in_memory().unwrap();
        let state = Arc::new(AppState {
            db: BoardDb::new(Arc::new(proxy)),
        });
        api_router().with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn setup_lanes(app: &Router, names: &[&str]) -> (String, Vec<String>) {
        let (_, board) = send(app, "POST", "/api/boards", Some(json!({"name": "Board"}))).await;
        let board_uuid = board["uuid"].as_str().unwrap().to_string();
        let mut lanes = Vec::new();
        for name in names {
            let (status, lane) = send(
                app,
                "POST",
                &format!("/api/boards/{}/lanes", board_uuid),
                Some(json!({"name": name})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            lanes.push(lane["uuid"].as_str().unwrap().to_string());
        }
        (board_uuid, lanes)
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_list_boards_empty() {
        let app = test_app();

        let request = Request::builder()
            .method("GET")
            .uri("/api/boards")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let boards: Vec<Value> = body_json(response.into_body()).await;
        assert!(boards.is_empty());
    }

    #[tokio::test]
    async fn test_create_board() {
        let app = test_app();
        let (status, board) = send(
            &app,
            "POST",
            "/api/boards",
            Some(json!({"name": "Roadmap", "description": "Q3"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(board["name"], "Roadmap");
        assert_eq!(board["description"], "Q3");
        assert!(board["uuid"].is_string());
        assert!(board.get("id").is_none());
    }

    #[tokio::test]
    async fn test_create_board_without_name_is_400() {
        let app = test_app();
        let (status, body) = send(&app, "POST", "/api/boards", Some(json!({"description": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "name");
        assert_eq!(body["errors"][0]["message"], "Name is required");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400_on_body() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/boards")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["errors"][0]["field"], "body");
    }

    #[tokio::test]
    async fn test_get_board_not_found() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/boards/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Board not found");
    }

    #[tokio::test]
    async fn test_update_board_partial() {
        let app = test_app();
        let (_, board) = send(
            &app,
            "POST",
            "/api/boards",
            Some(json!({"name": "Old", "description": "keep"})),
        )
        .await;
        let uri = format!("/api/boards/{}", board["uuid"].as_str().unwrap());
        let (status, updated) = send(&app, "PUT", &uri, Some(json!({"name": "New"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "New");
        assert_eq!(updated["description"], "keep");
    }

    #[tokio::test]
    async fn test_delete_board_returns_message_and_cascades() {
        let app = test_app();
        let (board, lanes) = setup_lanes(&app, &["To Do"]).await;
        let (_, card) = send(
            &app,
            "POST",
            &format!("/api/lanes/{}/cards", lanes[0]),
            Some(json!({"title": "A"})),
        )
        .await;

        let (status, body) = send(&app, "DELETE", &format!("/api/boards/{}", board), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Board deleted successfully");

        let (status, _) = send(&app, "GET", &format!("/api/lanes/{}", lanes[0]), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/cards/{}", card["uuid"].as_str().unwrap()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_lanes_listed_by_position() {
        let app = test_app();
        let (board, _) = setup_lanes(&app, &["To Do", "Done"]).await;
        let (status, lane) = send(
            &app,
            "POST",
            &format!("/api/boards/{}/lanes", board),
            Some(json!({"name": "In Progress", "position": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(lane["board_uuid"], board.as_str());

        let (_, lanes) = send(&app, "GET", &format!("/api/boards/{}/lanes", board), None).await;
        let names: Vec<&str> = lanes
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["To Do", "In Progress", "Done"]);
    }

    #[tokio::test]
    async fn test_create_card_validation_and_position() {
        let app = test_app();
        let (_, lanes) = setup_lanes(&app, &["To Do"]).await;
        let uri = format!("/api/lanes/{}/cards", lanes[0]);

        let (status, body) = send(&app, "POST", &uri, Some(json!({"priority": "High"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "title");

        send(&app, "POST", &uri, Some(json!({"title": "A"}))).await;
        let (status, card) = send(
            &app,
            "POST",
            &uri,
            Some(json!({"title": "Fix bug", "priority": "High"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(card["position"], 1);
        assert_eq!(card["priority"], "High");
        assert_eq!(card["lane_uuid"], lanes[0].as_str());
    }

    #[tokio::test]
    async fn test_create_card_in_unknown_lane_is_404() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/lanes/missing/cards",
            Some(json!({"title": "A"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Swim lane not found");
    }

    #[tokio::test]
    async fn test_move_card_renumbers_both_lanes() {
        let app = test_app();
        let (_, lanes) = setup_lanes(&app, &["To Do", "In Progress"]).await;
        let todo = format!("/api/lanes/{}/cards", lanes[0]);
        let doing = format!("/api/lanes/{}/cards", lanes[1]);
        send(&app, "POST", &todo, Some(json!({"title": "A"}))).await;
        let (_, b) = send(&app, "POST", &todo, Some(json!({"title": "B"}))).await;
        send(&app, "POST", &doing, Some(json!({"title": "X"}))).await;

        let (status, moved) = send(
            &app,
            "PUT",
            &format!("/api/cards/{}/move", b["uuid"].as_str().unwrap()),
            Some(json!({"lane_uuid": lanes[1], "position": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["lane_uuid"], lanes[1].as_str());
        assert_eq!(moved["position"], 0);

        let (_, cards) = send(&app, "GET", &doing, None).await;
        let placed: Vec<(String, i64)> = cards
            .as_array()
            .unwrap()
            .iter()
            .map(|c| (c["title"].as_str().unwrap().to_string(), c["position"].as_i64().unwrap()))
            .collect();
        assert_eq!(placed, vec![("B".to_string(), 0), ("X".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_move_card_to_unknown_lane_is_404() {
        let app = test_app();
        let (_, lanes) = setup_lanes(&app, &["To Do"]).await;
        let (_, card) = send(
            &app,
            "POST",
            &format!("/api/lanes/{}/cards", lanes[0]),
            Some(json!({"title": "A"})),
        )
        .await;
        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/cards/{}/move", card["uuid"].as_str().unwrap()),
            Some(json!({"lane_uuid": "missing", "position": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Target swim lane not found");
    }

    #[tokio::test]
    async fn test_move_card_with_negative_position_is_400() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "PUT",
            "/api/cards/anything/move",
            Some(json!({"lane_uuid": "l", "position": -1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "position");
    }

    #[tokio::test]
    async fn test_update_and_delete_card() {
        let app = test_app();
        let (_, lanes) = setup_lanes(&app, &["To Do"]).await;
        let (_, card) = send(
            &app,
            "POST",
            &format!("/api/lanes/{}/cards", lanes[0]),
            Some(json!({"title": "A"})),
        )
        .await;
        let uri = format!("/api/cards/{}", card["uuid"].as_str().unwrap());

        let (status, updated) = send(&app, "PUT", &uri, Some(json!({"priority": "low"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["priority"], "Low");
        assert_eq!(updated["title"], "A");

        let (status, body) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Card deleted successfully");

        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_lane_message() {
        let app = test_app();
        let (_, lanes) = setup_lanes(&app, &["To Do"]).await;
        let (status, body) = send(&app, "DELETE", &format!("/api/lanes/{}", lanes[0]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Swim lane deleted successfully");
    }

    #[tokio::test]
    async fn test_verify_reports_all_checks() {
        let app = test_app();
        let (status, report) = send(&app, "GET", "/api/verify", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["status"], "success");
        assert_eq!(
            report["tests"],
            json!({"connection": true, "read": true, "write": true})
        );
    }
}
