use crate::error::{AuthError, PollError, VoteRejection};
use crate::startup::AppState;
use crate::store::{OptionId, PollId};
use crate::voting::{PollView, ResultsView};
use axum::{
    extract::{
        Extension, Json, Path,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

// Request/Response DTOs. Field names follow the mobile client.
#[derive(Debug, Serialize)]
pub struct OptionResponse {
    pub id: OptionId,
    #[serde(rename = "texto")]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub id: PollId,
    #[serde(rename = "pregunta")]
    pub question: String,
    #[serde(rename = "fecha_cierre")]
    pub closes_at: NaiveDateTime,
    #[serde(rename = "activa")]
    pub is_active: bool,
    #[serde(rename = "esta_abierta")]
    pub is_open: bool,
    #[serde(rename = "opciones")]
    pub options: Vec<OptionResponse>,
    #[serde(rename = "ya_vote")]
    pub has_voted: bool,
    #[serde(rename = "opcion_votada_id")]
    pub voted_option_id: Option<OptionId>,
}

impl From<PollView> for PollResponse {
    fn from(view: PollView) -> Self {
        PollResponse {
            id: view.id,
            question: view.question,
            closes_at: view.closes_at,
            is_active: view.is_active,
            is_open: view.is_open,
            options: view
                .options
                .into_iter()
                .map(|opt| OptionResponse {
                    id: opt.id,
                    text: opt.text,
                })
                .collect(),
            has_voted: view.has_voted,
            voted_option_id: view.voted_option_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    #[serde(rename = "opcion_id")]
    pub option_id: OptionId,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub ok: bool,
    #[serde(rename = "mensaje")]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PollHeader {
    pub id: PollId,
    #[serde(rename = "pregunta")]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct OptionResultResponse {
    #[serde(rename = "opcion_id")]
    pub option_id: OptionId,
    #[serde(rename = "texto")]
    pub text: String,
    #[serde(rename = "votos")]
    pub votes: u64,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    #[serde(rename = "votacion")]
    pub poll: PollHeader,
    #[serde(rename = "total_votos")]
    pub total_votes: u64,
    #[serde(rename = "opciones")]
    pub options: Vec<OptionResultResponse>,
}

impl From<ResultsView> for ResultsResponse {
    fn from(view: ResultsView) -> Self {
        ResultsResponse {
            poll: PollHeader {
                id: view.poll_id,
                question: view.question,
            },
            total_votes: view.total_votes,
            options: view
                .options
                .into_iter()
                .map(|opt| OptionResultResponse {
                    option_id: opt.option_id,
                    text: opt.text,
                    votes: opt.votes,
                })
                .collect(),
        }
    }
}

// Raw `Authorization` header value, if any.
fn credential(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

/// Open polls, with the caller's own ballot filled in
pub async fn list_open_polls(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let polls = app_state.voting.list_open_polls(credential(&headers)).await?;
    let polls: Vec<PollResponse> = polls.into_iter().map(Into::into).collect();

    Ok((StatusCode::OK, Json(polls)))
}

/// Closed polls; `ya_vote` is always false here
pub async fn list_closed_polls(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let polls = app_state
        .voting
        .list_closed_polls(credential(&headers))
        .await?;
    let polls: Vec<PollResponse> = polls.into_iter().map(Into::into).collect();

    Ok((StatusCode::OK, Json(polls)))
}

// A malformed path id is reported like any other bad request, once the
// caller is known.
fn poll_id_from(path: Result<Path<PollId>, PathRejection>) -> Result<PollId, PollError> {
    path.map(|Path(poll_id)| poll_id).map_err(|e| {
        warn!("Rejected poll id: {e}");
        PollError::InvalidRequest
    })
}

pub async fn vote_on_poll(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    poll_id: Result<Path<PollId>, PathRejection>,
    payload: Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, VoteRejection> {
    let credential = credential(&headers);
    // A bad path or body only matters once the caller is known.
    app_state.voting.authenticate(credential)?;
    let poll_id = poll_id_from(poll_id)?;
    let Json(payload) = payload.map_err(|rejection| match rejection {
        JsonRejection::JsonDataError(_) => PollError::MissingOption,
        _ => PollError::InvalidRequest,
    })?;

    app_state
        .voting
        .cast_vote(credential, poll_id, payload.option_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(VoteResponse {
            ok: true,
            message: "Voto registrado exitosamente".to_string(),
        }),
    ))
}

pub async fn poll_results(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    poll_id: Result<Path<PollId>, PathRejection>,
) -> Result<impl IntoResponse, PollError> {
    let credential = credential(&headers);
    app_state.voting.authenticate(credential)?;
    let poll_id = poll_id_from(poll_id)?;

    let results = app_state.voting.results(credential, poll_id).await?;

    Ok((StatusCode::OK, Json(ResultsResponse::from(results))))
}

/// Close a poll (admins only)
pub async fn close_poll(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    poll_id: Result<Path<PollId>, PathRejection>,
) -> Result<impl IntoResponse, PollError> {
    let credential = credential(&headers);
    app_state.voting.authenticate(credential)?;
    let poll_id = poll_id_from(poll_id)?;

    app_state.voting.close_poll(credential, poll_id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Votación cerrada exitosamente"
        })),
    ))
}

#[cfg(test)]
mod tests {
    use crate::seed::Seed;
    use crate::startup::{AppState, router};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const KASSANDRA: &str = "Token token_kassandra_123456";
    const TEST_USER: &str = "Token token_test_654321";
    const ADMIN: &str = "Token token_admin_1";

    async fn app() -> Router {
        let (accounts, voting) = Seed::builtin()
            .unwrap()
            .build(&["admin".to_string()])
            .await
            .unwrap();
        router(AppState::new(accounts, voting))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header("Content-Type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn open_polls_use_client_field_names() {
        let app = app().await;
        let (status, body) = send(&app, get("/votaciones/api/v1/abiertas/", Some(KASSANDRA))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body[0],
            json!({
                "id": 1,
                "pregunta": "Fecha de proxima asamblea?",
                "fecha_cierre": "2025-10-30T12:00:00",
                "activa": true,
                "esta_abierta": true,
                "opciones": [
                    {"id": 1, "texto": "Lunes 3 de noviembre"},
                    {"id": 2, "texto": "Martes 4 de noviembre"},
                    {"id": 3, "texto": "Miércoles 5 de noviembre"}
                ],
                "ya_vote": true,
                "opcion_votada_id": 1
            })
        );
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn closed_polls_hide_ballots() {
        let app = app().await;
        let (status, body) = send(&app, get("/votaciones/api/v1/cerradas/", Some(TEST_USER))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], 3);
        assert_eq!(body[0]["ya_vote"], false);
        assert_eq!(body[0]["opcion_votada_id"], Value::Null);
    }

    #[tokio::test]
    async fn listing_without_or_with_bad_token_is_unauthorized() {
        let app = app().await;

        let (status, body) = send(&app, get("/votaciones/api/v1/abiertas/", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "missing_credential");

        let (status, body) = send(
            &app,
            get("/votaciones/api/v1/cerradas/", Some("Token token_ghost_1")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "invalid_credential");
    }

    #[tokio::test]
    async fn vote_then_results_then_duplicate() {
        let app = app().await;

        let (status, body) = send(
            &app,
            post_json("/votaciones/api/v1/2/votar/", Some(TEST_USER), json!({"opcion_id": 4})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["mensaje"], "Voto registrado exitosamente");

        let (status, body) = send(&app, get("/votaciones/api/v1/2/resultados/", Some(TEST_USER))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "votacion": {"id": 2, "pregunta": "rrr"},
                "total_votos": 4,
                "opciones": [
                    {"opcion_id": 4, "texto": "Opción A", "votos": 3},
                    {"opcion_id": 5, "texto": "Opción B", "votos": 1}
                ]
            })
        );

        let (status, body) = send(
            &app,
            post_json("/votaciones/api/v1/2/votar/", Some(TEST_USER), json!({"opcion_id": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["kind"], "already_voted");
        assert_eq!(body["mensaje"], "Ya has votado en esta votación");
    }

    #[tokio::test]
    async fn vote_rejections_map_to_statuses() {
        let app = app().await;
        let cases = [
            ("/votaciones/api/v1/9/votar/", json!({"opcion_id": 1}), StatusCode::NOT_FOUND, "poll_not_found"),
            ("/votaciones/api/v1/3/votar/", json!({"opcion_id": 6}), StatusCode::BAD_REQUEST, "poll_closed"),
            ("/votaciones/api/v1/1/votar/", json!({"opcion_id": 6}), StatusCode::BAD_REQUEST, "invalid_option"),
            ("/votaciones/api/v1/1/votar/", json!({}), StatusCode::BAD_REQUEST, "missing_option"),
            ("/votaciones/api/v1/abc/votar/", json!({"opcion_id": 1}), StatusCode::BAD_REQUEST, "invalid_request"),
        ];

        for (uri, payload, expected_status, expected_kind) in cases {
            let (status, body) = send(&app, post_json(uri, Some(TEST_USER), payload)).await;
            assert_eq!(status, expected_status, "{uri}");
            assert_eq!(body["kind"], expected_kind, "{uri}");
            assert_eq!(body["ok"], false);
        }
    }

    #[tokio::test]
    async fn vote_checks_token_before_body() {
        let app = app().await;
        let request = Request::post("/votaciones/api/v1/1/votar/")
            .body(Body::from("not json"))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "missing_credential");
    }

    #[tokio::test]
    async fn non_numeric_poll_id_is_a_json_bad_request() {
        let app = app().await;

        let (status, body) = send(
            &app,
            post_json("/votaciones/api/v1/abc/votar/", Some(TEST_USER), json!({"opcion_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["kind"], "invalid_request");
        assert_eq!(body["mensaje"], "Solicitud inválida");

        let (status, body) = send(&app, get("/votaciones/api/v1/abc/resultados/", Some(TEST_USER))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");

        let (status, body) = send(&app, get("/votaciones/api/v1/abc/resultados/", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token de autorización requerido");
    }

    #[tokio::test]
    async fn results_for_unknown_poll_is_not_found() {
        let app = app().await;
        let (status, body) = send(&app, get("/votaciones/api/v1/42/resultados/", Some(KASSANDRA))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "poll_not_found");
    }

    #[tokio::test]
    async fn admin_close_moves_poll_to_closed_listing() {
        let app = app().await;

        let (status, _) = send(&app, post_json("/votaciones/api/v1/1/cerrar/", Some(TEST_USER), json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, post_json("/votaciones/api/v1/1/cerrar/", Some(ADMIN), json!({}))).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get("/votaciones/api/v1/cerradas/", Some(KASSANDRA))).await;
        let ids: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn login_returns_usable_token() {
        let app = app().await;
        let (status, body) = send(
            &app,
            post_json(
                "/usuarios/api/login/",
                None,
                json!({"username": "admin", "password": "admin123"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"], json!({"username": "admin", "id": 2}));

        let header = format!("Token {}", body["token"].as_str().unwrap());
        let (status, _) = send(&app, get("/votaciones/api/v1/abiertas/", Some(header.as_str()))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn login_failures() {
        let app = app().await;

        let (status, body) = send(
            &app,
            post_json("/usuarios/api/login/", None, json!({"username": "admin", "password": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Contraseña incorrecta");

        let (status, _) = send(
            &app,
            post_json("/usuarios/api/login/", None, json!({"username": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::post("/usuarios/api/login/")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn health_echo_and_fallback() {
        let app = app().await;

        let (status, body) = send(&app, get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");

        let (status, body) = send(&app, post_json("/usuarios/api/test/", None, json!({"ping": 1}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received_data"], json!({"ping": 1}));

        let (status, _) = send(&app, get("/nowhere", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
