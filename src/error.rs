use crate::store::{OptionId, PollId};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token de autorización requerido")]
    MissingCredential,
    #[error("Token inválido")]
    InvalidCredential,
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidCredential => "invalid_credential",
        }
    }
}

/// Tally and ballots of a poll disagree. Seeing this means a bug, not bad input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("poll {poll_id} tally holds {tallied} live votes but {ballots} ballots were recorded")]
    Desync {
        poll_id: PollId,
        tallied: u64,
        ballots: u64,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error("Solicitud inválida")]
    InvalidRequest,
    #[error("ID de opción requerido")]
    MissingOption,
    #[error("Votación no encontrada")]
    PollNotFound,
    #[error("La votación está cerrada")]
    PollClosed,
    #[error("Opción no válida")]
    InvalidOption,
    #[error("Ya has votado en esta votación")]
    AlreadyVoted,
    #[error("Acción no permitida")]
    Forbidden,
    #[error("Error interno del servidor")]
    Consistency(#[from] ConsistencyError),
}

impl PollError {
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::Unauthorized(e) => e.kind(),
            PollError::InvalidRequest => "invalid_request",
            PollError::MissingOption => "missing_option",
            PollError::PollNotFound => "poll_not_found",
            PollError::PollClosed => "poll_closed",
            PollError::InvalidOption => "invalid_option",
            PollError::AlreadyVoted => "already_voted",
            PollError::Forbidden => "forbidden",
            PollError::Consistency(_) => "consistency",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PollError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PollError::InvalidRequest
            | PollError::MissingOption
            | PollError::PollClosed
            | PollError::InvalidOption
            | PollError::AlreadyVoted => StatusCode::BAD_REQUEST,
            PollError::PollNotFound => StatusCode::NOT_FOUND,
            PollError::Forbidden => StatusCode::FORBIDDEN,
            PollError::Consistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("poll {0} not found")]
    PollNotFound(PollId),
    #[error("option {option_id} does not belong to poll {poll_id}")]
    UnknownOption { poll_id: PollId, option_id: OptionId },
    #[error("poll {0} already exists")]
    DuplicatePoll(PollId),
    #[error("poll {poll_id} lists option {option_id} more than once")]
    DuplicateOption { poll_id: PollId, option_id: OptionId },
    #[error("poll {0} has no options")]
    EmptyOptions(PollId),
    #[error("poll {0} is closed")]
    PollClosed(PollId),
}

impl From<StoreError> for PollError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::PollNotFound(_) => PollError::PollNotFound,
            StoreError::UnknownOption { .. } => PollError::InvalidOption,
            StoreError::PollClosed(_) => PollError::PollClosed,
            StoreError::DuplicatePoll(_)
            | StoreError::DuplicateOption { .. }
            | StoreError::EmptyOptions(_) => PollError::InvalidRequest,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ballot already recorded")]
    AlreadyVoted,
}

impl From<LedgerError> for PollError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::AlreadyVoted => PollError::AlreadyVoted,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginError {
    #[error("Content-Type debe ser application/json")]
    NotJson,
    #[error("Datos JSON vacíos o inválidos")]
    InvalidBody,
    #[error("Los campos username y password son requeridos")]
    MissingFields,
    #[error("Usuario no encontrado")]
    UserNotFound,
    #[error("Contraseña incorrecta")]
    WrongPassword,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("user {0} is listed more than once")]
pub struct DuplicateUser(pub String);

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed seed file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid poll in seed: {0}")]
    Store(#[from] StoreError),
    #[error("Invalid user in seed: {0}")]
    DuplicateUser(#[from] DuplicateUser),
    #[error("Seed ballot rejected for {user} on poll {poll_id}: {source}")]
    Ballot {
        user: String,
        poll_id: PollId,
        source: PollError,
    },
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (self.status(), body).into_response()
    }
}

/// Vote endpoint failures use the `{ok, mensaje}` envelope the client reads.
#[derive(Debug)]
pub struct VoteRejection(pub PollError);

impl From<PollError> for VoteRejection {
    fn from(error: PollError) -> Self {
        VoteRejection(error)
    }
}

impl From<AuthError> for VoteRejection {
    fn from(error: AuthError) -> Self {
        VoteRejection(error.into())
    }
}

impl IntoResponse for VoteRejection {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "ok": false,
            "mensaje": self.0.to_string(),
            "kind": self.0.kind(),
        }));

        (self.0.status(), body).into_response()
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let status = match self {
            LoginError::NotJson | LoginError::InvalidBody | LoginError::MissingFields => {
                StatusCode::BAD_REQUEST
            }
            LoginError::UserNotFound | LoginError::WrongPassword => StatusCode::UNAUTHORIZED,
        };

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
