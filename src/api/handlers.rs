use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::models::{Playlist, Quiz};
use crate::navigator::Selector;
use crate::services::auth::AuthUser;
use crate::session::{QuizAnswer, SessionView};
use crate::views::studio::NewPost;

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddToPlaylistRequest {
    pub movie_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: usize,
}

#[derive(Debug, Deserialize)]
pub struct GenieRequest {
    pub prompt: String,
}

/// Result of a membership toggle
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

pub async fn get_view(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.session.view().await)
}

pub async fn navigate(
    State(state): State<AppState>,
    Json(selector): Json<Selector>,
) -> Json<SessionView> {
    state.session.navigate(selector).await;
    Json(state.session.view().await)
}

pub async fn back(State(state): State<AppState>) -> Json<SessionView> {
    state.session.back().await;
    Json(state.session.view().await)
}

pub async fn sign_in_anonymously(State(state): State<AppState>) -> AppResult<Json<AuthUser>> {
    Ok(Json(state.session.sign_in_anonymously().await?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthUser>> {
    let user = state
        .session
        .sign_in(&request.email, &request.password)
        .await?;
    Ok(Json(user))
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthUser>)> {
    let user = state
        .session
        .register(&request.name, &request.email, &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn logout(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.session.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_watch_later(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> AppResult<Json<ToggleResponse>> {
    let active = state.session.toggle_watch_later(&movie_id).await?;
    Ok(Json(ToggleResponse { active }))
}

pub async fn toggle_liked_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> AppResult<Json<ToggleResponse>> {
    let active = state.session.toggle_liked_movie(&movie_id).await?;
    Ok(Json(ToggleResponse { active }))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Json(request): Json<CreatePlaylistRequest>,
) -> AppResult<(StatusCode, Json<Playlist>)> {
    let playlist = state.session.create_playlist(&request.name).await?;
    Ok((StatusCode::CREATED, Json(playlist)))
}

pub async fn add_to_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    Json(request): Json<AddToPlaylistRequest>,
) -> AppResult<Json<Playlist>> {
    let playlist = state
        .session
        .add_to_playlist(&playlist_id, &request.movie_id)
        .await?;
    Ok(Json(playlist))
}

pub async fn create_post(
    State(state): State<AppState>,
    Json(request): Json<NewPost>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state.session.create_post(request).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn toggle_post_like(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<ToggleResponse>> {
    let active = state.session.toggle_post_like(&post_id).await?;
    Ok(Json(ToggleResponse { active }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> AppResult<StatusCode> {
    state.session.add_comment(&post_id, &request.text).await?;
    Ok(StatusCode::CREATED)
}

pub async fn toggle_follow(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ToggleResponse>> {
    let active = state.session.toggle_follow(&user_id).await?;
    Ok(Json(ToggleResponse { active }))
}

pub async fn movie_insights(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> AppResult<Json<TextResponse>> {
    let text = state.session.movie_insights(&movie_id).await?;
    Ok(Json(TextResponse { text }))
}

pub async fn movie_quiz(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> AppResult<Json<Quiz>> {
    Ok(Json(state.session.movie_quiz(&movie_id).await?))
}

pub async fn answer_quiz(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> AppResult<Json<QuizAnswer>> {
    let answer = state
        .session
        .answer_quiz(&movie_id, request.answer)
        .await?;
    Ok(Json(answer))
}

pub async fn ask_genie(
    State(state): State<AppState>,
    Json(request): Json<GenieRequest>,
) -> AppResult<Json<TextResponse>> {
    let text = state.session.ask_genie(&request.prompt).await?;
    Ok(Json(TextResponse { text }))
}
