use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::{action_id_middleware, make_span_with_action_id};

/// Creates the router serving the session to the browser front end
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Navigation
        .route("/view", get(handlers::get_view))
        .route("/navigate", post(handlers::navigate))
        .route("/back", post(handlers::back))
        // Identity
        .route("/auth/anonymous", post(handlers::sign_in_anonymously))
        .route("/auth/login", post(handlers::login))
        .route("/auth/register", post(handlers::register))
        .route("/auth/logout", post(handlers::logout))
        // Library
        .route("/library/watch-later/:movie_id", post(handlers::toggle_watch_later))
        .route("/library/liked/:movie_id", post(handlers::toggle_liked_movie))
        .route("/library/playlists", post(handlers::create_playlist))
        .route("/library/playlists/:playlist_id/items", post(handlers::add_to_playlist))
        // Social
        .route("/posts", post(handlers::create_post))
        .route("/posts/:post_id/like", post(handlers::toggle_post_like))
        .route("/posts/:post_id/comments", post(handlers::add_comment))
        .route("/users/:user_id/follow", post(handlers::toggle_follow))
        // AI
        .route("/movies/:movie_id/insights", post(handlers::movie_insights))
        .route("/movies/:movie_id/quiz", post(handlers::movie_quiz))
        .route("/movies/:movie_id/quiz/answer", post(handlers::answer_quiz))
        .route("/genie", post(handlers::ask_genie))
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_action_id))
        .layer(middleware::from_fn(action_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
