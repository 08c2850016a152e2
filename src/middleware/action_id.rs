/// Correlates every front-end request with the session action it performs
///
/// API Flow:
/// 1. the front end may send `x-action-id` so a click and its request share an id
/// 2. otherwise a fresh id is assigned and stored in request extensions
/// 3. the trace span carries the id and the action name resolved from the path
/// 4. the id is echoed on the response so the front end can match replies
use axum::{
    body::Body,
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const ACTION_ID_HEADER: &str = "x-action-id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionId(pub Uuid);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The caller's id when it parses as a UUID
    fn from_header(value: Option<&HeaderValue>) -> Option<Self> {
        value
            .and_then(|h| h.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(ActionId)
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session operation served by a route path
pub fn action_kind(path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["health"] => "health",
        ["view"] => "view",
        ["navigate"] => "navigate",
        ["back"] => "back",
        ["auth", "anonymous"] => "sign_in_anonymously",
        ["auth", "login"] => "sign_in",
        ["auth", "register"] => "register",
        ["auth", "logout"] => "sign_out",
        ["library", "watch-later", _] => "toggle_watch_later",
        ["library", "liked", _] => "toggle_liked_movie",
        ["library", "playlists"] => "create_playlist",
        ["library", "playlists", _, "items"] => "add_to_playlist",
        ["posts"] => "create_post",
        ["posts", _, "like"] => "toggle_post_like",
        ["posts", _, "comments"] => "add_comment",
        ["users", _, "follow"] => "toggle_follow",
        ["movies", _, "insights"] => "movie_insights",
        ["movies", _, "quiz"] => "movie_quiz",
        ["movies", _, "quiz", "answer"] => "answer_quiz",
        ["genie"] => "ask_genie",
        _ => "unknown",
    }
}

pub async fn action_id_middleware(mut request: Request, next: Next) -> Response {
    let action_id =
        ActionId::from_header(request.headers().get(ACTION_ID_HEADER)).unwrap_or_default();
    let action = action_kind(request.uri().path());
    request.extensions_mut().insert(action_id);

    let mut response = next.run(request).await;

    // Failed actions surface to the user as a blocking message
    if response.status().is_client_error() || response.status().is_server_error() {
        tracing::warn!(
            action,
            action_id = %action_id,
            status = response.status().as_u16(),
            "Action rejected"
        );
    }

    if let Ok(value) = HeaderValue::from_str(&action_id.to_string()) {
        response.headers_mut().insert(ACTION_ID_HEADER, value);
    }
    response
}

/// Span for `TraceLayer`
pub fn make_span_with_action_id(request: &Request<Body>) -> tracing::Span {
    let action_id = request
        .extensions()
        .get::<ActionId>()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unassigned".to_string());

    tracing::info_span!(
        "action",
        action = action_kind(request.uri().path()),
        action_id = %action_id,
        method = %request.method(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_follows_routes() {
        assert_eq!(action_kind("/library/watch-later/m1"), "toggle_watch_later");
        assert_eq!(action_kind("/library/playlists/pl-1/items"), "add_to_playlist");
        assert_eq!(action_kind("/posts/p1/like"), "toggle_post_like");
        assert_eq!(action_kind("/movies/m1/quiz/answer"), "answer_quiz");
        assert_eq!(action_kind("/genie/"), "ask_genie");
        assert_eq!(action_kind("/movies/m1"), "unknown");
    }

    #[test]
    fn test_caller_id_is_reused_only_when_valid() {
        let id = Uuid::new_v4();
        let header = HeaderValue::from_str(&id.to_string()).unwrap();
        assert_eq!(ActionId::from_header(Some(&header)), Some(ActionId(id)));

        let junk = HeaderValue::from_static("not-a-uuid");
        assert_eq!(ActionId::from_header(Some(&junk)), None);
        assert_eq!(ActionId::from_header(None), None);
    }
}
