use serde::Serialize;
use serde_json::json;

use super::{post_cards, MountContext, PostCard, RenderInput};
use crate::models::{Movie, Post, Quiz};
use crate::store::{Collection, FilterOp, QueryDescriptor};
use crate::sync::{Snapshot, SubscriptionManager, ViewStateSync};

/// Per-mount state; AI results are cached until the view is left
pub struct MovieState {
    pub movie_id: String,
    pub posts: ViewStateSync,
    pub insights: Option<String>,
    pub quiz: Option<Quiz>,
    pub answer: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizCard {
    pub question: String,
    pub options: Vec<String>,
    pub answered: Option<usize>,
    /// Revealed once an answer is given
    pub correct: Option<usize>,
}

impl QuizCard {
    fn new(quiz: &Quiz, answered: Option<usize>) -> Self {
        Self {
            question: quiz.question.clone(),
            options: quiz.options.clone(),
            answered,
            correct: answered.map(|_| quiz.correct),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MovieDetailPage {
    pub movie_id: String,
    pub movie: Option<Movie>,
    pub in_watch_later: bool,
    pub liked: bool,
    pub related_posts: Vec<PostCard>,
    pub insights: Option<String>,
    pub quiz: Option<QuizCard>,
}

pub async fn mount(
    ctx: &MountContext<'_>,
    subscriptions: &SubscriptionManager,
    movie_id: &str,
) -> MovieState {
    let posts = ctx.sync_for(Collection::Posts);
    let query =
        QueryDescriptor::collection(posts.collection()).filter("channel", FilterOp::Eq, json!(movie_id));
    posts.subscribe(subscriptions, query, Snapshot::empty()).await;

    MovieState {
        movie_id: movie_id.to_string(),
        posts,
        insights: None,
        quiz: None,
        answer: None,
    }
}

pub fn find_movie<'a>(catalog: &'a [Movie], movie_id: &str) -> Option<&'a Movie> {
    catalog.iter().find(|movie| movie.id == movie_id)
}

/// Related posts come newest first
pub fn render(state: &MovieState, input: &RenderInput<'_>) -> MovieDetailPage {
    let movie = find_movie(input.catalog, &state.movie_id).cloned();
    let posts: Vec<Post> = state.posts.rendered_as();

    MovieDetailPage {
        in_watch_later: input
            .me
            .is_some_and(|me| me.watch_later.contains(&state.movie_id)),
        liked: input
            .me
            .is_some_and(|me| me.liked_movies.contains(&state.movie_id)),
        related_posts: post_cards(posts, input),
        insights: state.insights.clone(),
        quiz: state
            .quiz
            .as_ref()
            .map(|quiz| QuizCard::new(quiz, state.answer)),
        movie_id: state.movie_id.clone(),
        movie,
    }
}
