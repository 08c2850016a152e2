/// Mounted views and their page models
///
/// A [`MountedView`] owns the subscriptions its selector needs. Catalog-only
/// views (home, search, cast, library, studio) open nothing of their own and
/// render from the session's global catalog and users state. Dropping or
/// tearing down a mounted view closes everything it opened.
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{fallback_catalog, Movie, Post, UserProfile};
use crate::navigator::Selector;
use crate::store::{DataPaths, Document, RemoteStore};
use crate::sync::{Snapshot, SubscriptionManager, ViewStateSync};

pub mod cast;
pub mod feed;
pub mod genie;
pub mod home;
pub mod library;
pub mod movie_detail;
pub mod notifications;
pub mod profile;
pub mod search;
pub mod studio;

/// What a view needs to open its subscriptions
pub struct MountContext<'a> {
    pub store: Arc<dyn RemoteStore>,
    pub paths: &'a DataPaths,
    pub edit_timeout: Duration,
    /// Signed-in user id, scopes per-user queries
    pub me: Option<&'a str>,
    /// Global users state, consulted before a one-time profile read
    pub users: &'a ViewStateSync,
}

impl MountContext<'_> {
    fn sync_for(&self, collection: crate::store::Collection) -> ViewStateSync {
        ViewStateSync::new(
            self.store.clone(),
            self.paths.collection(collection),
            self.edit_timeout,
        )
    }
}

/// Global state every render reads from
pub struct RenderInput<'a> {
    pub catalog: &'a [Movie],
    pub users: &'a [UserProfile],
    pub me: Option<&'a UserProfile>,
}

/// A post as shown in feeds, with viewer-specific flags
#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    #[serde(flatten)]
    pub post: Post,
    pub handle: String,
    pub liked: bool,
    /// Title of the catalog entry the post is tagged with
    pub linked_title: Option<String>,
    pub mentions: Vec<String>,
}

pub fn post_cards(mut posts: Vec<Post>, input: &RenderInput<'_>) -> Vec<PostCard> {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let me = input.me.map(|profile| profile.uid.as_str());
    posts
        .into_iter()
        .map(|post| {
            let compact: String = post.name.chars().filter(|c| !c.is_whitespace()).collect();
            PostCard {
                handle: format!("@{}", compact.to_lowercase()),
                liked: me.is_some_and(|uid| post.likes.iter().any(|like| like == uid)),
                linked_title: input
                    .catalog
                    .iter()
                    .find(|movie| movie.id == post.channel)
                    .map(|movie| movie.title.clone()),
                mentions: post.mentions(),
                post,
            }
        })
        .collect()
}

/// Catalog to render: the authoritative one, or the bundled list when it is empty
pub fn effective_catalog(authoritative: Vec<Movie>) -> Vec<Movie> {
    if authoritative.is_empty() {
        fallback_catalog().to_vec()
    } else {
        authoritative
    }
}

/// The bundled catalog as a snapshot, delivered when the catalog read fails
pub fn fallback_catalog_snapshot() -> Snapshot {
    Snapshot::new(
        fallback_catalog()
            .iter()
            .filter_map(|movie| match serde_json::to_value(movie) {
                Ok(value) => Some(Document::new(movie.id.clone(), value)),
                Err(e) => {
                    tracing::error!(movie = %movie.id, error = %e, "Bundled movie failed to encode");
                    None
                }
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum RenderedView {
    Home(home::HomePage),
    Library(library::LibraryPage),
    Feed(feed::FeedPage),
    Upload(studio::StudioPage),
    Notifications(notifications::NotificationsPage),
    CineGenie(genie::GeniePage),
    Search(search::SearchPage),
    Profile(profile::ProfilePage),
    Movie(movie_detail::MovieDetailPage),
    Cast(cast::CastPage),
}

enum ViewState {
    CatalogOnly,
    Feed(feed::FeedState),
    Movie(movie_detail::MovieState),
    Profile(profile::ProfileState),
    Notifications(notifications::NotificationsState),
    Genie(genie::GenieState),
}

pub struct MountedView {
    id: Uuid,
    selector: Selector,
    subscriptions: SubscriptionManager,
    state: ViewState,
}

impl MountedView {
    pub async fn mount(selector: Selector, ctx: &MountContext<'_>) -> Self {
        let subscriptions = SubscriptionManager::new(ctx.store.clone());
        let state = match &selector {
            Selector::Feed { .. } => ViewState::Feed(feed::mount(ctx, &subscriptions).await),
            Selector::Movie { movie_id } => {
                ViewState::Movie(movie_detail::mount(ctx, &subscriptions, movie_id).await)
            }
            Selector::Profile { user_id } => {
                ViewState::Profile(profile::mount(ctx, &subscriptions, user_id).await)
            }
            Selector::Notifications => {
                ViewState::Notifications(notifications::mount(ctx, &subscriptions).await)
            }
            Selector::CineGenie => ViewState::Genie(genie::GenieState::new()),
            Selector::Home { .. }
            | Selector::Library
            | Selector::Upload
            | Selector::Search { .. }
            | Selector::Cast { .. } => ViewState::CatalogOnly,
        };

        tracing::debug!(
            view = selector.name(),
            subscriptions = subscriptions.open_count(),
            "View mounted"
        );

        Self {
            id: Uuid::new_v4(),
            selector,
            subscriptions,
            state,
        }
    }

    /// Identifies this mount; a remount of the same selector gets a new id
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Posts state of views that list posts
    pub fn posts(&self) -> Option<&ViewStateSync> {
        match &self.state {
            ViewState::Feed(state) => Some(&state.posts),
            ViewState::Movie(state) => Some(&state.posts),
            ViewState::Profile(state) => Some(&state.posts),
            _ => None,
        }
    }

    pub fn movie_state_mut(&mut self, movie_id: &str) -> Option<&mut movie_detail::MovieState> {
        match &mut self.state {
            ViewState::Movie(state) if state.movie_id == movie_id => Some(state),
            _ => None,
        }
    }

    pub fn genie_state_mut(&mut self) -> Option<&mut genie::GenieState> {
        match &mut self.state {
            ViewState::Genie(state) => Some(state),
            _ => None,
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.open_count()
    }

    pub fn render(&self, input: &RenderInput<'_>) -> RenderedView {
        match (&self.selector, &self.state) {
            (Selector::Feed { tab }, ViewState::Feed(state)) => {
                RenderedView::Feed(feed::render(state, *tab, input))
            }
            (Selector::Movie { .. }, ViewState::Movie(state)) => {
                RenderedView::Movie(movie_detail::render(state, input))
            }
            (Selector::Profile { .. }, ViewState::Profile(state)) => {
                RenderedView::Profile(profile::render(state, input))
            }
            (Selector::Notifications, ViewState::Notifications(state)) => {
                RenderedView::Notifications(notifications::render(state))
            }
            (Selector::CineGenie, ViewState::Genie(state)) => {
                RenderedView::CineGenie(genie::render(state))
            }
            (
                Selector::Home {
                    type_filter,
                    genre_filter,
                },
                _,
            ) => RenderedView::Home(home::render(
                input.catalog,
                *type_filter,
                genre_filter.as_deref(),
            )),
            (Selector::Library, _) => RenderedView::Library(library::render(input.catalog, input.me)),
            (Selector::Upload, _) => RenderedView::Upload(studio::render(input.catalog)),
            (Selector::Search { query }, _) => {
                RenderedView::Search(search::render(input.catalog, query))
            }
            (Selector::Cast { person }, _) => RenderedView::Cast(cast::render(input.catalog, person)),
            // Mount always pairs a selector with its state
            (_, _) => RenderedView::Home(home::render(input.catalog, None, None)),
        }
    }

    /// Closes every subscription this view opened
    pub fn teardown(&self) {
        self.subscriptions.close_all();
        tracing::debug!(view = self.selector.name(), "View torn down");
    }
}
