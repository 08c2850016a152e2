/// Application shell for one browser session
///
/// API Flow:
/// 1. `start` opens the global catalog and users subscriptions, mounts home
///    and signs in anonymously when nobody is signed in
/// 2. every identity change ensures the user document exists, reopens the
///    global subscriptions and remounts the current view
/// 3. `navigate` tears the mounted view down before mounting the next one
/// 4. actions stage optimistic edits through the owning [`ViewStateSync`] and
///    return the write error, if any, after the edit has been rolled back
///
/// Identity changes are serialized: actions that sign in or out apply the new
/// identity themselves while holding the identity lock, and the background
/// listener skips identities that were already applied.
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::context::ServiceContext;
use crate::error::{AppError, AppResult};
use crate::models::{
    now_millis, Movie, Notification, NotificationType, Playlist, Post, PostType, Quiz, UserProfile,
};
use crate::navigator::{Navigator, Selector};
use crate::services::ai::quiz::{generate_quiz, insights_prompt};
use crate::services::auth::AuthUser;
use crate::store::{Collection, Direction, FieldOp, QueryDescriptor};
use crate::sync::{Snapshot, SubscriptionManager, ViewStateSync};
use crate::views::{
    effective_catalog, fallback_catalog_snapshot, feed, genie, movie_detail, studio,
    MountContext, MountedView, RenderInput, RenderedView,
};

pub const DEFAULT_BIO: &str = "CineSphere Viewer";
const LOGIN_REQUIRED: &str = "Please login to continue.";

/// Everything the front end needs to draw the current screen
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub selector: Selector,
    pub user: Option<AuthUser>,
    pub profile: Option<UserProfile>,
    pub ai_available: bool,
    pub page: RenderedView,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizAnswer {
    pub answer: usize,
    pub correct: usize,
    pub is_correct: bool,
}

struct Shell {
    navigator: Navigator,
    mounted: MountedView,
}

pub struct Session {
    ctx: ServiceContext,
    globals: SubscriptionManager,
    catalog: ViewStateSync,
    users: ViewStateSync,
    shell: Mutex<Shell>,
    /// Uid of the identity whose subscriptions are currently open
    identity: Mutex<Option<String>>,
    listener: StdMutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Session {
    pub async fn start(ctx: ServiceContext) -> Arc<Self> {
        let globals = SubscriptionManager::new(ctx.store.clone());
        let catalog = ViewStateSync::new(
            ctx.store.clone(),
            ctx.paths.collection(Collection::Movies),
            ctx.edit_timeout,
        );
        let users = ViewStateSync::new(
            ctx.store.clone(),
            ctx.paths.collection(Collection::Users),
            ctx.edit_timeout,
        );

        let navigator = Navigator::default();
        let mounted = {
            let mount_ctx = MountContext {
                store: ctx.store.clone(),
                paths: &ctx.paths,
                edit_timeout: ctx.edit_timeout,
                me: None,
                users: &users,
            };
            MountedView::mount(navigator.current().clone(), &mount_ctx).await
        };

        let (shutdown_tx, _) = watch::channel(false);
        let session = Arc::new(Self {
            ctx,
            globals,
            catalog,
            users,
            shell: Mutex::new(Shell { navigator, mounted }),
            identity: Mutex::new(None),
            listener: StdMutex::new(None),
            shutdown_tx,
        });
        session.open_globals().await;

        let mut changes = session.ctx.auth.on_auth_state_changed();
        let current = changes.borrow_and_update().clone();
        {
            let mut identity = session.identity.lock().await;
            let user = match current {
                Some(user) => Some(user),
                None => match session.ctx.auth.sign_in_anonymously().await {
                    Ok(user) => Some(user),
                    Err(e) => {
                        tracing::warn!(error = %e, "Anonymous sign-in failed, continuing signed out");
                        None
                    }
                },
            };
            session.apply_identity(&mut identity, user).await;
        }

        session.spawn_auth_listener(changes);
        session
    }

    fn spawn_auth_listener(self: &Arc<Self>, mut changes: watch::Receiver<Option<AuthUser>>) {
        let weak = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let user = changes.borrow_and_update().clone();
                        let Some(session) = weak.upgrade() else {
                            break;
                        };
                        let mut identity = session.identity.lock().await;
                        session.apply_identity(&mut identity, user).await;
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }
            tracing::debug!("Auth listener stopped");
        });

        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    async fn apply_identity(&self, applied: &mut Option<String>, user: Option<AuthUser>) {
        let uid = user.as_ref().map(|user| user.uid.clone());
        if *applied == uid {
            return;
        }

        if let Some(user) = &user {
            if let Err(e) = self.ensure_user_document(user).await {
                tracing::warn!(uid = %user.uid, error = %e, "Could not ensure user document");
            }
        }
        *applied = uid;

        self.open_globals().await;
        self.remount().await;

        match &user {
            Some(user) => {
                tracing::info!(uid = %user.uid, anonymous = user.is_anonymous, "Identity changed")
            }
            None => tracing::info!("Signed out"),
        }
    }

    async fn ensure_user_document(&self, user: &AuthUser) -> AppResult<()> {
        let path = self.ctx.paths.document(Collection::Users, &user.uid);
        if self.ctx.store.get(&path).await?.is_some() {
            return Ok(());
        }

        let doc = UserProfile::new_document(
            &user.uid,
            &user.preferred_name(),
            user.email.as_deref().unwrap_or_default(),
            DEFAULT_BIO,
            now_millis(),
        );
        self.ctx.store.set(&path, doc).await?;
        tracing::info!(uid = %user.uid, "User document created");
        Ok(())
    }

    /// Catalog falls back to the bundled list when its read fails
    async fn open_globals(&self) {
        let movies = QueryDescriptor::collection(self.catalog.collection())
            .order_by("createdAt", Direction::Desc);
        self.catalog
            .subscribe(&self.globals, movies, fallback_catalog_snapshot())
            .await;

        let users = QueryDescriptor::collection(self.users.collection());
        self.users
            .subscribe(&self.globals, users, Snapshot::empty())
            .await;
    }

    async fn mount(&self, selector: Selector) -> MountedView {
        let me = self.ctx.auth.current_user().map(|user| user.uid);
        let mount_ctx = MountContext {
            store: self.ctx.store.clone(),
            paths: &self.ctx.paths,
            edit_timeout: self.ctx.edit_timeout,
            me: me.as_deref(),
            users: &self.users,
        };
        MountedView::mount(selector, &mount_ctx).await
    }

    async fn remount(&self) {
        let mut shell = self.shell.lock().await;
        shell.mounted.teardown();
        let selector = shell.navigator.current().clone();
        shell.mounted = self.mount(selector).await;
    }

    pub async fn navigate(&self, selector: Selector) -> Selector {
        let mut shell = self.shell.lock().await;
        let selector = shell.navigator.navigate(selector).clone();
        shell.mounted.teardown();
        shell.mounted = self.mount(selector.clone()).await;
        selector
    }

    pub async fn back(&self) -> Selector {
        self.navigate(Selector::home()).await
    }

    pub async fn current_selector(&self) -> Selector {
        self.shell.lock().await.navigator.current().clone()
    }

    /// Catalog as rendered, with the bundled list substituted for an empty one
    pub fn catalog(&self) -> Vec<Movie> {
        effective_catalog(self.catalog.rendered_as())
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.ctx.auth.current_user()
    }

    /// The signed-in user's document with pending edits applied
    pub fn my_profile(&self) -> Option<UserProfile> {
        let user = self.ctx.auth.current_user()?;
        self.users.find_as(&user.uid)
    }

    pub async fn view(&self) -> SessionView {
        let catalog = self.catalog();
        let users: Vec<UserProfile> = self.users.rendered_as();
        let user = self.ctx.auth.current_user();
        let profile = user
            .as_ref()
            .and_then(|user| users.iter().find(|profile| profile.uid == user.uid))
            .cloned();

        let shell = self.shell.lock().await;
        let page = shell.mounted.render(&RenderInput {
            catalog: &catalog,
            users: &users,
            me: profile.as_ref(),
        });

        SessionView {
            selector: shell.navigator.current().clone(),
            user,
            profile,
            ai_available: self.ctx.ai.is_configured(),
            page,
        }
    }

    fn require_user(&self) -> AppResult<AuthUser> {
        self.ctx
            .auth
            .current_user()
            .ok_or_else(|| AppError::Unauthenticated(LOGIN_REQUIRED.to_string()))
    }

    /// Name shown on posts, comments and notifications
    fn display_name(&self, user: &AuthUser) -> String {
        self.users
            .find_as::<UserProfile>(&user.uid)
            .map(|profile| profile.name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.preferred_name())
    }

    async fn notify(&self, kind: NotificationType, from: &AuthUser, to_user_id: &str) {
        let doc = Notification::new_document(kind, &self.display_name(from), to_user_id, now_millis());
        let collection = self.ctx.paths.collection(Collection::Notifications);
        if let Err(e) = self.ctx.store.add(&collection, doc).await {
            tracing::warn!(to = %to_user_id, error = %e, "Notification not delivered");
        }
    }

    // Identity actions

    pub async fn sign_in_anonymously(&self) -> AppResult<AuthUser> {
        let mut identity = self.identity.lock().await;
        let user = self.ctx.auth.sign_in_anonymously().await?;
        self.apply_identity(&mut identity, Some(user.clone())).await;
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthUser> {
        let mut identity = self.identity.lock().await;
        let user = self
            .ctx
            .auth
            .sign_in_with_email_password(email.trim(), password)
            .await?;
        self.apply_identity(&mut identity, Some(user.clone())).await;
        Ok(user)
    }

    /// Creates the account and its user document under the chosen name
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AppResult<AuthUser> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("A name is required".to_string()));
        }

        let mut identity = self.identity.lock().await;
        let user = self
            .ctx
            .auth
            .create_user_with_email_password(email.trim(), password)
            .await?;
        let user = self.ctx.auth.update_display_name(name).await?;

        let path = self.ctx.paths.document(Collection::Users, &user.uid);
        let doc = UserProfile::new_document(
            &user.uid,
            name,
            user.email.as_deref().unwrap_or_default(),
            DEFAULT_BIO,
            now_millis(),
        );
        self.ctx.store.set(&path, doc).await?;

        self.apply_identity(&mut identity, Some(user.clone())).await;
        Ok(user)
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        let mut identity = self.identity.lock().await;
        self.ctx.auth.sign_out().await?;
        self.apply_identity(&mut identity, None).await;
        Ok(())
    }

    // Library actions

    /// Returns whether the movie is now saved
    pub async fn toggle_watch_later(&self, movie_id: &str) -> AppResult<bool> {
        let user = self.require_user()?;
        self.users
            .toggle_membership(&user.uid, UserProfile::WATCH_LATER, json!(movie_id))
            .await
    }

    pub async fn toggle_liked_movie(&self, movie_id: &str) -> AppResult<bool> {
        let user = self.require_user()?;
        self.users
            .toggle_membership(&user.uid, UserProfile::LIKED_MOVIES, json!(movie_id))
            .await
    }

    pub async fn create_playlist(&self, name: &str) -> AppResult<Playlist> {
        let user = self.require_user()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Playlist name is required".to_string()));
        }

        let playlist = Playlist {
            id: format!("pl-{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            items: Vec::new(),
        };
        self.users
            .mutate(
                &user.uid,
                UserProfile::PLAYLISTS,
                FieldOp::ArrayUnion(vec![serde_json::to_value(&playlist)?]),
            )
            .await?;
        Ok(playlist)
    }

    /// Playlists are rewritten whole; adding a present movie is a no-op
    pub async fn add_to_playlist(&self, playlist_id: &str, movie_id: &str) -> AppResult<Playlist> {
        let user = self.require_user()?;
        let mut playlists = self
            .users
            .find_as::<UserProfile>(&user.uid)
            .map(|profile| profile.playlists)
            .unwrap_or_default();

        let playlist = playlists
            .iter_mut()
            .find(|playlist| playlist.id == playlist_id)
            .ok_or_else(|| AppError::NotFound(format!("Playlist {}", playlist_id)))?;
        if playlist.items.iter().any(|item| item == movie_id) {
            return Ok(playlist.clone());
        }
        playlist.items.push(movie_id.to_string());
        let updated = playlist.clone();

        self.users
            .mutate(
                &user.uid,
                UserProfile::PLAYLISTS,
                FieldOp::Replace(serde_json::to_value(&playlists)?),
            )
            .await?;
        Ok(updated)
    }

    // Social actions

    async fn mounted_posts(&self, post_id: &str) -> AppResult<ViewStateSync> {
        let shell = self.shell.lock().await;
        shell
            .mounted
            .posts()
            .filter(|posts| posts.find(post_id).is_some())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Post {} is not on screen", post_id)))
    }

    /// Returns whether the post is now liked; liking someone else's post notifies them
    pub async fn toggle_post_like(&self, post_id: &str) -> AppResult<bool> {
        let user = self.require_user()?;
        let posts = self.mounted_posts(post_id).await?;
        let owner = posts.find_as::<Post>(post_id).map(|post| post.uid);

        let liked = posts
            .toggle_membership(post_id, Post::LIKES, json!(user.uid))
            .await?;
        if liked {
            if let Some(owner) = owner.filter(|owner| owner != &user.uid) {
                self.notify(NotificationType::Like, &user, &owner).await;
            }
        }
        Ok(liked)
    }

    pub async fn add_comment(&self, post_id: &str, text: &str) -> AppResult<()> {
        let user = self.require_user()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput("Comment is empty".to_string()));
        }

        let posts = self.mounted_posts(post_id).await?;
        let comment = feed::comment_value(&user.uid, &self.display_name(&user), text, now_millis());
        posts
            .mutate(post_id, Post::COMMENTS, FieldOp::ArrayUnion(vec![comment]))
            .await
    }

    /// Updates my `following` and their `followers` as two independent writes
    pub async fn toggle_follow(&self, target_uid: &str) -> AppResult<bool> {
        let user = self.require_user()?;
        if user.uid == target_uid {
            return Err(AppError::InvalidInput("You cannot follow yourself".to_string()));
        }

        let following = self
            .users
            .contains(&user.uid, UserProfile::FOLLOWING, &json!(target_uid));
        let (mine, theirs) = if following {
            (
                FieldOp::ArrayRemove(vec![json!(target_uid)]),
                FieldOp::ArrayRemove(vec![json!(user.uid)]),
            )
        } else {
            (
                FieldOp::ArrayUnion(vec![json!(target_uid)]),
                FieldOp::ArrayUnion(vec![json!(user.uid)]),
            )
        };

        self.users
            .mutate(&user.uid, UserProfile::FOLLOWING, mine)
            .await?;
        self.users
            .mutate(target_uid, UserProfile::FOLLOWERS, theirs)
            .await?;

        if !following {
            self.notify(NotificationType::Follow, &user, target_uid).await;
        }
        Ok(!following)
    }

    /// Returns the new post id
    pub async fn create_post(&self, request: studio::NewPost) -> AppResult<String> {
        let user = self.require_user()?;
        let name = self.display_name(&user);
        let now = now_millis();

        let doc = match request.mode {
            PostType::Normal => studio::normal_post_document(&user.uid, &name, &request, now)?,
            PostType::Quiz => {
                let catalog = self.catalog();
                let topic = studio::quiz_topic(&request, &catalog)?;
                let subject = studio::quiz_subject(&catalog, &request.channel, &topic)
                    .ok_or_else(|| AppError::Internal("Catalog is empty".to_string()))?;
                let quiz = generate_quiz(&self.ctx.ai, &topic, subject).await;
                studio::quiz_post_document(&user.uid, &name, &request.channel, &topic, &quiz, now)
            }
        };

        let collection = self.ctx.paths.collection(Collection::Posts);
        let id = self.ctx.store.add(&collection, doc).await?;
        tracing::info!(post = %id, uid = %user.uid, "Post created");
        Ok(id)
    }

    // AI actions

    fn find_movie(&self, movie_id: &str) -> AppResult<Movie> {
        movie_detail::find_movie(&self.catalog(), movie_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Movie {}", movie_id)))
    }

    /// Cached for the lifetime of the mounted detail view
    pub async fn movie_insights(&self, movie_id: &str) -> AppResult<String> {
        let movie = self.find_movie(movie_id)?;
        let mount_id = {
            let mut shell = self.shell.lock().await;
            if let Some(cached) = shell
                .mounted
                .movie_state_mut(movie_id)
                .and_then(|state| state.insights.clone())
            {
                return Ok(cached);
            }
            shell.mounted.id()
        };

        let text = self.ctx.ai.request(&insights_prompt(&movie.title)).await;

        let mut shell = self.shell.lock().await;
        if shell.mounted.id() == mount_id {
            if let Some(state) = shell.mounted.movie_state_mut(movie_id) {
                state.insights = Some(text.clone());
            }
        }
        Ok(text)
    }

    pub async fn movie_quiz(&self, movie_id: &str) -> AppResult<Quiz> {
        let movie = self.find_movie(movie_id)?;
        let mount_id = {
            let mut shell = self.shell.lock().await;
            if let Some(cached) = shell
                .mounted
                .movie_state_mut(movie_id)
                .and_then(|state| state.quiz.clone())
            {
                return Ok(cached);
            }
            shell.mounted.id()
        };

        let quiz = generate_quiz(&self.ctx.ai, &movie.title, &movie).await;

        let mut shell = self.shell.lock().await;
        if shell.mounted.id() == mount_id {
            if let Some(state) = shell.mounted.movie_state_mut(movie_id) {
                state.quiz = Some(quiz.clone());
                state.answer = None;
            }
        }
        Ok(quiz)
    }

    pub async fn answer_quiz(&self, movie_id: &str, answer: usize) -> AppResult<QuizAnswer> {
        let mut shell = self.shell.lock().await;
        let state = shell
            .mounted
            .movie_state_mut(movie_id)
            .ok_or_else(|| AppError::InvalidInput("Open the movie first".to_string()))?;
        let quiz = state
            .quiz
            .clone()
            .ok_or_else(|| AppError::InvalidInput("Generate a quiz first".to_string()))?;
        if answer >= quiz.options.len() {
            return Err(AppError::InvalidInput(format!("No option {}", answer)));
        }

        state.answer = Some(answer);
        Ok(QuizAnswer {
            answer,
            correct: quiz.correct,
            is_correct: quiz.is_correct(answer),
        })
    }

    /// Answers from the text service; the turn is recorded when the assistant view is open
    pub async fn ask_genie(&self, question: &str) -> AppResult<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput("Ask something first".to_string()));
        }

        let (mount_id, history) = {
            let mut shell = self.shell.lock().await;
            let history = shell
                .mounted
                .genie_state_mut()
                .map(|state| state.transcript.clone())
                .unwrap_or_default();
            (shell.mounted.id(), history)
        };

        let reply = self
            .ctx
            .ai
            .request(&genie::build_prompt(&history, question))
            .await;

        let mut shell = self.shell.lock().await;
        if shell.mounted.id() == mount_id {
            if let Some(state) = shell.mounted.genie_state_mut() {
                state.record(question, &reply);
            }
        }
        Ok(reply)
    }

    /// Stops the auth listener and closes every subscription
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        if let Some(task) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }

        self.shell.lock().await.mounted.teardown();
        self.globals.close_all();
        tracing::info!("Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::fallback_catalog;
    use crate::services::ai::UNAVAILABLE_REPLY;
    use crate::services::auth::MemoryAuth;
    use crate::services::AiGate;
    use crate::store::{MemoryStore, RemoteStore};
    use crate::views::RenderedView;
    use std::time::Duration;

    struct Harness {
        store: MemoryStore,
        ctx: ServiceContext,
    }

    fn harness() -> Harness {
        let store = MemoryStore::new();
        let ctx = ServiceContext::new(
            &Config::default(),
            Arc::new(store.clone()),
            Arc::new(MemoryAuth::new()),
            AiGate::unconfigured(),
        );
        Harness { store, ctx }
    }

    /// Waits until the condition holds, re-checking as deliveries land
    async fn eventually<F: Fn() -> bool>(ready: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !ready() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition never held");
    }

    /// Document as persisted, bypassing any optimistic state
    async fn stored<T: serde::de::DeserializeOwned>(h: &Harness, collection: Collection, id: &str) -> T {
        let path = h.ctx.paths.document(collection, id);
        h.store.get(&path).await.unwrap().unwrap().decode().unwrap()
    }

    #[tokio::test]
    async fn test_start_signs_in_anonymously_and_creates_user_doc() {
        let h = harness();
        let session = Session::start(h.ctx.clone()).await;

        let user = session.current_user().unwrap();
        assert!(user.is_anonymous);
        let users = h.ctx.paths.collection(Collection::Users);
        assert_eq!(h.store.document_count(&users), 1);

        eventually(|| session.my_profile().is_some()).await;
        let profile = session.my_profile().unwrap();
        assert_eq!(profile.name, "Guest");
        assert_eq!(profile.bio, DEFAULT_BIO);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_catalog_renders_bundled_list() {
        let h = harness();
        let session = Session::start(h.ctx.clone()).await;

        let view = session.view().await;
        match view.page {
            RenderedView::Home(page) => {
                assert!(page.hero.is_some());
                assert!(!page.rows.is_empty());
            }
            other => panic!("unexpected page {:?}", other),
        }
        assert_eq!(session.catalog().len(), fallback_catalog().len());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_watch_later_toggle_rolls_back_on_failure() {
        let h = harness();
        let session = Session::start(h.ctx.clone()).await;
        eventually(|| session.my_profile().is_some()).await;

        assert!(session.toggle_watch_later("fallback-dune-2").await.unwrap());
        assert!(session
            .my_profile()
            .unwrap()
            .watch_later
            .contains(&"fallback-dune-2".to_string()));

        h.store.fail_writes(Some("unavailable"));
        assert!(session.toggle_watch_later("fallback-dune-2").await.is_err());
        assert!(session
            .my_profile()
            .unwrap()
            .watch_later
            .contains(&"fallback-dune-2".to_string()));
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_navigation_tears_down_previous_view() {
        let h = harness();
        let session = Session::start(h.ctx.clone()).await;
        // Catalog and users
        let globals = 2;
        eventually(|| h.store.open_watch_count() == globals).await;

        session
            .navigate(Selector::Feed {
                tab: Default::default(),
            })
            .await;
        assert_eq!(h.store.open_watch_count(), globals + 1);

        session.back().await;
        eventually(|| h.store.open_watch_count() == globals).await;
        assert_eq!(session.current_selector().await, Selector::home());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_like_notifies_post_owner() {
        let h = harness();
        let posts = h.ctx.paths.collection(Collection::Posts);
        h.store
            .set(
                &format!("{}/p1", posts),
                json!({"uid": "someone-else", "name": "Ann", "likes": [], "comments": [], "createdAt": 1}),
            )
            .await
            .unwrap();
        let session = Session::start(h.ctx.clone()).await;
        eventually(|| session.my_profile().is_some()).await;

        session
            .navigate(Selector::Feed {
                tab: Default::default(),
            })
            .await;
        let liked = loop {
            match session.toggle_post_like("p1").await {
                Err(AppError::NotFound(_)) => tokio::time::sleep(Duration::from_millis(5)).await,
                other => break other.unwrap(),
            }
        };
        assert!(liked);

        let notifications = h.ctx.paths.collection(Collection::Notifications);
        assert_eq!(h.store.document_count(&notifications), 1);
        let note: Notification = h.store.documents(&notifications)[0].decode().unwrap();
        assert_eq!(note.to_user_id, "someone-else");
        assert_eq!(note.from_name, "Guest");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_quiz_falls_back_without_ai() {
        let h = harness();
        let session = Session::start(h.ctx.clone()).await;
        session
            .navigate(Selector::Movie {
                movie_id: "fallback-oppenheimer".to_string(),
            })
            .await;

        let quiz = session.movie_quiz("fallback-oppenheimer").await.unwrap();
        assert_eq!(quiz.options.len(), 4);
        assert_eq!(quiz.options[quiz.correct], "2023");

        let answer = session.answer_quiz("fallback-oppenheimer", 1).await.unwrap();
        assert!(answer.is_correct);

        let insights = session.movie_insights("fallback-oppenheimer").await.unwrap();
        assert_eq!(insights, UNAVAILABLE_REPLY);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_signed_out_actions_are_rejected() {
        let h = harness();
        let session = Session::start(h.ctx.clone()).await;
        session.sign_out().await.unwrap();

        assert!(matches!(
            session.toggle_liked_movie("fallback-dune-2").await,
            Err(AppError::Unauthenticated(_))
        ));
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_follow_writes_both_sides_and_notifies_once() {
        let h = harness();
        let users = h.ctx.paths.collection(Collection::Users);
        h.store
            .set(
                &format!("{}/critic", users),
                UserProfile::new_document("critic", "Roger", "r@example.com", DEFAULT_BIO, 1),
            )
            .await
            .unwrap();
        let session = Session::start(h.ctx.clone()).await;
        eventually(|| session.my_profile().is_some() && session.users.find("critic").is_some())
            .await;
        let me = session.current_user().unwrap().uid;

        assert!(session.toggle_follow("critic").await.unwrap());
        assert_eq!(session.my_profile().unwrap().following, vec!["critic".to_string()]);
        let critic: UserProfile = stored(&h, Collection::Users, "critic").await;
        assert_eq!(critic.followers, vec![me.clone()]);

        let notifications = h.ctx.paths.collection(Collection::Notifications);
        let note: Notification = h.store.documents(&notifications)[0].decode().unwrap();
        assert_eq!(note.kind, NotificationType::Follow);
        assert_eq!(note.to_user_id, "critic");

        assert!(!session.toggle_follow("critic").await.unwrap());
        assert!(session.my_profile().unwrap().following.is_empty());
        let critic: UserProfile = stored(&h, Collection::Users, "critic").await;
        assert!(critic.followers.is_empty());
        assert_eq!(h.store.document_count(&notifications), 1);

        assert!(matches!(
            session.toggle_follow(&me).await,
            Err(AppError::InvalidInput(_))
        ));
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_comment_is_appended_to_post() {
        let h = harness();
        let posts = h.ctx.paths.collection(Collection::Posts);
        h.store
            .set(
                &format!("{}/p1", posts),
                json!({"uid": "someone-else", "name": "Ann", "likes": [], "comments": [], "createdAt": 1}),
            )
            .await
            .unwrap();
        let session = Session::start(h.ctx.clone()).await;
        eventually(|| session.my_profile().is_some()).await;
        session
            .navigate(Selector::Feed {
                tab: Default::default(),
            })
            .await;

        loop {
            match session.add_comment("p1", "  Great pick  ").await {
                Err(AppError::NotFound(_)) => tokio::time::sleep(Duration::from_millis(5)).await,
                other => break other.unwrap(),
            }
        }
        assert!(matches!(
            session.add_comment("p1", "   ").await,
            Err(AppError::InvalidInput(_))
        ));

        let post: Post = stored(&h, Collection::Posts, "p1").await;
        assert_eq!(post.comments.len(), 1);
        let comment = &post.comments[0];
        assert_eq!(comment.uid, session.current_user().unwrap().uid);
        assert_eq!(comment.name, "Guest");
        assert_eq!(comment.text, "Great pick");
        assert!(comment.created_at > 0);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_playlist_create_and_add() {
        let h = harness();
        let session = Session::start(h.ctx.clone()).await;
        eventually(|| session.my_profile().is_some()).await;

        assert!(matches!(
            session.create_playlist("  ").await,
            Err(AppError::InvalidInput(_))
        ));
        let playlist = session.create_playlist(" Weekend ").await.unwrap();
        assert_eq!(playlist.name, "Weekend");
        assert!(playlist.items.is_empty());

        let updated = session
            .add_to_playlist(&playlist.id, "fallback-dune-2")
            .await
            .unwrap();
        assert_eq!(updated.items, vec!["fallback-dune-2".to_string()]);
        let again = session
            .add_to_playlist(&playlist.id, "fallback-dune-2")
            .await
            .unwrap();
        assert_eq!(again.items.len(), 1);

        let uid = session.current_user().unwrap().uid;
        let profile: UserProfile = stored(&h, Collection::Users, &uid).await;
        assert_eq!(profile.playlists, vec![updated]);

        assert!(matches!(
            session.add_to_playlist("pl-missing", "fallback-dune-2").await,
            Err(AppError::NotFound(_))
        ));
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_names_user_and_sign_in_surfaces_provider_errors() {
        let h = harness();
        let session = Session::start(h.ctx.clone()).await;

        let user = session
            .register("Ada Lovelace", "ada@example.com", "secret1")
            .await
            .unwrap();
        assert!(!user.is_anonymous);
        let profile: UserProfile = stored(&h, Collection::Users, &user.uid).await;
        assert_eq!(profile.name, "Ada Lovelace");
        assert_eq!(profile.email, "ada@example.com");
        eventually(|| session.my_profile().is_some_and(|p| p.name == "Ada Lovelace")).await;

        session.sign_out().await.unwrap();
        match session.sign_in("nobody@example.com", "secret1").await {
            Err(AppError::Auth(message)) => assert_eq!(message, "EMAIL_NOT_FOUND"),
            other => panic!("unexpected result {:?}", other),
        }

        let again = session.sign_in("ada@example.com", "secret1").await.unwrap();
        assert_eq!(again.uid, user.uid);
        assert_eq!(session.current_user().unwrap().uid, user.uid);
        session.shutdown().await;
    }
}
