use serde::Serialize;
use serde_json::json;

use super::{post_cards, MountContext, PostCard, RenderInput};
use crate::models::{Post, UserProfile};
use crate::store::{Collection, FilterOp, QueryDescriptor};
use crate::sync::{Snapshot, SubscriptionManager, ViewStateSync};

pub struct ProfileState {
    pub user_id: String,
    pub posts: ViewStateSync,
    /// One-time read, used when the users subscription does not hold the profile
    pub fetched: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub user_id: String,
    pub user: Option<UserProfile>,
    pub handle: Option<String>,
    pub follower_count: usize,
    pub following_count: usize,
    pub is_own: bool,
    pub is_following: bool,
    pub posts: Vec<PostCard>,
}

pub async fn mount(
    ctx: &MountContext<'_>,
    subscriptions: &SubscriptionManager,
    user_id: &str,
) -> ProfileState {
    let posts = ctx.sync_for(Collection::Posts);
    let query =
        QueryDescriptor::collection(posts.collection()).filter("uid", FilterOp::Eq, json!(user_id));
    posts.subscribe(subscriptions, query, Snapshot::empty()).await;

    let fetched = match ctx.users.find_as::<UserProfile>(user_id) {
        Some(_) => None,
        None => fetch_profile(ctx, user_id).await,
    };

    ProfileState {
        user_id: user_id.to_string(),
        posts,
        fetched,
    }
}

async fn fetch_profile(ctx: &MountContext<'_>, user_id: &str) -> Option<UserProfile> {
    let path = ctx.paths.document(Collection::Users, user_id);
    match ctx.store.get(&path).await {
        Ok(Some(doc)) => doc
            .decode()
            .map_err(|e| tracing::warn!(user = %user_id, error = %e, "Malformed user document"))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(user = %user_id, error = %e, "Profile read failed");
            None
        }
    }
}

pub fn render(state: &ProfileState, input: &RenderInput<'_>) -> ProfilePage {
    let user = input
        .users
        .iter()
        .find(|user| user.uid == state.user_id)
        .cloned()
        .or_else(|| state.fetched.clone());
    let posts: Vec<Post> = state.posts.rendered_as();
    let me = input.me.map(|me| me.uid.as_str());

    ProfilePage {
        user_id: state.user_id.clone(),
        handle: user.as_ref().map(UserProfile::handle),
        follower_count: user.as_ref().map_or(0, |user| user.followers.len()),
        following_count: user.as_ref().map_or(0, |user| user.following.len()),
        is_own: me == Some(state.user_id.as_str()),
        is_following: input
            .me
            .is_some_and(|me| me.following.contains(&state.user_id)),
        posts: post_cards(posts, input),
        user,
    }
}
