use serde::Serialize;
use serde_json::json;

use super::{post_cards, MountContext, PostCard, RenderInput};
use crate::models::Post;
use crate::navigator::FeedTab;
use crate::store::{Collection, Direction, QueryDescriptor};
use crate::sync::{Snapshot, SubscriptionManager, ViewStateSync};

pub struct FeedState {
    pub posts: ViewStateSync,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub tab: FeedTab,
    pub posts: Vec<PostCard>,
}

pub async fn mount(ctx: &MountContext<'_>, subscriptions: &SubscriptionManager) -> FeedState {
    let posts = ctx.sync_for(Collection::Posts);
    let query = QueryDescriptor::collection(posts.collection()).order_by("createdAt", Direction::Desc);
    posts.subscribe(subscriptions, query, Snapshot::empty()).await;
    FeedState { posts }
}

/// `Following` keeps posts by users the viewer follows, per the users snapshot
pub fn render(state: &FeedState, tab: FeedTab, input: &RenderInput<'_>) -> FeedPage {
    let mut posts: Vec<Post> = state.posts.rendered_as();
    if tab == FeedTab::Following {
        let following = input.me.map(|me| me.following.as_slice()).unwrap_or_default();
        posts.retain(|post| following.contains(&post.uid));
    }

    FeedPage {
        tab,
        posts: post_cards(posts, input),
    }
}

/// Document for a new post comment, appended with a set-add
pub fn comment_value(uid: &str, name: &str, text: &str, created_at: i64) -> serde_json::Value {
    json!({
        "uid": uid,
        "name": name,
        "text": text,
        "createdAt": created_at,
    })
}
