use serde::Serialize;
use serde_json::json;

use super::MountContext;
use crate::models::Notification;
use crate::store::{Collection, FilterOp, QueryDescriptor};
use crate::sync::{Snapshot, SubscriptionManager, ViewStateSync};

/// `None` when mounted without a signed-in user
pub struct NotificationsState {
    pub notifications: Option<ViewStateSync>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationItem {
    #[serde(flatten)]
    pub notification: Notification,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationsPage {
    pub items: Vec<NotificationItem>,
}

pub async fn mount(
    ctx: &MountContext<'_>,
    subscriptions: &SubscriptionManager,
) -> NotificationsState {
    let Some(me) = ctx.me else {
        return NotificationsState {
            notifications: None,
        };
    };

    let notifications = ctx.sync_for(Collection::Notifications);
    let query = QueryDescriptor::collection(notifications.collection()).filter(
        "toUserId",
        FilterOp::Eq,
        json!(me),
    );
    notifications
        .subscribe(subscriptions, query, Snapshot::empty())
        .await;

    NotificationsState {
        notifications: Some(notifications),
    }
}

/// Newest first
pub fn render(state: &NotificationsState) -> NotificationsPage {
    let Some(sync) = &state.notifications else {
        return NotificationsPage::default();
    };

    let mut notifications: Vec<Notification> = sync.rendered_as();
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    NotificationsPage {
        items: notifications
            .into_iter()
            .map(|notification| NotificationItem {
                message: notification.message(),
                notification,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationType;
    use crate::store::{Document, MemoryStore};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_newest_first_with_messages() {
        let sync = ViewStateSync::new(
            Arc::new(MemoryStore::new()),
            "artifacts/test/public/data/notifications",
            Duration::from_secs(10),
        );
        sync.receive(Snapshot::new(vec![
            Document::new(
                "n1",
                Notification::new_document(NotificationType::Like, "Ann", "u1", 1),
            ),
            Document::new(
                "n2",
                Notification::new_document(NotificationType::Follow, "Bob", "u1", 2),
            ),
        ]));

        let page = render(&NotificationsState {
            notifications: Some(sync),
        });
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].message, "Bob started following you.");
        assert_eq!(page.items[1].message, "Ann liked your post.");
    }
}
