//! GroupStore - group listing, creation, edits and leaving.

use gossip_core::{GroupDirectory, GroupForm, Notice};
use gossip_types::requests::{CreateGroup, GetGroupsForSidebar, LeaveGroup, UpdateGroup};
use gossip_types::{Call, Group, GroupId, Message};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::channel::ChannelProvider;
use crate::error::ClientError;
use crate::notify::{Notifier, Topic};
use crate::session::{require_self, SharedSession};
use crate::transport::Connector;

/// Owns the groups the signed-in user belongs to.
pub struct GroupStore<C: Connector> {
    provider: Arc<ChannelProvider<C>>,
    session: SharedSession,
    notifier: Notifier,
    directory: Mutex<GroupDirectory>,
}

impl<C: Connector> GroupStore<C> {
    /// Create an empty store.
    pub fn new(provider: Arc<ChannelProvider<C>>, session: SharedSession, notifier: Notifier) -> Self {
        Self {
            provider,
            session,
            notifier,
            directory: Mutex::new(GroupDirectory::new()),
        }
    }

    /// Groups in listing order.
    pub async fn groups(&self) -> Vec<Group> {
        self.directory.lock().await.groups().to_vec()
    }

    /// Look up a listed group.
    pub async fn get(&self, id: &GroupId) -> Option<Group> {
        self.directory.lock().await.get(id).cloned()
    }

    /// Refresh the listing.
    pub async fn load_groups(&self) -> Result<Vec<Group>, ClientError> {
        let user_id = require_self(&self.session).await?;
        let response = self.call(&GetGroupsForSidebar { user_id }).await?;
        let mut directory = self.directory.lock().await;
        directory.set(response.groups);
        let groups = directory.groups().to_vec();
        drop(directory);
        self.notifier.changed(Topic::Groups);
        Ok(groups)
    }

    /// Create a group; the creator is always an admin.
    pub async fn create_group(&self, form: GroupForm) -> Result<Group, ClientError> {
        let acting = require_self(&self.session).await?;
        let group = match form.into_payload(&acting) {
            Ok(payload) => payload,
            Err(e) => return Err(self.invalid(e)),
        };
        let created = self.call(&CreateGroup { group }).await?.group;
        self.refresh().await;
        self.notifier
            .notice(Notice::success("Group created successfully!"));
        Ok(created)
    }

    /// Replace a group's name, description, avatar and roles.
    ///
    /// The editor stays an admin whatever the draft says.
    pub async fn edit_group(&self, group_id: &GroupId, form: GroupForm) -> Result<Group, ClientError> {
        let acting = require_self(&self.session).await?;
        let group = match form.into_payload(&acting) {
            Ok(payload) => payload,
            Err(e) => return Err(self.invalid(e)),
        };
        let request = UpdateGroup {
            group_id: group_id.clone(),
            group,
        };
        let updated = self.call(&request).await?.group;
        self.refresh().await;
        self.notifier
            .notice(Notice::success("Group updated successfully!"));
        Ok(updated)
    }

    /// Leave a group and drop it from the listing.
    pub async fn leave_group(&self, group_id: &GroupId) -> Result<(), ClientError> {
        let user_id = require_self(&self.session).await?;
        let request = LeaveGroup {
            group_id: group_id.clone(),
            user_id,
        };
        self.call(&request).await?;
        self.directory.lock().await.remove(group_id);
        self.notifier.changed(Topic::Groups);
        self.notifier
            .notice(Notice::success("Group left successfully!"));
        Ok(())
    }

    /// Update the listing preview for a group message.
    pub async fn record_message(&self, message: &Message) {
        if self.directory.lock().await.record_message(message) {
            self.notifier.changed(Topic::Groups);
        }
    }

    /// Forget everything.
    pub async fn reset(&self) {
        self.directory.lock().await.clear();
    }

    async fn refresh(&self) {
        if let Err(e) = self.load_groups().await {
            warn!(error = %e, "failed to refresh groups");
        }
    }

    fn invalid(&self, error: gossip_core::ValidationError) -> ClientError {
        let error = ClientError::from(error);
        self.notifier.failure(&error);
        error
    }

    async fn call<R: Call>(&self, request: &R) -> Result<R::Response, ClientError> {
        self.provider.call(request).await.map_err(|e| {
            self.notifier.failure(&e);
            e
        })
    }
}
