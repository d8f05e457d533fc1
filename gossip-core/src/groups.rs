//! Group listing, role drafts and the create/edit form.

use std::collections::BTreeMap;

use gossip_types::{Group, GroupId, GroupPayload, Message, UserId};

use crate::error::ValidationError;
use crate::listing;

/// Role of a candidate while a group is being set up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    /// Not in the group
    #[default]
    None,
    /// Plain member
    Member,
    /// Admin
    Admin,
}

impl Role {
    /// Next role in the cycle none → member → admin → none.
    pub fn next(self) -> Self {
        match self {
            Role::None => Role::Member,
            Role::Member => Role::Admin,
            Role::Admin => Role::None,
        }
    }
}

/// Per-candidate roles chosen in the create/edit panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDraft {
    roles: BTreeMap<UserId, Role>,
}

impl RoleDraft {
    /// Empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draft pre-filled from an existing group.
    pub fn from_group(group: &Group) -> Self {
        let mut draft = Self::new();
        for member in &group.members {
            draft.set(member.clone(), Role::Member);
        }
        for admin in &group.admins {
            draft.set(admin.clone(), Role::Admin);
        }
        draft
    }

    /// Current role of `user`.
    pub fn role(&self, user: &UserId) -> Role {
        self.roles.get(user).copied().unwrap_or_default()
    }

    /// Assign a role directly.
    pub fn set(&mut self, user: UserId, role: Role) {
        if role == Role::None {
            self.roles.remove(&user);
        } else {
            self.roles.insert(user, role);
        }
    }

    /// Advance `user` to the next role and return it.
    pub fn cycle(&mut self, user: &UserId) -> Role {
        let next = self.role(user).next();
        self.set(user.clone(), next);
        next
    }

    /// Disjoint member and admin lists, with `acting` always an admin.
    pub fn finalize(&self, acting: &UserId) -> (Vec<UserId>, Vec<UserId>) {
        let mut members = Vec::new();
        let mut admins = vec![acting.clone()];
        for (user, role) in &self.roles {
            if user == acting {
                continue;
            }
            match role {
                Role::Member => members.push(user.clone()),
                Role::Admin => admins.push(user.clone()),
                Role::None => {}
            }
        }
        (members, admins)
    }
}

/// Input of the group create/edit panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupForm {
    /// Display name, required
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Avatar as inline data, already re-encoded
    pub avatar: Option<String>,
    /// Roles per candidate
    pub roles: RoleDraft,
}

impl GroupForm {
    /// Form with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Form pre-filled from an existing group.
    pub fn from_group(group: &Group) -> Self {
        Self {
            name: group.name.clone(),
            description: group.description.clone(),
            avatar: None,
            roles: RoleDraft::from_group(group),
        }
    }

    /// Validate and build the request body on behalf of `acting`.
    pub fn into_payload(self, acting: &UserId) -> Result<GroupPayload, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingGroupName);
        }
        let (members, admins) = self.roles.finalize(acting);
        Ok(GroupPayload {
            name: name.to_string(),
            description: self.description.trim().to_string(),
            members,
            admins,
            profile_pic: self.avatar,
        })
    }
}

/// Groups this user belongs to, most recent first.
#[derive(Debug, Clone, Default)]
pub struct GroupDirectory {
    groups: Vec<Group>,
}

impl GroupDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups in listing order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Look up a group.
    pub fn get(&self, id: &GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| &g.id == id)
    }

    /// Replace the listing.
    pub fn set(&mut self, mut groups: Vec<Group>) {
        listing::sort_by_recency(&mut groups);
        self.groups = groups;
    }

    /// Drop a group from the listing.
    pub fn remove(&mut self, id: &GroupId) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| &g.id != id);
        self.groups.len() != before
    }

    /// Update the preview for a group message.
    pub fn record_message(&mut self, message: &Message) -> bool {
        listing::record_group(&mut self.groups, message)
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.groups.clear();
    }
}
