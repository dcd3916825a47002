use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Who performed an action.
///
/// `user_id` is always the authenticated human. When a supervisor or
/// administrator acts on behalf of someone else, the impersonated identity is
/// carried separately in `acting_as` so audits can tell genuine action from
/// supervised action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub acting_as: Option<UserId>,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            acting_as: None,
            ip_address: None,
        }
    }

    pub fn acting_as(mut self, user: impl Into<UserId>) -> Self {
        self.acting_as = Some(user.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// The identity whose authority the action was taken under.
    pub fn effective_user(&self) -> &UserId {
        self.acting_as.as_ref().unwrap_or(&self.user_id)
    }

    pub fn is_impersonating(&self) -> bool {
        self.acting_as.is_some()
    }
}
