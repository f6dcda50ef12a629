//! Who may do what. Anyone may read. Writes need an authenticated caller, and writes to a post,
//! comment or profile need the caller to own it.
use crate::datastore::{structs::User, UserStore};
use crate::twoface::{Cause, ExternalError, Fallible, TfError};

pub const UNAUTHENTICATED: ExternalError = ExternalError {
    cause: Cause::UserBadAuth,
    text: "Authentication credentials were not provided or are invalid",
};
pub const NOT_OWNER: ExternalError = ExternalError {
    cause: Cause::UserForbidden,
    text: "You do not have permission to perform this action",
};

/// Whoever sent the request. `user_id` comes from a verified token, if there was one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<i32>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: i32) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

/// Something with a single owning user.
pub trait Owned {
    fn owner_id(&self) -> i32;
}

impl Owned for crate::datastore::structs::Post {
    fn owner_id(&self) -> i32 {
        self.author_id
    }
}

impl Owned for crate::datastore::structs::Comment {
    fn owner_id(&self) -> i32 {
        self.author_id
    }
}

impl Owned for User {
    fn owner_id(&self) -> i32 {
        self.id
    }
}

/// Resolve the caller to a live user, or fail with 401.
pub async fn authenticate<DS: UserStore>(ds: &DS, caller: &Caller) -> Fallible<User> {
    guard!(let Some(user_id) = caller.user_id else {
        return Err(TfError::new("no credentials", UNAUTHENTICATED));
    });
    guard!(let Some(user) = ds.get_user(user_id).await? else {
        return Err(TfError::new(
            format!("token for deleted user {}", user_id),
            UNAUTHENTICATED,
        ));
    });
    Ok(user)
}

/// Only the owner of `resource` may change it.
pub fn require_owner(user: &User, resource: &impl Owned) -> Fallible<()> {
    if resource.owner_id() == user.id {
        Ok(())
    } else {
        Err(TfError::new(
            format!(
                "user {} is not the owner (user {})",
                user.id,
                resource.owner_id()
            ),
            NOT_OWNER,
        ))
    }
}
