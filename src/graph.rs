//! The social graph: follow and like edges.
//!
//! Each operation is idempotent-by-rejection. Repeating it surfaces a domain error instead of
//! silently succeeding. The stores make every check-and-write a single atomic step, so the
//! errors here are decided by what the store actually did, never by an earlier read.
use crate::datastore::{
    structs::{Follow, Like, NewFollow, NewLike, Post, User},
    FollowStore, LikeStore,
};
use crate::twoface::{ExternalError, Fallible, TfError};
use serde::Deserialize;
use tracing::info;

pub const DUPLICATE_RELATION: ExternalError =
    ExternalError::invalid_action("You already follow this user");
pub const NOT_FOLLOWING: ExternalError = ExternalError::not_found("You do not follow this user");
pub const DUPLICATE_LIKE: ExternalError =
    ExternalError::invalid_action("You have already liked this post");
pub const NOT_LIKED: ExternalError =
    ExternalError::invalid_action("You have not liked this post yet");
pub const SELF_FOLLOW: ExternalError = ExternalError::invalid_action("You cannot follow yourself");
pub const SELF_LIKE: ExternalError =
    ExternalError::invalid_action("You cannot like your own post");

/// Whether users may point an edge at themselves.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct EdgeRules {
    #[serde(default = "allow")]
    pub allow_self_follow: bool,
    #[serde(default = "allow")]
    pub allow_self_like: bool,
}

impl Default for EdgeRules {
    fn default() -> Self {
        Self {
            allow_self_follow: true,
            allow_self_like: true,
        }
    }
}

fn allow() -> bool {
    true
}

pub async fn follow<DS: FollowStore>(
    ds: &DS,
    rules: &EdgeRules,
    follower_id: i32,
    target: &User,
) -> Fallible<Follow> {
    if follower_id == target.id && !rules.allow_self_follow {
        return Err(TfError::new(
            format!("user {} tried to follow themselves", follower_id),
            SELF_FOLLOW,
        ));
    }
    let new_follow = NewFollow {
        follower_id,
        following_id: target.id,
    };
    guard!(let Some(follow) = ds.insert_follow(new_follow).await? else {
        return Err(TfError::new(
            format!("user {} already follows user {}", follower_id, target.id),
            DUPLICATE_RELATION,
        ));
    });
    info!(follower_id, following_id = target.id, "follow created");
    Ok(follow)
}

pub async fn unfollow<DS: FollowStore>(
    ds: &DS,
    follower_id: i32,
    target: &User,
) -> Fallible<Follow> {
    guard!(let Some(follow) = ds.delete_follow(follower_id, target.id).await? else {
        return Err(TfError::new(
            format!("user {} does not follow user {}", follower_id, target.id),
            NOT_FOLLOWING,
        ));
    });
    info!(follower_id, following_id = target.id, "follow removed");
    Ok(follow)
}

pub async fn like<DS: LikeStore>(
    ds: &DS,
    rules: &EdgeRules,
    post: &Post,
    user_id: i32,
) -> Fallible<Like> {
    if post.author_id == user_id && !rules.allow_self_like {
        return Err(TfError::new(
            format!("user {} tried to like their own post {}", user_id, post.id),
            SELF_LIKE,
        ));
    }
    let new_like = NewLike {
        created_by: user_id,
        post_id: post.id,
    };
    guard!(let Some(like) = ds.insert_like(new_like).await? else {
        return Err(TfError::new(
            format!("user {} already likes post {}", user_id, post.id),
            DUPLICATE_LIKE,
        ));
    });
    info!(user_id, post_id = post.id, "like created");
    Ok(like)
}

pub async fn unlike<DS: LikeStore>(ds: &DS, post: &Post, user_id: i32) -> Fallible<Like> {
    guard!(let Some(like) = ds.delete_like(post.id, user_id).await? else {
        return Err(TfError::new(
            format!("user {} has no like on post {}", user_id, post.id),
            NOT_LIKED,
        ));
    });
    info!(user_id, post_id = post.id, "like removed");
    Ok(like)
}
