pub mod filters;
#[cfg(test)]
pub mod mock;
pub mod postgres;
pub mod structs;
pub mod tables;

use crate::twoface::Fallible;
use async_trait::async_trait;
use filters::{PostFilters, UserFilters};
use std::collections::HashMap;
use structs::{
    Comment, Follow, Hashtag, Like, NewComment, NewFollow, NewHashtag, NewLike, NewPost, NewUser,
    Post, PostChanges, User, UserChanges,
};

/// Row counts keyed by the id they were grouped on. Ids with no rows are absent.
pub type Counts = HashMap<i32, i64>;

#[async_trait]
pub trait UserStore {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User>;
    async fn get_user(&self, user_id: i32) -> Fallible<Option<User>>;
    async fn list_users(&self, filters: UserFilters) -> Fallible<Vec<User>>;
    async fn users_by_id(&self, user_ids: Vec<i32>) -> Fallible<Vec<User>>;
    async fn update_user(&self, user_id: i32, changes: UserChanges) -> Fallible<Option<User>>;
    /// Removes the user and everything they authored or are an edge of.
    async fn delete_user(&self, user_id: i32) -> Fallible<Option<User>>;
}

#[async_trait]
pub trait PostStore {
    /// Inserts the post and links it to `hashtag_ids`, atomically.
    async fn new_post(&self, new_post: NewPost, hashtag_ids: Vec<i32>) -> Fallible<Post>;
    /// Newest first.
    async fn list_posts(&self, filters: PostFilters) -> Fallible<Vec<Post>>;
    async fn find_post(&self, post_id: i32) -> Fallible<Option<Post>>;
    /// Unordered; missing ids are skipped.
    async fn posts_by_id(&self, post_ids: Vec<i32>) -> Fallible<Vec<Post>>;
    /// When `hashtag_ids` is set, it replaces the post's hashtags.
    async fn update_post(
        &self,
        post_id: i32,
        changes: PostChanges,
        hashtag_ids: Option<Vec<i32>>,
    ) -> Fallible<Option<Post>>;
    async fn set_post_image(&self, post_id: i32, image: String) -> Fallible<Option<Post>>;
    async fn delete_post(&self, post_id: i32) -> Fallible<Option<Post>>;
    /// Every (post id, hashtag) pair for the given posts.
    async fn post_hashtags(&self, post_ids: Vec<i32>) -> Fallible<Vec<(i32, Hashtag)>>;
}

#[async_trait]
pub trait CommentStore {
    async fn new_comment(&self, new_comment: NewComment) -> Fallible<Comment>;
    /// Newest first.
    async fn list_comments(&self) -> Fallible<Vec<Comment>>;
    async fn find_comment(&self, comment_id: i32) -> Fallible<Option<Comment>>;
    async fn update_comment(&self, comment_id: i32, content: String) -> Fallible<Option<Comment>>;
    async fn set_comment_image(&self, comment_id: i32, image: String)
        -> Fallible<Option<Comment>>;
    async fn delete_comment(&self, comment_id: i32) -> Fallible<Option<Comment>>;
    /// Newest first.
    async fn comments_on(&self, post_id: i32) -> Fallible<Vec<Comment>>;
    async fn comment_counts(&self, post_ids: Vec<i32>) -> Fallible<Counts>;
}

#[async_trait]
pub trait HashtagStore {
    async fn new_hashtag(&self, new_hashtag: NewHashtag) -> Fallible<Hashtag>;
    async fn list_hashtags(&self) -> Fallible<Vec<Hashtag>>;
    async fn find_hashtag(&self, hashtag_id: i32) -> Fallible<Option<Hashtag>>;
    async fn hashtags_by_id(&self, hashtag_ids: Vec<i32>) -> Fallible<Vec<Hashtag>>;
    async fn rename_hashtag(&self, hashtag_id: i32, changes: NewHashtag)
        -> Fallible<Option<Hashtag>>;
    async fn delete_hashtag(&self, hashtag_id: i32) -> Fallible<Option<Hashtag>>;
}

/// Follow edges. Inserts and deletes are single atomic statements: `None` means the edge was
/// already there (insert) or was never there (delete).
#[async_trait]
pub trait FollowStore {
    async fn insert_follow(&self, new_follow: NewFollow) -> Fallible<Option<Follow>>;
    async fn delete_follow(&self, follower_id: i32, following_id: i32)
        -> Fallible<Option<Follow>>;
    /// Edges where `user_id` is the follower.
    async fn following_of(&self, user_id: i32) -> Fallible<Vec<Follow>>;
    /// Edges where `user_id` is being followed.
    async fn followers_of(&self, user_id: i32) -> Fallible<Vec<Follow>>;
    /// Followers per followed user.
    async fn follower_counts(&self, user_ids: Vec<i32>) -> Fallible<Counts>;
    /// Followed users per follower.
    async fn following_counts(&self, user_ids: Vec<i32>) -> Fallible<Counts>;
}

/// Like edges, with the same atomicity contract as `FollowStore`.
#[async_trait]
pub trait LikeStore {
    async fn insert_like(&self, new_like: NewLike) -> Fallible<Option<Like>>;
    async fn delete_like(&self, post_id: i32, user_id: i32) -> Fallible<Option<Like>>;
    async fn likes_on(&self, post_id: i32) -> Fallible<Vec<Like>>;
    async fn like_counts(&self, post_ids: Vec<i32>) -> Fallible<Counts>;
}

/// Everything the API needs from storage.
pub trait Datastore:
    UserStore
    + PostStore
    + CommentStore
    + HashtagStore
    + FollowStore
    + LikeStore
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> Datastore for T where
    T: UserStore
        + PostStore
        + CommentStore
        + HashtagStore
        + FollowStore
        + LikeStore
        + Clone
        + Send
        + Sync
        + 'static
{
}
