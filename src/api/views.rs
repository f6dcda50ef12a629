//! For every business-logic struct in `datastore`, this module has the shapes the API actually
//! returns. Passwords never leave the server, and list shapes carry less than detail shapes.
//!
//! The `*_list` builders load nicknames, hashtags and counts for the whole page in a fixed number
//! of store calls, however many rows there are.
use crate::aggregate;
use crate::datastore::{
    structs::{Comment, Hashtag, Post, User},
    Datastore, UserStore,
};
use crate::twoface::Fallible;
use chrono::{offset::Utc, DateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a post looks like right after it's written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostView {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub hashtags: Vec<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostListItem {
    pub id: i32,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub image: Option<String>,
    pub hashtags: Vec<String>,
    pub comments_count: i64,
    pub likes_count: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostDetail {
    pub id: i32,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub hashtags: Vec<Hashtag>,
    pub comments: Vec<PostComment>,
    pub likes: Vec<PostLike>,
    pub comments_count: i64,
    pub likes_count: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostComment {
    pub id: i32,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostLike {
    pub id: i32,
    pub created_by: String,
}

/// Response to an image upload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub id: i32,
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommentView {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub post: i32,
    pub content: String,
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommentListItem {
    pub id: i32,
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// Title of the post commented on.
    pub post: String,
    pub content: String,
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommentDetail {
    pub id: i32,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub post: CommentPost,
    pub content: String,
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommentPost {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
}

/// A user without their password.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub biography: String,
    pub city: String,
    pub is_staff: bool,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            nickname: u.nickname,
            first_name: u.first_name,
            last_name: u.last_name,
            avatar: u.avatar,
            biography: u.biography,
            city: u.city,
            is_staff: u.is_staff,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserListItem {
    #[serde(flatten)]
    pub user: UserView,
    pub num_following: i64,
    pub num_followers: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserView,
    pub following: Vec<FollowingEntry>,
    pub followers: Vec<FollowerEntry>,
    pub num_following: i64,
    pub num_followers: i64,
}

/// Someone this user follows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FollowingEntry {
    pub id: i32,
    pub nickname: String,
}

/// Someone who follows this user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FollowerEntry {
    pub follower: i32,
    pub nickname: String,
}

async fn nicknames<DS: UserStore>(ds: &DS, mut user_ids: Vec<i32>) -> Fallible<HashMap<i32, String>> {
    user_ids.sort_unstable();
    user_ids.dedup();
    Ok(ds
        .users_by_id(user_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.nickname))
        .collect())
}

fn nickname(names: &HashMap<i32, String>, user_id: i32) -> String {
    names.get(&user_id).cloned().unwrap_or_default()
}

pub fn post_view(post: Post, hashtags: Vec<i32>) -> PostView {
    PostView {
        id: post.id,
        created_at: post.created_at,
        title: post.title,
        content: post.content,
        image: post.image,
        hashtags,
    }
}

pub async fn post_list<DS: Datastore>(ds: &DS, posts: Vec<Post>) -> Fallible<Vec<PostListItem>> {
    let ids: Vec<i32> = posts.iter().map(|p| p.id).collect();
    let counts = aggregate::post_counts(ds, &ids).await?;
    let mut tags: HashMap<i32, Vec<String>> = HashMap::new();
    for (post_id, hashtag) in ds.post_hashtags(ids).await? {
        tags.entry(post_id).or_default().push(hashtag.name);
    }
    let names = nicknames(ds, posts.iter().map(|p| p.author_id).collect()).await?;
    Ok(posts
        .into_iter()
        .map(|post| {
            let counts = counts.get(&post.id).copied().unwrap_or_default();
            PostListItem {
                id: post.id,
                author: nickname(&names, post.author_id),
                created_at: post.created_at,
                title: post.title,
                image: post.image,
                hashtags: tags.remove(&post.id).unwrap_or_default(),
                comments_count: counts.comments,
                likes_count: counts.likes,
            }
        })
        .collect())
}

pub async fn post_detail<DS: Datastore>(ds: &DS, post: Post) -> Fallible<PostDetail> {
    let hashtags = ds
        .post_hashtags(vec![post.id])
        .await?
        .into_iter()
        .map(|(_, hashtag)| hashtag)
        .collect();
    let comments = ds.comments_on(post.id).await?;
    let likes = ds.likes_on(post.id).await?;
    let people = std::iter::once(post.author_id)
        .chain(comments.iter().map(|c| c.author_id))
        .chain(likes.iter().map(|l| l.created_by))
        .collect();
    let names = nicknames(ds, people).await?;
    let comments_count = aggregate::comments_count(ds, post.id).await?;
    let likes_count = aggregate::likes_count(ds, post.id).await?;
    Ok(PostDetail {
        id: post.id,
        author: nickname(&names, post.author_id),
        created_at: post.created_at,
        title: post.title,
        content: post.content,
        image: post.image,
        hashtags,
        comments: comments
            .into_iter()
            .map(|c| PostComment {
                id: c.id,
                author: nickname(&names, c.author_id),
                created_at: c.created_at,
                content: c.content,
            })
            .collect(),
        likes: likes
            .into_iter()
            .map(|l| PostLike {
                id: l.id,
                created_by: nickname(&names, l.created_by),
            })
            .collect(),
        comments_count,
        likes_count,
    })
}

pub fn comment_view(comment: Comment) -> CommentView {
    CommentView {
        id: comment.id,
        created_at: comment.created_at,
        post: comment.post_id,
        content: comment.content,
        image: comment.image,
    }
}

pub async fn comment_list<DS: Datastore>(
    ds: &DS,
    comments: Vec<Comment>,
) -> Fallible<Vec<CommentListItem>> {
    let names = nicknames(ds, comments.iter().map(|c| c.author_id).collect()).await?;
    let mut post_ids: Vec<i32> = comments.iter().map(|c| c.post_id).collect();
    post_ids.sort_unstable();
    post_ids.dedup();
    let titles: HashMap<i32, String> = ds
        .posts_by_id(post_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p.title))
        .collect();
    Ok(comments
        .into_iter()
        .map(|c| CommentListItem {
            id: c.id,
            author: nickname(&names, c.author_id),
            created_at: c.created_at,
            post: titles.get(&c.post_id).cloned().unwrap_or_default(),
            content: c.content,
            image: c.image,
        })
        .collect())
}

pub async fn comment_detail<DS: Datastore>(
    ds: &DS,
    comment: Comment,
    post: Post,
) -> Fallible<CommentDetail> {
    let names = nicknames(ds, vec![comment.author_id, post.author_id]).await?;
    Ok(CommentDetail {
        id: comment.id,
        author: nickname(&names, comment.author_id),
        created_at: comment.created_at,
        post: CommentPost {
            id: post.id,
            created_at: post.created_at,
            author: nickname(&names, post.author_id),
            title: post.title,
            content: post.content,
            image: post.image,
        },
        content: comment.content,
        image: comment.image,
    })
}

pub async fn user_list<DS: Datastore>(ds: &DS, users: Vec<User>) -> Fallible<Vec<UserListItem>> {
    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    let counts = aggregate::user_counts(ds, &ids).await?;
    Ok(users
        .into_iter()
        .map(|user| {
            let counts = counts.get(&user.id).copied().unwrap_or_default();
            UserListItem {
                user: user.into(),
                num_following: counts.following,
                num_followers: counts.followers,
            }
        })
        .collect())
}

pub async fn user_detail<DS: Datastore>(ds: &DS, user: User) -> Fallible<UserDetail> {
    let following = ds.following_of(user.id).await?;
    let followers = ds.followers_of(user.id).await?;
    let people = following
        .iter()
        .map(|f| f.following_id)
        .chain(followers.iter().map(|f| f.follower_id))
        .collect();
    let names = nicknames(ds, people).await?;
    let counts = aggregate::follow_counts(ds, user.id).await?;
    Ok(UserDetail {
        user: user.into(),
        following: following
            .into_iter()
            .map(|f| FollowingEntry {
                id: f.following_id,
                nickname: nickname(&names, f.following_id),
            })
            .collect(),
        followers: followers
            .into_iter()
            .map(|f| FollowerEntry {
                follower: f.follower_id,
                nickname: nickname(&names, f.follower_id),
            })
            .collect(),
        num_following: counts.following,
        num_followers: counts.followers,
    })
}
