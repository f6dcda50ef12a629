//! Derived counts: followers, following, likes and comments.
//!
//! Nothing here is persisted or cached. Every call goes to the store, and the batch forms issue
//! one grouped query per counter regardless of how many ids they are given.
use crate::datastore::{CommentStore, Counts, FollowStore, LikeStore};
use crate::twoface::Fallible;
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PostCounts {
    pub likes: i64,
    pub comments: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

fn get(counts: &Counts, id: i32) -> i64 {
    counts.get(&id).copied().unwrap_or(0)
}

/// Likes and comments for every post in `post_ids`. Posts with neither still get an entry.
pub async fn post_counts<DS>(ds: &DS, post_ids: &[i32]) -> Fallible<HashMap<i32, PostCounts>>
where
    DS: LikeStore + CommentStore,
{
    let likes = ds.like_counts(post_ids.to_vec()).await?;
    let comments = ds.comment_counts(post_ids.to_vec()).await?;
    Ok(post_ids
        .iter()
        .map(|&id| {
            let counts = PostCounts {
                likes: get(&likes, id),
                comments: get(&comments, id),
            };
            (id, counts)
        })
        .collect())
}

/// Followers and following for every user in `user_ids`.
pub async fn user_counts<DS>(ds: &DS, user_ids: &[i32]) -> Fallible<HashMap<i32, FollowCounts>>
where
    DS: FollowStore,
{
    let followers = ds.follower_counts(user_ids.to_vec()).await?;
    let following = ds.following_counts(user_ids.to_vec()).await?;
    Ok(user_ids
        .iter()
        .map(|&id| {
            let counts = FollowCounts {
                followers: get(&followers, id),
                following: get(&following, id),
            };
            (id, counts)
        })
        .collect())
}

pub async fn likes_count<DS: LikeStore>(ds: &DS, post_id: i32) -> Fallible<i64> {
    Ok(get(&ds.like_counts(vec![post_id]).await?, post_id))
}

pub async fn comments_count<DS: CommentStore>(ds: &DS, post_id: i32) -> Fallible<i64> {
    Ok(get(&ds.comment_counts(vec![post_id]).await?, post_id))
}

pub async fn followers_count<DS: FollowStore>(ds: &DS, user_id: i32) -> Fallible<i64> {
    Ok(get(&ds.follower_counts(vec![user_id]).await?, user_id))
}

pub async fn following_count<DS: FollowStore>(ds: &DS, user_id: i32) -> Fallible<i64> {
    Ok(get(&ds.following_counts(vec![user_id]).await?, user_id))
}

/// Both follow counters for a single user.
pub async fn follow_counts<DS: FollowStore>(ds: &DS, user_id: i32) -> Fallible<FollowCounts> {
    Ok(FollowCounts {
        followers: followers_count(ds, user_id).await?,
        following: following_count(ds, user_id).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{
        mock::Client,
        structs::{NewComment, NewLike},
        LikeStore,
    };

    #[actix_rt::test]
    async fn test_fresh_post_counts_zero_then_tracks_edges() {
        let ds = Client::default();
        let author = ds.seed_user("author@test.com", "author");
        let post = ds.seed_post(&author, "Test Post", &[]);

        assert_eq!(likes_count(&ds, post.id).await.unwrap(), 0);
        assert_eq!(comments_count(&ds, post.id).await.unwrap(), 0);

        for i in 0..3 {
            ds.new_comment(NewComment {
                post_id: post.id,
                author_id: author.id,
                content: format!("comment {}", i),
            })
            .await
            .unwrap();
        }
        for email in &["a@test.com", "b@test.com"] {
            let fan = ds.seed_user(email, email);
            ds.insert_like(NewLike {
                created_by: fan.id,
                post_id: post.id,
            })
            .await
            .unwrap();
        }

        assert_eq!(comments_count(&ds, post.id).await.unwrap(), 3);
        assert_eq!(likes_count(&ds, post.id).await.unwrap(), 2);
        assert_eq!(
            post_counts(&ds, &[post.id]).await.unwrap()[&post.id],
            PostCounts {
                likes: 2,
                comments: 3
            }
        );
    }

    #[actix_rt::test]
    async fn test_batch_counts_use_constant_queries() {
        let ds = Client::default();
        let author = ds.seed_user("author@test.com", "author");
        let ids: Vec<i32> = (0..25)
            .map(|i| ds.seed_post(&author, &format!("post {}", i), &[]).id)
            .collect();

        let before = ds.aggregate_queries();
        let counts = post_counts(&ds, &ids).await.unwrap();
        assert_eq!(ds.aggregate_queries() - before, 2);
        assert_eq!(counts.len(), 25);
        assert!(counts.values().all(|c| *c == PostCounts::default()));

        let before = ds.aggregate_queries();
        user_counts(&ds, &[author.id]).await.unwrap();
        assert_eq!(ds.aggregate_queries() - before, 2);
    }
}
