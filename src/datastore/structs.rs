use crate::datastore::filters::{PostFilters, UserFilters};
use crate::datastore::tables::{comments, follows, hashtags, likes, posts, posts_hashtags, users};
use chrono::{offset::Utc, DateTime};
use serde::{Deserialize, Serialize};

/// A user of the website.
#[derive(Queryable, Identifiable, Clone, Debug, PartialEq, Eq)]
#[table_name = "users"]
pub struct User {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub email: String,
    /// `salt$digest`, see `api::auth::hash_password`. Never serialized.
    pub password: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub biography: String,
    pub city: String,
    pub is_staff: bool,
}

impl User {
    /// Does this user match all specified filters?
    pub fn matches(&self, filters: &UserFilters) -> bool {
        if let Some(nickname) = &filters.nickname {
            if nickname != &self.nickname {
                return false;
            }
        }
        if let Some(city) = &filters.city {
            if city != &self.city {
                return false;
            }
        }
        true
    }
}

/// Parameters for the database statement which inserts new users.
#[derive(Insertable, Clone, Debug)]
#[table_name = "users"]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub biography: String,
    pub city: String,
}

/// Profile fields a user may change. Unset fields are left alone.
#[derive(AsChangeset, Default, Clone, Debug)]
#[table_name = "users"]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub nickname: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `Some(None)` clears the avatar.
    pub avatar: Option<Option<String>>,
    pub biography: Option<String>,
    pub city: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.nickname.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.avatar.is_none()
            && self.biography.is_none()
            && self.city.is_none()
    }

    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.email {
            user.email = v;
        }
        if let Some(v) = self.password {
            user.password = v;
        }
        if let Some(v) = self.nickname {
            user.nickname = v;
        }
        if let Some(v) = self.first_name {
            user.first_name = v;
        }
        if let Some(v) = self.last_name {
            user.last_name = v;
        }
        if let Some(v) = self.avatar {
            user.avatar = v;
        }
        if let Some(v) = self.biography {
            user.biography = v;
        }
        if let Some(v) = self.city {
            user.city = v;
        }
    }
}

/// A hashtag, shared between many posts.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[table_name = "hashtags"]
pub struct Hashtag {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable, AsChangeset, Clone, Debug)]
#[table_name = "hashtags"]
pub struct NewHashtag {
    pub name: String,
}

/// A post from a user
#[derive(Queryable, Identifiable, Clone, Debug, PartialEq, Eq, Hash)]
#[table_name = "posts"]
pub struct Post {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub author_id: i32,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
}

impl Post {
    /// Does this post match all specified filters? `hashtag_ids` are the tags this post carries.
    pub fn matches(&self, filters: &PostFilters, hashtag_ids: &[i32]) -> bool {
        if let Some(author_id) = filters.author_id {
            if author_id != self.author_id {
                return false;
            }
        }
        if let Some(wanted) = &filters.hashtags {
            if !wanted.iter().any(|id| hashtag_ids.contains(id)) {
                return false;
            }
        }
        true
    }
}

/// Parameters for the database statement which inserts new posts.
#[derive(Insertable, Clone, Debug)]
#[table_name = "posts"]
pub struct NewPost {
    pub author_id: i32,
    pub title: String,
    pub content: String,
}

#[derive(AsChangeset, Default, Clone, Debug)]
#[table_name = "posts"]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Link row between a post and one of its hashtags.
#[derive(Queryable, Insertable, Clone, Copy, Debug, PartialEq, Eq)]
#[table_name = "posts_hashtags"]
pub struct PostHashtag {
    pub post_id: i32,
    pub hashtag_id: i32,
}

#[derive(Queryable, Identifiable, Associations, Clone, Debug, PartialEq, Eq)]
#[belongs_to(Post)]
#[table_name = "comments"]
pub struct Comment {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub post_id: i32,
    pub author_id: i32,
    pub content: String,
    pub image: Option<String>,
}

#[derive(Insertable, Clone, Debug)]
#[table_name = "comments"]
pub struct NewComment {
    pub post_id: i32,
    pub author_id: i32,
    pub content: String,
}

/// Edge: `created_by` likes `post_id`. At most one per pair.
#[derive(Queryable, Identifiable, Associations, Clone, Debug, PartialEq, Eq)]
#[belongs_to(Post)]
#[table_name = "likes"]
pub struct Like {
    pub id: i32,
    pub created_by: i32,
    pub post_id: i32,
}

#[derive(Insertable, Clone, Copy, Debug)]
#[table_name = "likes"]
pub struct NewLike {
    pub created_by: i32,
    pub post_id: i32,
}

/// Edge: `follower_id` follows `following_id`. At most one per pair.
#[derive(Queryable, Identifiable, Clone, Debug, PartialEq, Eq)]
#[table_name = "follows"]
pub struct Follow {
    pub id: i32,
    pub follower_id: i32,
    pub following_id: i32,
}

#[derive(Insertable, Clone, Copy, Debug)]
#[table_name = "follows"]
pub struct NewFollow {
    pub follower_id: i32,
    pub following_id: i32,
}

#[cfg(test)]
mod post_tests {
    use super::*;

    fn post(author_id: i32) -> Post {
        Post {
            id: 1,
            created_at: Utc::now(),
            author_id,
            title: "Test Post".to_owned(),
            content: "This is a test post.".to_owned(),
            image: None,
        }
    }

    #[test]
    fn test_post_condition() {
        let post = post(7);

        assert!(post.matches(&PostFilters::default(), &[]));
        assert!(post.matches(
            &PostFilters {
                author_id: Some(7),
                ..Default::default()
            },
            &[]
        ));
        assert!(!post.matches(
            &PostFilters {
                author_id: Some(8),
                ..Default::default()
            },
            &[]
        ));
    }

    #[test]
    fn test_hashtag_filter_is_inclusive_or() {
        let post = post(7);
        let filters = PostFilters {
            hashtags: Some(vec![1, 2]),
            ..Default::default()
        };

        assert!(post.matches(&filters, &[1]));
        assert!(post.matches(&filters, &[2, 5]));
        assert!(post.matches(&filters, &[1, 2]));
        assert!(!post.matches(&filters, &[3]));
        assert!(!post.matches(&filters, &[]));
    }

    #[test]
    fn test_user_filters() {
        let user = User {
            id: 1,
            created_at: Utc::now(),
            email: "test@test.com".to_owned(),
            password: String::new(),
            nickname: "testuser".to_owned(),
            first_name: String::new(),
            last_name: String::new(),
            avatar: None,
            biography: String::new(),
            city: "Kyiv".to_owned(),
            is_staff: false,
        };
        assert!(user.matches(&UserFilters {
            nickname: Some("testuser".to_owned()),
            city: Some("Kyiv".to_owned()),
        }));
        assert!(!user.matches(&UserFilters {
            city: Some("Lviv".to_owned()),
            ..Default::default()
        }));
    }
}
