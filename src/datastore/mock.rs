use crate::datastore::{
    filters::{PostFilters, UserFilters},
    structs::{
        Comment, Follow, Hashtag, Like, NewComment, NewFollow, NewHashtag, NewLike, NewPost,
        NewUser, Post, PostChanges, PostHashtag, User, UserChanges,
    },
    CommentStore, Counts, FollowStore, HashtagStore, LikeStore, PostStore, UserStore,
};
use crate::twoface::{ExternalError, Fallible, TfError};
use async_trait::async_trait;
use chrono::{offset::Utc, Duration};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// All tables sit behind one lock, so every method is a single atomic step the way a
/// statement is in Postgres.
#[derive(Default, Debug)]
struct Tables {
    next_id: i32,
    users: Vec<User>,
    hashtags: Vec<Hashtag>,
    posts: Vec<Post>,
    posts_hashtags: Vec<PostHashtag>,
    comments: Vec<Comment>,
    likes: Vec<Like>,
    follows: Vec<Follow>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn tags_of(&self, post_id: i32) -> Vec<i32> {
        self.posts_hashtags
            .iter()
            .filter(|link| link.post_id == post_id)
            .map(|link| link.hashtag_id)
            .collect()
    }

    fn link(&mut self, post_id: i32, hashtag_ids: &[i32]) {
        for &hashtag_id in hashtag_ids {
            let link = PostHashtag {
                post_id,
                hashtag_id,
            };
            if !self.posts_hashtags.contains(&link) {
                self.posts_hashtags.push(link);
            }
        }
    }

    /// What ON DELETE CASCADE does for a post.
    fn cascade_post(&mut self, post_id: i32) {
        self.posts_hashtags.retain(|link| link.post_id != post_id);
        self.comments.retain(|c| c.post_id != post_id);
        self.likes.retain(|l| l.post_id != post_id);
    }
}

/// A mock implementation of datastore::Datastore
#[derive(Clone, Default, Debug)]
pub struct Client {
    tables: Arc<Mutex<Tables>>,
    aggregate_queries: Arc<AtomicUsize>,
    lookups: Arc<AtomicUsize>,
}

fn count_by(ids: &[i32], keys: impl Iterator<Item = i32>) -> Counts {
    let mut counts = Counts::new();
    for key in keys.filter(|key| ids.contains(key)) {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

impl Client {
    /// How many grouped count queries have run.
    pub fn aggregate_queries(&self) -> usize {
        self.aggregate_queries.load(Ordering::SeqCst)
    }

    fn counted(&self) {
        self.aggregate_queries.fetch_add(1, Ordering::SeqCst);
    }

    /// How many user or post lookups by id have run.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn looked_up(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
    }

    pub fn seed_user(&self, email: &str, nickname: &str) -> User {
        let mut tables = self.tables.lock().unwrap();
        let user = User {
            id: tables.next_id(),
            created_at: Utc::now(),
            email: email.to_owned(),
            password: String::new(),
            nickname: nickname.to_owned(),
            first_name: String::new(),
            last_name: String::new(),
            avatar: None,
            biography: String::new(),
            city: String::new(),
            is_staff: false,
        };
        tables.users.push(user.clone());
        user
    }

    pub fn seed_hashtag(&self, name: &str) -> Hashtag {
        let mut tables = self.tables.lock().unwrap();
        let hashtag = Hashtag {
            id: tables.next_id(),
            name: name.to_owned(),
        };
        tables.hashtags.push(hashtag.clone());
        hashtag
    }

    pub fn seed_post(&self, author: &User, title: &str, hashtag_ids: &[i32]) -> Post {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        // Spread creation times out so "newest first" is observable.
        let post = Post {
            id,
            created_at: Utc::now() + Duration::milliseconds(i64::from(id)),
            author_id: author.id,
            title: title.to_owned(),
            content: "This is a test post.".to_owned(),
            image: None,
        };
        tables.posts.push(post.clone());
        tables.link(id, hashtag_ids);
        post
    }

    pub fn follow_count(&self) -> usize {
        self.tables.lock().unwrap().follows.len()
    }

    pub fn like_count(&self) -> usize {
        self.tables.lock().unwrap().likes.len()
    }
}

#[async_trait]
impl UserStore for Client {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == new_user.email) {
            return Err(TfError::new(
                "duplicate email",
                ExternalError::invalid_field("A user with this email already exists"),
            ));
        }
        let user = User {
            id: tables.next_id(),
            created_at: Utc::now(),
            email: new_user.email,
            password: new_user.password,
            nickname: new_user.nickname,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            avatar: new_user.avatar,
            biography: new_user.biography,
            city: new_user.city,
            is_staff: false,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: i32) -> Fallible<Option<User>> {
        self.looked_up();
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_users(&self, filters: UserFilters) -> Fallible<Vec<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .filter(|u| u.matches(&filters))
            .cloned()
            .collect())
    }

    async fn users_by_id(&self, user_ids: Vec<i32>) -> Fallible<Vec<User>> {
        self.looked_up();
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .filter(|u| user_ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn update_user(&self, user_id: i32, changes: UserChanges) -> Fallible<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(email) = &changes.email {
            if tables
                .users
                .iter()
                .any(|u| &u.email == email && u.id != user_id)
            {
                return Err(TfError::new(
                    "duplicate email",
                    ExternalError::invalid_field("A user with this email already exists"),
                ));
            }
        }
        Ok(tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .map(|user| {
                changes.apply(user);
                user.clone()
            }))
    }

    async fn delete_user(&self, user_id: i32) -> Fallible<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        guard!(let Some(index) = tables.users.iter().position(|u| u.id == user_id) else {
            return Ok(None);
        });
        let user = tables.users.remove(index);
        let authored: Vec<i32> = tables
            .posts
            .iter()
            .filter(|p| p.author_id == user_id)
            .map(|p| p.id)
            .collect();
        for post_id in authored {
            tables.cascade_post(post_id);
        }
        tables.posts.retain(|p| p.author_id != user_id);
        tables.comments.retain(|c| c.author_id != user_id);
        tables.likes.retain(|l| l.created_by != user_id);
        tables
            .follows
            .retain(|f| f.follower_id != user_id && f.following_id != user_id);
        Ok(Some(user))
    }
}

#[async_trait]
impl PostStore for Client {
    async fn new_post(&self, new_post: NewPost, hashtag_ids: Vec<i32>) -> Fallible<Post> {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        let post = Post {
            id,
            created_at: Utc::now() + Duration::milliseconds(i64::from(id)),
            author_id: new_post.author_id,
            title: new_post.title,
            content: new_post.content,
            image: None,
        };
        tables.posts.push(post.clone());
        tables.link(id, &hashtag_ids);
        Ok(post)
    }

    async fn list_posts(&self, filters: PostFilters) -> Fallible<Vec<Post>> {
        let tables = self.tables.lock().unwrap();
        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .filter(|p| p.matches(&filters, &tables.tags_of(p.id)))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn find_post(&self, post_id: i32) -> Fallible<Option<Post>> {
        self.looked_up();
        let tables = self.tables.lock().unwrap();
        Ok(tables.posts.iter().find(|p| p.id == post_id).cloned())
    }

    async fn posts_by_id(&self, post_ids: Vec<i32>) -> Fallible<Vec<Post>> {
        self.looked_up();
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .posts
            .iter()
            .filter(|p| post_ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn update_post(
        &self,
        post_id: i32,
        changes: PostChanges,
        hashtag_ids: Option<Vec<i32>>,
    ) -> Fallible<Option<Post>> {
        let mut tables = self.tables.lock().unwrap();
        let post = tables
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .map(|post| {
                if let Some(title) = changes.title {
                    post.title = title;
                }
                if let Some(content) = changes.content {
                    post.content = content;
                }
                post.clone()
            });
        if post.is_some() {
            if let Some(hashtag_ids) = hashtag_ids {
                tables.posts_hashtags.retain(|link| link.post_id != post_id);
                tables.link(post_id, &hashtag_ids);
            }
        }
        Ok(post)
    }

    async fn set_post_image(&self, post_id: i32, image: String) -> Fallible<Option<Post>> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .map(|post| {
                post.image = Some(image);
                post.clone()
            }))
    }

    async fn delete_post(&self, post_id: i32) -> Fallible<Option<Post>> {
        let mut tables = self.tables.lock().unwrap();
        guard!(let Some(index) = tables.posts.iter().position(|p| p.id == post_id) else {
            return Ok(None);
        });
        let post = tables.posts.remove(index);
        tables.cascade_post(post_id);
        Ok(Some(post))
    }

    async fn post_hashtags(&self, post_ids: Vec<i32>) -> Fallible<Vec<(i32, Hashtag)>> {
        let tables = self.tables.lock().unwrap();
        let mut pairs: Vec<(i32, Hashtag)> = tables
            .posts_hashtags
            .iter()
            .filter(|link| post_ids.contains(&link.post_id))
            .filter_map(|link| {
                tables
                    .hashtags
                    .iter()
                    .find(|h| h.id == link.hashtag_id)
                    .map(|h| (link.post_id, h.clone()))
            })
            .collect();
        pairs.sort_by_key(|(_, h)| h.id);
        Ok(pairs)
    }
}

#[async_trait]
impl CommentStore for Client {
    async fn new_comment(&self, new_comment: NewComment) -> Fallible<Comment> {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        let comment = Comment {
            id,
            created_at: Utc::now() + Duration::milliseconds(i64::from(id)),
            post_id: new_comment.post_id,
            author_id: new_comment.author_id,
            content: new_comment.content,
            image: None,
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self) -> Fallible<Vec<Comment>> {
        let tables = self.tables.lock().unwrap();
        let mut comments = tables.comments.clone();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn find_comment(&self, comment_id: i32) -> Fallible<Option<Comment>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.comments.iter().find(|c| c.id == comment_id).cloned())
    }

    async fn update_comment(&self, comment_id: i32, content: String) -> Fallible<Option<Comment>> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .map(|comment| {
                comment.content = content;
                comment.clone()
            }))
    }

    async fn set_comment_image(
        &self,
        comment_id: i32,
        image: String,
    ) -> Fallible<Option<Comment>> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .map(|comment| {
                comment.image = Some(image);
                comment.clone()
            }))
    }

    async fn delete_comment(&self, comment_id: i32) -> Fallible<Option<Comment>> {
        let mut tables = self.tables.lock().unwrap();
        guard!(let Some(index) = tables.comments.iter().position(|c| c.id == comment_id) else {
            return Ok(None);
        });
        Ok(Some(tables.comments.remove(index)))
    }

    async fn comments_on(&self, post_id: i32) -> Fallible<Vec<Comment>> {
        let mut comments = self.list_comments().await?;
        comments.retain(|c| c.post_id == post_id);
        Ok(comments)
    }

    async fn comment_counts(&self, post_ids: Vec<i32>) -> Fallible<Counts> {
        self.counted();
        let tables = self.tables.lock().unwrap();
        Ok(count_by(&post_ids, tables.comments.iter().map(|c| c.post_id)))
    }
}

#[async_trait]
impl HashtagStore for Client {
    async fn new_hashtag(&self, new_hashtag: NewHashtag) -> Fallible<Hashtag> {
        let mut tables = self.tables.lock().unwrap();
        if tables.hashtags.iter().any(|h| h.name == new_hashtag.name) {
            return Err(TfError::new(
                "duplicate hashtag",
                ExternalError::invalid_field("A hashtag with this name already exists"),
            ));
        }
        let hashtag = Hashtag {
            id: tables.next_id(),
            name: new_hashtag.name,
        };
        tables.hashtags.push(hashtag.clone());
        Ok(hashtag)
    }

    async fn list_hashtags(&self) -> Fallible<Vec<Hashtag>> {
        Ok(self.tables.lock().unwrap().hashtags.clone())
    }

    async fn find_hashtag(&self, hashtag_id: i32) -> Fallible<Option<Hashtag>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.hashtags.iter().find(|h| h.id == hashtag_id).cloned())
    }

    async fn hashtags_by_id(&self, hashtag_ids: Vec<i32>) -> Fallible<Vec<Hashtag>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .hashtags
            .iter()
            .filter(|h| hashtag_ids.contains(&h.id))
            .cloned()
            .collect())
    }

    async fn rename_hashtag(
        &self,
        hashtag_id: i32,
        changes: NewHashtag,
    ) -> Fallible<Option<Hashtag>> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .hashtags
            .iter()
            .any(|h| h.name == changes.name && h.id != hashtag_id)
        {
            return Err(TfError::new(
                "duplicate hashtag",
                ExternalError::invalid_field("A hashtag with this name already exists"),
            ));
        }
        Ok(tables
            .hashtags
            .iter_mut()
            .find(|h| h.id == hashtag_id)
            .map(|hashtag| {
                hashtag.name = changes.name;
                hashtag.clone()
            }))
    }

    async fn delete_hashtag(&self, hashtag_id: i32) -> Fallible<Option<Hashtag>> {
        let mut tables = self.tables.lock().unwrap();
        guard!(let Some(index) = tables.hashtags.iter().position(|h| h.id == hashtag_id) else {
            return Ok(None);
        });
        tables
            .posts_hashtags
            .retain(|link| link.hashtag_id != hashtag_id);
        Ok(Some(tables.hashtags.remove(index)))
    }
}

#[async_trait]
impl FollowStore for Client {
    async fn insert_follow(&self, new_follow: NewFollow) -> Fallible<Option<Follow>> {
        let mut tables = self.tables.lock().unwrap();
        if tables.follows.iter().any(|f| {
            f.follower_id == new_follow.follower_id && f.following_id == new_follow.following_id
        }) {
            return Ok(None);
        }
        let follow = Follow {
            id: tables.next_id(),
            follower_id: new_follow.follower_id,
            following_id: new_follow.following_id,
        };
        tables.follows.push(follow.clone());
        Ok(Some(follow))
    }

    async fn delete_follow(
        &self,
        follower_id: i32,
        following_id: i32,
    ) -> Fallible<Option<Follow>> {
        let mut tables = self.tables.lock().unwrap();
        guard!(let Some(index) = tables
            .follows
            .iter()
            .position(|f| f.follower_id == follower_id && f.following_id == following_id) else {
            return Ok(None);
        });
        Ok(Some(tables.follows.remove(index)))
    }

    async fn following_of(&self, user_id: i32) -> Fallible<Vec<Follow>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id)
            .cloned()
            .collect())
    }

    async fn followers_of(&self, user_id: i32) -> Fallible<Vec<Follow>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .follows
            .iter()
            .filter(|f| f.following_id == user_id)
            .cloned()
            .collect())
    }

    async fn follower_counts(&self, user_ids: Vec<i32>) -> Fallible<Counts> {
        self.counted();
        let tables = self.tables.lock().unwrap();
        Ok(count_by(&user_ids, tables.follows.iter().map(|f| f.following_id)))
    }

    async fn following_counts(&self, user_ids: Vec<i32>) -> Fallible<Counts> {
        self.counted();
        let tables = self.tables.lock().unwrap();
        Ok(count_by(&user_ids, tables.follows.iter().map(|f| f.follower_id)))
    }
}

#[async_trait]
impl LikeStore for Client {
    async fn insert_like(&self, new_like: NewLike) -> Fallible<Option<Like>> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .likes
            .iter()
            .any(|l| l.post_id == new_like.post_id && l.created_by == new_like.created_by)
        {
            return Ok(None);
        }
        let like = Like {
            id: tables.next_id(),
            created_by: new_like.created_by,
            post_id: new_like.post_id,
        };
        tables.likes.push(like.clone());
        Ok(Some(like))
    }

    async fn delete_like(&self, post_id: i32, user_id: i32) -> Fallible<Option<Like>> {
        let mut tables = self.tables.lock().unwrap();
        guard!(let Some(index) = tables
            .likes
            .iter()
            .position(|l| l.post_id == post_id && l.created_by == user_id) else {
            return Ok(None);
        });
        Ok(Some(tables.likes.remove(index)))
    }

    async fn likes_on(&self, post_id: i32) -> Fallible<Vec<Like>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .likes
            .iter()
            .filter(|l| l.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn like_counts(&self, post_ids: Vec<i32>) -> Fallible<Counts> {
        self.counted();
        let tables = self.tables.lock().unwrap();
        Ok(count_by(&post_ids, tables.likes.iter().map(|l| l.post_id)))
    }
}
