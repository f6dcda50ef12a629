use crate::datastore::{
    filters::PostFilters,
    postgres::PostgresStore,
    structs::{Hashtag, NewPost, Post, PostChanges, PostHashtag},
    tables::{hashtags, posts, posts_hashtags},
    PostStore,
};
use crate::twoface::{BlockingResp, Fallible, TfError};
use actix_web::web::block;
use async_trait::async_trait;
use diesel::{
    pg::PgConnection,
    query_dsl::{QueryDsl, RunQueryDsl},
    result::Error as DieselError,
    Connection, ExpressionMethods, OptionalExtension,
};

fn link_hashtags(
    conn: &PgConnection,
    post_id: i32,
    hashtag_ids: &[i32],
) -> Result<usize, DieselError> {
    if hashtag_ids.is_empty() {
        return Ok(0);
    }
    let links: Vec<PostHashtag> = hashtag_ids
        .iter()
        .map(|&hashtag_id| PostHashtag {
            post_id,
            hashtag_id,
        })
        .collect();
    diesel::insert_into(posts_hashtags::table)
        .values(&links)
        .on_conflict_do_nothing()
        .execute(conn)
}

#[async_trait]
impl PostStore for PostgresStore {
    async fn new_post(&self, new_post: NewPost, hashtag_ids: Vec<i32>) -> Fallible<Post> {
        let conn = self.pool.get()?;
        block(move || {
            conn.transaction::<_, TfError, _>(|| {
                let post: Post = diesel::insert_into(posts::table)
                    .values(&new_post)
                    .get_result(&conn)?;
                link_hashtags(&conn, post.id, &hashtag_ids)?;
                Ok(post)
            })
        })
        .await
        .to_resp()
    }

    async fn list_posts(&self, filters: PostFilters) -> Fallible<Vec<Post>> {
        let conn = self.pool.get()?;
        block(move || {
            let mut query = posts::table.into_boxed();
            if let Some(author_id) = filters.author_id {
                query = query.filter(posts::author_id.eq(author_id));
            }
            if let Some(hashtag_ids) = &filters.hashtags {
                // Resolve tagged ids first; IN over them keeps each post once however many tags match.
                let tagged: Vec<i32> = posts_hashtags::table
                    .filter(posts_hashtags::hashtag_id.eq_any(hashtag_ids))
                    .select(posts_hashtags::post_id)
                    .distinct()
                    .load(&conn)?;
                query = query.filter(posts::id.eq_any(tagged));
            }
            query
                .order_by((posts::created_at.desc(), posts::id.desc()))
                .load::<Post>(&conn)
        })
        .await
        .to_resp()
    }

    async fn find_post(&self, post_id: i32) -> Fallible<Option<Post>> {
        let conn = self.pool.get()?;
        block(move || posts::table.find(post_id).get_result::<Post>(&conn).optional())
            .await
            .to_resp()
    }

    async fn posts_by_id(&self, post_ids: Vec<i32>) -> Fallible<Vec<Post>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        block(move || {
            posts::table
                .filter(posts::id.eq_any(post_ids))
                .load::<Post>(&conn)
        })
        .await
        .to_resp()
    }

    async fn update_post(
        &self,
        post_id: i32,
        changes: PostChanges,
        hashtag_ids: Option<Vec<i32>>,
    ) -> Fallible<Option<Post>> {
        let conn = self.pool.get()?;
        block(move || {
            conn.transaction::<_, TfError, _>(|| {
                let target = posts::table.find(post_id);
                let post: Option<Post> = if changes.is_empty() {
                    target.get_result(&conn).optional()?
                } else {
                    diesel::update(target)
                        .set(&changes)
                        .get_result(&conn)
                        .optional()?
                };
                guard!(let Some(post) = post else {
                    return Ok(None);
                });

                if let Some(hashtag_ids) = hashtag_ids {
                    diesel::delete(
                        posts_hashtags::table.filter(posts_hashtags::post_id.eq(post.id)),
                    )
                    .execute(&conn)?;
                    link_hashtags(&conn, post.id, &hashtag_ids)?;
                }
                Ok(Some(post))
            })
        })
        .await
        .to_resp()
    }

    async fn set_post_image(&self, post_id: i32, image: String) -> Fallible<Option<Post>> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::update(posts::table.find(post_id))
                .set(posts::image.eq(Some(image)))
                .get_result::<Post>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }

    async fn delete_post(&self, post_id: i32) -> Fallible<Option<Post>> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::delete(posts::table.find(post_id))
                .get_result::<Post>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }

    async fn post_hashtags(&self, post_ids: Vec<i32>) -> Fallible<Vec<(i32, Hashtag)>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        block(move || {
            posts_hashtags::table
                .inner_join(hashtags::table)
                .filter(posts_hashtags::post_id.eq_any(post_ids))
                .select((posts_hashtags::post_id, hashtags::all_columns))
                .order_by(hashtags::id)
                .load::<(i32, Hashtag)>(&conn)
        })
        .await
        .to_resp()
    }
}
