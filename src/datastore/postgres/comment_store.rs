use crate::datastore::{
    postgres::PostgresStore,
    structs::{Comment, NewComment},
    tables::comments,
    CommentStore, Counts,
};
use crate::twoface::{BlockingResp, Fallible};
use actix_web::web::block;
use async_trait::async_trait;
use diesel::{
    dsl::sql,
    query_dsl::{GroupByDsl, QueryDsl, RunQueryDsl},
    sql_types::BigInt,
    ExpressionMethods, OptionalExtension,
};

#[async_trait]
impl CommentStore for PostgresStore {
    async fn new_comment(&self, new_comment: NewComment) -> Fallible<Comment> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(comments::table)
                .values(&new_comment)
                .get_result::<Comment>(&conn)
        })
        .await
        .to_resp()
    }

    async fn list_comments(&self) -> Fallible<Vec<Comment>> {
        let conn = self.pool.get()?;
        block(move || {
            comments::table
                .order_by((comments::created_at.desc(), comments::id.desc()))
                .load::<Comment>(&conn)
        })
        .await
        .to_resp()
    }

    async fn find_comment(&self, comment_id: i32) -> Fallible<Option<Comment>> {
        let conn = self.pool.get()?;
        block(move || {
            comments::table
                .find(comment_id)
                .get_result::<Comment>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }

    async fn update_comment(&self, comment_id: i32, content: String) -> Fallible<Option<Comment>> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::update(comments::table.find(comment_id))
                .set(comments::content.eq(content))
                .get_result::<Comment>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }

    async fn set_comment_image(
        &self,
        comment_id: i32,
        image: String,
    ) -> Fallible<Option<Comment>> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::update(comments::table.find(comment_id))
                .set(comments::image.eq(Some(image)))
                .get_result::<Comment>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }

    async fn delete_comment(&self, comment_id: i32) -> Fallible<Option<Comment>> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::delete(comments::table.find(comment_id))
                .get_result::<Comment>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }

    async fn comments_on(&self, post_id: i32) -> Fallible<Vec<Comment>> {
        let conn = self.pool.get()?;
        block(move || {
            comments::table
                .filter(comments::post_id.eq(post_id))
                .order_by((comments::created_at.desc(), comments::id.desc()))
                .load::<Comment>(&conn)
        })
        .await
        .to_resp()
    }

    async fn comment_counts(&self, post_ids: Vec<i32>) -> Fallible<Counts> {
        if post_ids.is_empty() {
            return Ok(Counts::new());
        }
        let conn = self.pool.get()?;
        let rows = block(move || {
            comments::table
                .filter(comments::post_id.eq_any(post_ids))
                .group_by(comments::post_id)
                .select((comments::post_id, sql::<BigInt>("count(*)")))
                .load::<(i32, i64)>(&conn)
        })
        .await
        .to_resp()?;
        Ok(rows.into_iter().collect())
    }
}
