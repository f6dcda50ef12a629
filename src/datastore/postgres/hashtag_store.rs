use crate::datastore::{
    postgres::PostgresStore,
    structs::{Hashtag, NewHashtag},
    tables::hashtags,
    HashtagStore,
};
use crate::twoface::{unique_violation, BlockingResp, ExternalError, Fallible};
use actix_web::web::block;
use async_trait::async_trait;
use diesel::{
    query_dsl::{QueryDsl, RunQueryDsl},
    ExpressionMethods, OptionalExtension,
};

const NAME_TAKEN: ExternalError =
    ExternalError::invalid_field("A hashtag with this name already exists");

#[async_trait]
impl HashtagStore for PostgresStore {
    async fn new_hashtag(&self, new_hashtag: NewHashtag) -> Fallible<Hashtag> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(hashtags::table)
                .values(&new_hashtag)
                .get_result::<Hashtag>(&conn)
                .map_err(|e| unique_violation(e, NAME_TAKEN))
        })
        .await
        .to_resp()
    }

    async fn list_hashtags(&self) -> Fallible<Vec<Hashtag>> {
        let conn = self.pool.get()?;
        block(move || hashtags::table.order_by(hashtags::id).load::<Hashtag>(&conn))
            .await
            .to_resp()
    }

    async fn find_hashtag(&self, hashtag_id: i32) -> Fallible<Option<Hashtag>> {
        let conn = self.pool.get()?;
        block(move || {
            hashtags::table
                .find(hashtag_id)
                .get_result::<Hashtag>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }

    async fn hashtags_by_id(&self, hashtag_ids: Vec<i32>) -> Fallible<Vec<Hashtag>> {
        if hashtag_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        block(move || {
            hashtags::table
                .filter(hashtags::id.eq_any(hashtag_ids))
                .order_by(hashtags::id)
                .load::<Hashtag>(&conn)
        })
        .await
        .to_resp()
    }

    async fn rename_hashtag(
        &self,
        hashtag_id: i32,
        changes: NewHashtag,
    ) -> Fallible<Option<Hashtag>> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::update(hashtags::table.find(hashtag_id))
                .set(&changes)
                .get_result::<Hashtag>(&conn)
                .optional()
                .map_err(|e| unique_violation(e, NAME_TAKEN))
        })
        .await
        .to_resp()
    }

    async fn delete_hashtag(&self, hashtag_id: i32) -> Fallible<Option<Hashtag>> {
        let conn = self.pool.get()?;
        // Links in posts_hashtags cascade; the posts stay.
        block(move || {
            diesel::delete(hashtags::table.find(hashtag_id))
                .get_result::<Hashtag>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }
}
