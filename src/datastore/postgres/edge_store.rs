//! Follow and Like edges. Every write here is a single statement guarded by a unique index, so
//! two racing requests for the same pair can never both succeed.
use crate::datastore::{
    postgres::PostgresStore,
    structs::{Follow, Like, NewFollow, NewLike},
    tables::{follows, likes},
    Counts, FollowStore, LikeStore,
};
use crate::twoface::{BlockingResp, Fallible, TfError};
use actix_web::web::block;
use async_trait::async_trait;
use diesel::{
    dsl::sql,
    query_dsl::{GroupByDsl, QueryDsl, RunQueryDsl},
    sql_types::BigInt,
    Connection, ExpressionMethods, OptionalExtension,
};

#[async_trait]
impl FollowStore for PostgresStore {
    async fn insert_follow(&self, new_follow: NewFollow) -> Fallible<Option<Follow>> {
        let conn = self.pool.get()?;
        block(move || {
            conn.transaction::<_, TfError, _>(|| {
                let inserted = diesel::insert_into(follows::table)
                    .values(&new_follow)
                    .on_conflict_do_nothing()
                    .execute(&conn)?;
                if inserted == 0 {
                    return Ok(None);
                }
                let follow = follows::table
                    .filter(follows::follower_id.eq(new_follow.follower_id))
                    .filter(follows::following_id.eq(new_follow.following_id))
                    .get_result::<Follow>(&conn)?;
                Ok(Some(follow))
            })
        })
        .await
        .to_resp()
    }

    async fn delete_follow(
        &self,
        follower_id: i32,
        following_id: i32,
    ) -> Fallible<Option<Follow>> {
        let conn = self.pool.get()?;
        block(move || {
            let target = follows::table
                .filter(follows::follower_id.eq(follower_id))
                .filter(follows::following_id.eq(following_id));
            diesel::delete(target)
                .get_result::<Follow>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }

    async fn following_of(&self, user_id: i32) -> Fallible<Vec<Follow>> {
        let conn = self.pool.get()?;
        block(move || {
            follows::table
                .filter(follows::follower_id.eq(user_id))
                .order_by(follows::id)
                .load::<Follow>(&conn)
        })
        .await
        .to_resp()
    }

    async fn followers_of(&self, user_id: i32) -> Fallible<Vec<Follow>> {
        let conn = self.pool.get()?;
        block(move || {
            follows::table
                .filter(follows::following_id.eq(user_id))
                .order_by(follows::id)
                .load::<Follow>(&conn)
        })
        .await
        .to_resp()
    }

    async fn follower_counts(&self, user_ids: Vec<i32>) -> Fallible<Counts> {
        if user_ids.is_empty() {
            return Ok(Counts::new());
        }
        let conn = self.pool.get()?;
        let rows = block(move || {
            follows::table
                .filter(follows::following_id.eq_any(user_ids))
                .group_by(follows::following_id)
                .select((follows::following_id, sql::<BigInt>("count(*)")))
                .load::<(i32, i64)>(&conn)
        })
        .await
        .to_resp()?;
        Ok(rows.into_iter().collect())
    }

    async fn following_counts(&self, user_ids: Vec<i32>) -> Fallible<Counts> {
        if user_ids.is_empty() {
            return Ok(Counts::new());
        }
        let conn = self.pool.get()?;
        let rows = block(move || {
            follows::table
                .filter(follows::follower_id.eq_any(user_ids))
                .group_by(follows::follower_id)
                .select((follows::follower_id, sql::<BigInt>("count(*)")))
                .load::<(i32, i64)>(&conn)
        })
        .await
        .to_resp()?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl LikeStore for PostgresStore {
    async fn insert_like(&self, new_like: NewLike) -> Fallible<Option<Like>> {
        let conn = self.pool.get()?;
        block(move || {
            conn.transaction::<_, TfError, _>(|| {
                let inserted = diesel::insert_into(likes::table)
                    .values(&new_like)
                    .on_conflict_do_nothing()
                    .execute(&conn)?;
                if inserted == 0 {
                    return Ok(None);
                }
                let like = likes::table
                    .filter(likes::post_id.eq(new_like.post_id))
                    .filter(likes::created_by.eq(new_like.created_by))
                    .get_result::<Like>(&conn)?;
                Ok(Some(like))
            })
        })
        .await
        .to_resp()
    }

    async fn delete_like(&self, post_id: i32, user_id: i32) -> Fallible<Option<Like>> {
        let conn = self.pool.get()?;
        block(move || {
            let target = likes::table
                .filter(likes::post_id.eq(post_id))
                .filter(likes::created_by.eq(user_id));
            diesel::delete(target).get_result::<Like>(&conn).optional()
        })
        .await
        .to_resp()
    }

    async fn likes_on(&self, post_id: i32) -> Fallible<Vec<Like>> {
        let conn = self.pool.get()?;
        block(move || {
            likes::table
                .filter(likes::post_id.eq(post_id))
                .order_by(likes::id)
                .load::<Like>(&conn)
        })
        .await
        .to_resp()
    }

    async fn like_counts(&self, post_ids: Vec<i32>) -> Fallible<Counts> {
        if post_ids.is_empty() {
            return Ok(Counts::new());
        }
        let conn = self.pool.get()?;
        let rows = block(move || {
            likes::table
                .filter(likes::post_id.eq_any(post_ids))
                .group_by(likes::post_id)
                .select((likes::post_id, sql::<BigInt>("count(*)")))
                .load::<(i32, i64)>(&conn)
        })
        .await
        .to_resp()?;
        Ok(rows.into_iter().collect())
    }
}
