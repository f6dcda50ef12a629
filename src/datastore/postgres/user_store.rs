use crate::datastore::{
    filters::UserFilters,
    postgres::PostgresStore,
    structs::{NewUser, User, UserChanges},
    tables::users,
    UserStore,
};
use crate::twoface::{unique_violation, BlockingResp, ExternalError, Fallible};
use actix_web::web::block;
use async_trait::async_trait;
use diesel::{
    expression::BoxableExpression,
    pg::Pg,
    query_dsl::{QueryDsl, RunQueryDsl},
    sql_types::Bool,
    ExpressionMethods, OptionalExtension,
};

const EMAIL_TAKEN: ExternalError = ExternalError::invalid_field("A user with this email already exists");

#[async_trait]
impl UserStore for PostgresStore {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(users::table)
                .values(&new_user)
                .get_result::<User>(&conn)
                .map_err(|e| unique_violation(e, EMAIL_TAKEN))
        })
        .await
        .to_resp()
    }

    async fn get_user(&self, user_id: i32) -> Fallible<Option<User>> {
        let conn = self.pool.get()?;
        block(move || users::table.find(user_id).get_result::<User>(&conn).optional())
            .await
            .to_resp()
    }

    async fn list_users(&self, filters: UserFilters) -> Fallible<Vec<User>> {
        let conn = self.pool.get()?;
        block(move || {
            let mut query = users::table.into_boxed();
            for filter in filters.as_sql_where() {
                query = query.filter(filter);
            }
            query.order_by(users::id).load::<User>(&conn)
        })
        .await
        .to_resp()
    }

    async fn users_by_id(&self, user_ids: Vec<i32>) -> Fallible<Vec<User>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        block(move || {
            users::table
                .filter(users::id.eq_any(user_ids))
                .load::<User>(&conn)
        })
        .await
        .to_resp()
    }

    async fn update_user(&self, user_id: i32, changes: UserChanges) -> Fallible<Option<User>> {
        let conn = self.pool.get()?;
        block(move || {
            let target = users::table.find(user_id);
            if changes.is_empty() {
                return Ok(target.get_result::<User>(&conn).optional()?);
            }
            diesel::update(target)
                .set(&changes)
                .get_result::<User>(&conn)
                .optional()
                .map_err(|e| unique_violation(e, EMAIL_TAKEN))
        })
        .await
        .to_resp()
    }

    async fn delete_user(&self, user_id: i32) -> Fallible<Option<User>> {
        let conn = self.pool.get()?;
        // Posts, comments, likes and follows go with the user via ON DELETE CASCADE.
        block(move || {
            diesel::delete(users::table.find(user_id))
                .get_result::<User>(&conn)
                .optional()
        })
        .await
        .to_resp()
    }
}

impl UserFilters {
    pub fn as_sql_where(&self) -> Vec<Box<dyn BoxableExpression<users::table, Pg, SqlType = Bool>>> {
        let mut wheres: Vec<Box<dyn BoxableExpression<users::table, Pg, SqlType = Bool>>> =
            Vec::new();
        if let Some(nickname) = &self.nickname {
            wheres.push(Box::new(users::nickname.eq(nickname.clone())))
        }
        if let Some(city) = &self.city {
            wheres.push(Box::new(users::city.eq(city.clone())))
        }
        wheres
    }
}
