use crate::api::{auth::hash_password, check_text, observe, views, State};
use crate::datastore::{
    filters::UserFilters,
    structs::{NewUser, User, UserChanges},
    Datastore,
};
use crate::graph;
use crate::policy::{self, Caller};
use crate::twoface::{ExternalError, Fallible, OrNotFound, TfError};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

const MIN_PASSWORD_CHARS: usize = 5;
const USER_NOT_FOUND: &str = "No user with that id";

pub const BAD_EMAIL: ExternalError = ExternalError::invalid_field("Enter a valid email address");
pub const SHORT_PASSWORD: ExternalError =
    ExternalError::invalid_field("Password must be at least 5 characters");
pub const BAD_NICKNAME: ExternalError = ExternalError::invalid_field("Nickname may not be blank");

/// `/me` and `/register` come before `/{user_id}` so they aren't read as ids.
pub fn configure<DS: Datastore>(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_users::<DS>))
        .route("/register", web::post().to(register::<DS>))
        .route("/me", web::get().to(get_me::<DS>))
        .route("/me", web::put().to(update_me::<DS>))
        .route("/me", web::patch().to(update_me::<DS>))
        .route("/me", web::delete().to(delete_me::<DS>))
        .route("/{user_id}", web::get().to(get_user::<DS>))
        .route("/{user_id}", web::put().to(update_user::<DS>))
        .route("/{user_id}", web::patch().to(update_user::<DS>))
        .route("/{user_id}", web::delete().to(delete_user::<DS>))
        .route("/{user_id}/follow", web::post().to(follow::<DS>))
        .route("/{user_id}/follow", web::delete().to(unfollow::<DS>))
        .route("/{user_id}/unfollow", web::post().to(unfollow::<DS>));
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct UserListQuery {
    pub nickname: Option<String>,
    pub city: Option<String>,
}

impl From<UserListQuery> for UserFilters {
    fn from(q: UserListQuery) -> Self {
        Self {
            nickname: q.nickname,
            city: q.city,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub biography: String,
    #[serde(default)]
    pub city: String,
}

/// Profile edits. Both PUT and PATCH treat absent fields as unchanged. An explicit
/// `"avatar": null` removes the avatar.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ProfileBody {
    pub email: Option<String>,
    pub password: Option<String>,
    pub nickname: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar: Option<Option<String>>,
    pub biography: Option<String>,
    pub city: Option<String>,
}

/// Tells a field that was sent as `null` apart from one that was left out.
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn check_email(email: &str) -> Fallible<()> {
    check_text(email, None, BAD_EMAIL)?;
    if !email.contains('@') {
        return Err(TfError::new(format!("bad email {:?}", email), BAD_EMAIL));
    }
    Ok(())
}

fn check_password(password: &str) -> Fallible<()> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(TfError::new("password too short", SHORT_PASSWORD));
    }
    Ok(())
}

impl ProfileBody {
    fn into_changes(self) -> Fallible<UserChanges> {
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        if let Some(nickname) = &self.nickname {
            check_text(nickname, None, BAD_NICKNAME)?;
        }
        let password = match self.password {
            Some(password) => {
                check_password(&password)?;
                Some(hash_password(&password))
            }
            None => None,
        };
        Ok(UserChanges {
            email: self.email,
            password,
            nickname: self.nickname,
            first_name: self.first_name,
            last_name: self.last_name,
            avatar: self.avatar,
            biography: self.biography,
            city: self.city,
        })
    }
}

async fn list_users<DS: Datastore>(
    state: web::Data<State<DS>>,
    _caller: Caller,
    query: web::Query<UserListQuery>,
) -> Fallible<HttpResponse> {
    observe("list_users", async move {
        let users = state.ds.list_users(query.into_inner().into()).await?;
        let list = views::user_list(&*state.ds, users).await?;
        Ok(HttpResponse::Ok().json(list))
    })
    .await
}

async fn register<DS: Datastore>(
    state: web::Data<State<DS>>,
    body: web::Json<RegisterBody>,
) -> Fallible<HttpResponse> {
    observe("register", async move {
        let body = body.into_inner();
        check_email(&body.email)?;
        check_password(&body.password)?;
        let nickname = if body.nickname.trim().is_empty() {
            body.email.split('@').next().unwrap_or_default().to_owned()
        } else {
            body.nickname
        };
        let new_user = NewUser {
            email: body.email,
            password: hash_password(&body.password),
            nickname,
            first_name: body.first_name,
            last_name: body.last_name,
            avatar: body.avatar,
            biography: body.biography,
            city: body.city,
        };
        let user = state.ds.new_user(new_user).await?;
        info!(user_id = user.id, "user registered");
        Ok(HttpResponse::Created().json(views::UserView::from(user)))
    })
    .await
}

async fn get_me<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
) -> Fallible<HttpResponse> {
    observe("get_me", async move {
        let user = policy::authenticate(&*state.ds, &caller).await?;
        Ok(HttpResponse::Ok().json(views::UserView::from(user)))
    })
    .await
}

async fn update_me<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    body: web::Json<ProfileBody>,
) -> Fallible<HttpResponse> {
    observe("update_me", async move {
        let user = policy::authenticate(&*state.ds, &caller).await?;
        let user = change_profile(&*state.ds, user, body.into_inner()).await?;
        Ok(HttpResponse::Ok().json(views::UserView::from(user)))
    })
    .await
}

async fn delete_me<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
) -> Fallible<HttpResponse> {
    observe("delete_me", async move {
        let user = policy::authenticate(&*state.ds, &caller).await?;
        remove_user(&*state.ds, user).await
    })
    .await
}

async fn get_user<DS: Datastore>(
    state: web::Data<State<DS>>,
    _caller: Caller,
    user_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("get_user", async move {
        let ds = &*state.ds;
        let user = ds.get_user(*user_id).await?.or_not_found(USER_NOT_FOUND)?;
        Ok(HttpResponse::Ok().json(views::user_detail(ds, user).await?))
    })
    .await
}

async fn update_user<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    user_id: web::Path<i32>,
    body: web::Json<ProfileBody>,
) -> Fallible<HttpResponse> {
    observe("update_user", async move {
        let ds = &*state.ds;
        let me = policy::authenticate(ds, &caller).await?;
        let target = ds.get_user(*user_id).await?.or_not_found(USER_NOT_FOUND)?;
        policy::require_owner(&me, &target)?;
        let user = change_profile(ds, target, body.into_inner()).await?;
        Ok(HttpResponse::Ok().json(views::UserView::from(user)))
    })
    .await
}

async fn delete_user<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    user_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("delete_user", async move {
        let ds = &*state.ds;
        let me = policy::authenticate(ds, &caller).await?;
        let target = ds.get_user(*user_id).await?.or_not_found(USER_NOT_FOUND)?;
        policy::require_owner(&me, &target)?;
        remove_user(ds, target).await
    })
    .await
}

async fn follow<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    user_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("follow", async move {
        let ds = &*state.ds;
        let me = policy::authenticate(ds, &caller).await?;
        let target = ds.get_user(*user_id).await?.or_not_found(USER_NOT_FOUND)?;
        graph::follow(ds, &state.edges, me.id, &target).await?;
        Ok(HttpResponse::Created().json(views::user_detail(ds, target).await?))
    })
    .await
}

async fn unfollow<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    user_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("unfollow", async move {
        let ds = &*state.ds;
        let me = policy::authenticate(ds, &caller).await?;
        let target = ds.get_user(*user_id).await?.or_not_found(USER_NOT_FOUND)?;
        graph::unfollow(ds, me.id, &target).await?;
        Ok(HttpResponse::Ok().json(views::user_detail(ds, target).await?))
    })
    .await
}

async fn change_profile<DS: Datastore>(ds: &DS, user: User, body: ProfileBody) -> Fallible<User> {
    let changes = body.into_changes()?;
    ds.update_user(user.id, changes)
        .await?
        .or_not_found(USER_NOT_FOUND)
}

async fn remove_user<DS: Datastore>(ds: &DS, user: User) -> Fallible<HttpResponse> {
    ds.delete_user(user.id).await?.or_not_found(USER_NOT_FOUND)?;
    info!(user_id = user.id, "user deleted");
    Ok(HttpResponse::NoContent().finish())
}
