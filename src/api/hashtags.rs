use crate::api::{check_text, observe, State};
use crate::datastore::{structs::NewHashtag, Datastore};
use crate::policy::{self, Caller};
use crate::twoface::{ExternalError, Fallible, OrNotFound};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

const NAME_MAX_CHARS: usize = 64;
const HASHTAG_NOT_FOUND: &str = "No hashtag with that id";

pub const BAD_NAME: ExternalError =
    ExternalError::invalid_field("Name is required and may be at most 64 characters");

/// Hashtags have no owner. Any authenticated user may create, rename or delete them.
pub fn configure<DS: Datastore>(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_hashtags::<DS>))
        .route("", web::post().to(create_hashtag::<DS>))
        .route("/{hashtag_id}", web::get().to(get_hashtag::<DS>))
        .route("/{hashtag_id}", web::put().to(rename_hashtag::<DS>))
        .route("/{hashtag_id}", web::patch().to(rename_hashtag::<DS>))
        .route("/{hashtag_id}", web::delete().to(delete_hashtag::<DS>));
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HashtagBody {
    pub name: String,
}

async fn list_hashtags<DS: Datastore>(
    state: web::Data<State<DS>>,
    _caller: Caller,
) -> Fallible<HttpResponse> {
    observe("list_hashtags", async move {
        Ok(HttpResponse::Ok().json(state.ds.list_hashtags().await?))
    })
    .await
}

async fn create_hashtag<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    body: web::Json<HashtagBody>,
) -> Fallible<HttpResponse> {
    observe("create_hashtag", async move {
        let ds = &*state.ds;
        policy::authenticate(ds, &caller).await?;
        let name = body.into_inner().name;
        check_text(&name, Some(NAME_MAX_CHARS), BAD_NAME)?;
        let hashtag = ds.new_hashtag(NewHashtag { name }).await?;
        Ok(HttpResponse::Created().json(hashtag))
    })
    .await
}

async fn get_hashtag<DS: Datastore>(
    state: web::Data<State<DS>>,
    _caller: Caller,
    hashtag_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("get_hashtag", async move {
        let hashtag = state
            .ds
            .find_hashtag(*hashtag_id)
            .await?
            .or_not_found(HASHTAG_NOT_FOUND)?;
        Ok(HttpResponse::Ok().json(hashtag))
    })
    .await
}

/// PUT and PATCH are the same thing here, since a name is all a hashtag has.
async fn rename_hashtag<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    hashtag_id: web::Path<i32>,
    body: web::Json<HashtagBody>,
) -> Fallible<HttpResponse> {
    observe("rename_hashtag", async move {
        let ds = &*state.ds;
        policy::authenticate(ds, &caller).await?;
        let name = body.into_inner().name;
        check_text(&name, Some(NAME_MAX_CHARS), BAD_NAME)?;
        let hashtag = ds
            .rename_hashtag(*hashtag_id, NewHashtag { name })
            .await?
            .or_not_found(HASHTAG_NOT_FOUND)?;
        Ok(HttpResponse::Ok().json(hashtag))
    })
    .await
}

async fn delete_hashtag<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    hashtag_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("delete_hashtag", async move {
        let ds = &*state.ds;
        policy::authenticate(ds, &caller).await?;
        ds.delete_hashtag(*hashtag_id)
            .await?
            .or_not_found(HASHTAG_NOT_FOUND)?;
        Ok(HttpResponse::NoContent().finish())
    })
    .await
}
