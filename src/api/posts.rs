use crate::api::{check_text, observe, resolve_hashtags, views, State};
use crate::datastore::{
    filters::{parse_ids, PostFilters},
    structs::{NewPost, PostChanges},
    Datastore,
};
use crate::graph;
use crate::media::Kind;
use crate::policy::{self, Caller};
use crate::twoface::{ExternalError, Fallible, OrNotFound, TfError};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

const TITLE_MAX_CHARS: usize = 64;
const POST_NOT_FOUND: &str = "No post with that id";

pub const BAD_TITLE: ExternalError =
    ExternalError::invalid_field("Title is required and may be at most 64 characters");
pub const BAD_CONTENT: ExternalError = ExternalError::invalid_field("Content is required");
pub const BAD_HASHTAG_FILTER: ExternalError =
    ExternalError::invalid_field("hashtags must be a comma-separated list of ids");

pub fn configure<DS: Datastore>(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_posts::<DS>))
        .route("", web::post().to(create_post::<DS>))
        .route("/{post_id}", web::get().to(get_post::<DS>))
        .route("/{post_id}", web::put().to(replace_post::<DS>))
        .route("/{post_id}", web::patch().to(patch_post::<DS>))
        .route("/{post_id}", web::delete().to(delete_post::<DS>))
        .route("/{post_id}/like", web::post().to(like_post::<DS>))
        .route("/{post_id}/unlike", web::post().to(unlike_post::<DS>))
        .route(
            "/{post_id}/upload_image",
            web::post().to(upload_image::<DS>),
        );
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WritePostBody {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<i32>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PatchPostBody {
    pub title: Option<String>,
    pub content: Option<String>,
    pub hashtags: Option<Vec<i32>>,
}

impl From<WritePostBody> for PatchPostBody {
    fn from(body: WritePostBody) -> Self {
        Self {
            title: Some(body.title),
            content: Some(body.content),
            hashtags: Some(body.hashtags),
        }
    }
}

/// Query string for listing posts. `hashtags` is a comma-separated id list, matched inclusively.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PostListQuery {
    pub hashtags: Option<String>,
    pub author: Option<i32>,
}

impl PostListQuery {
    fn into_datastore_filters(self) -> Fallible<PostFilters> {
        let hashtags = match self.hashtags {
            None => None,
            Some(raw) => {
                guard!(let Some(ids) = parse_ids(&raw) else {
                    return Err(TfError::new(
                        format!("unparseable hashtag filter {:?}", raw),
                        BAD_HASHTAG_FILTER,
                    ));
                });
                Some(ids).filter(|ids| !ids.is_empty())
            }
        };
        Ok(PostFilters {
            author_id: self.author,
            hashtags,
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UploadQuery {
    pub filename: String,
}

fn check_post_fields(title: Option<&str>, content: Option<&str>) -> Fallible<()> {
    if let Some(title) = title {
        check_text(title, Some(TITLE_MAX_CHARS), BAD_TITLE)?;
    }
    if let Some(content) = content {
        check_text(content, None, BAD_CONTENT)?;
    }
    Ok(())
}

async fn list_posts<DS: Datastore>(
    state: web::Data<State<DS>>,
    _caller: Caller,
    query: web::Query<PostListQuery>,
) -> Fallible<HttpResponse> {
    observe("list_posts", async move {
        let filters = query.into_inner().into_datastore_filters()?;
        let posts = state.ds.list_posts(filters).await?;
        let list = views::post_list(&*state.ds, posts).await?;
        Ok(HttpResponse::Ok().json(list))
    })
    .await
}

async fn create_post<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    body: web::Json<WritePostBody>,
) -> Fallible<HttpResponse> {
    observe("create_post", async move {
        let ds = &*state.ds;
        let user = policy::authenticate(ds, &caller).await?;
        let body = body.into_inner();
        check_post_fields(Some(&body.title), Some(&body.content))?;
        let hashtags = resolve_hashtags(ds, body.hashtags).await?;
        let new_post = NewPost {
            author_id: user.id,
            title: body.title,
            content: body.content,
        };
        let post = ds.new_post(new_post, hashtags.clone()).await?;
        info!(post_id = post.id, author_id = user.id, "post created");
        Ok(HttpResponse::Created().json(views::post_view(post, hashtags)))
    })
    .await
}

async fn get_post<DS: Datastore>(
    state: web::Data<State<DS>>,
    _caller: Caller,
    post_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("get_post", async move {
        let ds = &*state.ds;
        let post = ds.find_post(*post_id).await?.or_not_found(POST_NOT_FOUND)?;
        Ok(HttpResponse::Ok().json(views::post_detail(ds, post).await?))
    })
    .await
}

async fn update_post<DS: Datastore>(
    state: &State<DS>,
    caller: Caller,
    post_id: i32,
    body: PatchPostBody,
) -> Fallible<HttpResponse> {
    let ds = &*state.ds;
    let user = policy::authenticate(ds, &caller).await?;
    let post = ds.find_post(post_id).await?.or_not_found(POST_NOT_FOUND)?;
    policy::require_owner(&user, &post)?;
    check_post_fields(body.title.as_deref(), body.content.as_deref())?;
    let hashtags = match body.hashtags {
        Some(ids) => Some(resolve_hashtags(ds, ids).await?),
        None => None,
    };
    let changes = PostChanges {
        title: body.title,
        content: body.content,
    };
    let post = ds
        .update_post(post_id, changes, hashtags)
        .await?
        .or_not_found(POST_NOT_FOUND)?;
    let hashtags = ds
        .post_hashtags(vec![post.id])
        .await?
        .into_iter()
        .map(|(_, hashtag)| hashtag.id)
        .collect();
    Ok(HttpResponse::Ok().json(views::post_view(post, hashtags)))
}

async fn replace_post<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    post_id: web::Path<i32>,
    body: web::Json<WritePostBody>,
) -> Fallible<HttpResponse> {
    observe(
        "replace_post",
        update_post(state.get_ref(), caller, *post_id, body.into_inner().into()),
    )
    .await
}

async fn patch_post<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    post_id: web::Path<i32>,
    body: web::Json<PatchPostBody>,
) -> Fallible<HttpResponse> {
    observe(
        "patch_post",
        update_post(state.get_ref(), caller, *post_id, body.into_inner()),
    )
    .await
}

async fn delete_post<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    post_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("delete_post", async move {
        let ds = &*state.ds;
        let user = policy::authenticate(ds, &caller).await?;
        let post = ds.find_post(*post_id).await?.or_not_found(POST_NOT_FOUND)?;
        policy::require_owner(&user, &post)?;
        ds.delete_post(post.id).await?.or_not_found(POST_NOT_FOUND)?;
        info!(post_id = post.id, "post deleted");
        Ok(HttpResponse::NoContent().finish())
    })
    .await
}

async fn like_post<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    post_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("like_post", async move {
        let ds = &*state.ds;
        let user = policy::authenticate(ds, &caller).await?;
        let post = ds.find_post(*post_id).await?.or_not_found(POST_NOT_FOUND)?;
        graph::like(ds, &state.edges, &post, user.id).await?;
        Ok(HttpResponse::Ok().json(views::post_detail(ds, post).await?))
    })
    .await
}

async fn unlike_post<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    post_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("unlike_post", async move {
        let ds = &*state.ds;
        let user = policy::authenticate(ds, &caller).await?;
        let post = ds.find_post(*post_id).await?.or_not_found(POST_NOT_FOUND)?;
        graph::unlike(ds, &post, user.id).await?;
        Ok(HttpResponse::Ok().json(views::post_detail(ds, post).await?))
    })
    .await
}

async fn upload_image<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    post_id: web::Path<i32>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Fallible<HttpResponse> {
    observe("upload_post_image", async move {
        let ds = &*state.ds;
        let user = policy::authenticate(ds, &caller).await?;
        let post = ds.find_post(*post_id).await?.or_not_found(POST_NOT_FOUND)?;
        policy::require_owner(&user, &post)?;
        let image = state
            .media
            .save_image(Kind::Post, &post.title, &query.filename, body)
            .await?;
        let post = ds
            .set_post_image(post.id, image)
            .await?
            .or_not_found(POST_NOT_FOUND)?;
        Ok(HttpResponse::Ok().json(views::ImageView {
            id: post.id,
            image: post.image,
        }))
    })
    .await
}
