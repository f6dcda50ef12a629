use crate::api::{check_text, observe, posts::UploadQuery, views, State};
use crate::datastore::{structs::NewComment, Datastore};
use crate::media::Kind;
use crate::policy::{self, Caller};
use crate::twoface::{ExternalError, Fallible, OrNotFound, TfError};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

const COMMENT_NOT_FOUND: &str = "No comment with that id";

pub const BAD_CONTENT: ExternalError = ExternalError::invalid_field("Content is required");
pub const INVALID_POST: ExternalError = ExternalError::invalid_field("Invalid post id");

pub fn configure<DS: Datastore>(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_comments::<DS>))
        .route("", web::post().to(create_comment::<DS>))
        .route("/{comment_id}", web::get().to(get_comment::<DS>))
        .route("/{comment_id}", web::put().to(replace_comment::<DS>))
        .route("/{comment_id}", web::patch().to(patch_comment::<DS>))
        .route("/{comment_id}", web::delete().to(delete_comment::<DS>))
        .route(
            "/{comment_id}/upload_image",
            web::post().to(upload_image::<DS>),
        );
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WriteCommentBody {
    pub post: i32,
    pub content: String,
}

/// The post a comment belongs to can't change, so only the text is editable.
#[derive(Serialize, Deserialize, Debug)]
pub struct ReplaceCommentBody {
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PatchCommentBody {
    pub content: Option<String>,
}

async fn list_comments<DS: Datastore>(
    state: web::Data<State<DS>>,
    _caller: Caller,
) -> Fallible<HttpResponse> {
    observe("list_comments", async move {
        let comments = state.ds.list_comments().await?;
        let list = views::comment_list(&*state.ds, comments).await?;
        Ok(HttpResponse::Ok().json(list))
    })
    .await
}

async fn create_comment<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    body: web::Json<WriteCommentBody>,
) -> Fallible<HttpResponse> {
    observe("create_comment", async move {
        let ds = &*state.ds;
        let user = policy::authenticate(ds, &caller).await?;
        let body = body.into_inner();
        check_text(&body.content, None, BAD_CONTENT)?;
        guard!(let Some(post) = ds.find_post(body.post).await? else {
            return Err(TfError::new(
                format!("comment on missing post {}", body.post),
                INVALID_POST,
            ));
        });
        let new_comment = NewComment {
            post_id: post.id,
            author_id: user.id,
            content: body.content,
        };
        let comment = ds.new_comment(new_comment).await?;
        info!(comment_id = comment.id, post_id = post.id, "comment created");
        Ok(HttpResponse::Created().json(views::comment_view(comment)))
    })
    .await
}

async fn get_comment<DS: Datastore>(
    state: web::Data<State<DS>>,
    _caller: Caller,
    comment_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("get_comment", async move {
        let ds = &*state.ds;
        let comment = ds
            .find_comment(*comment_id)
            .await?
            .or_not_found(COMMENT_NOT_FOUND)?;
        let post = ds
            .find_post(comment.post_id)
            .await?
            .or_not_found(COMMENT_NOT_FOUND)?;
        Ok(HttpResponse::Ok().json(views::comment_detail(ds, comment, post).await?))
    })
    .await
}

async fn update_comment<DS: Datastore>(
    state: &State<DS>,
    caller: Caller,
    comment_id: i32,
    content: Option<String>,
) -> Fallible<HttpResponse> {
    let ds = &*state.ds;
    let user = policy::authenticate(ds, &caller).await?;
    let comment = ds
        .find_comment(comment_id)
        .await?
        .or_not_found(COMMENT_NOT_FOUND)?;
    policy::require_owner(&user, &comment)?;
    guard!(let Some(content) = content else {
        return Ok(HttpResponse::Ok().json(views::comment_view(comment)));
    });
    check_text(&content, None, BAD_CONTENT)?;
    let comment = ds
        .update_comment(comment_id, content)
        .await?
        .or_not_found(COMMENT_NOT_FOUND)?;
    Ok(HttpResponse::Ok().json(views::comment_view(comment)))
}

async fn replace_comment<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    comment_id: web::Path<i32>,
    body: web::Json<ReplaceCommentBody>,
) -> Fallible<HttpResponse> {
    let content = Some(body.into_inner().content);
    observe(
        "replace_comment",
        update_comment(state.get_ref(), caller, *comment_id, content),
    )
    .await
}

async fn patch_comment<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    comment_id: web::Path<i32>,
    body: web::Json<PatchCommentBody>,
) -> Fallible<HttpResponse> {
    let content = body.into_inner().content;
    observe(
        "patch_comment",
        update_comment(state.get_ref(), caller, *comment_id, content),
    )
    .await
}

async fn delete_comment<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    comment_id: web::Path<i32>,
) -> Fallible<HttpResponse> {
    observe("delete_comment", async move {
        let ds = &*state.ds;
        let user = policy::authenticate(ds, &caller).await?;
        let comment = ds
            .find_comment(*comment_id)
            .await?
            .or_not_found(COMMENT_NOT_FOUND)?;
        policy::require_owner(&user, &comment)?;
        ds.delete_comment(comment.id)
            .await?
            .or_not_found(COMMENT_NOT_FOUND)?;
        Ok(HttpResponse::NoContent().finish())
    })
    .await
}

async fn upload_image<DS: Datastore>(
    state: web::Data<State<DS>>,
    caller: Caller,
    comment_id: web::Path<i32>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Fallible<HttpResponse> {
    observe("upload_comment_image", async move {
        let ds = &*state.ds;
        let user = policy::authenticate(ds, &caller).await?;
        let comment = ds
            .find_comment(*comment_id)
            .await?
            .or_not_found(COMMENT_NOT_FOUND)?;
        policy::require_owner(&user, &comment)?;
        // Comment images are filed under the title of the post they're on.
        let post = ds
            .find_post(comment.post_id)
            .await?
            .or_not_found(COMMENT_NOT_FOUND)?;
        let image = state
            .media
            .save_image(Kind::Comment, &post.title, &query.filename, body)
            .await?;
        let comment = ds
            .set_comment_image(comment.id, image)
            .await?
            .or_not_found(COMMENT_NOT_FOUND)?;
        Ok(HttpResponse::Ok().json(views::ImageView {
            id: comment.id,
            image: comment.image,
        }))
    })
    .await
}
