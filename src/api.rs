use crate::datastore::{Datastore, HashtagStore};
use crate::graph::EdgeRules;
use crate::media::MediaStore;
use crate::metrics;
use crate::twoface::{ExternalError, Fallible, TfError};
use actix_web::web;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

pub mod auth;
mod comments;
mod hashtags;
mod posts;
mod users;
pub mod views;

pub const INVALID_HASHTAG: ExternalError = ExternalError::invalid_field("Invalid hashtag id");

/// Shared by every handler.
#[derive(Clone)]
pub struct State<DS> {
    pub ds: Arc<DS>,
    pub edges: EdgeRules,
    pub media: MediaStore,
}

pub fn configure<DS: Datastore>(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/users").configure(users::configure::<DS>))
        .service(web::scope("/posts").configure(posts::configure::<DS>))
        .service(web::scope("/comments").configure(comments::configure::<DS>))
        .service(web::scope("/hashtags").configure(hashtags::configure::<DS>));
}

/// Await the handler body, then log its operational metrics, e.g. time taken, whether it returned Ok/Err, etc.
async fn observe<Fut, R>(name: &'static str, f: Fut) -> Fallible<R>
where
    Fut: Future<Output = Fallible<R>>,
{
    let start = Instant::now();
    let return_val = f.await;
    let duration = start.elapsed();
    metrics::HANDLER_SECS
        .with_label_values(&[name])
        .observe(duration.as_secs_f64());
    metrics::RESPONSES
        .with_label_values(&[name, variant_name(&return_val)])
        .inc();
    return_val
}

fn variant_name<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "err"
    }
}

/// Reject blank strings and strings longer than `max_chars` (if given).
fn check_text(value: &str, max_chars: Option<usize>, external: ExternalError) -> Fallible<()> {
    let too_long = max_chars.map_or(false, |max| value.chars().count() > max);
    if value.trim().is_empty() || too_long {
        return Err(TfError::new(
            format!("rejected field value {:?}", value),
            external,
        ));
    }
    Ok(())
}

/// Deduplicate hashtag ids and check they all exist.
async fn resolve_hashtags<DS: HashtagStore>(ds: &DS, mut ids: Vec<i32>) -> Fallible<Vec<i32>> {
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(ids);
    }
    let found = ds.hashtags_by_id(ids.clone()).await?;
    if found.len() != ids.len() {
        return Err(TfError::new(
            format!("some of hashtags {:?} don't exist", ids),
            INVALID_HASHTAG,
        ));
    }
    Ok(ids)
}
