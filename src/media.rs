//! Uploaded images live on disk under `media_root`, at
//! `uploads/<kind>/<slug>/<slug>-<uuid>.<ext>`. Only the relative path goes into the database.
use crate::twoface::{BlockingResp, ExternalError, Fallible, TfError};
use actix_web::web::block;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub const NOT_AN_IMAGE: ExternalError =
    ExternalError::invalid_field("Upload a valid image (jpg, jpeg, png, gif or webp)");
pub const EMPTY_IMAGE: ExternalError = ExternalError::invalid_field("The submitted file is empty");

/// What an image is attached to. Decides the directory it lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Post,
    Comment,
}

impl Kind {
    fn dir(self) -> &'static str {
        match self {
            Kind::Post => "posts",
            Kind::Comment => "comments",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

/// Lowercase ASCII letters and digits, with runs of anything else collapsed to one `-`.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("image");
    }
    slug
}

fn extension(filename: &str) -> Fallible<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(TfError::new(
            format!("rejected upload named {:?}", filename),
            NOT_AN_IMAGE,
        )),
    }
}

/// Where an image for `label` should be stored, relative to the media root.
pub fn image_path(kind: Kind, label: &str, filename: &str) -> Fallible<PathBuf> {
    let ext = extension(filename)?;
    let slug = slugify(label);
    Ok(PathBuf::from("uploads")
        .join(kind.dir())
        .join(&slug)
        .join(format!("{}-{}.{}", slug, Uuid::new_v4(), ext)))
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write the image and return its path relative to the media root.
    pub async fn save_image(
        &self,
        kind: Kind,
        label: &str,
        filename: &str,
        body: Bytes,
    ) -> Fallible<String> {
        if body.is_empty() {
            return Err(TfError::new("empty upload", EMPTY_IMAGE));
        }
        let relative = image_path(kind, label, filename)?;
        let absolute = self.root.join(&relative);
        block(move || -> std::io::Result<()> {
            if let Some(dir) = absolute.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&absolute, &body)
        })
        .await
        .to_resp()?;
        let relative = relative.to_string_lossy().into_owned();
        info!(path = %relative, "image stored");
        Ok(relative)
    }
}
