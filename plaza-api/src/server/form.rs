//! Multipart bodies of the profile and post uploads.

use crate::{media::MediaUpload, server::ServerError};
use axum::extract::{Multipart, multipart::MultipartRejection};
use plaza_common::model::media::{ImageExtension, MediaCategory};
use std::collections::HashMap;
use tracing::debug;

/// Name of the form field carrying the image.
const FILE_FIELD: &str = "file";

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct UploadForm {
    texts: HashMap<String, String>,
    file: Option<FilePart>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
struct FilePart {
    file_name: String,
    content: Vec<u8>,
}

impl UploadForm {
    /// Reads all fields. Text fields other than `text_fields` are skipped.
    pub async fn read(
        multipart: Result<Multipart, MultipartRejection>,
        text_fields: &[&str],
    ) -> Result<Self, ServerError> {
        let mut multipart = multipart?;
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == FILE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content = field.bytes().await?.to_vec();
                // Browsers send an empty part when no file was picked.
                if !(file_name.is_empty() && content.is_empty()) {
                    form.file = Some(FilePart { file_name, content });
                }
            } else if text_fields.contains(&name.as_str()) {
                let text = field.text().await?;
                form.texts.insert(name, text);
            } else {
                debug!(field = %name, "Skipping unexpected form field");
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }

    /// The uploaded image, if any, checked for an accepted extension.
    pub fn image(self, category: MediaCategory) -> Result<Option<MediaUpload>, ServerError> {
        self.file
            .map(|file| -> Result<MediaUpload, ServerError> {
                let extension = ImageExtension::from_file_name(&file.file_name)?;
                Ok(MediaUpload {
                    category,
                    extension,
                    content: file.content,
                })
            })
            .transpose()
    }
}
