//! Buffers a `multipart/form-data` submission into text fields and files.

use crate::error::ServiceError;
use actix_multipart::Multipart;
use futures_util::StreamExt;
use std::collections::HashMap;

/// Upper bound for any single part.
pub const MAX_PART_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct SubmittedForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl SubmittedForm {
    /// Reads every part. Parts carrying a file name are kept as files, the
    /// rest must be UTF-8 text. Empty file inputs are dropped.
    pub async fn read(mut payload: Multipart) -> Result<Self, ServiceError> {
        let mut form = SubmittedForm::default();

        while let Some(item) = payload.next().await {
            let mut field = item.map_err(|e| ServiceError::Multipart(e.to_string()))?;
            let (name, file_name) = match field.content_disposition() {
                Some(cd) => (
                    cd.get_name().map(str::to_string),
                    cd.get_filename().map(str::to_string),
                ),
                None => (None, None),
            };
            let Some(name) = name else {
                return Err(ServiceError::Multipart("part without a field name".into()));
            };

            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| ServiceError::Multipart(e.to_string()))?;
                if bytes.len() + chunk.len() > MAX_PART_BYTES {
                    return Err(ServiceError::BadRequest(format!(
                        "field '{}' exceeds {} bytes",
                        name, MAX_PART_BYTES
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }

            match file_name {
                Some(file_name) => {
                    if !file_name.is_empty() && !bytes.is_empty() {
                        form.files.insert(name, UploadedFile { file_name, bytes });
                    }
                }
                None => {
                    let text = String::from_utf8(bytes).map_err(|_| {
                        ServiceError::BadRequest(format!("field '{}' is not valid UTF-8", name))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    #[cfg(test)]
    pub fn from_parts(fields: &[(&str, &str)], files: Vec<(&str, UploadedFile)>) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: files.into_iter().map(|(k, f)| (k.to_string(), f)).collect(),
        }
    }

    /// Trimmed value of a text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<String, ServiceError> {
        self.text(name)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::BadRequest(format!("missing field '{}'", name)))
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}
