//! The `action` form every admin page POSTs.
//!
//! Pages submit either `application/x-www-form-urlencoded` or, when files are
//! attached, `multipart/form-data`. Both land in an [`ActionForm`].

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    Form,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use bytes::Bytes;
use chrono::NaiveDate;

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct ActionForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

/// `images[]` and `images` name the same list.
fn field_key(name: &str) -> String {
    name.trim_end_matches("[]").to_string()
}

impl<S> FromRequest<S> for ActionForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::validation(e.body_text()))?;
            return Ok(Self {
                fields,
                files: HashMap::new(),
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;

        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?
        {
            let Some(name) = field.name().map(field_key) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::validation(e.body_text()))?;
                    // browsers send empty parts for untouched file inputs
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.entry(name).or_default().push(UploadedFile {
                        file_name,
                        content_type,
                        data,
                    });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::validation(e.body_text()))?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }
}

impl ActionForm {
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, name: &str, file: UploadedFile) -> Self {
        self.files.entry(field_key(name)).or_default().push(file);
        self
    }

    pub fn action(&self) -> &str {
        self.fields.get("action").map(|s| s.trim()).unwrap_or("")
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn owned(&self, key: &str) -> Option<String> {
        self.text(key).map(str::to_string)
    }

    pub fn required(&self, key: &str, label: &str) -> Result<&str, ApiError> {
        self.text(key)
            .ok_or_else(|| ApiError::validation(format!("{label} is required")))
    }

    pub fn id(&self, key: &str) -> Result<i64, ApiError> {
        self.text(key)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| ApiError::validation(format!("Invalid {}", key.replace('_', " "))))
    }

    /// Parse a closed-set value. Absent means `None`; present but unknown is an error.
    pub fn choice<T>(&self, key: &str) -> Result<Option<T>, ApiError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.text(key)
            .map(|v| v.parse::<T>().map_err(|e| ApiError::validation(e.to_string())))
            .transpose()
    }

    pub fn required_choice<T>(&self, key: &str, label: &str) -> Result<T, ApiError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.choice(key)?
            .ok_or_else(|| ApiError::validation(format!("{label} is required")))
    }

    pub fn number(&self, key: &str) -> Result<Option<i64>, ApiError> {
        self.text(key)
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| ApiError::validation(format!("Invalid {}", key.replace('_', " "))))
            })
            .transpose()
    }

    pub fn date(&self, key: &str, label: &str) -> Result<NaiveDate, ApiError> {
        let raw = self.required(key, label)?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::validation(format!("{label} must be a YYYY-MM-DD date")))
    }

    /// Checkbox-style flag: `1`, `true`, `on` or `yes`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.text(key).map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "true" | "on" | "yes")
        )
    }

    /// A JSON array of strings, e.g. `remove_images`.
    pub fn json_list(&self, key: &str) -> Result<Vec<String>, ApiError> {
        match self.text(key) {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|_| ApiError::validation(format!("Invalid {}", key.replace('_', " ")))),
        }
    }

    pub fn files(&self, key: &str) -> &[UploadedFile] {
        self.files.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn file(&self, key: &str) -> Option<&UploadedFile> {
        self.files(key).first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodshare_types::enums::DonationStatus;

    fn form() -> ActionForm {
        ActionForm::from_fields([
            ("action", " update_status "),
            ("donation_id", "12"),
            ("status", "claimed"),
            ("bad_status", "eaten"),
            ("title", "   "),
            ("remove_images", "[\"uploads/announcements/a.png\"]"),
            ("is_pinned", "on"),
        ])
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let f = form();
        assert_eq!(f.action(), "update_status");
        assert_eq!(f.text("title"), None);
        assert_eq!(f.required("title", "Title").unwrap_err().to_string(), "Title is required");
    }

    #[test]
    fn ids_and_choices_parse() {
        let f = form();
        assert_eq!(f.id("donation_id").unwrap(), 12);
        assert_eq!(f.id("missing_id").unwrap_err().to_string(), "Invalid missing id");
        assert_eq!(
            f.choice::<DonationStatus>("status").unwrap(),
            Some(DonationStatus::Claimed)
        );
        assert!(f.choice::<DonationStatus>("bad_status").is_err());
        assert_eq!(f.choice::<DonationStatus>("nothing").unwrap(), None);
    }

    #[test]
    fn json_lists_and_flags() {
        let f = form();
        assert_eq!(f.json_list("remove_images").unwrap().len(), 1);
        assert!(f.json_list("nothing").unwrap().is_empty());
        assert!(f.flag("is_pinned"));
        assert!(!f.flag("featured"));
    }

    #[test]
    fn bracketed_file_names_share_a_key() {
        let file = UploadedFile {
            file_name: "a.png".into(),
            content_type: None,
            data: Bytes::from_static(b"png"),
        };
        let f = ActionForm::default()
            .with_file("images[]", file.clone())
            .with_file("images", file);
        assert_eq!(f.files("images").len(), 2);
        assert!(f.file("attachments").is_none());
    }
}
