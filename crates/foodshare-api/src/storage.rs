use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::form::UploadedFile;

const MB: usize = 1024 * 1024;

/// Every stored path starts with this segment.
pub const UPLOADS_DIR: &str = "uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCategory {
    ProfilePicture,
    DonationImage,
    AnnouncementImage,
    AnnouncementAttachment,
    ChallengeBanner,
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 5] = [
        UploadCategory::ProfilePicture,
        UploadCategory::DonationImage,
        UploadCategory::AnnouncementImage,
        UploadCategory::AnnouncementAttachment,
        UploadCategory::ChallengeBanner,
    ];

    /// Directory under `uploads/`.
    pub fn dir(self) -> &'static str {
        match self {
            UploadCategory::ProfilePicture => "profiles",
            UploadCategory::DonationImage => "donations",
            UploadCategory::AnnouncementImage => "announcements",
            UploadCategory::AnnouncementAttachment => "announcements/files",
            UploadCategory::ChallengeBanner => "challenges",
        }
    }

    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadCategory::ProfilePicture | UploadCategory::ChallengeBanner => {
                &["jpg", "jpeg", "png", "gif"]
            }
            UploadCategory::DonationImage => &["jpg", "jpeg", "png", "gif", "webp"],
            UploadCategory::AnnouncementImage => &["jpg", "jpeg", "png", "gif", "webp", "svg"],
            UploadCategory::AnnouncementAttachment => &[
                "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "zip", "rar",
            ],
        }
    }

    pub fn max_bytes(self) -> usize {
        match self {
            UploadCategory::ProfilePicture => 2 * MB,
            UploadCategory::AnnouncementAttachment => 20 * MB,
            _ => 5 * MB,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            UploadCategory::ProfilePicture => "profile_",
            UploadCategory::DonationImage => "donation_",
            UploadCategory::AnnouncementImage => "announcement_",
            UploadCategory::AnnouncementAttachment => "attachment_",
            UploadCategory::ChallengeBanner => "challenge_",
        }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid file type for {name}. Allowed types: {allowed}")]
    Extension { name: String, allowed: String },

    #[error("File {name} is too large. Maximum size is {max_mb}MB")]
    TooLarge { name: String, max_mb: usize },

    #[error("File {0} is empty")]
    Empty(String),

    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Relative path recorded in the database, e.g. `uploads/profiles/profile_<uuid>.png`.
    pub path: String,
    pub original_name: String,
    pub size: u64,
    pub extension: String,
}

/// Lowercased extension of `name` if the category accepts it.
pub fn check_file(category: UploadCategory, file: &UploadedFile) -> Result<String, UploadError> {
    let extension = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if !category.allowed_extensions().contains(&extension.as_str()) {
        return Err(UploadError::Extension {
            name: file.file_name.clone(),
            allowed: category.allowed_extensions().join(", "),
        });
    }
    if file.data.is_empty() {
        return Err(UploadError::Empty(file.file_name.clone()));
    }
    if file.data.len() > category.max_bytes() {
        return Err(UploadError::TooLarge {
            name: file.file_name.clone(),
            max_mb: category.max_bytes() / MB,
        });
    }
    Ok(extension)
}

/// Manages uploaded files under `{root}/uploads/<category>/`.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub async fn new(root: PathBuf) -> anyhow::Result<Self> {
        for category in UploadCategory::ALL {
            fs::create_dir_all(root.join(UPLOADS_DIR).join(category.dir())).await?;
        }
        info!("Upload storage directory: {}", root.join(UPLOADS_DIR).display());
        Ok(Self { root })
    }

    /// Directory served at `/uploads`.
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    /// Resolve a stored relative path, refusing anything outside `uploads/`.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let path = Path::new(relative);
        let mut components = path.components();
        if components.next() != Some(Component::Normal(UPLOADS_DIR.as_ref())) {
            return None;
        }
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(path))
    }

    pub async fn save(
        &self,
        category: UploadCategory,
        file: &UploadedFile,
    ) -> Result<StoredFile, UploadError> {
        let extension = check_file(category, file)?;
        let name = format!("{}{}.{}", category.prefix(), Uuid::new_v4(), extension);
        let relative = format!("{}/{}/{}", UPLOADS_DIR, category.dir(), name);
        let path = self.root.join(&relative);

        let mut out = fs::File::create(&path).await?;
        out.write_all(&file.data).await?;
        out.flush().await?;

        info!("Stored upload {} ({} bytes)", relative, file.data.len());
        Ok(StoredFile {
            path: relative,
            original_name: file.file_name.clone(),
            size: file.data.len() as u64,
            extension,
        })
    }

    /// Store a batch. Every file is checked before any is written, and a
    /// failed write removes the files already stored.
    pub async fn save_all(
        &self,
        category: UploadCategory,
        files: &[UploadedFile],
    ) -> Result<Vec<StoredFile>, UploadError> {
        for file in files {
            check_file(category, file)?;
        }
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            match self.save(category, file).await {
                Ok(s) => stored.push(s),
                Err(e) => {
                    self.delete_stored(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal. Failures are logged and reported as `false`.
    pub async fn delete_file(&self, relative: &str) -> bool {
        let Some(path) = self.resolve(relative) else {
            warn!("Refusing to delete path outside uploads: {}", relative);
            return false;
        };
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted upload {}", relative);
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {} already gone", relative);
                false
            }
            Err(e) => {
                warn!("Failed to delete upload {}: {}", relative, e);
                false
            }
        }
    }

    pub async fn delete_all<S: AsRef<str>>(&self, paths: &[S]) {
        for path in paths {
            self.delete_file(path.as_ref()).await;
        }
    }

    pub async fn delete_stored(&self, files: &[StoredFile]) {
        for file in files {
            self.delete_file(&file.path).await;
        }
    }
}
