use std::collections::BTreeMap;
use std::io::Cursor;

use async_trait::async_trait;
use google_drive3::{api::File, api::Scope, DriveHub};

use super::media::{MediaAsset, MediaError, MediaStore, MediaUpload};

/// Media store backed by Google Drive. Logical folders ("jobs", "documents") map to Drive
/// folder ids; files in unmapped folders land in the caller's root.
///
/// Not wired into `services/api`, which keeps media in memory. An embedding application
/// authenticates its own `DriveHub`, passes it to [`DriveMediaStore::new`], and maps folders
/// with [`DriveMediaStore::with_folder`] before handing the store to `JobLifecycleService::new`.
pub struct DriveMediaStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
    folders: BTreeMap<String, String>,
}

impl<C> DriveMediaStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>) -> Self {
        Self {
            hub,
            folders: BTreeMap::new(),
        }
    }

    pub fn with_folder(mut self, name: impl Into<String>, folder_id: impl Into<String>) -> Self {
        self.folders.insert(name.into(), folder_id.into());
        self
    }

    fn map_error<E: std::fmt::Display>(err: E) -> MediaError {
        MediaError::Backend(err.to_string())
    }
}

impl<C> std::fmt::Debug for DriveMediaStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveMediaStore")
            .field("folders", &self.folders)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> MediaStore for DriveMediaStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    async fn upload(&self, file: MediaUpload, folder: &str) -> Result<MediaAsset, MediaError> {
        let mime_type: mime::Mime = file
            .content_type
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);

        let metadata = File {
            name: Some(file.file_name.clone()),
            mime_type: Some(mime_type.to_string()),
            parents: self.folders.get(folder).map(|parent| vec![parent.clone()]),
            ..File::default()
        };

        let (_, stored) = self
            .hub
            .files()
            .create(metadata)
            .param("fields", "id,webViewLink")
            .supports_all_drives(true)
            .add_scope(Scope::File)
            .upload(Cursor::new(file.bytes), mime_type)
            .await
            .map_err(Self::map_error)?;

        let handle = stored
            .id
            .ok_or_else(|| MediaError::Backend("drive returned no file id".to_string()))?;
        let url = stored
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{handle}/view"));

        Ok(MediaAsset { url, handle })
    }

    async fn delete(&self, handle: &str) -> Result<(), MediaError> {
        self.hub
            .files()
            .delete(handle)
            .supports_all_drives(true)
            .add_scope(Scope::File)
            .doit()
            .await
            .map_err(Self::map_error)?;
        Ok(())
    }
}
