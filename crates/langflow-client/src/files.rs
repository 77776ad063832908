//! File uploads and the v2 files API

use bytes::Bytes;
use langflow_api_contract::{FlowFileUpload, UserFile};
use reqwest::header::{HeaderValue, ACCEPT};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::client::LangflowClient;
use crate::error::{LangflowResult, TransportError};
use crate::request::RequestDescriptor;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// In-memory file ready to be sent as a multipart upload
#[derive(Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FilePayload {
    /// Create a payload with the default content type
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk; the upload name is the path's final component
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(Self::new(file_name, bytes))
    }

    /// Override the default `application/octet-stream`
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl std::fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePayload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Files helper, borrowed from a [`LangflowClient`]
#[derive(Debug, Clone, Copy)]
pub struct Files<'a> {
    client: &'a LangflowClient,
}

impl<'a> Files<'a> {
    pub(crate) fn new(client: &'a LangflowClient) -> Self {
        Self { client }
    }

    /// Upload a file to the user's file store (`POST /v2/files`)
    pub async fn upload(
        &self,
        file: FilePayload,
        cancellation: Option<CancellationToken>,
    ) -> LangflowResult<UserFile> {
        let descriptor = upload_descriptor(RequestDescriptor::post("/v2/files"), file, cancellation);
        self.client.request_as(descriptor).await
    }

    /// Upload a file scoped to one flow (`POST /v1/files/upload/{flow_id}`)
    pub async fn upload_for_flow(
        &self,
        flow_id: &str,
        file: FilePayload,
        cancellation: Option<CancellationToken>,
    ) -> LangflowResult<FlowFileUpload> {
        let descriptor = upload_descriptor(
            RequestDescriptor::post("/v1/files/upload").with_path_segment(flow_id),
            file,
            cancellation,
        );
        self.client.request_as(descriptor).await
    }

    /// List the user's files (`GET /v2/files`)
    pub async fn list(&self, cancellation: Option<CancellationToken>) -> LangflowResult<Vec<UserFile>> {
        let descriptor = RequestDescriptor::get("/v2/files")
            .with_header(ACCEPT, HeaderValue::from_static("application/json"))
            .with_optional_cancellation(cancellation);
        self.client.request_as(descriptor).await
    }

    /// Delete a file by id (`DELETE /v2/files/{file_id}`)
    pub async fn delete(
        &self,
        file_id: &str,
        cancellation: Option<CancellationToken>,
    ) -> LangflowResult<()> {
        let descriptor = RequestDescriptor::delete("/v2/files")
            .with_path_segment(file_id)
            .with_optional_cancellation(cancellation);
        self.client.request(descriptor).await?;
        Ok(())
    }
}

fn upload_descriptor(
    descriptor: RequestDescriptor,
    file: FilePayload,
    cancellation: Option<CancellationToken>,
) -> RequestDescriptor {
    descriptor
        .with_file(file)
        .with_header(ACCEPT, HeaderValue::from_static("application/json"))
        .with_optional_cancellation(cancellation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBody;

    #[tokio::test]
    async fn test_payload_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let payload = FilePayload::from_path(&path).await.unwrap();
        assert_eq!(payload.file_name, "notes.txt");
        assert_eq!(payload.content_type, "application/octet-stream");
        assert_eq!(payload.bytes, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_missing_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FilePayload::from_path(dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn test_upload_descriptor() {
        let payload = FilePayload::new("a.png", vec![0x89, 0x50]).with_content_type("image/png");
        let descriptor =
            upload_descriptor(RequestDescriptor::post("/v2/files"), payload.clone(), None);

        assert_eq!(descriptor.path(), "/v2/files");
        assert_eq!(descriptor.headers().get(ACCEPT).unwrap(), "application/json");
        match descriptor.body() {
            Some(RequestBody::File(file)) => assert_eq!(*file, payload),
            other => panic!("expected file body, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_omits_contents() {
        let payload = FilePayload::new("secret.txt", "top secret");
        let rendered = format!("{payload:?}");
        assert!(rendered.contains("len: 10"));
        assert!(!rendered.contains("top secret"));
    }
}
