//! HttpUploadGateway - multipart POST による 1 回のアップロード
//!
//! 1 リクエストに `file` パート 1 つ（ファイル名はタスク名）を固定の
//! endpoint に送る。HTTP 2xx なら成功、それ以外はすべて失敗。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::domain::UploadTask;
use crate::ports::UploadGateway;

const FILE_FIELD: &str = "file";
const IMAGE_MIME: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
enum UploadFault {
    #[error("task has no local uri")]
    MissingUri,

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct HttpUploadGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploadGateway {
    /// `timeout` はリクエスト全体の上限で、アップロードにかかる唯一の時間制限
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn send(&self, task: &UploadTask) -> Result<reqwest::StatusCode, UploadFault> {
        if task.uri().is_empty() {
            return Err(UploadFault::MissingUri);
        }
        let path = task.uri().strip_prefix("file://").unwrap_or(task.uri());
        let bytes = tokio::fs::read(path).await.map_err(|e| UploadFault::Read {
            path: path.to_string(),
            source: e,
        })?;

        let part = Part::bytes(bytes)
            .file_name(task.name().to_string())
            .mime_str(IMAGE_MIME)?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;
        Ok(response.status())
    }
}

#[async_trait]
impl UploadGateway for HttpUploadGateway {
    async fn upload(&self, task: &UploadTask) -> bool {
        match self.send(task).await {
            Ok(status) if status.is_success() => {
                debug!(task_id = %task.id(), %status, "upload succeeded");
                true
            }
            Ok(status) => {
                warn!(task_id = %task.id(), %status, "upload rejected");
                false
            }
            Err(e) => {
                warn!(task_id = %task.id(), error = %e, "upload error");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImportedResource, TaskId};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// 接続を 1 つ受け、リクエストを読み切って `status` で答える
    async fn one_shot_server(status: u16) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }

            let reply = format!("HTTP/1.1 {status} X\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            stream.write_all(reply.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });

        (format!("http://{addr}/upload"), rx)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let head = text[..head_end].to_ascii_lowercase();
        let body_len = buf.len() - (head_end + 4);
        if let Some(line) = head.lines().find(|l| l.starts_with("content-length:")) {
            let expected: usize = line["content-length:".len()..].trim().parse().unwrap_or(0);
            return body_len >= expected;
        }
        text.ends_with("0\r\n\r\n")
    }

    fn task_for(path: &std::path::Path) -> UploadTask {
        UploadTask::new(
            TaskId::from_raw("task-1"),
            ImportedResource::new("photo.jpg", path.to_string_lossy()),
        )
    }

    #[tokio::test]
    async fn success_status_is_true_and_sends_file_part() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("photo.jpg");
        std::fs::write(&file, b"fake-jpeg").unwrap();

        let (url, request) = one_shot_server(200).await;
        let gateway = HttpUploadGateway::new(url, Duration::from_secs(5)).unwrap();

        assert!(gateway.upload(&task_for(&file)).await);

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /upload"));
        assert!(request.contains("name=\"file\""));
        assert!(request.contains("filename=\"photo.jpg\""));
        assert!(request.contains("image/jpeg"));
        assert!(request.contains("fake-jpeg"));
    }

    #[tokio::test]
    async fn server_error_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("photo.jpg");
        std::fs::write(&file, b"fake-jpeg").unwrap();

        let (url, _request) = one_shot_server(500).await;
        let gateway = HttpUploadGateway::new(url, Duration::from_secs(5)).unwrap();

        assert!(!gateway.upload(&task_for(&file)).await);
    }

    #[tokio::test]
    async fn missing_file_is_false_without_network() {
        let gateway =
            HttpUploadGateway::new("http://127.0.0.1:9/upload", Duration::from_secs(1)).unwrap();
        let task = task_for(std::path::Path::new("/no/such/photo.jpg"));
        assert!(!gateway.upload(&task).await);
    }

    #[tokio::test]
    async fn empty_uri_is_false() {
        let gateway =
            HttpUploadGateway::new("http://127.0.0.1:9/upload", Duration::from_secs(1)).unwrap();
        let task = UploadTask::new(TaskId::from_raw("t"), ImportedResource::new("x.jpg", ""));
        assert!(!gateway.upload(&task).await);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("photo.jpg");
        std::fs::write(&file, b"fake-jpeg").unwrap();

        // bind then drop to get a port nobody listens on
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let gateway = HttpUploadGateway::new(
            format!("http://127.0.0.1:{port}/upload"),
            Duration::from_secs(2),
        )
        .unwrap();

        assert!(!gateway.upload(&task_for(&file)).await);
    }
}
