use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::auth::Credential;
use crate::error::{Error, Result, translate};
use crate::util::{filename_from_disposition, guess_filename_from_url};

/// Streams `location` into `directory`, naming the file after the
/// `Content-Disposition` header, then the URL, then `download`.
pub(crate) async fn download_to(
    http: &reqwest::Client,
    credential: &Credential,
    location: &str,
    directory: &Path,
    progress: bool,
) -> Result<PathBuf> {
    debug!(url = %location, "downloading asset");
    let resp = http
        .get(location)
        .header(AUTHORIZATION, credential.header_value())
        .send()
        .await?;

    let status = resp.status().as_u16();
    if !resp.status().is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(translate(status, &body).unwrap_or(Error::Transport { status, body }));
    }

    let filename = resp
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
        .or_else(|| guess_filename_from_url(location))
        .unwrap_or_else(|| "download".to_string());

    let dir = if directory.as_os_str().is_empty() {
        Path::new(".")
    } else {
        directory
    };
    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join(filename);

    let pb = if progress {
        let pb = match resp.content_length() {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
        ) {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let written = save_stream(resp.bytes_stream(), &target, pb.as_ref()).await;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let written = written?;
    debug!(bytes = written, path = %target.display(), "download finished");
    Ok(target)
}

/// Writes `chunks` to a temporary file next to `target` and renames it into
/// place once the stream has ended. On error the temporary file is removed
/// and `target` is left as it was.
async fn save_stream<S, B, E>(chunks: S, target: &Path, pb: Option<&ProgressBar>) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    let dir = target.parent().unwrap_or(Path::new("."));
    let (file, tmp_path) = tempfile::NamedTempFile::new_in(dir)?.into_parts();
    let mut out = tokio::fs::File::from_std(file);

    let mut chunks = std::pin::pin!(chunks);
    let mut written: u64 = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(Into::<Error>::into)?;
        let chunk = chunk.as_ref();
        out.write_all(chunk).await?;
        written += chunk.len() as u64;
        if let Some(pb) = pb {
            pb.inc(chunk.len() as u64);
        }
    }
    out.flush().await?;
    out.sync_all().await?;
    drop(out);

    tmp_path.persist(target).map_err(|e| Error::Io(e.error))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn chunk(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    #[tokio::test]
    async fn completed_stream_lands_at_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("scene.tif");

        let chunks = stream::iter([chunk(b"Geo"), chunk(b"TIFF")]);
        let written = save_stream(chunks, &target, None).await.unwrap();

        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&target).unwrap(), b"GeoTIFF");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn broken_stream_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("scene.tif");

        let chunks = stream::iter([
            chunk(b"Geo"),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let err = save_stream(chunks, &target, None).await.unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn broken_stream_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("scene.tif");
        std::fs::write(&target, b"old").unwrap();

        let chunks = stream::iter([
            chunk(b"new"),
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof")),
        ]);
        assert!(save_stream(chunks, &target, None).await.is_err());

        assert_eq!(std::fs::read(&target).unwrap(), b"old");
    }
}
