//! Deferred product downloads.
use crate::error::{DownloadError, Error, Result};
use crate::resolve::DownloadDescriptor;
use crate::token;
use bytes::Bytes;
use futures_util::TryStreamExt;
use reqwest::header::RANGE;
use reqwest::{Response, StatusCode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A product that is only downloaded when its contents are asked for.
///
/// Every request resolves its `Authorization` header from the descriptor's token provider at
/// dispatch time, so a resource can be fetched long after it was resolved.
#[derive(Debug, Clone)]
pub struct LazyResource {
    descriptor: DownloadDescriptor,
    http: reqwest::Client,
}

impl LazyResource {
    pub fn new(descriptor: DownloadDescriptor) -> Self {
        let http = descriptor.auth.http().clone();
        Self { descriptor, http }
    }

    pub fn descriptor(self: &Self) -> &DownloadDescriptor {
        &self.descriptor
    }

    /// Fetch the whole payload into memory.
    pub async fn fetch(self: &Self) -> Result<Bytes> {
        let response = self
            .get(None)
            .await?
            .error_for_status()
            .map_err(|e| Error::download(&self.descriptor.url, e))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::download(&self.descriptor.url, e))?;
        self.check_length(body.len() as u64)?;
        Ok(body)
    }

    /// Stream the payload to `output`, returning the size of the file.
    ///
    /// Data goes to `<output>.partial` first and is renamed once complete. A leftover partial
    /// file is resumed with a range request. Nothing is fetched if `output` already exists.
    pub async fn download_to<P: AsRef<Path>>(self: &Self, output: P) -> Result<u64> {
        let dst = output.as_ref();
        if let Ok(metadata) = fs::metadata(dst).await {
            info!(path = %dst.display(), "output file already exists");
            return Ok(metadata.len());
        }

        if let Some(parent_dir) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent_dir).await?;
        }

        let partial = partial_path(dst);
        let mut byte_count = match fs::metadata(&partial).await {
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        };

        let resume_from = (byte_count > 0).then_some(byte_count);
        if let Some(offset) = resume_from {
            let progress = offset as f64 / self.descriptor.content_length.max(1) as f64 * 100.;
            info!(
                product = %self.descriptor.identifier,
                "resuming download from {:.2}% completion", progress.min(100.)
            );
        }

        let response = self.get(resume_from).await?;
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE && byte_count > 0 {
            // The partial file already holds the whole payload
            debug!(product = %self.descriptor.identifier, "nothing left to download");
        } else {
            let response = response
                .error_for_status()
                .map_err(|e| Error::download(&self.descriptor.url, e))?;

            let append = response.status() == StatusCode::PARTIAL_CONTENT;
            if !append {
                byte_count = 0;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(append)
                .truncate(!append)
                .open(&partial)
                .await?;

            info!(product = %self.descriptor.identifier, "downloading");
            let mut body = response.bytes_stream();
            while let Some(bytes) = body
                .try_next()
                .await
                .map_err(|e| Error::download(&self.descriptor.url, e))?
            {
                file.write_all(&bytes).await?;
                byte_count += bytes.len() as u64;
            }
            file.flush().await?;
        }

        self.check_length(byte_count)?;
        fs::rename(&partial, dst).await?;
        info!(product = %self.descriptor.identifier, bytes = byte_count, "download complete");

        Ok(byte_count)
    }

    async fn get(&self, resume_from: Option<u64>) -> Result<Response> {
        let mut request = self.http.get(self.descriptor.url.clone());
        if let Some(offset) = resume_from {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let request = token::authorize(request, self.descriptor.auth.as_ref()).await?;
        debug!(url = %self.descriptor.url, "requesting product");
        request
            .send()
            .await
            .map_err(|e| Error::download(&self.descriptor.url, e))
    }

    fn check_length(&self, received: u64) -> Result<()> {
        let expected = self.descriptor.content_length;
        if self.descriptor.verifies_length() && received != expected {
            return Err(Error::download(
                &self.descriptor.url,
                DownloadError::Length { expected, received },
            ));
        }
        Ok(())
    }
}

fn partial_path(dst: &Path) -> PathBuf {
    let mut name = OsString::from(dst.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("outputs/product.zip")),
            PathBuf::from("outputs/product.zip.partial")
        );
    }
}
