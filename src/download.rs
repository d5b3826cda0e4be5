use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::CONTENT_LENGTH;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::client::{AccessToken, Client};
use crate::error::http_error;
use crate::product::Product;
use crate::util::{part_path, product_download_url};

impl Client {
    /// Downloads a single product by catalogue UUID into `target`.
    pub fn download_by_id(&self, id: &str, target: &Path) -> Result<PathBuf> {
        let token = self.access_token()?;
        let url = product_download_url(&self.download_url, id);
        self.fetch_to_file(&url, &token, target, None)
    }

    /// Downloads `product` into `out_dir` as `<name>.zip`.
    pub fn download(&self, product: &Product, out_dir: &Path) -> Result<PathBuf> {
        let token = self.access_token()?;
        self.download_with_token(product, out_dir, &token)
    }

    /// Downloads every product sequentially, stopping at the first failure.
    ///
    /// The access token is reused across products and renewed shortly before it expires.
    /// Files written before a failure are left in place.
    pub fn download_all(&self, products: &[Product], out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut token: Option<AccessToken> = None;
        let mut written = Vec::with_capacity(products.len());
        for (i, product) in products.iter().enumerate() {
            let current = match token.take() {
                Some(t) if !t.needs_renewal() => t,
                previous => {
                    if previous.is_some() {
                        debug!("access token about to expire, renewing");
                    }
                    self.request_token()?
                }
            };
            debug!(index = i + 1, total = products.len(), name = %product.name, "downloading");
            let path = self
                .download_with_token(product, out_dir, &current.value)
                .with_context(|| format!("failed to download {}", product.name))?;
            written.push(path);
            token = Some(current);
        }
        Ok(written)
    }

    fn download_with_token(&self, product: &Product, out_dir: &Path, token: &str) -> Result<PathBuf> {
        let target = out_dir.join(product.file_name());
        self.fetch_to_file(&product.download_url, token, &target, product.content_length)
    }

    fn fetch_to_file(
        &self,
        url: &str,
        token: &str,
        target: &Path,
        expected_len: Option<u64>,
    ) -> Result<PathBuf> {
        let mut resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .with_context(|| format!("could not connect to {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(http_error(status, url, &text).into());
        }

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }

        let total = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .or(expected_len);

        let pb = if self.progress {
            let pb = ProgressBar::new(total.unwrap_or(0));
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} {msg} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            if let Some(name) = target.file_name() {
                pb.set_message(name.to_string_lossy().into_owned());
            }
            Some(pb)
        } else {
            None
        };

        let part = part_path(target);
        let result = stream_into(&mut resp, &part, pb.as_ref());
        let written = match result {
            Ok(n) => n,
            Err(e) => {
                if part.exists() {
                    warn!(path = %part.display(), "removing partial download");
                    std::fs::remove_file(&part).ok();
                }
                if let Some(pb) = &pb {
                    pb.abandon();
                }
                return Err(e);
            }
        };

        std::fs::rename(&part, target)
            .with_context(|| format!("failed to move download into {}", target.display()))?;
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        info!(path = %target.display(), bytes = written, "download complete");
        Ok(target.to_path_buf())
    }
}

fn stream_into(resp: &mut impl Read, path: &Path, pb: Option<&ProgressBar>) -> Result<u64> {
    let mut out =
        File::create(path).with_context(|| format!("failed to open {}", path.display()))?;

    let mut written: u64 = 0;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = resp.read(&mut buf).context("download interrupted")?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])
            .with_context(|| format!("failed to write {}", path.display()))?;
        written += n as u64;
        if let Some(pb) = pb {
            pb.inc(n as u64);
        }
    }
    out.flush()?;
    Ok(written)
}
