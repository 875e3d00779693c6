//! Fetch the supplier parts dump over HTTP

use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result};

fn http_client(url: &str) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("pcbzip/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| CatalogError::Download {
            url: url.to_string(),
            source,
        })
}

/// A reader wrapper that reports bytes read so far
struct ProgressReader<R, F> {
    inner: R,
    downloaded: u64,
    total_size: Option<u64>,
    on_progress: F,
}

impl<R: io::Read, F: FnMut(u64, Option<u64>)> io::Read for ProgressReader<R, F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes_read = self.inner.read(buf)?;
        self.downloaded += bytes_read as u64;
        (self.on_progress)(self.downloaded, self.total_size);
        Ok(bytes_read)
    }
}

/// Download the dump at `url` to `dest_path`.
///
/// The body is streamed to `<dest>.tmp` and renamed into place once complete,
/// so an interrupted download never replaces a previous dump.
pub fn download_dump<F>(url: &str, dest_path: &Path, on_progress: F) -> Result<PathBuf>
where
    F: FnMut(u64, Option<u64>),
{
    let download_err = |source| CatalogError::Download {
        url: url.to_string(),
        source,
    };

    if let Some(parent) = dest_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    log::debug!("Downloading parts dump from {url}");
    let response = http_client(url)?
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let total_size = response.content_length();

    let temp_path = dest_path.with_extension("csv.tmp");
    let mut file = File::create(&temp_path)?;
    let mut reader = ProgressReader {
        inner: response,
        downloaded: 0,
        total_size,
        on_progress,
    };

    let copied = io::copy(&mut reader, &mut file).and_then(|n| file.flush().map(|_| n));
    drop(file);
    let copied = match copied {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
    };

    fs::rename(&temp_path, dest_path)?;
    log::info!("Downloaded {copied} bytes to {}", dest_path.display());
    Ok(dest_path.to_path_buf())
}
