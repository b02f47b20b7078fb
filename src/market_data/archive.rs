// =============================================================================
// CFTC History Archives — yearly TFF zips unpacked into the data cache
// =============================================================================
//
// The CFTC publishes one `fut_fin_txt_<year>.zip` per year, each holding a
// single comma separated report.  The report is unpacked to
// `<data_dir>/fin_fut_txt_<year>.txt`, which `cftc::load_cftc_history` reads.
//
// Cache policy:
//   - a past year is final once published, so a cached copy is reused
//   - the current year gains a row every week and is always re-downloaded;
//     a failed refresh keeps the stale copy
//   - the text file is replaced atomically (write `.tmp`, then rename)
// =============================================================================

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Public directory holding the yearly TFF archives.
pub const CFTC_HISTORY_URL: &str = "https://www.cftc.gov/files/dea/history";

/// Cached report text for `year`.
pub fn cache_path(data_dir: &Path, year: i32) -> PathBuf {
    data_dir.join(format!("fin_fut_txt_{year}.txt"))
}

/// Whether `year` has to be fetched given what is already cached.
pub fn needs_download(cached: bool, year: i32, current_year: i32) -> bool {
    !cached || year >= current_year
}

/// How one year's report ended up in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStatus {
    /// Past year already cached; nothing fetched.
    Cached,
    Downloaded,
    /// Refresh failed; the previous copy is still in place.
    Stale,
    /// Not cached and the download failed.
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearSync {
    pub year: i32,
    pub status: ArchiveStatus,
}

/// Pull the first `.txt` entry out of a TFF zip archive.
pub fn extract_report(archive: &[u8]) -> Result<String> {
    let mut reader =
        zip::ZipArchive::new(Cursor::new(archive)).context("CFTC archive is not a valid zip")?;

    for i in 0..reader.len() {
        let mut entry = reader
            .by_index(i)
            .with_context(|| format!("failed to open zip entry {i}"))?;
        let name = entry.name().to_string();
        if !name.to_ascii_lowercase().ends_with(".txt") {
            continue;
        }
        let mut raw = Vec::new();
        entry
            .read_to_end(&mut raw)
            .with_context(|| format!("failed to inflate {name}"))?;
        debug!(entry = %name, bytes = raw.len(), "TFF report extracted");
        return Ok(String::from_utf8_lossy(&raw).into_owned());
    }

    anyhow::bail!("CFTC archive holds no .txt report")
}

/// Downloads the yearly archives into the data cache.
#[derive(Clone)]
pub struct CftcArchiveClient {
    base_url: String,
    client: reqwest::Client,
}

impl CftcArchiveClient {
    /// Create a client against the public CFTC history directory.
    pub fn new() -> Result<Self> {
        Self::with_base_url(CFTC_HISTORY_URL)
    }

    /// Create a client against `base_url` (tests, mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("failed to build reqwest client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "CftcArchiveClient initialised");

        Ok(Self { base_url, client })
    }

    pub fn archive_url(&self, year: i32) -> String {
        format!("{}/fut_fin_txt_{year}.zip", self.base_url)
    }

    /// Make sure `<data_dir>/fin_fut_txt_<year>.txt` is present and, for the
    /// current year, fresh.
    #[instrument(skip(self, data_dir), name = "cftc::fetch_year")]
    pub async fn fetch_year(
        &self,
        data_dir: &Path,
        year: i32,
        current_year: i32,
    ) -> Result<ArchiveStatus> {
        let path = cache_path(data_dir, year);
        let cached = tokio::fs::try_exists(&path).await.unwrap_or(false);

        if !needs_download(cached, year, current_year) {
            debug!(path = %path.display(), "TFF report cached");
            return Ok(ArchiveStatus::Cached);
        }

        match self.refresh(&path, year).await {
            Ok(()) => {
                info!(path = %path.display(), "TFF report downloaded");
                Ok(ArchiveStatus::Downloaded)
            }
            Err(e) if cached => {
                warn!(
                    path = %path.display(),
                    error = %format!("{e:#}"),
                    "TFF refresh failed, keeping cached copy"
                );
                Ok(ArchiveStatus::Stale)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch every year in `start_year..=end_year`.  Failures are logged and
    /// reported per year; the caller decides whether what is cached suffices.
    pub async fn sync_years(
        &self,
        data_dir: &Path,
        start_year: i32,
        end_year: i32,
        current_year: i32,
    ) -> Vec<YearSync> {
        if let Err(e) = tokio::fs::create_dir_all(data_dir).await {
            warn!(dir = %data_dir.display(), error = %e, "failed to create data dir");
        }

        let mut out = Vec::new();
        for year in start_year..=end_year {
            let status = match self.fetch_year(data_dir, year, current_year).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(year, error = %format!("{e:#}"), "TFF archive unavailable");
                    ArchiveStatus::Unavailable
                }
            };
            out.push(YearSync { year, status });
        }
        out
    }

    async fn refresh(&self, path: &Path, year: i32) -> Result<()> {
        let url = self.archive_url(year);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read body of {url}"))?;

        let content = tokio::task::spawn_blocking(move || extract_report(&body))
            .await
            .context("zip extraction task panicked")??;

        let tmp_path = path.with_extension("txt.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("failed to rename into {}", path.display()))?;
        Ok(())
    }
}
