use crate::types::MediaFetchConfig;
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use interfaces::{CollaboratorError, MediaFetcher};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

/// Crop window keeping the frame between 16:9 landscape and 4:5 portrait.
pub const CROP_FILTER: &str = "crop=w='min(iw,ih*16/9)':h='min(ih,iw*5/4)'";

#[derive(Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

/// Classify a media URL and name its local file: `<index>.mp4` or `<index>.jpg`.
pub fn media_file_name(index: usize, media_url: &str) -> interfaces::Result<(MediaKind, String)> {
    let parsed = Url::parse(media_url).map_err(|e| CollaboratorError::Media {
        url: media_url.to_string(),
        reason: format!("invalid URL: {}", e),
    })?;
    let is_video = Path::new(parsed.path())
        .extension()
        .is_some_and(|ext| ext == "mp4");

    if is_video {
        Ok((MediaKind::Video, format!("{}.mp4", index)))
    } else {
        Ok((MediaKind::Photo, format!("{}.jpg", index)))
    }
}

/// Extra loops needed for a clip of `duration` seconds to last at least `min_seconds`.
pub fn extra_loops(duration: f64, min_seconds: f64) -> u32 {
    if duration <= 0.0 || !duration.is_finite() {
        return 0;
    }
    ((min_seconds / duration).ceil() as u32).saturating_sub(1)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoProbe {
    pub duration: f64,
    pub has_audio: bool,
}

/// Read duration and audio presence out of `ffprobe -of json` output.
pub fn parse_probe(json: &str) -> interfaces::Result<VideoProbe> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| CollaboratorError::General(format!("unreadable ffprobe output: {}", e)))?;

    let duration = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .and_then(|s| s.duration.as_deref())
        .or_else(|| probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| CollaboratorError::General("ffprobe reported no duration".to_string()))?;
    let has_audio = probe.streams.iter().any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoProbe { duration, has_audio })
}

/// Downloads photos over HTTP and transcodes videos with ffmpeg.
pub struct HttpMediaFetcher {
    client: Client,
    config: MediaFetchConfig,
}

impl HttpMediaFetcher {
    pub fn new(config: MediaFetchConfig) -> interfaces::Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .map_err(|e| CollaboratorError::General(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn download_photo(&self, url: &str, out_path: &Path) -> interfaces::Result<()> {
        info!("Downloading photo ({})", url);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error = String::from("no attempt made");
        for attempt in 0..=self.config.max_retries {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => match response.bytes().await {
                    Ok(bytes) => {
                        tokio::fs::write(out_path, &bytes).await?;
                        info!("Successfully downloaded photo ({})", out_path.display());
                        return Ok(());
                    }
                    Err(e) => last_error = e.to_string(),
                },
                Ok(response) => {
                    let status = response.status();
                    last_error = format!("HTTP {}: {}", status, status.canonical_reason().unwrap_or("Unknown"));
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            break;
        }

        Err(CollaboratorError::Media {
            url: url.to_string(),
            reason: last_error,
        })
    }

    async fn probe_video(&self, url: &str) -> interfaces::Result<VideoProbe> {
        let output = Command::new(&self.config.ffprobe_path)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams", url])
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(CollaboratorError::Media {
                url: url.to_string(),
                reason: format!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr).trim()),
            });
        }
        parse_probe(&String::from_utf8_lossy(&output.stdout))
    }

    async fn download_video(&self, url: &str, out_path: &Path) -> interfaces::Result<()> {
        info!("Downloading video ({})", url);
        let probe = self.probe_video(url).await?;
        let loops = extra_loops(probe.duration, self.config.min_video_seconds);
        debug!("Video {} lasts {:.2}s, looping {} extra times", url, probe.duration, loops);

        let mut command = Command::new(&self.config.ffmpeg_path);
        command
            .args(["-y", "-v", "error", "-stream_loop"])
            .arg(loops.to_string())
            .args(["-i", url, "-map", "0:v:0"]);
        if probe.has_audio {
            command.args(["-map", "0:a:0"]);
        }
        let output = command
            .args(["-vf", CROP_FILTER])
            .arg(out_path)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(CollaboratorError::Media {
                url: url.to_string(),
                reason: format!("ffmpeg failed: {}", String::from_utf8_lossy(&output.stderr).trim()),
            });
        }
        info!("Successfully downloaded video ({})", out_path.display());
        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch_all(&self, urls: &[String], dest_dir: &Path) -> interfaces::Result<()> {
        for (index, url) in urls.iter().enumerate() {
            let (kind, file_name) = media_file_name(index, url)?;
            let out_path: PathBuf = dest_dir.join(file_name);
            match kind {
                MediaKind::Video => self.download_video(url, &out_path).await?,
                MediaKind::Photo => self.download_photo(url, &out_path).await?,
            }
        }
        Ok(())
    }
}
