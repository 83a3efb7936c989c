use ig_mbs_scheduler::fetcher::{extra_loops, media_file_name, parse_probe, MediaKind, VideoProbe, CROP_FILTER};
use ig_mbs_scheduler::{HttpMediaFetcher, MediaFetchConfig};
use interfaces::{CollaboratorError, MediaFetcher, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::info;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Serve `responses` in order, one per connection, and return the base URL.
async fn serve(responses: Vec<(u16, &'static [u8])>) -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 {} X\r\nContent-Length: {}\r\nContent-Type: image/jpeg\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body).await;
            let _ = socket.shutdown().await;
        }
    });

    Ok(format!("http://{}", addr))
}

fn fast_config() -> MediaFetchConfig {
    MediaFetchConfig {
        timeout_seconds: 5,
        retry_delay_seconds: 1,
        ..MediaFetchConfig::default()
    }
}

#[test]
fn test_media_file_names() -> Result<()> {
    assert_eq!(
        media_file_name(0, "https://cdn.example.com/v/clip.mp4?efg=abc&oh=1")?,
        (MediaKind::Video, "0.mp4".to_string())
    );
    assert_eq!(
        media_file_name(3, "https://cdn.example.com/p/photo.jpg?stp=dst")?,
        (MediaKind::Photo, "3.jpg".to_string())
    );
    assert_eq!(
        media_file_name(1, "https://cdn.example.com/p/photo.webp")?,
        (MediaKind::Photo, "1.jpg".to_string())
    );
    assert_eq!(
        media_file_name(2, "https://cdn.example.com/no-extension")?,
        (MediaKind::Photo, "2.jpg".to_string())
    );
    assert!(matches!(media_file_name(0, "not a url"), Err(CollaboratorError::Media { .. })));
    Ok(())
}

#[test]
fn test_extra_loops() {
    assert_eq!(extra_loops(0.4, 1.0), 2);
    assert_eq!(extra_loops(0.5, 1.0), 1);
    assert_eq!(extra_loops(1.0, 1.0), 0);
    assert_eq!(extra_loops(12.3, 1.0), 0);
    assert_eq!(extra_loops(0.0, 1.0), 0);
    assert_eq!(extra_loops(f64::NAN, 1.0), 0);
}

#[test]
fn test_parse_probe() -> Result<()> {
    let with_audio = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "duration": "0.733333"},
            {"index": 1, "codec_type": "audio", "duration": "0.740000"}
        ],
        "format": {"duration": "0.740000"}
    }"#;
    assert_eq!(
        parse_probe(with_audio)?,
        VideoProbe {
            duration: 0.733333,
            has_audio: true
        }
    );

    let silent = r#"{"streams": [{"codec_type": "video"}], "format": {"duration": "4.5"}}"#;
    assert_eq!(
        parse_probe(silent)?,
        VideoProbe {
            duration: 4.5,
            has_audio: false
        }
    );

    assert!(parse_probe(r#"{"streams": []}"#).is_err());
    assert!(parse_probe("not json").is_err());
    Ok(())
}

#[test]
fn test_crop_filter_bounds_aspect_ratio() {
    assert!(CROP_FILTER.contains("ih*16/9"));
    assert!(CROP_FILTER.contains("iw*5/4"));
}

#[tokio::test]
async fn test_photo_download_retries_then_succeeds() -> Result<()> {
    init_tracing();
    let base = serve(vec![(503, &b"busy"[..]), (200, &b"jpeg-bytes"[..])]).await?;
    let fetcher = HttpMediaFetcher::new(fast_config())?;
    let dir = tempfile::tempdir()?;

    let urls = vec![format!("{}/media/photo.jpg", base)];
    fetcher.fetch_all(&urls, dir.path()).await?;

    let written = tokio::fs::read(dir.path().join("0.jpg")).await?;
    info!("Downloaded {} bytes", written.len());
    assert_eq!(written, b"jpeg-bytes");
    Ok(())
}

#[tokio::test]
async fn test_photo_download_gives_up_after_retries() -> Result<()> {
    init_tracing();
    let base = serve(vec![(404, &b""[..]), (404, &b""[..])]).await?;
    let fetcher = HttpMediaFetcher::new(MediaFetchConfig {
        max_retries: 1,
        ..fast_config()
    })?;
    let dir = tempfile::tempdir()?;

    let urls = vec![format!("{}/gone.jpg", base)];
    match fetcher.fetch_all(&urls, dir.path()).await {
        Err(CollaboratorError::Media { url, reason }) => {
            assert_eq!(url, urls[0]);
            assert!(reason.contains("404"), "unexpected reason: {}", reason);
        }
        other => panic!("expected a media error, got {:?}", other),
    }
    assert!(!dir.path().join("0.jpg").exists());
    Ok(())
}

#[tokio::test]
async fn test_video_without_ffprobe_fails() -> Result<()> {
    init_tracing();
    let fetcher = HttpMediaFetcher::new(MediaFetchConfig {
        ffprobe_path: "/nonexistent/ffprobe".to_string(),
        ..fast_config()
    })?;
    let dir = tempfile::tempdir()?;

    let urls = vec!["http://127.0.0.1:9/clip.mp4".to_string()];
    assert!(fetcher.fetch_all(&urls, dir.path()).await.is_err());
    assert!(!dir.path().join("0.mp4").exists());
    Ok(())
}
