use std::path::Path;

use chrono::{Duration, Local};
use interfaces::{
    CollaboratorError, ContentSource, InMemoryContentSource, InMemoryPublishTarget, LocalMediaFetcher, MediaFetcher,
    PublishTarget, Result, SubmissionKind,
};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_content_source_lifecycle() -> Result<()> {
    let source = InMemoryContentSource::new()
        .with_collection("empty")
        .with_item("n,n,Hi", "https://x/p/1/", &["https://cdn/1.jpg"], Some("hello #tag"), "alice")
        .with_item("n,n,Hi", "https://x/p/2/", &["https://cdn/2.jpg"], None, "bob");

    assert_eq!(source.list_collections().await?, vec!["empty", "n,n,Hi"]);
    assert_eq!(source.list_items("n,n,Hi").await?, vec!["https://x/p/1/", "https://x/p/2/"]);
    assert_eq!(source.get_media_urls("https://x/p/1/").await?, vec!["https://cdn/1.jpg"]);
    assert_eq!(source.get_caption("https://x/p/1/").await?, Some("hello #tag".to_string()));
    assert_eq!(source.get_caption("https://x/p/2/").await?, None);
    assert_eq!(source.get_author("https://x/p/2/").await?, "bob");

    assert_err!(source.delete_collection("n,n,Hi").await);
    source.unsave("https://x/p/1/").await?;
    source.like("https://x/p/1/").await?;
    assert!(!source.is_saved("https://x/p/1/").await);
    assert!(source.is_liked("https://x/p/1/").await);

    source.unsave("https://x/p/2/").await?;
    assert_ok!(source.delete_collection("n,n,Hi").await);
    assert_eq!(source.collection_names().await, vec!["empty"]);
    assert!(matches!(
        source.delete_collection("n,n,Hi").await,
        Err(CollaboratorError::ElementNotFound { .. })
    ));

    let calls = source.calls().await;
    assert_eq!(calls.first().map(String::as_str), Some("list_collections"));
    assert!(calls.contains(&"unsave:https://x/p/2/".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_content_source_failures() -> Result<()> {
    let source = InMemoryContentSource::new()
        .with_item("c", "https://x/p/gone/", &["u"], None, "a")
        .with_unavailable_item("https://x/p/gone/")
        .with_item("c", "https://x/p/stuck/", &["u"], None, "a")
        .with_failing_unsave("https://x/p/stuck/");

    assert!(matches!(
        source.get_media_urls("https://x/p/gone/").await,
        Err(CollaboratorError::ItemUnavailable { .. })
    ));
    assert!(matches!(
        source.get_author("https://x/p/never-saved/").await,
        Err(CollaboratorError::ItemUnavailable { .. })
    ));
    assert!(matches!(
        source.unsave("https://x/p/stuck/").await,
        Err(CollaboratorError::Driver(_))
    ));
    assert!(source.is_saved("https://x/p/stuck/").await);
    assert!(matches!(
        source.list_items("nope").await,
        Err(CollaboratorError::ElementNotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_publish_target_records_submissions() -> Result<()> {
    let now = Local::now();
    let target = InMemoryPublishTarget::new()
        .with_existing_posts(vec![now + Duration::days(2), now + Duration::days(1)])
        .failing_next(1);
    let dir = tempfile::tempdir()?;
    tokio::fs::write(dir.path().join("1.jpg"), b"b").await?;
    tokio::fs::write(dir.path().join("0.jpg"), b"a").await?;

    assert!(matches!(
        target.schedule_post(now, dir.path(), "first").await,
        Err(CollaboratorError::Submission(_))
    ));
    target.schedule_post(now + Duration::days(3), dir.path(), "second").await?;
    target.schedule_story(now + Duration::hours(5), dir.path()).await?;
    assert_eq!(target.attempts(), 3);

    let submissions = target.submissions().await;
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].kind, SubmissionKind::Post { caption: "second".to_string() });
    assert_eq!(submissions[0].media_files, vec!["0.jpg", "1.jpg"]);
    assert_eq!(submissions[1].kind, SubmissionKind::Story);

    assert_eq!(
        target.list_scheduled_post_times().await?,
        vec![now + Duration::days(1), now + Duration::days(2), now + Duration::days(3)]
    );
    assert_eq!(target.list_scheduled_story_times().await?, vec![now + Duration::hours(5)]);
    Ok(())
}

#[tokio::test]
async fn test_local_media_fetcher() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let urls = vec!["https://cdn/a.jpg".to_string(), "https://cdn/b.mp4".to_string()];

    LocalMediaFetcher::new().fetch_all(&urls, dir.path()).await?;
    assert!(dir.path().join("0.media").exists());
    assert_eq!(tokio::fs::read_to_string(dir.path().join("1.media")).await?, "https://cdn/b.mp4");

    let failing = LocalMediaFetcher::new().with_unfetchable("https://cdn/b.mp4");
    let other: &Path = &dir.path().join("nested");
    tokio::fs::create_dir(other).await?;
    assert!(matches!(
        failing.fetch_all(&urls, other).await,
        Err(CollaboratorError::Media { .. })
    ));
    Ok(())
}
