//! Staleness markers as seen by independent cache handles.

use anyhow::Result;
use godeps_cache::cache::paths::SlotKey;
use godeps_cache::cache::staleness::Verdict;
use godeps_cache::config::CacheSettings;
use godeps_cache::core::{CacheError, Dependency};
use std::time::Duration;

use crate::common::TestHost;

fn corrupt_marker(host: &TestHost, import_path: &str) -> Result<()> {
    let slot = SlotKey::for_package(import_path)?;
    let path = host.cache().paths().marker_path(&slot);
    std::fs::create_dir_all(path.parent().unwrap())?;
    std::fs::write(path, "{ not json")?;
    Ok(())
}

#[tokio::test]
async fn test_marker_survives_new_handle() -> Result<()> {
    let host = TestHost::new()?;
    let dep = Dependency::new("github.com/x/y", "v1.0");

    let writer = host.cache();
    writer.ensure_cache_root_ready().await?;
    writer.record_up_to_date(&dep).await?;

    let reader = host.cache();
    assert!(!reader.is_out_of_date(&dep).await?);
    assert!(reader.is_out_of_date(&dep.with_fingerprint("v2.0")).await?);
    Ok(())
}

#[tokio::test]
async fn test_fetch_then_record_workflow() -> Result<()> {
    let host = TestHost::new()?;
    let cache = host.cache();
    cache.ensure_cache_root_ready().await?;
    let mut fetches = 0;

    for fingerprint in ["v1.0", "v1.0", "v2.0", "v2.0"] {
        let dep = Dependency::new("github.com/x/y", fingerprint);
        let dir = cache.resolve_package_path(dep.import_path())?;
        let fetched = cache
            .run_with_lock(&dep, || async {
                if !cache.current_dependency_is_out_of_date().await? {
                    return Ok(false);
                }
                tokio::fs::create_dir_all(&dir).await?;
                tokio::fs::write(dir.join("VERSION"), fingerprint).await?;
                cache.update_current_dependency_lock().await?;
                Ok(true)
            })
            .await?;
        if fetched {
            fetches += 1;
        }
    }

    assert_eq!(fetches, 2);
    let dir = cache.resolve_package_path("github.com/x/y")?;
    assert_eq!(std::fs::read_to_string(dir.join("VERSION"))?, "v2.0");
    Ok(())
}

#[tokio::test]
async fn test_ttl_expiry_and_offline() -> Result<()> {
    let host = TestHost::new()?;
    let dep = Dependency::new("github.com/x/y", "master");
    host.cache().record_up_to_date(&dep).await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let expiring = host.cache_with(&CacheSettings {
        cache_ttl_secs: Some(0),
        ..CacheSettings::default()
    });
    assert_eq!(expiring.verdict(&dep).await?, Verdict::Expired);

    let offline = host.cache_with(&CacheSettings {
        cache_ttl_secs: Some(0),
        offline: true,
        ..CacheSettings::default()
    });
    assert_eq!(offline.verdict(&dep).await?, Verdict::UpToDate);

    let generous = host.cache_with(&CacheSettings {
        cache_ttl_secs: Some(3600),
        ..CacheSettings::default()
    });
    assert!(!generous.is_out_of_date(&dep).await?);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_marker_is_a_hard_error_by_default() -> Result<()> {
    let host = TestHost::new()?;
    corrupt_marker(&host, "github.com/x/y")?;

    let err = host
        .cache()
        .is_out_of_date(&Dependency::new("github.com/x/y", "v1"))
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<CacheError>(), Some(CacheError::StalenessCheck { .. })));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_marker_degrades_when_configured() -> Result<()> {
    let host = TestHost::new()?;
    corrupt_marker(&host, "github.com/x/y")?;
    let cache = host.cache_with(&CacheSettings {
        assume_stale_on_marker_error: true,
        ..CacheSettings::default()
    });
    let dep = Dependency::new("github.com/x/y", "v1");

    assert_eq!(cache.verdict(&dep).await?, Verdict::MarkerUnreadable);

    // Recording replaces the corrupt marker
    cache.record_up_to_date(&dep).await?;
    assert_eq!(cache.verdict(&dep).await?, Verdict::UpToDate);
    Ok(())
}

#[tokio::test]
async fn test_refresh_forced_beats_matching_marker() -> Result<()> {
    let host = TestHost::new()?;
    let dep = Dependency::new("github.com/x/y", "v1");
    host.cache().record_up_to_date(&dep).await?;

    let forced = host.cache_with(&CacheSettings {
        refresh_dependencies: true,
        ..CacheSettings::default()
    });
    assert_eq!(forced.verdict(&dep).await?, Verdict::RefreshForced);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_recorders_leave_a_valid_marker() -> Result<()> {
    let host = TestHost::new()?;
    let cache = host.cache();

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let cache = host.cache();
            tokio::spawn(async move {
                cache.record_up_to_date(&Dependency::new("github.com/x/y", format!("v{i}"))).await
            })
        })
        .collect();
    for task in tasks {
        task.await??;
    }

    let marker = cache.marker("github.com/x/y").await?.expect("marker written");
    assert!(marker.fingerprint.starts_with('v'));
    assert!(!cache.is_out_of_date(&Dependency::new("github.com/x/y", marker.fingerprint)).await?);
    Ok(())
}

#[tokio::test]
async fn test_case_variants_keep_separate_markers_and_directories() -> Result<()> {
    let host = TestHost::new()?;
    let cache = host.cache();
    let upper = Dependency::new("github.com/Sirupsen/logrus", "v1.0.0");
    let lower = Dependency::new("github.com/sirupsen/logrus", "v1.4.0");

    cache.record_up_to_date(&upper).await?;
    assert!(cache.is_out_of_date(&lower).await?);
    cache.record_up_to_date(&lower).await?;
    assert!(!cache.is_out_of_date(&upper).await?);

    let upper_dir = cache.resolve_package_path(upper.import_path())?;
    let lower_dir = cache.resolve_package_path(lower.import_path())?;
    std::fs::create_dir_all(&upper_dir)?;
    std::fs::create_dir_all(&lower_dir)?;
    std::fs::write(upper_dir.join("VERSION"), "v1.0.0")?;
    std::fs::write(lower_dir.join("VERSION"), "v1.4.0")?;
    assert_eq!(std::fs::read_to_string(upper_dir.join("VERSION"))?, "v1.0.0");
    Ok(())
}
