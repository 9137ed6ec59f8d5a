use engine_core::config::ReclaimPolicy;
use engine_tests::{config, init_tracing, scene_loader};
use engine_viewer::viewer::{AssetViewer, ViewerState};
use tokio::sync::mpsc;

/// Smoke test: viewer can run a few ticks without panicking.
#[tokio::test]
async fn viewer_runs_few_ticks() -> anyhow::Result<()> {
    let mut viewer =
        AssetViewer::with_loader(config(ReclaimPolicy::SameTick), Box::new(scene_loader()))?;
    viewer.run_for_ticks(3).await?;
    assert_eq!(viewer.tick(), 3);
    Ok(())
}

/// Console lines arriving over the channel drive loads, releases and quit.
#[tokio::test]
async fn console_session_ends_without_leaks() -> anyhow::Result<()> {
    init_tracing();

    let mut viewer =
        AssetViewer::with_loader(config(ReclaimPolicy::NextTick), Box::new(scene_loader()))?;
    let (tx, rx) = mpsc::channel::<String>(32);
    viewer.set_console_input(rx);

    tx.send("load level.bmh".into()).await?;
    tx.send("load detail.btx".into()).await?;
    viewer.run_for_ticks(2).await?;
    assert_eq!(viewer.cache().len(), 6);

    let status = viewer.exec_console("status")?;
    assert!(status.iter().any(|l| l.contains("level.bmh: mesh 3 vertices, 2 sub-meshes")));

    tx.send("release level.bmh".into()).await?;
    viewer.run_for_ticks(8).await?;
    assert_eq!(viewer.cache().len(), 1);
    assert!(viewer.cache().find_by_name("detail.btx").is_some());

    tx.send("quit".into()).await?;
    viewer.run_for_ticks(5).await?;
    assert_eq!(viewer.state(), ViewerState::Quitting);

    let report = viewer.shutdown();
    assert!(report.is_clean(), "leaks: {:?}", report.leaked);
    Ok(())
}
