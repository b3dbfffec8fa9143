use super::*;
use crate::config::PenareiaConfig;
use std::sync::Arc;

fn test_config(db_path: &std::path::Path) -> PenareiaConfig {
    let ini = format!(
        r#"
[VIDEO]
SOURCE = 0
BUFFER_SECONDS = 30
SAVE_SECONDS = 10

[WEBHOOK]
URL = https://example.com/hook

[BACKBLAZE_B2]
KEY_ID = real_key
APPLICATION_KEY = real_secret
BUCKET_NAME = penareia-clips

[SERVER]
HOST = 127.0.0.1
PORT = 5000

[VIDEO_ENCODING]
CODEC = libx264
AUDIO_CODEC = aac
PRESET = veryfast
CRF = 23
PIXEL_FORMAT = yuv420p
"#
    );
    let mut config = PenareiaConfig::load_from_file({
        let tmp = db_path.with_extension("ini");
        std::fs::write(&tmp, ini).unwrap();
        tmp
    })
    .unwrap();
    config.video.source = "0".to_string();
    config
}

#[test]
fn test_component_state_default_is_none() {
    let states: std::collections::HashMap<String, ComponentState> = std::collections::HashMap::new();
    assert_eq!(states.get("capture"), None);
}

#[tokio::test]
async fn test_component_state_management() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("queue"));
    let orchestrator = Orchestrator::new_with_journal_path(config, dir.path().join("queue.db")).unwrap();

    orchestrator.set_component_state("capture", ComponentState::Starting).await;
    assert_eq!(orchestrator.get_component_state("capture").await, Some(ComponentState::Starting));

    orchestrator.set_component_state("capture", ComponentState::Running).await;
    assert_eq!(orchestrator.get_component_state("capture").await, Some(ComponentState::Running));

    orchestrator.set_component_state("upload", ComponentState::Failed).await;

    let all = orchestrator.get_all_component_states().await;
    assert_eq!(all.len(), 2);
    assert_eq!(all.get("capture"), Some(&ComponentState::Running));
    assert_eq!(all.get("upload"), Some(&ComponentState::Failed));
}

#[tokio::test]
async fn test_concurrent_component_state_access() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("queue"));
    let orchestrator = Arc::new(Orchestrator::new_with_journal_path(config, dir.path().join("queue.db")).unwrap());

    let mut handles = Vec::new();
    for i in 0..10 {
        let orchestrator = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            let name = format!("component_{i}");
            orchestrator.set_component_state(&name, ComponentState::Running).await;
            orchestrator.get_component_state(&name).await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Some(ComponentState::Running));
    }

    let all = orchestrator.get_all_component_states().await;
    assert_eq!(all.len(), 10);
}

#[test]
fn test_shutdown_reason_debug_formatting() {
    let reasons = vec![
        ShutdownReason::Signal("SIGTERM".to_string()),
        ShutdownReason::Error("critical failure".to_string()),
        ShutdownReason::UserRequest,
        ShutdownReason::Stall,
    ];

    for reason in reasons {
        let debug_str = format!("{:?}", reason);
        assert!(!debug_str.is_empty());
    }
}

#[tokio::test]
async fn test_initialize_recovers_journal_and_sets_initial_states() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("queue"));
    let mut orchestrator = Orchestrator::new_with_journal_path(config, dir.path().join("queue.db")).unwrap();

    orchestrator.initialize().await.unwrap();

    let states = orchestrator.get_all_component_states().await;
    assert_eq!(states.get("capture"), Some(&ComponentState::Stopped));
    assert_eq!(states.get("upload"), Some(&ComponentState::Stopped));
    assert_eq!(states.get("supervisor"), Some(&ComponentState::Stopped));
    assert_eq!(states.get("http"), Some(&ComponentState::Stopped));
}
