//! Capture session tests against scripted media devices

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use smart_memo::application::ports::PlatformErrorName;
use smart_memo::application::{CaptureConfig, CaptureSession};
use smart_memo::domain::error::CaptureError;
use smart_memo::domain::recording;
use smart_memo::domain::session::CaptureState;

use common::{MockMedia, MockState};

fn session_with(media: MockMedia) -> (Arc<CaptureSession<MockMedia>>, Arc<MockMedia>, Arc<MockState>) {
    let state = media.state();
    let media = Arc::new(media);
    let config = CaptureConfig {
        flush_timeout: recording::Duration::from_secs(2),
        ..Default::default()
    };
    let session = Arc::new(CaptureSession::new(Arc::clone(&media), config));
    (session, media, state)
}

async fn wait_for_state(rx: &mut watch::Receiver<CaptureState>, want: CaptureState) {
    tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|s| *s == want))
        .await
        .expect("state not reached in time")
        .expect("state channel closed");
}

#[tokio::test(start_paused = true)]
async fn records_six_chunks_then_stops() {
    let (session, media, state) = session_with(MockMedia::new());

    session.start().await.unwrap();
    assert_eq!(session.state(), CaptureState::Recording);

    let mut expected = Vec::new();
    for i in 0..6u8 {
        sleep(Duration::from_secs(1)).await;
        let chunk = vec![i; 4];
        media.emit_chunk(&chunk);
        expected.extend_from_slice(&chunk);
    }

    let artifact = session.stop().await.unwrap();

    assert_eq!(artifact.data(), expected.as_slice());
    assert_eq!(artifact.size_bytes(), 24);
    assert!(artifact.duration() >= Duration::from_secs(6));
    assert!(artifact.duration() < Duration::from_secs(7));
    assert_eq!(artifact.mime_type(), recording::AudioMimeType::OggOpus);
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn final_chunk_is_appended() {
    let mut media = MockMedia::new();
    media.final_chunk = b"tail".to_vec();
    let (session, media, _) = session_with(media);

    session.start().await.unwrap();
    media.emit_chunk(b"head");
    let artifact = session.stop().await.unwrap();

    assert_eq!(artifact.data(), b"headtail");
}

#[tokio::test]
async fn recording_uses_processing_constraints() {
    let (session, _, state) = session_with(MockMedia::new());

    session.start().await.unwrap();

    let constraints = state.last_constraints.lock().unwrap().clone().unwrap();
    assert!(constraints.processing.any_enabled());
    assert_eq!(constraints.sample_rate, Some(session.config().sample_rate));
    session.reset();
}

#[tokio::test]
async fn second_start_is_rejected() {
    let (session, _, state) = session_with(MockMedia::new());

    session.start().await.unwrap();
    let opened = state.opened.load(Ordering::SeqCst);

    let err = session.start().await.unwrap_err();

    assert!(matches!(err, CaptureError::InvalidStateTransition(_)));
    assert_eq!(state.opened.load(Ordering::SeqCst), opened);
    assert_eq!(state.recorders_started.load(Ordering::SeqCst), 1);
    assert_eq!(session.state(), CaptureState::Recording);

    session.reset();
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn stop_without_chunks_is_no_audio() {
    let (session, _, state) = session_with(MockMedia::new());

    session.start().await.unwrap();
    let err = session.stop().await.unwrap_err();

    assert_eq!(err, CaptureError::NoAudioCaptured);
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn stop_when_idle_is_rejected() {
    let (session, _, _) = session_with(MockMedia::new());

    let err = session.stop().await.unwrap_err();

    assert!(matches!(err, CaptureError::InvalidStateTransition(_)));
    assert_eq!(session.state(), CaptureState::Idle);
}

#[tokio::test]
async fn reset_is_idempotent() {
    let (session, _, state) = session_with(MockMedia::new());

    session.reset();
    session.reset();
    assert_eq!(session.state(), CaptureState::Idle);

    session.start().await.unwrap();
    session.reset();
    session.reset();
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn permission_denied_start_holds_nothing() {
    let (session, _, state) =
        session_with(MockMedia::new().with_open_error(PlatformErrorName::NotAllowed, "denied"));

    let err = session.start().await.unwrap_err();

    assert_eq!(err, CaptureError::PermissionDenied);
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(state.live_streams(), 0);
    let status = session.microphone_status().unwrap();
    assert!(!status.has_permission);
}

#[tokio::test]
async fn no_device_start_fails() {
    let (session, _, state) = session_with(MockMedia::new().with_devices(Vec::new()));

    assert_eq!(session.start().await.unwrap_err(), CaptureError::NoDevice);
    assert_eq!(state.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn overconstrained_recording_open() {
    let (session, _, state) = session_with(
        MockMedia::new().with_recording_open_error(PlatformErrorName::Overconstrained, "sampleRate"),
    );

    let err = session.start().await.unwrap_err();

    assert_eq!(err, CaptureError::ConstraintsUnsatisfiable("sampleRate".to_string()));
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn recorder_failure_releases_stream() {
    let mut media = MockMedia::new();
    media.recorder_error = Some(smart_memo::application::ports::PlatformError::new(
        PlatformErrorName::NotSupported,
        "no encoder",
    ));
    let (session, _, state) = session_with(media);

    let err = session.start().await.unwrap_err();

    assert_eq!(err, CaptureError::Unsupported);
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(state.opened.load(Ordering::SeqCst), 2);
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn disabled_track_fails_start() {
    let mut media = MockMedia::new();
    media.disabled_tracks = true;
    let (session, _, state) = session_with(media);

    let err = session.start().await.unwrap_err();

    assert!(matches!(err, CaptureError::DeviceUnreadable(_)));
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn track_loss_releases_and_surfaces_on_stop() {
    let (session, media, state) = session_with(MockMedia::new());
    let mut rx = session.subscribe();

    session.start().await.unwrap();
    media.emit_chunk(b"partial");
    media.kill_track();

    wait_for_state(&mut rx, CaptureState::Idle).await;
    assert_eq!(state.live_streams(), 0);

    let err = session.stop().await.unwrap_err();
    assert_eq!(err, CaptureError::DeviceUnreadable("audio track ended".to_string()));

    // Reported once; afterwards the session is simply idle
    assert!(matches!(
        session.stop().await.unwrap_err(),
        CaptureError::InvalidStateTransition(_)
    ));
}

#[tokio::test]
async fn track_loss_fails_pending_stop() {
    let mut media = MockMedia::new();
    media.finalize_on_stop = false;
    let (session, media, state) = session_with(media);
    let mut rx = session.subscribe();

    session.start().await.unwrap();
    media.emit_chunk(b"partial");

    let stopping = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.stop().await })
    };
    wait_for_state(&mut rx, CaptureState::Stopping).await;
    media.kill_track();

    let err = stopping.await.unwrap().unwrap_err();
    assert_eq!(err, CaptureError::DeviceUnreadable("audio track ended".to_string()));
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(state.live_streams(), 0);
    assert!(session.take_pending_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_times_out_without_final_chunk() {
    let mut media = MockMedia::new();
    media.finalize_on_stop = false;
    let (session, media, state) = session_with(media);

    session.start().await.unwrap();
    media.emit_chunk(b"data");

    let err = session.stop().await.unwrap_err();

    assert!(matches!(err, CaptureError::DeviceUnreadable(ref m) if m.contains("Timed out")));
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn reset_while_acquiring_cancels_start() {
    let mut media = MockMedia::new();
    media.open_delay = Some(Duration::from_secs(1));
    let (session, _, state) = session_with(media);
    let mut rx = session.subscribe();

    let starting = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.start().await })
    };
    wait_for_state(&mut rx, CaptureState::Acquiring).await;
    session.reset();

    let err = starting.await.unwrap().unwrap_err();
    assert_eq!(err, CaptureError::Cancelled);
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(state.live_streams(), 0);
    assert_eq!(state.recorders_started.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_while_acquiring_is_rejected() {
    let mut media = MockMedia::new();
    media.open_delay = Some(Duration::from_secs(1));
    let (session, _, state) = session_with(media);
    let mut rx = session.subscribe();

    let starting = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.start().await })
    };
    wait_for_state(&mut rx, CaptureState::Acquiring).await;

    let err = session.stop().await.unwrap_err();
    assert!(matches!(err, CaptureError::InvalidStateTransition(_)));
    assert_eq!(session.state(), CaptureState::Acquiring);

    // The rejected stop leaves the pending start untouched
    starting.await.unwrap().unwrap();
    assert_eq!(session.state(), CaptureState::Recording);
    assert_eq!(state.live_streams(), 1);

    session.reset();
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn reset_while_stopping_cancels_stop() {
    let mut media = MockMedia::new();
    media.finalize_on_stop = false;
    let (session, _, state) = session_with(media);
    let mut rx = session.subscribe();

    session.start().await.unwrap();
    let stopping = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.stop().await })
    };
    wait_for_state(&mut rx, CaptureState::Stopping).await;
    session.reset();

    assert_eq!(stopping.await.unwrap().unwrap_err(), CaptureError::Cancelled);
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn restart_after_failure_starts_clean() {
    let (session, media, state) = session_with(MockMedia::new());
    let mut rx = session.subscribe();

    session.start().await.unwrap();
    media.emit_chunk(b"old");
    media.kill_track();
    wait_for_state(&mut rx, CaptureState::Idle).await;

    session.start().await.unwrap();
    media.emit_chunk(b"new");
    let artifact = session.stop().await.unwrap();

    assert_eq!(artifact.data(), b"new");
    assert_eq!(state.live_streams(), 0);
}

#[tokio::test]
async fn state_changes_are_published() {
    let (session, _, _) = session_with(MockMedia::new());
    let mut rx = session.subscribe();
    assert_eq!(*rx.borrow(), CaptureState::Idle);

    session.start().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), CaptureState::Recording);

    session.reset();
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), CaptureState::Idle);
}
