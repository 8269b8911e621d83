// Integration tests for the session controller state machine.

mod common;

use std::sync::Arc;

use common::{audio_only, opening, transcribed, ScriptedApi, ScriptedCapture, ScriptedFactory};
use interview_client::{
    BotAudioSource, SessionController, SessionError, SessionPhase, Speaker, SubmissionApi,
    FALLBACK_ANSWER_TEXT, FALLBACK_PROMPT, OPENING_PROMPT,
};
use tokio::sync::Notify;

fn assert_invalid_phase(result: Result<(), SessionError>) {
    match result {
        Err(SessionError::InvalidPhase { .. }) => {}
        other => panic!("expected InvalidPhase, got {:?}", other),
    }
}

#[tokio::test]
async fn start_installs_the_opening_question() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Ok(opening(b"welcome audio")));
    let (controller, _events) = SessionController::new(api, Arc::new(ScriptedFactory::new()));

    controller.start().await.expect("start succeeds");

    assert_eq!(controller.phase().await, SessionPhase::AwaitingResponse);
    let transcript = controller.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].speaker, Speaker::Bot);
    assert_eq!(transcript[0].content, OPENING_PROMPT);
    match controller.current_audio().await {
        Some(BotAudioSource::Inline { data, .. }) => assert_eq!(data, b"welcome audio"),
        other => panic!("expected inline opening audio, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_start_is_retryable() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Err(SessionError::Network("connection refused".into())));
    api.push_start(Ok(opening(b"welcome")));
    let (controller, _events) = SessionController::new(api, Arc::new(ScriptedFactory::new()));

    let err = controller.start().await.expect_err("first start fails");
    assert!(matches!(err, SessionError::Network(_)));
    assert_eq!(controller.phase().await, SessionPhase::NotStarted);
    assert!(controller.transcript().await.is_empty());

    controller.start().await.expect("second start succeeds");
    assert_eq!(controller.phase().await, SessionPhase::AwaitingResponse);
}

#[tokio::test]
async fn operations_outside_their_guard_phase_are_rejected() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Ok(opening(b"welcome")));
    let (controller, _events) = SessionController::new(api, Arc::new(ScriptedFactory::new()));

    // Nothing but start() is legal before the session opens.
    assert_invalid_phase(controller.begin_recording().await);
    assert_invalid_phase(controller.end_recording().await);
    assert_invalid_phase(controller.retry().await);
    assert_invalid_phase(controller.discard().await);

    controller.start().await.unwrap();

    // And from AwaitingResponse, only begin_recording() is.
    assert_invalid_phase(controller.start().await);
    assert_invalid_phase(controller.end_recording().await);
    assert_invalid_phase(controller.retry().await);
    assert_invalid_phase(controller.discard().await);
}

#[tokio::test]
async fn transcribed_response_completes_a_turn() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Ok(opening(b"welcome")));
    api.push_submit(Ok(transcribed("hello", "u", "next?")));
    let factory = Arc::new(ScriptedFactory::new());
    factory.push(ScriptedCapture::new(vec![b"chunk-a".to_vec(), b"chunk-b".to_vec()]));
    let (controller, _events) = SessionController::new(api, factory);

    controller.start().await.unwrap();
    controller.begin_recording().await.unwrap();
    assert_eq!(controller.phase().await, SessionPhase::Recording);

    controller.end_recording().await.unwrap();
    controller.wait_for_submission().await;

    assert_eq!(controller.phase().await, SessionPhase::AwaitingResponse);
    let transcript = controller.transcript().await;
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1].speaker, Speaker::User);
    assert_eq!(transcript[1].content, "hello");
    assert_eq!(transcript[2].speaker, Speaker::Bot);
    assert_eq!(transcript[2].content, "next?");
    assert_eq!(
        controller.current_audio().await,
        Some(BotAudioSource::Remote("u".to_string()))
    );
}

#[tokio::test]
async fn raw_audio_response_completes_a_turn_with_placeholders() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Ok(opening(b"welcome")));
    api.push_submit(Ok(audio_only(b"next question audio")));
    let factory = Arc::new(ScriptedFactory::new());
    factory.push(ScriptedCapture::new(vec![b"clip".to_vec()]));
    let (controller, _events) = SessionController::new(api, factory);

    controller.start().await.unwrap();
    controller.begin_recording().await.unwrap();
    controller.end_recording().await.unwrap();
    controller.wait_for_submission().await;

    assert_eq!(controller.phase().await, SessionPhase::AwaitingResponse);
    let transcript = controller.transcript().await;
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1].speaker, Speaker::User);
    assert_eq!(transcript[1].content, FALLBACK_ANSWER_TEXT);
    assert_eq!(transcript[2].speaker, Speaker::Bot);
    assert_eq!(transcript[2].content, FALLBACK_PROMPT);
    match controller.current_audio().await {
        Some(BotAudioSource::Inline { data, .. }) => assert_eq!(data, b"next question audio"),
        other => panic!("expected inline audio, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_submission_is_retryable_without_rerecording() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Ok(opening(b"welcome")));
    api.push_submit(Err(SessionError::Network("gateway unreachable".into())));
    api.push_submit(Ok(transcribed("second try", "u2", "go on")));
    let factory = Arc::new(ScriptedFactory::new());
    factory.push(ScriptedCapture::new(vec![b"clip".to_vec()]));
    let api_dyn: Arc<dyn SubmissionApi> = api.clone();
    let (controller, _events) = SessionController::new(api_dyn, factory);

    controller.start().await.unwrap();
    controller.begin_recording().await.unwrap();
    controller.end_recording().await.unwrap();
    controller.wait_for_submission().await;

    // The failed turn left the transcript untouched.
    assert_eq!(controller.phase().await, SessionPhase::Errored);
    assert_eq!(controller.transcript().await.len(), 1);
    assert_eq!(api.submit_calls(), 1);

    controller.retry().await.unwrap();
    controller.wait_for_submission().await;

    assert_eq!(controller.phase().await, SessionPhase::AwaitingResponse);
    let transcript = controller.transcript().await;
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1].content, "second try");
    assert_eq!(api.submit_calls(), 2);
}

#[tokio::test]
async fn discard_abandons_the_failed_answer() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Ok(opening(b"welcome")));
    api.push_submit(Err(SessionError::BadResponse { status: 502 }));
    let factory = Arc::new(ScriptedFactory::new());
    factory.push(ScriptedCapture::new(vec![b"clip".to_vec()]));
    factory.push(ScriptedCapture::new(vec![b"clip two".to_vec()]));
    let (controller, _events) = SessionController::new(api, factory);

    controller.start().await.unwrap();
    controller.begin_recording().await.unwrap();
    controller.end_recording().await.unwrap();
    controller.wait_for_submission().await;
    assert_eq!(controller.phase().await, SessionPhase::Errored);

    controller.discard().await.unwrap();

    assert_eq!(controller.phase().await, SessionPhase::AwaitingResponse);
    let transcript = controller.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].speaker, Speaker::Bot);

    // Re-recording works from here.
    controller.begin_recording().await.unwrap();
    assert_eq!(controller.phase().await, SessionPhase::Recording);
}

#[tokio::test]
async fn empty_capture_is_rejected_and_releases_the_device() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Ok(opening(b"welcome")));
    let factory = Arc::new(ScriptedFactory::new());
    let capture = ScriptedCapture::new(vec![]);
    let stopped = capture.stopped_flag();
    factory.push(capture);
    let api_dyn: Arc<dyn SubmissionApi> = api.clone();
    let (controller, _events) = SessionController::new(api_dyn, factory);

    controller.start().await.unwrap();
    controller.begin_recording().await.unwrap();

    let err = controller.end_recording().await.expect_err("no data buffered");
    assert!(matches!(err, SessionError::EmptyCapture));
    assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));

    assert_eq!(controller.phase().await, SessionPhase::AwaitingResponse);
    assert_eq!(controller.transcript().await.len(), 1);
    assert_eq!(api.submit_calls(), 0);
}

#[tokio::test]
async fn unavailable_device_leaves_the_session_recoverable() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Ok(opening(b"welcome")));
    let factory = Arc::new(ScriptedFactory::new());
    factory.push_err(SessionError::DeviceUnavailable("permission denied".into()));
    let (controller, _events) = SessionController::new(api, factory);

    controller.start().await.unwrap();

    let err = controller.begin_recording().await.expect_err("no device");
    assert!(matches!(err, SessionError::DeviceUnavailable(_)));
    assert_eq!(controller.phase().await, SessionPhase::AwaitingResponse);
}

#[tokio::test]
async fn teardown_mid_submission_makes_the_continuation_a_noop() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::with_gate(Arc::clone(&gate)));
    api.push_start(Ok(opening(b"welcome")));
    api.push_submit(Ok(transcribed("too late", "u", "never shown")));
    let factory = Arc::new(ScriptedFactory::new());
    factory.push(ScriptedCapture::new(vec![b"clip".to_vec()]));
    let (controller, _events) = SessionController::new(api, factory);

    controller.start().await.unwrap();
    controller.begin_recording().await.unwrap();
    controller.end_recording().await.unwrap();
    assert_eq!(controller.phase().await, SessionPhase::Submitting);

    // Recording is not available while a submission is out.
    assert_invalid_phase(controller.begin_recording().await);

    controller.teardown().await;
    assert_eq!(controller.phase().await, SessionPhase::NotStarted);
    assert_eq!(controller.current_audio().await, None);

    // Let the suspended continuation resume; it must not touch anything.
    gate.notify_one();
    controller.wait_for_submission().await;

    assert_eq!(controller.phase().await, SessionPhase::NotStarted);
    assert_eq!(controller.transcript().await.len(), 1);

    // The controller is inert after teardown.
    assert_invalid_phase(controller.start().await);
}

#[tokio::test]
async fn teardown_releases_a_live_recording_device() {
    let api = Arc::new(ScriptedApi::new());
    api.push_start(Ok(opening(b"welcome")));
    let factory = Arc::new(ScriptedFactory::new());
    let capture = ScriptedCapture::new(vec![b"clip".to_vec()]);
    let stopped = capture.stopped_flag();
    factory.push(capture);
    let (controller, _events) = SessionController::new(api, factory);

    controller.start().await.unwrap();
    controller.begin_recording().await.unwrap();

    controller.teardown().await;

    assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
    assert_eq!(controller.phase().await, SessionPhase::NotStarted);
    assert_eq!(controller.current_audio().await, None);
}
