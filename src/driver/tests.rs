//! Scenario tests for the polling loop
//!
//! All run on a paused clock, so intervals elapse as soon as every task is
//! idle and timing assertions are exact.

use super::*;
use crate::test_utils::{CloseCounter, MemorySegment, ProducerImage, ScriptedEvent, SegmentWriter};
use crate::types::{FreshnessPolicy, ReadStatus};
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

const INTERVAL: Duration = Duration::from_millis(16);

struct Harness {
    channels: FeedChannels,
    writer: SegmentWriter,
    segment_closes: CloseCounter,
    event_closes: CloseCounter,
}

fn producer() -> ProducerImage {
    ProducerImage::new(4096)
        .buffer_len(16)
        .buffer(7, 1024)
        .variable("RPM", 4, 0, 1)
        .variable("Gear", 2, 4, 1)
        .session_info("WeekendInfo:\n  TrackName: spa\n")
        .session_info_update(1)
        .fill(1024, &[0x11; 16])
}

fn start(image: ProducerImage, config: PollConfig) -> Harness {
    let _ = tracing_subscriber::fmt::try_init();

    let segment = image.into_segment();
    let event = ScriptedEvent::signaled();
    let writer = segment.writer();
    let segment_closes = segment.closes();
    let event_closes = event.closes();

    let channels = PollLoop::new(segment, event, config).expect("valid config").spawn();
    Harness { channels, writer, segment_closes, event_closes }
}

async fn next_frame(channels: &mut FeedChannels) -> Frame {
    timeout(INTERVAL * 20, channels.frames.recv())
        .await
        .expect("frame within 20 intervals")
        .expect("feed open")
}

#[test]
fn control_signal_parses_stop_only() {
    assert_eq!(ControlSignal::from("stop"), ControlSignal::Stop);
    assert_eq!(ControlSignal::from("pause"), ControlSignal::Other("pause".to_string()));
    assert_eq!(ControlSignal::from("STOP".to_string()), ControlSignal::Other("STOP".to_string()));
}

#[tokio::test(start_paused = true)]
async fn emits_a_frame_per_new_tick() {
    let mut harness = start(producer(), PollConfig::new(INTERVAL));

    let first = next_frame(&mut harness.channels).await;
    assert_eq!(first.tick, 7);
    assert_eq!(first.buffer_index, 0);
    assert_eq!(first.session_info_update, 1);
    assert_eq!(first.status, ReadStatus::Clean);
    assert_eq!(&first.data[..], &[0x11; 16]);

    harness.writer.write(1024, &[0x22; 16]);
    harness.writer.set_tick(0, 8);

    let second = next_frame(&mut harness.channels).await;
    assert_eq!(second.tick, 8);
    assert_eq!(&second.data[..], &[0x22; 16]);

    let summary = harness.channels.shutdown().await.expect("summary");
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.stop_reason, Some(StopReason::Requested));
    assert_eq!(summary.ticks, summary.frames + summary.stale_ticks);
}

#[tokio::test(start_paused = true)]
async fn publishes_directory_and_session_info() {
    let mut harness = start(producer(), PollConfig::new(INTERVAL));
    next_frame(&mut harness.channels).await;

    {
        let directory = harness.channels.directory.borrow();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get("Gear").map(|v| v.offset), Some(4));
    }
    {
        let session = harness.channels.session_info.borrow();
        let session = session.as_ref().expect("session info published");
        assert_eq!(session.update, 1);
        assert!(session.yaml.contains("TrackName: spa"));
    }

    harness.channels.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn session_info_follows_the_update_counter() {
    let mut harness = start(producer(), PollConfig::new(INTERVAL));
    next_frame(&mut harness.channels).await;
    harness.channels.session_info.mark_unchanged();

    // Two variable headers sit in front of the session string
    let session_offset =
        crate::test_utils::DEFAULT_VAR_HEADER_OFFSET + 2 * crate::schema::VAR_HEADER_SIZE;
    harness.writer.write(session_offset, b"WeekendInfo:\n  TrackName: mon\n");
    sleep(INTERVAL * 2).await;
    assert!(!harness.channels.session_info.has_changed().unwrap());

    harness.writer.set_session_info_update(2);
    timeout(INTERVAL * 4, harness.channels.session_info.changed()).await.unwrap().unwrap();
    {
        let session = harness.channels.session_info.borrow_and_update();
        let session = session.as_ref().expect("session info");
        assert_eq!(session.update, 2);
        assert!(session.yaml.contains("TrackName: mon"));
    }

    harness.channels.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unchanged_directory_is_not_republished() {
    let mut harness = start(producer(), PollConfig::new(INTERVAL));
    next_frame(&mut harness.channels).await;
    harness.channels.directory.mark_unchanged();

    sleep(INTERVAL * 5).await;
    assert!(!harness.channels.directory.has_changed().unwrap());

    harness.channels.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn always_read_repeats_the_current_tick() {
    let config = PollConfig::new(INTERVAL).with_freshness(FreshnessPolicy::AlwaysRead);
    let mut harness = start(producer(), config);

    for _ in 0..3 {
        assert_eq!(next_frame(&mut harness.channels).await.tick, 7);
    }

    harness.channels.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_transient_and_resets_freshness() {
    let mut harness = start(producer(), PollConfig::new(INTERVAL));
    assert_eq!(next_frame(&mut harness.channels).await.tick, 7);

    harness.writer.set_status(0);
    sleep(INTERVAL * 4).await;
    assert!(harness.channels.frames.try_recv().is_err());

    // Same tick again after reconnect is new data for the new session
    harness.writer.set_status(1);
    assert_eq!(next_frame(&mut harness.channels).await.tick, 7);

    let summary = harness.channels.shutdown().await.expect("summary");
    assert!(summary.errors >= 3);
    assert_eq!(summary.frames, 2);
}

#[tokio::test(start_paused = true)]
async fn missing_buffers_keep_the_loop_alive() {
    let image = ProducerImage::new(1024).buffer_len(16);
    let mut harness = start(image, PollConfig::new(INTERVAL));

    sleep(INTERVAL * 3).await;
    assert!(harness.channels.frames.try_recv().is_err());
    assert!(!harness.channels.task.is_finished());

    let summary = harness.channels.shutdown().await.expect("summary");
    assert!(summary.errors >= 3);
    assert_eq!(summary.frames, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_is_honored_within_one_interval_and_releases_once() {
    let mut harness = start(producer(), PollConfig::new(INTERVAL));
    next_frame(&mut harness.channels).await;

    let requested = Instant::now();
    harness.channels.control.send(ControlSignal::from("stop")).await.unwrap();
    let summary = harness.channels.task.await.unwrap();

    assert!(requested.elapsed() <= INTERVAL);
    assert_eq!(summary.state, LoopState::Stopped);
    assert_eq!(summary.stop_reason, Some(StopReason::Requested));
    assert_eq!(harness.segment_closes.count(), 1);
    assert_eq!(harness.event_closes.count(), 1);
    assert_eq!(harness.writer.closes().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn other_control_values_are_ignored() {
    let mut harness = start(producer(), PollConfig::new(INTERVAL));
    next_frame(&mut harness.channels).await;

    harness.channels.control.send(ControlSignal::from("pause")).await.unwrap();
    harness.writer.set_tick(0, 8);

    assert_eq!(next_frame(&mut harness.channels).await.tick, 8);
    assert!(!harness.channels.task.is_finished());
    assert_eq!(harness.segment_closes.count(), 0);

    harness.channels.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_every_control_sender_stops_the_loop() {
    let harness = start(producer(), PollConfig::new(INTERVAL));
    let FeedChannels { frames, control, task, .. } = harness.channels;

    drop(control);
    let summary = task.await.unwrap();
    drop(frames);

    assert_eq!(summary.stop_reason, Some(StopReason::ControlClosed));
    assert_eq!(harness.segment_closes.count(), 1);
    assert_eq!(harness.event_closes.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_frame_receiver_stops_the_loop() {
    let config = PollConfig::new(INTERVAL).with_freshness(FreshnessPolicy::AlwaysRead);
    let harness = start(producer(), config);
    let FeedChannels { frames, control, task, .. } = harness.channels;

    drop(frames);
    let summary = task.await.unwrap();
    drop(control);

    assert_eq!(summary.stop_reason, Some(StopReason::FramesClosed));
    assert_eq!(harness.segment_closes.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_preempts_a_blocked_handoff() {
    let config = PollConfig::new(INTERVAL)
        .with_freshness(FreshnessPolicy::AlwaysRead)
        .with_frame_capacity(1);
    let mut harness = start(producer(), config);

    // Nobody reads; the loop fills the single slot then blocks on the next one
    sleep(INTERVAL * 10).await;

    let requested = Instant::now();
    harness.channels.control.send(ControlSignal::Stop).await.unwrap();
    let summary = (&mut harness.channels.task).await.unwrap();

    assert!(requested.elapsed() <= INTERVAL);
    assert_eq!(summary.frames, 1);
    assert_eq!(summary.stop_reason, Some(StopReason::Requested));

    // The buffered frame is still delivered in order
    assert_eq!(harness.channels.frames.recv().await.map(|f| f.tick), Some(7));
    assert_eq!(harness.channels.frames.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn event_timeouts_do_not_stall_the_feed() {
    let _ = tracing_subscriber::fmt::try_init();
    let segment = producer().into_segment();
    let event = ScriptedEvent::timing_out();

    let mut channels = PollLoop::new(segment, event, PollConfig::new(INTERVAL)).unwrap().spawn();
    assert_eq!(next_frame(&mut channels).await.tick, 7);
    channels.shutdown().await;
}

#[test]
fn failed_event_open_releases_the_segment() {
    let segment = producer().into_segment();
    let segment_closes = segment.closes();

    let result = PollLoop::<MemorySegment, ScriptedEvent>::connect_with(
        |_| Ok(segment),
        |config| Err(TelemetryError::connection_failed(format!("{} not found", config.event_name))),
        PollConfig::default(),
    );

    assert!(matches!(result, Err(TelemetryError::Connection { .. })));
    assert_eq!(segment_closes.count(), 1);
}

#[test]
fn failed_segment_open_never_opens_the_event() {
    let mut event_opened = false;

    let result = PollLoop::<MemorySegment, ScriptedEvent>::connect_with(
        |_| Err(TelemetryError::connection_failed("segment missing")),
        |_| {
            event_opened = true;
            Ok(ScriptedEvent::signaled())
        },
        PollConfig::default(),
    );

    assert!(result.is_err());
    assert!(!event_opened);
}

#[test]
fn invalid_config_releases_both_resources() {
    let segment = producer().into_segment();
    let event = ScriptedEvent::signaled();
    let segment_closes = segment.closes();
    let event_closes = event.closes();

    let result = PollLoop::new(segment, event, PollConfig::new(Duration::ZERO));

    assert!(matches!(result, Err(TelemetryError::Config { .. })));
    assert_eq!(segment_closes.count(), 1);
    assert_eq!(event_closes.count(), 1);
}

#[test]
fn connect_with_succeeds_in_idle_state() {
    let poll_loop = PollLoop::connect_with(
        |_| Ok(producer().into_segment()),
        |_| Ok(ScriptedEvent::signaled()),
        PollConfig::default(),
    )
    .unwrap();

    assert_eq!(poll_loop.state(), LoopState::Idle);
    assert_eq!(poll_loop.config().poll_interval, Duration::from_millis(16));
}

#[tokio::test(start_paused = true)]
async fn unrecognized_version_is_retried_until_the_producer_recovers() {
    let mut harness = start(producer().version(1), PollConfig::new(INTERVAL));

    sleep(INTERVAL * 3).await;
    assert!(harness.channels.frames.try_recv().is_err());
    assert!(!harness.channels.task.is_finished());

    harness.writer.write(0, &crate::schema::IRSDK_VER.to_le_bytes());
    assert_eq!(next_frame(&mut harness.channels).await.tick, 7);

    let summary = harness.channels.shutdown().await.expect("summary");
    assert!(summary.errors >= 3);
    assert_eq!(summary.frames, 1);
}

#[tokio::test(start_paused = true)]
async fn variable_table_is_found_wherever_the_header_points() {
    let mut harness = start(producer().var_header_offset(2048), PollConfig::new(INTERVAL));
    next_frame(&mut harness.channels).await;

    {
        let directory = harness.channels.directory.borrow();
        assert_eq!(directory.get("RPM").map(|v| v.offset), Some(0));
        assert_eq!(directory.get("Gear").map(|v| v.offset), Some(4));
    }
    {
        let session = harness.channels.session_info.borrow();
        let session = session.as_ref().expect("session info published");
        assert!(session.yaml.contains("TrackName: spa"));
    }

    harness.channels.shutdown().await;
}
