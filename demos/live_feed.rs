//! Print a short live telemetry feed from iRacing.
//!
//! ```text
//! cargo run --example live_feed -- [config.yaml]
//! RUST_LOG=pitlane=debug cargo run --example live_feed
//! ```
//!
//! Reads 300 frames (about five seconds at 60 Hz), printing RPM and speed
//! when the producer publishes them, then stops the loop and prints its
//! summary.

use futures::StreamExt;
use pitlane::{
    ControlSignal, FeedChannels, Frame, Pitlane, PollConfig, VariableDirectory, VariableType,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAMES: usize = 300;

fn read_f32(directory: &VariableDirectory, frame: &Frame, name: &str) -> Option<f32> {
    let header = directory.get(name)?;
    if header.data_type() != Some(VariableType::Float32) {
        return None;
    }
    let bytes = directory.slice(name, &frame.data)?;
    Some(f32::from_le_bytes(bytes[..4].try_into().ok()?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PollConfig::load(path)?,
        None => PollConfig::default(),
    };
    info!(?config, "Connecting to iRacing");

    let FeedChannels { frames, directory, session_info, control, task } =
        Pitlane::connect(config).await?;
    let mut stream = ReceiverStream::new(frames).take(FRAMES);

    while let Some(frame) = stream.next().await {
        let directory = directory.borrow().clone();
        let rpm = read_f32(&directory, &frame, "RPM");
        let speed = read_f32(&directory, &frame, "Speed");

        println!(
            "tick {:>8}  buffer {}  {:?}  rpm {:>8}  speed {:>7}",
            frame.tick,
            frame.buffer_index,
            frame.status,
            rpm.map_or("-".to_string(), |v| format!("{v:.0}")),
            speed.map_or("-".to_string(), |v| format!("{v:.1}")),
        );
    }

    if let Some(session) = session_info.borrow().as_ref() {
        info!(update = session.update, bytes = session.yaml.len(), "Last session info");
    }

    control.send(ControlSignal::Stop).await?;
    drop(stream);
    let summary = task.await?;
    info!(?summary, "Feed stopped");
    Ok(())
}
