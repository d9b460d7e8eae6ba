//! Headless arena client for soak testing.
//!
//! Connects over WebSocket, plays a scripted key pattern through the input
//! batcher and keeps a reconciled world from the server's snapshots.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures::{SinkExt, StreamExt};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brawl_arena::client::{ClientWorld, InputBatcher};
use brawl_arena::client::batcher::DEFAULT_PENDING_CAPACITY;
use brawl_arena::game::{ArenaRules, Key, KeyState};
use brawl_arena::util::time::{unix_millis, CLIENT_SAMPLE_INTERVAL_MS, SIMULATION_TPS};
use brawl_arena::ws::protocol::{ClientMsg, ServerMsg};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket endpoint of the arena server
    #[clap(short, long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,
    /// Input sampling interval in milliseconds (25-50)
    #[clap(short, long, default_value_t = CLIENT_SAMPLE_INTERVAL_MS)]
    interval_ms: u64,
    /// Stop after this many seconds, run until Ctrl+C when omitted
    #[clap(short, long)]
    duration_secs: Option<u64>,
    /// Seconds between latency pings
    #[clap(long, default_value_t = 2)]
    ping_secs: u64,
    /// Server simulation rate, used to pace local prediction
    #[clap(long, default_value_t = SIMULATION_TPS)]
    tick_rate: u32,
}

/// Server ticks that elapse during one sampling interval, at least one
fn prediction_steps(tick_rate: u32, interval_ms: u64) -> u32 {
    let steps = (u64::from(tick_rate) * interval_ms + 500) / 1000;
    steps.clamp(1, u64::from(u32::MAX)) as u32
}

/// Movement keys held and an optional attack press for one script step
fn script_step(step: u64) -> (KeyState, Option<Key>) {
    match step % 80 {
        0..=19 => (KeyState::from_keys(&[Key::Right]), None),
        20 | 21 => (KeyState::from_keys(&[Key::Right, Key::Jump]), None),
        25 => (KeyState::NONE, Some(Key::Punch)),
        35 => (KeyState::NONE, Some(Key::Kick)),
        40..=59 => (KeyState::from_keys(&[Key::Left]), None),
        70 => (KeyState::NONE, Some(Key::Punch)),
        _ => (KeyState::NONE, None),
    }
}

fn apply_script(batcher: &mut InputBatcher, step: u64) {
    let (held, attack) = script_step(step);
    for key in [Key::Left, Key::Right, Key::Jump] {
        if held.is_down(key) {
            batcher.press(key);
        } else {
            batcher.release(key);
        }
    }
    if let Some(key) = attack {
        batcher.press(key);
        batcher.release(key);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();

    let (socket, _) = connect_async(args.url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", args.url))?;
    info!(url = %args.url, "Connected");
    let (mut ws_sink, mut ws_stream) = socket.split();

    let mut batcher = InputBatcher::new(args.interval_ms, DEFAULT_PENDING_CAPACITY);
    let mut world = ClientWorld::new(ArenaRules::default(), batcher.interval_ms());

    let steps_per_sample = prediction_steps(args.tick_rate, batcher.interval_ms());
    let mut sample_timer = interval(Duration::from_millis(batcher.interval_ms()));
    sample_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ping_timer = interval(Duration::from_secs(args.ping_secs.max(1)));

    let deadline = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut step = 0u64;
    let mut snapshots = 0u64;

    loop {
        tokio::select! {
            _ = sample_timer.tick() => {
                apply_script(&mut batcher, step);
                step += 1;

                if let Some(msg) = batcher.on_interval() {
                    send_msg(&mut ws_sink, &msg).await?;
                }
                world.advance(batcher.tick());
                for _ in 0..steps_per_sample {
                    world.predict_local(batcher.effective_keys());
                }
                world.interpolate(1.0);
            }

            _ = ping_timer.tick() => {
                let ping = ClientMsg::Ping { client_timestamp: unix_millis() };
                send_msg(&mut ws_sink, &ping).await?;
            }

            frame = ws_stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let msg: ServerMsg = match serde_json::from_str(&text) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!(error = %e, "Failed to parse server message");
                            continue;
                        }
                    };

                    match &msg {
                        ServerMsg::Pong { client_timestamp, .. } => {
                            let rtt = unix_millis().saturating_sub(*client_timestamp);
                            info!(rtt_ms = rtt, "Pong");
                        }
                        ServerMsg::GameState { .. } => {
                            snapshots += 1;
                            if snapshots % 100 == 0 {
                                if let Some(me) = world.local_player() {
                                    info!(
                                        snapshots,
                                        players = world.len(),
                                        x = me.x,
                                        height = me.height,
                                        last_processed_input = me.last_processed_input,
                                        "Arena status"
                                    );
                                }
                            }
                        }
                        other => debug!(event = other.event_name(), "Server event"),
                    }

                    world.handle(&msg);
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("WebSocket error"),
            },

            _ = &mut deadline => {
                info!("Run duration reached");
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if let Some(msg) = batcher.flush() {
        let _ = send_msg(&mut ws_sink, &msg).await;
    }
    let _ = ws_sink.send(Message::Close(None)).await;

    info!(snapshots, samples = batcher.tick(), "Bot finished");
    Ok(())
}

async fn send_msg<S>(sink: &mut S, msg: &ClientMsg) -> anyhow::Result<()>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json))
        .await
        .context("Failed to send message")
}
