use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use foundation::time::Time;
use meshplot::{Args, Display, DisplayConfig, FrameOutput};
use runtime::frame::Frame;
use scene::node_store::NodeStore;
use streaming::queue::update_channel;
use streaming::source::{SourceStatus, pump_lines};
use tokio::io::BufReader;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = DisplayConfig::from_env();
    args.apply(&mut config);
    config.sanitize();

    let store = Arc::new(NodeStore::new());
    let (tx, queue) = update_channel();
    let label = args
        .input
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdin".to_string());
    let status = Arc::new(SourceStatus::new(label));

    let producer = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            tokio::spawn(pump_lines(BufReader::new(file), tx, Arc::clone(&status)))
        }
        None => tokio::spawn(pump_lines(
            BufReader::new(tokio::io::stdin()),
            tx,
            Arc::clone(&status),
        )),
    };

    info!(
        fps = config.fps,
        stale_after_s = config.stale_after_s,
        drain_budget = config.drain_budget,
        mode = %config.link_mode,
        "display starting"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(config.frame_interval_s()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let nominal_dt = config.frame_interval_s();
    let mut display = Display::new(config, store, queue, status);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut frame: Option<Frame> = None;
    let mut last: Option<FrameOutput> = None;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }

        let now = Time::now();
        let current = match frame {
            None => Frame::first(now, nominal_dt),
            Some(prev) => prev.advance(now),
        };
        frame = Some(current);

        let out = display.step(current.time, current.dt_s);
        for event in display.drain_events() {
            debug!(frame = event.frame_index, kind = event.kind, "{}", event.message);
        }

        let frame_cap_reached = args.frames.is_some_and(|cap| out.frame + 1 >= cap);
        let input_done = args.exit_on_eof && display.is_source_closed();
        last = Some(out);
        if frame_cap_reached || input_done {
            break;
        }
    }

    if producer.is_finished() {
        match producer.await {
            Ok(Ok(summary)) => debug!(?summary, "producer joined"),
            Ok(Err(err)) => warn!(error = %err, "source read failed"),
            Err(err) => warn!(error = %err, "producer task failed"),
        }
    } else {
        producer.abort();
    }

    if args.dump
        && let Some(out) = last
    {
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}
