// ── Line stream ──
//
// Reads controller lines from stdin until EOF or Ctrl-C. Lines of the
// form `//event <Name> [json]` are host lifecycle events; everything
// else goes through the telemetry decoder.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use additv_core::{
    BatcherConfig, EventPublisher, OperationQueue, QueueConfig, TelemetryBatcher,
    TelemetryDecoder,
};

use crate::cli::{GlobalOpts, StreamArgs};
use crate::commands::event::parse_payload;
use crate::commands::util;
use crate::error::CliError;

const EVENT_PREFIX: &str = "//event ";
const FLUSH_CHECK: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct StreamStats {
    lines: u64,
    readings: u64,
    events: u64,
}

/// Controller output is serial text; invalid UTF-8 is replaced rather
/// than rejected.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// A `//event` line split into name and payload text.
pub fn split_event_line(line: &str) -> Option<(&str, Option<&str>)> {
    let rest = line.strip_prefix(EVENT_PREFIX)?.trim();
    if rest.is_empty() {
        return None;
    }
    Some(match rest.split_once(char::is_whitespace) {
        Some((name, payload)) => (name, Some(payload.trim())),
        None => (rest, None),
    })
}

pub async fn handle(args: StreamArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let bridge = util::connect(global).await?;
    let printer_id = bridge.session.printer_id().to_owned();

    let queue_config = QueueConfig::default();
    let queue = OperationQueue::start(Arc::clone(&bridge.session), queue_config);
    let publisher = EventPublisher::new(queue.submitter(), printer_id.clone());
    let mut batcher = TelemetryBatcher::new(
        queue.submitter(),
        printer_id,
        BatcherConfig {
            max_batch: usize::from(args.batch_size),
            flush_interval: Duration::from_secs(args.flush_secs),
            ..BatcherConfig::default()
        },
    );
    let mut decoder = TelemetryDecoder::new(args.profile.into());
    info!(profile = %decoder.profile(), "streaming controller lines from stdin");

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut buf = Vec::new();
    let mut tick = tokio::time::interval(FLUSH_CHECK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats = StreamStats::default();

    loop {
        tokio::select! {
            read = stdin.read_until(b'\n', &mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "stdin read failed, shutting down");
                        break;
                    }
                }
                let line = decode_line(&buf);
                buf.clear();
                stats.lines += 1;

                if let Some((name, payload)) = split_event_line(&line) {
                    let payload = parse_payload(payload).unwrap_or_else(|e| {
                        warn!(event = name, error = %e, "dropping malformed event payload");
                        Map::new()
                    });
                    if publisher.publish(name, payload) {
                        stats.events += 1;
                    }
                } else if let Some(reading) = decoder.feed(&line) {
                    stats.readings += 1;
                    batcher.offer(reading);
                }
            }
            _ = tick.tick() => {
                batcher.flush_if_due();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    batcher.on_shutdown();
    let window = queue_config.drain_timeout + Duration::from_secs(global.timeout);
    let drained = util::drain(&queue, window).await;
    info!(
        lines = stats.lines,
        readings = stats.readings,
        events = stats.events,
        drained,
        "stream finished"
    );
    Ok(())
}
