use serde_json::{Map, Value};

use additv_core::{EventKind, EventPublisher};

use crate::cli::{EventArgs, GlobalOpts, ProgressArgs};
use crate::commands::util::{self, Collected};
use crate::error::CliError;

/// Parse an optional JSON object payload.
pub fn parse_payload(raw: Option<&str>) -> Result<Map<String, Value>, CliError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(CliError::Validation {
            field: "payload".into(),
            reason: format!("expected a JSON object, got {other}"),
        }),
    }
}

pub async fn handle_event(args: EventArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let payload = parse_payload(args.payload.as_deref())?;
    let Some(kind) = EventKind::from_host_event(&args.name) else {
        println!("ignored untracked event {}", args.name);
        return Ok(());
    };

    let bridge = util::connect(global).await?;
    let collected = Collected::default();
    EventPublisher::new(&collected, bridge.session.printer_id()).publish_kind(kind, payload);
    collected.deliver(&bridge).await?;

    println!("sent {kind}");
    Ok(())
}

pub async fn handle_progress(args: ProgressArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if !(0.0..=100.0).contains(&args.percent) {
        return Err(CliError::Validation {
            field: "percent".into(),
            reason: format!("{} is outside 0-100", args.percent),
        });
    }

    let bridge = util::connect(global).await?;
    let collected = Collected::default();
    EventPublisher::new(&collected, bridge.session.printer_id())
        .publish_job_progress(&args.job_id, args.percent);
    collected.deliver(&bridge).await?;

    println!("job {} at {}%", args.job_id, args.percent);
    Ok(())
}
