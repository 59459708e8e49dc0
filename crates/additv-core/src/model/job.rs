use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A print job handed out by the backend's `get-next-job` function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub gcode_id: String,
    pub gcode_url: String,
    pub gcode_filename: String,
}

impl Job {
    /// Extract a job from a function response.
    ///
    /// Every field must be present and non-empty; anything else is
    /// logged and treated as "no job".
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| -> Option<String> {
            match obj.get(name)? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };

        let parsed = (|| {
            Some(Self {
                job_id: field("job_id")?,
                gcode_id: field("gcode_id")?,
                gcode_url: field("gcode_url")?,
                gcode_filename: field("gcode_filename")?,
            })
        })();

        if parsed.is_none() {
            warn!(keys = ?obj.keys().collect::<Vec<_>>(), "ignoring incomplete job payload");
        }
        parsed
    }
}
