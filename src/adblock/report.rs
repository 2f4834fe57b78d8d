//! Classification report emission
//!
//! One JSON array per line: `["adblock", {"FirstOrigin": ..., "URL": ...,
//! "Blocked": ...}]`.

use super::sink_backend::SinkError;
use super::Script;
use serde_json::json;
use std::io::Write;

/// Write one report line per script, in the order given
pub fn write_report<'a>(
    sink: &mut (dyn Write + Send),
    scripts: impl Iterator<Item = &'a Script>,
) -> Result<usize, SinkError> {
    let mut written = 0;

    for script in scripts {
        let line = json!([
            "adblock",
            {
                "FirstOrigin": script.info.first_origin,
                "URL": script.info.url,
                "Blocked": script.blocked,
            }
        ]);
        writeln!(sink, "{}", serde_json::to_string(&line)?)?;
        written += 1;
    }

    sink.flush()?;

    Ok(written)
}
