//! Line-oriented rendering of session snapshots.

use chrono_tz::Tz;
use mission_core::formatting::{format_entry, format_usage};
use mission_runtime::session::SessionSnapshot;

/// Prints only what changed between successive snapshots.
///
/// New entries are printed whole. When the last printed entry grows because
/// stream fragments were merged into it, only the new text is printed as a
/// continuation line.
pub struct TranscriptPrinter {
    tz: Tz,
    twelve_hour: bool,
    printed: usize,
    /// Length of the last printed entry's text at the time it was printed.
    last_len: usize,
    prompted: Option<String>,
}

impl TranscriptPrinter {
    pub fn new(tz: Tz, twelve_hour: bool) -> Self {
        Self {
            tz,
            twelve_hour,
            printed: 0,
            last_len: 0,
            prompted: None,
        }
    }

    /// Lines to show for `snapshot`, given everything rendered so far.
    pub fn render(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        let entries = &snapshot.entries;

        // A relaunch starts a fresh transcript.
        if entries.len() < self.printed {
            self.printed = 0;
            self.last_len = 0;
            self.prompted = None;
        }

        if self.printed > 0 {
            let text = entries[self.printed - 1].payload.to_display_string();
            if text.len() > self.last_len {
                if let Some(suffix) = text.get(self.last_len..) {
                    lines.push(format!("    ... {suffix}"));
                }
                self.last_len = text.len();
            }
        }

        for entry in entries.iter_from(self.printed) {
            lines.push(format_entry(entry, self.tz, self.twelve_hour));
            self.last_len = entry.payload.to_display_string().len();
        }
        self.printed = entries.len();

        match &snapshot.pending_intervention {
            Some(request) if self.prompted.as_deref() != Some(request.request_id.as_str()) => {
                lines.push(format!(
                    ">>> Intervention {}: {}",
                    request.request_id,
                    request.prompt()
                ));
                lines.push(
                    ">>> [p]roceed / [r]etry / [i]gnore / [c]ancel, or type a reply".to_string(),
                );
                self.prompted = Some(request.request_id.clone());
            }
            Some(_) => {}
            None => self.prompted = None,
        }

        lines
    }

    pub fn print(&mut self, snapshot: &SessionSnapshot) {
        for line in self.render(snapshot) {
            println!("{line}");
        }
    }
}

/// Closing summary for a finished session.
pub fn summary(snapshot: &SessionSnapshot) -> Vec<String> {
    let mut lines = vec![String::new()];
    match &snapshot.mission_id {
        Some(id) => lines.push(format!("Mission {id} finished")),
        None => lines.push("Mission finished".to_string()),
    }
    if snapshot.usage_updates == 0 {
        lines.push("Usage: no reports received".to_string());
    } else {
        lines.push(format!("Usage: {}", format_usage(&snapshot.usage)));
    }
    match &snapshot.final_artifact {
        Some(artifact) => {
            lines.push("Final result:".to_string());
            lines.push(artifact.clone());
        }
        None => lines.push("No final result was produced.".to_string()),
    }
    lines
}
