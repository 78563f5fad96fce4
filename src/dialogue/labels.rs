//! Status line shown next to the talk button.

use crate::runtime::Snapshot;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusLabel {
    Failed,
    Talk,
    Speaking,
    ClickToStart,
    Blank,
}

impl StatusLabel {
    /// Pick the label for a snapshot. Earlier rules win.
    pub fn for_snapshot(snapshot: &Snapshot) -> Self {
        if snapshot.matches("asrtts.fail") || snapshot.matches("dm.fail") {
            StatusLabel::Failed
        } else if snapshot.matches("asrtts.recognising") {
            StatusLabel::Talk
        } else if snapshot.matches("asrtts.speaking") {
            StatusLabel::Speaking
        } else if snapshot.matches("dm.init") {
            StatusLabel::ClickToStart
        } else {
            StatusLabel::Blank
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            StatusLabel::Failed => "Something went wrong...",
            StatusLabel::Talk => "talk",
            StatusLabel::Speaking => "speaking",
            StatusLabel::ClickToStart => "click to start!",
            StatusLabel::Blank => "",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Context;
    use serde_json::Value;

    fn snapshot(leaves: &[&str]) -> Snapshot {
        Snapshot {
            value: Value::Null,
            leaves: leaves.iter().map(|l| l.to_string()).collect(),
            context: Context::new(),
            done: false,
        }
    }

    #[test]
    fn failure_wins_over_everything() {
        let s = snapshot(&["dm.init", "asrtts.fail"]);
        assert_eq!(StatusLabel::for_snapshot(&s), StatusLabel::Failed);
        assert_eq!(StatusLabel::Failed.to_string(), "Something went wrong...");
    }

    #[test]
    fn controller_activity_beats_dm_state() {
        assert_eq!(
            StatusLabel::for_snapshot(&snapshot(&["dm.init", "asrtts.recognising.noinput"])),
            StatusLabel::Talk
        );
        assert_eq!(
            StatusLabel::for_snapshot(&snapshot(&["dm.menu.prompt", "asrtts.speaking"])),
            StatusLabel::Speaking
        );
    }

    #[test]
    fn idle_states() {
        assert_eq!(
            StatusLabel::for_snapshot(&snapshot(&["dm.init", "asrtts.idle"])).text(),
            "click to start!"
        );
        assert_eq!(
            StatusLabel::for_snapshot(&snapshot(&["dm.idle", "asrtts.prepare"])),
            StatusLabel::Blank
        );
    }
}
