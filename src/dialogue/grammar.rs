//! A tiny lookup grammar mapping whole utterances to intents and entities.

/// What an utterance means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parse {
    pub intent: &'static str,
    pub entities: &'static [(&'static str, &'static str)],
}

impl Parse {
    pub fn entity(&self, name: &str) -> Option<&'static str> {
        self.entities
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}

const NONE: &str = "None";

const ENTRIES: &[(&str, Parse)] = &[
    (
        "lecture",
        Parse {
            intent: NONE,
            entities: &[("title", "Dialogue systems lecture")],
        },
    ),
    (
        "lunch",
        Parse {
            intent: NONE,
            entities: &[("title", "Lunch at the canteen")],
        },
    ),
    (
        "on friday",
        Parse {
            intent: NONE,
            entities: &[("day", "Friday")],
        },
    ),
    (
        "at ten",
        Parse {
            intent: NONE,
            entities: &[("time", "10:00")],
        },
    ),
    (
        "meeting",
        Parse {
            intent: "meeting",
            entities: &[("choice", "booking a meeting")],
        },
    ),
    (
        "information",
        Parse {
            intent: "information",
            entities: &[("choice", "finding information")],
        },
    ),
    (
        "celebrity",
        Parse {
            intent: NONE,
            entities: &[("celeb", "celebrity")],
        },
    ),
];

/// Lower-case `utterance` and drop one trailing full stop.
///
/// ```
/// use parley::dialogue::grammar::normalize;
///
/// assert_eq!(normalize("Lunch."), "lunch");
/// assert_eq!(normalize("Ada Lovelace"), "ada lovelace");
/// ```
pub fn normalize(utterance: &str) -> String {
    let lower = utterance.trim().to_lowercase();
    match lower.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => lower,
    }
}

pub fn parse(utterance: &str) -> Option<&'static Parse> {
    let normalized = normalize(utterance);
    ENTRIES
        .iter()
        .find(|(phrase, _)| *phrase == normalized)
        .map(|(_, parse)| parse)
}

/// The value of entity `name` in `utterance`, if the grammar knows both.
pub fn entity(utterance: &str, name: &str) -> Option<&'static str> {
    parse(utterance).and_then(|p| p.entity(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_phrases_parse() {
        let parsed = parse("Meeting.").unwrap();
        assert_eq!(parsed.intent, "meeting");
        assert_eq!(parsed.entity("choice"), Some("booking a meeting"));

        assert_eq!(entity("LUNCH", "title"), Some("Lunch at the canteen"));
        assert_eq!(entity("on Friday", "day"), Some("Friday"));
    }

    #[test]
    fn unknown_phrases_and_entities_are_none() {
        assert!(parse("book a table").is_none());
        assert_eq!(entity("lunch", "day"), None);
        assert_eq!(entity("", "title"), None);
    }

    #[test]
    fn normalize_only_strips_one_trailing_stop() {
        assert_eq!(normalize("at ten.."), "at ten.");
        assert_eq!(normalize("a"), "a");
        assert_eq!(normalize(""), "");
    }
}
