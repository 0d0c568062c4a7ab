use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::events::{EventData, StreamEvent, Tier};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("missing template for key '{0}'")]
    MissingTemplate(String),
    #[error("template '{key}' references unknown placeholder '{placeholder}'")]
    UnknownPlaceholder { key: String, placeholder: String },
}

/// Render the display text for a stream event using the configured template set.
///
/// Mirrors the event-specific branching the original formatter uses: which
/// template key applies can depend on whether an optional field (message,
/// user_input) is present and whether the config opts in to reading it aloud.
pub fn render(
    event: &StreamEvent,
    templates: &HashMap<String, String>,
    twitch: &crate::config::TwitchEventConfig,
    youtube: &crate::config::YoutubeEventConfig,
) -> Result<String, TemplateError> {
    let username = event.username.as_str();

    let (key, fields): (&str, Vec<(&str, String)>) = match &event.data {
        EventData::TwitchBits(b) => {
            if !b.message.is_empty() && twitch.bits_read_message {
                (
                    "twitch_bits",
                    vec![
                        ("username", username.to_string()),
                        ("amount", b.amount.to_string()),
                        ("message", b.message.clone()),
                    ],
                )
            } else {
                (
                    "twitch_bits_no_message",
                    vec![
                        ("username", username.to_string()),
                        ("amount", b.amount.to_string()),
                    ],
                )
            }
        }
        EventData::TwitchSubNew(s) => (
            "twitch_sub_new",
            vec![
                ("username", username.to_string()),
                ("tier", s.tier.as_str().to_string()),
            ],
        ),
        EventData::TwitchSubResub(s) => {
            if !s.message.is_empty() && twitch.subs_read_message {
                (
                    "twitch_sub_resub",
                    vec![
                        ("username", username.to_string()),
                        ("tier", s.tier.as_str().to_string()),
                        ("months", s.months.to_string()),
                        ("message", s.message.clone()),
                    ],
                )
            } else {
                (
                    "twitch_sub_resub_no_message",
                    vec![
                        ("username", username.to_string()),
                        ("tier", s.tier.as_str().to_string()),
                        ("months", s.months.to_string()),
                    ],
                )
            }
        }
        EventData::TwitchGiftSingle(g) => (
            "twitch_gift_single",
            vec![
                ("username", username.to_string()),
                ("tier", g.tier.as_str().to_string()),
                (
                    "recipient",
                    if g.recipient.is_empty() {
                        "someone".to_string()
                    } else {
                        g.recipient.clone()
                    },
                ),
            ],
        ),
        EventData::TwitchGiftMulti(g) => (
            "twitch_gift_multi",
            vec![
                ("username", username.to_string()),
                ("tier", g.tier.as_str().to_string()),
                ("count", g.count.to_string()),
            ],
        ),
        EventData::TwitchChannelPoints(c) => {
            if !c.user_input.is_empty() {
                (
                    "twitch_channel_points",
                    vec![
                        ("username", username.to_string()),
                        ("reward_name", c.reward_name.clone()),
                        ("user_input", c.user_input.clone()),
                        ("cost", c.cost.to_string()),
                    ],
                )
            } else {
                (
                    "twitch_channel_points_no_input",
                    vec![
                        ("username", username.to_string()),
                        ("reward_name", c.reward_name.clone()),
                        ("cost", c.cost.to_string()),
                    ],
                )
            }
        }
        EventData::YoutubeSuperchat(s) => {
            if !s.message.is_empty() && youtube.superchat_read_message {
                (
                    "youtube_superchat",
                    vec![
                        ("username", username.to_string()),
                        ("currency", s.currency.clone()),
                        ("amount", format!("{:.2}", s.amount)),
                        ("message", s.message.clone()),
                    ],
                )
            } else {
                (
                    "youtube_superchat_no_message",
                    vec![
                        ("username", username.to_string()),
                        ("currency", s.currency.clone()),
                        ("amount", format!("{:.2}", s.amount)),
                    ],
                )
            }
        }
        EventData::YoutubeSupersticker(s) => (
            "youtube_supersticker",
            vec![
                ("username", username.to_string()),
                ("currency", s.currency.clone()),
                ("amount", format!("{:.2}", s.amount)),
            ],
        ),
        EventData::YoutubeMembershipNew(m) => (
            "youtube_membership_new",
            vec![
                ("username", username.to_string()),
                (
                    "level",
                    if m.level.is_empty() {
                        "member".to_string()
                    } else {
                        m.level.clone()
                    },
                ),
            ],
        ),
        EventData::YoutubeMembershipMilestone(m) => (
            "youtube_membership_milestone",
            vec![
                ("username", username.to_string()),
                (
                    "level",
                    if m.level.is_empty() {
                        "member".to_string()
                    } else {
                        m.level.clone()
                    },
                ),
                ("months", m.months.to_string()),
            ],
        ),
    };

    let template = templates
        .get(key)
        .ok_or_else(|| TemplateError::MissingTemplate(key.to_string()))?;

    substitute(key, template, &fields)
}

fn substitute(key: &str, template: &str, fields: &[(&str, String)]) -> Result<String, TemplateError> {
    static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-zA-Z_]+)\}").unwrap());

    let mut missing = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        match fields.iter().find(|(k, _)| *k == name) {
            Some((_, v)) => v.clone(),
            None => {
                missing = Some(name.to_string());
                String::new()
            }
        }
    });

    if let Some(placeholder) = missing {
        return Err(TemplateError::UnknownPlaceholder {
            key: key.to_string(),
            placeholder,
        });
    }

    Ok(rendered.into_owned())
}

// A fixed, conservative wordlist kept short on purpose: the policy is "mask
// obvious profanity", not "launder arbitrary chat". Extend via config if that
// changes.
const PROFANITY_WORDLIST: &[&str] = &[
    "fuck", "shit", "bitch", "asshole", "bastard", "cunt", "dick", "piss", "cock", "whore",
];

static PROFANITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let alternation = PROFANITY_WORDLIST.join("|");
    Regex::new(&format!(r"(?i)\b({alternation})\w*\b")).unwrap()
});

/// Mask profane words with asterisks of the same length, matching whole
/// profane stems so pluralized/inflected forms ("shitty") are caught too.
pub fn censor(text: &str) -> String {
    PROFANITY_PATTERN
        .replace_all(text, |caps: &regex::Captures| "*".repeat(caps[0].chars().count()))
        .into_owned()
}

static EMOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r":[a-zA-Z0-9_]+:").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SPECIAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[<>{}\[\]|\\^~`]").unwrap());
static REPEATED_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.)\1{3,}").unwrap());

/// Clean rendered text for TTS: strip emotes, URLs, collapse whitespace and
/// repeated characters, drop characters that tend to confuse speech engines.
pub fn sanitize(text: &str) -> String {
    let text = EMOTE.replace_all(text, "");
    let text = URL.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim();
    let text = SPECIAL_CHARS.replace_all(text, "");
    let text = REPEATED_CHARS.replace_all(&text, "$1$1");
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TwitchEventConfig, YoutubeEventConfig};
    use serde_json::Value;

    fn templates() -> HashMap<String, String> {
        crate::config::default_templates()
    }

    #[test]
    fn renders_bits_with_message() {
        let e = StreamEvent::new_twitch_bits("Bob", 500, "yay", false, Value::Null);
        let out = render(&e, &templates(), &TwitchEventConfig::default(), &YoutubeEventConfig::default()).unwrap();
        assert_eq!(out, "Bob cheered 500 bits: yay");
    }

    #[test]
    fn renders_bits_without_message_when_disabled() {
        let mut twitch = TwitchEventConfig::default();
        twitch.bits_read_message = false;
        let e = StreamEvent::new_twitch_bits("Bob", 500, "yay", false, Value::Null);
        let out = render(&e, &templates(), &twitch, &YoutubeEventConfig::default()).unwrap();
        assert_eq!(out, "Bob cheered 500 bits!");
    }

    #[test]
    fn missing_template_errors() {
        let e = StreamEvent::new_twitch_bits("Bob", 500, "", false, Value::Null);
        let err = render(&e, &HashMap::new(), &TwitchEventConfig::default(), &YoutubeEventConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn sanitize_strips_emotes_and_urls() {
        let out = sanitize("hello :Kappa: check http://example.com/x out");
        assert_eq!(out, "hello check out");
    }

    #[test]
    fn sanitize_collapses_repeated_chars() {
        assert_eq!(sanitize("yaaaay"), "yaay");
    }

    #[test]
    fn censor_masks_profanity_preserving_length() {
        let out = censor("that was shit");
        assert_eq!(out, "that was ****");
    }
}
