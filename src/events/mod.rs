use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Supported streaming platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitch,
    YouTube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::YouTube => "youtube",
        }
    }
}

/// Types of monetization events, used as the template/priority/config lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TwitchBits,
    TwitchSubNew,
    TwitchSubResub,
    TwitchGiftSingle,
    TwitchGiftMulti,
    TwitchChannelPoints,
    YoutubeSuperchat,
    YoutubeSupersticker,
    YoutubeMembershipNew,
    YoutubeMembershipMilestone,
}

impl EventKind {
    pub fn platform(&self) -> Platform {
        match self {
            EventKind::TwitchBits
            | EventKind::TwitchSubNew
            | EventKind::TwitchSubResub
            | EventKind::TwitchGiftSingle
            | EventKind::TwitchGiftMulti
            | EventKind::TwitchChannelPoints => Platform::Twitch,
            EventKind::YoutubeSuperchat
            | EventKind::YoutubeSupersticker
            | EventKind::YoutubeMembershipNew
            | EventKind::YoutubeMembershipMilestone => Platform::YouTube,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TwitchBits => "twitch_bits",
            EventKind::TwitchSubNew => "twitch_sub_new",
            EventKind::TwitchSubResub => "twitch_sub_resub",
            EventKind::TwitchGiftSingle => "twitch_gift_single",
            EventKind::TwitchGiftMulti => "twitch_gift_multi",
            EventKind::TwitchChannelPoints => "twitch_channel_points",
            EventKind::YoutubeSuperchat => "youtube_superchat",
            EventKind::YoutubeSupersticker => "youtube_supersticker",
            EventKind::YoutubeMembershipNew => "youtube_membership_new",
            EventKind::YoutubeMembershipMilestone => "youtube_membership_milestone",
        }
    }
}

/// Subscription tier, constrained to the three Twitch tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    One,
    Two,
    Three,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::One => "1",
            Tier::Two => "2",
            Tier::Three => "3",
        }
    }

    /// Map a provider-raw tier code ("1000"/"2000"/"3000") to a `Tier`.
    /// Unknown codes fall back to tier 1, matching the adapter contract in §4.8.
    pub fn from_provider_code(code: &str) -> Tier {
        match code {
            "2000" => Tier::Two,
            "3000" => Tier::Three,
            _ => Tier::One,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchBits {
    pub amount: i64,
    pub message: String,
    pub anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchSubNew {
    pub tier: Tier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchSubResub {
    pub tier: Tier,
    pub months: u32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchGiftSingle {
    pub tier: Tier,
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchGiftMulti {
    pub tier: Tier,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchChannelPoints {
    pub reward_id: String,
    pub reward_name: String,
    pub cost: i64,
    pub user_input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeSuperchat {
    pub amount: f64,
    pub currency: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeSupersticker {
    pub amount: f64,
    pub currency: String,
    pub sticker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeMembershipNew {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeMembershipMilestone {
    pub level: String,
    pub months: u32,
}

/// Variant-specific payload for a `StreamEvent`. The discriminant doubles as
/// the `EventKind` so there's exactly one place (`StreamEvent::kind`) that
/// can ever disagree with the wrapped data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventData {
    TwitchBits(TwitchBits),
    TwitchSubNew(TwitchSubNew),
    TwitchSubResub(TwitchSubResub),
    TwitchGiftSingle(TwitchGiftSingle),
    TwitchGiftMulti(TwitchGiftMulti),
    TwitchChannelPoints(TwitchChannelPoints),
    YoutubeSuperchat(YoutubeSuperchat),
    YoutubeSupersticker(YoutubeSupersticker),
    YoutubeMembershipNew(YoutubeMembershipNew),
    YoutubeMembershipMilestone(YoutubeMembershipMilestone),
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::TwitchBits(_) => EventKind::TwitchBits,
            EventData::TwitchSubNew(_) => EventKind::TwitchSubNew,
            EventData::TwitchSubResub(_) => EventKind::TwitchSubResub,
            EventData::TwitchGiftSingle(_) => EventKind::TwitchGiftSingle,
            EventData::TwitchGiftMulti(_) => EventKind::TwitchGiftMulti,
            EventData::TwitchChannelPoints(_) => EventKind::TwitchChannelPoints,
            EventData::YoutubeSuperchat(_) => EventKind::YoutubeSuperchat,
            EventData::YoutubeSupersticker(_) => EventKind::YoutubeSupersticker,
            EventData::YoutubeMembershipNew(_) => EventKind::YoutubeMembershipNew,
            EventData::YoutubeMembershipMilestone(_) => EventKind::YoutubeMembershipMilestone,
        }
    }
}

/// A normalized monetization event from either platform.
///
/// Constructed exclusively through the `new_*` functions below so the
/// gift/resub/milestone tag invariants in SPEC_FULL §3 can never drift from
/// the data they describe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: Uuid,
    pub username: String,
    pub timestamp: DateTime<Utc>,
    pub raw_data: Value,
    pub data: EventData,
}

impl StreamEvent {
    fn new(username: impl Into<String>, raw_data: Value, data: EventData) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            timestamp: Utc::now(),
            raw_data,
            data,
        }
    }

    pub fn platform(&self) -> Platform {
        self.data.kind().platform()
    }

    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }

    pub fn new_twitch_bits(
        username: impl Into<String>,
        amount: i64,
        message: impl Into<String>,
        anonymous: bool,
        raw_data: Value,
    ) -> Self {
        let username = if anonymous {
            "Anonymous".to_string()
        } else {
            username.into()
        };
        Self::new(
            username,
            raw_data,
            EventData::TwitchBits(TwitchBits {
                amount,
                message: message.into(),
                anonymous,
            }),
        )
    }

    /// A subscription event. `is_resub` picks the resub vs. new-sub variant —
    /// this is the only place that distinction is decided.
    pub fn new_twitch_sub(
        username: impl Into<String>,
        tier: Tier,
        months: u32,
        message: impl Into<String>,
        is_resub: bool,
        raw_data: Value,
    ) -> Self {
        let data = if is_resub {
            EventData::TwitchSubResub(TwitchSubResub {
                tier,
                months: months.max(1),
                message: message.into(),
            })
        } else {
            EventData::TwitchSubNew(TwitchSubNew { tier })
        };
        Self::new(username, raw_data, data)
    }

    /// A gift-sub event. `count == 1` always yields `gift_single`, `count >= 2`
    /// always yields `gift_multi` — the kind is derived, never passed in.
    pub fn new_twitch_gift(
        username: impl Into<String>,
        tier: Tier,
        count: u32,
        recipient: impl Into<String>,
        anonymous: bool,
        raw_data: Value,
    ) -> Self {
        let username = if anonymous {
            "Anonymous".to_string()
        } else {
            username.into()
        };
        let data = if count >= 2 {
            EventData::TwitchGiftMulti(TwitchGiftMulti { tier, count })
        } else {
            EventData::TwitchGiftSingle(TwitchGiftSingle {
                tier,
                recipient: recipient.into(),
            })
        };
        Self::new(username, raw_data, data)
    }

    pub fn new_twitch_channel_points(
        username: impl Into<String>,
        reward_id: impl Into<String>,
        reward_name: impl Into<String>,
        cost: i64,
        user_input: impl Into<String>,
        raw_data: Value,
    ) -> Self {
        Self::new(
            username,
            raw_data,
            EventData::TwitchChannelPoints(TwitchChannelPoints {
                reward_id: reward_id.into(),
                reward_name: reward_name.into(),
                cost,
                user_input: user_input.into(),
            }),
        )
    }

    pub fn new_youtube_superchat(
        username: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
        message: impl Into<String>,
        raw_data: Value,
    ) -> Self {
        Self::new(
            username,
            raw_data,
            EventData::YoutubeSuperchat(YoutubeSuperchat {
                amount,
                currency: currency.into(),
                message: message.into(),
            }),
        )
    }

    pub fn new_youtube_supersticker(
        username: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
        sticker_id: impl Into<String>,
        raw_data: Value,
    ) -> Self {
        Self::new(
            username,
            raw_data,
            EventData::YoutubeSupersticker(YoutubeSupersticker {
                amount,
                currency: currency.into(),
                sticker_id: sticker_id.into(),
            }),
        )
    }

    /// A membership event. `is_milestone` picks the milestone vs. new-member
    /// variant, mirroring `new_twitch_sub`'s `is_resub`.
    pub fn new_youtube_membership(
        username: impl Into<String>,
        level: impl Into<String>,
        months: u32,
        is_milestone: bool,
        raw_data: Value,
    ) -> Self {
        let data = if is_milestone {
            EventData::YoutubeMembershipMilestone(YoutubeMembershipMilestone {
                level: level.into(),
                months: months.max(1),
            })
        } else {
            EventData::YoutubeMembershipNew(YoutubeMembershipNew {
                level: level.into(),
            })
        };
        Self::new(username, raw_data, data)
    }

    /// Priority for this event's kind, used to order it in the dispatch queue.
    pub fn priority(&self, priorities: &crate::config::PriorityConfig) -> i32 {
        match self.kind() {
            EventKind::TwitchBits => priorities.twitch_bits,
            EventKind::TwitchSubNew | EventKind::TwitchSubResub => priorities.twitch_subs,
            EventKind::TwitchGiftSingle | EventKind::TwitchGiftMulti => {
                priorities.twitch_gift_subs
            }
            EventKind::TwitchChannelPoints => priorities.twitch_channel_points,
            EventKind::YoutubeSuperchat | EventKind::YoutubeSupersticker => {
                priorities.youtube_superchat
            }
            EventKind::YoutubeMembershipNew | EventKind::YoutubeMembershipMilestone => {
                priorities.youtube_membership
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gift_single_count_one() {
        let e = StreamEvent::new_twitch_gift("Bob", Tier::One, 1, "Alice", false, Value::Null);
        assert_eq!(e.kind(), EventKind::TwitchGiftSingle);
    }

    #[test]
    fn gift_multi_count_two_or_more() {
        let e = StreamEvent::new_twitch_gift("Bob", Tier::One, 2, "", false, Value::Null);
        assert_eq!(e.kind(), EventKind::TwitchGiftMulti);
        let e = StreamEvent::new_twitch_gift("Bob", Tier::One, 50, "", false, Value::Null);
        assert_eq!(e.kind(), EventKind::TwitchGiftMulti);
    }

    #[test]
    fn resub_flag_selects_resub_kind() {
        let e = StreamEvent::new_twitch_sub("Bob", Tier::Two, 3, "hi", true, Value::Null);
        assert_eq!(e.kind(), EventKind::TwitchSubResub);
        let e = StreamEvent::new_twitch_sub("Bob", Tier::Two, 1, "", false, Value::Null);
        assert_eq!(e.kind(), EventKind::TwitchSubNew);
    }

    #[test]
    fn milestone_flag_selects_milestone_kind() {
        let e = StreamEvent::new_youtube_membership("Bob", "Gold", 6, true, Value::Null);
        assert_eq!(e.kind(), EventKind::YoutubeMembershipMilestone);
        let e = StreamEvent::new_youtube_membership("Bob", "Gold", 1, false, Value::Null);
        assert_eq!(e.kind(), EventKind::YoutubeMembershipNew);
    }

    #[test]
    fn anonymous_bits_mask_username() {
        let e = StreamEvent::new_twitch_bits("RealName", 500, "hi", true, Value::Null);
        assert_eq!(e.username, "Anonymous");
    }

    #[test]
    fn tier_from_provider_code() {
        assert_eq!(Tier::from_provider_code("1000").as_str(), "1");
        assert_eq!(Tier::from_provider_code("2000").as_str(), "2");
        assert_eq!(Tier::from_provider_code("3000").as_str(), "3");
        assert_eq!(Tier::from_provider_code("bogus").as_str(), "1");
    }
}
