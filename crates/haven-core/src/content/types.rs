use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    #[default]
    Video,
}

/// A clip presented for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: MediaKind,
    #[serde(default)]
    pub points_value: u64,
    #[serde(default)]
    pub left_action_id: Option<String>,
    #[serde(default)]
    pub right_action_id: Option<String>,
}

impl Content {
    /// Action id selected by swiping in `direction`, if the clip has one.
    pub fn action_for(&self, direction: SwipeDirection) -> Option<&str> {
        match direction {
            SwipeDirection::Left => self.left_action_id.as_deref(),
            SwipeDirection::Right => self.right_action_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
}

impl FromStr for SwipeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(SwipeDirection::Left),
            "right" | "r" => Ok(SwipeDirection::Right),
            other => Err(format!("unknown direction '{other}' (expected left or right)")),
        }
    }
}

/// Alternative label offered by the long-press picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOption {
    pub id: String,
    #[serde(alias = "action_name")]
    pub name: String,
}

/// Clip as published in the IPFS manifest and by the random-clip endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VideoClip {
    pub ipfs_cid: String,
    #[serde(default)]
    pub points_value: u64,
    #[serde(alias = "clip_action", default)]
    pub left_action: Option<String>,
    #[serde(alias = "random_action", default)]
    pub right_action: Option<String>,
}

impl VideoClip {
    pub fn into_content(self, gateway: &str) -> Content {
        Content {
            url: format!("{}/{}", gateway.trim_end_matches('/'), self.ipfs_cid),
            id: self.ipfs_cid,
            kind: MediaKind::Video,
            points_value: self.points_value,
            left_action_id: self.left_action,
            right_action_id: self.right_action,
        }
    }
}
