//! Users as published on the awareness channel.

use serde::{Deserialize, Serialize};

/// Cursor colors handed out to users without an explicit color
pub const DEFAULT_PALETTE: [&str; 8] = [
    "#3b82f6", // blue
    "#8b5cf6", // purple
    "#10b981", // green
    "#f59e0b", // amber
    "#ef4444", // red
    "#ec4899", // pink
    "#06b6d4", // cyan
    "#84cc16", // lime
];

/// Identity published by a session under the `user` awareness field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollabUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl CollabUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: String::new(),
            avatar: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
}

/// A peer as delivered to the UI
#[derive(Debug, Clone, PartialEq)]
pub struct AwarenessUser {
    pub user: CollabUser,
    pub cursor: Option<Cursor>,
    pub selected_node_id: Option<String>,
}

impl AwarenessUser {
    /// Equal in everything but the cursor
    pub fn same_identity(&self, other: &AwarenessUser) -> bool {
        self.user == other.user && self.selected_node_id == other.selected_node_id
    }
}

/// Stable color for `user_id`: a 31-multiplier string hash over UTF-16 code
/// units, with 32-bit wrapping on the shifted term, reduced into `palette`.
/// Returns `None` for an empty palette.
pub fn user_color<'a>(user_id: &str, palette: &'a [String]) -> Option<&'a str> {
    if palette.is_empty() {
        return None;
    }

    let mut hash = 0.0_f64;
    for unit in user_id.encode_utf16() {
        let shifted = to_int32(hash).wrapping_shl(5);
        hash = f64::from(unit) + (f64::from(shifted) - hash);
    }

    let index = (hash.abs() % palette.len() as f64) as usize;
    palette.get(index).map(String::as_str)
}

fn to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    const TWO_32: f64 = 4_294_967_296.0;
    let wrapped = value.trunc().rem_euclid(TWO_32);
    if wrapped >= TWO_32 / 2.0 {
        (wrapped - TWO_32) as i32
    } else {
        wrapped as i32
    }
}
