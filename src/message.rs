//! Structured chat messages.
//!
//! A [`Message`] is an ordered list of coloured text fields. Rendering it (raw JSON text,
//! ANSI, plain) is the host's concern; this module only builds them. The notice
//! functions below are the fixed wording every lifecycle transition uses.

use serde::{Deserialize, Serialize};

/// Chat colours understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colour {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
}

/// One run of text with uniform styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub text: String,
    pub color: Colour,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
}

/// A chat message made of styled fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    fields: Vec<Field>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn field(mut self, text: impl Into<String>, colour: Colour) -> Self {
        self.fields.push(Field {
            text: text.into(),
            color: colour,
            bold: false,
        });
        self
    }

    /// Append a bold field.
    pub fn bold(mut self, text: impl Into<String>, colour: Colour) -> Self {
        self.fields.push(Field {
            text: text.into(),
            color: colour,
            bold: true,
        });
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Concatenated text with styling dropped.
    pub fn plain_text(&self) -> String {
        self.fields.iter().map(|f| f.text.as_str()).collect()
    }

    /// JSON array form, as used by raw-text chat protocols.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// Teleport request notices
// ============================================================================

pub fn request_received(creator: &str) -> Message {
    Message::new()
        .field("You have been sent a teleport request by ", Colour::Gold)
        .field(format!("{}.\n", creator), Colour::Blue)
        .field("Use ", Colour::Gold)
        .field("!tpaccept ", Colour::Blue)
        .field("to accept the request, or ", Colour::Gold)
        .field("!tpdeny ", Colour::Blue)
        .field("to decline it.", Colour::Gold)
}

pub fn request_sent(recipient: &str) -> Message {
    Message::new()
        .field("Your request to ", Colour::Gold)
        .field(format!("{} ", recipient), Colour::Blue)
        .field("has been sent.", Colour::Gold)
}

pub fn teleporting_to(recipient: &str) -> Message {
    Message::new()
        .field("Teleporting you to ", Colour::Gold)
        .field(format!("{}.", recipient), Colour::Blue)
}

pub fn being_teleported_to_by(creator: &str) -> Message {
    Message::new()
        .field("You are being teleported to by ", Colour::Gold)
        .field(format!("{}.", creator), Colour::Blue)
}

pub fn request_declined(recipient: &str) -> Message {
    Message::new()
        .field(format!("{} ", recipient), Colour::Blue)
        .field("has declined your teleport request.", Colour::Gold)
}

pub fn request_denied() -> Message {
    Message::new().field("Request denied.", Colour::Red)
}

pub fn outgoing_expired(recipient: &str) -> Message {
    Message::new()
        .field("Your TPA to ", Colour::Gold)
        .field(format!("{} ", recipient), Colour::Blue)
        .field("has expired.", Colour::Gold)
}

pub fn incoming_expired(creator: &str) -> Message {
    Message::new()
        .field("Your TPA from ", Colour::Gold)
        .field(format!("{} ", creator), Colour::Blue)
        .field("has expired.", Colour::Gold)
}

// ============================================================================
// Rejections
// ============================================================================

pub fn player_not_found() -> Message {
    Message::new().field("A player with that username was not found.", Colour::Red)
}

pub fn outgoing_request_exists() -> Message {
    Message::new().field("You already have an active outgoing TPA request.", Colour::Red)
}

pub fn incoming_request_exists() -> Message {
    Message::new().field(
        "The other player already has a pending TPA request.",
        Colour::Red,
    )
}

pub fn no_pending_request() -> Message {
    Message::new().field("You do not have a pending TPA.", Colour::Red)
}

pub fn reload_failed(reason: &str) -> Message {
    Message::new()
        .bold("Reload failed: ", Colour::Red)
        .field(reason, Colour::Gold)
}

// ============================================================================
// Module notices
// ============================================================================

pub fn reloading() -> Message {
    Message::new().field("Reloading all plugins...", Colour::Blue)
}

pub fn reloaded() -> Message {
    Message::new().field("Plugins reloaded.", Colour::Green)
}

pub fn update_available() -> Message {
    Message::new()
        .field("A new version of ", Colour::Gold)
        .field("Essentials ", Colour::Blue)
        .field("is available.", Colour::Gold)
}
