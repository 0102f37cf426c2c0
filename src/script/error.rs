use thiserror::Error;

use crate::lavalink::NodeError;

/// Why a script function refused to run or failed.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no player in this guild, use $joinVoice first")]
    NoPlayer,

    #[error("this function only works inside a guild")]
    NoGuild,

    #[error("no voice channel given and the author is not in one")]
    NoVoiceChannel,

    #[error("missing argument `{0}`")]
    MissingArgument(&'static str),

    #[error("invalid {name} `{value}`, expected {expected}")]
    InvalidArgument {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("unknown filter `{name}`, valid filters: {valid}")]
    InvalidFilter { name: String, valid: String },

    #[error("No tracks found.")]
    NoTracks,

    #[error(transparent)]
    Node(#[from] NodeError),
}

impl BridgeError {
    pub fn invalid(name: &'static str, value: impl Into<String>, expected: &'static str) -> Self {
        BridgeError::InvalidArgument {
            name,
            value: value.into(),
            expected,
        }
    }
}

/// A failed function call as shown to the script author.
#[derive(Debug, Error)]
#[error("❌ `${function}`: {source}{}", usage_hint(.usage))]
pub struct ScriptError {
    pub function: String,
    #[source]
    pub source: BridgeError,
    /// Call signature, shown when an argument is missing
    pub usage: Option<&'static str>,
}

impl ScriptError {
    pub fn new(function: impl Into<String>, source: BridgeError, usage: &'static str) -> Self {
        let usage = matches!(source, BridgeError::MissingArgument(_)).then_some(usage);
        Self {
            function: function.into(),
            source,
            usage,
        }
    }
}

fn usage_hint(usage: &Option<&'static str>) -> String {
    usage.map(|u| format!(" (usage: `{}`)", u)).unwrap_or_default()
}
