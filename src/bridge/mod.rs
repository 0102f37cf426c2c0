//! # Bridge Module
//!
//! The music functions scripts can call. Each one parses its declared arguments,
//! finds the guild's player when it needs one, calls the node client and hands a
//! script value back to the host.
//!
//! ## Families
//!
//! - [`voice`] - joining and leaving voice channels
//! - [`playback`] - play, skip, seek, pause, volume, loop, autoplay
//! - [`queue`] - queue inspection, shuffling, removal, track info
//! - [`filters`] - audio filters
//! - [`info`] - search, event data and connection diagnostics

pub mod filters;
pub mod info;
pub mod playback;
pub mod queue;
pub mod voice;

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    lavalink::{NodeManager, PlayerHandle},
    script::{
        args::{self, ArgKind, ArgSpec, Args},
        BridgeError, Continuation, FunctionContext, FunctionDescriptor, FunctionHost,
        FunctionRegistry, Invocation, ScriptError, ScriptValue,
    },
};

pub use voice::VoiceGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeFunction {
    JoinVoice,
    LeaveVoice,
    PlayTrack,
    AutoPlay,
    TrackInfo,
    AddFilter,
    ClearFilters,
    ToggleFilters,
    GetFilters,
    Seek,
    SkipTrack,
    SkipTo,
    Stop,
    ClearQueue,
    Pause,
    Resume,
    SetVolume,
    Volume,
    ShuffleQueue,
    UnShuffleQueue,
    SearchTrack,
    VoicePing,
    LavalinkPing,
    PlayerStatus,
    Queue,
    LoopMode,
    Loop,
    LoopStatus,
    RemoveTrack,
    QueueLength,
    EventData,
}

const RETURN_STATE: &[ArgSpec] = &[ArgSpec::with_default("returnState", ArgKind::Bool, "false")];
const RETURN_FILTERS: &[ArgSpec] = &[ArgSpec::with_default("returnFilters", ArgKind::Bool, "false")];

pub static FUNCTIONS: &[FunctionDescriptor<BridgeFunction>] = &[
    FunctionDescriptor {
        name: "joinVoice",
        aliases: &["joinVC"],
        usage: "$joinVoice[voiceId?;selfDeaf?;selfMute?;returnChannel?]",
        args: &[
            ArgSpec::optional("voiceId", ArgKind::Snowflake),
            ArgSpec::with_default("selfDeaf", ArgKind::Bool, "true"),
            ArgSpec::with_default("selfMute", ArgKind::Bool, "false"),
            ArgSpec::with_default("returnChannel", ArgKind::Bool, "false"),
        ],
        handler: BridgeFunction::JoinVoice,
    },
    FunctionDescriptor {
        name: "leaveVoice",
        aliases: &[],
        usage: "$leaveVoice[guildId?]",
        args: &[ArgSpec::optional("guildId", ArgKind::Snowflake)],
        handler: BridgeFunction::LeaveVoice,
    },
    FunctionDescriptor {
        name: "playTrack",
        aliases: &[],
        usage: "$playTrack[query;source?]",
        args: &[
            ArgSpec::required("query", ArgKind::Text),
            ArgSpec::with_default("source", ArgKind::Text, "youtube"),
        ],
        handler: BridgeFunction::PlayTrack,
    },
    FunctionDescriptor {
        name: "autoPlay",
        aliases: &[],
        usage: "$autoPlay[enable?;returnState?]",
        args: &[
            ArgSpec::optional("enable", ArgKind::Bool),
            ArgSpec::with_default("returnState", ArgKind::Bool, "false"),
        ],
        handler: BridgeFunction::AutoPlay,
    },
    FunctionDescriptor {
        name: "trackInfo",
        aliases: &[],
        usage: "$trackInfo[property?;position?]",
        args: &[
            ArgSpec::with_default("property", ArgKind::Text, "title"),
            ArgSpec::with_default("position", ArgKind::Integer, "1"),
        ],
        handler: BridgeFunction::TrackInfo,
    },
    FunctionDescriptor {
        name: "addFilter",
        aliases: &[],
        usage: "$addFilter[filter;returnFilters?]",
        args: &[
            ArgSpec::required("filter", ArgKind::Text),
            ArgSpec::with_default("returnFilters", ArgKind::Bool, "false"),
        ],
        handler: BridgeFunction::AddFilter,
    },
    FunctionDescriptor {
        name: "clearFilters",
        aliases: &[],
        usage: "$clearFilters[returnFilters?]",
        args: RETURN_FILTERS,
        handler: BridgeFunction::ClearFilters,
    },
    FunctionDescriptor {
        name: "toggleFilters",
        aliases: &[],
        usage: "$toggleFilters[filter|filter...;returnFilters?]",
        args: &[
            ArgSpec::required("filters", ArgKind::List),
            ArgSpec::with_default("returnFilters", ArgKind::Bool, "false"),
        ],
        handler: BridgeFunction::ToggleFilters,
    },
    FunctionDescriptor {
        name: "getFilters",
        aliases: &[],
        usage: "$getFilters[type?]",
        args: &[ArgSpec::optional("type", ArgKind::Text)],
        handler: BridgeFunction::GetFilters,
    },
    FunctionDescriptor {
        name: "seek",
        aliases: &["seekTo"],
        usage: "$seek[ms]",
        args: &[ArgSpec::required("ms", ArgKind::Integer)],
        handler: BridgeFunction::Seek,
    },
    FunctionDescriptor {
        name: "skipTrack",
        aliases: &[],
        usage: "$skipTrack",
        args: &[],
        handler: BridgeFunction::SkipTrack,
    },
    FunctionDescriptor {
        name: "skipTo",
        aliases: &[],
        usage: "$skipTo[position;returnTrack?]",
        args: &[
            ArgSpec::required("position", ArgKind::Integer),
            ArgSpec::with_default("returnTrack", ArgKind::Bool, "false"),
        ],
        handler: BridgeFunction::SkipTo,
    },
    FunctionDescriptor {
        name: "stop",
        aliases: &["stopPlayer"],
        usage: "$stop",
        args: &[],
        handler: BridgeFunction::Stop,
    },
    FunctionDescriptor {
        name: "clearQueue",
        aliases: &[],
        usage: "$clearQueue",
        args: &[],
        handler: BridgeFunction::ClearQueue,
    },
    FunctionDescriptor {
        name: "pause",
        aliases: &["pauseTrack"],
        usage: "$pause[returnState?]",
        args: RETURN_STATE,
        handler: BridgeFunction::Pause,
    },
    FunctionDescriptor {
        name: "resumeTrack",
        aliases: &["resume"],
        usage: "$resumeTrack[returnState?]",
        args: RETURN_STATE,
        handler: BridgeFunction::Resume,
    },
    FunctionDescriptor {
        name: "setVolume",
        aliases: &[],
        usage: "$setVolume[volume;returnVolume?]",
        args: &[
            ArgSpec::required("volume", ArgKind::Integer),
            ArgSpec::with_default("returnVolume", ArgKind::Bool, "false"),
        ],
        handler: BridgeFunction::SetVolume,
    },
    FunctionDescriptor {
        name: "volume",
        aliases: &[],
        usage: "$volume[volume?]",
        args: &[ArgSpec::optional("volume", ArgKind::Integer)],
        handler: BridgeFunction::Volume,
    },
    FunctionDescriptor {
        name: "shuffleQueue",
        aliases: &[],
        usage: "$shuffleQueue[returnQueue?;returnOldQueue?]",
        args: &[
            ArgSpec::with_default("returnQueue", ArgKind::Bool, "false"),
            ArgSpec::with_default("returnOldQueue", ArgKind::Bool, "false"),
        ],
        handler: BridgeFunction::ShuffleQueue,
    },
    FunctionDescriptor {
        name: "unShuffleQueue",
        aliases: &[],
        usage: "$unShuffleQueue[returnQueue?]",
        args: &[ArgSpec::with_default("returnQueue", ArgKind::Bool, "false")],
        handler: BridgeFunction::UnShuffleQueue,
    },
    FunctionDescriptor {
        name: "searchTrack",
        aliases: &["search"],
        usage: "$searchTrack[query;index?;format?;source?]",
        args: &[
            ArgSpec::required("query", ArgKind::Text),
            ArgSpec::with_default("index", ArgKind::Text, "0"),
            ArgSpec::with_default("format", ArgKind::Bool, "false"),
            ArgSpec::with_default("source", ArgKind::Text, "youtube"),
        ],
        handler: BridgeFunction::SearchTrack,
    },
    FunctionDescriptor {
        name: "voicePing",
        aliases: &[],
        usage: "$voicePing",
        args: &[],
        handler: BridgeFunction::VoicePing,
    },
    FunctionDescriptor {
        name: "lavalinkPing",
        aliases: &[],
        usage: "$lavalinkPing",
        args: &[],
        handler: BridgeFunction::LavalinkPing,
    },
    FunctionDescriptor {
        name: "playerStatus",
        aliases: &[],
        usage: "$playerStatus",
        args: &[],
        handler: BridgeFunction::PlayerStatus,
    },
    FunctionDescriptor {
        name: "queue",
        aliases: &[],
        usage: "$queue[page?;limit?;format?]",
        args: &[
            ArgSpec::with_default("page", ArgKind::Integer, "1"),
            ArgSpec::with_default("limit", ArgKind::Integer, "10"),
            ArgSpec::with_default("format", ArgKind::Text, "{position}. {title}"),
        ],
        handler: BridgeFunction::Queue,
    },
    FunctionDescriptor {
        name: "loopMode",
        aliases: &[],
        usage: "$loopMode[mode?]",
        args: &[ArgSpec::optional("mode", ArgKind::Text)],
        handler: BridgeFunction::LoopMode,
    },
    FunctionDescriptor {
        name: "loop",
        aliases: &[],
        usage: "$loop[type?]",
        args: &[ArgSpec::with_default("type", ArgKind::Text, "track")],
        handler: BridgeFunction::Loop,
    },
    FunctionDescriptor {
        name: "loopStatus",
        aliases: &[],
        usage: "$loopStatus",
        args: &[],
        handler: BridgeFunction::LoopStatus,
    },
    FunctionDescriptor {
        name: "removeTrack",
        aliases: &[],
        usage: "$removeTrack[position]",
        args: &[ArgSpec::required("position", ArgKind::Integer)],
        handler: BridgeFunction::RemoveTrack,
    },
    FunctionDescriptor {
        name: "queueLength",
        aliases: &[],
        usage: "$queueLength",
        args: &[],
        handler: BridgeFunction::QueueLength,
    },
    FunctionDescriptor {
        name: "eventData",
        aliases: &[],
        usage: "$eventData[key?]",
        args: &[ArgSpec::optional("key", ArgKind::Text)],
        handler: BridgeFunction::EventData,
    },
];

/// Script functions backed by the node client.
pub struct MusicBridge {
    node: Arc<NodeManager>,
    voice: Arc<dyn VoiceGateway>,
    registry: FunctionRegistry<BridgeFunction>,
}

impl MusicBridge {
    pub fn new(node: Arc<NodeManager>, voice: Arc<dyn VoiceGateway>) -> Self {
        Self {
            node,
            voice,
            registry: FunctionRegistry::new(FUNCTIONS),
        }
    }

    fn player(&self, invocation: &Invocation) -> Result<Arc<PlayerHandle>, BridgeError> {
        invocation
            .guild_id
            .and_then(|guild_id| self.node.get_player(guild_id))
            .ok_or(BridgeError::NoPlayer)
    }

    pub async fn invoke(
        &self,
        function: BridgeFunction,
        invocation: &Invocation,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        // Everything but joining, leaving, searching and event data works on the current guild's player
        let player = || self.player(invocation);

        match function {
            BridgeFunction::JoinVoice => self.join_voice(invocation, args).await,
            BridgeFunction::SearchTrack => self.search_track(invocation, args).await,
            BridgeFunction::LeaveVoice => self.leave_voice(invocation, args).await,
            BridgeFunction::EventData => self.event_data(invocation, args),
            BridgeFunction::PlayTrack => self.play_track(&player()?, invocation, args).await,
            BridgeFunction::AutoPlay => self.auto_play(&player()?, invocation, args).await,
            BridgeFunction::TrackInfo => self.track_info(&player()?, args).await,
            BridgeFunction::AddFilter => self.add_filter(&player()?, args).await,
            BridgeFunction::ClearFilters => self.clear_filters(&player()?, args).await,
            BridgeFunction::ToggleFilters => self.toggle_filters(&player()?, args).await,
            BridgeFunction::GetFilters => self.get_filters(&player()?, args).await,
            BridgeFunction::Seek => self.seek(&player()?, args).await,
            BridgeFunction::SkipTrack => self.skip_track(&player()?).await,
            BridgeFunction::SkipTo => self.skip_to(&player()?, args).await,
            BridgeFunction::Stop => self.stop(&player()?).await,
            BridgeFunction::ClearQueue => self.clear_queue(&player()?).await,
            BridgeFunction::Pause => self.set_paused(&player()?, args, true).await,
            BridgeFunction::Resume => self.set_paused(&player()?, args, false).await,
            BridgeFunction::SetVolume => self.set_volume(&player()?, args).await,
            BridgeFunction::Volume => self.volume(&player()?, args).await,
            BridgeFunction::ShuffleQueue => self.shuffle_queue(&player()?, args).await,
            BridgeFunction::UnShuffleQueue => self.unshuffle_queue(&player()?, args).await,
            BridgeFunction::VoicePing => self.voice_ping(&player()?).await,
            BridgeFunction::LavalinkPing => self.lavalink_ping(&player()?).await,
            BridgeFunction::PlayerStatus => self.player_status(&player()?).await,
            BridgeFunction::Queue => self.queue_page(&player()?, args).await,
            BridgeFunction::LoopMode => self.loop_mode(&player()?, args).await,
            BridgeFunction::Loop => self.toggle_loop(&player()?, args).await,
            BridgeFunction::LoopStatus => self.loop_status(&player()?).await,
            BridgeFunction::RemoveTrack => self.remove_track(&player()?, args).await,
            BridgeFunction::QueueLength => self.queue_length(&player()?).await,
        }
    }
}

#[async_trait]
impl FunctionHost for MusicBridge {
    fn resolves(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    async fn call(&self, ctx: FunctionContext<'_>) -> Result<Continuation, ScriptError> {
        let Some(descriptor) = self.registry.get(&ctx.call.name) else {
            // Unknown names are left in the text as they are
            return Ok(Continuation { code: ctx.code.to_string() });
        };

        let result = match args::parse(descriptor.args, ctx.call.inside.as_deref()) {
            Ok(args) => self.invoke(descriptor.handler, ctx.invocation, &args).await,
            Err(e) => Err(e),
        };

        result
            .map(|value| ctx.set_result(value))
            .map_err(|source| ScriptError::new(descriptor.name, source, descriptor.usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::voice::MockVoiceGateway;
    use crate::lavalink::client::MockNodeClient;
    use crate::script::TemplateInterpreter;
    use crate::script::interpreter::MockScriptOutput;
    use crate::test_support::{bridge_with, invocation, manager_with};

    #[test]
    fn test_every_function_has_a_unique_name() {
        let registry = FunctionRegistry::new(FUNCTIONS);
        for descriptor in FUNCTIONS {
            assert_eq!(registry.get(descriptor.name).map(|d| d.handler), Some(descriptor.handler));
            for alias in descriptor.aliases {
                assert_eq!(registry.get(alias).map(|d| d.handler), Some(descriptor.handler));
            }
        }
        assert!(registry.contains("joinVC"));
        assert!(registry.contains("stopPlayer"));
    }

    #[tokio::test]
    async fn test_functions_without_player_fail_before_any_node_call() {
        // Any node call would panic on the bare mocks
        let bridge = bridge_with(manager_with(MockNodeClient::new()), MockVoiceGateway::new());
        let args = Args::default();

        let needs_player = |f: &BridgeFunction| {
            !matches!(
                f,
                BridgeFunction::JoinVoice | BridgeFunction::SearchTrack | BridgeFunction::EventData
            )
        };
        for descriptor in FUNCTIONS.iter().filter(|d| needs_player(&d.handler)) {
            let result = bridge.invoke(descriptor.handler, &invocation(""), &args).await;
            assert!(
                matches!(result, Err(BridgeError::NoPlayer)),
                "${} did not report a missing player",
                descriptor.name
            );
        }
    }

    #[tokio::test]
    async fn test_bad_arguments_surface_as_script_errors() {
        let bridge = Arc::new(bridge_with(
            manager_with(MockNodeClient::new()),
            MockVoiceGateway::new(),
        ));
        let interpreter = TemplateInterpreter::new(bridge, Arc::new(MockScriptOutput::new()));

        let error = interpreter
            .evaluate(&invocation("$searchTrack[]"))
            .await
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "❌ `$searchTrack`: missing argument `query` (usage: `$searchTrack[query;index?;format?;source?]`)"
        );
    }
}
