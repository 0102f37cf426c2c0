use lavalink_rs::model::player::Filters;
use std::sync::Arc;
use tracing::debug;

use super::MusicBridge;
use crate::{
    lavalink::{
        filters::{FilterChain, FilterKind, FilterRequest, UnknownFilter},
        PlayerHandle,
    },
    script::{Args, BridgeError, ScriptValue},
};

impl From<UnknownFilter> for BridgeError {
    fn from(UnknownFilter(name): UnknownFilter) -> Self {
        BridgeError::InvalidFilter {
            name,
            valid: FilterKind::valid_names(),
        }
    }
}

fn returned(args: &Args, filters: &Filters) -> ScriptValue {
    match args.flag("returnFilters") {
        Some(true) => ScriptValue::Json(filters.to_json(None)),
        _ => ScriptValue::Null,
    }
}

impl MusicBridge {
    /// `$addFilter[filter;returnFilters?]`, e.g. `$addFilter[nightcore]` or `$addFilter[tremolo:4:0.8]`.
    pub(super) async fn add_filter(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let request: FilterRequest = args.require_text("filter")?.parse()?;

        let mut filters = player.lock().await.filters.clone();
        filters.enable(&request);
        player.set_filters(filters.clone()).await?;

        debug!("🎚️ {} enabled in {}", request.kind, player.guild_id());
        Ok(returned(args, &filters))
    }

    /// `$clearFilters[returnFilters?]`
    pub(super) async fn clear_filters(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let filters = Filters::default();
        player.set_filters(filters.clone()).await?;
        Ok(returned(args, &filters))
    }

    /// `$toggleFilters[filter|filter...;returnFilters?]`. Every name is checked before
    /// anything changes.
    pub(super) async fn toggle_filters(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let names = args.list("filters").ok_or(BridgeError::MissingArgument("filters"))?;
        let requests = names
            .iter()
            .map(|name| name.parse::<FilterRequest>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut filters = player.lock().await.filters.clone();
        for request in &requests {
            let enabled = filters.toggle(request);
            debug!("🎚️ {} {} in {}", request.kind, if enabled { "on" } else { "off" }, player.guild_id());
        }
        player.set_filters(filters.clone()).await?;

        Ok(returned(args, &filters))
    }

    /// `$getFilters[type?]`: the whole filter object, or one of its keys.
    pub(super) async fn get_filters(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let state = player.lock().await;
        Ok(ScriptValue::Json(state.filters.to_json(args.text("type"))))
    }
}
