use serenity::model::id::{ChannelId, GuildId, UserId};
use std::ops::Range;

use super::value::ScriptValue;

/// Stand-in for `$` inside text that must not be read as a function call
/// (function results, user messages). Restored before output.
pub const ESCAPED_DOLLAR: char = '\u{E000}';

pub fn escape(text: &str) -> String {
    text.replace('$', &ESCAPED_DOLLAR.to_string())
}

pub fn unescape(text: &str) -> String {
    text.replace(ESCAPED_DOLLAR, "$")
}

/// One script run: where it runs, for whom, and its code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
    pub author: Option<UserId>,
    /// Voice channel the author is in, when known
    pub author_voice: Option<ChannelId>,
    /// Message text after the command name, available as `$message`
    pub message: String,
    pub script_name: String,
    pub code: String,
    /// Payload of the node event that triggered the run
    pub event: Option<serde_json::Value>,
}

/// A `$name[inside]` call located in the code.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub inside: Option<String>,
    /// Byte range of the whole call, brackets included.
    pub span: Range<usize>,
}

/// Code to continue with after a function ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Continuation {
    pub code: String,
}

pub struct FunctionContext<'a> {
    pub invocation: &'a Invocation,
    pub call: FunctionCall,
    pub code: &'a str,
}

impl FunctionContext<'_> {
    /// Replaces the call with its result. `$` in the result is escaped so data such as
    /// track titles is never evaluated.
    pub fn set_result(&self, value: ScriptValue) -> Continuation {
        let mut code = String::with_capacity(self.code.len());
        code.push_str(&self.code[..self.call.span.start]);
        code.push_str(&escape(&value.to_string()));
        code.push_str(&self.code[self.call.span.end..]);
        Continuation { code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_result_splices_and_escapes() {
        let invocation = Invocation::default();
        let code = "Now: $trackInfo[title]!";
        let ctx = FunctionContext {
            invocation: &invocation,
            call: FunctionCall {
                name: "trackInfo".to_string(),
                inside: Some("title".to_string()),
                span: 5..22,
            },
            code,
        };

        let next = ctx.set_result(ScriptValue::from("$uicideboy$"));
        assert!(!next.code.contains('$'));
        assert_eq!(unescape(&next.code), "Now: $uicideboy$!");
    }
}
