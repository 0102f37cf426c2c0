//! Minimal script host: expands registered `$function[...]` calls, nothing more.

use async_trait::async_trait;
use serenity::model::id::ChannelId;
use std::{ops::Range, sync::Arc};
use tracing::{debug, warn};

use super::{
    context::{escape, unescape, Continuation, FunctionCall, FunctionContext, Invocation},
    error::ScriptError,
};

/// Runs script code for an invocation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn run(&self, invocation: Invocation) -> anyhow::Result<()>;
}

/// Where finished script text goes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScriptOutput: Send + Sync {
    async fn send(&self, channel: ChannelId, content: String) -> anyhow::Result<()>;
}

/// Provider of the functions a script can call.
#[async_trait]
pub trait FunctionHost: Send + Sync {
    fn resolves(&self, name: &str) -> bool;

    async fn call(&self, ctx: FunctionContext<'_>) -> Result<Continuation, ScriptError>;
}

pub struct TemplateInterpreter {
    host: Arc<dyn FunctionHost>,
    output: Arc<dyn ScriptOutput>,
}

impl TemplateInterpreter {
    pub fn new(host: Arc<dyn FunctionHost>, output: Arc<dyn ScriptOutput>) -> Self {
        Self { host, output }
    }

    /// Expands every call left to right, nested calls first, and returns the final text.
    pub async fn evaluate(&self, invocation: &Invocation) -> Result<String, ScriptError> {
        let mut code = invocation.code.replace("$message", &escape(&invocation.message));

        while let Some(call) = find_next_call(&code, |name| self.host.resolves(name)) {
            debug!("Calling ${} in {}", call.name, invocation.script_name);
            let ctx = FunctionContext {
                invocation,
                call,
                code: &code,
            };
            let next = self.host.call(ctx).await?;
            code = next.code;
        }

        Ok(unescape(code.trim()))
    }
}

#[async_trait]
impl Interpreter for TemplateInterpreter {
    async fn run(&self, invocation: Invocation) -> anyhow::Result<()> {
        let content = match self.evaluate(&invocation).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Script {} failed: {}", invocation.script_name, e);
                e.to_string()
            }
        };

        if content.is_empty() {
            return Ok(());
        }
        match invocation.channel_id {
            Some(channel) => self.output.send(channel, content).await,
            None => {
                debug!("Script {} has no channel for its output", invocation.script_name);
                Ok(())
            }
        }
    }
}

/// Finds the next call to run: the leftmost call whose name `known` accepts, or the first
/// call nested in its brackets, so arguments resolve before the call that uses them.
pub fn find_next_call(code: &str, known: impl Fn(&str) -> bool) -> Option<FunctionCall> {
    find_in(code, 0..code.len(), &known)
}

fn find_in(code: &str, range: Range<usize>, known: &impl Fn(&str) -> bool) -> Option<FunctionCall> {
    let region = &code[range.clone()];
    region.match_indices('$').find_map(|(offset, _)| {
        let start = range.start + offset;
        let rest = &code[start + 1..range.end];
        let name_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let name = &rest[..name_len];
        if name.is_empty() || !known(name) {
            return None;
        }

        let after_name = start + 1 + name_len;
        let bracket = code[after_name..range.end]
            .starts_with('[')
            .then(|| closing_bracket(&code[after_name..range.end]))
            .flatten();

        let Some(close) = bracket else {
            return Some(FunctionCall {
                name: name.to_string(),
                inside: None,
                span: start..after_name,
            });
        };

        let inside = after_name + 1..after_name + close;
        find_in(code, inside.clone(), known).or_else(|| {
            Some(FunctionCall {
                name: name.to_string(),
                inside: Some(code[inside].to_string()),
                span: start..after_name + close + 1,
            })
        })
    })
}

/// Byte offset of the `]` matching the `[` at offset 0.
fn closing_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{error::BridgeError, value::ScriptValue};
    use mockall::predicate::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// `$upper[x]` upper-cases, `$count` counts its own calls, `$fail` errors.
    #[derive(Default)]
    struct TestHost {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FunctionHost for TestHost {
        fn resolves(&self, name: &str) -> bool {
            matches!(name, "upper" | "count" | "fail")
        }

        async fn call(&self, ctx: FunctionContext<'_>) -> Result<Continuation, ScriptError> {
            let mut calls = self.calls.lock();
            calls.push(ctx.call.name.clone());
            match ctx.call.name.as_str() {
                "upper" => {
                    let inside = ctx.call.inside.clone().unwrap_or_default();
                    Ok(ctx.set_result(ScriptValue::Text(inside.to_uppercase())))
                }
                "count" => {
                    let counted = calls.iter().filter(|name| *name == "count").count();
                    Ok(ctx.set_result(ScriptValue::Integer(counted as i64)))
                }
                _ => Err(ScriptError::new(ctx.call.name.clone(), BridgeError::NoPlayer, "$fail")),
            }
        }
    }

    fn interpreter(host: Arc<TestHost>, output: MockScriptOutput) -> TemplateInterpreter {
        TemplateInterpreter::new(host, Arc::new(output))
    }

    fn invocation(code: &str, message: &str) -> Invocation {
        Invocation {
            channel_id: Some(ChannelId::new(7)),
            message: message.to_string(),
            script_name: "test".to_string(),
            code: code.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_find_next_call() {
        let known = |name: &str| name == "a" || name == "b";

        let call = find_next_call("x $a[1;$b[2]] y", known).unwrap();
        assert_eq!(call.name, "b");
        assert_eq!(call.inside.as_deref(), Some("2"));
        assert_eq!(call.span, 7..12);

        let call = find_next_call("$unknown[3] $a tail $b[x]", known).unwrap();
        assert_eq!(call.name, "a");
        assert_eq!(call.inside, None);
        assert_eq!(call.span, 12..14);

        let call = find_next_call("$b[unclosed", known).unwrap();
        assert_eq!(call.span, 0..2);

        assert!(find_next_call("costs $5", known).is_none());
    }

    #[tokio::test]
    async fn test_calls_run_left_to_right_nested_first() {
        let host = Arc::new(TestHost::default());
        let interpreter = interpreter(Arc::clone(&host), MockScriptOutput::new());

        let text = interpreter
            .evaluate(&invocation("$upper[n=$count] and $count", ""))
            .await
            .unwrap();

        assert_eq!(text, "N=1 and 2");
        assert_eq!(*host.calls.lock(), vec!["count", "upper", "count"]);
    }

    #[tokio::test]
    async fn test_message_text_is_never_evaluated() {
        let host = Arc::new(TestHost::default());
        let interpreter = interpreter(Arc::clone(&host), MockScriptOutput::new());

        let text = interpreter
            .evaluate(&invocation("$upper[$message]", "hi $count"))
            .await
            .unwrap();

        assert_eq!(text, "HI $COUNT");
        assert_eq!(*host.calls.lock(), vec!["upper"]);
    }

    #[tokio::test]
    async fn test_errors_are_sent_to_the_channel() {
        let mut output = MockScriptOutput::new();
        output
            .expect_send()
            .with(eq(ChannelId::new(7)), eq("❌ `$fail`: no player in this guild, use $joinVoice first".to_string()))
            .times(1)
            .returning(|_, _| Ok(()));
        let interpreter = interpreter(Arc::new(TestHost::default()), output);

        interpreter.run(invocation("before $fail after", "")).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_output_is_not_sent() {
        let mut output = MockScriptOutput::new();
        output.expect_send().never();
        let interpreter = interpreter(Arc::new(TestHost::default()), output);

        interpreter.run(invocation("  ", "")).await.unwrap();
    }
}
