//! # Script Module
//!
//! The scripting side of the bot: function arguments and results, the minimal
//! template host that expands `$function[...]` calls, and the custom event
//! scripts fed by the node's event stream.

pub mod args;
pub mod context;
pub mod error;
pub mod events;
pub mod interpreter;
pub mod registry;
pub mod value;

pub use args::{ArgKind, ArgSpec, Args};
pub use context::{Continuation, FunctionContext, Invocation};
pub use error::{BridgeError, ScriptError};
pub use events::{EventDispatcher, EventRegistry};
pub use interpreter::{FunctionHost, Interpreter, ScriptOutput, TemplateInterpreter};
pub use registry::{FunctionDescriptor, FunctionRegistry};
pub use value::ScriptValue;
