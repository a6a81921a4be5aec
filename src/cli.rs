//! CLI domain: parse, route and output only.
//! Operations, compilers and the dispatcher live elsewhere; this layer wires them to argv.

mod output;
mod parse;
mod route;

pub use output::{emit, write_rendered};
pub use parse::{split_global_flags, GlobalArgs, Invocation};
pub use route::{Response, RunContext};
