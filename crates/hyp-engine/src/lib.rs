//! hyp Engine - declarative hypermedia engine
//!
//! Markup attributes (`h-get`, `h-trigger`, `h-swap`, ...) describe requests,
//! how responses are merged into the live tree, and how navigation history is
//! recorded - no per-element glue code. The engine is headless: the host owns
//! the transport (see `hyp_net::Transport`), delivers input events through
//! [`Engine::fire_event`], and drives the engine's single-threaded executor.
//!
//! Core subsystems:
//! - request-lifecycle orchestrator (trigger binding, sync policy, dispatch)
//! - morph reconciliation (identity-preserving tree diff/patch)
//! - swap executor and out-of-band fragment processor
//! - history integrator (navigation snapshots, back/forward replay)
//! - side channels: server-push routing, polling, link prefetching

pub mod attrs;
mod config;
mod engine;
mod history;
mod morph;
mod notify;
mod oob;
mod orchestrator;
mod poll;
mod prefetch;
mod sse;
mod state;
mod swap;
mod trigger;

pub use engine::{Engine, EventInit, ScrollRequest};
pub use history::{HistoryStack, NavigationState, ReplayOutcome};
pub use morph::morph;
pub use notify::{names, Notice};
pub use oob::process_oob;
pub use prefetch::{PrefetchCache, PrefetchResult};
pub use swap::{apply_swap, StrategyParseError, SwapStrategy};
pub use trigger::{parse_interval, parse_triggers, TriggerSpec};
