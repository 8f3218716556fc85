//! The AG-UI gateway: HTTP surface, per-run orchestration, and the
//! framing/aggregation pipeline that sits between an [`ag_domain::runner::AgentRunner`]
//! and a client's SSE stream.

pub mod aggregator;
pub mod api;
pub mod cli;
pub mod runtime;
pub mod state;
pub mod translator;
