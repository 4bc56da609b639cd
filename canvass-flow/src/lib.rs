//! # Canvass Flow Engine
//!
//! The core of the Canvass survey platform:
//! - Question-kind handler registry (load / delete / update-decision /
//!   demo-generation / aggregation per kind)
//! - Branch resolver: one-hop conditional routing between question groups
//! - Flow graph builder: display graph of the authored configuration
//! - Completion tracker: per-respondent completion, retake gating, and
//!   the "survey completed" notification
//! - Entity query modules over the shared SQLite store

pub mod aggregate;
pub mod completion;
pub mod db;
pub mod demo;
pub mod flow;
pub mod kinds;

pub use canvass_common::{Error, Result};
pub use completion::is_respondent_complete;
pub use flow::graph::build_flow_graph;
pub use flow::resolver::{resolve_next_group, FlowContext, FlowStep};
pub use kinds::handler;
