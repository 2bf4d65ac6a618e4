//! Response and trace types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::agents::{AgentResult, Citation, FacilitySummary};
use crate::intent::Intent;

/// One recorded step: the router, each agent invocation, and the aggregator
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    /// "router", an agent name, "self_correction", or "aggregator"
    pub agent: String,
    /// Action tag of the step's output
    pub action: String,
    pub duration_ms: u64,
    /// One-line human summary of what happened
    pub summary: String,
    /// Citations the step produced
    pub citations: Vec<Citation>,
    /// Present when the step failed or timed out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The structured, cited, map-ready answer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Request id
    pub id: String,
    pub query: String,
    pub intent: Intent,
    pub confidence: f64,
    pub agents_used: Vec<String>,
    /// One result per agent that ran, keyed by agent name
    pub agent_results: BTreeMap<String, AgentResult>,
    /// Deduplicated facilities with valid coordinates, ready to plot
    pub map_facilities: Vec<FacilitySummary>,
    pub summary: String,
    pub trace: Vec<TraceStep>,
    /// True when any agent errored or timed out
    pub partial: bool,
    pub total_duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}
