//! Client core for the Agenta backend API: apps, variants, test sets,
//! evaluations and templates.
//!
//! # Overview
//! `AgentaClient` builds `HttpRequest` values and parses `HttpResponse`
//! values without touching the network (host-does-IO pattern).
//! `AgentaApi` pairs it with a `Transport` to offer one call per backend
//! operation.
//!
//! # Design
//! - The base URL comes from `ClientConfig`, passed in at construction.
//! - Request bodies are typed per endpoint; the one dynamic body, the
//!   variant generate call, is assembled in `params`.
//! - List queries that UI code polls go through a caller-owned `QueryCache`.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod openapi;
pub mod params;
pub mod transform;
pub mod transport;
pub mod types;

pub use api::{AgentaApi, TestsetsList};
pub use cache::{AlwaysRevalidate, MaxAge, QueryCache, QueryOptions, QueryState, RevalidationPolicy};
pub use client::AgentaClient;
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use params::GenerateBody;
pub use transport::{Transport, UreqTransport};
pub use types::{
    App, AppTemplate, CreateEvaluation, Evaluation, EvaluationScenario, EvaluationType,
    ParamType, Parameter, Template, Testset, TestsetSummary, Variant, VariantParameters,
};
