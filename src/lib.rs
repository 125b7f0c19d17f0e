//! Claudette: a cost-aware LLM request router.
//!
//! Routes chat completions across configured backends by weighing
//! cost, latency, priority, and recent success rate; caches responses
//! at two tiers keyed by request fingerprint; supervises every
//! upstream call with deadlines, retry, and per-backend circuit
//! breaking; and optionally enriches prompts through a side-channel
//! RAG worker pool before dispatch. Exposed over a JSON-RPC 2.0 stdio
//! transport as four tools: `claudette_query`, `claudette_status`,
//! `claudette_analyze`, `claudette_health`.

pub mod backend;
pub mod cache;
pub mod config;
pub mod cost;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod rag;
pub mod reliability;
pub mod response;
pub mod router;
pub mod rpc;
pub mod secret;
pub mod supervisor;

pub use error::{ ClaudetteError, Result };
pub use fingerprint::{ Fingerprint, Request, RequestOptions };
pub use response::Response;
pub use router::Router;
pub use supervisor::Supervisor;
