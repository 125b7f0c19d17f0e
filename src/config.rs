//! Startup configuration: the recognised TOML shape and nothing else.
//!
//! Every struct here derives `deny_unknown_fields` so an unrecognised key
//! is a load-time error rather than a silently ignored typo.

mod private
{
  use crate::error::{ ClaudetteError, Result };
  use serde::{ Deserialize, Serialize };
  use std::path::Path;

  /// Root configuration, mirroring the recognised option set.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct Config
  {
    /// Configured backends, in descriptor form.
    pub backends : Vec< BackendConfig >,
    /// Cache tier configuration.
    #[ serde( default ) ]
    pub cache : CacheConfig,
    /// Router scoring/concurrency configuration.
    #[ serde( default ) ]
    pub router : RouterConfig,
    /// Health monitor configuration.
    #[ serde( default ) ]
    pub health : HealthConfig,
    /// Retry/backoff configuration.
    #[ serde( default ) ]
    pub retry : RetryConfig,
    /// RAG multiplexer configuration.
    #[ serde( default ) ]
    pub rag : RagConfig,
    /// Server mode.
    #[ serde( default ) ]
    pub server : ServerConfig,
  }

  impl Config
  {
    /// Loads configuration from a TOML file on disk.
    pub fn load_from_file( path : &Path ) -> Result< Self >
    {
      let text = std::fs::read_to_string( path )
        .map_err( | e | ClaudetteError::InvalidRequest( format!( "cannot read config {}: {e}", path.display() ) ) )?;
      Self::load_from_str( &text )
    }

    /// Parses configuration from a TOML string.
    pub fn load_from_str( text : &str ) -> Result< Self >
    {
      let config : Self = toml::from_str( text )?;
      config.validate()?;
      Ok( config )
    }

    /// Rejects structurally valid-but-nonsensical configuration (duplicate
    /// backend ids, empty backend set, inverted weight bounds).
    pub fn validate( &self ) -> Result< () >
    {
      if self.backends.is_empty()
      {
        return Err( ClaudetteError::InvalidRequest( "at least one backend must be configured".into() ) );
      }

      let mut seen = std::collections::HashSet::new();
      for backend in &self.backends
      {
        if !seen.insert( &backend.id )
        {
          return Err( ClaudetteError::InvalidRequest( format!( "duplicate backend id: {}", backend.id ) ) );
        }
      }

      Ok( () )
    }
  }

  /// One backend's static descriptor configuration.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct BackendConfig
  {
    /// Unique backend id.
    pub id : String,
    /// Backend protocol kind. Only `openai_compatible` is recognised.
    pub kind : String,
    /// Base URL, e.g. `https://api.openai.com`.
    pub base_url : String,
    /// Name of the environment variable carrying the API key.
    pub auth_ref : String,
    /// Default model name used unless overridden per-request.
    pub model : String,
    /// Cost per input token, in the configured currency.
    pub cost_in : rust_decimal::Decimal,
    /// Cost per output token, in the configured currency.
    pub cost_out : rust_decimal::Decimal,
    /// Selection priority; lower is tried first on ties.
    #[ serde( default ) ]
    pub priority : u32,
    /// Operator intent: disabled backends are never selected.
    #[ serde( default = "default_true" ) ]
    pub enabled : bool,
    /// Per-operation timeout budgets.
    #[ serde( default ) ]
    pub timeouts : TimeoutsConfig,
  }

  /// Per-operation deadline budgets, in milliseconds.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct TimeoutsConfig
  {
    /// Health check budget.
    #[ serde( default = "default_health_timeout_ms" ) ]
    pub health_ms : u64,
    /// Simple chat call budget.
    #[ serde( default = "default_simple_timeout_ms" ) ]
    pub simple_ms : u64,
    /// Complex chat call budget.
    #[ serde( default = "default_complex_timeout_ms" ) ]
    pub complex_ms : u64,
  }

  impl Default for TimeoutsConfig
  {
    fn default() -> Self
    {
      Self
      {
        health_ms : default_health_timeout_ms(),
        simple_ms : default_simple_timeout_ms(),
        complex_ms : default_complex_timeout_ms(),
      }
    }
  }

  fn default_health_timeout_ms() -> u64 { 8_000 }
  fn default_simple_timeout_ms() -> u64 { 20_000 }
  fn default_complex_timeout_ms() -> u64 { 45_000 }
  fn default_true() -> bool { true }

  /// Cache tier configuration.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct CacheConfig
  {
    /// Time-to-live for cache entries, in seconds. `0` disables caching.
    #[ serde( default = "default_ttl_seconds" ) ]
    pub ttl_seconds : u64,
    /// Maximum number of entries held in the memory tier.
    #[ serde( default = "default_max_entries" ) ]
    pub max_entries : u64,
    /// Maximum total bytes held in the memory tier.
    #[ serde( default = "default_max_bytes" ) ]
    pub max_bytes : u64,
    /// Entries larger than this are never cached.
    #[ serde( default = "default_max_single_entry_bytes" ) ]
    pub max_single_entry_bytes : u64,
    /// Directory for the persistent KV tier; `None` disables it.
    #[ serde( default ) ]
    pub persistent_path : Option< std::path::PathBuf >,
  }

  impl Default for CacheConfig
  {
    fn default() -> Self
    {
      Self
      {
        ttl_seconds : default_ttl_seconds(),
        max_entries : default_max_entries(),
        max_bytes : default_max_bytes(),
        max_single_entry_bytes : default_max_single_entry_bytes(),
        persistent_path : None,
      }
    }
  }

  fn default_ttl_seconds() -> u64 { 300 }
  fn default_max_entries() -> u64 { 10_000 }
  fn default_max_bytes() -> u64 { 64 * 1024 * 1024 }
  fn default_max_single_entry_bytes() -> u64 { 1024 * 1024 }

  /// Router selection weights and concurrency limits.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct RouterConfig
  {
    /// Scoring weights.
    #[ serde( default ) ]
    pub weights : RouterWeights,
    /// Global concurrent-request cap, enforced by a semaphore.
    #[ serde( default = "default_max_concurrent" ) ]
    pub max_concurrent : usize,
    /// Default outer deadline for a full router request, in milliseconds.
    #[ serde( default = "default_router_timeout_ms" ) ]
    pub default_timeout_ms : u64,
    /// Accept an empty prompt instead of failing with `invalid_request`.
    #[ serde( default ) ]
    pub allow_empty_prompt : bool,
  }

  impl Default for RouterConfig
  {
    fn default() -> Self
    {
      Self
      {
        weights : RouterWeights::default(),
        max_concurrent : default_max_concurrent(),
        default_timeout_ms : default_router_timeout_ms(),
        allow_empty_prompt : false,
      }
    }
  }

  fn default_max_concurrent() -> usize { 64 }
  fn default_router_timeout_ms() -> u64 { 60_000 }

  /// Weights for backend scoring; lower score wins.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct RouterWeights
  {
    /// Weight applied to normalised cost.
    pub cost : f64,
    /// Weight applied to normalised latency EWMA.
    pub latency : f64,
    /// Weight applied to descriptor priority rank.
    pub priority : f64,
    /// Weight applied to `(1 - success_rate)`.
    pub success : f64,
  }

  impl Default for RouterWeights
  {
    fn default() -> Self
    {
      Self { cost : 0.4, latency : 0.3, priority : 0.1, success : 0.2 }
    }
  }

  /// Health monitor configuration.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct HealthConfig
  {
    /// Background probe interval, in milliseconds.
    #[ serde( default = "default_health_interval_ms" ) ]
    pub interval_ms : u64,
    /// Consecutive failures before the breaker opens.
    #[ serde( default = "default_failure_threshold" ) ]
    pub failure_threshold : u32,
    /// Cooldown before an open breaker tries half-open, in milliseconds.
    #[ serde( default = "default_cooldown_ms" ) ]
    pub cooldown_ms : u64,
    /// EWMA smoothing factor.
    #[ serde( default = "default_ewma_alpha" ) ]
    pub ewma_alpha : f64,
    /// Rolling window size for success-rate computation.
    #[ serde( default = "default_rolling_window" ) ]
    pub rolling_window : usize,
  }

  impl Default for HealthConfig
  {
    fn default() -> Self
    {
      Self
      {
        interval_ms : default_health_interval_ms(),
        failure_threshold : default_failure_threshold(),
        cooldown_ms : default_cooldown_ms(),
        ewma_alpha : default_ewma_alpha(),
        rolling_window : default_rolling_window(),
      }
    }
  }

  fn default_health_interval_ms() -> u64 { 30_000 }
  fn default_failure_threshold() -> u32 { 3 }
  fn default_cooldown_ms() -> u64 { 30_000 }
  fn default_ewma_alpha() -> f64 { 0.2 }
  fn default_rolling_window() -> usize { 50 }

  /// Retry/backoff configuration.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct RetryConfig
  {
    /// Maximum attempts per logical call, including the first.
    #[ serde( default = "default_max_attempts" ) ]
    pub max_attempts : u32,
    /// Base delay before the first retry, in milliseconds.
    #[ serde( default = "default_base_ms" ) ]
    pub base_ms : u64,
    /// Exponential multiplier applied per attempt.
    #[ serde( default = "default_multiplier" ) ]
    pub multiplier : f64,
    /// Jitter fraction applied to each computed delay.
    #[ serde( default = "default_jitter_factor" ) ]
    pub jitter_factor : f64,
    /// Upper bound on any single backoff delay, in milliseconds.
    #[ serde( default = "default_max_delay_ms" ) ]
    pub max_delay_ms : u64,
  }

  impl Default for RetryConfig
  {
    fn default() -> Self
    {
      Self
      {
        max_attempts : default_max_attempts(),
        base_ms : default_base_ms(),
        multiplier : default_multiplier(),
        jitter_factor : default_jitter_factor(),
        max_delay_ms : default_max_delay_ms(),
      }
    }
  }

  fn default_max_attempts() -> u32 { 3 }
  fn default_base_ms() -> u64 { 200 }
  fn default_multiplier() -> f64 { 2.0 }
  fn default_jitter_factor() -> f64 { 0.2 }
  fn default_max_delay_ms() -> u64 { 10_000 }

  /// RAG multiplexer configuration.
  #[ derive( Debug, Clone, Serialize, Deserialize, Default ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct RagConfig
  {
    /// Whether RAG enrichment runs at all.
    #[ serde( default ) ]
    pub enabled : bool,
    /// Load-balancing strategy name.
    #[ serde( default = "default_strategy" ) ]
    pub strategy : String,
    /// Configured workers.
    #[ serde( default ) ]
    pub workers : Vec< RagWorkerConfig >,
    /// Bounded queue configuration.
    #[ serde( default ) ]
    pub queue : RagQueueConfig,
  }

  fn default_strategy() -> String { "round_robin".to_string() }

  /// One RAG worker's static configuration.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct RagWorkerConfig
  {
    /// Unique worker id.
    pub id : String,
    /// Transport kind: `subprocess`, `http`, or `https`.
    pub transport : String,
    /// Endpoint: a URL for http/https, a command line for subprocess.
    pub endpoint : String,
    /// Capabilities this worker advertises at handshake.
    #[ serde( default ) ]
    pub capabilities : Vec< String >,
    /// Load-balancing weight.
    #[ serde( default = "default_weight" ) ]
    pub weight : f64,
  }

  fn default_weight() -> f64 { 1.0 }

  /// Bounded priority-queue configuration for the multiplexer.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct RagQueueConfig
  {
    /// Total queue capacity across all priority classes.
    #[ serde( default = "default_queue_max_size" ) ]
    pub max_size : usize,
    /// Maximum number of items admitted per priority class.
    #[ serde( default = "default_queue_per_priority_cap" ) ]
    pub per_priority_cap : usize,
  }

  impl Default for RagQueueConfig
  {
    fn default() -> Self
    {
      Self { max_size : default_queue_max_size(), per_priority_cap : default_queue_per_priority_cap() }
    }
  }

  fn default_queue_max_size() -> usize { 256 }
  fn default_queue_per_priority_cap() -> usize { 64 }

  /// External server surface configuration.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  #[ serde( deny_unknown_fields ) ]
  pub struct ServerConfig
  {
    /// Only `stdio_jsonrpc` is recognised today.
    #[ serde( default = "default_server_mode" ) ]
    pub mode : String,
    /// Budget allowed to drain in-flight work during shutdown, in ms.
    #[ serde( default = "default_shutdown_budget_ms" ) ]
    pub graceful_shutdown_budget_ms : u64,
  }

  impl Default for ServerConfig
  {
    fn default() -> Self
    {
      Self { mode : default_server_mode(), graceful_shutdown_budget_ms : default_shutdown_budget_ms() }
    }
  }

  fn default_server_mode() -> String { "stdio_jsonrpc".to_string() }
  fn default_shutdown_budget_ms() -> u64 { 10_000 }

} // end mod private

pub use private::
{
  BackendConfig, CacheConfig, Config, HealthConfig, RagConfig, RagQueueConfig, RagWorkerConfig,
  RetryConfig, RouterConfig, RouterWeights, ServerConfig, TimeoutsConfig,
};

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn rejects_unknown_keys()
  {
    let text = r#"
      unknown_top_level = true
      [[backends]]
      id = "b1"
      kind = "openai_compatible"
      base_url = "https://example.invalid"
      auth_ref = "EXAMPLE_API_KEY"
      model = "gpt-test"
      cost_in = "0.0001"
      cost_out = "0.0002"
    "#;
    assert!( Config::load_from_str( text ).is_err() );
  }

  #[ test ]
  fn rejects_duplicate_backend_ids()
  {
    let text = r#"
      [[backends]]
      id = "b1"
      kind = "openai_compatible"
      base_url = "https://example.invalid"
      auth_ref = "EXAMPLE_API_KEY"
      model = "gpt-test"
      cost_in = "0.0001"
      cost_out = "0.0002"

      [[backends]]
      id = "b1"
      kind = "openai_compatible"
      base_url = "https://example2.invalid"
      auth_ref = "EXAMPLE_API_KEY_2"
      model = "gpt-test"
      cost_in = "0.0001"
      cost_out = "0.0002"
    "#;
    assert!( Config::load_from_str( text ).is_err() );
  }

  #[ test ]
  fn minimal_config_loads_with_defaults()
  {
    let text = r#"
      [[backends]]
      id = "b1"
      kind = "openai_compatible"
      base_url = "https://example.invalid"
      auth_ref = "EXAMPLE_API_KEY"
      model = "gpt-test"
      cost_in = "0.0001"
      cost_out = "0.0002"
    "#;
    let config = Config::load_from_str( text ).unwrap();
    assert_eq!( config.cache.ttl_seconds, 300 );
    assert_eq!( config.router.max_concurrent, 64 );
    assert_eq!( config.server.mode, "stdio_jsonrpc" );
  }
}
