//! Error taxonomy for the routing and reliability kernel.
//!
//! Every public operation in this crate returns a [`Result`] whose error
//! variant is one of the kinds below. The caller always sees a single
//! structured outcome — never a raw transport error — so that retry and
//! failover policy can be decided in one place (the Supervisor and Router).

mod private
{
  /// All errors surfaced by the routing kernel.
  #[ derive( Debug, Clone, thiserror::Error ) ]
  #[ non_exhaustive ]
  pub enum ClaudetteError
  {
    /// Bad request shape, unknown backend, or validation failure.
    #[ error( "invalid request: {0}" ) ]
    InvalidRequest( String ),

    /// Credential rejected by a backend.
    #[ error( "auth error on backend {backend}: {message}" ) ]
    Auth
    {
      /// Backend that rejected the credential.
      backend : String,
      /// Human-readable detail.
      message : String,
    },

    /// Upstream refused content.
    #[ error( "content policy violation on backend {backend}: {message}" ) ]
    ContentPolicy
    {
      /// Backend that refused the content.
      backend : String,
      /// Human-readable detail.
      message : String,
    },

    /// DNS failure, connection reset, TLS handshake failure, etc.
    #[ error( "transient network error: {0}" ) ]
    TransientNetwork( String ),

    /// Deadline exceeded before a response was obtained.
    #[ error( "operation timed out after {elapsed_ms}ms" ) ]
    Timeout
    {
      /// Elapsed time when the timeout fired.
      elapsed_ms : u64,
    },

    /// Upstream responded 429 or equivalent.
    #[ error( "rate limited, retry after {retry_after_ms:?}ms" ) ]
    RateLimited
    {
      /// `Retry-After` hint in milliseconds, if the upstream provided one.
      retry_after_ms : Option< u64 >,
    },

    /// Upstream responded with a 5xx status.
    #[ error( "upstream 5xx from backend {backend}: status {status}" ) ]
    Upstream5xx
    {
      /// Backend that returned the error.
      backend : String,
      /// HTTP status code.
      status : u16,
    },

    /// Backend's circuit breaker is open; not retriable until cooldown.
    #[ error( "circuit open for backend {backend}" ) ]
    CircuitOpen
    {
      /// Backend whose breaker is open.
      backend : String,
    },

    /// Backend selection returned an empty candidate set.
    #[ error( "no backend available" ) ]
    NoBackendAvailable,

    /// The accounting ledger failed to durably record an event.
    #[ error( "ledger unavailable: {0}" ) ]
    LedgerUnavailable( String ),

    /// The RAG multiplexer's bounded queue is full.
    #[ error( "backpressure: queue at capacity" ) ]
    Backpressure,

    /// Persistent cache tier is unavailable; caller should still function
    /// via the memory tier. Not normally returned to end users.
    #[ error( "cache unavailable: {0}" ) ]
    CacheUnavailable( String ),

    /// Malformed JSON-RPC request.
    #[ error( "rpc parse error: {0}" ) ]
    RpcParse( String ),

    /// Unexpected internal condition; not part of the documented taxonomy.
    #[ error( "internal error: {0}" ) ]
    Internal( String ),
  }

  impl ClaudetteError
  {
    /// Whether the Supervisor should attempt to retry this error locally.
    #[ must_use ]
    pub fn retriable( &self ) -> bool
    {
      matches!
      (
        self,
        Self::TransientNetwork( _ )
          | Self::Timeout { .. }
          | Self::RateLimited { .. }
          | Self::Upstream5xx { .. }
      )
    }

    /// The backend this error was last observed against, if any.
    #[ must_use ]
    pub fn last_backend( &self ) -> Option< &str >
    {
      match self
      {
        Self::Auth { backend, .. }
        | Self::ContentPolicy { backend, .. }
        | Self::Upstream5xx { backend, .. }
        | Self::CircuitOpen { backend } => Some( backend.as_str() ),
        _ => None,
      }
    }

    /// Short machine-readable kind name for this error's taxonomy.
    #[ must_use ]
    pub fn kind( &self ) -> &'static str
    {
      match self
      {
        Self::InvalidRequest( _ ) => "invalid_request",
        Self::Auth { .. } => "auth",
        Self::ContentPolicy { .. } => "content_policy",
        Self::TransientNetwork( _ ) => "transient_network",
        Self::Timeout { .. } => "timeout",
        Self::RateLimited { .. } => "rate_limited",
        Self::Upstream5xx { .. } => "upstream_5xx",
        Self::CircuitOpen { .. } => "circuit_open",
        Self::NoBackendAvailable => "no_backend_available",
        Self::LedgerUnavailable( _ ) => "ledger_unavailable",
        Self::Backpressure => "backpressure",
        Self::CacheUnavailable( _ ) => "cache_unavailable",
        Self::RpcParse( _ ) => "rpc_parse",
        Self::Internal( _ ) => "internal",
      }
    }
  }

  impl From< reqwest::Error > for ClaudetteError
  {
    #[ inline ]
    fn from( error : reqwest::Error ) -> Self
    {
      if error.is_timeout()
      {
        Self::Timeout { elapsed_ms : 0 }
      }
      else if error.is_connect() || error.is_request()
      {
        Self::TransientNetwork( error.to_string() )
      }
      else if error.is_status()
      {
        let status = error.status().map( | s | s.as_u16() ).unwrap_or( 0 );
        Self::Upstream5xx { backend : String::new(), status }
      }
      else
      {
        Self::Internal( error.to_string() )
      }
    }
  }

  impl From< serde_json::Error > for ClaudetteError
  {
    #[ inline ]
    fn from( error : serde_json::Error ) -> Self
    {
      Self::Internal( format!( "JSON error: {error}" ) )
    }
  }

  impl From< toml::de::Error > for ClaudetteError
  {
    #[ inline ]
    fn from( error : toml::de::Error ) -> Self
    {
      Self::InvalidRequest( format!( "config parse error: {error}" ) )
    }
  }

  /// Result alias used throughout the crate.
  pub type Result< T > = core::result::Result< T, ClaudetteError >;

} // end mod private

pub use private::{ ClaudetteError, Result };
