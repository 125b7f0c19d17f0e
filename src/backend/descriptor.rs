//! Static backend configuration, resolved from [`BackendConfig`].

mod private
{
  use crate::config::BackendConfig;
  use crate::error::Result;
  use crate::secret::Credential;
  use rust_decimal::Decimal;

  /// Protocol family a backend speaks. Only `openai_compatible` exists
  /// today; the enum exists so a second dialect is a variant, not a
  /// string comparison scattered through the router.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum BackendKind
  {
    /// OpenAI-compatible chat-completions dialect.
    OpenAiCompatible,
  }

  impl BackendKind
  {
    fn parse( raw : &str ) -> Result< Self >
    {
      match raw
      {
        "openai_compatible" => Ok( Self::OpenAiCompatible ),
        other => Err( crate::error::ClaudetteError::InvalidRequest( format!( "unknown backend kind: {other}" ) ) ),
      }
    }
  }

  /// Resolved, immutable per-backend descriptor: everything the router
  /// and adapter need that does not change at runtime.
  #[ derive( Debug, Clone ) ]
  pub struct BackendDescriptor
  {
    /// Unique id.
    pub id : String,
    /// Protocol kind.
    pub kind : BackendKind,
    /// Base URL, e.g. `https://api.openai.com`.
    pub base_url : String,
    /// Resolved credential.
    pub credential : Credential,
    /// Default model name.
    pub model_default : String,
    /// Per-input-token cost.
    pub cost_in : Decimal,
    /// Per-output-token cost.
    pub cost_out : Decimal,
    /// Selection priority; lower tried first on score ties.
    pub priority : u32,
    /// Operator intent: disabled backends are never selected, regardless
    /// of circuit breaker state.
    pub enabled : bool,
    /// Health-check deadline budget, in milliseconds.
    pub health_timeout_ms : u64,
    /// Simple chat call deadline budget, in milliseconds.
    pub simple_timeout_ms : u64,
    /// Complex chat call deadline budget, in milliseconds.
    pub complex_timeout_ms : u64,
  }

  impl BackendDescriptor
  {
    /// Builds a descriptor from configuration, resolving its credential
    /// from the environment.
    pub fn from_config( config : &BackendConfig ) -> Result< Self >
    {
      let kind = BackendKind::parse( &config.kind )?;
      let credential = Credential::load_from_env( &config.auth_ref )?;

      Ok( Self
      {
        id : config.id.clone(),
        kind,
        base_url : config.base_url.clone(),
        credential,
        model_default : config.model.clone(),
        cost_in : config.cost_in,
        cost_out : config.cost_out,
        priority : config.priority,
        enabled : config.enabled,
        health_timeout_ms : config.timeouts.health_ms,
        simple_timeout_ms : config.timeouts.simple_ms,
        complex_timeout_ms : config.timeouts.complex_ms,
      } )
    }
  }

} // end mod private

pub use private::{ BackendDescriptor, BackendKind };
