//! Jittered exponential backoff retry policy.

mod private
{
  use crate::config::RetryConfig;
  use crate::error::ClaudetteError;
  use rand::Rng;
  use std::time::Duration;

  /// Computes the backoff delay before attempt `attempt` (1-indexed: the
  /// delay before the *second* attempt uses `attempt = 1`), as
  /// `base * multiplier^(attempt-1)`, jittered by `±jitter_factor` and
  /// capped at `max_delay_ms`.
  #[ must_use ]
  pub fn backoff_delay( config : &RetryConfig, attempt : u32 ) -> Duration
  {
    let exponent = attempt.saturating_sub( 1 ) as i32;
    let raw_ms = config.base_ms as f64 * config.multiplier.powi( exponent );
    let capped_ms = raw_ms.min( config.max_delay_ms as f64 );

    let jitter_span = capped_ms * config.jitter_factor;
    let jitter = if jitter_span > 0.0
    {
      rand::rng().random_range( -jitter_span..=jitter_span )
    }
    else
    {
      0.0
    };

    let final_ms = ( capped_ms + jitter ).max( 0.0 );
    Duration::from_millis( final_ms as u64 )
  }

  /// Whether a logical call should be retried at all, given the error
  /// class and the configured retriable set. Retry is never attempted for
  /// `auth`, `invalid_request`, or `content_policy`, regardless of config.
  #[ must_use ]
  pub fn is_retriable( error : &ClaudetteError ) -> bool
  {
    error.retriable()
  }

  /// Tracks attempt count and elapsed time for one logical retry loop.
  #[ derive( Debug, Clone ) ]
  pub struct RetryState
  {
    /// Attempts made so far, including the first.
    pub attempts : u32,
    max_attempts : u32,
  }

  impl RetryState
  {
    /// Starts a fresh retry loop bounded by `config.max_attempts`.
    #[ must_use ]
    pub fn new( config : &RetryConfig ) -> Self
    {
      Self { attempts : 0, max_attempts : config.max_attempts }
    }

    /// Records one attempt having been made.
    pub fn record_attempt( &mut self )
    {
      self.attempts += 1;
    }

    /// Whether another attempt is permitted by the attempt budget alone
    /// (deadline and breaker-state checks happen separately).
    #[ must_use ]
    pub fn has_budget( &self ) -> bool
    {
      self.attempts < self.max_attempts
    }
  }

} // end mod private

pub use private::{ backoff_delay, is_retriable, RetryState };

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use crate::config::RetryConfig;

  #[ test ]
  fn delay_grows_exponentially_before_cap()
  {
    let config = RetryConfig { max_attempts : 5, base_ms : 100, multiplier : 2.0, jitter_factor : 0.0, max_delay_ms : 100_000 };
    let d1 = backoff_delay( &config, 1 );
    let d2 = backoff_delay( &config, 2 );
    let d3 = backoff_delay( &config, 3 );
    assert_eq!( d1.as_millis(), 100 );
    assert_eq!( d2.as_millis(), 200 );
    assert_eq!( d3.as_millis(), 400 );
  }

  #[ test ]
  fn delay_is_capped_at_max_delay()
  {
    let config = RetryConfig { max_attempts : 10, base_ms : 1_000, multiplier : 10.0, jitter_factor : 0.0, max_delay_ms : 5_000 };
    let delay = backoff_delay( &config, 5 );
    assert!( delay.as_millis() <= 5_000 );
  }

  #[ test ]
  fn retry_state_respects_attempt_budget()
  {
    let config = RetryConfig { max_attempts : 2, ..RetryConfig::default() };
    let mut state = RetryState::new( &config );
    assert!( state.has_budget() );
    state.record_attempt();
    assert!( state.has_budget() );
    state.record_attempt();
    assert!( !state.has_budget() );
  }

  #[ test ]
  fn non_retriable_kinds_never_retry()
  {
    assert!( !is_retriable( &ClaudetteError::InvalidRequest( "x".into() ) ) );
    assert!( !is_retriable( &ClaudetteError::Auth { backend : "b".into(), message : "x".into() } ) );
    assert!( !is_retriable( &ClaudetteError::ContentPolicy { backend : "b".into(), message : "x".into() } ) );
  }

  #[ test ]
  fn retriable_kinds_retry()
  {
    assert!( is_retriable( &ClaudetteError::TransientNetwork( "x".into() ) ) );
    assert!( is_retriable( &ClaudetteError::Timeout { elapsed_ms : 1 } ) );
    assert!( is_retriable( &ClaudetteError::RateLimited { retry_after_ms : None } ) );
    assert!( is_retriable( &ClaudetteError::Upstream5xx { backend : "b".into(), status : 503 } ) );
  }
}
