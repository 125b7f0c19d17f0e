//! Timeout supervisor: harmonised deadlines, jittered retry, and
//! cooperative cancellation.

pub mod cancellation;
pub mod deadline;
pub mod retry;

mod private
{
  use super::cancellation::CancellationToken;
  use super::deadline::{ compute_deadline, OperationClass };
  use super::retry::{ backoff_delay, is_retriable, RetryState };
  use crate::config::RetryConfig;
  use crate::error::ClaudetteError;
  use std::future::Future;
  use tokio::time::Instant;

  /// A function that checks whether the target's circuit breaker is
  /// currently open; passed into [`Supervisor::with_retry`] so the retry
  /// loop can abandon immediately if the breaker opens mid-backoff.
  pub trait BreakerProbe
  {
    /// Returns `true` if the target must not be called right now.
    fn is_open( &self ) -> bool;
  }

  impl< F > BreakerProbe for F
  where
    F : Fn() -> bool,
  {
    fn is_open( &self ) -> bool
    {
      self()
    }
  }

  /// The timeout/retry/cancellation controller.
  #[ derive( Debug, Clone, Default ) ]
  pub struct Supervisor;

  impl Supervisor
  {
    /// Runs `op`, cancelling it if it has not completed by `deadline`.
    pub async fn with_deadline< T, Fut >( &self, deadline : Instant, token : &CancellationToken, op : Fut ) -> Result< T, ClaudetteError >
    where
      Fut : Future< Output = Result< T, ClaudetteError > >,
    {
      tokio::select!
      {
        result = op => result,
        () = tokio::time::sleep_until( deadline ) =>
        {
          token.cancel();
          Err( ClaudetteError::Timeout { elapsed_ms : 0 } )
        }
        () = token.cancelled() => Err( ClaudetteError::Timeout { elapsed_ms : 0 } ),
      }
    }

    /// Computes the deadline for a fresh operation of `class`, honouring
    /// priority scaling and an optional hard ceiling (typically the outer
    /// router deadline).
    #[ must_use ]
    pub fn deadline_for( &self, class : OperationClass, priority : u8, hard_ceiling : Option< Instant > ) -> Instant
    {
      let ceiling_ms = hard_ceiling.map( | c | c.saturating_duration_since( Instant::now() ).as_millis() as u64 );
      compute_deadline( class.default_budget_ms(), priority, ceiling_ms )
    }

    /// Runs `make_attempt` up to `config.max_attempts` times, backing off
    /// between attempts, stopping early on a non-retriable error or when
    /// `breaker` reports the target has opened.
    pub async fn with_retry< T, Fut, F, B >( &self, config : &RetryConfig, breaker : &B, mut make_attempt : F ) -> Result< T, ClaudetteError >
    where
      F : FnMut( u32 ) -> Fut,
      Fut : Future< Output = Result< T, ClaudetteError > >,
      B : BreakerProbe,
    {
      let mut state = RetryState::new( config );
      let mut last_error = ClaudetteError::NoBackendAvailable;

      loop
      {
        if breaker.is_open()
        {
          return Err( ClaudetteError::CircuitOpen { backend : String::new() } );
        }

        state.record_attempt();
        match make_attempt( state.attempts ).await
        {
          Ok( value ) => return Ok( value ),
          Err( error ) =>
          {
            let retriable = is_retriable( &error );
            last_error = error;
            if !retriable || !state.has_budget()
            {
              return Err( last_error );
            }

            if breaker.is_open()
            {
              return Err( ClaudetteError::CircuitOpen { backend : String::new() } );
            }

            let delay = backoff_delay( config, state.attempts );
            tokio::time::sleep( delay ).await;
          }
        }
      }
    }
  }

} // end mod private

pub use private::{ BreakerProbe, Supervisor };

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use crate::config::RetryConfig;
  use crate::error::ClaudetteError;
  use std::sync::atomic::{ AtomicU32, Ordering };

  struct AlwaysClosed;
  impl BreakerProbe for AlwaysClosed
  {
    fn is_open( &self ) -> bool { false }
  }

  struct AlwaysOpen;
  impl BreakerProbe for AlwaysOpen
  {
    fn is_open( &self ) -> bool { true }
  }

  #[ tokio::test ]
  async fn retries_until_success()
  {
    let supervisor = Supervisor::default();
    let config = RetryConfig { max_attempts : 5, base_ms : 1, multiplier : 1.0, jitter_factor : 0.0, max_delay_ms : 5 };
    let counter = AtomicU32::new( 0 );

    let result = supervisor.with_retry( &config, &AlwaysClosed, | _attempt |
    {
      let n = counter.fetch_add( 1, Ordering::SeqCst );
      async move
      {
        if n < 2 { Err( ClaudetteError::TransientNetwork( "flaky".into() ) ) } else { Ok( 42 ) }
      }
    } ).await;

    assert_eq!( result.unwrap(), 42 );
    assert_eq!( counter.load( Ordering::SeqCst ), 3 );
  }

  #[ tokio::test ]
  async fn non_retriable_error_stops_immediately()
  {
    let supervisor = Supervisor::default();
    let config = RetryConfig::default();
    let counter = AtomicU32::new( 0 );

    let result : Result< (), _ > = supervisor.with_retry( &config, &AlwaysClosed, | _ |
    {
      counter.fetch_add( 1, Ordering::SeqCst );
      async { Err( ClaudetteError::InvalidRequest( "bad".into() ) ) }
    } ).await;

    assert!( result.is_err() );
    assert_eq!( counter.load( Ordering::SeqCst ), 1 );
  }

  #[ tokio::test ]
  async fn open_breaker_short_circuits()
  {
    let supervisor = Supervisor::default();
    let config = RetryConfig::default();

    let result : Result< (), _ > = supervisor.with_retry( &config, &AlwaysOpen, | _ | async { Ok( () ) } ).await;
    assert!( matches!( result, Err( ClaudetteError::CircuitOpen { .. } ) ) );
  }
}
