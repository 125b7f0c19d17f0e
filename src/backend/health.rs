//! Per-backend liveness, latency EWMA, and circuit breaker.

mod private
{
  use crate::config::HealthConfig;
  use parking_lot::Mutex;
  use std::collections::VecDeque;
  use std::time::Instant;

  /// Circuit breaker state.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum BreakerState
  {
    /// Normal operation.
    Closed,
    /// Refusing all selection attempts until cooldown elapses.
    Open,
    /// Cooldown elapsed; a single trial call is in flight.
    HalfOpen,
  }

  struct State
  {
    ewma_latency_ms : f64,
    recent_outcomes : VecDeque< bool >,
    consecutive_failures : u32,
    breaker : BreakerState,
    breaker_opened_at : Option< Instant >,
    last_health_at : Option< Instant >,
    last_probe_ok : bool,
    half_open_in_flight : bool,
  }

  /// Mutable per-backend health/breaker state, guarded by a single mutex
  /// so every transition is atomic.
  pub struct BackendRuntime
  {
    config : HealthConfig,
    state : Mutex< State >,
  }

  impl BackendRuntime
  {
    /// Builds a fresh runtime in the `closed`, healthy state.
    #[ must_use ]
    pub fn new( config : HealthConfig ) -> Self
    {
      let rolling_window = config.rolling_window;
      Self
      {
        config,
        state : Mutex::new( State
        {
          ewma_latency_ms : 0.0,
          recent_outcomes : VecDeque::with_capacity( rolling_window ),
          consecutive_failures : 0,
          breaker : BreakerState::Closed,
          breaker_opened_at : None,
          last_health_at : None,
          last_probe_ok : true,
          half_open_in_flight : false,
        } ),
      }
    }

    /// Current breaker state, transitioning `open -> half_open` first if
    /// the cooldown has elapsed.
    #[ must_use ]
    pub fn breaker_state( &self ) -> BreakerState
    {
      let mut state = self.state.lock();
      if state.breaker == BreakerState::Open
      {
        if let Some( opened_at ) = state.breaker_opened_at
        {
          if opened_at.elapsed().as_millis() as u64 >= self.config.cooldown_ms && !state.half_open_in_flight
          {
            state.breaker = BreakerState::HalfOpen;
          }
        }
      }
      state.breaker
    }

    /// Whether the router may select this backend right now. Does not
    /// itself transition `half_open`'s single-trial flag — callers must
    /// pair a `half_open` selection with [`BackendRuntime::record_outcome`].
    #[ must_use ]
    pub fn is_selectable( &self ) -> bool
    {
      match self.breaker_state()
      {
        BreakerState::Closed => true,
        BreakerState::Open => false,
        BreakerState::HalfOpen =>
        {
          let mut state = self.state.lock();
          if state.half_open_in_flight
          {
            false
          }
          else
          {
            state.half_open_in_flight = true;
            true
          }
        }
      }
    }

    /// Whether the backend is healthy: breaker closed and last probe ok.
    #[ must_use ]
    pub fn healthy( &self ) -> bool
    {
      let state = self.state.lock();
      state.breaker == BreakerState::Closed && state.last_probe_ok
    }

    /// Current EWMA latency estimate, in milliseconds.
    #[ must_use ]
    pub fn ewma_latency_ms( &self ) -> f64
    {
      self.state.lock().ewma_latency_ms
    }

    /// Rolling success rate over the last `rolling_window` outcomes.
    #[ must_use ]
    pub fn success_rate( &self ) -> f64
    {
      let state = self.state.lock();
      if state.recent_outcomes.is_empty()
      {
        1.0
      }
      else
      {
        let successes = state.recent_outcomes.iter().filter( | ok | **ok ).count();
        successes as f64 / state.recent_outcomes.len() as f64
      }
    }

    /// Records the outcome of a real call (or a health probe), updating
    /// EWMA latency, the rolling window, and the breaker state machine.
    pub fn record_outcome( &self, success : bool, latency_ms : u64 )
    {
      let mut state = self.state.lock();

      let sample = latency_ms as f64;
      state.ewma_latency_ms = if state.ewma_latency_ms == 0.0
      {
        sample
      }
      else
      {
        self.config.ewma_alpha * sample + ( 1.0 - self.config.ewma_alpha ) * state.ewma_latency_ms
      };

      if state.recent_outcomes.len() >= self.config.rolling_window
      {
        state.recent_outcomes.pop_front();
      }
      state.recent_outcomes.push_back( success );

      state.last_health_at = Some( Instant::now() );
      state.last_probe_ok = success;
      state.half_open_in_flight = false;

      if success
      {
        state.consecutive_failures = 0;
        if state.breaker != BreakerState::Closed
        {
          tracing::info!( breaker = "half_open -> closed", "backend recovered" );
        }
        state.breaker = BreakerState::Closed;
        state.breaker_opened_at = None;
      }
      else
      {
        state.consecutive_failures += 1;
        match state.breaker
        {
          BreakerState::Closed if state.consecutive_failures >= self.config.failure_threshold =>
          {
            tracing::warn!( breaker = "closed -> open", failures = state.consecutive_failures, "circuit breaker opened" );
            state.breaker = BreakerState::Open;
            state.breaker_opened_at = Some( Instant::now() );
          }
          BreakerState::HalfOpen =>
          {
            tracing::warn!( breaker = "half_open -> open", "trial call failed, reopening" );
            state.breaker = BreakerState::Open;
            state.breaker_opened_at = Some( Instant::now() );
          }
          _ => {}
        }
      }
    }
  }

  impl core::fmt::Debug for BackendRuntime
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "BackendRuntime" )
        .field( "breaker_state", &self.breaker_state() )
        .field( "ewma_latency_ms", &self.ewma_latency_ms() )
        .field( "success_rate", &self.success_rate() )
        .finish()
    }
  }

} // end mod private

pub use private::{ BackendRuntime, BreakerState };

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use crate::config::HealthConfig;

  fn fast_config() -> HealthConfig
  {
    HealthConfig { failure_threshold : 3, cooldown_ms : 30, ewma_alpha : 0.2, rolling_window : 50, interval_ms : 1000 }
  }

  #[ test ]
  fn opens_after_consecutive_failures()
  {
    let runtime = BackendRuntime::new( fast_config() );
    assert_eq!( runtime.breaker_state(), BreakerState::Closed );
    runtime.record_outcome( false, 10 );
    runtime.record_outcome( false, 10 );
    assert_eq!( runtime.breaker_state(), BreakerState::Closed );
    runtime.record_outcome( false, 10 );
    assert_eq!( runtime.breaker_state(), BreakerState::Open );
    assert!( !runtime.is_selectable() );
  }

  #[ test ]
  fn transitions_to_half_open_after_cooldown()
  {
    let runtime = BackendRuntime::new( fast_config() );
    for _ in 0..3 { runtime.record_outcome( false, 10 ); }
    assert_eq!( runtime.breaker_state(), BreakerState::Open );
    std::thread::sleep( std::time::Duration::from_millis( 40 ) );
    assert_eq!( runtime.breaker_state(), BreakerState::HalfOpen );
  }

  #[ test ]
  fn half_open_success_closes_breaker()
  {
    let runtime = BackendRuntime::new( fast_config() );
    for _ in 0..3 { runtime.record_outcome( false, 10 ); }
    std::thread::sleep( std::time::Duration::from_millis( 40 ) );
    assert!( runtime.is_selectable() );
    runtime.record_outcome( true, 10 );
    assert_eq!( runtime.breaker_state(), BreakerState::Closed );
  }

  #[ test ]
  fn half_open_failure_reopens_and_restarts_cooldown()
  {
    let runtime = BackendRuntime::new( fast_config() );
    for _ in 0..3 { runtime.record_outcome( false, 10 ); }
    std::thread::sleep( std::time::Duration::from_millis( 40 ) );
    assert!( runtime.is_selectable() );
    runtime.record_outcome( false, 10 );
    assert_eq!( runtime.breaker_state(), BreakerState::Open );
  }

  #[ test ]
  fn ewma_latency_tracks_samples()
  {
    let runtime = BackendRuntime::new( fast_config() );
    runtime.record_outcome( true, 100 );
    assert!( ( runtime.ewma_latency_ms() - 100.0 ).abs() < f64::EPSILON );
    runtime.record_outcome( true, 200 );
    assert!( runtime.ewma_latency_ms() > 100.0 && runtime.ewma_latency_ms() < 200.0 );
  }

  #[ test ]
  fn success_rate_reflects_rolling_window()
  {
    let runtime = BackendRuntime::new( fast_config() );
    runtime.record_outcome( true, 1 );
    runtime.record_outcome( true, 1 );
    runtime.record_outcome( false, 1 );
    assert!( ( runtime.success_rate() - ( 2.0 / 3.0 ) ).abs() < 1e-9 );
  }
}
