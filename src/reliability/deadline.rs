//! Absolute deadlines and priority-scaled budgets.
//!
//! Deadlines are always represented as an absolute [`tokio::time::Instant`]
//! computed once at the outer boundary, never as a remaining `Duration` —
//! this is what prevents a nested retry loop from silently extending its
//! parent's budget.

mod private
{
  use std::time::Duration;
  use tokio::time::Instant;

  /// Named operation classes with documented default budgets.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum OperationClass
  {
    /// Backend liveness probe.
    HealthCheck,
    /// A chat call expected to complete quickly.
    SimpleChatCall,
    /// A chat call expected to take longer (larger prompt/response).
    ComplexChatCall,
    /// The full outer router request.
    RouterRequest,
    /// A RAG sub-request issued by the multiplexer.
    RagSubRequest,
    /// Multiplexer worker process/connection startup.
    MultiplexerStartup,
  }

  impl OperationClass
  {
    /// Default budget for this operation class, in milliseconds.
    #[ must_use ]
    pub fn default_budget_ms( self ) -> u64
    {
      match self
      {
        Self::HealthCheck => 8_000,
        Self::SimpleChatCall => 20_000,
        Self::ComplexChatCall => 45_000,
        Self::RouterRequest => 60_000,
        Self::RagSubRequest => 90_000,
        Self::MultiplexerStartup => 25_000,
      }
    }
  }

  /// Computes an absolute deadline for a fresh operation.
  ///
  /// `priority >= 7` multiplies the budget by 1.5, but the result is
  /// clamped to `hard_ceiling_ms` — typically the outer router request's
  /// own deadline — so priority can never extend past the caller's own
  /// budget.
  #[ must_use ]
  pub fn compute_deadline( budget_ms : u64, priority : u8, hard_ceiling_ms : Option< u64 > ) -> Instant
  {
    let mut effective_ms = budget_ms;
    if priority >= 7
    {
      effective_ms = ( effective_ms as f64 * 1.5 ) as u64;
    }
    if let Some( ceiling ) = hard_ceiling_ms
    {
      effective_ms = effective_ms.min( ceiling );
    }
    Instant::now() + Duration::from_millis( effective_ms )
  }

  /// Milliseconds remaining until `deadline`, or `0` if already past.
  #[ must_use ]
  pub fn remaining_ms( deadline : Instant ) -> u64
  {
    deadline.saturating_duration_since( Instant::now() ).as_millis() as u64
  }

} // end mod private

pub use private::{ compute_deadline, remaining_ms, OperationClass };

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn high_priority_extends_budget_but_respects_ceiling()
  {
    let unconstrained = compute_deadline( 1_000, 9, None );
    let constrained = compute_deadline( 1_000, 9, Some( 1_000 ) );
    assert!( remaining_ms( unconstrained ) > remaining_ms( constrained ) );
    assert!( remaining_ms( constrained ) <= 1_000 );
  }

  #[ test ]
  fn low_priority_uses_budget_unscaled()
  {
    let deadline = compute_deadline( 1_000, 0, None );
    let remaining = remaining_ms( deadline );
    assert!( remaining <= 1_000 && remaining > 900 );
  }
}
