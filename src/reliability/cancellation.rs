//! Cooperative cancellation propagation.
//!
//! Every long-running operation holds a child [`CancellationToken`] derived
//! from its parent; cancelling the parent (deadline exceeded, shutdown)
//! fans out to every in-flight child without the parent needing to track
//! them individually.

mod private
{
  use tokio_util::sync::CancellationToken;

  /// Creates a fresh root cancellation token, typically one per router
  /// request or one for the whole process lifetime.
  #[ must_use ]
  pub fn root_token() -> CancellationToken
  {
    CancellationToken::new()
  }

  /// Derives a child token that is cancelled whenever `parent` is, but can
  /// also be cancelled independently without affecting siblings.
  #[ must_use ]
  pub fn child_token( parent : &CancellationToken ) -> CancellationToken
  {
    parent.child_token()
  }

} // end mod private

pub use private::{ child_token, root_token };
pub use tokio_util::sync::CancellationToken;

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ tokio::test ]
  async fn cancelling_parent_cancels_child()
  {
    let parent = root_token();
    let child = child_token( &parent );
    assert!( !child.is_cancelled() );
    parent.cancel();
    assert!( child.is_cancelled() );
  }

  #[ tokio::test ]
  async fn cancelling_child_does_not_cancel_parent()
  {
    let parent = root_token();
    let child = child_token( &parent );
    child.cancel();
    assert!( !parent.is_cancelled() );
  }
}
