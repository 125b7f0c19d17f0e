//! Per-token cost accounting, in a single configured currency.
//!
//! The source system this was distilled from mixed per-token and
//! per-1000-token cost fields; this crate fixes the contract as strictly
//! per-token so `cost_in`/`cost_out` in configuration never need a unit
//! annotation.

mod private
{
  use rust_decimal::Decimal;

  /// Computes the total cost of a call given token counts and the
  /// backend's per-token rates.
  #[ must_use ]
  pub fn compute_cost( tokens_input : u64, tokens_output : u64, cost_in : Decimal, cost_out : Decimal ) -> Decimal
  {
    Decimal::from( tokens_input ) * cost_in + Decimal::from( tokens_output ) * cost_out
  }

} // end mod private

pub use private::compute_cost;

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use rust_decimal::Decimal;
  use std::str::FromStr;

  #[ test ]
  fn cost_is_linear_in_tokens()
  {
    let cost_in = Decimal::from_str( "0.0001" ).unwrap();
    let cost_out = Decimal::from_str( "0.0002" ).unwrap();
    let total = compute_cost( 100, 50, cost_in, cost_out );
    assert_eq!( total, Decimal::from_str( "0.02" ).unwrap() );
  }

  #[ test ]
  fn zero_tokens_is_zero_cost()
  {
    let cost_in = Decimal::from_str( "1.5" ).unwrap();
    let cost_out = Decimal::from_str( "3.0" ).unwrap();
    assert_eq!( compute_cost( 0, 0, cost_in, cost_out ), Decimal::ZERO );
  }
}
