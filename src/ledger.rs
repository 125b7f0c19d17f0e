//! Append-only accounting ledger.
//!
//! Backed by a dedicated `sled::Tree`. Append is serialised behind a
//! mutex that also owns the strictly-increasing id counter, so `id` is
//! never reused even though `sled` itself allows concurrent writers.

mod private
{
  use crate::error::{ ClaudetteError, Result };
  use crate::fingerprint::Fingerprint;
  use chrono::{ DateTime, Utc };
  use parking_lot::Mutex;
  use rust_decimal::Decimal;
  use serde::{ Deserialize, Serialize };

  /// Outcome of one logical router call.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
  #[ serde( rename_all = "snake_case" ) ]
  pub enum Outcome
  {
    /// Succeeded on the first attempt.
    Success,
    /// Succeeded after at least one retry or failover.
    RetriedSuccess,
    /// Failed after exhausting retries/failover.
    Failure,
  }

  /// One immutable accounting record.
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  pub struct LedgerEvent
  {
    /// Strictly increasing id, assigned by the ledger.
    pub id : u64,
    /// Wall-clock time the event was appended.
    pub timestamp : DateTime< Utc >,
    /// Backend that served (or attempted to serve) the call.
    pub backend : String,
    /// Fingerprint of the originating request.
    pub fingerprint : Fingerprint,
    /// Input tokens consumed.
    pub tokens_input : u64,
    /// Output tokens produced.
    pub tokens_output : u64,
    /// Cost of the call in the configured currency.
    pub cost : Decimal,
    /// Whether this event represents a cache hit.
    pub cache_hit : bool,
    /// Observed latency, in milliseconds.
    pub latency_ms : u64,
    /// Final outcome.
    pub outcome : Outcome,
  }

  /// Aggregate statistics over a window of ledger events.
  #[ derive( Debug, Clone, Copy, Default, Serialize, Deserialize ) ]
  pub struct Aggregate
  {
    /// Number of events in the window.
    pub count : u64,
    /// Total input tokens.
    pub tokens_in : u64,
    /// Total output tokens.
    pub tokens_out : u64,
    /// Total cost.
    pub cost : Decimal,
    /// Average latency across the window.
    pub avg_latency_ms : f64,
    /// Fraction of events that were cache hits.
    pub hit_rate : f64,
  }

  struct Inner
  {
    next_id : u64,
    last_timestamp : DateTime< Utc >,
  }

  /// The append-only ledger.
  pub struct Ledger
  {
    tree : Option< sled::Tree >,
    inner : Mutex< Inner >,
  }

  impl Ledger
  {
    /// Opens (or creates) the ledger tree inside an existing `sled::Db`.
    /// With `db = None`, the ledger operates purely in-memory — appends
    /// still succeed, but nothing survives a restart.
    pub fn open( db : Option< &sled::Db > ) -> Result< Self >
    {
      let tree = match db
      {
        Some( db ) => Some
        (
          db.open_tree( "ledger" )
            .map_err( | e | ClaudetteError::LedgerUnavailable( e.to_string() ) )?
        ),
        None => None,
      };

      Ok( Self { tree, inner : Mutex::new( Inner { next_id : 0, last_timestamp : DateTime::< Utc >::MIN_UTC } ) } )
    }

    /// Appends an event, assigning its id and timestamp. Durable before
    /// returning when a persistent tree is configured.
    pub fn append
    (
      &self,
      backend : String,
      fingerprint : Fingerprint,
      tokens_input : u64,
      tokens_output : u64,
      cost : Decimal,
      cache_hit : bool,
      latency_ms : u64,
      outcome : Outcome,
    ) -> Result< LedgerEvent >
    {
      let mut inner = self.inner.lock();
      let id = inner.next_id;
      inner.next_id += 1;

      let mut timestamp = Utc::now();
      if timestamp < inner.last_timestamp
      {
        // clock jumped backward; clamp to monotonic
        timestamp = inner.last_timestamp;
      }
      inner.last_timestamp = timestamp;

      let event = LedgerEvent
      {
        id, timestamp, backend, fingerprint, tokens_input, tokens_output, cost, cache_hit, latency_ms, outcome,
      };

      if let Some( tree ) = &self.tree
      {
        let key = id.to_be_bytes();
        let value = serde_json::to_vec( &event ).map_err( | e | ClaudetteError::LedgerUnavailable( e.to_string() ) )?;
        tree.insert( key, value ).map_err( | e | ClaudetteError::LedgerUnavailable( e.to_string() ) )?;
        tree.flush().map_err( | e | ClaudetteError::LedgerUnavailable( e.to_string() ) )?;
      }

      Ok( event )
    }

    /// Returns events whose timestamp falls within the last `window_ms`.
    pub fn recent( &self, window_ms : u64 ) -> Result< Vec< LedgerEvent > >
    {
      let Some( tree ) = &self.tree else { return Ok( Vec::new() ) };
      let cutoff = Utc::now() - chrono::Duration::milliseconds( window_ms as i64 );

      let mut events = Vec::new();
      for item in tree.iter()
      {
        let ( _, value ) = item.map_err( | e | ClaudetteError::LedgerUnavailable( e.to_string() ) )?;
        let event : LedgerEvent = serde_json::from_slice( &value ).map_err( | e | ClaudetteError::LedgerUnavailable( e.to_string() ) )?;
        if event.timestamp >= cutoff
        {
          events.push( event );
        }
      }
      Ok( events )
    }

    /// Aggregates events within `window_ms`. Idempotent: calling this
    /// repeatedly over the same closed window yields the same result.
    pub fn aggregate( &self, window_ms : u64 ) -> Result< Aggregate >
    {
      let events = self.recent( window_ms )?;
      if events.is_empty()
      {
        return Ok( Aggregate::default() );
      }

      let count = events.len() as u64;
      let tokens_in : u64 = events.iter().map( | e | e.tokens_input ).sum();
      let tokens_out : u64 = events.iter().map( | e | e.tokens_output ).sum();
      let cost : Decimal = events.iter().map( | e | e.cost ).sum();
      let avg_latency_ms = events.iter().map( | e | e.latency_ms as f64 ).sum::< f64 >() / count as f64;
      let hits = events.iter().filter( | e | e.cache_hit ).count() as f64;
      let hit_rate = hits / count as f64;

      Ok( Aggregate { count, tokens_in, tokens_out, cost, avg_latency_ms, hit_rate } )
    }

    /// Next id that would be assigned by `append`. Monotonic, never
    /// decreases.
    #[ must_use ]
    pub fn next_id( &self ) -> u64
    {
      self.inner.lock().next_id
    }
  }

} // end mod private

pub use private::{ Aggregate, Ledger, LedgerEvent, Outcome };

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use crate::fingerprint::{ fingerprint, Request };
  use rust_decimal::Decimal;

  fn test_fingerprint() -> Fingerprint
  {
    fingerprint( &Request { prompt : "hi".into(), attachments : vec![], options : Default::default(), metadata : Default::default() } )
  }

  #[ test ]
  fn ids_strictly_increase()
  {
    let ledger = Ledger::open( None ).unwrap();
    let e1 = ledger.append( "b1".into(), test_fingerprint(), 1, 1, Decimal::ZERO, false, 10, Outcome::Success ).unwrap();
    let e2 = ledger.append( "b1".into(), test_fingerprint(), 1, 1, Decimal::ZERO, false, 10, Outcome::Success ).unwrap();
    assert!( e2.id > e1.id );
    assert_eq!( ledger.next_id(), e2.id + 1 );
  }

  #[ test ]
  fn persistent_ledger_round_trips_through_sled()
  {
    let dir = tempfile::tempdir().unwrap();
    let db = sled::open( dir.path() ).unwrap();
    let ledger = Ledger::open( Some( &db ) ).unwrap();
    ledger.append( "b1".into(), test_fingerprint(), 10, 20, Decimal::ZERO, false, 5, Outcome::Success ).unwrap();
    ledger.append( "b1".into(), test_fingerprint(), 5, 5, Decimal::ZERO, true, 1, Outcome::Success ).unwrap();

    let recent = ledger.recent( 60_000 ).unwrap();
    assert_eq!( recent.len(), 2 );

    let aggregate = ledger.aggregate( 60_000 ).unwrap();
    assert_eq!( aggregate.count, 2 );
    assert_eq!( aggregate.tokens_in, 15 );
    assert_eq!( aggregate.tokens_out, 25 );
    assert!( ( aggregate.hit_rate - 0.5 ).abs() < f64::EPSILON );
  }

  #[ test ]
  fn aggregate_of_empty_window_is_zeroed()
  {
    let ledger = Ledger::open( None ).unwrap();
    let aggregate = ledger.aggregate( 1_000 ).unwrap();
    assert_eq!( aggregate.count, 0 );
  }
}
