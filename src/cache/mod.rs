//! Two-tier response cache: memory (LRU + TTL) and persistent
//! (ordered KV), keyed by request fingerprint, plus per-fingerprint
//! single-flight deduplication for concurrent identical misses.

pub mod memory;
pub mod persistent;

mod private
{
  use super::memory::{ CacheEntry, MemoryCache };
  use super::persistent::PersistentCache;
  use crate::config::CacheConfig;
  use crate::error::{ ClaudetteError, Result };
  use crate::fingerprint::{ fingerprint, Fingerprint, Request };
  use crate::response::Response;
  use dashmap::DashMap;
  use std::sync::atomic::{ AtomicU64, Ordering };
  use std::sync::Arc;
  use tokio::sync::Mutex as AsyncMutex;

  /// Point-in-time cache statistics.
  #[ derive( Debug, Clone, Copy, Default ) ]
  pub struct CacheStats
  {
    /// Total `get` calls observed.
    pub total_requests : u64,
    /// Total `get` calls that hit either tier.
    pub total_hits : u64,
    /// Current memory-tier entry count.
    pub memory_entries : u64,
    /// Current memory-tier weighted byte size.
    pub memory_bytes : u64,
  }

  impl CacheStats
  {
    /// Hit rate over the lifetime of the cache, `0.0` if no requests yet.
    #[ must_use ]
    pub fn hit_rate( &self ) -> f64
    {
      if self.total_requests == 0
      {
        0.0
      }
      else
      {
        self.total_hits as f64 / self.total_requests as f64
      }
    }
  }

  /// RAII guard for a single-flight slot. Removes its own map entry on
  /// drop so a panicked or cancelled first-caller never wedges waiters.
  pub struct SingleFlightGuard< 'a >
  {
    cache : &'a Cache,
    key : Fingerprint,
    lock : Arc< AsyncMutex< () > >,
  }

  impl SingleFlightGuard< '_ >
  {
    /// The fingerprint this guard holds the slot for.
    #[ must_use ]
    pub fn key( &self ) -> Fingerprint
    {
      self.key
    }

    /// Acquires the per-fingerprint mutex, serialising concurrent callers
    /// with an identical fingerprint onto the same miss-path call.
    pub async fn acquire( &self ) -> tokio::sync::MutexGuard< '_, () >
    {
      self.lock.lock().await
    }
  }

  impl Drop for SingleFlightGuard< '_ >
  {
    fn drop( &mut self )
    {
      self.cache.in_flight.remove( &self.key );
    }
  }

  /// The two-tier cache.
  pub struct Cache
  {
    memory : MemoryCache,
    persistent : Option< PersistentCache >,
    config : CacheConfig,
    total_requests : AtomicU64,
    total_hits : AtomicU64,
    in_flight : DashMap< Fingerprint, Arc< AsyncMutex< () > > >,
  }

  impl Cache
  {
    /// Builds a cache from configuration. If `db` is `Some`, the
    /// persistent tier is opened inside it; otherwise the cache runs
    /// memory-only.
    pub fn new( config : CacheConfig, db : Option< &sled::Db > ) -> Result< Self >
    {
      let memory = MemoryCache::new( config.max_entries, config.max_bytes );
      let persistent = match db
      {
        Some( db ) => Some( PersistentCache::open( db )? ),
        None => None,
      };

      Ok( Self
      {
        memory,
        persistent,
        config,
        total_requests : AtomicU64::new( 0 ),
        total_hits : AtomicU64::new( 0 ),
        in_flight : DashMap::new(),
      } )
    }

    /// Looks up a request by its fingerprint. Consults the memory tier
    /// first, then the persistent tier (promoting a persistent hit into
    /// memory). Returns `None` on miss or TTL expiry.
    pub async fn get( &self, request : &Request ) -> Option< Response >
    {
      self.total_requests.fetch_add( 1, Ordering::Relaxed );

      if request.options.bypass_cache
      {
        return None;
      }

      let key = fingerprint( request );
      let now_ms = now_ms();

      if let Some( entry ) = self.memory.get( &key, now_ms ).await
      {
        self.total_hits.fetch_add( 1, Ordering::Relaxed );
        return Some( entry.response );
      }

      if let Some( persistent ) = &self.persistent
      {
        match persistent.get( &key ).await
        {
          Ok( Some( entry ) ) if entry.expires_at_ms > now_ms =>
          {
            self.memory.insert( key, entry.clone() ).await;
            self.total_hits.fetch_add( 1, Ordering::Relaxed );
            return Some( entry.response );
          }
          Ok( _ ) => {}
          Err( e ) =>
          {
            tracing::warn!( error = %e, "persistent cache read failed, continuing memory-only" );
          }
        }
      }

      None
    }

    /// Acquires the single-flight slot for a fingerprint. The returned
    /// guard must be held for the duration of the miss-path backend call;
    /// concurrent callers for the same fingerprint block on the same
    /// mutex and observe the same outcome. Dropping the guard releases
    /// the bookkeeping entry, even if the holder panics or is cancelled.
    #[ must_use ]
    pub fn single_flight_slot( &self, request : &Request ) -> SingleFlightGuard< '_ >
    {
      let key = fingerprint( request );
      let lock = self.in_flight.entry( key ).or_insert_with( | | Arc::new( AsyncMutex::new( () ) ) ).clone();
      SingleFlightGuard { cache : self, key, lock }
    }

    /// Inserts a successful, non-bypass response into both tiers.
    ///
    /// Returns `invalid_entry` for null/empty content, skips caching for
    /// entries over `max_single_entry_bytes`, and treats `ttl_seconds = 0`
    /// as "caching disabled for this call".
    pub async fn set( &self, request : &Request, response : &Response ) -> Result< () >
    {
      if request.options.bypass_cache || self.config.ttl_seconds == 0
      {
        return Ok( () );
      }

      if response.is_empty_content()
      {
        return Err( ClaudetteError::InvalidRequest( "cannot cache empty-content response".into() ) );
      }

      let size_bytes = serde_json::to_vec( response ).map( | v | v.len() as u64 ).unwrap_or( u64::MAX );
      if size_bytes > self.config.max_single_entry_bytes
      {
        return Ok( () );
      }

      let key = fingerprint( request );
      let now = now_ms();
      let entry = CacheEntry
      {
        response : response.clone(),
        created_at_ms : now,
        expires_at_ms : now + self.config.ttl_seconds * 1000,
        size_bytes,
      };

      self.memory.insert( key, entry.clone() ).await;

      if let Some( persistent ) = &self.persistent
      {
        if let Err( e ) = persistent.set( &key, &entry ).await
        {
          tracing::warn!( error = %e, "persistent cache write failed, degraded to memory-only" );
        }
      }

      Ok( () )
    }

    /// Removes matching entries from both tiers.
    pub async fn invalidate< F >( &self, predicate : F ) -> Result< () >
    where
      F : Fn( &Fingerprint, &Response ) -> bool + Clone + Send + Sync + 'static,
    {
      let predicate_for_memory = predicate.clone();
      self.memory.invalidate_matching( move | k, v | predicate_for_memory( k, &v.response ) ).await;

      if let Some( persistent ) = &self.persistent
      {
        persistent.invalidate_matching( move | k, v | predicate( k, &v.response ) )?;
      }

      Ok( () )
    }

    /// Number of single-flight slots currently held. Exposed for tests.
    #[ cfg( test ) ]
    #[ must_use ]
    pub fn in_flight_count( &self ) -> usize
    {
      self.in_flight.len()
    }

    /// Current cache statistics.
    #[ must_use ]
    pub fn stats( &self ) -> CacheStats
    {
      CacheStats
      {
        total_requests : self.total_requests.load( Ordering::Relaxed ),
        total_hits : self.total_hits.load( Ordering::Relaxed ),
        memory_entries : self.memory.entry_count(),
        memory_bytes : self.memory.weighted_size(),
      }
    }
  }

  fn now_ms() -> u64
  {
    chrono::Utc::now().timestamp_millis().max( 0 ) as u64
  }

} // end mod private

pub use private::{ Cache, CacheStats, SingleFlightGuard };

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use crate::config::CacheConfig;
  use crate::fingerprint::{ Request, RequestOptions };
  use crate::response::Response;
  use rust_decimal::Decimal;

  fn sample_request() -> Request
  {
    Request { prompt : "2+2?".into(), attachments : vec![], options : RequestOptions { temperature : 0.0, max_tokens : 8, ..Default::default() }, metadata : Default::default() }
  }

  fn sample_response() -> Response
  {
    Response
    {
      content : "4".into(),
      backend_used : "b1".into(),
      model_used : "gpt-test".into(),
      tokens_input : 5,
      tokens_output : 1,
      cost : Decimal::ZERO,
      latency_ms : 12,
      cache_hit : false,
      rag_enhanced : false,
      finished_at : chrono::Utc::now(),
    }
  }

  #[ tokio::test ]
  async fn set_then_get_round_trips()
  {
    let cache = Cache::new( CacheConfig::default(), None ).unwrap();
    let request = sample_request();
    let response = sample_response();
    cache.set( &request, &response ).await.unwrap();
    let hit = cache.get( &request ).await.unwrap();
    assert_eq!( hit.content, "4" );
    assert!( cache.stats().hit_rate() > 0.0 );
  }

  #[ tokio::test ]
  async fn bypass_cache_skips_read_and_write()
  {
    let cache = Cache::new( CacheConfig::default(), None ).unwrap();
    let mut request = sample_request();
    request.options.bypass_cache = true;
    let response = sample_response();
    cache.set( &request, &response ).await.unwrap();
    assert!( cache.get( &request ).await.is_none() );
  }

  #[ tokio::test ]
  async fn empty_content_response_rejected()
  {
    let cache = Cache::new( CacheConfig::default(), None ).unwrap();
    let request = sample_request();
    let mut response = sample_response();
    response.content = "   ".into();
    assert!( cache.set( &request, &response ).await.is_err() );
  }

  #[ tokio::test ]
  async fn ttl_zero_disables_caching()
  {
    let mut config = CacheConfig::default();
    config.ttl_seconds = 0;
    let cache = Cache::new( config, None ).unwrap();
    let request = sample_request();
    let response = sample_response();
    cache.set( &request, &response ).await.unwrap();
    assert!( cache.get( &request ).await.is_none() );
  }

  #[ tokio::test ]
  async fn oversized_entry_is_not_cached()
  {
    let mut config = CacheConfig::default();
    config.max_single_entry_bytes = 1;
    let cache = Cache::new( config, None ).unwrap();
    let request = sample_request();
    let response = sample_response();
    cache.set( &request, &response ).await.unwrap();
    assert!( cache.get( &request ).await.is_none() );
  }

  #[ tokio::test ]
  async fn persistent_tier_survives_across_cache_instances()
  {
    let dir = tempfile::tempdir().unwrap();
    let db = sled::open( dir.path() ).unwrap();
    let request = sample_request();
    let response = sample_response();

    {
      let cache = Cache::new( CacheConfig::default(), Some( &db ) ).unwrap();
      cache.set( &request, &response ).await.unwrap();
    }

    let cache2 = Cache::new( CacheConfig::default(), Some( &db ) ).unwrap();
    let hit = cache2.get( &request ).await.unwrap();
    assert_eq!( hit.content, "4" );
  }

  #[ tokio::test ]
  async fn single_flight_slot_is_shared_for_identical_fingerprint()
  {
    let cache = Cache::new( CacheConfig::default(), None ).unwrap();
    let request = sample_request();
    let guard1 = cache.single_flight_slot( &request );
    let guard2 = cache.single_flight_slot( &request );
    assert_eq!( guard1.key(), guard2.key() );
    assert_eq!( cache.in_flight_count(), 1 );
  }

  #[ tokio::test ]
  async fn single_flight_guard_releases_slot_on_drop()
  {
    let cache = Cache::new( CacheConfig::default(), None ).unwrap();
    let request = sample_request();
    {
      let _guard = cache.single_flight_slot( &request );
      assert_eq!( cache.in_flight_count(), 1 );
    }
    assert_eq!( cache.in_flight_count(), 0 );
  }
}
