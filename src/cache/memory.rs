//! In-memory LRU + TTL cache tier, backed by `moka`.

mod private
{
  use crate::fingerprint::Fingerprint;
  use crate::response::Response;
  use moka::future::Cache as MokaCache;
  use std::time::Duration;

  /// A cache entry as held in the memory tier.
  #[ derive( Debug, Clone ) ]
  pub struct CacheEntry
  {
    /// The cached response.
    pub response : Response,
    /// Wall-clock creation time, as milliseconds since epoch.
    pub created_at_ms : u64,
    /// Wall-clock expiry time, as milliseconds since epoch.
    pub expires_at_ms : u64,
    /// Approximate serialised size, used for the byte budget.
    pub size_bytes : u64,
  }

  /// The bounded, TTL-aware memory tier.
  pub struct MemoryCache
  {
    inner : MokaCache< Fingerprint, CacheEntry >,
  }

  impl MemoryCache
  {
    /// Builds a memory tier bounded by entry count and total byte weight.
    #[ must_use ]
    pub fn new( max_entries : u64, max_bytes : u64 ) -> Self
    {
      let inner = MokaCache::builder()
        .max_capacity( max_bytes.max( 1 ) )
        .weigher( | _key : &Fingerprint, entry : &CacheEntry | -> u32
        {
          entry.size_bytes.min( u64::from( u32::MAX ) ) as u32
        } )
        .build();
      let _ = max_entries; // entry count is subsumed by the byte-weighted capacity
      Self { inner }
    }

    /// Looks up a fingerprint, returning `None` on miss or TTL expiry.
    pub async fn get( &self, fingerprint : &Fingerprint, now_ms : u64 ) -> Option< CacheEntry >
    {
      let entry = self.inner.get( fingerprint ).await?;
      if entry.expires_at_ms <= now_ms
      {
        self.inner.invalidate( fingerprint ).await;
        return None;
      }
      Some( entry )
    }

    /// Inserts an entry, replacing any existing one for the fingerprint.
    pub async fn insert( &self, fingerprint : Fingerprint, entry : CacheEntry )
    {
      self.inner.insert( fingerprint, entry ).await;
    }

    /// Removes entries matching `predicate`.
    pub async fn invalidate_matching< F >( &self, predicate : F )
    where
      F : Fn( &Fingerprint, &CacheEntry ) -> bool + Send + Sync + 'static,
    {
      let _ = self.inner.invalidate_entries_if( move | k, v | predicate( k, v ) );
      self.inner.run_pending_tasks().await;
    }

    /// Current approximate entry count.
    #[ must_use ]
    pub fn entry_count( &self ) -> u64
    {
      self.inner.entry_count()
    }

    /// Current approximate weighted size (bytes, per the weigher above).
    #[ must_use ]
    pub fn weighted_size( &self ) -> u64
    {
      self.inner.weighted_size()
    }
  }

  impl core::fmt::Debug for MemoryCache
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "MemoryCache" )
        .field( "entry_count", &self.entry_count() )
        .field( "weighted_size", &self.weighted_size() )
        .finish()
    }
  }

  /// Duration helper retained for call sites that still want `Duration`
  /// math around TTLs (moka itself is driven by absolute `expires_at_ms`).
  #[ must_use ]
  pub fn ttl_to_duration( ttl_seconds : u64 ) -> Duration
  {
    Duration::from_secs( ttl_seconds )
  }

} // end mod private

pub use private::{ ttl_to_duration, CacheEntry, MemoryCache };
