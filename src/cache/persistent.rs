//! Persistent ordered-KV cache tier, backed by `sled`.
//!
//! Authoritative across restarts per the data-model contract. I/O errors
//! are retried once with a short fixed backoff; a second failure degrades
//! the caller to memory-only rather than becoming fatal.

mod private
{
  use crate::cache::memory::CacheEntry;
  use crate::error::{ ClaudetteError, Result };
  use crate::fingerprint::Fingerprint;
  use crate::response::Response;
  use serde::{ Deserialize, Serialize };

  #[ derive( Serialize, Deserialize ) ]
  struct StoredEntry
  {
    response : Response,
    created_at_ms : u64,
    expires_at_ms : u64,
    size_bytes : u64,
  }

  /// The durable tier. Wraps a single `sled::Tree`.
  pub struct PersistentCache
  {
    tree : sled::Tree,
  }

  /// Current on-disk schema version; bumping this without a migration
  /// path is, by design, a startup error (not a silent wipe).
  const SCHEMA_VERSION : u32 = 1;
  const SCHEMA_VERSION_KEY : &[ u8 ] = b"__schema_version__";

  impl PersistentCache
  {
    /// Opens the `cache` tree inside an existing `sled::Db`, checking the
    /// schema version marker.
    pub fn open( db : &sled::Db ) -> Result< Self >
    {
      let tree = db.open_tree( "cache" ).map_err( | e | ClaudetteError::CacheUnavailable( e.to_string() ) )?;

      match tree.get( SCHEMA_VERSION_KEY ).map_err( | e | ClaudetteError::CacheUnavailable( e.to_string() ) )?
      {
        Some( bytes ) =>
        {
          let stored_version = u32::from_be_bytes( bytes.as_ref().try_into().map_err
          (
            | _ | ClaudetteError::InvalidRequest( "corrupt cache schema marker".into() )
          )? );
          if stored_version != SCHEMA_VERSION
          {
            return Err( ClaudetteError::InvalidRequest( format!
            (
              "cache schema version mismatch: on-disk {stored_version}, expected {SCHEMA_VERSION}"
            ) ) );
          }
        }
        None =>
        {
          tree.insert( SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_be_bytes() )
            .map_err( | e | ClaudetteError::CacheUnavailable( e.to_string() ) )?;
        }
      }

      Ok( Self { tree } )
    }

    /// Reads an entry, retrying once on I/O failure before surfacing
    /// [`ClaudetteError::CacheUnavailable`] to the caller (who is expected
    /// to degrade to memory-only, not treat this as fatal).
    pub async fn get( &self, fingerprint : &Fingerprint ) -> Result< Option< CacheEntry > >
    {
      let bytes = self.read_with_retry( fingerprint ).await?;
      let Some( bytes ) = bytes else { return Ok( None ) };
      let stored : StoredEntry = serde_json::from_slice( &bytes )?;
      Ok( Some( CacheEntry
      {
        response : stored.response,
        created_at_ms : stored.created_at_ms,
        expires_at_ms : stored.expires_at_ms,
        size_bytes : stored.size_bytes,
      } ) )
    }

    async fn read_with_retry( &self, fingerprint : &Fingerprint ) -> Result< Option< Vec< u8 > > >
    {
      match self.tree.get( fingerprint.as_bytes() )
      {
        Ok( value ) => Ok( value.map( | v | v.to_vec() ) ),
        Err( first_err ) =>
        {
          tokio::time::sleep( std::time::Duration::from_millis( 50 ) ).await;
          self.tree.get( fingerprint.as_bytes() )
            .map( | v | v.map( | v | v.to_vec() ) )
            .map_err( | _ | ClaudetteError::CacheUnavailable( first_err.to_string() ) )
        }
      }
    }

    /// Writes an entry, retrying once on I/O failure.
    pub async fn set( &self, fingerprint : &Fingerprint, entry : &CacheEntry ) -> Result< () >
    {
      let stored = StoredEntry
      {
        response : entry.response.clone(),
        created_at_ms : entry.created_at_ms,
        expires_at_ms : entry.expires_at_ms,
        size_bytes : entry.size_bytes,
      };
      let bytes = serde_json::to_vec( &stored )?;

      if self.tree.insert( fingerprint.as_bytes(), bytes.clone() ).is_ok()
      {
        return Ok( () );
      }

      tokio::time::sleep( std::time::Duration::from_millis( 50 ) ).await;
      self.tree.insert( fingerprint.as_bytes(), bytes )
        .map( | _ | () )
        .map_err( | e | ClaudetteError::CacheUnavailable( e.to_string() ) )
    }

    /// Removes entries whose fingerprint/entry pair matches `predicate`.
    pub fn invalidate_matching< F >( &self, predicate : F ) -> Result< () >
    where
      F : Fn( &Fingerprint, &CacheEntry ) -> bool,
    {
      let mut to_remove = Vec::new();
      for item in self.tree.iter()
      {
        let ( key, value ) = item.map_err( | e | ClaudetteError::CacheUnavailable( e.to_string() ) )?;
        if key.as_ref() == SCHEMA_VERSION_KEY || key.len() != 32
        {
          continue;
        }
        let mut raw = [ 0u8 ; 32 ];
        raw.copy_from_slice( &key );
        let fingerprint = Fingerprint::from_bytes( raw );

        let stored : StoredEntry = serde_json::from_slice( &value )?;
        let entry = CacheEntry
        {
          response : stored.response,
          created_at_ms : stored.created_at_ms,
          expires_at_ms : stored.expires_at_ms,
          size_bytes : stored.size_bytes,
        };

        if predicate( &fingerprint, &entry )
        {
          to_remove.push( key.to_vec() );
        }
      }

      for key in to_remove
      {
        self.tree.remove( key ).map_err( | e | ClaudetteError::CacheUnavailable( e.to_string() ) )?;
      }
      Ok( () )
    }
  }

} // end mod private

pub use private::PersistentCache;
