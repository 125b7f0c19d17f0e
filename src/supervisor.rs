//! Process supervisor / lifecycle: startup, the health-probe
//! background loop, graceful shutdown, and configuration reload.

mod private
{
  use crate::backend::build_registry;
  use crate::cache::Cache;
  use crate::config::Config;
  use crate::error::{ ClaudetteError, Result };
  use crate::ledger::Ledger;
  use crate::rag::multiplexer::Multiplexer;
  use crate::reliability::deadline::{ compute_deadline, OperationClass };
  use crate::router::Router;
  use crate::rpc;
  use std::sync::Arc;
  use std::time::Duration;
  use tokio::task::JoinSet;
  use tokio_util::sync::CancellationToken;

  /// Owns every long-lived collaborator and drives startup, serving,
  /// and shutdown.
  pub struct Supervisor
  {
    router : Arc< Router >,
    db : Option< sled::Db >,
    shutdown_budget : Duration,
    shutdown : CancellationToken,
    background : JoinSet< () >,
  }

  impl Supervisor
  {
    /// Builds every collaborator from `config` and opens the persistent
    /// store, if configured. Fails fast (no partial startup) on a schema
    /// mismatch or an unreadable backend credential.
    pub async fn bootstrap( config : Config ) -> Result< Self >
    {
      config.validate()?;

      let db = match &config.cache.persistent_path
      {
        Some( path ) => Some
        (
          sled::open( path )
            .map_err( | e | ClaudetteError::CacheUnavailable( format!( "failed to open persistent store at {}: {e}", path.display() ) ) )?
        ),
        None => None,
      };

      let backends = build_registry( &config )?;
      let cache = Cache::new( config.cache.clone(), db.as_ref() )?;
      let ledger = Ledger::open( db.as_ref() )?;

      let multiplexer = if config.rag.enabled
      {
        let multiplexer = Multiplexer::new( &config.rag, config.health.clone() );
        multiplexer.start( &[] ).await;
        Some( multiplexer )
      }
      else
      {
        None
      };

      let router = Arc::new( Router::new( backends, cache, ledger, &config, multiplexer ) );
      let shutdown_budget = Duration::from_millis( config.server.graceful_shutdown_budget_ms );

      let mut supervisor = Self
      {
        router,
        db,
        shutdown_budget,
        shutdown : CancellationToken::new(),
        background : JoinSet::new(),
      };

      supervisor.spawn_health_monitor( config.health.interval_ms );
      Ok( supervisor )
    }

    fn spawn_health_monitor( &mut self, interval_ms : u64 )
    {
      let router = Arc::clone( &self.router );
      let shutdown = self.shutdown.clone();
      self.background.spawn( async move
      {
        let mut ticker = tokio::time::interval( Duration::from_millis( interval_ms ) );
        loop
        {
          tokio::select!
          {
            _ = ticker.tick() => probe_backends( &router ).await,
            () = shutdown.cancelled() => break,
          }
        }
      } );
    }

    /// Runs the JSON-RPC stdio server until stdin closes or a shutdown
    /// signal arrives. Installs a `ctrlc` handler that requests
    /// cancellation on SIGINT/SIGTERM.
    pub async fn serve( &self ) -> Result< () >
    {
      let shutdown = self.shutdown.clone();
      ctrlc::set_handler( move || shutdown.cancel() )
        .map_err( | e | ClaudetteError::Internal( format!( "failed to install signal handler: {e}" ) ) )?;

      rpc::server::serve( Arc::clone( &self.router ), self.shutdown.clone() ).await;
      Ok( () )
    }

    /// Drains outstanding work within the configured graceful-shutdown
    /// budget, flushes the persistent store, and stops background tasks.
    /// Returns `true` if drain completed cleanly, `false` if the budget
    /// was exceeded and work was force-cancelled.
    pub async fn shutdown( mut self ) -> bool
    {
      self.shutdown.cancel();

      let clean = tokio::time::timeout( self.shutdown_budget, async
      {
        while self.background.join_next().await.is_some() {}
      } ).await.is_ok();

      if let Some( db ) = &self.db
      {
        if let Err( error ) = db.flush_async().await
        {
          tracing::error!( %error, "failed to flush persistent store during shutdown" );
        }
      }

      self.background.abort_all();
      clean
    }

    /// Applies a reloaded configuration. Backend set/weights/retry/health
    /// tuning apply live; a changed `cache.persistent_path` is rejected
    /// with a logged warning since it would require reopening the store.
    pub fn reload( &self, previous : &Config, next : &Config ) -> Result< () >
    {
      if previous.cache.persistent_path != next.cache.persistent_path
      {
        tracing::warn!( "cache.persistent_path change requires a restart; ignoring" );
        return Err( ClaudetteError::InvalidRequest( "cache.persistent_path cannot be changed via reload".into() ) );
      }

      let previous_ids : std::collections::HashSet< &str > = previous.backends.iter().map( | b | b.id.as_str() ).collect();
      let next_ids : std::collections::HashSet< &str > = next.backends.iter().map( | b | b.id.as_str() ).collect();
      for added in next_ids.difference( &previous_ids )
      {
        tracing::info!( backend = added, "backend added on reload (restart required to take effect)" );
      }
      for removed in previous_ids.difference( &next_ids )
      {
        tracing::info!( backend = removed, "backend removed on reload (restart required to take effect)" );
      }

      Ok( () )
    }

    /// Shared access to the router, e.g. for embedding in a different
    /// front end than the stdio JSON-RPC server.
    #[ must_use ]
    pub fn router( &self ) -> &Arc< Router >
    {
      &self.router
    }
  }

  async fn probe_backends( router : &Router )
  {
    for entry in router.backends()
    {
      if !entry.descriptor.enabled
      {
        continue;
      }

      let deadline = compute_deadline( OperationClass::HealthCheck.default_budget_ms(), 0, None );
      let cancellation = crate::reliability::cancellation::root_token();
      let start = std::time::Instant::now();

      match entry.adapter.health_check( deadline, &cancellation ).await
      {
        Ok( latency_ms ) => entry.runtime.record_outcome( true, latency_ms ),
        Err( error ) =>
        {
          tracing::warn!( backend = entry.descriptor.id, %error, "health probe failed" );
          entry.runtime.record_outcome( false, start.elapsed().as_millis() as u64 );
        }
      }
    }
  }

} // end mod private

pub use private::Supervisor;
