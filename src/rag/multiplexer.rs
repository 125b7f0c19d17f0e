//! RAG Multiplexer: worker pool, load balancing, failover, and the
//! bounded priority queue's consumer side.

mod private
{
  use crate::backend::health::{ BackendRuntime, BreakerState };
  use crate::config::{ HealthConfig, RagConfig };
  use crate::error::{ ClaudetteError, Result };
  use crate::rag::queue::PriorityQueue;
  use crate::rag::worker::{ HttpWorker, RagWorker, SubprocessWorker, WorkerEntry };
  use std::sync::atomic::{ AtomicUsize, Ordering };
  use std::sync::Arc;
  use std::time::Duration;
  use tokio::sync::Mutex as AsyncMutex;

  /// Configurable, hot-swappable worker-selection strategy.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum Strategy
  {
    /// Rotates through eligible workers in order.
    RoundRobin,
    /// Picks the worker with the fewest in-flight requests.
    LeastConnections,
    /// Picks the worker with the best weighted EWMA response time.
    WeightedResponseTime,
    /// EWMA of success-rate and latency combined.
    Adaptive,
  }

  impl Strategy
  {
    fn parse( raw : &str ) -> Self
    {
      match raw
      {
        "least_connections" => Self::LeastConnections,
        "weighted_response_time" => Self::WeightedResponseTime,
        "adaptive" => Self::Adaptive,
        _ => Self::RoundRobin,
      }
    }
  }

  /// The RAG worker pool and its front door, `enrich`.
  pub struct Multiplexer
  {
    workers : Vec< AsyncMutex< WorkerEntry > >,
    in_flight_counts : Vec< AtomicUsize >,
    strategy : std::sync::RwLock< Strategy >,
    queue : PriorityQueue,
    round_robin_cursor : AtomicUsize,
    startup_timeout : Duration,
    request_timeout : Duration,
    graceful_shutdown_budget : Duration,
    shutting_down : std::sync::atomic::AtomicBool,
  }

  impl Multiplexer
  {
    /// Builds the pool from configuration but does not start workers yet;
    /// call [`Multiplexer::start`] to do that in parallel.
    #[ must_use ]
    pub fn new( config : &RagConfig, health_config : HealthConfig ) -> Self
    {
      let workers : Vec< AsyncMutex< WorkerEntry > > = config.workers.iter().map( | worker_config |
      {
        let transport : Box< dyn RagWorker > = match worker_config.transport.as_str()
        {
          "subprocess" => Box::new( SubprocessWorker::new( worker_config ) ),
          _ => Box::new( HttpWorker::new( worker_config ) ),
        };
        AsyncMutex::new( WorkerEntry { worker : transport, weight : worker_config.weight, runtime : BackendRuntime::new( health_config.clone() ) } )
      } ).collect();

      let in_flight_counts = workers.iter().map( | _ | AtomicUsize::new( 0 ) ).collect();

      Self
      {
        workers,
        in_flight_counts,
        strategy : std::sync::RwLock::new( Strategy::parse( &config.strategy ) ),
        queue : PriorityQueue::new( config.queue.max_size, config.queue.per_priority_cap ),
        round_robin_cursor : AtomicUsize::new( 0 ),
        startup_timeout : Duration::from_secs( 25 ),
        request_timeout : Duration::from_secs( 90 ),
        graceful_shutdown_budget : Duration::from_secs( 10 ),
        shutting_down : std::sync::atomic::AtomicBool::new( false ),
      }
    }

    /// Starts every worker in parallel, each against its own startup
    /// deadline. A worker that fails handshake is left unhealthy
    /// (breaker-equivalent state) rather than aborting the whole pool.
    pub async fn start( &self, expected_capabilities : &[ String ] )
    {
      let futures = self.workers.iter().enumerate().map( | ( idx, entry ) | async move
      {
        let mut guard = entry.lock().await;
        match tokio::time::timeout( self.startup_timeout, guard.worker.start( expected_capabilities, self.startup_timeout ) ).await
        {
          Ok( Ok( () ) ) => guard.runtime.record_outcome( true, 0 ),
          _ =>
          {
            guard.runtime.record_outcome( false, 0 );
            tracing::warn!( worker = idx, "worker failed to start within budget" );
          }
        }
      } );
      futures_util::future::join_all( futures ).await;
    }

    /// Swaps the active load-balancing strategy without restarting the
    /// pool.
    pub fn set_strategy( &self, strategy : Strategy )
    {
      *self.strategy.write().unwrap() = strategy;
    }

    fn eligible_indices( &self ) -> Vec< usize >
    {
      ( 0..self.workers.len() ).collect()
    }

    async fn pick_worker( &self, eligible : &[ usize ] ) -> Option< usize >
    {
      let strategy = *self.strategy.read().unwrap();

      let mut healthy : Vec< usize > = Vec::new();
      for &idx in eligible
      {
        let guard = self.workers[ idx ].lock().await;
        if guard.runtime.breaker_state() != BreakerState::Open
        {
          healthy.push( idx );
        }
      }
      if healthy.is_empty()
      {
        return None;
      }

      match strategy
      {
        Strategy::RoundRobin =>
        {
          let start = self.round_robin_cursor.fetch_add( 1, Ordering::SeqCst );
          Some( healthy[ start % healthy.len() ] )
        }
        Strategy::LeastConnections =>
        {
          healthy.into_iter().min_by_key( | &idx | self.in_flight_counts[ idx ].load( Ordering::SeqCst ) )
        }
        Strategy::WeightedResponseTime | Strategy::Adaptive =>
        {
          let mut best : Option< ( usize, f64 ) > = None;
          for idx in healthy
          {
            let guard = self.workers[ idx ].lock().await;
            let latency = guard.runtime.ewma_latency_ms().max( 1.0 );
            let success_rate = guard.runtime.success_rate();
            let weight = guard.weight.max( 0.001 );
            let score = if strategy == Strategy::Adaptive
            {
              latency * ( 1.0 + ( 1.0 - success_rate ) ) / weight
            }
            else
            {
              latency / weight
            };
            if best.map( | ( _, best_score ) | score < best_score ).unwrap_or( true )
            {
              best = Some( ( idx, score ) );
            }
          }
          best.map( | ( idx, _ ) | idx )
        }
      }
    }

    /// Enriches `prompt` via the worker pool. Enqueues into the bounded
    /// priority queue (fast failure with `backpressure` if full), then
    /// dispatches to the best eligible worker, failing over to another
    /// once on worker failure. A worker is never retried twice for the
    /// same request after a terminal error.
    pub async fn enrich( &self, prompt : &str, priority : u8 ) -> Result< String >
    {
      if self.shutting_down.load( Ordering::SeqCst )
      {
        return Err( ClaudetteError::Backpressure );
      }

      self.queue.try_enqueue( prompt.to_string(), priority )?;
      let queued = self.queue.try_dequeue().ok_or( ClaudetteError::Backpressure )?;

      let mut tried = Vec::new();
      loop
      {
        let eligible : Vec< usize > = self.eligible_indices().into_iter().filter( | i | !tried.contains( i ) ).collect();
        let Some( idx ) = self.pick_worker( &eligible ).await else { return Err( ClaudetteError::NoBackendAvailable ) };

        let mut guard = self.workers[ idx ].lock().await;
        if !guard.runtime.is_selectable()
        {
          drop( guard );
          tried.push( idx );
          if tried.len() >= self.workers.len()
          {
            return Err( ClaudetteError::NoBackendAvailable );
          }
          continue;
        }

        self.in_flight_counts[ idx ].fetch_add( 1, Ordering::SeqCst );
        let start = std::time::Instant::now();
        let result = guard.worker.enrich( &queued.payload, self.request_timeout ).await;
        self.in_flight_counts[ idx ].fetch_sub( 1, Ordering::SeqCst );

        match result
        {
          Ok( text ) =>
          {
            guard.runtime.record_outcome( true, start.elapsed().as_millis() as u64 );
            return Ok( text );
          }
          Err( error ) =>
          {
            guard.runtime.record_outcome( false, start.elapsed().as_millis() as u64 );
            tried.push( idx );
            if tried.len() >= self.workers.len()
            {
              return Err( error );
            }
          }
        }
      }
    }

    /// Begins graceful shutdown: stop admitting new enqueues, drain the
    /// queue up to `graceful_shutdown_budget`, then return.
    pub async fn shutdown( &self )
    {
      self.shutting_down.store( true, Ordering::SeqCst );
      let deadline = tokio::time::Instant::now() + self.graceful_shutdown_budget;
      while !self.queue.is_empty() && tokio::time::Instant::now() < deadline
      {
        tokio::time::sleep( Duration::from_millis( 20 ) ).await;
      }
    }
  }

} // end mod private

pub use private::{ Multiplexer, Strategy };
