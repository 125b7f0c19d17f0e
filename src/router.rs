//! The Router: orchestrates cache, backend selection, the
//! Supervisor, and the ledger into the single public `optimize` operation.

mod private
{
  use crate::backend::health::BreakerState;
  use crate::backend::BackendEntry;
  use crate::cache::Cache;
  use crate::config::{ Config, RetryConfig, RouterWeights };
  use crate::error::{ ClaudetteError, Result };
  use crate::fingerprint::Request;
  use crate::ledger::{ Ledger, Outcome };
  use crate::rag::multiplexer::Multiplexer;
  use crate::reliability::cancellation::root_token;
  use crate::reliability::deadline::OperationClass;
  use crate::reliability::Supervisor;
  use crate::response::Response;
  use tokio::sync::Semaphore;

  /// Computes the normalised selection score for one candidate backend;
  /// lower is better. Combines cost, latency, priority rank, and recent
  /// success rate under configured weights.
  fn score_backend( entry : &BackendEntry, weights : &RouterWeights, max_cost : f64, max_latency : f64 ) -> f64
  {
    let cost_f64 : f64 = ( entry.descriptor.cost_in + entry.descriptor.cost_out )
      .to_string()
      .parse()
      .unwrap_or( 0.0 );
    let normalised_cost = if max_cost > 0.0 { cost_f64 / max_cost } else { 0.0 };

    let latency = entry.runtime.ewma_latency_ms();
    let normalised_latency = if max_latency > 0.0 { latency / max_latency } else { 0.0 };

    let priority_rank = ( entry.descriptor.priority + 1 ) as f64;
    let success_rate = entry.runtime.success_rate();

    weights.cost * normalised_cost
      + weights.latency * normalised_latency
      + weights.priority * ( 1.0 / priority_rank )
      + weights.success * ( 1.0 - success_rate )
  }

  /// Selects the best candidate among `backends`, honouring an explicit
  /// `backend_preference` when present and eligible. Returns the index
  /// into `backends`.
  fn select_candidate( backends : &[ BackendEntry ], weights : &RouterWeights, preference : Option< &str >, exclude : &[ usize ] ) -> Option< usize >
  {
    let eligible : Vec< usize > = backends.iter().enumerate()
      .filter( | ( idx, entry ) | !exclude.contains( idx ) && entry.descriptor.enabled && entry.runtime.breaker_state() != BreakerState::Open )
      .map( | ( idx, _ ) | idx )
      .collect();

    if eligible.is_empty()
    {
      return None;
    }

    if let Some( preferred_id ) = preference
    {
      if let Some( idx ) = eligible.iter().find( | &&idx | backends[ idx ].descriptor.id == preferred_id )
      {
        return Some( *idx );
      }
    }

    let max_cost : f64 = eligible.iter()
      .map( | &idx | ( backends[ idx ].descriptor.cost_in + backends[ idx ].descriptor.cost_out ).to_string().parse().unwrap_or( 0.0 ) )
      .fold( 0.0f64, f64::max );
    let max_latency : f64 = eligible.iter()
      .map( | &idx | backends[ idx ].runtime.ewma_latency_ms() )
      .fold( 0.0f64, f64::max );

    eligible.into_iter()
      .map( | idx | ( idx, score_backend( &backends[ idx ], weights, max_cost, max_latency ) ) )
      .min_by( | a, b |
      {
        a.1.partial_cmp( &b.1 ).unwrap_or( std::cmp::Ordering::Equal )
          .then_with( | | backends[ a.0 ].descriptor.priority.cmp( &backends[ b.0 ].descriptor.priority ) )
          .then_with( | | backends[ a.0 ].descriptor.id.cmp( &backends[ b.0 ].descriptor.id ) )
      } )
      .map( | ( idx, _ ) | idx )
  }

  /// The cost-aware request router.
  pub struct Router
  {
    backends : Vec< BackendEntry >,
    cache : Cache,
    ledger : Ledger,
    supervisor : Supervisor,
    weights : RouterWeights,
    retry_config : RetryConfig,
    allow_empty_prompt : bool,
    default_timeout_ms : u64,
    concurrency : Semaphore,
    multiplexer : Option< Multiplexer >,
  }

  impl Router
  {
    /// Builds a router from its already-constructed collaborators.
    #[ must_use ]
    pub fn new( backends : Vec< BackendEntry >, cache : Cache, ledger : Ledger, config : &Config, multiplexer : Option< Multiplexer > ) -> Self
    {
      Self
      {
        backends,
        cache,
        ledger,
        supervisor : Supervisor::default(),
        weights : config.router.weights.clone(),
        retry_config : config.retry.clone(),
        allow_empty_prompt : config.router.allow_empty_prompt,
        default_timeout_ms : config.router.default_timeout_ms,
        concurrency : Semaphore::new( config.router.max_concurrent ),
        multiplexer,
      }
    }

    fn validate( &self, request : &Request ) -> Result< () >
    {
      if request.prompt.trim().is_empty() && !self.allow_empty_prompt
      {
        return Err( ClaudetteError::InvalidRequest( "empty prompt not allowed".into() ) );
      }
      if request.options.max_tokens == 0
      {
        return Err( ClaudetteError::InvalidRequest( "max_tokens must be positive".into() ) );
      }
      Ok( () )
    }

    /// The single public operation: validate, consult cache, optionally
    /// enrich via RAG, select a backend, call it under the Supervisor,
    /// record the ledger event, and return a [`Response`].
    #[ tracing::instrument( skip( self, request ), fields( fingerprint ) ) ]
    pub async fn optimize( &self, request : Request ) -> Result< Response >
    {
      self.validate( &request )?;

      let _permit = self.concurrency.acquire().await
        .map_err( | _ | ClaudetteError::Internal( "concurrency semaphore closed".into() ) )?;

      let fp = crate::fingerprint::fingerprint( &request );
      tracing::Span::current().record( "fingerprint", tracing::field::display( fp.to_hex() ) );

      if !request.options.bypass_cache
      {
        if let Some( mut response ) = self.cache.get( &request ).await
        {
          response.cache_hit = true;
          if let Err( e ) = self.ledger.append
          (
            response.backend_used.clone(), fp, response.tokens_input, response.tokens_output,
            response.cost, true, response.latency_ms, Outcome::Success,
          )
          {
            tracing::warn!( error = %e, "ledger append failed" );
          }
          return Ok( response );
        }
      }

      let mut prompt = request.prompt.clone();
      let mut rag_enhanced = false;
      if let Some( multiplexer ) = &self.multiplexer
      {
        match multiplexer.enrich( &prompt, request.options.priority ).await
        {
          Ok( enriched ) =>
          {
            prompt = enriched;
            rag_enhanced = true;
          }
          Err( ClaudetteError::Backpressure ) =>
          {
            tracing::debug!( "rag backpressure, proceeding without enrichment" );
          }
          Err( e ) =>
          {
            tracing::warn!( error = %e, "rag enrichment failed, proceeding without enrichment" );
          }
        }
      }

      let flight_guard = self.cache.single_flight_slot( &request );
      let _lock = flight_guard.acquire().await;

      if !request.options.bypass_cache
      {
        if let Some( mut response ) = self.cache.get( &request ).await
        {
          response.cache_hit = true;
          if let Err( e ) = self.ledger.append
          (
            response.backend_used.clone(), fp, response.tokens_input, response.tokens_output,
            response.cost, true, response.latency_ms, Outcome::Success,
          )
          {
            tracing::warn!( error = %e, "ledger append failed" );
          }
          return Ok( response );
        }
      }

      self.dispatch_with_failover( &request, &prompt, rag_enhanced, fp ).await
    }

    async fn dispatch_with_failover( &self, request : &Request, prompt : &str, rag_enhanced : bool, fp : crate::fingerprint::Fingerprint ) -> Result< Response >
    {
      let mut excluded = Vec::new();
      let mut last_error = ClaudetteError::NoBackendAvailable;
      let mut retried_overall = false;

      loop
      {
        let Some( idx ) = select_candidate( &self.backends, &self.weights, request.options.backend_preference.as_deref(), &excluded )
        else
        {
          if let Err( e ) = self.ledger.append( String::new(), fp, 0, 0, rust_decimal::Decimal::ZERO, false, 0, Outcome::Failure )
          {
            tracing::warn!( error = %e, "ledger append failed" );
          }
          return Err( if matches!( last_error, ClaudetteError::NoBackendAvailable ) { ClaudetteError::NoBackendAvailable } else { last_error } );
        };

        let entry = &self.backends[ idx ];

        if !entry.runtime.is_selectable()
        {
          excluded.push( idx );
          continue;
        }

        let cancellation = root_token();
        let deadline = self.supervisor.deadline_for
        (
          if request.options.max_tokens > 512 { OperationClass::ComplexChatCall } else { OperationClass::SimpleChatCall },
          request.options.priority,
          None,
        );

        let retry_config = self.retry_config.clone();
        let mut attempts_used = 0u32;
        let send_result = self.supervisor.with_retry
        (
          &retry_config,
          &( | | entry.runtime.breaker_state() == crate::backend::health::BreakerState::Open ),
          | attempt |
          {
            attempts_used = attempt;
            entry.adapter.send
            (
              prompt,
              request.options.model_override.as_deref(),
              request.options.max_tokens,
              request.options.temperature,
              deadline,
              &cancellation,
            )
          },
        ).await;

        match send_result
        {
          Ok( mut response ) =>
          {
            response.rag_enhanced = rag_enhanced;
            entry.runtime.record_outcome( true, response.latency_ms );

            let outcome = if attempts_used > 1 || retried_overall { Outcome::RetriedSuccess } else { Outcome::Success };
            if let Err( e ) = self.ledger.append
            (
              response.backend_used.clone(), fp, response.tokens_input, response.tokens_output,
              response.cost, false, response.latency_ms, outcome,
            )
            {
              tracing::warn!( error = %e, "ledger append failed" );
            }

            if let Err( e ) = self.cache.set( request, &response ).await
            {
              tracing::warn!( error = %e, "failed to cache response" );
            }

            return Ok( response );
          }
          Err( error ) =>
          {
            entry.runtime.record_outcome( false, 0 );
            last_error = error;

            let non_retriable = matches!
            (
              last_error,
              ClaudetteError::Auth { .. } | ClaudetteError::InvalidRequest( _ ) | ClaudetteError::ContentPolicy { .. }
            );

            if non_retriable
            {
              if let Err( e ) = self.ledger.append( String::new(), fp, 0, 0, rust_decimal::Decimal::ZERO, false, 0, Outcome::Failure )
              {
                tracing::warn!( error = %e, "ledger append failed" );
              }
              return Err( last_error );
            }

            excluded.push( idx );
            retried_overall = true;
          }
        }
      }
    }

    /// Read-only access to the cache, for the JSON-RPC status/health tools.
    #[ must_use ]
    pub fn cache( &self ) -> &Cache
    {
      &self.cache
    }

    /// Read-only access to the ledger, for status/health tools.
    #[ must_use ]
    pub fn ledger( &self ) -> &Ledger
    {
      &self.ledger
    }

    /// Read-only access to the backend registry, for the health-probe
    /// background loop.
    #[ must_use ]
    pub fn backends( &self ) -> &[ BackendEntry ]
    {
      &self.backends
    }

    /// Per-backend health snapshot: `(id, healthy, breaker_state)`.
    #[ must_use ]
    pub fn backend_health( &self ) -> Vec< ( String, bool, BreakerState ) >
    {
      self.backends.iter()
        .map( | e | ( e.descriptor.id.clone(), e.runtime.healthy(), e.runtime.breaker_state() ) )
        .collect()
    }
  }

} // end mod private

pub use private::Router;
