//! Single-backend transport: builds the OpenAI-compatible request,
//! sends it, normalises the response, and classifies errors into the
//! taxonomy.

mod private
{
  use crate::backend::descriptor::BackendDescriptor;
  use crate::cost::compute_cost;
  use crate::error::{ ClaudetteError, Result };
  use crate::response::Response;
  use serde::{ Deserialize, Serialize };
  use std::time::Instant;

  #[ derive( Debug, Serialize ) ]
  struct ChatMessage< 'a >
  {
    role : &'a str,
    content : &'a str,
  }

  #[ derive( Debug, Serialize ) ]
  struct ChatCompletionRequest< 'a >
  {
    model : &'a str,
    messages : Vec< ChatMessage< 'a > >,
    max_tokens : u32,
    temperature : f64,
  }

  #[ derive( Debug, Deserialize ) ]
  struct ChatCompletionChoice
  {
    message : ChatCompletionMessage,
  }

  #[ derive( Debug, Deserialize ) ]
  struct ChatCompletionMessage
  {
    content : String,
  }

  #[ derive( Debug, Deserialize ) ]
  struct ChatCompletionUsage
  {
    #[ serde( default ) ]
    prompt_tokens : u64,
    #[ serde( default ) ]
    completion_tokens : u64,
  }

  #[ derive( Debug, Deserialize ) ]
  struct ChatCompletionResponse
  {
    choices : Vec< ChatCompletionChoice >,
    #[ serde( default ) ]
    usage : Option< ChatCompletionUsage >,
    #[ serde( default ) ]
    model : Option< String >,
  }

  #[ derive( Debug, Deserialize ) ]
  struct UpstreamErrorEnvelope
  {
    error : UpstreamErrorBody,
  }

  #[ derive( Debug, Deserialize ) ]
  struct UpstreamErrorBody
  {
    message : String,
    #[ serde( default ) ]
    r#type : Option< String >,
  }

  /// One adapter per [`BackendDescriptor`]; owns a reusable `reqwest::Client`
  /// so connections pool naturally (default cap: 16 idle connections per host).
  #[ derive( Debug ) ]
  pub struct BackendAdapter
  {
    descriptor : BackendDescriptor,
    http_client : reqwest::Client,
  }

  impl BackendAdapter
  {
    /// Builds an adapter with a dedicated connection pool.
    pub fn new( descriptor : BackendDescriptor ) -> Result< Self >
    {
      let http_client = reqwest::Client::builder()
        .pool_max_idle_per_host( 16 )
        .build()
        .map_err( | e | ClaudetteError::Internal( format!( "failed to build http client: {e}" ) ) )?;

      Ok( Self { descriptor, http_client } )
    }

    /// The backend id this adapter serves.
    #[ must_use ]
    pub fn backend_id( &self ) -> &str
    {
      &self.descriptor.id
    }

    /// Sends one chat-completions call, respecting `deadline`.
    pub async fn send
    (
      &self,
      prompt : &str,
      model_override : Option< &str >,
      max_tokens : u32,
      temperature : f64,
      deadline : tokio::time::Instant,
      cancellation : &tokio_util::sync::CancellationToken,
    ) -> Result< Response >
    {
      let model = model_override.unwrap_or( &self.descriptor.model_default );
      let url = format!( "{}/v1/chat/completions", self.descriptor.base_url.trim_end_matches( '/' ) );

      let body = ChatCompletionRequest
      {
        model,
        messages : vec![ ChatMessage { role : "user", content : prompt } ],
        max_tokens,
        temperature,
      };

      let timeout = deadline.saturating_duration_since( tokio::time::Instant::now() );
      let start = Instant::now();

      let send_future = self.http_client
        .post( &url )
        .bearer_auth( self.descriptor.credential.expose() )
        .json( &body )
        .timeout( timeout )
        .send();

      let http_response = tokio::select!
      {
        result = send_future => result.map_err( | e | self.classify_reqwest_error( e ) )?,
        () = cancellation.cancelled() => return Err( ClaudetteError::Timeout { elapsed_ms : start.elapsed().as_millis() as u64 } ),
      };

      let status = http_response.status();
      let latency_ms = start.elapsed().as_millis() as u64;

      if !status.is_success()
      {
        return Err( self.classify_http_status( status, http_response ).await );
      }

      let bytes = http_response.bytes().await.map_err( | e | self.classify_reqwest_error( e ) )?;
      let parsed : ChatCompletionResponse = serde_json::from_slice( &bytes )
        .map_err( | e | ClaudetteError::Internal( format!( "malformed upstream response from {}: {e}", self.descriptor.id ) ) )?;

      let content = parsed.choices.into_iter().next()
        .map( | c | c.message.content )
        .ok_or_else( | | ClaudetteError::Internal( format!( "empty choices array from {}", self.descriptor.id ) ) )?;

      let ( tokens_input, tokens_output ) = parsed.usage
        .map( | u | ( u.prompt_tokens, u.completion_tokens ) )
        .unwrap_or( ( 0, 0 ) );

      let cost = compute_cost( tokens_input, tokens_output, self.descriptor.cost_in, self.descriptor.cost_out );

      Ok( Response
      {
        content,
        backend_used : self.descriptor.id.clone(),
        model_used : parsed.model.unwrap_or_else( | | model.to_string() ),
        tokens_input,
        tokens_output,
        cost,
        latency_ms,
        cache_hit : false,
        rag_enhanced : false,
        finished_at : chrono::Utc::now(),
      } )
    }

    /// Minimal liveness probe: a 1-token chat completion, since no
    /// separate liveness path is configured in this version.
    pub async fn health_check( &self, deadline : tokio::time::Instant, cancellation : &tokio_util::sync::CancellationToken ) -> Result< u64 >
    {
      let start = Instant::now();
      self.send( "ping", None, 1, 0.0, deadline, cancellation ).await?;
      Ok( start.elapsed().as_millis() as u64 )
    }

    fn classify_reqwest_error( &self, error : reqwest::Error ) -> ClaudetteError
    {
      if error.is_timeout()
      {
        ClaudetteError::Timeout { elapsed_ms : 0 }
      }
      else
      {
        ClaudetteError::TransientNetwork( error.to_string() )
      }
    }

    async fn classify_http_status( &self, status : reqwest::StatusCode, response : reqwest::Response ) -> ClaudetteError
    {
      let retry_after_ms = response.headers().get( "retry-after" )
        .and_then( | v | v.to_str().ok() )
        .and_then( | s | s.parse::< u64 >().ok() )
        .map( | secs | secs * 1000 );

      let body_text = response.text().await.unwrap_or_default();
      let message = serde_json::from_str::< UpstreamErrorEnvelope >( &body_text )
        .map( | env | env.error.message )
        .unwrap_or( body_text );

      match status.as_u16()
      {
        401 | 403 => ClaudetteError::Auth { backend : self.descriptor.id.clone(), message },
        400 | 422 => ClaudetteError::InvalidRequest( message ),
        429 => ClaudetteError::RateLimited { retry_after_ms },
        451 => ClaudetteError::ContentPolicy { backend : self.descriptor.id.clone(), message },
        500..=599 => ClaudetteError::Upstream5xx { backend : self.descriptor.id.clone(), status : status.as_u16() },
        _ => ClaudetteError::Internal( format!( "unexpected status {status} from {}: {message}", self.descriptor.id ) ),
      }
    }
  }

} // end mod private

pub use private::BackendAdapter;
