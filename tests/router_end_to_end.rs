//! End-to-end router scenarios against mocked upstream backends.

use claudette::config::Config;
use claudette::fingerprint::{ Request, RequestOptions };
use claudette::{ ClaudetteError, Router };
use wiremock::matchers::{ method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

fn chat_completion_body( content : &str ) -> serde_json::Value
{
  serde_json::json!
  ( {
    "id" : "chatcmpl-test",
    "model" : "gpt-test",
    "choices" :
    [
      { "message" : { "role" : "assistant", "content" : content }, "finish_reason" : "stop" }
    ],
    "usage" : { "prompt_tokens" : 10, "completion_tokens" : 5, "total_tokens" : 15 },
  } )
}

fn config_for( backends_toml : &str ) -> Config
{
  let text = format!( "{backends_toml}\n[health]\ninterval_ms = 3_600_000\n" );
  Config::load_from_str( &text ).expect( "test config should parse" )
}

async fn build_router( backends_toml : &str ) -> Router
{
  let config = config_for( backends_toml );
  let backends = claudette::backend::build_registry( &config ).unwrap();
  let cache = claudette::cache::Cache::new( config.cache.clone(), None ).unwrap();
  let ledger = claudette::ledger::Ledger::open( None ).unwrap();
  Router::new( backends, cache, ledger, &config, None )
}

fn request( prompt : &str ) -> Request
{
  Request { prompt : prompt.into(), attachments : vec![], options : RequestOptions::default(), metadata : Default::default() }
}

#[ tokio::test ]
async fn cache_miss_then_hit_skips_second_upstream_call()
{
  std::env::set_var( "E2E_KEY_1", "sk-test" );
  let server = MockServer::start().await;
  Mock::given( method( "POST" ) ).and( path( "/v1/chat/completions" ) )
    .respond_with( ResponseTemplate::new( 200 ).set_body_json( chat_completion_body( "hello there" ) ) )
    .expect( 1 )
    .mount( &server ).await;

  let toml = format!
  ( r#"
    [[backends]]
    id = "b1"
    kind = "openai_compatible"
    base_url = "{}"
    auth_ref = "E2E_KEY_1"
    model = "gpt-test"
    cost_in = "0.0001"
    cost_out = "0.0002"
  "#, server.uri() );

  let router = build_router( &toml ).await;

  let first = router.optimize( request( "what is rust" ) ).await.unwrap();
  assert!( !first.cache_hit );

  let second = router.optimize( request( "what is rust" ) ).await.unwrap();
  assert!( second.cache_hit );
  assert_eq!( second.content, first.content );

  server.verify().await;
}

#[ tokio::test ]
async fn failover_moves_past_a_5xx_backend()
{
  std::env::set_var( "E2E_KEY_FAIL", "sk-test" );
  std::env::set_var( "E2E_KEY_OK", "sk-test" );

  let failing = MockServer::start().await;
  Mock::given( method( "POST" ) ).and( path( "/v1/chat/completions" ) )
    .respond_with( ResponseTemplate::new( 503 ) )
    .mount( &failing ).await;

  let healthy = MockServer::start().await;
  Mock::given( method( "POST" ) ).and( path( "/v1/chat/completions" ) )
    .respond_with( ResponseTemplate::new( 200 ).set_body_json( chat_completion_body( "recovered" ) ) )
    .mount( &healthy ).await;

  let toml = format!
  ( r#"
    [[backends]]
    id = "failing"
    kind = "openai_compatible"
    base_url = "{}"
    auth_ref = "E2E_KEY_FAIL"
    model = "gpt-test"
    cost_in = "0.0001"
    cost_out = "0.0002"
    priority = 0

    [[backends]]
    id = "healthy"
    kind = "openai_compatible"
    base_url = "{}"
    auth_ref = "E2E_KEY_OK"
    model = "gpt-test"
    cost_in = "0.0001"
    cost_out = "0.0002"
    priority = 1

    [retry]
    max_attempts = 1
  "#, failing.uri(), healthy.uri() );

  let router = build_router( &toml ).await;
  let response = router.optimize( request( "route around failure" ) ).await.unwrap();
  assert_eq!( response.content, "recovered" );
  assert_eq!( response.backend_used, "healthy" );
}

#[ tokio::test ]
async fn breaker_opens_after_repeated_failures_and_reports_unhealthy()
{
  std::env::set_var( "E2E_KEY_BREAKER", "sk-test" );
  let server = MockServer::start().await;
  Mock::given( method( "POST" ) ).and( path( "/v1/chat/completions" ) )
    .respond_with( ResponseTemplate::new( 500 ) )
    .mount( &server ).await;

  let toml = format!
  ( r#"
    [[backends]]
    id = "only"
    kind = "openai_compatible"
    base_url = "{}"
    auth_ref = "E2E_KEY_BREAKER"
    model = "gpt-test"
    cost_in = "0.0001"
    cost_out = "0.0002"

    [retry]
    max_attempts = 1

    [health]
    failure_threshold = 2
  "#, server.uri() );

  let router = build_router( &toml ).await;

  for _ in 0..2
  {
    let result = router.optimize( request( "fails" ) ).await;
    assert!( result.is_err() );
  }

  let health = router.backend_health();
  assert_eq!( health.len(), 1 );
  assert!( !health[ 0 ].1, "backend should be unhealthy after crossing the failure threshold" );

  let third = router.optimize( request( "fails again" ) ).await;
  assert!( matches!( third, Err( ClaudetteError::NoBackendAvailable ) | Err( ClaudetteError::CircuitOpen { .. } ) | Err( ClaudetteError::Upstream5xx { .. } ) ) );
}
