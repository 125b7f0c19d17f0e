//! Supervisor lifecycle: bootstrap succeeds against a reachable
//! backend, and shutdown drains cleanly within its budget when there
//! is no in-flight work.

use claudette::config::Config;
use claudette::Supervisor;
use wiremock::matchers::{ method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

#[ tokio::test ]
async fn shutdown_with_no_in_flight_work_drains_clean()
{
  std::env::set_var( "SUP_KEY", "sk-test" );
  let server = MockServer::start().await;
  Mock::given( method( "POST" ) ).and( path( "/v1/chat/completions" ) )
    .respond_with( ResponseTemplate::new( 200 ).set_body_json( serde_json::json!
    ( {
      "id" : "chatcmpl-health",
      "model" : "gpt-test",
      "choices" : [ { "message" : { "role" : "assistant", "content" : "pong" }, "finish_reason" : "stop" } ],
      "usage" : { "prompt_tokens" : 1, "completion_tokens" : 1, "total_tokens" : 2 },
    } ) ) )
    .mount( &server ).await;

  let toml = format!
  ( r#"
    [[backends]]
    id = "b1"
    kind = "openai_compatible"
    base_url = "{}"
    auth_ref = "SUP_KEY"
    model = "gpt-test"
    cost_in = "0.0001"
    cost_out = "0.0002"

    [health]
    interval_ms = 3_600_000

    [server]
    graceful_shutdown_budget_ms = 2000
  "#, server.uri() );

  let config = Config::load_from_str( &toml ).unwrap();
  let supervisor = Supervisor::bootstrap( config ).await.unwrap();

  let clean = supervisor.shutdown().await;
  assert!( clean, "shutdown should drain within its budget when nothing is in flight" );
}

#[ tokio::test ]
async fn bootstrap_rejects_unknown_backend_kind()
{
  let toml = r#"
    [[backends]]
    id = "b1"
    kind = "not_a_real_kind"
    base_url = "https://example.invalid"
    auth_ref = "SUP_KEY_MISSING"
    model = "gpt-test"
    cost_in = "0.0001"
    cost_out = "0.0002"
  "#;

  let config = Config::load_from_str( toml ).unwrap();
  let result = Supervisor::bootstrap( config ).await;
  assert!( result.is_err() );
}
