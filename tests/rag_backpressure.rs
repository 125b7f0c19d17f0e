//! RAG queue backpressure: a full queue fails fast rather than blocking.

use claudette::config::{ HealthConfig, RagConfig, RagQueueConfig, RagWorkerConfig };
use claudette::rag::multiplexer::Multiplexer;
use claudette::ClaudetteError;

fn config_with_capacity( max_size : usize ) -> RagConfig
{
  RagConfig
  {
    enabled : true,
    strategy : "round_robin".into(),
    workers : vec!
    [
      RagWorkerConfig { id : "w1".into(), transport : "http".into(), endpoint : "http://127.0.0.1:1".into(), capabilities : vec![], weight : 1.0 }
    ],
    queue : RagQueueConfig { max_size, per_priority_cap : max_size },
  }
}

#[ tokio::test ]
async fn full_queue_rejects_with_backpressure_without_blocking()
{
  // endpoint is unreachable on purpose; we only care about the queue's
  // admission control here, not a successful enrichment.
  let multiplexer = Multiplexer::new( &config_with_capacity( 0 ), HealthConfig::default() );

  let result = multiplexer.enrich( "anything", 5 ).await;
  assert!( matches!( result, Err( ClaudetteError::Backpressure ) ) );
}

#[ tokio::test ]
async fn shutdown_stops_admitting_new_enrichment_requests()
{
  let multiplexer = Multiplexer::new( &config_with_capacity( 16 ), HealthConfig::default() );
  multiplexer.shutdown().await;

  let result = multiplexer.enrich( "anything", 5 ).await;
  assert!( matches!( result, Err( ClaudetteError::Backpressure ) ) );
}
