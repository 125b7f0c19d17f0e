//! The tool surface exposed over JSON-RPC: `claudette_query`,
//! `claudette_status`, `claudette_analyze`, `claudette_health`.

mod private
{
  use crate::error::{ ClaudetteError, Result };
  use crate::fingerprint::{ Request, RequestOptions };
  use crate::router::Router;
  use crate::rpc::protocol::ToolDescriptor;
  use serde_json::{ json, Value };

  /// Declares the tool surface for `tools/list`.
  #[ must_use ]
  pub fn list_tools() -> Vec< ToolDescriptor >
  {
    vec!
    [
      ToolDescriptor
      {
        name : "claudette_query".into(),
        description : "Routes a prompt through the cost-aware backend selection and cache.".into(),
        input_schema : json!
        ( {
          "type" : "object",
          "properties" :
          {
            "prompt" : { "type" : "string" },
            "backend" : { "type" : "string" },
            "model" : { "type" : "string" },
            "max_tokens" : { "type" : "integer" },
            "temperature" : { "type" : "number" },
          },
          "required" : [ "prompt" ],
        } ),
      },
      ToolDescriptor
      {
        name : "claudette_status".into(),
        description : "Returns a system health snapshot.".into(),
        input_schema : json!( { "type" : "object", "properties" : {} } ),
      },
      ToolDescriptor
      {
        name : "claudette_analyze".into(),
        description : "Runs a router-orchestrated analytic call against a target.".into(),
        input_schema : json!
        ( {
          "type" : "object",
          "properties" : { "target" : { "type" : "string" }, "type" : { "type" : "string" } },
          "required" : [ "target", "type" ],
        } ),
      },
      ToolDescriptor
      {
        name : "claudette_health".into(),
        description : "Returns per-backend and multiplexer status.".into(),
        input_schema : json!( { "type" : "object", "properties" : {} } ),
      },
    ]
  }

  /// Dispatches a `tools/call` invocation by name.
  pub async fn call_tool( router : &Router, name : &str, arguments : Value ) -> Result< Value >
  {
    match name
    {
      "claudette_query" => claudette_query( router, arguments ).await,
      "claudette_status" => claudette_status( router ),
      "claudette_analyze" => claudette_analyze( router, arguments ).await,
      "claudette_health" => claudette_health( router ),
      other => Err( ClaudetteError::InvalidRequest( format!( "unknown tool: {other}" ) ) ),
    }
  }

  async fn claudette_query( router : &Router, arguments : Value ) -> Result< Value >
  {
    let prompt = arguments.get( "prompt" ).and_then( Value::as_str )
      .ok_or_else( | | ClaudetteError::InvalidRequest( "missing required argument: prompt".into() ) )?
      .to_string();

    let options = RequestOptions
    {
      temperature : arguments.get( "temperature" ).and_then( Value::as_f64 ).unwrap_or( 1.0 ),
      max_tokens : arguments.get( "max_tokens" ).and_then( Value::as_u64 ).unwrap_or( 256 ) as u32,
      model_override : arguments.get( "model" ).and_then( Value::as_str ).map( str::to_string ),
      backend_preference : arguments.get( "backend" ).and_then( Value::as_str ).map( str::to_string ),
      bypass_cache : false,
      priority : 0,
    };

    let request = Request { prompt, attachments : vec![], options, metadata : Default::default() };
    let response = router.optimize( request ).await?;
    Ok( serde_json::to_value( response )? )
  }

  fn claudette_status( router : &Router ) -> Result< Value >
  {
    let stats = router.cache().stats();
    let health : Vec< Value > = router.backend_health().into_iter()
      .map( | ( id, healthy, breaker ) | json!( { "id" : id, "healthy" : healthy, "breaker_state" : format!( "{breaker:?}" ) } ) )
      .collect();

    Ok( json!
    ( {
      "cache_hit_rate" : stats.hit_rate(),
      "cache_entries" : stats.memory_entries,
      "ledger_next_id" : router.ledger().next_id(),
      "backends" : health,
    } ) )
  }

  async fn claudette_analyze( router : &Router, arguments : Value ) -> Result< Value >
  {
    let target = arguments.get( "target" ).and_then( Value::as_str )
      .ok_or_else( | | ClaudetteError::InvalidRequest( "missing required argument: target".into() ) )?;
    let analysis_type = arguments.get( "type" ).and_then( Value::as_str )
      .ok_or_else( | | ClaudetteError::InvalidRequest( "missing required argument: type".into() ) )?;

    let prompt = format!( "Analyze the following {analysis_type}: {target}" );
    let request = Request { prompt, attachments : vec![], options : RequestOptions::default(), metadata : Default::default() };
    let response = router.optimize( request ).await?;
    Ok( serde_json::to_value( response )? )
  }

  fn claudette_health( router : &Router ) -> Result< Value >
  {
    let health : Vec< Value > = router.backend_health().into_iter()
      .map( | ( id, healthy, breaker ) | json!( { "id" : id, "healthy" : healthy, "breaker_state" : format!( "{breaker:?}" ) } ) )
      .collect();
    Ok( json!( { "backends" : health } ) )
  }

} // end mod private

pub use private::{ call_tool, list_tools };
