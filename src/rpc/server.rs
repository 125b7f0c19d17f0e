//! Line-delimited JSON-RPC 2.0 server over stdio.
//!
//! One task per inbound request, so a slow `claudette_query` never
//! blocks `tools/list` from answering promptly. Responses are written
//! through a single mutex so frames never interleave on stdout.

mod private
{
  use crate::rpc::protocol::{ RpcError, RpcRequest, RpcResponse };
  use crate::rpc::tools;
  use crate::router::Router;
  use serde_json::{ json, Value };
  use std::sync::Arc;
  use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout };
  use tokio::sync::Mutex;
  use tokio_util::sync::CancellationToken;

  /// Runs the stdio read/dispatch loop until stdin closes or
  /// `shutdown` is cancelled.
  pub async fn serve( router : Arc< Router >, shutdown : CancellationToken )
  {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new( stdin ).lines();
    let stdout : Arc< Mutex< Stdout > > = Arc::new( Mutex::new( tokio::io::stdout() ) );

    loop
    {
      let line = tokio::select!
      {
        line = lines.next_line() => line,
        () = shutdown.cancelled() => break,
      };

      let line = match line
      {
        Ok( Some( line ) ) => line,
        Ok( None ) => break, // stdin closed
        Err( error ) =>
        {
          tracing::error!( %error, "failed reading stdin" );
          break;
        }
      };

      if line.trim().is_empty()
      {
        continue;
      }

      let router = Arc::clone( &router );
      let stdout = Arc::clone( &stdout );
      tokio::spawn( async move
      {
        let response = handle_line( &router, &line ).await;
        write_response( &stdout, &response ).await;
      } );
    }
  }

  async fn handle_line( router : &Router, line : &str ) -> RpcResponse
  {
    let request : RpcRequest = match serde_json::from_str( line )
    {
      Ok( request ) => request,
      Err( error ) => return RpcResponse::failure( Value::Null, RpcError::parse_error( &error.to_string() ) ),
    };

    let id = request.id.clone().unwrap_or( Value::Null );

    match request.method.as_str()
    {
      "initialize" => RpcResponse::success( id, json!
      ( {
        "protocolVersion" : "2024-11-05",
        "serverInfo" : { "name" : "claudette", "version" : env!( "CARGO_PKG_VERSION" ) },
      } ) ),
      "tools/list" => RpcResponse::success( id, json!( { "tools" : tools::list_tools() } ) ),
      "tools/call" => handle_tools_call( router, id, request.params ).await,
      "resources/list" => RpcResponse::success( id, json!( { "resources" : [] } ) ),
      other => RpcResponse::failure( id, RpcError::method_not_found( other ) ),
    }
  }

  async fn handle_tools_call( router : &Router, id : Value, params : Option< Value > ) -> RpcResponse
  {
    let Some( params ) = params else
    {
      return RpcResponse::failure( id, RpcError::invalid_params( "missing params" ) );
    };

    let Some( name ) = params.get( "name" ).and_then( Value::as_str ) else
    {
      return RpcResponse::failure( id, RpcError::invalid_params( "missing params.name" ) );
    };

    let arguments = params.get( "arguments" ).cloned().unwrap_or( Value::Object( Default::default() ) );

    match tools::call_tool( router, name, arguments ).await
    {
      Ok( result ) => RpcResponse::success( id, json!( { "content" : result } ) ),
      Err( error ) if matches!( error, crate::error::ClaudetteError::InvalidRequest( _ ) ) =>
        RpcResponse::failure( id, RpcError::invalid_params( &error.to_string() ) ),
      Err( error ) => RpcResponse::failure( id, RpcError::internal_error( &error.to_string() ) ),
    }
  }

  async fn write_response( stdout : &Mutex< Stdout >, response : &RpcResponse )
  {
    let Ok( mut serialised ) = serde_json::to_vec( response ) else
    {
      tracing::error!( "failed to serialise response" );
      return;
    };
    serialised.push( b'\n' );

    let mut guard = stdout.lock().await;
    if let Err( error ) = guard.write_all( &serialised ).await
    {
      tracing::error!( %error, "failed writing stdout" );
    }
    let _ = guard.flush().await;
  }

} // end mod private

pub use private::serve;

#[ cfg( test ) ]
mod tests
{
  use crate::rpc::protocol::{ RpcError, RpcResponse };
  use serde_json::Value;

  #[ test ]
  fn parse_error_response_matches_expected_shape()
  {
    let response = RpcResponse::failure( Value::Null, RpcError::parse_error( "unexpected end of input" ) );
    let value = serde_json::to_value( &response ).unwrap();
    assert_eq!( value[ "error" ][ "code" ], -32700 );
    assert_eq!( value[ "id" ], Value::Null );
  }
}
