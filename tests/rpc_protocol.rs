//! JSON-RPC wire-level scenarios: malformed input, unknown method,
//! tool descriptors.

use claudette::rpc::protocol::{ RpcError, RpcRequest, RpcResponse };
use claudette::rpc::tools;
use serde_json::Value;

#[ test ]
fn malformed_json_yields_parse_error_with_null_id()
{
  let malformed = "{ this is not json";
  let parsed : Result< RpcRequest, _ > = serde_json::from_str( malformed );
  assert!( parsed.is_err() );

  let response = RpcResponse::failure( Value::Null, RpcError::parse_error( &parsed.unwrap_err().to_string() ) );
  let value = serde_json::to_value( &response ).unwrap();

  assert_eq!( value[ "jsonrpc" ], "2.0" );
  assert_eq!( value[ "id" ], Value::Null );
  assert_eq!( value[ "error" ][ "code" ], -32700 );
  assert_eq!( value[ "error" ][ "message" ], "Parse error" );
}

#[ test ]
fn unknown_method_yields_method_not_found()
{
  let response = RpcResponse::failure( Value::from( 1 ), RpcError::method_not_found( "nonexistent/method" ) );
  let value = serde_json::to_value( &response ).unwrap();
  assert_eq!( value[ "error" ][ "code" ], -32601 );
}

#[ test ]
fn tools_list_advertises_all_four_tools()
{
  let names : Vec< String > = tools::list_tools().into_iter().map( | t | t.name ).collect();
  assert_eq!( names.len(), 4 );
  for expected in [ "claudette_query", "claudette_status", "claudette_analyze", "claudette_health" ]
  {
    assert!( names.contains( &expected.to_string() ), "missing tool: {expected}" );
  }
}

#[ test ]
fn request_without_id_deserialises_as_notification()
{
  let request : RpcRequest = serde_json::from_str( r#"{"jsonrpc":"2.0","method":"tools/list"}"# ).unwrap();
  assert!( request.id.is_none() );
  assert_eq!( request.method, "tools/list" );
}
