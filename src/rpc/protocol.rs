//! JSON-RPC 2.0 line-delimited wire types.

mod private
{
  use serde::{ Deserialize, Serialize };
  use serde_json::Value;

  /// A single inbound request or notification.
  #[ derive( Debug, Clone, Deserialize ) ]
  pub struct RpcRequest
  {
    /// Must be `"2.0"`; not validated beyond shape.
    #[ serde( default ) ]
    pub jsonrpc : String,
    /// Correlates the response; absent for notifications.
    #[ serde( default ) ]
    pub id : Option< Value >,
    /// Method name, e.g. `"tools/call"`.
    pub method : String,
    /// Method parameters, method-shape-dependent.
    #[ serde( default ) ]
    pub params : Option< Value >,
  }

  /// Standard JSON-RPC error object.
  #[ derive( Debug, Clone, Serialize ) ]
  pub struct RpcError
  {
    /// Numeric error code, per the JSON-RPC 2.0 reserved ranges.
    pub code : i64,
    /// Human-readable message.
    pub message : String,
    /// Optional structured detail.
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    pub data : Option< Value >,
  }

  impl RpcError
  {
    /// `-32700 Parse error` — malformed JSON.
    #[ must_use ]
    pub fn parse_error( detail : &str ) -> Self
    {
      Self { code : -32700, message : "Parse error".into(), data : Some( Value::String( detail.into() ) ) }
    }

    /// `-32601 Method not found`.
    #[ must_use ]
    pub fn method_not_found( method : &str ) -> Self
    {
      Self { code : -32601, message : "Method not found".into(), data : Some( Value::String( method.into() ) ) }
    }

    /// `-32602 Invalid params`.
    #[ must_use ]
    pub fn invalid_params( detail : &str ) -> Self
    {
      Self { code : -32602, message : "Invalid params".into(), data : Some( Value::String( detail.into() ) ) }
    }

    /// `-32603 Internal error`.
    #[ must_use ]
    pub fn internal_error( detail : &str ) -> Self
    {
      Self { code : -32603, message : "Internal error".into(), data : Some( Value::String( detail.into() ) ) }
    }
  }

  /// One outbound response.
  #[ derive( Debug, Clone, Serialize ) ]
  pub struct RpcResponse
  {
    /// Always `"2.0"`.
    pub jsonrpc : String,
    /// Echoes the request's `id`; `null` for malformed requests.
    pub id : Value,
    /// Result payload, present on success.
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    pub result : Option< Value >,
    /// Error payload, present on failure. Exactly one of `result`/`error`
    /// is set.
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    pub error : Option< RpcError >,
  }

  impl RpcResponse
  {
    /// Builds a success response.
    #[ must_use ]
    pub fn success( id : Value, result : Value ) -> Self
    {
      Self { jsonrpc : "2.0".into(), id, result : Some( result ), error : None }
    }

    /// Builds an error response.
    #[ must_use ]
    pub fn failure( id : Value, error : RpcError ) -> Self
    {
      Self { jsonrpc : "2.0".into(), id, result : None, error : Some( error ) }
    }
  }

  /// One exposed tool's declared shape, returned by `tools/list`.
  #[ derive( Debug, Clone, Serialize ) ]
  pub struct ToolDescriptor
  {
    /// Tool name, e.g. `"claudette_query"`.
    pub name : String,
    /// Human-readable description.
    pub description : String,
    /// JSON Schema for `arguments`.
    pub input_schema : Value,
  }

} // end mod private

pub use private::{ RpcError, RpcRequest, RpcResponse, ToolDescriptor };
