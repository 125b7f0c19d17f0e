//! Router response shape.

mod private
{
  use chrono::{ DateTime, Utc };
  use rust_decimal::Decimal;
  use serde::{ Deserialize, Serialize };

  /// The result of a router call, cacheable and serialisable.
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct Response
  {
    /// Generated content.
    pub content : String,
    /// Id of the backend that produced this response.
    pub backend_used : String,
    /// Model name actually used.
    pub model_used : String,
    /// Input tokens consumed.
    pub tokens_input : u64,
    /// Output tokens produced.
    pub tokens_output : u64,
    /// Cost in the configured currency.
    pub cost : Decimal,
    /// Observed latency, in milliseconds.
    pub latency_ms : u64,
    /// Whether this response came from the cache.
    pub cache_hit : bool,
    /// Whether RAG enrichment was applied to the originating prompt.
    pub rag_enhanced : bool,
    /// When the call finished.
    pub finished_at : DateTime< Utc >,
  }

  impl Response
  {
    /// A response is empty when it carries no usable content; such
    /// responses must never be written to the cache (`invalid_entry`).
    #[ must_use ]
    pub fn is_empty_content( &self ) -> bool
    {
      self.content.trim().is_empty()
    }
  }

} // end mod private

pub use private::Response;
