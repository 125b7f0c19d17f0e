//! Request canonicalisation and fingerprinting.
//!
//! A fingerprint is a deterministic hash of the *semantically meaningful*
//! part of a request. `priority`, `bypass_cache`, and caller `metadata` are
//! deliberately excluded so that otherwise-identical calls collide and
//! share a cache entry.

mod private
{
  use serde::{ Deserialize, Serialize };
  use sha2::{ Digest, Sha256 };

  /// One attachment in a request, e.g. a file or prior message.
  #[ derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize ) ]
  pub struct Attachment
  {
    /// Attachment name.
    pub name : String,
    /// Content hash of the attachment body (caller-computed).
    pub content_hash : String,
    /// Role the attachment plays, e.g. `"user"` or `"system"`.
    pub role : String,
  }

  /// Caller-tunable request options.
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct RequestOptions
  {
    /// Sampling temperature.
    #[ serde( default ) ]
    pub temperature : f64,
    /// Maximum output tokens.
    #[ serde( default ) ]
    pub max_tokens : u32,
    /// Explicit model override, if any.
    #[ serde( default ) ]
    pub model_override : Option< String >,
    /// Caller's preferred backend id, if any.
    #[ serde( default ) ]
    pub backend_preference : Option< String >,
    /// Skip both cache read and write for this call.
    #[ serde( default ) ]
    pub bypass_cache : bool,
    /// 0..9, higher is more urgent.
    #[ serde( default ) ]
    pub priority : u8,
  }

  impl Default for RequestOptions
  {
    fn default() -> Self
    {
      Self { temperature : 1.0, max_tokens : 256, model_override : None, backend_preference : None, bypass_cache : false, priority : 0 }
    }
  }

  /// A router request.
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct Request
  {
    /// The prompt text.
    pub prompt : String,
    /// Ordered attachments.
    #[ serde( default ) ]
    pub attachments : Vec< Attachment >,
    /// Tunable options.
    #[ serde( default ) ]
    pub options : RequestOptions,
    /// Opaque caller metadata, excluded from the fingerprint.
    #[ serde( default ) ]
    pub metadata : std::collections::BTreeMap< String, String >,
  }

  /// A deterministic, content-derived key identifying a semantically
  /// unique request. Equal fingerprints mean any cached response for one
  /// is substitutable for the other.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize ) ]
  pub struct Fingerprint( [ u8 ; 32 ] );

  impl Fingerprint
  {
    /// Reconstructs a fingerprint from raw bytes, e.g. a persistent-store
    /// key read back off disk.
    #[ must_use ]
    pub fn from_bytes( bytes : [ u8 ; 32 ] ) -> Self
    {
      Self( bytes )
    }

    /// Raw bytes of the fingerprint, suitable as a persistent-store key.
    #[ must_use ]
    pub fn as_bytes( &self ) -> &[ u8 ; 32 ]
    {
      &self.0
    }

    /// Hex-encoded representation, safe to use in logs (it is not the
    /// prompt itself, just its hash).
    #[ must_use ]
    pub fn to_hex( self ) -> String
    {
      self.0.iter().map( | b | format!( "{b:02x}" ) ).collect()
    }
  }

  impl core::fmt::Display for Fingerprint
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      write!( f, "{}", self.to_hex() )
    }
  }

  /// Canonicalises an attachment list by sorting on `(role, name)`.
  fn canonical_attachments( attachments : &[ Attachment ] ) -> Vec< Attachment >
  {
    let mut sorted = attachments.to_vec();
    sorted.sort_by( | a, b | ( &a.role, &a.name ).cmp( &( &b.role, &b.name ) ) );
    sorted
  }

  /// Rounds a float to 4 decimal places, matching the canonicalisation rule
  /// for `temperature`.
  fn round4( value : f64 ) -> f64
  {
    ( value * 10_000.0 ).round() / 10_000.0
  }

  /// The subset of request data that participates in the fingerprint.
  /// `priority`, `bypass_cache`, and `metadata` are intentionally absent.
  #[ derive( Serialize ) ]
  struct CanonicalRequest
  {
    prompt : String,
    attachments : Vec< Attachment >,
    temperature : u64,
    max_tokens : u32,
    model : String,
  }

  /// Computes the canonical form of a request used for fingerprinting.
  /// Idempotent: canonicalising an already-canonical request is a no-op
  /// with respect to the resulting fingerprint.
  fn canonicalise( request : &Request ) -> CanonicalRequest
  {
    let model = request.options.model_override.clone().unwrap_or_default().to_lowercase();
    CanonicalRequest
    {
      prompt : request.prompt.clone(),
      attachments : canonical_attachments( &request.attachments ),
      temperature : round4( request.options.temperature ).to_bits(),
      max_tokens : request.options.max_tokens,
      model,
    }
  }

  /// Computes the deterministic fingerprint of a request.
  ///
  /// # Panics
  /// Never panics: `serde_json` serialisation of `CanonicalRequest` cannot
  /// fail because every field is a plain, already-validated value.
  #[ must_use ]
  pub fn fingerprint( request : &Request ) -> Fingerprint
  {
    let canonical = canonicalise( request );
    let bytes = serde_json::to_vec( &canonical ).expect( "canonical request is always serialisable" );
    let mut hasher = Sha256::new();
    hasher.update( &bytes );
    let digest = hasher.finalize();
    let mut out = [ 0u8 ; 32 ];
    out.copy_from_slice( &digest );
    Fingerprint( out )
  }

} // end mod private

pub use private::{ fingerprint, Attachment, Fingerprint, Request, RequestOptions };

#[ cfg( test ) ]
mod tests
{
  use super::*;

  fn base_request() -> Request
  {
    Request
    {
      prompt : "2+2?".to_string(),
      attachments : vec![],
      options : RequestOptions { temperature : 0.0, max_tokens : 8, ..Default::default() },
      metadata : Default::default(),
    }
  }

  #[ test ]
  fn identical_requests_collide()
  {
    let r1 = base_request();
    let r2 = base_request();
    assert_eq!( fingerprint( &r1 ), fingerprint( &r2 ) );
  }

  #[ test ]
  fn priority_and_bypass_cache_excluded()
  {
    let mut r1 = base_request();
    let mut r2 = base_request();
    r1.options.priority = 0;
    r2.options.priority = 9;
    r1.options.bypass_cache = false;
    r2.options.bypass_cache = true;
    assert_eq!( fingerprint( &r1 ), fingerprint( &r2 ) );
  }

  #[ test ]
  fn metadata_excluded()
  {
    let mut r1 = base_request();
    let mut r2 = base_request();
    r2.metadata.insert( "trace_id".to_string(), "abc".to_string() );
    assert_eq!( fingerprint( &r1 ), fingerprint( &r2 ) );
  }

  #[ test ]
  fn attachment_order_does_not_matter()
  {
    let mut r1 = base_request();
    let mut r2 = base_request();
    r1.attachments = vec!
    [
      Attachment { name : "a.txt".into(), content_hash : "h1".into(), role : "user".into() },
      Attachment { name : "b.txt".into(), content_hash : "h2".into(), role : "system".into() },
    ];
    r2.attachments = vec!
    [
      Attachment { name : "b.txt".into(), content_hash : "h2".into(), role : "system".into() },
      Attachment { name : "a.txt".into(), content_hash : "h1".into(), role : "user".into() },
    ];
    assert_eq!( fingerprint( &r1 ), fingerprint( &r2 ) );
  }

  #[ test ]
  fn model_name_case_insensitive()
  {
    let mut r1 = base_request();
    let mut r2 = base_request();
    r1.options.model_override = Some( "GPT-4".to_string() );
    r2.options.model_override = Some( "gpt-4".to_string() );
    assert_eq!( fingerprint( &r1 ), fingerprint( &r2 ) );
  }

  #[ test ]
  fn different_prompt_diverges()
  {
    let r1 = base_request();
    let mut r2 = base_request();
    r2.prompt = "3+3?".to_string();
    assert_ne!( fingerprint( &r1 ), fingerprint( &r2 ) );
  }

  #[ test ]
  fn temperature_rounds_to_four_decimals()
  {
    let mut r1 = base_request();
    let mut r2 = base_request();
    r1.options.temperature = 0.123_449;
    r2.options.temperature = 0.123_44;
    assert_eq!( fingerprint( &r1 ), fingerprint( &r2 ) );
  }
}
