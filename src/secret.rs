//! Credential handling for backend authentication references.
//!
//! A [`BackendDescriptor`](crate::backend::BackendDescriptor) names an
//! `auth_ref` — the *name* of an environment variable, never the secret
//! itself. This module resolves that name to a [`secrecy::SecretString`]
//! at startup and never lets it escape into logs or `Debug` output.

mod private
{
  use crate::error::{ ClaudetteError, Result };
  use secrecy::{ ExposeSecret, SecretString };
  use core::fmt;

  /// A credential resolved from an environment variable.
  ///
  /// `Debug` deliberately prints a redacted placeholder; use
  /// [`Credential::expose`] at the single call site that needs the raw
  /// value (building the `Authorization` header).
  #[ derive( Clone ) ]
  pub struct Credential
  {
    source_env_var : String,
    secret : SecretString,
  }

  impl Credential
  {
    /// Loads a credential from the named environment variable.
    ///
    /// Returns [`ClaudetteError::Auth`] if the variable is unset or empty.
    pub fn load_from_env( env_var : &str ) -> Result< Self >
    {
      let raw = std::env::var( env_var ).map_err( | _ | ClaudetteError::Auth
      {
        backend : env_var.to_string(),
        message : format!( "environment variable {env_var} is not set" ),
      } )?;

      if raw.trim().is_empty()
      {
        return Err( ClaudetteError::Auth
        {
          backend : env_var.to_string(),
          message : format!( "environment variable {env_var} is empty" ),
        } );
      }

      Ok( Self { source_env_var : env_var.to_string(), secret : SecretString::from( raw ) } )
    }

    /// Name of the environment variable this credential was loaded from.
    #[ must_use ]
    pub fn source_env_var( &self ) -> &str
    {
      &self.source_env_var
    }

    /// Exposes the raw secret. Callers must not log or persist the result.
    #[ must_use ]
    pub fn expose( &self ) -> &str
    {
      self.secret.expose_secret()
    }
  }

  impl fmt::Debug for Credential
  {
    fn fmt( &self, f : &mut fmt::Formatter< '_ > ) -> fmt::Result
    {
      f.debug_struct( "Credential" )
        .field( "source_env_var", &self.source_env_var )
        .field( "secret", &"<redacted>" )
        .finish()
    }
  }

} // end mod private

pub use private::Credential;

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn load_from_env_missing_is_auth_error()
  {
    std::env::remove_var( "CLAUDETTE_TEST_MISSING_KEY" );
    let err = Credential::load_from_env( "CLAUDETTE_TEST_MISSING_KEY" ).unwrap_err();
    assert_eq!( err.kind(), "auth" );
  }

  #[ test ]
  fn load_from_env_present_exposes_value()
  {
    std::env::set_var( "CLAUDETTE_TEST_PRESENT_KEY", "sk-test-value" );
    let cred = Credential::load_from_env( "CLAUDETTE_TEST_PRESENT_KEY" ).unwrap();
    assert_eq!( cred.expose(), "sk-test-value" );
    assert_eq!( cred.source_env_var(), "CLAUDETTE_TEST_PRESENT_KEY" );
    std::env::remove_var( "CLAUDETTE_TEST_PRESENT_KEY" );
  }

  #[ test ]
  fn debug_output_never_contains_secret()
  {
    std::env::set_var( "CLAUDETTE_TEST_DEBUG_KEY", "sk-super-secret-value" );
    let cred = Credential::load_from_env( "CLAUDETTE_TEST_DEBUG_KEY" ).unwrap();
    let debug_text = format!( "{cred:?}" );
    assert!( !debug_text.contains( "sk-super-secret-value" ) );
    std::env::remove_var( "CLAUDETTE_TEST_DEBUG_KEY" );
  }
}
