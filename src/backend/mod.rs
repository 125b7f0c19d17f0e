//! Backend registry: descriptors, the per-backend transport adapter, and
//! health/circuit-breaker runtime, bundled per backend.

pub mod adapter;
pub mod descriptor;
pub mod health;

mod private
{
  use super::adapter::BackendAdapter;
  use super::descriptor::BackendDescriptor;
  use super::health::BackendRuntime;
  use crate::config::{ Config, HealthConfig };
  use crate::error::Result;

  /// One fully-constructed backend: static descriptor, transport adapter,
  /// and mutable health/breaker runtime.
  pub struct BackendEntry
  {
    /// Static configuration.
    pub descriptor : BackendDescriptor,
    /// Transport.
    pub adapter : BackendAdapter,
    /// Health/breaker state.
    pub runtime : BackendRuntime,
  }

  /// Builds one [`BackendEntry`] per configured backend.
  pub fn build_registry( config : &Config ) -> Result< Vec< BackendEntry > >
  {
    config.backends.iter().map( | backend_config |
    {
      let descriptor = BackendDescriptor::from_config( backend_config )?;
      let adapter = BackendAdapter::new( descriptor.clone() )?;
      let runtime = BackendRuntime::new( health_config_for( config ) );
      Ok( BackendEntry { descriptor, adapter, runtime } )
    } ).collect()
  }

  fn health_config_for( config : &Config ) -> HealthConfig
  {
    config.health.clone()
  }

} // end mod private

pub use private::{ build_registry, BackendEntry };
