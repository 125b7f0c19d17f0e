//! `claudette-mcp`: binary entrypoint. Loads configuration, boots the
//! router and its collaborators, serves JSON-RPC over stdio, and shuts
//! down cleanly on SIGINT/SIGTERM.

use claudette::config::Config;
use claudette::supervisor::Supervisor;
use std::path::PathBuf;

fn config_path() -> PathBuf
{
  std::env::args().nth( 1 ).map( PathBuf::from ).unwrap_or_else( | | PathBuf::from( "claudette.toml" ) )
}

fn init_logging()
{
  use tracing_subscriber::EnvFilter;

  tracing_subscriber::fmt()
    .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( | _ | EnvFilter::new( "info" ) ) )
    .with_writer( std::io::stderr )
    .init();
}

#[ tokio::main ]
async fn main() -> std::process::ExitCode
{
  match dotenvy::dotenv()
  {
    Ok( _ ) | Err( dotenvy::Error::Io( _ ) ) => {}
    Err( error ) => eprintln!( "warning: failed to parse .env: {error}" ),
  }

  init_logging();

  match run().await
  {
    Ok( clean ) =>
    {
      if clean
      {
        tracing::info!( "shutdown complete" );
        std::process::ExitCode::from( 0 )
      }
      else
      {
        tracing::warn!( "shutdown budget exceeded, work was force-cancelled" );
        std::process::ExitCode::from( 2 )
      }
    }
    Err( error ) =>
    {
      tracing::error!( %error, "fatal startup error" );
      std::process::ExitCode::from( 1 )
    }
  }
}

/// Returns whether shutdown drained cleanly within its budget.
async fn run() -> anyhow::Result< bool >
{
  let path = config_path();
  let config = Config::load_from_file( &path )
    .map_err( | e | anyhow::anyhow!( "failed to load configuration from {}: {e}", path.display() ) )?;

  let supervisor = Supervisor::bootstrap( config ).await?;

  tracing::info!( "claudette ready, serving over stdio" );
  supervisor.serve().await?;

  Ok( supervisor.shutdown().await )
}
