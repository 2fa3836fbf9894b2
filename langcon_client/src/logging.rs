use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber (`RUST_LOG`, default `info`). Returns false if one was already set.
pub fn init() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init()
    {
        Ok(()) => true,
        Err(err) => {
            eprintln!("tracing already initialized: {err}");
            false
        }
    }
}
