use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,sqlx=warn,actix_web=info";

pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // try_init so tests and embedders that already installed a subscriber keep it
    if json {
        let _ = fmt()
            .json()
            .with_env_filter(env_filter)
            .with_current_span(true)
            .try_init();
    } else {
        let _ = fmt().with_env_filter(env_filter).with_target(false).try_init();
    }
}
