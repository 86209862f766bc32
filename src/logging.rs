//! # Logging
//! src/logging.rs
//!
//! Inicialización del subscriber de `tracing`. `RUST_LOG` tiene prioridad
//! sobre el nivel configurado.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Instala el subscriber global.
///
/// Llamarla más de una vez no falla: la segunda instalación se ignora
/// (útil en tests que arrancan varios servidores).
pub fn init(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init("debug", false);
        init("info", true);
    }
}
