#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use crate::command::{argon, check, digest, server};
use crate::configuration::watcher::ConfigWatcher;
use crate::configuration::{Configuration, ObservabilityConfig};
use argh::FromArgs;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::sync::Arc;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

mod command;
mod configuration;
mod gate;
mod metrics_provider;

fn set_tracing(config: Option<ObservabilityConfig>) -> Result<(), configuration::Error> {
    if let Some(ObservabilityConfig {
        tracing: Some(tracing_config),
    }) = config
    {
        let resource = Resource::builder()
            .with_service_name(env!("CARGO_PKG_NAME"))
            .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
            .build();
        let otlp_exporter = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&tracing_config.endpoint)
            .with_timeout(std::time::Duration::from_secs(10))
            .build()?;

        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(otlp_exporter)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource)
            .with_sampler(Sampler::TraceIdRatioBased(tracing_config.sampling_rate))
            .build();

        let tracer = tracer_provider.tracer(env!("CARGO_PKG_NAME"));
        let _ = global::set_tracer_provider(tracer_provider);
        let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

        let _ = tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer().json())
            .with(telemetry)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer().json())
            .try_init();
    }
    Ok(())
}

#[derive(FromArgs, PartialEq, Debug)]
/// URL-scoped authentication gate for web applications
struct GlobalArguments {
    #[argh(option, short = 'c', default = "String::from(\"config.toml\")")]
    /// the path to the configuration file, defaults to `config.toml`
    config: String,

    #[argh(subcommand)]
    subcommand: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Argon(argon::Options),
    Digest(digest::Options),
    Check(check::Options),
    Serve(server::Options),
}

/// Subcommands that run against a loaded configuration.
enum ConfiguredCommand {
    Check(check::Options),
    Serve,
}

fn main() -> Result<(), command::Error> {
    let cli_args: GlobalArguments = argh::from_env();

    let configured = match cli_args.subcommand {
        SubCommand::Argon(_) => return argon::Command::run(),
        SubCommand::Digest(options) => return digest::Command::run(&options),
        SubCommand::Check(options) => ConfiguredCommand::Check(options),
        SubCommand::Serve(_) => ConfiguredCommand::Serve,
    };

    let config = Configuration::load(&cli_args.config)?;

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.global.max_concurrent_requests)
        .enable_all()
        .build()?
        .block_on(run_command(configured, &cli_args.config, config))
}

async fn run_command(
    configured: ConfiguredCommand,
    config_path: &str,
    config: Configuration,
) -> Result<(), command::Error> {
    set_tracing(config.observability.clone())?;

    match configured {
        ConfiguredCommand::Check(options) => check::Command::new(&config).run(&options),
        ConfiguredCommand::Serve => {
            let server = Arc::new(server::Command::new(&config));

            let _watcher = ConfigWatcher::new(config_path, server.clone())?;
            server.run().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> GlobalArguments {
        GlobalArguments::from_args(&["secured-url-gate"], args).unwrap()
    }

    #[test]
    fn test_subcommands_parse() {
        assert!(matches!(
            parse(&["digest", "R", "alice"]).subcommand,
            SubCommand::Digest(_)
        ));
        assert!(matches!(parse(&["argon"]).subcommand, SubCommand::Argon(_)));

        let args = parse(&["-c", "gate.toml", "check", "/shop/admin"]);
        assert_eq!(args.config, "gate.toml");
        assert!(matches!(args.subcommand, SubCommand::Check(_)));
        assert_eq!(parse(&["serve"]).config, "config.toml");
    }
}
