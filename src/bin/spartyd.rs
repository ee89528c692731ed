//! Relay daemon: serves the intake API and delivers accepted tracks one at a time.
//!
//! Configuration comes from the environment (see `sparty::config`); a `.env` file in the
//! working directory is loaded first when present. Logs go to stderr and honor `RUST_LOG`.

// std
use std::sync::Arc;
// crates.io
use color_eyre::{Result, eyre::WrapErr};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;
// self
use sparty::{
	CancellationToken,
	config::Config,
	queue::WorkSink,
	server::{self, IntakeState},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	dotenvy::dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let config = Config::from_env().wrap_err("Failed to load configuration.")?;
	let gateway = Arc::new(config.build_gateway().wrap_err("Failed to build API gateway.")?);
	let queue = Arc::new(config.build_queue());
	let consumer_cancel = CancellationToken::new();
	let mut consumer = tokio::spawn({
		let queue = queue.clone();
		let cancel = consumer_cancel.clone();

		async move {
			queue
				.run(&cancel, |item| {
					let gateway = gateway.clone();

					async move { gateway.relay(item).await }
				})
				.await
		}
	});
	let sink: Arc<dyn WorkSink> = queue.clone();
	let router = server::make_router(IntakeState::new(sink, config.auth_token.clone()));
	let listener = TcpListener::bind(config.listen_addr)
		.await
		.wrap_err_with(|| format!("Failed to bind {}.", config.listen_addr))?;

	tracing::info!(addr = %config.listen_addr, "Starting intake server.");

	// Stops on a signal or when the consumer dies early.
	let stop = CancellationToken::new();
	let mut served = tokio::spawn(server::serve(listener, router, {
		let stop = stop.clone();

		async move { stop.cancelled().await }
	}));
	let (served_result, consumer_result) = tokio::select! {
		result = &mut served => (Some(result), None),
		_ = shutdown_signal() => (None, None),
		stopped = &mut consumer => (None, Some(stopped)),
	};

	stop.cancel();

	let served_result = match served_result {
		Some(result) => result,
		None => served.await,
	};

	let consumer_result = match consumer_result {
		Some(result) => {
			queue.close();

			result
		},
		None => queue.shutdown(&consumer_cancel, consumer, config.drain_timeout).await,
	};

	served_result.wrap_err("Intake server task panicked.")?.wrap_err("Intake server failed.")?;

	let stopped = consumer_result.wrap_err("Consumer task panicked.")?;

	tracing::info!(reason = %stopped, "Exiting.");

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
			std::future::pending::<()>().await;
		}
	};
	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to listen for SIGTERM.");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => tracing::info!("Received Ctrl-C."),
		_ = terminate => tracing::info!("Received SIGTERM."),
	}
}
