use clap::Parser;
use pipetkit::{
    init_logging, list_ports, serve, spawn_keepalive, ConnectionParams, ControllerConfig,
    Dispatcher, PipetteController, SerialCommunicator, ServiceConfig,
};
use std::sync::Arc;
use std::time::Duration;

/// Control server for one motorized pipetting instrument
#[derive(Parser, Debug)]
#[command(name = "pipetkit", version, about)]
struct Args {
    /// Serial port of the instrument
    #[arg(long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Address the facade listens on
    #[arg(long, default_value = "127.0.0.1:7070")]
    listen: String,

    /// Acknowledgment timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    response_timeout_ms: u64,

    /// Keep-alive ping interval in seconds (0 disables)
    #[arg(long, default_value_t = 5)]
    keepalive_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let args = Args::parse();
    tracing::info!(version = pipetkit::VERSION, "starting pipetkit");

    let config = ControllerConfig {
        response_timeout: Duration::from_millis(args.response_timeout_ms),
    };
    let mut controller = PipetteController::new(Box::new(SerialCommunicator::new()), config);

    let params = ConnectionParams {
        port: args.port.clone(),
        baud_rate: args.baud,
    };
    if let Err(e) = controller.connect(&params) {
        tracing::error!("failed to connect to instrument on {}: {}", args.port, e);
        if let Ok(ports) = list_ports() {
            for info in ports {
                tracing::info!("candidate port: {} ({})", info.port_name, info.description);
            }
        }
        anyhow::bail!("instrument connection failed");
    }

    let dispatcher = Arc::new(Dispatcher::new(controller));

    let _keepalive = if args.keepalive_secs > 0 {
        Some(spawn_keepalive(
            dispatcher.clone(),
            Duration::from_secs(args.keepalive_secs),
        ))
    } else {
        None
    };

    let service_config = ServiceConfig {
        listen_addr: args.listen,
    };
    serve(dispatcher, &service_config).await?;

    Ok(())
}
