use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use netdial::{
    DialConfig, DialerConfig, InterfaceBinder, InterruptDialer, InterruptStrategy, PendingDials,
    PendingRegistry, TcpConnector,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, PartialEq)]
struct ProbeArgs {
    addr: String,
    timeout: Option<Duration>,
    interrupt_after: Option<Duration>,
    strategy: Option<InterruptStrategy>,
    interface: Option<String>,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let probe = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!(
                "Usage: dial-probe <host:port> [--timeout <secs>] [--interrupt-after <ms>] \
                 [--strategy abandon|abort] [--interface <name>]"
            );
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --timeout <secs>         Connect timeout [default: $NETDIAL_CONNECT_TIMEOUT or 20]");
            eprintln!("  --interrupt-after <ms>   Close the pending registry after this delay");
            eprintln!("  --strategy <strategy>    What happens to an interrupted worker [default: abandon]");
            eprintln!("  --interface <name>       Bind the socket to this network interface");
            process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(probe).await {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the JSON report.
///
/// `RUST_LOG` wins; otherwise `NETDIAL_LOG` picks one level for both crates.
/// `LOG_FORMAT=json` switches to structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match std::env::var("NETDIAL_LOG").as_deref() {
            Ok("warning") => "warn".to_string(),
            Ok(level @ ("trace" | "debug" | "warn" | "error")) => level.to_string(),
            _ => "info".to_string(),
        };
        EnvFilter::new(format!("netdial={level},dial_probe={level}"))
    });

    let (json, text) = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        (Some(fmt::layer().with_writer(std::io::stderr).json()), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init();
}

fn parse_args(args: &[String]) -> Result<ProbeArgs, String> {
    let mut probe = ProbeArgs::default();
    let mut addr: Option<String> = None;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--timeout" => {
                i += 1;
                let value = args.get(i).ok_or("--timeout requires a value")?;
                let timeout = value
                    .parse::<f64>()
                    .ok()
                    .filter(|s| *s > 0.0)
                    .and_then(|s| Duration::try_from_secs_f64(s).ok())
                    .ok_or_else(|| format!("invalid timeout '{value}'"))?;
                probe.timeout = Some(timeout);
            }
            "--interrupt-after" => {
                i += 1;
                let value = args.get(i).ok_or("--interrupt-after requires a value")?;
                let ms = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid delay '{value}'"))?;
                probe.interrupt_after = Some(Duration::from_millis(ms));
            }
            "--strategy" => {
                i += 1;
                let value = args.get(i).ok_or("--strategy requires a value")?;
                probe.strategy = Some(value.parse().map_err(|e| format!("{e}"))?);
            }
            "--interface" => {
                i += 1;
                probe.interface = Some(args.get(i).ok_or("--interface requires a value")?.clone());
            }
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => {
                if addr.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                addr = Some(arg.to_string());
            }
        }
        i += 1;
    }

    probe.addr = addr.ok_or("missing required argument: <host:port>")?;
    Ok(probe)
}

async fn run(probe: ProbeArgs) -> anyhow::Result<()> {
    let registry = Arc::new(PendingDials::new());
    let dialer_config = probe
        .strategy
        .map(DialerConfig::with_strategy)
        .unwrap_or_default();
    let dialer = InterruptDialer::new(
        Arc::clone(&registry) as Arc<dyn PendingRegistry>,
        Arc::new(TcpConnector::new()),
        dialer_config,
    );

    let mut config = DialConfig::default();
    if let Some(timeout) = probe.timeout {
        config = config.with_timeout(timeout);
    }
    if let Some(interface) = probe.interface.clone() {
        config = config.with_device_binder(Arc::new(InterfaceBinder::new(interface)));
    }

    info!(
        addr = %probe.addr,
        strategy = %dialer.strategy(),
        timeout = ?config.connect_timeout,
        "netdial {}",
        netdial::NETDIAL_VERSION
    );

    // Simulates a shutdown sweep landing while the dial is in flight.
    let sweeper = probe.interrupt_after.map(|delay| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let interrupted = registry.close();
            info!(interrupted, "Closed pending dials");
        })
    });

    let started = Instant::now();
    let result = dialer.dial(&probe.addr, &config).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    let report = match &result {
        Ok(conn) => serde_json::json!({
            "addr": probe.addr,
            "outcome": "connected",
            "peer": conn.peer_addr().ok().map(|a| a.to_string()),
            "state": conn.handle().state(),
            "elapsed_ms": elapsed_ms,
        }),
        Err(e) => serde_json::json!({
            "addr": probe.addr,
            "outcome": if e.is_interrupted() { "interrupted" } else { "failed" },
            "error": e.to_string(),
            "retryable": e.is_retryable(),
            "elapsed_ms": elapsed_ms,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    match result {
        Ok(conn) => {
            registry.remove(conn.handle());
            Ok(())
        }
        Err(e) if e.is_interrupted() && probe.interrupt_after.is_some() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to dial {}", probe.addr)),
    }
}
