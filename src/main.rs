//! Broker Gateway - TLS-intercepting proxy for clustered brokers
//!
//! Configuration validation and certificate authority tooling.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use broker_gateway::{
    Result,
    brokermap::BrokerMap,
    ca::{AuthorityRegistry, KeyAlgorithm, PeerIdentity, signing},
    cli::{Cli, Command},
    config::ProxyConfig,
    setup_tracing,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Check { format } => run_check(cli.config.as_deref(), &format),
        Command::InitCa {
            cn,
            validity_days,
            key_algorithm,
            out_dir,
        } => run_init_ca(&cn, validity_days, key_algorithm, &out_dir),
        Command::Issue { peer } => run_issue(cli.config.as_deref(), &peer),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Validate configuration end-to-end and print the routing table.
fn run_check(config_path: Option<&Path>, format: &str) -> Result<()> {
    let config = ProxyConfig::load(config_path)?;
    let map = config.broker_map()?;
    let registry = AuthorityRegistry::with_builtin()?;
    config.resolve_authority(&registry)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(map.get_all())?);
    } else {
        print_routing_table(&map);
        println!("Authority: {} (OK)", config.authority.kind);
        println!("Configuration OK");
    }

    info!(
        brokers = map.len(),
        proxied = map.brokers_to_proxy().len(),
        authority = %config.authority.kind,
        "Configuration validated"
    );
    Ok(())
}

fn print_routing_table(map: &BrokerMap) {
    println!(
        "Broker map: {} route(s), {} proxied",
        map.len(),
        map.brokers_to_proxy().len()
    );
    for mapping in map.get_all() {
        let marker = if map.is_proxied(&mapping.name) {
            "[proxied]"
        } else {
            "[pass-through]"
        };
        println!(
            "  {:<16} {:<32} -> {:<32} {marker}",
            mapping.name,
            mapping.broker.to_string(),
            mapping.proxy.to_string()
        );
    }
}

/// Generate CA material into `out_dir`.
fn run_init_ca(
    cn: &str,
    validity_days: u32,
    key_algorithm: KeyAlgorithm,
    out_dir: &Path,
) -> Result<()> {
    let ca = signing::generate_authority(cn, validity_days, key_algorithm)?;
    ca.write_to_dir(out_dir, "ca")?;

    println!("CA material written:");
    println!("  {}", out_dir.join("ca.crt").display());
    println!("  {}", out_dir.join("ca.key").display());
    println!("Provision ca.crt into client trust stores; keep ca.key private.");
    Ok(())
}

/// Mint an impostor credential for a PEM peer certificate and print a
/// summary.
fn run_issue(config_path: Option<&Path>, peer_path: &Path) -> Result<()> {
    let config = ProxyConfig::load(config_path)?;
    let registry = AuthorityRegistry::with_builtin()?;
    let authority = config.resolve_authority(&registry)?;

    let peer_der = signing::load_certs(
        peer_path
            .to_str()
            .ok_or_else(|| broker_gateway::Error::Config("Non-UTF-8 peer path".into()))?,
    )?
    .into_iter()
    .next()
    .ok_or_else(|| {
        broker_gateway::Error::Config(format!("No certificate in {}", peer_path.display()))
    })?;

    let credential = authority.issue(&peer_der)?;
    let leaf = PeerIdentity::from_der(credential.leaf())?;

    println!("Issued impostor credential");
    println!("  subject:   {}", leaf.subject.distinguished_name);
    println!("  validity:  {} .. {}", leaf.not_before, leaf.not_after);
    println!("  chain:     {} certificate(s)", credential.chain().len());
    println!("  secret:    {} (one-time)", credential.access_secret());
    Ok(())
}
