//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::ca::KeyAlgorithm;

/// TLS-intercepting proxy for clustered brokers - configuration and CA tooling
#[derive(Parser, Debug)]
#[command(name = "broker-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "BROKER_GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "BROKER_GATEWAY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "BROKER_GATEWAY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate configuration: build the broker map and construct the
    /// authority, then print the routing table
    Check {
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Generate CA material for impostor signing
    InitCa {
        /// Common Name for the CA certificate
        #[arg(long, default_value = "Broker Gateway Proxy CA")]
        cn: String,

        /// Validity period in days
        #[arg(long, default_value_t = 365)]
        validity_days: u32,

        /// CA key algorithm (ecdsa-p256, ecdsa-p384, ed25519)
        #[arg(long, default_value = "ecdsa-p256")]
        key_algorithm: KeyAlgorithm,

        /// Directory to write ca.crt / ca.key into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Mint an impostor credential for a PEM peer certificate and print a
    /// summary (operator diagnostics)
    Issue {
        /// Path to the peer certificate (PEM)
        #[arg(required = true)]
        peer: PathBuf,
    },
}
