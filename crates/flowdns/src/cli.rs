use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    version,
    name = "flowdns",
    about = "Relays each intercepted DNS query to a fixed upstream resolver"
)]
pub struct Args {
    /// Address the local flow host listens on
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1")]
    pub host: IpAddr,
    #[arg(short('p'), long, value_name = "PORT", default_value_t = 5353)]
    pub port: u16,
    #[arg(long, value_name = "ADDR", default_value = "8.8.8.8")]
    pub upstream_resolver: IpAddr,
    #[arg(long, value_name = "PORT", default_value_t = 53)]
    pub upstream_port: u16,
    /// Upstream establish and exchange timeout, 0 disables it
    #[arg(long, value_name = "MILLISECONDS", default_value_t = 5000)]
    pub upstream_timeout_ms: u64,
    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
