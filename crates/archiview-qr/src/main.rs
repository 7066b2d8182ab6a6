//! archiview-qr - Print a QR code that opens ArchiView on a phone
//!
//! Given a URL it prints that; otherwise it builds one from the best LAN
//! address of this machine so a phone on the same network can open a locally
//! served copy of the viewer.

use anyhow::{bail, Context, Result};
use archiview_qr::encode;
use clap::Parser;
use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "archiview-qr")]
#[command(about = "Display a QR code for opening ArchiView on a mobile device")]
#[command(version)]
struct Args {
    /// Full URL to encode (overrides --port/--path/--https)
    url: Option<String>,

    /// Port the viewer is served on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Path of the viewer page
    #[arg(long, default_value = "/")]
    path: String,

    /// Use HTTPS instead of HTTP
    #[arg(long)]
    https: bool,

    /// Open this catalog model directly (adds ?model=<id>)
    #[arg(short, long)]
    model: Option<String>,

    /// Also write the QR code as an SVG file
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Show URL only (no QR code)
    #[arg(long)]
    url_only: bool,

    /// Check that the page answers before printing
    #[arg(long)]
    check: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ips = get_local_ips();
    let share_url = match &args.url {
        Some(url) => Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?,
        None => {
            let Some(ip) = best_ip(&ips) else {
                bail!("No network interfaces found");
            };
            lan_url(ip, args.port, &args.path, args.https)?
        }
    };
    let share_url = with_model(share_url, args.model.as_deref());
    info!(url = %share_url, "Share link");

    if args.check {
        print!("Checking {}... ", share_url);
        match check_page(share_url.as_str()).await {
            Ok(true) => println!("OK"),
            Ok(false) => {
                println!("NOT RESPONDING");
                bail!("Nothing is serving {}", share_url);
            }
            Err(e) => {
                println!("ERROR");
                return Err(e.context("Reachability check failed"));
            }
        }
    }

    println!();
    println!("=== ArchiView AR ===");
    println!();
    println!("Open on your phone: {}", share_url);
    println!();

    if args.url_only {
        return Ok(());
    }

    let code = encode(share_url.as_str())?;
    print!("{}", code.render_terminal());
    println!();
    println!(
        "Scan this QR code with your iOS or Android device \
         to view the model in your physical space."
    );

    if let Some(path) = &args.svg {
        std::fs::write(path, code.to_svg(8))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("SVG written to {}", path.display());
    }

    if args.url.is_none() && ips.len() > 1 {
        println!();
        println!("Other available addresses:");
        let protocol = if args.https { "https" } else { "http" };
        for ip in &ips {
            if Some(*ip) != best_ip(&ips) {
                println!("  {}://{}:{}", protocol, ip, args.port);
            }
        }
    }

    Ok(())
}

/// All non-loopback IPv4 addresses of this machine
fn get_local_ips() -> Vec<Ipv4Addr> {
    let mut ips = Vec::new();

    match NetworkInterface::show() {
        Ok(interfaces) => {
            for iface in interfaces {
                for addr in iface.addr {
                    if let network_interface::Addr::V4(v4) = addr {
                        if !v4.ip.is_loopback() {
                            ips.push(v4.ip);
                        }
                    }
                }
            }
        }
        Err(e) => warn!(error = %e, "Failed to list network interfaces"),
    }

    debug!(count = ips.len(), "Local addresses");
    ips
}

/// Prefer the private ranges a phone on the same network can reach
fn best_ip(ips: &[Ipv4Addr]) -> Option<Ipv4Addr> {
    ips.iter()
        .find(|ip| ip.octets()[0] == 192 && ip.octets()[1] == 168)
        .or_else(|| ips.iter().find(|ip| ip.octets()[0] == 10))
        .or_else(|| {
            ips.iter().find(|ip| {
                let octets = ip.octets();
                octets[0] == 172 && (16..=31).contains(&octets[1])
            })
        })
        .or_else(|| ips.iter().find(|ip| !ip.is_link_local()))
        .or_else(|| ips.first())
        .copied()
}

fn lan_url(ip: Ipv4Addr, port: u16, path: &str, https: bool) -> Result<Url> {
    let protocol = if https { "https" } else { "http" };
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    let url = format!("{}://{}:{}{}", protocol, ip, port, path);
    Url::parse(&url).with_context(|| format!("Invalid URL: {}", url))
}

fn with_model(mut url: Url, model: Option<&str>) -> Url {
    if let Some(model) = model {
        url.query_pairs_mut().append_pair("model", model);
    }
    url
}

/// Whether the page answers with a success status
async fn check_page(url: &str) -> Result<bool> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3))
        .danger_accept_invalid_certs(true)
        .build()?;

    match client.get(url).send().await {
        Ok(resp) => Ok(resp.status().is_success()),
        Err(e) if e.is_timeout() || e.is_connect() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_ip_preference() {
        let ips: Vec<Ipv4Addr> = ["172.20.0.5", "10.0.0.7", "192.168.1.20"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(best_ip(&ips), Some(Ipv4Addr::new(192, 168, 1, 20)));
        assert_eq!(best_ip(&ips[..2]), Some(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(best_ip(&ips[..1]), Some(Ipv4Addr::new(172, 20, 0, 5)));
        assert_eq!(best_ip(&[]), None);
    }

    #[test]
    fn test_lan_url() {
        let url = lan_url(Ipv4Addr::new(192, 168, 1, 20), 8080, "viewer/", false).unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.20:8080/viewer/");

        let url = with_model(url, Some("bldg-002"));
        assert_eq!(url.as_str(), "http://192.168.1.20:8080/viewer/?model=bldg-002");
        assert_eq!(with_model(url.clone(), None), url);
    }
}
