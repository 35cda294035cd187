//! Command implementations.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::warn;

use offcache_core::utils::{format_bytes, truncate_string};
use offcache_core::worker::manifest::{DASHBOARD_ASSETS, DASHBOARD_CACHE_VERSION};
use offcache_core::{CacheStorage, Config, Interception, Network, Request};

use crate::args::{ConfigArgs, FetchArgs, InstallArgs};
use crate::host::Host;

/// Column width for cache keys in `status` output
const KEY_COLUMN_WIDTH: usize = 60;

// ===== Install =====

pub async fn install(host: &Host, args: &InstallArgs) -> Result<()> {
    let manifest = host.manager.manifest();
    let version = manifest.version().clone();
    eprintln!("Installing {} ({} assets)...", version, manifest.assets().len());

    host.manager
        .install()
        .await
        .with_context(|| format!("Install of {} failed", version))?;

    if args.no_activate {
        println!("Installed {} (not activated)", version);
        return Ok(());
    }

    let deleted = host.manager.activate().await?;
    for name in &deleted {
        println!("Deleted stale generation {}", name);
    }
    println!("Activated {}", version);
    Ok(())
}

// ===== Fetch =====

pub async fn fetch(host: &Host, args: &FetchArgs) -> Result<ExitCode> {
    let url = host.resolve(&args.target)?;

    if !host.manager.restore().await? {
        warn!(version = %host.manager.manifest().version(), "No installed cache generation");
        eprintln!("No cache installed; run `offcache install` to enable offline access");
    }

    let request = Request::get(url.clone());
    let interception = host.manager.intercept(&request).await;
    let source = interception.source();

    let response = match interception {
        Interception::Network(response) | Interception::Cache(response) => response,
        Interception::Bypass => match host.network.fetch(&request).await {
            Ok(response) => response,
            Err(e) => {
                eprintln!("Request to {} failed: {}", url, e);
                return Ok(ExitCode::FAILURE);
            }
        },
        Interception::Failed(e) => {
            eprintln!("Request to {} failed and is not cached: {}", url, e);
            return Ok(ExitCode::FAILURE);
        }
    };

    eprintln!("{} {} [{}, {}]", response.status, url, source, format_bytes(response.body.len()));

    match args.output {
        Some(ref path) => std::fs::write(path, &response.body)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&response.body)?;
            stdout.flush()?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

// ===== Status =====

pub async fn status(host: &Host) -> Result<()> {
    let current = host.manager.manifest().version().as_str();
    let names = host.storage.keys().await?;

    println!("Cache directory: {}", host.storage.root().display());
    if names.is_empty() {
        println!("No cache generations. Run `offcache install`.");
        return Ok(());
    }

    for name in names {
        let entries = host.storage.entries(&name).await?;
        let label = if name == current { "current" } else { "stale" };
        println!("{} [{}] {} entries", name, label, entries.len());

        for entry in entries {
            let response = &entry.cached.response;
            println!(
                "    {:<width$} {:>3} {:>9}  {}",
                truncate_string(&entry.key, KEY_COLUMN_WIDTH),
                response.status,
                format_bytes(response.body.len()),
                entry.cached.age_display(),
                width = KEY_COLUMN_WIDTH,
            );
        }
    }
    Ok(())
}

// ===== Config =====

pub fn config(path: &Path, config: &Config, args: &ConfigArgs) -> Result<()> {
    if args.init {
        if path.exists() && !args.force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
        Config::with_defaults()?.save_to(path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let found = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("Config file:     {}{}", path.display(), found);
    println!("Origin:          {}", config.origin()?);
    println!("Cache directory: {}", config.cache_dir()?.display());
    println!("Request timeout: {}s", config.request_timeout().as_secs());
    match config.log_file {
        Some(ref log_file) => println!("Log file:        {}", log_file.display()),
        None => println!("Log file:        (stderr only)"),
    }
    println!("Cache version:   {}", DASHBOARD_CACHE_VERSION);
    println!("Static assets:");
    for asset in DASHBOARD_ASSETS {
        println!("  {}", asset);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread::JoinHandle;
    use tempfile::TempDir;

    fn asset_body(path: &str) -> String {
        format!("body of {}", path)
    }

    /// Serve `count` dashboard requests, one per connection, then close the port.
    fn serve_dashboard(count: usize) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let origin = format!("http://{}/", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            for _ in 0..count {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                // "GET /static/css/style.css HTTP/1.1"
                let head = String::from_utf8_lossy(&buf);
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let body = asset_body(&path);
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        (origin, handle)
    }

    #[test]
    fn test_config_init_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let init = ConfigArgs { init: true, force: false };

        config(&path, &Config::default(), &init).unwrap();
        let written = Config::load_from(&path).unwrap();
        assert_eq!(written.origin.as_deref(), Some(offcache_core::config::DEFAULT_ORIGIN));
        assert_eq!(written.request_timeout_secs, Some(30));

        // Second init without --force refuses to clobber
        assert!(config(&path, &Config::default(), &init).is_err());
        let force = ConfigArgs { init: true, force: true };
        assert!(config(&path, &Config::default(), &force).is_ok());
    }

    #[tokio::test]
    async fn test_status_with_empty_cache() {
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            cache_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let host = Host::start(&cfg).unwrap();
        status(&host).await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_fails_cleanly_when_origin_down() {
        // Nothing listens on this port once the listener is dropped
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            origin: Some(format!("http://127.0.0.1:{}/", port)),
            cache_dir: Some(dir.path().join("cache")),
            request_timeout_secs: Some(5),
            log_file: None,
        };
        let host = Host::start(&cfg).unwrap();
        let args = FetchArgs {
            target: "/static/css/style.css".to_string(),
            output: Some(dir.path().join("out.css")),
        };

        let code = fetch(&host, &args).await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);
        assert!(!dir.path().join("out.css").exists());
    }

    #[tokio::test]
    async fn test_install_then_fetch_offline_from_cache() {
        let (origin, server) = serve_dashboard(DASHBOARD_ASSETS.len());
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            origin: Some(origin),
            cache_dir: Some(dir.path().join("cache")),
            request_timeout_secs: Some(5),
            log_file: None,
        };

        let host = Host::start(&cfg).unwrap();
        host.storage.open("old-v0").await.unwrap();
        install(&host, &InstallArgs { no_activate: false }).await.unwrap();
        assert_eq!(host.storage.keys().await.unwrap(), vec![DASHBOARD_CACHE_VERSION]);
        assert_eq!(
            host.storage.entries(DASHBOARD_CACHE_VERSION).await.unwrap().len(),
            DASHBOARD_ASSETS.len()
        );
        status(&host).await.unwrap();

        // The origin is gone once it has served the install
        server.join().unwrap();

        // A new process picks the installed generation up from disk
        let host = Host::start(&cfg).unwrap();
        let out = dir.path().join("style.css");
        let args = FetchArgs {
            target: "/static/css/style.css".to_string(),
            output: Some(out.clone()),
        };
        let code = fetch(&host, &args).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            asset_body("/static/css/style.css")
        );
        assert_eq!(host.storage.keys().await.unwrap(), vec![DASHBOARD_CACHE_VERSION]);
    }
}
