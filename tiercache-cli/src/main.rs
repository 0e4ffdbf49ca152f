use anyhow::{Context, Result};
use chrono::DateTime;
use clap::Parser;
use colored::Colorize;
use regex::Regex;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiercache::{CacheConfig, DataCache, StaticIdentity, StorageBackend};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "tiercache-cli")]
#[command(about = "tiercache CLI - inspect and edit a file-backed cache", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Cache directory (overrides the config file)
    #[arg(short = 'd', long)]
    dir: Option<PathBuf>,

    /// Identity to act as; omit for the anonymous namespace
    #[arg(short = 'u', long)]
    identity: Option<String>,

    /// Command to execute (if not in interactive mode)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

struct Shell {
    cache: DataCache,
    identity: StaticIdentity,
}

impl Shell {
    async fn execute_command(&self, command: &str, args: &[String]) -> Result<String> {
        let start = Instant::now();

        let response = match command.to_uppercase().as_str() {
            "SET" => self.cmd_set(args).await?,
            "GET" => self.cmd_get(args).await?,
            "INSPECT" | "TTL" => self.cmd_inspect(args).await?,
            "KEY" => self.cmd_key(args).await?,
            "DEL" | "INVALIDATE" => self.cmd_invalidate(args).await?,
            "INVALIDATE-RE" => self.cmd_invalidate_regex(args).await?,
            "CLEAR" => self.cmd_clear().await?,
            "KEYS" => self.cmd_keys().await?,
            "EVICT" => self.cmd_evict().await?,
            "INFO" | "STATS" => self.cmd_stats()?,
            "LOGIN" => self.cmd_login(args).await?,
            "LOGOUT" => self.cmd_logout().await?,
            "WHOAMI" => self.cmd_whoami().await?,
            "HELP" => self.help_text()?,
            _ => return Err(anyhow::anyhow!("Unknown command: {}", command)),
        };

        let elapsed = start.elapsed();
        Ok(format!(
            "{}\n{}",
            response,
            format!("({:.2?})", elapsed).dimmed()
        ))
    }

    async fn cmd_set(&self, args: &[String]) -> Result<String> {
        if args.len() < 2 {
            return Err(anyhow::anyhow!("Usage: SET key value [ttl_ms]"));
        }

        // Accept JSON, fall back to a plain string
        let value: Value =
            serde_json::from_str(&args[1]).unwrap_or_else(|_| Value::String(args[1].clone()));

        match args.get(2) {
            Some(ttl) => {
                let ttl_ms: u64 = ttl.parse().context("ttl_ms must be an integer")?;
                self.cache
                    .set_with_ttl(&args[0], &value, Duration::from_millis(ttl_ms))
                    .await?
            }
            None => self.cache.set(&args[0], &value).await?,
        }
        Ok("OK".green().to_string())
    }

    async fn cmd_get(&self, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(anyhow::anyhow!("Usage: GET key"));
        }

        match self.cache.get::<Value>(&args[0]).await {
            Some(value) => Ok(serde_json::to_string_pretty(&value)?),
            None => Ok("(nil)".dimmed().to_string()),
        }
    }

    async fn cmd_inspect(&self, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(anyhow::anyhow!("Usage: INSPECT key"));
        }

        let Some(entry) = self.cache.get_entry(&args[0]).await else {
            return Ok("(nil)".dimmed().to_string());
        };
        let now = self.cache.now_millis();
        let written = DateTime::from_timestamp_millis(entry.timestamp as i64)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| entry.timestamp.to_string());
        let stale = self.cache.is_stale(&args[0], None).await;

        Ok(format!(
            "written:   {}\nttl:       {}ms\nremaining: {}ms\nstale:     {}",
            written,
            entry.ttl,
            entry.remaining_ttl(now),
            if stale { "yes".yellow() } else { "no".green() }
        ))
    }

    async fn cmd_key(&self, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(anyhow::anyhow!("Usage: KEY operation [params-json]"));
        }

        let params = match args.get(1) {
            Some(raw) => Some(
                serde_json::from_str::<Value>(&args[1..].join(" "))
                    .with_context(|| format!("Invalid params JSON: {}", raw))?,
            ),
            None => None,
        };
        let key = self.cache.generate_key(&args[0], params.as_ref()).await;
        Ok(format!("\"{}\"", key))
    }

    async fn cmd_invalidate(&self, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(anyhow::anyhow!("Usage: INVALIDATE key [key ...]"));
        }

        let mut removed = 0;
        for pattern in args {
            removed += self.cache.invalidate(pattern.as_str()).await;
        }
        Ok(format!("(integer) {}", removed))
    }

    async fn cmd_invalidate_regex(&self, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(anyhow::anyhow!("Usage: INVALIDATE-RE regex"));
        }

        let regex = Regex::new(&args[0]).context("Invalid regex")?;
        let removed = self.cache.invalidate(regex).await;
        Ok(format!("(integer) {}", removed))
    }

    async fn cmd_clear(&self) -> Result<String> {
        let removed = self.cache.clear().await;
        Ok(format!("(integer) {}", removed))
    }

    async fn cmd_keys(&self) -> Result<String> {
        let keys = self.cache.keys().await;
        if keys.is_empty() {
            return Ok("(empty list)".dimmed().to_string());
        }
        Ok(keys
            .iter()
            .enumerate()
            .map(|(i, k)| format!("{}) \"{}\"", i + 1, k))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn cmd_evict(&self) -> Result<String> {
        let evicted = self.cache.evict().await;
        Ok(format!("(integer) {}", evicted))
    }

    fn cmd_stats(&self) -> Result<String> {
        let stats = self.cache.stats();
        Ok(format!(
            "{}\nhit_rate: {:.2}%\ndurable: {}",
            serde_json::to_string_pretty(&stats)?,
            stats.hit_rate() * 100.0,
            self.cache.is_durable()
        ))
    }

    async fn cmd_login(&self, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(anyhow::anyhow!("Usage: LOGIN identity"));
        }

        self.identity.login(args[0].clone());
        let loaded = self.cache.rehydrate().await;
        Ok(format!("{} ({} entries loaded)", "OK".green(), loaded))
    }

    async fn cmd_logout(&self) -> Result<String> {
        self.identity.logout();
        let loaded = self.cache.rehydrate().await;
        Ok(format!("{} ({} entries loaded)", "OK".green(), loaded))
    }

    async fn cmd_whoami(&self) -> Result<String> {
        Ok(self.cache.namespace().await.to_string())
    }

    fn help_text(&self) -> Result<String> {
        Ok(format!(
            r#"{}

{}
  SET key value [ttl_ms]     Store a JSON (or string) value
  GET key                    Get the cached value of key
  INSPECT key                Show timestamp, TTL and staleness
  KEY op [params-json]       Show the key generated for an operation

{}
  INVALIDATE key [key ...]   Remove keys and their parameterised variants
  INVALIDATE-RE regex        Remove keys whose logical name matches
  CLEAR                      Remove every key of the current identity
  EVICT                      Run one eviction pass

{}
  LOGIN identity             Switch identity and rehydrate its entries
  LOGOUT                     Switch to the anonymous namespace
  WHOAMI                     Show the active namespace

{}
  KEYS                       List keys of the current identity
  STATS                      Show cache statistics
  HELP                       Show this help message
  QUIT                       Exit the CLI
"#,
            "tiercache CLI - Available Commands".bold().cyan(),
            "Entry Commands:".bold(),
            "Removal Commands:".bold(),
            "Identity Commands:".bold(),
            "Info Commands:".bold(),
        ))
    }
}

fn load_config(args: &Args) -> Result<CacheConfig> {
    let mut config = match &args.config {
        Some(path) => CacheConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let mut config = CacheConfig::default();
            config.logging.level = "warn".to_string();
            config
        }
    };

    if let Some(dir) = &args.dir {
        config.storage.directory = dir.clone();
    }
    // Short-lived process: the expiry sweep would never fire
    config.cleanup_interval_ms = 0;
    if config.storage.backend != StorageBackend::File {
        debug!(
            "storage backend {:?}: entries will not outlive this process",
            config.storage.backend
        );
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    tiercache::logging::init(&config.logging);

    let identity = StaticIdentity::new(args.identity.clone());
    let directory = config.storage.directory.clone();
    let cache = DataCache::builder(config)
        .with_identity_provider(Arc::new(identity.clone()))
        .open()
        .await?;
    let shell = Shell { cache, identity };

    let result = if !args.command.is_empty() {
        // Command mode: execute single command and exit
        let cmd = &args.command[0];
        let cmd_args: Vec<String> = args.command[1..].to_vec();
        shell.execute_command(cmd, &cmd_args).await.map(|output| {
            println!("{}", output);
        })
    } else {
        run_interactive(&shell, &directory).await
    };

    shell.cache.close().await;

    if let Err(e) = result {
        eprintln!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
    Ok(())
}

async fn run_interactive(shell: &Shell, directory: &std::path::Path) -> Result<()> {
    println!(
        "{}",
        format!("tiercache CLI v{}", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    println!("Cache directory {:?}", directory);
    println!("Type {} for available commands\n", "HELP".bold());

    let mut rl = DefaultEditor::new()?;

    loop {
        let prompt = format!(
            "{}> ",
            format!("tiercache {}", shell.cache.namespace().await).green()
        );
        let readline = rl.readline(&prompt);

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                rl.add_history_entry(&line)?;

                let parts: Vec<String> = line.split_whitespace().map(String::from).collect();
                let cmd = &parts[0];
                let args = &parts[1..];

                if cmd.to_uppercase() == "QUIT" || cmd.to_uppercase() == "EXIT" {
                    println!("Goodbye!");
                    break;
                }

                match shell.execute_command(cmd, args).await {
                    Ok(output) => println!("{}", output),
                    Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Readline error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiercache::ManualClock;

    fn parse(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("tiercache-cli").chain(argv.iter().copied()))
    }

    #[test]
    fn test_trailing_command_is_collected() {
        let args = parse(&["-d", "/tmp/c", "SET", "k", "{\"a\":1}", "500"]);
        assert_eq!(args.dir, Some(PathBuf::from("/tmp/c")));
        assert_eq!(args.command, vec!["SET", "k", "{\"a\":1}", "500"]);
    }

    #[test]
    fn test_dir_overrides_default_directory() {
        let args = parse(&["--dir", "/tmp/other", "KEYS"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.storage.directory, PathBuf::from("/tmp/other"));
        assert_eq!(config.cleanup_interval_ms, 0);
        assert_eq!(config.logging.level, "warn");
    }

    #[tokio::test]
    async fn test_commands_against_file_cache() {
        let dir = tempfile::tempdir().unwrap();
        let args = parse(&["--dir", dir.path().to_str().unwrap()]);
        let config = load_config(&args).unwrap();
        let identity = StaticIdentity::new(Some("7".to_string()));
        let cache = DataCache::builder(config)
            .with_identity_provider(Arc::new(identity.clone()))
            .open()
            .await
            .unwrap();
        let shell = Shell { cache, identity };
        let argv = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        shell
            .execute_command("set", &argv(&["greeting", "\"hi\""]))
            .await
            .unwrap();
        let out = shell.execute_command("GET", &argv(&["greeting"])).await.unwrap();
        assert!(out.contains("\"hi\""));

        let out = shell.execute_command("KEYS", &[]).await.unwrap();
        assert!(out.contains("1) \"greeting\""));

        let out = shell
            .execute_command("INVALIDATE", &argv(&["greeting"]))
            .await
            .unwrap();
        assert!(out.contains("(integer) 1"));

        assert!(shell.execute_command("BOGUS", &[]).await.is_err());
        assert!(shell.execute_command("SET", &argv(&["only-key"])).await.is_err());
        shell.cache.close().await;
    }

    #[tokio::test]
    async fn test_inspect_uses_cache_clock() {
        let dir = tempfile::tempdir().unwrap();
        let args = parse(&["--dir", dir.path().to_str().unwrap()]);
        let config = load_config(&args).unwrap();
        let clock = ManualClock::new(1_000_000);
        let identity = StaticIdentity::default();
        let cache = DataCache::builder(config)
            .with_identity_provider(Arc::new(identity.clone()))
            .with_clock(Arc::new(clock.clone()))
            .open()
            .await
            .unwrap();
        let shell = Shell { cache, identity };
        let argv = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        shell
            .execute_command("SET", &argv(&["k", "1", "1000"]))
            .await
            .unwrap();
        clock.advance(Duration::from_millis(400));

        let out = shell.execute_command("INSPECT", &argv(&["k"])).await.unwrap();
        assert!(out.contains("remaining: 600ms"));
        assert!(out.contains("written:   1970-01-01T00:16:40+00:00"));
        shell.cache.close().await;
    }
}
