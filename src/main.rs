use anyhow::Context;
use clap::Parser;
use dcim::config::{resolve_config, AuditCommand, Cli, Command};
use dcim::core::audit::{DhcpAudit, LabelAudit};
use dcim::core::dhcp::{self, Declaration, DhcpConfig, DhcpHost};
use dcim::core::label::{expand_brackets, normalize};
use dcim::domain::model::{AuditReport, AuditResult};
use dcim::utils::{logger, validation::Validate};
use dcim::{DcimClient, DcimError, ResponseCache};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);
    tracing::debug!("CLI arguments: {:?}", cli);

    // 驗證參數
    if let Err(e) = cli.validate() {
        tracing::error!("❌ Invalid arguments: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    match run(&cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::debug!("❌ Command failed: {:?}", e);
            eprintln!("❌ {}", error_message(&e));
            std::process::exit(exit_code(&e));
        }
    }
}

/// 非 DcimError 的錯誤（讀檔、JSON 輸出）歸為其他錯誤
fn exit_code(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<DcimError>()
        .map(DcimError::exit_code)
        .unwrap_or(4)
}

fn error_message(e: &anyhow::Error) -> String {
    match e.downcast_ref::<DcimError>() {
        Some(err) => err.user_friendly_message(),
        None => format!("{:#}", e),
    }
}

async fn run(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Command::Normalize { labels, json } => run_normalize(labels, *json),
        Command::Dhcp { file, json } => run_dhcp(file, *json),
        Command::Locate { device, parents } => {
            let client = connect(cli)?;
            run_locate(&client, device, *parents).await
        }
        Command::Model { device } => {
            let client = connect(cli)?;
            let info = client.model(device).await?;
            println!(
                "{}: {} {}, serial {}",
                device,
                info.make.as_deref().unwrap_or("unknown make"),
                info.model.as_deref().unwrap_or("unknown model"),
                if info.serial.is_empty() { "unknown" } else { info.serial.as_str() }
            );
            Ok(0)
        }
        Command::Showrack { cabinet, width } => {
            let client = connect(cli)?;
            for line in client.showrack(cabinet, *width).await? {
                println!("{}", line);
            }
            Ok(0)
        }
        Command::Audit { audit } => {
            let client = connect(cli)?;
            match audit {
                AuditCommand::Labels { repair, json } => {
                    let report = LabelAudit::new(&client).perform(*repair).await?;
                    print_report(&report, *json)
                }
                AuditCommand::Dhcp { file, json } => {
                    let config = load_dhcp(file)?;
                    let report = DhcpAudit::new(&client).perform(&config).await?;
                    print_report(&report, *json)
                }
            }
        }
    }
}

fn connect(cli: &Cli) -> Result<DcimClient, DcimError> {
    let config = resolve_config(cli.config.as_deref())?;

    let cache = if config.cache_enabled() && !cli.no_cache {
        Some(Arc::new(ResponseCache::new(config.cache_ttl())))
    } else {
        None
    };

    tracing::info!("🔗 Using OpenDCIM server {}", config.baseurl());
    DcimClient::new(&config, cache)
}

async fn run_locate(client: &DcimClient, pattern: &str, parents: bool) -> anyhow::Result<i32> {
    let mut missing = 0;

    for label in expand_brackets(pattern) {
        match client.locate(&label).await {
            Ok(location) => {
                println!(
                    "{}: {}, cabinet {}, position {}",
                    label, location.datacenter, location.cabinet, location.position
                );
                if parents && !location.parent_devices.is_empty() {
                    println!("{}: parent devices: {}", label, location.parent_devices.join(", "));
                }
            }
            Err(DcimError::NotFound { .. }) => {
                println!("Device label {} was not found.", label);
                missing += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(if missing > 0 { 1 } else { 0 })
}

fn run_normalize(labels: &[String], json: bool) -> anyhow::Result<i32> {
    let mut normalized = Vec::new();
    let mut failed = 0;

    for raw in labels {
        match normalize(raw) {
            Ok(label) => normalized.push(label),
            Err(e) => {
                eprintln!("❌ \"{}\": {}", raw, e);
                failed += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&normalized)?);
    } else {
        for label in &normalized {
            match &label.extracted_serial {
                Some(serial) => println!("{}\t{}\tserial {}", label.raw, label.canonical, serial),
                None => println!("{}\t{}", label.raw, label.canonical),
            }
        }
    }

    Ok(if failed > 0 { 3 } else { 0 })
}

fn load_dhcp(path: &Path) -> anyhow::Result<DhcpConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read DHCP config {}", path.display()))?;
    let config = dhcp::parse(&text).map_err(DcimError::from)?;

    for warning in config.all_warnings() {
        tracing::warn!("⚠️ {}:{}: {}", path.display(), warning.line, warning.message);
    }
    Ok(config)
}

fn run_dhcp(path: &Path, json: bool) -> anyhow::Result<i32> {
    let config = load_dhcp(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(0);
    }

    println!(
        "{} global options, {} declarations, {} hosts",
        config.options.len(),
        config.len(),
        config.hosts().len()
    );
    for declaration in &config.declarations {
        print_declaration(declaration, 0);
    }
    Ok(0)
}

fn print_declaration(declaration: &Declaration, depth: usize) {
    let indent = "  ".repeat(depth);
    match declaration {
        Declaration::Host(host) => print_host(host, depth),
        Declaration::Subnet(subnet) => {
            println!(
                "{}subnet {} ({} options, {} hosts)",
                indent,
                subnet.network,
                subnet.options.len(),
                subnet.hosts.len()
            );
            for host in &subnet.hosts {
                print_host(host, depth + 1);
            }
            for nested in &subnet.declarations {
                print_declaration(nested, depth + 1);
            }
        }
        Declaration::Block(block) => {
            match &block.name {
                Some(name) => println!("{}{} {}", indent, block.kind, name),
                None => println!("{}{}", indent, block.kind),
            }
            for nested in &block.declarations {
                print_declaration(nested, depth + 1);
            }
        }
    }
}

fn print_host(host: &DhcpHost, depth: usize) {
    println!(
        "{}host {}  {}  {}",
        "  ".repeat(depth),
        host.hostname,
        host.mac_address.as_deref().unwrap_or("-"),
        host.fixed_address.as_deref().unwrap_or("-")
    );
}

fn print_report(report: &AuditReport, json: bool) -> anyhow::Result<i32> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        for repair in &report.repairs {
            println!("🔧 {}", repair);
        }
        for error in &report.errors {
            println!("❌ {}", error);
        }
        for warning in &report.warnings {
            println!("⚠️ {}", warning);
        }
        println!("Result: {:?}", report.result);
    }

    Ok(match report.result {
        AuditResult::Error => 1,
        AuditResult::Ok | AuditResult::Repaired => 0,
    })
}
