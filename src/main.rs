use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use arbiter::analysis::client::OpenRouterClient;
use arbiter::analysis::orchestrator::{analyze_offline, Orchestrator};
use arbiter::analysis::AnalysisResult;
use arbiter::config::Config;
use arbiter::incident::{AnalysisDepth, IncidentReport, Severity, ThreatIntelReport};

#[derive(Parser, Debug)]
#[command(
    name = "arbiter",
    about = "AI-assisted security incident triage with a deterministic fallback",
    version
)]
struct Args {
    /// Incident report file ("-" reads from stdin)
    report: Option<PathBuf>,

    /// Store a reasoning-service API key in the config file and exit
    #[arg(long, value_name = "KEY")]
    set_key: Option<String>,

    /// Incident title (defaults to the file name)
    #[arg(short, long)]
    title: Option<String>,

    /// Declared system context, e.g. "production web tier"
    #[arg(short, long)]
    context: Option<String>,

    /// Declared severity (low, medium, high, critical)
    #[arg(short, long)]
    severity: Option<String>,

    /// Analysis depth (quick, standard, deep)
    #[arg(short, long)]
    depth: Option<String>,

    /// Path to a threat-intelligence report (JSON)
    #[arg(long)]
    intel: Option<PathBuf>,

    /// Skip the reasoning service and use only the local rule engine
    #[arg(long)]
    offline: bool,

    /// Print the full result as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Some(key) = args.set_key {
        let mut config = Config::load();
        config.openrouter_api_key = Some(key);
        config.save()?;
        println!("  API key saved to {}", Config::config_location());
        return Ok(());
    }

    let report = args
        .report
        .context("no incident report file given (or use --set-key)")?;

    let log_text = if report.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read report from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(&report)
            .with_context(|| format!("failed to read {}", report.display()))?
    };

    let title = args.title.unwrap_or_else(|| {
        report
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "incident".to_string())
    });

    let mut incident = IncidentReport::new(title, log_text);
    if let Some(context) = args.context {
        incident = incident.with_context(context);
    }
    if let Some(severity) = args.severity.as_deref() {
        incident = incident.with_severity(parse_severity(severity)?);
    }

    let intel: Option<ThreatIntelReport> = match &args.intel {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Some(serde_json::from_str(&content).context("failed to parse threat-intel report")?)
        }
        None => None,
    };

    let config = Config::load();
    let mut settings = config.analysis_settings();
    if let Some(depth) = args.depth.as_deref() {
        settings.analysis_depth = parse_depth(depth)?;
    }

    let result = if args.offline {
        eprintln!("  Running offline: local rule engine only");
        analyze_offline(&incident, &settings, intel.as_ref())?
    } else if let Some(api_key) = config.api_key() {
        eprintln!("  Analyzing incident across {} dimensions...", match settings.analysis_depth {
            AnalysisDepth::Deep => 12,
            _ => 8,
        });
        let orchestrator = Orchestrator::new(Arc::new(OpenRouterClient::new(api_key)));
        orchestrator.run(&incident, &settings, intel.as_ref()).await?
    } else {
        eprintln!("  No API key configured ({}); falling back to the local rule engine", Config::config_location());
        analyze_offline(&incident, &settings, intel.as_ref())?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.to_persisted())?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn parse_severity(raw: &str) -> Result<Severity> {
    match raw.to_lowercase().as_str() {
        "low" => Ok(Severity::Low),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        "critical" => Ok(Severity::Critical),
        other => anyhow::bail!("unknown severity '{}'", other),
    }
}

fn parse_depth(raw: &str) -> Result<AnalysisDepth> {
    match raw.to_lowercase().as_str() {
        "quick" => Ok(AnalysisDepth::Quick),
        "standard" => Ok(AnalysisDepth::Standard),
        "deep" => Ok(AnalysisDepth::Deep),
        other => anyhow::bail!("unknown analysis depth '{}'", other),
    }
}

fn print_summary(result: &AnalysisResult) {
    println!();
    println!(
        "  VERDICT: {}  (confidence {}%)",
        result.final_classification.as_str().to_uppercase(),
        result.overall_confidence
    );
    println!("  {}", result.reasoning);
    println!();

    for (name, record) in &result.per_task {
        println!("  [{}] confidence {}%", name, record.confidence);
        for finding in record.display_findings() {
            println!("    - {}", finding);
        }
        for recommendation in &record.recommendations {
            println!("    > {}", recommendation);
        }
    }

    if let Some(synthesis) = &result.synthesis {
        println!();
        println!("  SYNTHESIS:");
        for line in synthesis.synthesis.lines().take(12) {
            println!("  {}", line);
        }
    }
}
