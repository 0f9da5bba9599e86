use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};

use a11y_harness::script::{PageSetupScript, ScriptStep};
use a11y_harness::wcag::{self, ContentCategory, Level, TestingScope};

/// a11y-harness - Session-aware accessibility testing orchestration
#[derive(Parser, Debug)]
#[command(
    name = "a11y-harness",
    about = "Session-aware web accessibility testing with multi-state capture",
    after_help = "ENVIRONMENT VARIABLES:\n\
        A11Y_HARNESS_STEP_TIMEOUT      Default script step timeout (ms)\n\
        A11Y_HARNESS_NAV_TIMEOUT       Navigation timeout (ms)\n\
        A11Y_HARNESS_LOGIN_TIMEOUT     Login attempt timeout (ms)\n\
        A11Y_HARNESS_RESTART_SETTLE    Delay after a browser restart (ms)\n\
        A11Y_HARNESS_DEFAULT_VIEWPORT  Default viewport preset"
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve applicable WCAG criteria for a testing scope
    Applicability {
        /// Scope declarations as key=bool pairs (e.g. "forms=true" "video=false")
        #[arg(value_name = "CATEGORY=BOOL")]
        scope: Vec<String>,

        /// Target conformance level: A, AA, or AAA
        #[arg(short, long, default_value = "AA")]
        level: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a page setup scripts file
    Scripts {
        /// Path to a JSON file holding an array of scripts
        file: PathBuf,

        /// Also check that ${ENV:NAME} placeholders resolve
        #[arg(long)]
        check_env: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(error) = run(args) {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Commands::Applicability { scope, level, json } => cmd_applicability(&scope, &level, json),
        Commands::Scripts { file, check_env } => cmd_scripts(&file, check_env),
    }
}

fn cmd_applicability(pairs: &[String], level: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let level: Level = level.parse()?;
    let mut scope = TestingScope::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected CATEGORY=BOOL, got \"{pair}\""))?;
        let category: ContentCategory = key.parse()?;
        let tested: bool = value
            .parse()
            .map_err(|_| format!("expected true/false, got \"{value}\""))?;
        scope = scope.set(category, tested);
    }

    let applicable = wcag::applicable_criteria(&scope, level);

    if json {
        println!("{}", serde_json::to_string_pretty(&applicable)?);
    } else {
        println!("Applicable criteria at level {} ({}):", level, applicable.len());
        for criterion in applicable {
            println!("  {:<7} [{:<3}] {}", criterion.number, criterion.level.to_string(), criterion.name);
        }
    }
    Ok(())
}

fn cmd_scripts(file: &Path, check_env: bool) -> Result<(), Box<dyn Error>> {
    let raw = std::fs::read_to_string(file)?;
    let scripts: Vec<PageSetupScript> = serde_json::from_str(&raw)?;

    println!("{} script(s) in {}", scripts.len(), file.display());
    let mut missing: Vec<String> = Vec::new();

    for script in &scripts {
        let states = if script.wants_multi_state() { "multi-state" } else { "single" };
        println!(
            "  {:<20} trigger={:<16} steps={:<3} {}{}",
            script.name,
            format!("{:?}", script.trigger),
            script.steps.len(),
            states,
            if script.enabled { "" } else { " (disabled)" },
        );

        if check_env {
            for step in &script.steps {
                if let ScriptStep::Type { value, .. } = step {
                    // Report the variable name only, never the value
                    if let Err(err) = a11y_harness::script::resolve_value(value) {
                        missing.push(err.0);
                    }
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(format!("unresolved environment variables: {}", missing.join(", ")).into());
    }
    Ok(())
}
