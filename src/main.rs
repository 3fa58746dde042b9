use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use testloom::config::{self, Config};
use testloom::driver::{self, GenerationRequest, RepairRequest, DEFAULT_COUNT, DEFAULT_ROUNDS};
use testloom::language::TargetLanguage;
use testloom::validate::validate;

#[derive(Parser, Debug)]
#[command(
    name = "testloom",
    about = "Turn raw model output into clean, runnable unit-test files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a unit-test file for a source file
    Generate(GenerateArgs),
    /// Repair raw model output already on disk, without calling the service
    Repair(RepairArgs),
    /// Check an existing test file for structural problems
    Check(CheckArgs),
    /// Store the OpenRouter API key
    Setup(SetupArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LangArg {
    #[value(alias = "js")]
    Javascript,
    #[value(alias = "ts")]
    Typescript,
    #[value(alias = "py")]
    Python,
    Java,
}

impl From<LangArg> for TargetLanguage {
    fn from(value: LangArg) -> Self {
        match value {
            LangArg::Javascript => TargetLanguage::JavaScript,
            LangArg::Typescript => TargetLanguage::TypeScript,
            LangArg::Python => TargetLanguage::Python,
            LangArg::Java => TargetLanguage::Java,
        }
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Source file the tests should exercise
    file: PathBuf,

    /// Number of tests in the finished file
    #[arg(short, long)]
    count: Option<usize>,

    /// Generation rounds before variation padding kicks in
    #[arg(short, long)]
    rounds: Option<u32>,

    /// Override extension-based language detection
    #[arg(short, long, value_enum)]
    language: Option<LangArg>,

    /// Fixed seed for reproducible variation padding
    #[arg(long)]
    seed: Option<u64>,

    /// Write the test file here instead of next to the source
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Print the finished file instead of writing it
    #[arg(long)]
    dry_run: bool,

    /// Emit the full result as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RepairArgs {
    /// File holding the raw model output
    file: PathBuf,

    /// Language the raw output is written in
    #[arg(short, long, value_enum)]
    language: LangArg,

    /// Wrapper title for the rebuilt file (defaults from the input name)
    #[arg(short, long)]
    title: Option<String>,

    /// Pad or trim to this many tests; default keeps every unique test
    #[arg(short, long)]
    count: Option<usize>,

    /// Fixed seed for reproducible variation padding
    #[arg(long)]
    seed: Option<u64>,

    /// Write the repaired file here instead of printing it
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Emit the full result as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Test file to check
    file: PathBuf,

    /// Override extension-based language detection
    #[arg(short, long, value_enum)]
    language: Option<LangArg>,
}

#[derive(Args, Debug)]
struct SetupArgs {
    /// Provide the key directly instead of prompting
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => run_generate(args).await,
        Commands::Repair(args) => run_repair(args),
        Commands::Check(args) => run_check(args),
        Commands::Setup(args) => run_setup(args),
    }
}

async fn run_generate(args: GenerateArgs) -> Result<()> {
    let config = Config::load();
    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read source file '{}'", args.file.display()))?;
    let lang = resolve_language(args.language, &args.file)?;
    let stem = file_stem(&args.file);
    let count = args.count.or(config.default_count).unwrap_or(DEFAULT_COUNT);
    let rounds = args.rounds.or(config.max_rounds).unwrap_or(DEFAULT_ROUNDS);

    let request = GenerationRequest {
        language: lang,
        source_name: args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone()),
        source,
        title: lang.wrapper_title(&stem),
        count,
        rounds,
        seed: args.seed,
    };

    eprintln!(
        "🧪 Generating {} {} tests for {}...",
        count,
        lang.label(),
        request.source_name
    );
    let result = driver::generate(&request, &config).await?;
    report_warnings(&result.warnings);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    if args.dry_run {
        print!("{}", result.canonical_text);
        return Ok(());
    }

    let out_path = args
        .out
        .unwrap_or_else(|| default_output_path(&args.file, lang, &stem));
    fs::write(&out_path, &result.canonical_text)
        .with_context(|| format!("Failed to write test file '{}'", out_path.display()))?;

    eprintln!(
        "  ✨ {} tests ({} duplicates dropped, {} variations) in {} round(s)",
        result.metrics.unique_count,
        result.metrics.duplicates_removed,
        result.metrics.variations_generated,
        result.metrics.attempts
    );
    if let Some(usage) = &result.usage {
        eprintln!(
            "  💰 ${:.4} ({} tokens)",
            usage.cost(),
            usage.total_tokens
        );
    }
    println!("{}", out_path.display());
    Ok(())
}

fn run_repair(args: RepairArgs) -> Result<()> {
    let config = Config::load();
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read input file '{}'", args.file.display()))?;
    let lang: TargetLanguage = args.language.into();
    let stem = file_stem(&args.file);

    let request = RepairRequest {
        language: lang,
        raw,
        title: args.title.unwrap_or_else(|| lang.wrapper_title(&stem)),
        count: args.count,
        seed: args.seed,
    };
    let result = driver::repair(&request, &config)?;
    report_warnings(&result.warnings);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    match args.out {
        Some(out_path) => {
            fs::write(&out_path, &result.canonical_text)
                .with_context(|| format!("Failed to write test file '{}'", out_path.display()))?;
            eprintln!(
                "  ✨ {} tests kept ({} duplicates dropped)",
                result.metrics.unique_count, result.metrics.duplicates_removed
            );
            println!("{}", out_path.display());
        }
        None => print!("{}", result.canonical_text),
    }
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<()> {
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read test file '{}'", args.file.display()))?;
    let lang = resolve_language(args.language, &args.file)?;

    let violations = validate(&text, lang);
    if violations.is_empty() {
        println!("✓ {} looks structurally sound", args.file.display());
        return Ok(());
    }
    for violation in &violations {
        eprintln!("  ✗ {}", violation);
    }
    Err(anyhow!(
        "{} problem(s) found in '{}'",
        violations.len(),
        args.file.display()
    ))
}

fn run_setup(args: SetupArgs) -> Result<()> {
    match args.api_key {
        Some(key) => {
            let key = key.trim();
            if key.is_empty() {
                return Err(anyhow!("No API key provided"));
            }
            if !Config::validate_api_key_format(key) {
                eprintln!("  Warning: Key doesn't look like an OpenRouter key (should start with sk-)");
            }
            let mut config = Config::load();
            config.set_api_key(key).map_err(|e| anyhow!(e))?;
            println!("  + API key saved to {}", Config::config_location());
        }
        None => {
            config::setup_api_key_interactive().map_err(|e| anyhow!(e))?;
        }
    }
    Ok(())
}

fn resolve_language(flag: Option<LangArg>, path: &Path) -> Result<TargetLanguage> {
    if let Some(lang) = flag {
        return Ok(lang.into());
    }
    TargetLanguage::from_path(path).ok_or_else(|| {
        anyhow!(
            "Could not detect a target language from '{}'; pass --language",
            path.display()
        )
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "generated".to_string())
}

fn default_output_path(source: &Path, lang: TargetLanguage, stem: &str) -> PathBuf {
    let name = lang.test_file_name(stem);
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

fn report_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("  ⚠️  {}", warning);
    }
}
