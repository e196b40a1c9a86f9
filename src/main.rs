use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use csv_router::streaming::{
    route_file, route_stdin, RouteResult, RouterConfig, DEFAULT_KEY_FIELD,
    DEFAULT_MAX_OPEN_FILES, DEFAULT_SUFFIX,
};
use csv_router::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SummaryFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "csv-router",
    about = "Split a delimited file into one file per value of a key field",
    version
)]
struct Cli {
    /// Input file; reads standard input when omitted or `-`
    input: Option<PathBuf>,

    /// Field delimiter used to split records
    #[arg(short, long, default_value_t = ',')]
    delimiter: char,

    /// 1-indexed field whose value names the output file
    #[arg(short, long, default_value_t = DEFAULT_KEY_FIELD)]
    key_field: usize,

    /// Suffix appended to the key to form the output file name
    #[arg(long, default_value = DEFAULT_SUFFIX)]
    suffix: String,

    /// Directory where output files are created
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Maximum number of output files held open at once
    #[arg(long, default_value_t = DEFAULT_MAX_OPEN_FILES)]
    max_open_files: usize,

    /// Print a run summary to stdout
    #[arg(long, value_enum)]
    summary: Option<SummaryFormat>,
}

impl Cli {
    fn router_config(&self) -> RouterConfig {
        RouterConfig::default()
            .delimiter(self.delimiter)
            .key_field(self.key_field)
            .suffix(self.suffix.clone())
            .output_dir(self.output_dir.clone())
            .max_open_files(self.max_open_files)
    }

    fn input_path(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|p| p.as_os_str() != "-")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Routing failed");
            let presentation = err.to_presentation();
            eprintln!("{}: {}", presentation.title, presentation.message);
            if let Some(action) = presentation.action {
                eprintln!("  {}", action);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    let config = cli.router_config();

    let result = match cli.input_path() {
        Some(path) => route_file(path, config).await?,
        None => route_stdin(config).await?,
    };

    match cli.summary {
        Some(SummaryFormat::Json) => {
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| AppError::Internal(format!("Failed to encode summary: {}", e)))?;
            println!("{}", json);
        }
        Some(SummaryFormat::Text) => print_text_summary(&result),
        None => {}
    }

    Ok(())
}

fn print_text_summary(result: &RouteResult) {
    println!(
        "{} records routed to {} files",
        result.total_records,
        result.destinations.len()
    );
    for dest in &result.destinations {
        println!("{:>10}  {}", dest.records, dest.path.display());
    }
}
