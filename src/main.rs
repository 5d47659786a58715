use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;

use csv_pg_loader::config::{LoaderConfig, parse_delimiter};
use csv_pg_loader::error::PipelineError;
use csv_pg_loader::pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "csv-pg-loader",
    about = "Split a delimited file into batches and COPY them into a PostgreSQL table",
    long_about = "Split a delimited file into batches and COPY them into a PostgreSQL table.\n\
                  Unset flags fall back to CSVLOAD_* and PG* environment variables."
)]
struct Args {
    /// Delimited input file with a header line.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory for batch files (created if missing).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Destination table, optionally schema-qualified.
    #[arg(long)]
    table: Option<String>,

    /// Maximum rows per batch file.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Field delimiter of the input and batch files.
    #[arg(long, value_parser = parse_delimiter_arg)]
    delimiter: Option<char>,

    /// Column dropped from the input when present.
    #[arg(long)]
    artifact_column: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    database: Option<String>,

    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Write batch files but do not load them.
    #[arg(long)]
    dry_run: bool,
}

fn parse_delimiter_arg(value: &str) -> Result<char, String> {
    parse_delimiter(value).map_err(|err| err.to_string())
}

impl Args {
    fn apply(self, config: &mut LoaderConfig) {
        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(artifact_column) = self.artifact_column {
            config.artifact_column = artifact_column;
        }

        // Explicit connection flags win over DATABASE_URL.
        let db = &mut config.database;
        let mut overridden = false;
        if let Some(host) = self.host {
            db.host = host;
            overridden = true;
        }
        if let Some(port) = self.port {
            db.port = port;
            overridden = true;
        }
        if let Some(database) = self.database {
            db.database = database;
            overridden = true;
        }
        if let Some(user) = self.user {
            db.user = user;
            overridden = true;
        }
        if let Some(password) = self.password {
            db.password = Some(password);
            overridden = true;
        }
        if overridden {
            db.url = None;
        }

        config.dry_run = self.dry_run;
    }
}

async fn run(args: Args) -> Result<(), PipelineError> {
    let mut config = LoaderConfig::from_env()?;
    args.apply(&mut config);

    log::info!(
        "loading {} into {} (batch size {}, delimiter {:?})",
        config.input.display(),
        if config.table.is_empty() { "<none>" } else { config.table.as_str() },
        config.batch_size,
        config.delimiter
    );

    let summary = pipeline::run(&config).await?;
    log::info!("{summary}");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("run failed: {err}");
            ExitCode::FAILURE
        }
    }
}
