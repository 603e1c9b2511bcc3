use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{BadspotError, Result};
use crate::logging;
use crate::models::LabeledRecord;
use crate::processors::BatchChecker;
use crate::readers::TableReader;
use crate::session::{Interaction, Response, Session};
use crate::storage::CredentialSource;
use crate::utils::filename::{generate_default_map_filename, generate_default_output_filename};
use crate::utils::progress::ProgressReporter;
use crate::writers::ParquetWriter;

pub async fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbose, cli.log_file.as_deref())?;
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Predict {
            input,
            output,
            map,
            no_map,
            credentials,
            policy,
            on_unseen,
            compression,
            publish,
            show,
        } => {
            if let Some(policy) = policy {
                config.prediction.override_policy = policy.into();
            }
            if let Some(on_unseen) = on_unseen {
                config.prediction.encoding_policy = on_unseen.into();
            }
            if let Some(compression) = compression {
                config.output.compression = compression;
            }
            let output = output.unwrap_or_else(generate_default_output_filename);

            println!("Predicting badspots...");
            println!("Input file: {}", input.display());
            println!("Output file: {}", output.display());
            println!(
                "Override rule: {}",
                config.prediction.override_policy.describe()
            );

            let source = tokio::task::spawn_blocking(move || credential_source(credentials)).await??;
            let progress = ProgressReporter::new_spinner("Connecting to storage...", false);
            let mut session = Session::new(config);

            let steps = [
                ("Connecting to storage...", Interaction::Connect(source)),
                ("Reading input...", Interaction::Upload(input)),
                ("Predicting...", Interaction::Predict),
                ("Writing output...", Interaction::Export(output)),
            ];
            for (message, interaction) in steps {
                progress.set_message(message);
                let (next, response) = dispatch(session, interaction).await?;
                session = next;
                print_response(&progress, &response);
                if response.is_error() {
                    progress.finish_with_message("Prediction failed");
                    return Ok(());
                }
            }

            if let Some(outcome) = session.outcome() {
                for line in preview_lines(&outcome.labeled, show) {
                    progress.println(&line);
                }
            }

            if !no_map {
                progress.set_message("Rendering map...");
                let (next, response) = dispatch(session, Interaction::RenderMap).await?;
                session = next;
                print_response(&progress, &response);
                if let Some(artifact) = &response.map {
                    let map_path = map.unwrap_or_else(generate_default_map_filename);
                    artifact.write_to(&map_path)?;
                    progress.println(&format!("Map written to {}", map_path.display()));
                }
            }

            if publish {
                progress.set_message("Publishing results...");
                let (next, response) = dispatch(session, Interaction::Publish).await?;
                session = next;
                print_response(&progress, &response);
            }

            let (_, response) = dispatch(session, Interaction::Report).await?;
            progress.finish_with_message("Prediction complete!");
            if let Some(summary) = response.summary {
                println!("\n{}", summary);
            }
        }

        Commands::Validate { input } => {
            println!("Validating input file: {}", input.display());

            let progress = ProgressReporter::new_spinner("Reading input...", false);
            let table = tokio::task::spawn_blocking(move || TableReader::new().read(&input)).await??;
            progress.finish_and_clear();

            let checker = BatchChecker::new();
            let report = checker.check_table(&table)?;
            println!("\n{}", checker.generate_summary(&report));

            if report.has_schema_errors() {
                println!(
                    "❌ The file does not contain all required columns (missing: {})",
                    report.missing_columns.join(", ")
                );
            } else if report.coordinate_violations.is_empty() {
                println!("✅ All required columns present");
            } else {
                println!(
                    "⚠️  Found {} rows with out-of-range coordinates",
                    report.coordinate_violations.len()
                );
            }
        }

        Commands::Artifacts { credentials } => {
            println!(
                "Bucket: {} ({:?} backend)",
                config.storage.bucket, config.storage.backend
            );
            println!("Model object: {}", config.artifacts.model_object());
            println!("Scaler object: {}", config.artifacts.scaler_object());
            println!("Encoder object: {}", config.artifacts.encoder_object());

            let source = tokio::task::spawn_blocking(move || credential_source(credentials)).await??;
            let progress = ProgressReporter::new_spinner("Loading artifacts...", false);
            let session = Session::new(config);
            let (_, response) = dispatch(session, Interaction::Connect(source)).await?;
            progress.finish_and_clear();
            print_notices(&response);
        }

        Commands::Info { file, sample } => {
            println!("Analyzing Parquet file: {}", file.display());

            let writer = ParquetWriter::new();
            let file_info = writer.get_file_info(&file)?;

            println!("\nFile Details:");
            println!("{}", file_info.summary());

            if sample > 0 {
                println!("\nSample Records (showing up to {} records):", sample);
                match writer.read_sample_records(&file, sample) {
                    Ok(records) => {
                        let badspots = records.iter().filter(|r| r.prediction.is_badspot()).count();
                        for (i, record) in records.iter().enumerate() {
                            println!("{}. {}", i + 1, format_record(record));
                        }
                        println!("Badspots in sample: {} of {}", badspots, records.len());
                    }
                    Err(e) => println!("Error reading sample data: {}", e),
                }
            }
        }

        Commands::Shell { credentials } => {
            let session = Session::new(config);
            tokio::task::spawn_blocking(move || run_shell(session, credentials)).await??;
        }
    }

    Ok(())
}

/// Run one interaction off the async runtime
async fn dispatch(mut session: Session, interaction: Interaction) -> Result<(Session, Response)> {
    let handle = tokio::task::spawn_blocking(move || {
        let response = session.handle(interaction);
        (session, response)
    });
    Ok(handle.await?)
}

fn print_response(progress: &ProgressReporter, response: &Response) {
    for notice in &response.notices {
        progress.println(&notice.to_string());
    }
}

fn preview_lines(records: &[LabeledRecord], show: usize) -> Vec<String> {
    if show == 0 || records.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![format!(
        "\nLabeled Records (showing {} of {}):",
        show.min(records.len()),
        records.len()
    )];
    lines.extend(
        records
            .iter()
            .take(show)
            .enumerate()
            .map(|(i, record)| format!("{}. {}", i + 1, format_record(record))),
    );
    lines
}

fn format_record(record: &LabeledRecord) -> String {
    let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v));
    let r = &record.record;
    format!(
        "({}, {}) PCI {} Cat {}: RSRP={} RSRQ={} -> {}{}",
        show(r.latitude),
        show(r.longitude),
        r.pci.map_or_else(|| "-".to_string(), |v| v.to_string()),
        r.cat.as_deref().unwrap_or("-"),
        show(r.rsrp),
        show(r.rsrq),
        record.prediction,
        if record.was_overridden() { " (overridden)" } else { "" }
    )
}

/// `-` reads the key JSON from stdin, any other path is a key file
fn credential_source(path: Option<PathBuf>) -> Result<Option<CredentialSource>> {
    match path {
        Some(path) if path.as_os_str() == "-" => {
            let stdin = std::io::stdin();
            let json = read_key_block(stdin.lock().lines())?;
            Ok(Some(CredentialSource::Json(json)))
        }
        other => Ok(other.map(CredentialSource::File)),
    }
}

/// Collect pasted key JSON up to the first blank line or end of input
fn read_key_block<I>(lines: I) -> Result<String>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let mut json = String::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            break;
        }
        json.push_str(&line);
        json.push('\n');
    }

    if json.is_empty() {
        return Err(BadspotError::Credential(
            "No credential JSON was received on standard input.".to_string(),
        ));
    }
    Ok(json)
}

/// A line typed into the interactive shell
#[derive(Debug, PartialEq)]
enum ShellCommand {
    Run(Interaction),
    /// `connect -`: the key JSON follows on the next lines
    ConnectPasted,
    SaveMap(Option<PathBuf>),
    Help,
    Quit,
}

const SHELL_PREVIEW_ROWS: usize = 10;

const SHELL_HELP: &str = "Commands:
  connect [key.json]   connect to storage and load the model
  connect -            paste the key JSON, end with an empty line
  upload <file>        read a spreadsheet or CSV
  predict              classify the uploaded rows
  map [file.html]      render the latest predictions to a map
  report               data-quality and prediction summary
  export <file>        write predictions (.csv or .parquet)
  publish              upload predictions to the results prefix
  help                 show this message
  quit                 leave the shell";

fn parse_shell_line(line: &str) -> Result<Option<ShellCommand>> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    let argument = parts.next().map(PathBuf::from);
    let required = |arg: Option<PathBuf>| {
        arg.ok_or_else(|| BadspotError::InvalidFormat(format!("'{}' needs a file argument", command)))
    };

    let parsed = match command.to_lowercase().as_str() {
        "connect" if argument.as_deref() == Some(Path::new("-")) => ShellCommand::ConnectPasted,
        "connect" => ShellCommand::Run(Interaction::Connect(argument.map(CredentialSource::File))),
        "upload" => ShellCommand::Run(Interaction::Upload(required(argument)?)),
        "predict" => ShellCommand::Run(Interaction::Predict),
        "map" => ShellCommand::SaveMap(argument),
        "report" => ShellCommand::Run(Interaction::Report),
        "export" => ShellCommand::Run(Interaction::Export(required(argument)?)),
        "publish" => ShellCommand::Run(Interaction::Publish),
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => {
            return Err(BadspotError::InvalidFormat(format!(
                "Unknown command '{}', type 'help' for a list",
                other
            )))
        }
    };

    Ok(Some(parsed))
}

fn run_shell(mut session: Session, credentials: Option<PathBuf>) -> Result<()> {
    println!("Badspot prediction shell. Type 'help' for commands.");
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    let source = match credentials {
        Some(path) if path.as_os_str() == "-" => {
            println!("Paste the service-account JSON, then an empty line:");
            Some(CredentialSource::Json(read_key_block(&mut lines)?))
        }
        other => other.map(CredentialSource::File),
    };
    let response = session.handle(Interaction::Connect(source));
    print_notices(&response);

    loop {
        print!("badspot> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let command = match parse_shell_line(&line?) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("[error] {}", e);
                continue;
            }
        };

        match command {
            ShellCommand::Run(interaction) => {
                let is_predict = matches!(interaction, Interaction::Predict);
                let response = session.handle(interaction);
                print_notices(&response);
                if let Some(outcome) = session.outcome().filter(|_| is_predict) {
                    for line in preview_lines(&outcome.labeled, SHELL_PREVIEW_ROWS) {
                        println!("{}", line);
                    }
                }
            }
            ShellCommand::ConnectPasted => {
                println!("Paste the service-account JSON, then an empty line:");
                match read_key_block(&mut lines) {
                    Ok(json) => {
                        let response =
                            session.handle(Interaction::Connect(Some(CredentialSource::Json(json))));
                        print_notices(&response);
                    }
                    Err(e) => println!("[error] {}", e),
                }
            }
            ShellCommand::SaveMap(path) => {
                let response = session.handle(Interaction::RenderMap);
                print_notices(&response);
                if let Some(artifact) = &response.map {
                    let path = path.unwrap_or_else(generate_default_map_filename);
                    match artifact.write_to(&path) {
                        Ok(()) => println!("Map written to {}", path.display()),
                        Err(e) => println!("[error] {}", e),
                    }
                }
            }
            ShellCommand::Help => println!("{}", SHELL_HELP),
            ShellCommand::Quit => break,
        }
    }

    Ok(())
}

fn print_notices(response: &Response) {
    for notice in &response.notices {
        println!("{}", notice);
    }
    if let Some(summary) = &response.summary {
        println!("{}", summary);
    }
}
