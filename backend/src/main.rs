//! Sheetjson CLI - Convert spreadsheet sheets to JSON through field mappings
//!
//! # Main Commands
//!
//! ```bash
//! sheetjson serve                                   # Start HTTP server (port 3000)
//! sheetjson convert orders.xlsx --mapping map.json  # Convert with a mapping file
//! sheetjson suggest orders.xlsx -i "one object per order" --save-mapping map.json
//! sheetjson template list                           # Manage stored mappings
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! sheetjson sheets orders.xlsx                      # List sheet names
//! sheetjson parse orders.xlsx --sheet Q1 --header-row 2
//! ```

use clap::{Parser, Subcommand};
use serde_json::Value;
use sheetjson::api::logs::{Echo, LOG_BROADCASTER};
use sheetjson::{
    convert_file, export_file_name_now, load_table, read_workbook_file, to_pretty_json, AiClient,
    AiConfig, ConvertOptions, ConvertResult, MappingConfig, MappingRegistry, ServerConfig,
    SuggestOutcome, Workspace,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sheetjson")]
#[command(about = "Convert spreadsheet sheets to JSON through field mappings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        /// Input workbook (xlsx, xls, ods, csv...)
        input: PathBuf,
    },

    /// Normalize a sheet and output its rows as JSON
    Parse {
        /// Input workbook
        input: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Zero-based header row
        #[arg(long, default_value = "0")]
        header_row: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a sheet with a mapping file
    Convert {
        /// Input workbook
        input: PathBuf,

        /// Mapping JSON file
        #[arg(short, long)]
        mapping: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Zero-based header row
        #[arg(long, default_value = "0")]
        header_row: usize,

        /// JSON Schema to validate the output against
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long, conflicts_with = "download")]
        output: Option<PathBuf>,

        /// Write converted_data_<millis>.json in the current directory
        #[arg(long)]
        download: bool,
    },

    /// Ask the AI for a mapping
    Suggest {
        /// Input workbook
        input: PathBuf,

        /// Description of the JSON structure you want
        #[arg(short, long)]
        instruction: String,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Zero-based header row
        #[arg(long, default_value = "0")]
        header_row: usize,

        /// Save the mapping to a file (default: stdout)
        #[arg(long)]
        save_mapping: Option<PathBuf>,

        /// Also store the mapping as a template with this name
        #[arg(long)]
        save_template: Option<String>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Template registry directory
        #[arg(long, default_value = ".sheetjson/mappings")]
        registry_dir: PathBuf,
    },

    /// Manage stored mapping templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List all stored templates
    List,

    /// Import a mapping JSON file as template
    Import {
        /// Mapping JSON file to import
        file: PathBuf,
        /// Name for the template
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show details of a template
    Show {
        /// Template ID
        id: String,
    },

    /// Delete a template
    Delete {
        /// Template ID
        id: String,
    },

    /// Use a stored template to convert a workbook
    Use {
        /// Template ID
        id: String,
        /// Input workbook
        input: PathBuf,
        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,
        /// Zero-based header row
        #[arg(long, default_value = "0")]
        header_row: usize,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // stdout carries JSON for every command but serve
    if !matches!(cli.command, Commands::Serve { .. }) {
        LOG_BROADCASTER.set_echo(Echo::Stderr);
    }

    let result = match cli.command {
        Commands::Sheets { input } => cmd_sheets(&input),

        Commands::Parse {
            input,
            sheet,
            header_row,
            output,
        } => cmd_parse(&input, sheet.as_deref(), header_row, output.as_deref()),

        Commands::Convert {
            input,
            mapping,
            sheet,
            header_row,
            schema,
            output,
            download,
        } => {
            let output = if download {
                Some(PathBuf::from(export_file_name_now()))
            } else {
                output
            };
            cmd_convert(&input, &mapping, sheet, header_row, schema.as_deref(), output.as_deref())
        }

        Commands::Suggest {
            input,
            instruction,
            sheet,
            header_row,
            save_mapping,
            save_template,
        } => {
            cmd_suggest(
                &input,
                &instruction,
                sheet.as_deref(),
                header_row,
                save_mapping.as_deref(),
                save_template.as_deref(),
            )
            .await
        }

        Commands::Serve { port, registry_dir } => cmd_serve(port, registry_dir).await,

        Commands::Template { action } => cmd_template(action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_sheets(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let workbook = read_workbook_file(input)?;
    for name in workbook.sheet_names() {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_parse(
    input: &Path,
    sheet: Option<&str>,
    header_row: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let workbook = read_workbook_file(input)?;
    if let (Some(encoding), Some(delimiter)) = (&workbook.encoding, workbook.delimiter) {
        eprintln!("   Encoding: {}", encoding);
        eprintln!("   Delimiter: '{}'", sheetjson::transform::format_delimiter(delimiter));
    }

    let (sheet, table) = load_table(&workbook, sheet, header_row)?;
    eprintln!("   Sheet: {} (header row {})", sheet, header_row);
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("✅ Parsed {} rows", table.row_count());

    let registry = MappingRegistry::new();
    let compatible = registry.find_compatible(&table.headers);
    if !compatible.is_empty() {
        eprintln!("\n📋 Compatible templates:");
        for (stored, score) in compatible.iter().take(3) {
            eprintln!("   {} ({}) - {:.0}% match", stored.name, stored.id, score * 100.0);
        }
    }

    let json = serde_json::to_string_pretty(&table.rows_as_json())?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_convert(
    input: &Path,
    mapping_path: &Path,
    sheet: Option<String>,
    header_row: usize,
    schema_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let mapping = MappingConfig::from_json(&fs::read_to_string(mapping_path)?)?;
    eprintln!("   Mapping: {} fields", mapping.len());

    let schema = match schema_path {
        Some(p) => Some(serde_json::from_str::<Value>(&fs::read_to_string(p)?)?),
        None => None,
    };

    let options = ConvertOptions {
        sheet,
        header_row,
        schema,
    };
    let result = convert_file(input, &mapping, &options)?;
    report(&result);

    write_output(&to_pretty_json(&result.documents)?, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn report(result: &ConvertResult) {
    eprintln!("\n⚙️  Converted: {} objects", result.documents.len());

    if let Some(ref validation) = result.validation {
        eprintln!("\n✔️  Validation:");
        if validation.is_ok() {
            eprintln!("   ✅ All {} objects valid!", validation.valid);
        } else {
            eprintln!("   ✅ Valid: {}", validation.valid);
            eprintln!("   ❌ Invalid: {}", validation.invalid);
            for doc in validation.errors.iter().take(5) {
                eprintln!("\n   Object {}:", doc.record_index);
                for err in doc.errors.iter().take(3) {
                    eprintln!("     - {}", err);
                }
            }
        }
    }
}

async fn cmd_suggest(
    input: &Path,
    instruction: &str,
    sheet: Option<&str>,
    header_row: usize,
    save_mapping: Option<&Path>,
    save_template: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = AiClient::new(AiConfig::from_env()?);

    eprintln!("📄 Reading: {}", input.display());
    let workspace = Workspace::new();
    workspace.load_workbook(read_workbook_file(input)?).await?;
    if let Some(sheet) = sheet {
        workspace.select(sheet, header_row).await?;
    } else if header_row > 0 {
        let first = workspace.status().await.sheets.first().cloned().unwrap_or_default();
        workspace.select(&first, header_row).await?;
    }

    match workspace.suggest(&client, instruction).await? {
        SuggestOutcome::Applied(n) => eprintln!("✅ {} fields suggested", n),
        SuggestOutcome::NoValidMapping => {
            return Err("No valid mapping produced. Try a more detailed instruction.".into())
        }
        SuggestOutcome::EmptyInstruction => return Err("Instruction is empty".into()),
    }

    let status = workspace.status().await;
    if !status.dangling_rule_ids.is_empty() {
        eprintln!(
            "   ⚠️  {} fields have no matching column and need a source",
            status.dangling_rule_ids.len()
        );
    }

    let mapping = workspace.rules().await;
    if let Some(name) = save_template {
        let mut registry = MappingRegistry::new();
        let id = registry.save(mapping.clone(), name, status.headers)?;
        eprintln!("   💾 Template saved with ID: {}", id);
    }

    write_output(&mapping.to_json()?, save_mapping)?;
    Ok(())
}

async fn cmd_serve(port: u16, registry_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let ai = match AiConfig::from_env() {
        Ok(config) => Some(AiClient::new(config)),
        Err(e) => {
            eprintln!("⚠️  AI suggestions disabled: {}", e);
            None
        }
    };

    sheetjson::server::start_server(ServerConfig { port, registry_dir }, ai).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn cmd_template(action: TemplateAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = MappingRegistry::new();

    match action {
        TemplateAction::List => {
            let templates = registry.list();
            if templates.is_empty() {
                eprintln!("📋 No templates stored yet.");
                eprintln!("   Use 'sheetjson template import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored templates ({}):\n", templates.len());
            for t in templates {
                println!("  📄 {} ({})", t.name, t.id);
                println!("     Columns: {}", t.mapping.source_columns().join(", "));
                println!("     Fields: {}", t.mapping.len());
                println!("     Uses: {}", t.use_count);
                if let Some(ref last) = t.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        TemplateAction::Import { file, name } => {
            eprintln!("📥 Importing template from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Template saved with ID: {}", id);
        }

        TemplateAction::Show { id } => {
            let t = registry.require(&id)?;
            println!("📄 Template: {} ({})\n", t.name, t.id);
            println!("Headers: {}", t.headers.join(", "));
            println!("Created: {}", t.created_at);
            println!("Uses: {}", t.use_count);
            println!("\nMapping:");
            println!("{}", t.mapping.to_json()?);
        }

        TemplateAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Template deleted: {}", id);
        }

        TemplateAction::Use {
            id,
            input,
            sheet,
            header_row,
            output,
        } => {
            let template = registry.require(&id)?;
            eprintln!("📄 Using template: {} ({})", template.name, template.id);

            let options = ConvertOptions {
                sheet,
                header_row,
                schema: None,
            };
            let result = convert_file(&input, &template.mapping, &options)?;
            report(&result);

            registry.mark_used(&id)?;
            write_output(&to_pretty_json(&result.documents)?, output.as_deref())?;
        }
    }

    Ok(())
}
