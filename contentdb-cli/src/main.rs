use clap::{Parser, Subcommand, ValueEnum};
use contentdb::schema::parse_config;
use contentdb::{
    ContentConfig, Entry, LiveSnapshot, MarkdownRenderer, Reference, Snapshot, ValidationMode,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// contentdb CLI: query typed content collections from the command line
#[derive(Parser)]
#[command(name = "contentdb", version, about)]
struct Cli {
    /// Path to the collection configuration file
    #[arg(long, default_value = "content.yaml")]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List the entries of a collection
    List {
        /// Collection name
        collection: String,
        /// Data field filters (e.g. --filter featured=true)
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
        /// Include raw bodies in the output
        #[arg(long)]
        with_body: bool,
    },

    /// Get a single entry by slug (content collections) or id (data collections)
    Get {
        /// Collection name
        collection: String,
        /// Slug or id
        key: String,
    },

    /// Get several entries at once; fails if any is missing
    Entries {
        /// Entries as collection:slug-or-id
        #[arg(required = true, value_parser = parse_collection_key)]
        keys: Vec<(String, String)>,
    },

    /// Resolve the reference(s) stored in a field of an entry
    Resolve {
        /// Collection name
        collection: String,
        /// Slug or id
        key: String,
        /// Data field holding a reference or a list of references
        field: String,
    },

    /// Render a content entry to HTML
    Render {
        /// Collection name
        collection: String,
        /// Slug
        slug: String,
    },

    /// Check every entry against its collection schema
    Validate,

    /// Show collections, their flavor and entry counts
    Status,

    /// Reload whenever a collection document changes
    Watch,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn parse_collection_key(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find(':')
        .ok_or_else(|| format!("Invalid entry '{s}': expected collection:key"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = parse_config(&cli.config)?;

    match cli.command {
        Command::List {
            collection,
            filters,
            with_body,
        } => {
            let snapshot = Snapshot::from_config(&config)?;
            let filters: Vec<(String, serde_json::Value)> = filters
                .into_iter()
                .map(|(k, v)| (k, parse_field_value(&v)))
                .collect();
            let entries = snapshot.get_collection_where(&collection, |entry| {
                filters
                    .iter()
                    .all(|(field, value)| entry.data.get(field) == Some(value))
            })?;
            let items: Vec<serde_json::Value> = entries
                .into_iter()
                .map(|e| entry_to_json(e, with_body))
                .collect::<Result<_, _>>()?;
            print_output(&serde_json::Value::Array(items), &cli.format)?;
        }

        Command::Get { collection, key } => {
            let snapshot = Snapshot::from_config(&config)?;
            let reference = make_reference(&snapshot, &collection, &key)?;
            let value = match snapshot.get_entry(&reference) {
                Some(entry) => entry_to_json(entry, true)?,
                None => serde_json::Value::Null,
            };
            print_output(&value, &cli.format)?;
        }

        Command::Entries { keys } => {
            let snapshot = Snapshot::from_config(&config)?;
            let references = keys
                .iter()
                .map(|(collection, key)| make_reference(&snapshot, collection, key))
                .collect::<Result<Vec<_>, _>>()?;
            let items = snapshot
                .get_entries(&references)?
                .into_iter()
                .map(|e| entry_to_json(e, false))
                .collect::<Result<Vec<_>, _>>()?;
            print_output(&serde_json::Value::Array(items), &cli.format)?;
        }

        Command::Resolve {
            collection,
            key,
            field,
        } => {
            let snapshot = Snapshot::from_config(&config)?;
            let reference = make_reference(&snapshot, &collection, &key)?;
            let entry = snapshot.require_entry(&reference)?;
            let targets = match entry.reference(&field) {
                Some(single) => vec![single],
                None => entry.references(&field),
            };
            if targets.is_empty() {
                return Err(format!("Field '{field}' of {reference} holds no references").into());
            }
            let items = snapshot
                .resolve_all(&targets)?
                .into_iter()
                .map(|e| entry_to_json(e, false))
                .collect::<Result<Vec<_>, _>>()?;
            print_output(&serde_json::Value::Array(items), &cli.format)?;
        }

        Command::Render { collection, slug } => {
            let snapshot = Snapshot::from_config(&config)?;
            let entry = snapshot.require_entry(&Reference::slug(&collection, &slug))?;
            let rendered = entry.render(&MarkdownRenderer::new())?;
            print_output(&serde_json::to_value(rendered.as_ref())?, &cli.format)?;
        }

        Command::Validate => {
            config.validation = ValidationMode::Lenient;
            let snapshot = Snapshot::from_config(&config)?;
            let report = snapshot.report();
            print_output(&serde_json::to_value(report)?, &cli.format)?;
            if report.total_rejected() > 0 {
                return Err(format!("{} entries failed validation", report.total_rejected()).into());
            }
        }

        Command::Status => {
            let snapshot = Snapshot::from_config(&config)?;
            print_output(&status(&config, &snapshot), &cli.format)?;
        }

        Command::Watch => {
            let live = Arc::new(LiveSnapshot::from_config(&config)?);
            let handle = live.watch(&config.root)?;
            print_output(&status(&config, &live.current()), &cli.format)?;
            for event in handle.events.iter() {
                log::info!("{:?} {}", event.kind, event.path.display());
                print_output(
                    &serde_json::json!({
                        "generation": live.generation(),
                        "changed": event.path.display().to_string(),
                        "entries": live.current().report().total_loaded(),
                    }),
                    &cli.format,
                )?;
            }
        }
    }

    Ok(())
}

fn make_reference(
    snapshot: &Snapshot,
    collection: &str,
    key: &str,
) -> Result<Reference, Box<dyn std::error::Error>> {
    snapshot
        .reference(collection)?
        .make(key)
        .map_err(|issue| format!("Invalid key for {collection}: {}", issue.actual).into())
}

fn status(config: &ContentConfig, snapshot: &Snapshot) -> serde_json::Value {
    let mut collections = serde_json::Map::new();
    for name in snapshot.collection_names() {
        collections.insert(
            name.to_string(),
            serde_json::json!({
                "type": snapshot.kind(name),
                "count": snapshot.report().loaded.get(name).copied().unwrap_or(0),
            }),
        );
    }
    serde_json::json!({
        "root": config.root.display().to_string(),
        "validation": config.validation,
        "collections": collections,
    })
}

fn entry_to_json(entry: &Entry, with_body: bool) -> Result<serde_json::Value, serde_json::Error> {
    let mut value = serde_json::to_value(entry)?;
    if !with_body {
        if let Some(obj) = value.as_object_mut() {
            obj.remove("body");
        }
    }
    Ok(value)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn parse_field_value(raw: &str) -> serde_json::Value {
    // Numbers, booleans and lists parse as JSON; everything else is a string
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}
