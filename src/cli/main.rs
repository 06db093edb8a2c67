use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use versioned_search::{
    admin, client, telemetry, Collection, Config, DocumentProducer, Error, Field, Index,
    IndexDefinition, Schema, Version,
};

#[derive(Parser)]
#[command(name = "vsearch")]
#[command(about = "Manage versioned search indexes", long_about = None, version)]
struct Cli {
    /// Configuration file (defaults to $VSEARCH_CONFIG or config/vsearch.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Environment label, overriding configuration
    #[arg(short, long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List indexes, their versions and which one is live
    List,

    /// Build a new version from a JSON Lines file
    #[command(alias = "index")]
    Reindex {
        #[arg(short, long)]
        index: String,

        /// One JSON document per line
        #[arg(short, long)]
        documents: PathBuf,

        /// Schema as JSON (`fields`, `token_separators`, ...)
        #[arg(short, long, conflicts_with = "schema_from_live")]
        schema: Option<PathBuf>,

        /// Reuse the schema of the currently aliased version
        #[arg(long)]
        schema_from_live: bool,

        /// Build the version without pointing the alias at it
        #[arg(long)]
        no_activate: bool,
    },

    /// Point an index's alias at an existing version
    Alias {
        #[arg(short, long)]
        index: String,

        #[arg(short, long)]
        version: Version,
    },

    /// Delete a version that is not live
    Drop {
        #[arg(short, long)]
        index: String,

        #[arg(short, long)]
        version: Version,
    },

    /// Run a query against an index's live version
    Search {
        #[arg(short, long)]
        index: String,

        #[arg(short, long, default_value = "*")]
        query: String,

        /// Comma-separated fields
        #[arg(long)]
        query_by: String,

        #[arg(short, long)]
        filter: Vec<String>,

        #[arg(long, default_value = "10")]
        per: u32,

        #[arg(long, default_value = "1")]
        page: u32,
    },
}

/// Streams documents from a JSON Lines file; an empty id list means every line
struct JsonLinesDocuments {
    path: PathBuf,
}

impl DocumentProducer for JsonLinesDocuments {
    fn produce(&self, ids: Vec<String>) -> BoxStream<'static, versioned_search::Result<Value>> {
        let path = self.path.clone();
        let wanted: Arc<HashSet<String>> = Arc::new(ids.into_iter().collect());

        stream::once(async move { File::open(path).await })
            .map(|file| -> BoxStream<'static, versioned_search::Result<Value>> {
                match file {
                    Ok(file) => LinesStream::new(BufReader::new(file).lines())
                        .filter_map(|line| async move {
                            match line {
                                Ok(line) if line.trim().is_empty() => None,
                                Ok(line) => Some(serde_json::from_str(&line).map_err(Error::from)),
                                Err(err) => Some(Err(Error::Io(err))),
                            }
                        })
                        .boxed(),
                    Err(err) => stream::once(async move { Err(Error::Io(err)) }).boxed(),
                }
            })
            .flatten()
            .filter(move |document| {
                let keep = match document {
                    Ok(document) if !wanted.is_empty() => document
                        .get("id")
                        .and_then(Value::as_str)
                        .map_or(false, |id| wanted.contains(id)),
                    _ => true,
                };
                async move { keep }
            })
            .boxed()
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::from_sources(&path.to_string_lossy())
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            config.apply_conventional_env(|key| std::env::var(key).ok())?;
            config
        }
        None => Config::load().context("Failed to load configuration")?,
    };

    if let Some(env) = &cli.env {
        config.env = Some(env.clone()).filter(|env| !env.is_empty());
    }
    Ok(config)
}

fn read_schema(path: &Path) -> anyhow::Result<Schema> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid schema in {}", path.display()))
}

fn definition(config: &Config, index_name: &str, schema: Schema) -> IndexDefinition {
    IndexDefinition::builder(index_name)
        .schema(schema)
        .env_from(config)
        .build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    telemetry::init(&config.observability);

    let backend = client::create_backend(&config)?;
    let mut stdout = std::io::stdout();

    match cli.command {
        Commands::List => {
            admin::list(&backend, config.env.as_deref(), &mut stdout).await?;
        }

        Commands::Reindex {
            index,
            documents,
            schema,
            schema_from_live,
            no_activate,
        } => {
            let schema = if let Some(path) = schema {
                read_schema(&path)?
            } else if schema_from_live {
                let live = definition(&config, &index, Schema::default()).alias_name();
                Collection::open(backend.clone(), &live)
                    .await
                    .with_context(|| format!("No live version behind {}", live))?
                    .schema()
            } else {
                Schema::builder().add_field(Field::auto(".*")).build()
            };

            let target = Index::from_config(
                backend.clone(),
                &config,
                definition(&config, &index, schema),
                JsonLinesDocuments { path: documents },
            );
            let failures =
                admin::index(&target, Vec::<String>::new(), !no_activate, &mut stdout).await?;
            if !failures.is_empty() {
                tracing::warn!(failures = failures.len(), "Some documents were rejected");
            }
        }

        Commands::Alias { index, version } => {
            let target = Index::with_ids(backend, definition(&config, &index, Schema::default()));
            if !admin::update_alias(&target, version, &mut stdout).await? {
                bail!("version {} does not exist for {}", version, index);
            }
        }

        Commands::Drop { index, version } => {
            let target = Index::with_ids(backend, definition(&config, &index, Schema::default()));
            if !admin::drop_version(&target, version, &mut stdout).await? {
                bail!("version {} does not exist for {}", version, index);
            }
        }

        Commands::Search {
            index,
            query,
            query_by,
            filter,
            per,
            page,
        } => {
            let target = Index::with_ids(backend, definition(&config, &index, Schema::default()));
            let fields: Vec<String> = query_by.split(',').map(|f| f.trim().to_string()).collect();
            let results = target
                .search(query, fields)
                .filters(filter)
                .per(per)
                .page(page)
                .load()
                .await?;

            for hit in results.hits() {
                println!("{}", hit.document);
            }
            eprintln!(
                "{} of {} documents, page {}/{}",
                results.count(),
                results.out_of(),
                results.current_page(),
                results.total_pages()
            );
        }
    }

    Ok(())
}
