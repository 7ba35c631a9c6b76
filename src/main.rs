use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use featurechain::config::{self, TranslatorConfig};
use featurechain::filter::parse_filter;
use featurechain::mapping::MappingConfig;
use featurechain::sql_query_generator::{AnsiDialect, Backend, StaticCatalog};
use featurechain::translator::QueryTranslator;

/// Featurechain - push filters on mapped complex features down into SQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Mapping file (YAML)
    #[arg(long)]
    mapping: PathBuf,

    /// Filter in ECQL syntax, e.g. "st:sensors/st:Sensor/st:name = 'X'"
    #[arg(long)]
    filter: String,

    /// Translator settings file (YAML); environment variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Leave every predicate on a nested attribute to the post filter
    #[arg(long)]
    no_nested_filters: bool,

    /// Database schema qualifying table names
    #[arg(long)]
    schema: Option<String>,

    /// Backend supports OGC spatial functions
    #[arg(long)]
    spatial: bool,

    /// Print the full translation as JSON
    #[arg(long)]
    json: bool,
}

impl From<&Cli> for config::CliConfig {
    fn from(cli: &Cli) -> Self {
        config::CliConfig {
            no_nested_filters: cli.no_nested_filters,
            database_schema: cli.schema.clone(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TranslatorConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => TranslatorConfig::from_env()?,
    };
    config.merge(TranslatorConfig::from_cli((&cli).into())?);

    let mapping = MappingConfig::from_yaml_file(&cli.mapping)
        .with_context(|| format!("Failed to load mapping {}", cli.mapping.display()))?;
    let registry = mapping.build()?;
    let backend = Backend::new(
        AnsiDialect::new().with_spatial(cli.spatial),
        StaticCatalog::new(mapping.primary_keys()),
    )
    .with_schema(config.database_schema.clone());

    let filter = parse_filter(&cli.filter)?;
    log::info!("Translating '{}' against {}", filter, registry.root());

    let translation = QueryTranslator::new(&registry, &backend, config).translate(&filter)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&translation)?);
    } else {
        println!("{}", translation.select_sql());
        if !translation.post.is_include() {
            println!("-- post filter: {}", translation.post);
        }
    }
    Ok(())
}
