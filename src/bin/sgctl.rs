use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table as ComfyTable};
use shardgate::executor::KernelProcessor;
use shardgate::route::PartialSqlRouteExecutor;
use shardgate::sharding::ShardingStrategy;
use shardgate::statement::{Condition, Expression, Projection, ProjectionsContext, SelectStatementContext};
use shardgate::{LogicSql, MetaData, Schema, SessionContext, ShardgateConfig, StatementContext, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shardgate operator tool
#[derive(Parser, Debug)]
#[command(name = "sgctl")]
#[command(about = "Inspect shardgate configuration and routing", long_about = None)]
struct Args {
    /// Config file (defaults: /etc/shardgate, user config dir, ./shardgate.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate the configuration, then print the rules
    Check,
    /// Route `SELECT * FROM <table> WHERE <column> = <value>`
    Route {
        #[arg(short, long)]
        table: String,
        #[arg(short = 'C', long)]
        column: String,
        #[arg(short, long)]
        value: String,
        /// Print the route context as JSON
        #[arg(long)]
        json: bool,
    },
}

fn strategy_cell(strategy: Option<&ShardingStrategy>) -> Cell {
    Cell::new(strategy.map_or_else(|| "-".to_string(), |s| format!("{} ({})", s.column, s.algorithm_name)))
}

fn check(config: &ShardgateConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rules = config.build()?;
    println!("Data sources: {}", rules.logic_data_sources.join(", "));
    println!(
        "Props: max_connections_size_per_query={} sql_show={} database_type={}",
        config.props.max_connections_size_per_query, config.props.sql_show, config.props.database_type
    );

    if let Some(sharding) = &rules.sharding {
        let mut table = ComfyTable::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["Logic table", "Data nodes", "Database strategy", "Table strategy", "Key generate"]);
        for rule in &sharding.table_rules {
            let nodes: Vec<String> = rule.actual_data_nodes.iter().map(ToString::to_string).collect();
            table.add_row(vec![
                Cell::new(&rule.logic_table),
                Cell::new(nodes.join(", ")),
                strategy_cell(sharding.database_strategy(rule)),
                strategy_cell(sharding.table_strategy(rule)),
                Cell::new(
                    rule.key_generate
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |k| format!("{} ({})", k.column, k.generator_name)),
                ),
            ]);
        }
        println!("{table}");
        if !sharding.broadcast_tables.is_empty() {
            println!("Broadcast tables: {}", sharding.broadcast_tables.join(", "));
        }
    }

    if let Some(readwrite) = &rules.readwrite_splitting {
        let mut table = ComfyTable::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["Group", "Primary", "Replicas", "Load balancer"]);
        for rule in &readwrite.data_source_rules {
            table.add_row(vec![
                Cell::new(&rule.name),
                Cell::new(&rule.primary),
                Cell::new(rule.replicas.join(", ")),
                Cell::new(format!("{} ({})", rule.load_balancer_name, rule.load_balancer.type_name())),
            ]);
        }
        println!("{table}");
    }
    println!("Configuration OK");
    Ok(())
}

fn parse_value(raw: &str) -> Value {
    raw.parse::<i64>().map_or_else(|_| Value::Text(raw.to_string()), Value::Integer)
}

fn route(
    config: &ShardgateConfig,
    table: &str,
    column: &str,
    value: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let rules = config.build()?;
    let names: Vec<&str> = rules.logic_data_sources.iter().map(String::as_str).collect();
    let metadata = MetaData::new(Schema::new(), &names, config.props.database_type);

    let select = SelectStatementContext::new(&[table], ProjectionsContext::new(vec![Projection::column("*")], false))
        .with_where(Condition::Equals(column.to_string(), Expression::Parameter(0)));
    let sql = format!("SELECT * FROM {table} WHERE {column} = ?");
    let logic_sql = LogicSql::new(StatementContext::Select(select), &sql, vec![parse_value(value)]);

    let router = PartialSqlRouteExecutor::new(rules.routers());
    let route_context = router.route(&logic_sql, &metadata, &mut SessionContext::default())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&route_context)?);
        return Ok(());
    }
    let context = KernelProcessor::new(config.props.database_type, false).generate_execution_context(&logic_sql, route_context)?;
    let mut output = ComfyTable::new();
    output.load_preset(UTF8_FULL);
    output.set_header(["Data source", "Actual SQL"]);
    for unit in &context.execution_units {
        output.add_row(vec![Cell::new(&unit.data_source_name), Cell::new(&unit.sql_unit.sql)]);
    }
    println!("{output}\n({} units)", context.execution_units.len());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ShardgateConfig::load(args.config.as_deref())?;
    match &args.command {
        Command::Check => check(&config),
        Command::Route { table, column, value, json } => route(&config, table, column, value, *json),
    }
}
