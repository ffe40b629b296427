use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apimodel")]
#[command(about = "Check, plan and render API model queries against configured resources")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./apimodel.toml)
    #[arg(short, long, global = true, env = "APIMODEL_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a query string and print the parsed query or the error map
    Check(QueryArgs),
    /// Print the prepared query
    Plan(QueryArgs),
    /// Print the rendered SQL and its bind parameters
    Sql(QueryArgs),
    /// Print the policy decision of every axis for a resource
    Policy(PolicyArgs),
    /// List configured resources
    Resources,
}

#[derive(clap::Args)]
pub struct QueryArgs {
    /// Resource name
    pub resource: String,

    /// Query string, e.g. 'filter[0:age:gte]=18&sort=-created_at'
    #[arg(default_value = "")]
    pub query: String,

    /// HTTP method the request arrives with
    #[arg(short, long)]
    pub method: Option<String>,
}

#[derive(clap::Args)]
pub struct PolicyArgs {
    /// Resource name
    pub resource: String,
}
