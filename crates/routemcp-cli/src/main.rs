use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::SourceArgs;
use commands::serve::TransportArg;

#[derive(Parser, Debug)]
#[command(name = "routemcp", version, about = "Expose web routes as MCP tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect the tools generated from a route manifest.
    Tools {
        #[command(subcommand)]
        cmd: ToolsCommand,
    },

    /// Show the internal request a tool call would produce, without executing it.
    Plan {
        /// Tool name.
        tool: String,

        /// Tool arguments as a JSON object.
        #[arg(long = "args", default_value = "{}")]
        arguments: String,

        /// Header of the outer request, as `Name: value`. Repeatable.
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Serve the manifest's routes as MCP tools, backed by echo handlers.
    Serve {
        /// Transport. Overrides the config file.
        #[arg(long, value_enum)]
        transport: Option<TransportArg>,

        /// HTTP host. Overrides the config file.
        #[arg(long)]
        host: Option<String>,

        /// HTTP port. Overrides the config file.
        #[arg(long)]
        port: Option<u16>,

        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List generated tools.
    List {
        /// Print input schemas.
        #[arg(short, long, default_value_t = false)]
        verbose: bool,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Describe one tool as JSON.
    Describe {
        name: String,

        #[command(flatten)]
        source: SourceArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the stdio transport keeps stdout to itself.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Tools { cmd } => match cmd {
            ToolsCommand::List { verbose, source } => commands::tools::list(&source, verbose),
            ToolsCommand::Describe { name, source } => commands::tools::describe(&source, &name),
        },
        Command::Plan {
            tool,
            arguments,
            headers,
            source,
        } => commands::plan::execute(&source, &tool, &arguments, &headers),
        Command::Serve {
            transport,
            host,
            port,
            source,
        } => commands::serve::execute(&source, transport, host, port).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan() {
        let cli = Cli::parse_from([
            "routemcp",
            "plan",
            "get_user",
            "--args",
            r#"{"id": 1}"#,
            "-H",
            "Authorization: Bearer x",
            "--manifest",
            "routes.yaml",
        ]);
        let Command::Plan {
            tool,
            headers,
            source,
            ..
        } = cli.cmd
        else {
            panic!("expected plan");
        };
        assert_eq!(tool, "get_user");
        assert_eq!(headers, vec!["Authorization: Bearer x"]);
        assert_eq!(source.manifest, Some("routes.yaml".into()));
    }
}
