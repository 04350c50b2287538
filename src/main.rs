//! MCP API Catalog - sync, discover and execute API operations
//!
//! Command output is JSON on stdout; logs go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info};

use mcp_api_catalog::{
    catalog::{CatalogHandle, ToolDefinitionStore},
    cli::{Cli, Command},
    config::Config,
    executor::{EndpointExecutor, HttpTransport},
    setup_tracing,
    sync::{DescriptionSource, FileDescriptionSource, HttpDescriptionSource, SyncEngine, SyncOptions},
    tools,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Sync {
            add_missing,
            from_file,
        } => {
            let source: Arc<dyn DescriptionSource> = match from_file {
                Some(path) => Arc::new(FileDescriptionSource::new(path)),
                None => {
                    match HttpDescriptionSource::new(&config.sync.swagger_url, config.sync.timeout) {
                        Ok(source) => Arc::new(source),
                        Err(e) => {
                            eprintln!("❌ {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                }
            };
            run_sync(&config, source, add_missing || config.sync.add_missing).await
        }
        Command::List {
            method,
            category,
            search,
            details,
        } => {
            let args = json!({
                "methodFilter": method,
                "categoryFilter": category,
                "searchTerm": search,
                "includeDetails": details,
            });
            run_list(&config, &args).await
        }
        Command::Execute {
            path,
            method,
            params,
            no_validate,
        } => {
            let parameters: Value = match serde_json::from_str(&params) {
                Ok(value) => value,
                Err(e) => {
                    eprintln!("❌ --params is not valid JSON: {e}");
                    return ExitCode::FAILURE;
                }
            };
            let args = json!({
                "path": path,
                "method": method,
                "parameters": parameters,
                "validate": !no_validate,
            });
            run_execute(&config, &args).await
        }
        Command::Tools => print_json(&tools::describe_tools()),
    }
}

/// Run one sync pass and print its report
async fn run_sync(config: &Config, source: Arc<dyn DescriptionSource>, add_missing: bool) -> ExitCode {
    let store = ToolDefinitionStore::from_config(&config.catalog);
    info!(
        directory = %store.directory().display(),
        source = %source.location(),
        add_missing,
        "Running sync"
    );

    let report = SyncEngine::new(store, source)
        .with_options(SyncOptions { add_missing })
        .run()
        .await;

    let status = print_json(&report);
    if report.is_success() {
        status
    } else {
        ExitCode::FAILURE
    }
}

/// List catalog endpoints
async fn run_list(config: &Config, args: &Value) -> ExitCode {
    let store = ToolDefinitionStore::from_config(&config.catalog);
    let handle = match CatalogHandle::load(&store).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to load catalog");
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let output = tools::handle_list_endpoints(&handle.snapshot(), args);
    let status = print_json(&output);
    if output["success"].as_bool().unwrap_or(false) {
        status
    } else {
        ExitCode::FAILURE
    }
}

/// Execute one endpoint
async fn run_execute(config: &Config, args: &Value) -> ExitCode {
    let store = ToolDefinitionStore::from_config(&config.catalog);
    let handle = match CatalogHandle::load(&store).await {
        Ok(handle) => Arc::new(handle),
        Err(e) => {
            error!(error = %e, "Failed to load catalog");
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let transport = match HttpTransport::from_config(&config.api) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let executor =
        EndpointExecutor::new(handle, transport).with_timeout(config.api.request_timeout);
    let result = tools::handle_execute_endpoint(&executor, args).await;

    let status = print_json(&result);
    if result.is_error {
        ExitCode::FAILURE
    } else {
        status
    }
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Failed to serialize to JSON: {e}");
            ExitCode::FAILURE
        }
    }
}
