use clap::{Parser, Subcommand};
use serde_json::Value;

use service_registry::registry::{
    QueryStatusListReq, QueryStatusReq, ServiceStatus, State, INFO_CHANNEL, QUERY_STATUS,
    QUERY_STATUS_LIST, STATUS_CHANNEL,
};
use service_registry::transport::{RpcRequest, RpcResponse};

#[derive(Parser)]
#[command(name = "registry-cli")]
#[command(about = "Query and feed a running service registry", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:7070")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one service's status
    Status { name: String },
    /// List services, optionally only the named ones
    List { names: Vec<String> },
    /// Send a heartbeat report
    Report {
        name: String,
        /// starting, online, offline, stopping or stopped
        #[arg(short, long, default_value = "online")]
        state: State,
        #[arg(short, long)]
        ready: bool,
        #[arg(short, long, default_value_t = 0)]
        domain: i32,
        /// Heartbeat interval in seconds; 0 keeps the registry's value
        #[arg(long, default_value_t = 0)]
        interval: u32,
        /// Missed heartbeats tolerated; 0 keeps the registry's value
        #[arg(long, default_value_t = 0)]
        failures: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status { name } => {
            let request = RpcRequest::new(QUERY_STATUS, &QueryStatusReq { name }, 1)?;
            call(&client, &cli.url, &request).await?;
        }
        Commands::List { names } => {
            let observed = (!names.is_empty()).then_some(names);
            let request = RpcRequest::new(QUERY_STATUS_LIST, &QueryStatusListReq { observed }, 1)?;
            call(&client, &cli.url, &request).await?;
        }
        Commands::Report {
            name,
            state,
            ready,
            domain,
            interval,
            failures,
        } => {
            let status = ServiceStatus::new(name, state)
                .with_ready(ready)
                .with_domain(domain)
                .with_check_interval(interval)
                .with_allow_failures(failures);

            let res = client
                .post(format!("{}/bus/{}", cli.url, STATUS_CHANNEL))
                .json(&status)
                .send()
                .await?;
            if res.status().is_success() {
                println!("reported {} as {}", status.name, status.state);
            } else {
                eprintln!("Error: registry returned status {}", res.status());
            }
        }
    }

    Ok(())
}

async fn call(
    client: &reqwest::Client,
    url: &str,
    request: &RpcRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let res = client
        .post(format!("{}/rpc/{}", url, INFO_CHANNEL))
        .json(request)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: registry returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let response: RpcResponse = res.json().await?;
    match response.into_result() {
        Ok(result) => print_json(&result)?,
        Err(e) => eprintln!("Error {}: {}", e.code, e.message),
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
