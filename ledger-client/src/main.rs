use ledger_client::{ChaincodeCall, Gateway, GatewayConfig, Identity};
use ledger_common::{SubmissionError, TransactionId};
use ledger_network::MemoryNetwork;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{command, value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{info, LevelFilter};
use serde::Serialize;
use serde_json::{json, Value};
use simple_logger::SimpleLogger;

fn cli() -> Command {
    let call_args = [
        Arg::new("function")
            .long("function")
            .short('f')
            .required(true)
            .help("Chaincode function to call"),
        Arg::new("args")
            .long("args")
            .short('a')
            .default_value("{}")
            .help("Function arguments as a JSON document"),
        Arg::new("peer")
            .long("peer")
            .short('p')
            .action(ArgAction::Append)
            .help("Target peer, repeatable. Defaults to every peer of the channel"),
        Arg::new("chaincode")
            .long("chaincode")
            .default_value("ngo")
            .help("Chaincode name"),
        Arg::new("user")
            .long("user")
            .short('u')
            .default_value("admin")
            .help("Enrolled user to act as"),
    ];
    let user = Arg::new("user")
        .long("user")
        .short('u')
        .default_value("admin")
        .help("Enrolled user to act as");
    let ledger_peer = Arg::new("peer")
        .long("peer")
        .short('p')
        .required(true)
        .help("Peer that answers the ledger query");
    let ledger_command = |name: &'static str, about: &'static str| {
        Command::new(name)
            .about(about)
            .arg(ledger_peer.clone())
            .arg(user.clone())
    };
    command!()
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_parser(value_parser!(PathBuf))
                .help("Path to client_config.yaml. Defaults to the one next to the executable"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("invoke")
                .about("Submit a transaction and wait for it to commit")
                .args(call_args.clone()),
        )
        .subcommand(
            Command::new("query")
                .about("Evaluate a read-only chaincode function")
                .args(call_args),
        )
        .subcommand(
            ledger_command("block", "Fetch a block by number").arg(
                Arg::new("number")
                    .long("number")
                    .short('n')
                    .required(true)
                    .value_parser(value_parser!(u64))
                    .help("Block number"),
            ),
        )
        .subcommand(
            ledger_command("transaction", "Fetch a committed transaction by id").arg(
                Arg::new("id")
                    .long("id")
                    .required(true)
                    .help("Transaction id"),
            ),
        )
        .subcommand(ledger_command("channel-info", "Height and latest block hashes of the channel"))
        .subcommand(ledger_command("instantiated", "Chaincodes instantiated on the channel"))
        .subcommand(ledger_command("channels", "Channels the peer has joined"))
        .subcommand(ledger_command("installed", "Chaincodes installed on the peer"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    let matches = cli().get_matches();
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => GatewayConfig::from_path(path)?,
        None => GatewayConfig::new()?,
    };
    let network_config = config.network.clone().unwrap_or_default();
    let network = MemoryNetwork::spawn(network_config.clone());
    let gateway = Gateway::new(network.provider(), config);

    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("no subcommand given"))?;
    let channel = network_config.channel.as_str();
    let identity = Identity::new(
        network_config.org.as_str(),
        sub.get_one::<String>("user")
            .map(String::as_str)
            .unwrap_or("admin"),
    );
    let peer = sub
        .get_one::<String>("peer")
        .map(String::as_str)
        .unwrap_or_default();

    let output = match name {
        "invoke" => {
            let call = chaincode_call(sub, channel)?;
            let result = gateway.submit_transaction(&call, &identity).await;
            info!("{}", result.describe());
            serde_json::to_value(&result)?
        }
        "query" => {
            let call = chaincode_call(sub, channel)?;
            match gateway.query_chaincode(&call, &identity).await {
                Ok(values) => Value::Array(values),
                Err(err) => json!({ "error": err.to_string() }),
            }
        }
        "block" => {
            let number = sub
                .get_one::<u64>("number")
                .copied()
                .ok_or_else(|| anyhow!("--number is required"))?;
            render(gateway.get_block_by_number(peer, channel, number, &identity).await)?
        }
        "transaction" => {
            let tx_id = sub
                .get_one::<String>("id")
                .map(|id| TransactionId::from(id.as_str()))
                .ok_or_else(|| anyhow!("--id is required"))?;
            render(gateway.get_transaction_by_id(peer, channel, &tx_id, &identity).await)?
        }
        "channel-info" => render(gateway.query_channel_info(peer, channel, &identity).await)?,
        "instantiated" => {
            render(gateway.get_instantiated_chaincodes(peer, channel, &identity).await)?
        }
        "channels" => render(gateway.get_channels_for_peer(peer, &identity).await)?,
        "installed" => render(gateway.get_chaincodes_for_peer(peer, &identity).await)?,
        other => return Err(anyhow!("unknown subcommand {other}")),
    };
    gateway.close().await;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn render<T: Serialize>(answer: Result<T, SubmissionError>) -> Result<Value> {
    Ok(match answer {
        Ok(value) => serde_json::to_value(value)?,
        Err(err) => json!({ "error": err.to_string() }),
    })
}

fn chaincode_call(matches: &ArgMatches, channel: &str) -> Result<ChaincodeCall> {
    let function = matches
        .get_one::<String>("function")
        .ok_or_else(|| anyhow!("--function is required"))?;
    let args = matches
        .get_one::<String>("args")
        .map(|raw| serde_json::from_str::<Value>(raw))
        .transpose()?
        .unwrap_or(Value::Null);
    let peers = matches
        .get_many::<String>("peer")
        .map(|peers| peers.cloned().collect())
        .unwrap_or_default();
    let chaincode = matches
        .get_one::<String>("chaincode")
        .ok_or_else(|| anyhow!("--chaincode is required"))?;
    Ok(ChaincodeCall {
        peers,
        channel: channel.to_string(),
        chaincode: chaincode.clone(),
        function: function.clone(),
        args,
    })
}
