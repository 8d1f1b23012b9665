// SPDX-License-Identifier: MIT OR Apache-2.0

//! Example: calling a cluster through a `Transport`
//!
//! This example shows how to:
//! - Build a node pool from one or more seed nodes
//! - Issue a GET request and read the typed body
//! - Handle a connection failure without panicking

use elastic_transport_rs::config::Configuration;
use elastic_transport_rs::node::{Node, NodeUri};
use elastic_transport_rs::pool::SniffingNodePool;
use elastic_transport_rs::response::ResponseBody;
use elastic_transport_rs::transport::Transport;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let node = Arc::new(Node::new(NodeUri::parse("http://127.0.0.1:9200")?));
    let pool = Arc::new(SniffingNodePool::new(vec![node]));

    let config = Configuration::new().with_max_retries(2);
    let transport = Transport::new(config, pool);

    println!("--- Cluster health ---");
    match transport.get::<serde_json::Value>("/_cluster/health").await {
        Ok(response) => match response.body {
            ResponseBody::Typed(value) => println!("{value:#}"),
            _ => println!("(empty body, status {:?})", response.details.http_status_code),
        },
        Err(e) => eprintln!("cluster call failed: {e}"),
    }

    Ok(())
}
