// SPDX-License-Identifier: MIT OR Apache-2.0

//! Example: resilience features around a `Transport`
//!
//! This example demonstrates the ambient, opt-in resilience and observability
//! utilities that sit alongside (not inside) the pipeline's own node-level
//! failover:
//! - A virtualized cluster standing in for real nodes, so this example needs
//!   no network access
//! - A whole-transport circuit breaker
//! - A retry policy with exponential backoff
//! - Request logging with metrics

use std::sync::Arc;
use std::time::Duration;

use elastic_transport_rs::config::Configuration;
use elastic_transport_rs::runtime::{
    CircuitBreaker, CircuitBreakerConfig, ExponentialBackoff, LoggingConfig, RequestLogger,
    RetryConfig,
};
use elastic_transport_rs::testkit::{Rule, VirtualCluster};
use elastic_transport_rs::transport::Transport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // ==========================================================================
    // 1. A virtualized two-node cluster: the first node answers once with a
    //    503, then every later call (on any node) succeeds. The pipeline's
    //    own failover is what turns that into a transparent success.
    // ==========================================================================
    println!("=== Virtualized Cluster ===");

    let cluster = Arc::new(VirtualCluster::new(vec![
        Rule::client_call().times(1).fails(503),
        Rule::client_call(),
    ]));

    // ==========================================================================
    // 2. Circuit Breaker
    // ==========================================================================
    println!("\n=== Circuit Breaker ===");

    let cb_config = CircuitBreakerConfig::new()
        .with_failure_threshold(5)
        .with_success_threshold(2)
        .with_reset_timeout(Duration::from_secs(30));
    let circuit_breaker = CircuitBreaker::new(cb_config);
    println!("Initial state: {:?}", circuit_breaker.state().await);

    // ==========================================================================
    // 3. Retry Configuration
    // ==========================================================================
    println!("\n=== Retry Configuration ===");

    let retry_config = RetryConfig::builder()
        .max_retries(3)
        .backoff(ExponentialBackoff::new(Duration::from_millis(50)).with_max_delay(Duration::from_secs(2)))
        .build();
    println!("Max retries: {}", retry_config.max_retries);

    // ==========================================================================
    // 4. Request Logging
    // ==========================================================================
    println!("\n=== Request Logging ===");

    let logger = RequestLogger::with_config(LoggingConfig::verbose());

    // ==========================================================================
    // 5. Putting it together: a transport over the virtualized cluster,
    //    wrapped in the circuit breaker and instrumented with the logger.
    // ==========================================================================
    println!("\n=== Resilient Call ===");

    let config = Configuration::new().with_throw_exceptions(true);
    let transport = Transport::with_registration_and_invoker(
        config,
        Arc::new(elastic_transport_rs::pool::StaticNodePool::new(vec![
            Arc::new(elastic_transport_rs::node::Node::new(
                elastic_transport_rs::node::NodeUri::parse("http://node-a:9200")?,
            )),
            Arc::new(elastic_transport_rs::node::Node::new(
                elastic_transport_rs::node::NodeUri::parse("http://node-b:9200")?,
            )),
        ])),
        Arc::new(elastic_transport_rs::product::ElasticsearchRegistration),
        cluster,
    );

    let span = logger.start("GET /_cluster/health");
    let result = circuit_breaker
        .call(|| async { transport.get::<serde_json::Value>("/_cluster/health").await })
        .await;

    match result {
        Ok(response) => {
            logger.finish_success(span);
            println!(
                "Success after failover: status={:?}, is_success={}",
                response.details.http_status_code,
                response.is_success()
            );
        }
        Err(e) => {
            logger.finish_error(span, &e.to_string());
            println!("Failed: {e}");
        }
    }

    // retry_config itself is not exercised above (a cluster-exhausted error
    // is terminal, not something worth retrying); it remains available for
    // callers retrying a whole `Transport::request` call after a transient
    // per-call failure, e.g. a DNS hiccup before any node was even reached.
    let _ = &retry_config;

    println!(
        "\nRequests logged: {}, success rate: {:.1}%",
        logger.metrics().total_requests(),
        logger.metrics().success_rate() * 100.0
    );

    Ok(())
}
