mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mnp_core::chain_source::http_adapter::HttpChainSource;
use mnp_core::persistence::{self, InfinityNodeSnapshot};
use mnp_core::{ChainParams, ChainSource, Node};
use tracing_subscriber::EnvFilter;

use cli::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_file(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    let chain_source: Arc<dyn ChainSource> =
        Arc::new(HttpChainSource::new(cli.rpc_url.clone(), cli.rpc_user.clone(), cli.rpc_pass.clone()));

    let tip = chain_source.get_tip().await.map_err(|e| {
        tracing::error!(error = %e, url = %cli.rpc_url, "failed to reach chain source");
        e
    })?;
    tracing::info!(height = tip.height, hash = %tip.hash, "connected to chain source");

    let params = ChainParams::for_network(cli.network.into());
    let node = Node::new(chain_source, params);

    std::fs::create_dir_all(&cli.data_dir)?;
    let snapshot_path = cli.data_dir.join("infinitynode.dat");
    if snapshot_path.exists() {
        match persistence::load_infinitynode_snapshot(&snapshot_path) {
            Ok(snapshot) => restore_snapshot(&node, snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "snapshot invalid, rebuilding from chain");
            }
        }
    }

    let mut shutdown = Box::pin(tokio::signal::ctrl_c());
    let mut scan_ticker = tokio::time::interval(Duration::from_secs(cli.scan_interval_secs));
    let mut housekeeping_ticker = tokio::time::interval(Duration::from_secs(cli.vote_housekeeping_secs));

    loop {
        tokio::select! {
            _ = scan_ticker.tick() => {
                match node.chain.get_tip().await {
                    Ok(tip) => {
                        if let Err(e) = node.scan_and_absorb(tip.height).await {
                            tracing::warn!(error = %e, "scan pass failed, will retry next tick");
                        } else {
                            tracing::debug!(height = tip.height, last_scan_height = node.last_scan_height(), "scan pass complete");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to fetch tip"),
                }
            }
            _ = housekeeping_ticker.tick() => {
                if let Ok(tip) = node.chain.get_tip().await {
                    node.check_and_remove_votes(tip.height);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, persisting snapshot");
                if let Err(e) = persist_snapshot(&node, &snapshot_path) {
                    tracing::error!(error = %e, "failed to persist snapshot on shutdown");
                }
                break;
            }
        }
    }

    Ok(())
}

fn restore_snapshot(node: &Node, snapshot: InfinityNodeSnapshot) {
    for (_, infinity_node) in snapshot.matured {
        node.registry.add(infinity_node, snapshot.last_scan_height);
    }
    for (script_bytes, height) in snapshot.last_paid {
        node.registry.update_last_paid(bitcoin::ScriptBuf::from_bytes(script_bytes), height);
    }
    let [t1, t5, t10] = snapshot.statements;
    node.statements.restore_map(mnp_core::Tier::T1, t1);
    node.statements.restore_map(mnp_core::Tier::T5, t5);
    node.statements.restore_map(mnp_core::Tier::T10, t10);

    for (tier, height, size) in persistence::tiers_from_counters(snapshot.statement_counters) {
        tracing::debug!(?tier, last_stm_height = height, last_stm_size = size, "restored statement counter");
    }

    tracing::info!(last_scan_height = snapshot.last_scan_height, "restored registry snapshot");
}

fn persist_snapshot(node: &Node, path: &std::path::Path) -> Result<(), mnp_core::error::CoreError> {
    let matured: Vec<_> = node.registry.full_map().into_iter().collect();
    let last_paid: Vec<_> = node
        .registry
        .last_paid_snapshot()
        .into_iter()
        .map(|(script, height)| (script.to_bytes(), height))
        .collect();

    let tier_maps = [
        node.statements.map_for(mnp_core::Tier::T1),
        node.statements.map_for(mnp_core::Tier::T5),
        node.statements.map_for(mnp_core::Tier::T10),
    ];
    let last_entries = [
        tier_maps[0].iter().next_back().map(|(&h, &s)| (h, s)).unwrap_or((0, 0)),
        tier_maps[1].iter().next_back().map(|(&h, &s)| (h, s)).unwrap_or((0, 0)),
        tier_maps[2].iter().next_back().map(|(&h, &s)| (h, s)).unwrap_or((0, 0)),
    ];

    let snapshot = InfinityNodeSnapshot {
        matured,
        last_paid,
        last_scan_height: node.last_scan_height(),
        statements: tier_maps,
        statement_counters: persistence::counters_from_tiers(last_entries),
    };

    persistence::save_infinitynode_snapshot(path, node.params.network.label(), &snapshot)
        .map_err(mnp_core::error::CoreError::Persistence)
}
