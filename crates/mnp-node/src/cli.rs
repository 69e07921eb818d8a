use std::path::PathBuf;

use clap::Parser;
use mnp_core::Network;

#[derive(Debug, Parser)]
#[command(name = "mnp-node", about = "Masternode/infinitynode payment subsystem daemon")]
pub struct Cli {
    /// JSON-RPC URL of the chain source this daemon scans.
    #[arg(long, env = "MNP_RPC_URL")]
    pub rpc_url: String,

    #[arg(long, env = "MNP_RPC_USER")]
    pub rpc_user: String,

    #[arg(long, env = "MNP_RPC_PASS")]
    pub rpc_pass: String,

    #[arg(long, env = "MNP_NETWORK", value_enum, default_value = "regtest")]
    pub network: NetworkArg,

    /// Directory holding infinitynode.dat / infinitynodersv.dat.
    #[arg(long, env = "MNP_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Seconds between scan passes once caught up to tip.
    #[arg(long, env = "MNP_SCAN_INTERVAL_SECS", default_value_t = 15)]
    pub scan_interval_secs: u64,

    /// Seconds between vote-store housekeeping (`check_and_remove`) passes.
    #[arg(long, env = "MNP_VOTE_HOUSEKEEPING_SECS", default_value_t = 300)]
    pub vote_housekeeping_secs: u64,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum NetworkArg {
    Mainnet,
    Testnet,
    Finalnet,
    Regtest,
}

impl From<NetworkArg> for Network {
    fn from(value: NetworkArg) -> Self {
        match value {
            NetworkArg::Mainnet => Network::Mainnet,
            NetworkArg::Testnet => Network::Testnet,
            NetworkArg::Finalnet => Network::Finalnet,
            NetworkArg::Regtest => Network::Regtest,
        }
    }
}
