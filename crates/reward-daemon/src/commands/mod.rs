//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category.

pub mod reports;
pub mod status;

#[cfg(test)]
pub(crate) fn test_state() -> std::sync::Arc<crate::DaemonState> {
    let mut config = crate::config::DaemonConfig::default();
    config.chain.sender_address = "n1rewarder".to_string();
    config.chain.mixnet_contract_address = "n1mixnet".to_string();

    let conn = reward_db::open_memory().expect("open db");
    std::sync::Arc::new(crate::DaemonState {
        db: std::sync::Arc::new(tokio::sync::Mutex::new(conn)),
        config,
        started_at: std::time::SystemTime::now(),
    })
}
