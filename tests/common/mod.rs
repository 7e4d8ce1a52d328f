//! Common test utilities for filedrop integration tests

use filedrop::{Config, FileHost, JobMessage, NoSwarmEngine, SwarmEngine};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Config rooted in a scratch directory, with fast progress sampling
#[allow(dead_code)]
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.publish_dir = root.join("files");
    config.storage.swarm_work_dir = root.join("torrent_tmp");
    config.storage.id_log_path = root.join("ids");
    config.jobs.progress_interval_ms = 10;
    config
}

/// Host with the stub swarm engine
#[allow(dead_code)]
pub async fn url_only_host(root: &Path) -> Arc<FileHost> {
    host_with_engine(test_config(root), Arc::new(NoSwarmEngine)).await
}

/// Host driving `engine`
#[allow(dead_code)]
pub async fn host_with_engine(config: Config, engine: Arc<dyn SwarmEngine>) -> Arc<FileHost> {
    Arc::new(
        FileHost::with_engine(config, engine)
            .await
            .expect("host starts"),
    )
}

/// Receive messages until every tag in `tags` has produced its terminal message
#[allow(dead_code)]
pub async fn collect_until_done(
    rx: &mut mpsc::UnboundedReceiver<JobMessage>,
    tags: &[i64],
) -> Vec<JobMessage> {
    let mut messages = Vec::new();
    let mut remaining = tags.to_vec();
    while !remaining.is_empty() {
        let msg = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("job finished in time")
            .expect("outbound queue open");
        if msg.is_terminal() {
            remaining.retain(|t| *t != msg.tag());
        }
        messages.push(msg);
    }
    messages
}
