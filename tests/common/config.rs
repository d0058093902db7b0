//! Test configuration helpers

use mirror_dl::Config;
use std::path::Path;
use std::time::Duration;

/// Default time a scenario waits for any single transition
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Config rooted in `root` with every delay shortened
pub fn scenario_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.error_cleanup_delay = Duration::from_millis(10);
    config.download.message_page_delay = Duration::from_millis(1);
    config.download.status_update_interval = Duration::from_secs(3600);
    config
}
