use rollinglog::{BranchingAppender, Registry, RollingFileAppender, SimpleFormat, StdoutAppender};
use std::sync::Arc;

/// Send the same lines to the console and to a rolling file.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("./logs")?;
    let file = Arc::new(RollingFileAppender::new("./logs/branching", "log", 64 * 1024, 4));
    let appender = BranchingAppender::new().branch(StdoutAppender).branch(file.clone());

    let registry = Registry::new();
    let logger = registry.configure_logger("app", false, vec!["app".into()], SimpleFormat, appender);
    logger.enable_debug_mode_for("cache");

    logger.print("starting up")?;
    logger.tag_debug(&["cache"], "warming cache")?;
    logger.tag_debug(&["db"], "not shown, debug is off for db")?;
    registry.default_logger().print("the default logger writes to stderr")?;

    file.close()?;
    Ok(())
}
