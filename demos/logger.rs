use rollinglog::{FullFormat, Logger, RollingFileAppenderBuilder, RotationSize};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("./logs")?;
    let appender = Arc::new(
        RollingFileAppenderBuilder::new("./logs/logger", "log")
            .max_file_size(RotationSize::KB(256))
            .max_files(3)
            .build(),
    );

    let logger = Logger::new();
    logger.configure(FullFormat, appender.clone());
    logger.print("This is an info message")?;
    logger.tag_print(&["startup"], "This is a tagged message")?;
    logger.debug("This is a debug message, hidden until debug mode is on")?;

    appender.close()?;
    Ok(())
}
