use {
    rollinglog::{RollingFileAppenderBuilder, RotationSize},
    std::time::Instant,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("./logs")?;
    let start = Instant::now();
    let appender = RollingFileAppenderBuilder::new("./logs/sized", "log")
        .max_file_size(RotationSize::MB(1)) // Rotate at 1MB
        .max_files(5) // sized.log plus sized.1.log .. sized.4.log
        .file_mode(0o640) // Set file permissions to: owner rw, group r, others none
        .build();

    // Simulate writing logs that will trigger size-based rotation
    for i in 1..=50_000 {
        appender.log(&format!(
            "Log entry #{}: This is a sample log message that will contribute to file size",
            i
        ))?;
    }
    appender.close()?;
    println!("Done logging: {:?}", start.elapsed());

    for slot in 0..appender.max_files() {
        let path = appender.slot_file_path(slot);
        let size = std::fs::metadata(&path).map_or(0, |m| m.len());
        println!("{} : {} Bytes", path.display(), size);
    }
    Ok(())
}
