use rollinglog::{AppendError, FullFormat, Logger, StdoutAppender, TestInjector};
use std::sync::Arc;

/// Fail a step of some work by reacting to the log line written just before it.
fn main() {
    let injector = Arc::new(TestInjector::new(StdoutAppender));
    let logger = Logger::new();
    logger.configure(FullFormat, injector.clone());

    injector.add("connect", || Err(AppendError::Injected("connection refused".into())));

    for step in ["resolve", "connect", "handshake"] {
        match logger.tag_print(&["client", step], format_args!("running {step}")) {
            Ok(()) => println!("{step}: ok"),
            Err(err) => println!("{step}: {err}"),
        }
    }
}
