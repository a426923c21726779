use herald_logger::{LevelFilter, Logger};

#[test]
fn console_only_has_no_file_sink() {
    let logger = Logger::builder()
        .name("herald-console")
        .env_filter("herald_dispatcher=trace,warn")
        .level(LevelFilter::ERROR)
        .init()
        .expect("console logger initializes");

    assert!(!logger.has_file_sink());
    tracing::warn!("console only");
}
