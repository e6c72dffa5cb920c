// tests/logging_filter.rs

use tracing_subscriber::filter::LevelFilter;

use swupdd::cli::LogLevel;
use swupdd::logging::build_filter;

#[test]
fn cli_level_maps_onto_tracing_levels() {
    assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
    assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
    assert_eq!(LevelFilter::from(LogLevel::Info), LevelFilter::INFO);
    assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
    assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
}

#[test]
fn explicit_level_sets_the_filter_ceiling() {
    assert_eq!(
        build_filter(Some(LogLevel::Debug)).max_level_hint(),
        Some(LevelFilter::DEBUG)
    );
    assert_eq!(
        build_filter(Some(LogLevel::Warn)).max_level_hint(),
        Some(LevelFilter::WARN)
    );
}
