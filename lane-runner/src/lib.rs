pub mod environment;
pub mod stats;
pub mod trainer;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    use log::LevelFilter;
    let _ = env_logger::builder()
        .format_timestamp_secs()
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .is_test(true)
        .try_init();
}
