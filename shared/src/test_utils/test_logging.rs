use std::sync::Once;

static INIT: Once = Once::new();

/// Routes `log` output through the test harness. Safe to call from every test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .is_test(true)
            .try_init();
    });
}
