/*!
Helpers communs aux tests utilisant la devkit.
*/

/// Init logging pour tests (idempotent, sortie capturée par le harness).
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
