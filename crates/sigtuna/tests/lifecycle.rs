//! Init/shutdown bracketing of the process-wide state.

use sigtuna::{init, Error, InitOptions};

#[test]
fn test_lifecycle() {
    let rt = init(InitOptions::new()).unwrap();
    assert!(matches!(init(InitOptions::new()), Err(Error::AlreadyInitialized)));
    assert!(rt.parse(b"<a/>").is_some());
    rt.shutdown().unwrap();

    assert!(matches!(init(InitOptions::new()), Err(Error::ShutDown)));
}
