// The global subscriber can be installed once per process, so this file
// holds a single test.

#[test]
fn file_logging_respects_level() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("reflex.log");

    reflex::logging::init(false, Some(&path)).unwrap();
    tracing::info!("run started with {} shapes", 3);
    tracing::debug!("not at info level");

    // a second init is a no-op rather than an error
    reflex::logging::init(true, None).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("run started with 3 shapes"));
    assert!(!text.contains("not at info level"));
    assert!(!text.contains('\u{1b}'), "file output has no colour codes");
}
