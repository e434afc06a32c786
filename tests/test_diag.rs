use lumoport::diag::has_diagnostic_sink;
use lumoport::{rename, set_diagnostic_sink, ErrorKind, FaultOp, FileHandle, MemFs, OpenFlags};
use parking_lot::Mutex;
use tempfile::TempDir;

static MESSAGES: Mutex<Vec<String>> = parking_lot::const_mutex(Vec::new());

fn drain() -> Vec<String> {
    std::mem::take(&mut *MESSAGES.lock())
}

// The sink is process-wide and one-shot, so everything runs in one test
#[test]
fn test_diagnostics_reach_injected_sink() {
    assert!(!has_diagnostic_sink());
    set_diagnostic_sink(Box::new(|msg: &str| MESSAGES.lock().push(msg.to_string()))).unwrap();
    assert!(has_diagnostic_sink());

    let err = set_diagnostic_sink(Box::new(|_: &str| {})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);

    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.db");
    let target = dir.path().join("target.db");

    // Failed rename reports unless silent
    rename(&missing, &target, true).unwrap_err();
    assert!(drain().is_empty());
    rename(&missing, &target, false).unwrap_err();
    let msgs = drain();
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].contains("missing.db"), "{:?}", msgs);

    // Double close is reported as an assertion
    let mut h = FileHandle::open(&target, OpenFlags::READ_WRITE | OpenFlags::CREATE, 0o644).unwrap();
    h.close().unwrap();
    assert!(drain().is_empty());
    h.close().unwrap_err();
    let msgs = drain();
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].contains("assertion failed"), "{:?}", msgs);

    // Failed sync reports, then every use of the poisoned handle does
    let fs = MemFs::default();
    let mut h = fs.open("/data.db", OpenFlags::READ_WRITE | OpenFlags::CREATE, 0o644).unwrap();
    fs.inject_fault(FaultOp::Sync, ErrorKind::IoError);
    h.sync().unwrap_err();
    assert_eq!(drain().len(), 1);
    h.pwrite(b"x", 0).unwrap_err();
    let msgs = drain();
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].contains("poisoned"), "{:?}", msgs);
    h.close().unwrap_err();
    assert_eq!(drain().len(), 1);

    fs.rename("/nope", "/other", false).unwrap_err();
    assert_eq!(drain().len(), 1);
    fs.rename("/nope", "/other", true).unwrap_err();
    assert!(drain().is_empty());
}
