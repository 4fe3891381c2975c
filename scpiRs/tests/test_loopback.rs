//! Test cases for the loopback session and resource manager.

use std::time::Duration;

use rstest::*;

use scpirs::{
    ErrorKind, LoopbackDevice, LoopbackResourceManager, LoopbackSession, ResourceManager,
    ScpiError, Session,
};

/// A function that creates a new `LoopbackSession` with the given input and output vectors.
fn crt_lbk(from_host: Vec<&str>, from_inst: Vec<&str>) -> LoopbackSession {
    LoopbackSession::new(LoopbackDevice::new(from_host, from_inst))
}

/// Create a loopback session that contains no commands.
#[fixture]
fn emp_lbk() -> LoopbackSession {
    crt_lbk(vec![], vec![])
}

/// Ensure `finalize` method passes if an empty loopback session is used.
#[rstest]
fn finalize_test(mut emp_lbk: LoopbackSession) {
    emp_lbk.finalize();
}

/// Ensure the session panics on drop if commands are left in it.
#[rstest]
#[case(vec!["cmd"], vec![])]
#[case(vec![], vec!["resp"])]
#[case(vec!["cmd"], vec!["resp"])]
#[should_panic]
fn finalize_test_panic(#[case] from_host: Vec<&str>, #[case] from_inst: Vec<&str>) {
    let _ = crt_lbk(from_host, from_inst);
}

#[rstest]
fn write() {
    let mut lbk = crt_lbk(vec!["cmd1", "cmd2"], vec![]);
    lbk.write("cmd1").unwrap();
    lbk.write("cmd2").unwrap();
}

#[rstest]
#[should_panic]
fn write_mismatch() {
    let mut lbk = crt_lbk(vec!["cmd1"], vec![]);
    let _ = lbk.write("cmd3");
}

#[rstest]
#[should_panic]
fn write_unexpected() {
    let mut lbk = crt_lbk(vec![], vec![]);
    let _ = lbk.write("cmd");
}

#[rstest]
fn terminator(mut emp_lbk: LoopbackSession) {
    assert_eq!("\n", emp_lbk.get_terminator());
    emp_lbk.set_terminator("\r\n");
    assert_eq!("\r\n", emp_lbk.get_terminator());
}

/// The terminator set on the session must match the one the device expects.
#[rstest]
fn terminator_expected() {
    let dev = LoopbackDevice::new(vec!["cmd"], vec!["resp"]).with_terminator("\r\n");
    let mut lbk = LoopbackSession::new(dev);
    lbk.set_terminator("\r\n");
    assert_eq!("resp", lbk.query("cmd").unwrap());
}

#[rstest]
#[should_panic]
fn terminator_wrong() {
    let dev = LoopbackDevice::new(vec!["cmd"], vec![]).with_terminator("\r\n");
    let mut lbk = LoopbackSession::new(dev);
    let _ = lbk.write("cmd");
}

#[rstest]
fn query() {
    let mut lbk = crt_lbk(vec!["cmd1", "cmd2"], vec!["resp1", "resp2"]);
    let resp1 = lbk.query("cmd1").unwrap();
    assert_eq!(resp1, "resp1");
    let resp2 = lbk.query("cmd2").unwrap();
    assert_eq!(resp2, "resp2");
}

/// Running out of replies looks like an instrument that does not answer.
#[rstest]
fn read_exhausted_times_out(mut emp_lbk: LoopbackSession) {
    emp_lbk.set_timeout(Duration::from_millis(250)).unwrap();
    match emp_lbk.read() {
        Err(ScpiError::Timeout(timeout)) => assert_eq!(Duration::from_millis(250), timeout),
        other => panic!("Expected timeout, got {other:?}"),
    }
}

#[rstest]
#[case(ErrorKind::Timeout)]
#[case(ErrorKind::InvalidSession)]
#[case(ErrorKind::Io)]
fn scripted_read_failure(#[case] kind: ErrorKind) {
    let dev = LoopbackDevice::new(vec![], vec!["first"]).then_fail(kind);
    let mut lbk = LoopbackSession::new(dev);
    assert_eq!("first", lbk.read().unwrap());
    assert_eq!(kind, lbk.read().unwrap_err().kind());
}

#[rstest]
fn scripted_write_failure() {
    let dev = LoopbackDevice::new(vec!["ok"], vec![]).then_fail_write(ErrorKind::Io);
    let mut lbk = LoopbackSession::new(dev);
    lbk.write("ok").unwrap();
    assert_eq!(ErrorKind::Io, lbk.write("fails").unwrap_err().kind());
}

#[rstest]
fn manager_lists_in_registration_order() {
    let mgr = LoopbackResourceManager::new()
        .with_device("GPIB0::1::INSTR", LoopbackDevice::new(vec![], vec![]))
        .with_device("ASRL1::INSTR", LoopbackDevice::new(vec![], vec![]))
        .with_device("GPIB0::1::INSTR", LoopbackDevice::new(vec![], vec![]));
    assert_eq!(
        vec!["GPIB0::1::INSTR".to_string(), "ASRL1::INSTR".to_string()],
        mgr.list_resources().unwrap()
    );
    for addr in ["GPIB0::1::INSTR", "ASRL1::INSTR", "GPIB0::1::INSTR"] {
        let _ = mgr.open(addr).unwrap();
    }
}

#[rstest]
fn manager_enumeration_error() {
    let mgr = LoopbackResourceManager::new().with_enumeration_error(ErrorKind::Io);
    assert_eq!(ErrorKind::Io, mgr.list_resources().unwrap_err().kind());
}

#[rstest]
fn manager_unknown_resource() {
    let mgr = LoopbackResourceManager::new();
    let err = mgr.open("GPIB0::2::INSTR").err().unwrap();
    assert_eq!(ErrorKind::ResourceNotFound, err.kind());
}

#[rstest]
fn manager_unreachable_device() {
    let mgr = LoopbackResourceManager::new().with_device(
        "GPIB0::2::INSTR",
        LoopbackDevice::unreachable(ErrorKind::Timeout),
    );
    let err = mgr.open("GPIB0::2::INSTR").err().unwrap();
    assert_eq!(ErrorKind::Timeout, err.kind());
    assert_eq!(0, mgr.opened_total());
}

#[rstest]
fn manager_tracks_sessions() {
    let mgr = LoopbackResourceManager::new()
        .with_device("ASRL1::INSTR", LoopbackDevice::new(vec![], vec![]))
        .with_device("ASRL1::INSTR", LoopbackDevice::new(vec![], vec![]));
    {
        let mut first = mgr.open("ASRL1::INSTR").unwrap();
        first.set_timeout(Duration::from_millis(1234)).unwrap();
        let _second = mgr.open("ASRL1::INSTR").unwrap();
        assert_eq!(2, mgr.open_sessions());
    }
    assert_eq!(0, mgr.open_sessions());
    assert_eq!(2, mgr.opened_total());
    assert_eq!(Some(Duration::from_millis(1234)), mgr.last_timeout());
}

#[rstest]
#[should_panic]
fn manager_too_many_opens() {
    let mgr = LoopbackResourceManager::new()
        .with_device("ASRL1::INSTR", LoopbackDevice::new(vec![], vec![]));
    let _ = mgr.open("ASRL1::INSTR");
    let _ = mgr.open("ASRL1::INSTR");
}

#[rstest]
#[should_panic]
fn manager_unopened_scripts() {
    let _ = LoopbackResourceManager::new()
        .with_device("ASRL1::INSTR", LoopbackDevice::new(vec![], vec![]));
}
