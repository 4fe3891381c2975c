//! Tests for the [`Instrument`] session itself.
//!
//! Note that much of the functionality of the [`Session`] trait is tested in the
//! [`scpirs::LoopbackSession`] tests.

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    time::Duration,
};

use rstest::*;

use scpirs::{ErrorKind, Instrument, Port, ScpiError, Session};

/// Set up a empty instrument with default 3 second timeout.
#[fixture]
fn empt_inst() -> Instrument<VecDeque<u8>> {
    Instrument::new(VecDeque::new(), Duration::from_secs(3))
}

/// Set up a instrument with no terminator and no timeout duration.
#[fixture]
fn no_term_inst() -> Instrument<VecDeque<u8>> {
    Instrument::new(
        VecDeque::from(vec![b'r', b'e', b's', b'p']),
        Duration::from_secs(0),
    )
}

#[rstest]
fn test_instrument_terminator(mut empt_inst: Instrument<VecDeque<u8>>) {
    assert_eq!(empt_inst.get_terminator(), "\n");

    empt_inst.set_terminator("\r\n");
    assert_eq!(empt_inst.get_terminator(), "\r\n");
}

#[rstest]
fn test_instrument_timeout(mut empt_inst: Instrument<VecDeque<u8>>) {
    assert_eq!(empt_inst.get_timeout(), Duration::from_secs(3));

    empt_inst.set_timeout(Duration::from_millis(3000)).unwrap();
    assert_eq!(empt_inst.get_timeout(), Duration::from_millis(3000));
}

#[rstest]
fn test_instrument_write_read(mut empt_inst: Instrument<VecDeque<u8>>) {
    let data = b"Hello, Instrument!";
    empt_inst.write_raw(data).unwrap();

    let mut buf = vec![0; data.len()];
    empt_inst.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, data);
}

/// Written messages come back as read messages with the terminator stripped.
#[rstest]
#[case("\n")]
#[case("\r\n")]
fn test_instrument_message_roundtrip(
    mut empt_inst: Instrument<VecDeque<u8>>,
    #[case] terminator: &str,
) {
    empt_inst.set_terminator(terminator);
    empt_inst.write(":FREQ:STOP 3E9").unwrap();
    assert_eq!(":FREQ:STOP 3E9", empt_inst.read().unwrap());
}

#[rstest]
fn test_instrument_query_echo(mut empt_inst: Instrument<VecDeque<u8>>) {
    assert_eq!("*IDN?", empt_inst.query("*IDN?").unwrap());
}

/// Reading from an exhausted port is an I/O error, not a timeout.
#[rstest]
fn test_instrument_read_eof(mut empt_inst: Instrument<VecDeque<u8>>) {
    let err = empt_inst.read().unwrap_err();
    assert!(matches!(err, ScpiError::Io(_)));
    assert_eq!(ErrorKind::Io, err.kind());
}

/// A port whose connection was dropped by the other side.
struct ClosedPort(io::ErrorKind);

impl Read for ClosedPort {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(self.0.into())
    }
}

impl Write for ClosedPort {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(self.0.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for ClosedPort {}

#[rstest]
#[case(io::ErrorKind::ConnectionReset)]
#[case(io::ErrorKind::ConnectionAborted)]
#[case(io::ErrorKind::BrokenPipe)]
#[case(io::ErrorKind::NotConnected)]
fn test_instrument_closed_connection(#[case] kind: io::ErrorKind) {
    let mut inst = Instrument::new(ClosedPort(kind), Duration::from_secs(1));

    let err = inst.write("*IDN?").unwrap_err();
    assert!(matches!(err, ScpiError::InvalidSession));
    assert_eq!(ErrorKind::InvalidSession, err.kind());

    let err = inst.read().unwrap_err();
    assert!(matches!(err, ScpiError::InvalidSession));
}

#[rstest]
fn test_instrument_read_until_terminator_timeout(mut no_term_inst: Instrument<VecDeque<u8>>) {
    let timeout_exp = Duration::from_secs(0);

    match no_term_inst.read_until_terminator() {
        Err(ScpiError::Timeout(timeout)) => {
            assert_eq!(timeout_exp, timeout);
        }
        _ => panic!("Expected timeout error, but got a different result."),
    }
}

#[rstest]
fn test_instrument_query_timeout(mut no_term_inst: Instrument<VecDeque<u8>>) {
    let timeout_exp = Duration::from_secs(0);
    let query_exp = "QUERY";

    match no_term_inst.query(query_exp) {
        Err(err @ ScpiError::TimeoutQuery { .. }) => {
            assert_eq!(ErrorKind::Timeout, err.kind());
            if let ScpiError::TimeoutQuery { query, timeout } = err {
                assert_eq!(query_exp, query);
                assert_eq!(timeout_exp, timeout);
            }
        }
        _ => panic!("Expected timeout error, but got a different result."),
    }
}
