//! Tests for the native resource manager, using a socket on the local host.

use std::{
    io::{BufRead, BufReader, Write},
    net::TcpListener,
    thread,
    time::Duration,
};

use rstest::*;

use scpirs::{
    ErrorKind, Execution, NativeResourceManager, ResourceManager, Scpi, ScpiConfig, Session,
    Termination, VI_ERROR_INV_RSRC_NAME, VI_ERROR_NSUP_OPER,
};

/// Start a fake instrument that answers `*IDN?` and a chunked trace query on a local socket.
///
/// The instrument serves `connections` connections and then stops. Returns the resource address.
fn spawn_instrument(connections: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    serve(listener, connections);
    format!("TCPIP0::127.0.0.1::{port}::SOCKET")
}

fn serve(listener: TcpListener, connections: usize) {
    thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let mut stream = stream.unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 0 {
                match line.trim_end() {
                    "*IDN?" => stream.write_all(b"ACME,Socket,42,1.0\n").unwrap(),
                    ":TRAC:DATA?" => stream.write_all(b"1,2,\n3,4,\n5,END\n").unwrap(),
                    _ => {}
                }
                line.clear();
            }
        }
    });
}

#[fixture]
fn config() -> ScpiConfig {
    ScpiConfig::default()
        .with_timeout(Duration::from_millis(2000))
        .with_read_delay(Duration::ZERO)
}

#[rstest]
fn lists_registered_resources() {
    let mgr = NativeResourceManager::new()
        .with_resources(["TCPIP0::10.0.0.1::5025::SOCKET", "TCPIP0::10.0.0.2::5025::SOCKET"]);
    let resources = mgr.list_resources().unwrap();
    assert!(resources.contains(&"TCPIP0::10.0.0.1::5025::SOCKET".to_string()));
    assert!(resources.contains(&"TCPIP0::10.0.0.2::5025::SOCKET".to_string()));
}

#[rstest]
fn open_invalid_address() {
    let err = NativeResourceManager::new()
        .open("not an address")
        .err()
        .unwrap();
    assert_eq!(ErrorKind::Unknown(VI_ERROR_INV_RSRC_NAME), err.kind());
}

#[rstest]
#[case("GPIB0::12::INSTR")]
#[case("USB0::0x1AB1::0x04CE::DS1Z::INSTR")]
#[case("TCPIP0::192.168.0.10::inst0::INSTR")]
fn open_unsupported_resource(#[case] address: &str) {
    let err = NativeResourceManager::new().open(address).err().unwrap();
    assert_eq!(ErrorKind::Unknown(VI_ERROR_NSUP_OPER), err.kind());
}

#[rstest]
fn open_refused_connection() {
    // Bind and drop a listener to get a port that nobody listens on.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let address = format!("TCPIP0::127.0.0.1::{port}::SOCKET");
    let err = NativeResourceManager::new().open(&address).err().unwrap();
    assert_eq!(ErrorKind::ResourceNotFound, err.kind());
    assert!(err.to_string().contains(&address));
}

#[rstest]
fn session_query() {
    let address = spawn_instrument(1);
    let mut session = NativeResourceManager::new().open(&address).unwrap();
    session.set_timeout(Duration::from_millis(1500)).unwrap();
    assert_eq!(Duration::from_millis(1500), session.get_timeout());
    assert_eq!("ACME,Socket,42,1.0", session.query("*IDN?").unwrap());
}

#[rstest]
fn scpi_over_socket(config: ScpiConfig) {
    let address = spawn_instrument(3);
    let mgr = NativeResourceManager::from_config(&config).with_resources([address.as_str()]);
    let scpi = Scpi::with_manager(mgr, config);

    let entries = scpi.search().unwrap();
    let entry = entries.iter().find(|e| e.address == address).unwrap();
    assert_eq!(Ok("ACME,Socket,42,1.0".to_string()), entry.identification);

    assert_eq!(
        Ok(Execution::Response("ACME,Socket,42,1.0".to_string())),
        scpi.execute(&address, "*IDN?", true)
    );
    assert_eq!(
        Ok("1,2,3,4,5,END".to_string()),
        scpi.query_full_response(&address, ":TRAC:DATA?", &Termination::from("END"))
    );
}

#[rstest]
fn scpi_over_ipv6_socket(config: ScpiConfig) {
    let Ok(listener) = TcpListener::bind("[::1]:0") else {
        // No IPv6 loopback on this host.
        return;
    };
    let port = listener.local_addr().unwrap().port();
    serve(listener, 1);

    let scpi = Scpi::with_config(config);
    assert_eq!(
        Ok(Execution::Response("ACME,Socket,42,1.0".to_string())),
        scpi.execute(&format!("TCPIP0::[::1]::{port}::SOCKET"), "*IDN?", true)
    );
}

#[rstest]
fn scpi_query_without_answer_times_out() {
    let address = spawn_instrument(1);
    let config = ScpiConfig::default().with_timeout(Duration::from_millis(200));
    let scpi = Scpi::with_config(config);
    assert_eq!(
        Err(ErrorKind::Timeout),
        scpi.execute(&address, "*OPC?", true)
    );
}
