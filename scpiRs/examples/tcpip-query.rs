use scpirs::{NativeResourceManager, Scpi, ScpiConfig, Termination};

fn main() {
    env_logger::init();

    // A spectrum analyzer listening on the standard SCPI socket port.
    let device = "TCPIP0::192.168.0.10::5025::SOCKET";

    let config = ScpiConfig::default();
    let manager = NativeResourceManager::from_config(&config).with_resources([device]);
    let scpi = Scpi::with_manager(manager, config);

    // Identify everything we know about.
    for entry in scpi.search().unwrap() {
        match entry.identification {
            Ok(idn) => println!("{}: {idn}", entry.address),
            Err(err) => println!("{}: {err}", entry.address),
        }
    }

    // Query the stop frequency.
    let stop = scpi.execute(device, ":SENSe:FREQuency:STOP?", true).unwrap();
    println!("Stop frequency: {:?}", stop.response());

    // Write a command without reading anything back.
    scpi.execute(device, ":INITiate:CONTinuous OFF", false).unwrap();

    // Read the trace, which the instrument sends in several messages.
    let trace = scpi
        .query_full_response(device, ":TRACe:DATA? TRACE1", &Termination::from("END"))
        .unwrap();
    println!("Trace: {trace}");
}
