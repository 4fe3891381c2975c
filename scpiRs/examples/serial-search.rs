use scpirs::{Scpi, ScpiConfig};

fn main() {
    env_logger::init();

    // Serial ports are found automatically, only the baud rate has to match the instruments.
    let scpi = Scpi::with_config(ScpiConfig::default().with_serial_baud_rate(115200));

    for entry in scpi.search().unwrap() {
        println!("{} -> {:?}", entry.address, entry.identification);
    }
}
