use scpirs::{Scpi, ScpiConfig, VisaResourceManager};

fn main() {
    env_logger::init();

    // Loads the VISA library that is installed on this system.
    let manager = VisaResourceManager::new().unwrap();
    let scpi = Scpi::with_manager(manager, ScpiConfig::default());

    for entry in scpi.search().unwrap() {
        println!("{} -> {:?}", entry.address, entry.identification);
    }

    let device = "GPIB0::18::INSTR";
    println!("{:?}", scpi.execute(device, "*IDN?", true));
}
