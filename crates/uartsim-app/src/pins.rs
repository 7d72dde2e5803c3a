use uartsim_core::{SignalReader, SignalWriter, SimError, Simulator};

pub struct DriverPins {
    pub clk: SignalWriter,
    pub rst_n: SignalWriter,
    pub rx: SignalWriter,
    pub tx_data: SignalWriter,
    pub tx_start: SignalWriter,
    pub rx_data: SignalReader,
    pub tx_busy: SignalReader,
    pub tx: SignalReader,
}

pub struct DevicePins {
    pub clk: SignalReader,
    pub rst_n: SignalReader,
    pub rx: SignalReader,
    pub tx_data: SignalReader,
    pub tx_start: SignalReader,
    pub rx_data: SignalWriter,
    pub tx_busy: SignalWriter,
    pub tx: SignalWriter,
}

pub fn interface(sim: &Simulator) -> Result<(DriverPins, DevicePins), SimError> {
    let clk = sim.signal("clk", 1, 0)?;
    let rst_n = sim.signal("rst_n", 1, 1)?;
    let rx = sim.signal("rx", 1, 1)?;
    let rx_data = sim.signal("rx_data", 8, 0)?;
    let tx_data = sim.signal("tx_data", 8, 0)?;
    let tx_start = sim.signal("tx_start", 1, 0)?;
    let tx_busy = sim.signal("tx_busy", 1, 0)?;
    let tx = sim.signal("tx", 1, 1)?;

    let device = DevicePins {
        clk: clk.reader(),
        rst_n: rst_n.reader(),
        rx: rx.reader(),
        tx_data: tx_data.reader(),
        tx_start: tx_start.reader(),
        rx_data,
        tx_busy,
        tx,
    };
    let driver = DriverPins {
        rx_data: device.rx_data.reader(),
        tx_busy: device.tx_busy.reader(),
        tx: device.tx.reader(),
        clk,
        rst_n,
        rx,
        tx_data,
        tx_start,
    };
    Ok((driver, device))
}
