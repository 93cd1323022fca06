// contracts for the datagram substrate, local input, and local output the
// engine is driven by. driver.rs supplies concrete implementations backed
// by a UDP socket and stdin/stdout.

pub trait DatagramSink {
    // Ok(length) on success, Err(()) on a synchronous send failure; the
    // retransmission timer is responsible for retrying
    fn send_datagram(&mut self, bytes: &[u8]) -> Result<usize, ()>;
}

pub trait LocalInput {
    // bytes read into buf (1..=buf.len()), 0 if none currently available,
    // None once end-of-input is reached. monotonic: once None, always None.
    fn read_input(&mut self, buf: &mut [u8]) -> Option<usize>;
}

pub trait LocalOutput {
    fn output_space(&self) -> usize;

    // writes exactly buf.len() bytes; caller has already checked output_space()
    fn write_output(&mut self, buf: &[u8]);
}
