use log::trace;

use crate::buffer::OutOfOrderBuffer;
use crate::codec::Packet;
use crate::io::LocalOutput;

pub struct RecvWindow {
    window_max: u32,
    expected_next: u32,
    output_blocked: bool,
    eof_seqno: Option<u32>,
    buffer: OutOfOrderBuffer,
}

impl RecvWindow {
    pub fn new(window_max: usize) -> Self {
        RecvWindow {
            window_max: window_max as u32,
            expected_next: 1,
            output_blocked: false,
            eof_seqno: None,
            buffer: OutOfOrderBuffer::new(),
        }
    }

    pub fn expected_next(&self) -> u32 {
        self.expected_next
    }

    pub fn output_blocked(&self) -> bool {
        self.output_blocked
    }

    pub fn eof_received(&self) -> bool {
        self.eof_seqno.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    // true once the EOF seqno is latched and has also been delivered
    pub fn eof_delivered(&self) -> bool {
        self.eof_seqno.is_some_and(|s| self.expected_next > s)
    }

    // runs on an already checksum-validated data/EOF packet. true means the
    // packet landed at the left edge of the window and delivery should be
    // attempted; a duplicate or out-of-window seqno returns false, but the
    // caller still owes the peer an ack either way.
    pub fn ingest(&mut self, seqno: u32, packet: Packet) -> bool {
        if seqno < self.expected_next || seqno >= self.expected_next + self.window_max {
            trace!(
                "seqno {} outside window [{}, {})",
                seqno,
                self.expected_next,
                self.expected_next + self.window_max
            );
            return false;
        }

        if self.buffer.contains(seqno) {
            trace!("duplicate seqno {}", seqno);
            return false;
        }

        if packet.is_eof() {
            self.eof_seqno = Some(seqno);
        }

        self.buffer.insert(seqno, packet);
        seqno == self.expected_next
    }

    // peels in-order packets off the receive buffer while the sink has
    // room, stopping (and latching output_blocked) the moment it doesn't
    pub fn deliver(&mut self, output: &mut dyn LocalOutput) {
        loop {
            let Some((seqno, is_eof, len)) = self
                .buffer
                .peek_min()
                .map(|(s, p)| (s, p.is_eof(), p.data.len()))
            else {
                return;
            };

            if seqno != self.expected_next {
                return;
            }

            if is_eof {
                self.buffer.pop_min();
                self.expected_next += 1;
                self.output_blocked = false;
                continue;
            }

            if output.output_space() < len {
                self.output_blocked = true;
                return;
            }

            let (_, packet) = self.buffer.pop_min().expect("just peeked");
            output.write_output(&packet.data);
            self.expected_next += 1;
            self.output_blocked = false;
        }
    }

    // None means ack emission is suppressed while output_blocked is set
    pub fn pending_ack(&self) -> Option<Packet> {
        if self.output_blocked {
            None
        } else {
            Some(Packet::ack(self.expected_next))
        }
    }
}
