use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{trace, warn};

use crate::codec::Packet;
use crate::io::{DatagramSink, LocalInput};

struct SendEntry {
    packet: Packet,
    last_transmitted_at: Instant,
}

pub struct SendWindow {
    window_max: usize,
    timeout: Duration,
    next_seqno: u32,
    eof_sent: bool,
    buffer: VecDeque<SendEntry>,
}

impl SendWindow {
    pub fn new(window_max: usize, timeout: Duration) -> Self {
        SendWindow {
            window_max,
            timeout,
            next_seqno: 1,
            eof_sent: false,
            buffer: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn eof_sent(&self) -> bool {
        self.eof_sent
    }

    pub fn emit(&mut self, input: &mut dyn LocalInput, datagram: &mut dyn DatagramSink) {
        while self.buffer.len() < self.window_max && !self.eof_sent {
            let mut chunk = vec![0u8; Packet::MAX_PAYLOAD];

            match input.read_input(&mut chunk) {
                None => {
                    let seqno = self.next_seqno;
                    self.next_seqno += 1;
                    self.eof_sent = true;

                    let packet = Packet::eof(seqno);
                    self.transmit(&packet, datagram);
                    self.buffer.push_back(SendEntry {
                        packet,
                        last_transmitted_at: Instant::now(),
                    });
                }
                Some(0) => return,
                Some(n) => {
                    chunk.truncate(n);

                    let seqno = self.next_seqno;
                    self.next_seqno += 1;

                    let packet = Packet::data(seqno, chunk);
                    self.transmit(&packet, datagram);
                    self.buffer.push_back(SendEntry {
                        packet,
                        last_transmitted_at: Instant::now(),
                    });
                }
            }
        }
    }

    // removes every buffered entry with seqno < ackno; return value tells
    // the caller whether the window may have opened for further emission
    pub fn process_ack(&mut self, ackno: u32) -> bool {
        let before = self.buffer.len();

        while let Some(entry) = self.buffer.front() {
            let seqno = entry.packet.seqno.expect("send buffer holds only data/EOF packets");
            if seqno < ackno {
                self.buffer.pop_front();
            } else {
                break;
            }
        }

        self.buffer.len() < before
    }

    pub fn retransmit_expired(&mut self, now: Instant, datagram: &mut dyn DatagramSink) {
        for entry in self.buffer.iter_mut() {
            if now.duration_since(entry.last_transmitted_at) > self.timeout {
                trace!(
                    "retransmitting seqno={:?} after {:?}",
                    entry.packet.seqno,
                    now.duration_since(entry.last_transmitted_at)
                );
                if datagram.send_datagram(&entry.packet.encode()).is_ok() {
                    entry.last_transmitted_at = now;
                }
            }
        }
    }

    fn transmit(&self, packet: &Packet, datagram: &mut dyn DatagramSink) {
        if datagram.send_datagram(&packet.encode()).is_err() {
            warn!("substrate send failed for seqno={:?}", packet.seqno);
        }
    }
}
