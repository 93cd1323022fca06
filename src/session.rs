use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::codec::Packet;
use crate::io::{DatagramSink, LocalInput, LocalOutput};
use crate::recv::RecvWindow;
use crate::send::SendWindow;

pub struct Session {
    send: SendWindow,
    recv: RecvWindow,
}

impl Session {
    pub fn new(window_max: usize, retransmission_timeout: Duration) -> Self {
        Session {
            send: SendWindow::new(window_max, retransmission_timeout),
            recv: RecvWindow::new(window_max),
        }
    }

    pub fn on_datagram_arrived(
        &mut self,
        bytes: &[u8],
        input: &mut dyn LocalInput,
        output: &mut dyn LocalOutput,
        datagram: &mut dyn DatagramSink,
    ) {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(err) => {
                debug!("dropping malformed packet ({} bytes): {err}", bytes.len());
                return;
            }
        };

        if packet.is_ack() {
            // pure acks never touch receiver state
            if self.send.process_ack(packet.ackno) {
                self.send.emit(input, datagram);
            }
            return;
        }

        let seqno = packet
            .seqno
            .expect("Packet::decode only omits seqno on 8-byte ack packets");

        if self.recv.ingest(seqno, packet) {
            self.recv.deliver(output);
        }
        self.send_ack(datagram);
    }

    pub fn on_input_readable(&mut self, input: &mut dyn LocalInput, datagram: &mut dyn DatagramSink) {
        self.send.emit(input, datagram);
    }

    pub fn on_output_drained(&mut self, output: &mut dyn LocalOutput, datagram: &mut dyn DatagramSink) {
        self.recv.deliver(output);
        self.send_ack(datagram);
    }

    // true once every teardown condition holds, telling the caller it's
    // safe to remove this session from the registry
    pub fn on_tick(&mut self, now: Instant, datagram: &mut dyn DatagramSink) -> bool {
        self.send.retransmit_expired(now, datagram);
        self.ready_for_teardown()
    }

    fn ready_for_teardown(&self) -> bool {
        self.send.eof_sent()
            && self.recv.eof_delivered()
            && self.send.is_empty()
            && self.recv.is_empty()
    }

    fn send_ack(&self, datagram: &mut dyn DatagramSink) {
        if let Some(ack) = self.recv.pending_ack() {
            if datagram.send_datagram(&ack.encode()).is_err() {
                warn!("substrate send failed for ack");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    // bytes an endpoint reads from, in order, as its local stream
    struct ScriptedInput {
        chunks: VecDeque<Option<Vec<u8>>>,
    }

    impl ScriptedInput {
        fn new(chunks: Vec<&[u8]>) -> Self {
            let mut queue: VecDeque<Option<Vec<u8>>> =
                chunks.into_iter().map(|c| Some(c.to_vec())).collect();
            queue.push_back(None);
            ScriptedInput { chunks: queue }
        }
    }

    impl LocalInput for ScriptedInput {
        fn read_input(&mut self, buf: &mut [u8]) -> Option<usize> {
            match self.chunks.pop_front() {
                None => Some(0),
                Some(None) => None,
                Some(Some(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Some(data.len())
                }
            }
        }
    }

    #[derive(Default)]
    struct CapturingOutput {
        space: usize,
        written: Vec<u8>,
    }

    impl LocalOutput for CapturingOutput {
        fn output_space(&self) -> usize {
            self.space
        }

        fn write_output(&mut self, buf: &[u8]) {
            self.written.extend_from_slice(buf);
        }
    }

    // in-memory substrate: each endpoint's DatagramSink enqueues onto the
    // other's inbox
    #[derive(Clone, Default)]
    struct Inbox(Rc<RefCell<VecDeque<Vec<u8>>>>);

    struct Link {
        peer_inbox: Inbox,
    }

    impl DatagramSink for Link {
        fn send_datagram(&mut self, bytes: &[u8]) -> Result<usize, ()> {
            self.peer_inbox.0.borrow_mut().push_back(bytes.to_vec());
            Ok(bytes.len())
        }
    }

    fn pump(
        from: &mut Session,
        from_inbox: &Inbox,
        from_link: &mut Link,
        input: &mut dyn LocalInput,
        output: &mut dyn LocalOutput,
    ) {
        while let Some(bytes) = from_inbox.0.borrow_mut().pop_front() {
            from.on_datagram_arrived(&bytes, input, output, from_link);
        }
    }

    #[test]
    fn s1_clean_single_packet_round_trips_and_tears_down() {
        let a_inbox = Inbox::default();
        let b_inbox = Inbox::default();

        let mut a = Session::new(1, Duration::from_millis(1000));
        let mut b = Session::new(1, Duration::from_millis(1000));

        let mut a_link = Link {
            peer_inbox: b_inbox.clone(),
        };
        let mut b_link = Link {
            peer_inbox: a_inbox.clone(),
        };

        let mut a_input = ScriptedInput::new(vec![b"hello"]);
        let mut a_output = CapturingOutput {
            space: 1000,
            ..Default::default()
        };
        let mut b_input = ScriptedInput::new(vec![]);
        let mut b_output = CapturingOutput {
            space: 1000,
            ..Default::default()
        };

        a.on_input_readable(&mut a_input, &mut a_link);
        b.on_input_readable(&mut b_input, &mut b_link);

        // Drain the substrate until both sides go quiet.
        for _ in 0..10 {
            pump(&mut b, &b_inbox, &mut b_link, &mut b_input, &mut b_output);
            pump(&mut a, &a_inbox, &mut a_link, &mut a_input, &mut a_output);
        }

        assert_eq!(b_output.written, b"hello");
        assert!(a.ready_for_teardown());
        assert!(b.ready_for_teardown());
    }

    #[test]
    fn s3_reordered_arrival_still_delivers_in_order() {
        let mut b = Session::new(5, Duration::from_millis(100));
        let mut sink = Link {
            peer_inbox: Inbox::default(),
        };
        let mut input = ScriptedInput::new(vec![]);
        let mut output = CapturingOutput {
            space: 1000,
            ..Default::default()
        };

        let p1 = Packet::data(1, b"A".to_vec()).encode();
        let p2 = Packet::data(2, b"B".to_vec()).encode();
        let p3 = Packet::data(3, b"C".to_vec()).encode();

        b.on_datagram_arrived(&p2, &mut input, &mut output, &mut sink);
        assert_eq!(output.written, b"");

        b.on_datagram_arrived(&p1, &mut input, &mut output, &mut sink);
        assert_eq!(output.written, b"AB");

        b.on_datagram_arrived(&p3, &mut input, &mut output, &mut sink);
        assert_eq!(output.written, b"ABC");
    }

    #[test]
    fn s6_corrupted_packet_produces_no_state_change() {
        let mut b = Session::new(5, Duration::from_millis(100));
        let mut sink = Link {
            peer_inbox: Inbox::default(),
        };
        let mut input = ScriptedInput::new(vec![]);
        let mut output = CapturingOutput {
            space: 1000,
            ..Default::default()
        };

        let mut corrupted = Packet::data(1, b"hi".to_vec()).encode();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;

        b.on_datagram_arrived(&corrupted, &mut input, &mut output, &mut sink);

        assert!(output.written.is_empty());
        assert!(sink.peer_inbox.0.borrow().is_empty(), "no ack for a corrupted packet");
    }

    #[test]
    fn out_of_window_packet_is_rejected_but_still_acked() {
        let mut b = Session::new(1, Duration::from_millis(100));
        let mut sink = Link {
            peer_inbox: Inbox::default(),
        };
        let mut input = ScriptedInput::new(vec![]);
        let mut output = CapturingOutput {
            space: 1000,
            ..Default::default()
        };

        // expected_next=1, window_max=1: seqno 2 is out of window.
        let wire = Packet::data(2, b"x".to_vec()).encode();
        b.on_datagram_arrived(&wire, &mut input, &mut output, &mut sink);

        assert!(output.written.is_empty());
        let ack_bytes = sink.peer_inbox.0.borrow_mut().pop_front().expect("ack sent");
        let ack = Packet::decode(&ack_bytes).unwrap();
        assert!(ack.is_ack());
        assert_eq!(ack.ackno, 1);
    }
}
