//! In-process ADCS stand-in.
//!
//! [`SimulatedAdcs`] sits where the UART driver would and answers frames the
//! way the device does, pushing reply bytes through a [`LinkNotifier`] as the
//! receive interrupt would. [`SimulatedI2c`] plays the same role for the I2C path.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use adcsio_frame::ids::is_telemetry;
use adcsio_frame::{destuff, stuff, TcStatus, ESC, INITIATE_DOWNLOAD_BURST, LAST_TC_ACK, SOM, TERMINATOR};
use adcsio_link::{I2cBus, LinkError, LinkNotifier, SerialPort};
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{trace, warn};

const FEED_RETRY: Duration = Duration::from_millis(1);
const FEED_GIVE_UP: Duration = Duration::from_secs(2);

/// Wire bytes of one download frame.
pub fn download_frame(session_type: u8, counter: u16, data: &[u8]) -> Vec<u8> {
    let mut thin = counter.to_le_bytes().to_vec();
    thin.extend_from_slice(data);
    let mut frame = vec![ESC, SOM, session_type];
    stuff(&thin, &mut frame);
    frame.extend_from_slice(&TERMINATOR);
    frame
}

/// Byte stream the simulator emits after an initiate-download-burst command.
#[derive(Debug, Clone, Default)]
pub struct BurstPlan {
    bytes: Vec<u8>,
}

impl BurstPlan {
    /// `packets` frames numbered from 0, each carrying `data_len` copies of its low counter byte.
    pub fn counting(packets: u16, data_len: usize) -> Self {
        let bytes = (0..packets)
            .flat_map(|counter| {
                download_frame(INITIATE_DOWNLOAD_BURST, counter, &vec![counter as u8; data_len])
            })
            .collect();
        Self { bytes }
    }

    /// Emit exactly `bytes`.
    pub fn raw(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Prepend line noise ahead of the first frame.
    pub fn with_leading_garbage(mut self, garbage: Vec<u8>) -> Self {
        let mut bytes = garbage;
        bytes.append(&mut self.bytes);
        self.bytes = bytes;
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Default)]
struct SimState {
    status: TcStatus,
    telemetry: HashMap<u8, Bytes>,
    silent: bool,
    tx_stall: bool,
    send_fault: Option<String>,
    trailing: Vec<u8>,
    burst: Option<BurstPlan>,
    sent: Vec<Bytes>,
}

/// Simulated ADCS on the far end of a UART.
///
/// Clones share state, so a test can keep one handle to script the device
/// after handing another to the transport.
#[derive(Debug, Clone)]
pub struct SimulatedAdcs {
    notifier: LinkNotifier,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedAdcs {
    pub fn new(notifier: LinkNotifier) -> Self {
        Self {
            notifier,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Status byte placed in every telecommand acknowledgment.
    pub fn set_status(&self, status: TcStatus) {
        self.state.lock().status = status;
    }

    /// Answer telemetry requests for `id` with `payload`.
    pub fn set_telemetry(&self, id: u8, payload: Bytes) {
        self.state.lock().telemetry.insert(id, payload);
    }

    /// Complete transmits but never reply.
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Never signal transmit completion.
    pub fn set_tx_stall(&self, stall: bool) {
        self.state.lock().tx_stall = stall;
    }

    /// Refuse every transmit with `reason`, as a faulted peripheral would.
    pub fn set_send_fault(&self, reason: Option<&str>) {
        self.state.lock().send_fault = reason.map(str::to_string);
    }

    /// Bytes pushed after every reply, as a late echo on the line would be.
    pub fn set_trailing_noise(&self, noise: Vec<u8>) {
        self.state.lock().trailing = noise;
    }

    /// Arm a burst, streamed once on the next initiate-download-burst command.
    pub fn set_burst(&self, plan: BurstPlan) {
        self.state.lock().burst = Some(plan);
    }

    /// Every frame received so far, in order.
    pub fn sent_frames(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    fn feed_now(&self, bytes: &[u8]) {
        for &byte in bytes {
            if !self.notifier.on_rx_byte(byte) {
                warn!(len = bytes.len(), "simulated reply overflowed the receive queue");
                return;
            }
        }
    }

    fn stream_burst(&self, plan: BurstPlan) {
        let notifier = self.notifier.clone();
        trace!(len = plan.len(), "streaming download burst");
        thread::spawn(move || {
            for byte in plan.bytes {
                let mut waited = Duration::ZERO;
                while notifier.rx_headroom() == 0 {
                    if waited >= FEED_GIVE_UP {
                        warn!("download burst abandoned: receive queue never drained");
                        return;
                    }
                    thread::sleep(FEED_RETRY);
                    waited += FEED_RETRY;
                }
                notifier.on_rx_byte(byte);
            }
        });
    }
}

/// Destuffed body of a well-formed frame.
fn frame_body(frame: &[u8]) -> Option<Vec<u8>> {
    if frame.len() < 4 || frame[..2] != [ESC, SOM] || !frame.ends_with(&TERMINATOR) {
        return None;
    }
    let mut thin = Vec::with_capacity(frame.len());
    destuff(&frame[2..frame.len() - 2], &mut thin);
    Some(thin)
}

impl SerialPort for SimulatedAdcs {
    fn send(&mut self, frame: &[u8]) -> adcsio_link::Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.send_fault {
            return Err(LinkError::Send(reason.clone()));
        }
        state.sent.push(Bytes::copy_from_slice(frame));
        if state.tx_stall {
            return Ok(());
        }
        self.notifier.on_tx_complete();
        if state.silent {
            return Ok(());
        }

        let Some(&id) = frame_body(frame).as_ref().and_then(|body| body.first()) else {
            warn!(len = frame.len(), "simulator ignored unframed bytes");
            return Ok(());
        };

        if is_telemetry(id) {
            let Some(payload) = state.telemetry.get(&id) else {
                return Ok(());
            };
            let mut reply = vec![ESC, SOM, id];
            stuff(payload, &mut reply);
            reply.extend_from_slice(&TERMINATOR);
            self.feed_now(&reply);
        } else if id == INITIATE_DOWNLOAD_BURST {
            if let Some(plan) = state.burst.take() {
                self.stream_burst(plan);
            }
            return Ok(());
        } else {
            let mut reply = vec![ESC, SOM];
            stuff(&[id, state.status.code()], &mut reply);
            reply.extend_from_slice(&TERMINATOR);
            self.feed_now(&reply);
        }

        let trailing = state.trailing.clone();
        drop(state);
        self.feed_now(&trailing);
        Ok(())
    }
}

const NOT_PROCESSED: [u8; 4] = [0, 0, 0, 0];

/// Simulated ADCS on an I2C bus.
#[derive(Debug)]
pub struct SimulatedI2c {
    address: u8,
    acks: VecDeque<[u8; 4]>,
    settled_ack: [u8; 4],
    telemetry: HashMap<u8, Vec<u8>>,
    writes: Vec<Vec<u8>>,
    ack_reads: u32,
}

impl SimulatedI2c {
    /// A device that reports every command processed without error.
    pub fn new(address: u8) -> Self {
        Self {
            address,
            acks: VecDeque::new(),
            settled_ack: [0, 1, 0, 0],
            telemetry: HashMap::new(),
            writes: Vec::new(),
            ack_reads: 0,
        }
    }

    /// Report "not processed" for `polls` reads, then processed with `error_flag`.
    pub fn processed_after(mut self, polls: usize, error_flag: u8) -> Self {
        self.acks = std::iter::repeat(NOT_PROCESSED).take(polls).collect();
        self.settled_ack = [0, 1, error_flag, 0];
        self
    }

    /// Never set the processed flag.
    pub fn never_processed(mut self) -> Self {
        self.acks.clear();
        self.settled_ack = NOT_PROCESSED;
        self
    }

    pub fn set_telemetry(&mut self, id: u8, bytes: Vec<u8>) {
        self.telemetry.insert(id, bytes);
    }

    /// Commands written so far.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Number of acknowledgment slot reads.
    pub fn ack_reads(&self) -> u32 {
        self.ack_reads
    }

    fn check_address(&self, address: u8) -> adcsio_link::Result<()> {
        if address != self.address {
            return Err(LinkError::I2c {
                address,
                reason: "no acknowledge".to_string(),
            });
        }
        Ok(())
    }
}

impl I2cBus for SimulatedI2c {
    fn write(&mut self, address: u8, bytes: &[u8]) -> adcsio_link::Result<()> {
        self.check_address(address)?;
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    fn write_read(&mut self, address: u8, register: u8, buf: &mut [u8]) -> adcsio_link::Result<()> {
        self.check_address(address)?;
        let source: Vec<u8> = if register == LAST_TC_ACK {
            self.ack_reads += 1;
            let mut ack = self.acks.pop_front().unwrap_or(self.settled_ack);
            if let Some(last) = self.writes.last().and_then(|w| w.first()) {
                ack[0] = *last;
            }
            ack.to_vec()
        } else {
            self.telemetry.get(&register).cloned().unwrap_or_default()
        };
        for (slot, byte) in buf.iter_mut().zip(source.into_iter().chain(std::iter::repeat(0))) {
            *slot = byte;
        }
        Ok(())
    }
}
