//! Decoded output messages and the bounded channel that carries them from
//! the decode worker to the consumer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{self, select, Receiver, Sender, TryRecvError};

use crate::core::format::{ElementType, FormatDetail, MediaFormat};
use crate::core::time::Time;
use crate::decode::decoder::DecodeError;

/// Describes one decoded payload
#[derive(Debug, Clone, Copy)]
pub struct MessageHeader {
    /// Owning stream (container index) and the resolved output geometry
    pub format: MediaFormat,
    /// Presentation timestamp in microseconds
    pub pts: Time,
    pub key_frame: bool,
}

impl MessageHeader {
    /// Buffer shape and element type a payload of `payload_len` bytes fills.
    ///
    /// Video: `[height, width, channels]` u8. Audio: `[samples, channels]`.
    /// Text: `[bytes]` u8.
    pub fn output_shape(&self, payload_len: usize) -> (Vec<usize>, ElementType) {
        match &self.format.detail {
            FormatDetail::Video(v) => (
                vec![v.height as usize, v.width as usize, v.pixel.channels()],
                ElementType::U8,
            ),
            FormatDetail::Audio(a) => {
                let channels = (a.channels as usize).max(1);
                let frame = channels * a.sample.bytes();
                (vec![payload_len / frame, channels], a.sample.element_type())
            }
            FormatDetail::Text => (vec![payload_len], ElementType::U8),
        }
    }

    /// Byte size implied by the header for a payload of `payload_len` bytes
    pub fn expected_bytes(&self, payload_len: usize) -> usize {
        let (shape, element) = self.output_shape(payload_len);
        shape.iter().product::<usize>() * element.size()
    }
}

/// One decoded and sampled unit of output
#[derive(Debug)]
pub struct DecoderOutputMessage {
    pub header: MessageHeader,
    pub payload: Vec<u8>,
}

pub(crate) type Item = Result<DecoderOutputMessage, DecodeError>;

/// Cancels a decode session from any thread.
///
/// Dropping the cancel sender disconnects every receiver of the cancel
/// channel, which wakes both the consumer and the worker.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    cancel: Arc<Mutex<Option<Sender<()>>>>,
}

impl ShutdownHandle {
    fn new(cancel: Sender<()>) -> Self {
        Self {
            cancel: Arc::new(Mutex::new(Some(cancel))),
        }
    }

    /// Idempotent
    pub fn shutdown(&self) {
        let sender = match self.cancel.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);
    }

    pub fn is_shutdown(&self) -> bool {
        match self.cancel.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

/// Worker side of the channel
pub(crate) struct MessageSender {
    tx: Sender<Item>,
    cancel: Receiver<()>,
}

impl MessageSender {
    /// Blocks while the channel is full. Returns `false` once the consumer is
    /// gone or the session was cancelled.
    pub fn send(&self, item: Item) -> bool {
        if self.is_cancelled() {
            return false;
        }
        select! {
            send(self.tx, item) -> res => res.is_ok(),
            recv(self.cancel) -> _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cancel.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Consumer side of the channel
pub(crate) struct MessageReceiver {
    rx: Receiver<Item>,
    cancel: Receiver<()>,
}

impl MessageReceiver {
    /// Next message, `Ok(None)` at end of stream or after shutdown,
    /// `Err(Timeout)` if nothing arrived within `timeout`.
    pub fn recv(&self, timeout: Duration) -> Result<Option<DecoderOutputMessage>, DecodeError> {
        if matches!(self.cancel.try_recv(), Err(TryRecvError::Disconnected)) {
            return Ok(None);
        }
        select! {
            recv(self.rx) -> item => match item {
                Ok(Ok(message)) => Ok(Some(message)),
                Ok(Err(e)) => Err(e),
                Err(_) => Ok(None),
            },
            recv(self.cancel) -> _ => Ok(None),
            default(timeout) => Err(DecodeError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

/// Bounded message channel plus its cancel handle
pub(crate) fn message_channel(capacity: usize) -> (MessageSender, MessageReceiver, ShutdownHandle) {
    let (tx, rx) = channel::bounded(capacity.max(1));
    let (cancel_tx, cancel_rx) = channel::bounded::<()>(0);
    (
        MessageSender {
            tx,
            cancel: cancel_rx.clone(),
        },
        MessageReceiver {
            rx,
            cancel: cancel_rx,
        },
        ShutdownHandle::new(cancel_tx),
    )
}
