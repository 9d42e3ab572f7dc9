//! Single-shot delivery of the verified remote public key
//!
//! The certificate verifier runs inside the TLS engine and cannot return data
//! to whoever drives the handshake. It writes the key into a [`KeySender`]
//! instead; the handshake runner reads it from the paired [`KeyReceiver`] once
//! the handshake has succeeded. Verification is synchronous inside the
//! handshake, so by then the value is either present or never coming.

use std::sync::Mutex;

use tokio::sync::oneshot;

/// Create a connected sender/receiver pair
pub fn key_slot() -> (KeySender, KeyReceiver) {
    let (tx, rx) = oneshot::channel();
    (
        KeySender {
            tx: Mutex::new(Some(tx)),
        },
        KeyReceiver { rx },
    )
}

/// Writing half, owned by the certificate verifier
#[derive(Debug)]
pub struct KeySender {
    tx: Mutex<Option<oneshot::Sender<Vec<u8>>>>,
}

impl KeySender {
    /// Deliver the encoded public key
    ///
    /// Only the first delivery is kept. Returns `false` if the slot was
    /// already written or the receiver is gone.
    pub fn deliver(&self, public_key: Vec<u8>) -> bool {
        let tx = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match tx {
            Some(tx) => tx.send(public_key).is_ok(),
            None => false,
        }
    }
}

/// Reading half, owned by the handshake runner
#[derive(Debug)]
pub struct KeyReceiver {
    rx: oneshot::Receiver<Vec<u8>>,
}

impl KeyReceiver {
    /// Take the delivered key without waiting
    pub fn try_take(mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}
