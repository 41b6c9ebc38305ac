//! TCP fan-out sink for emitted record lines.
//!
//! Every record printed to stdout is also broadcast to all connected
//! subscribers as a length-prefixed frame whose payload is the stdout
//! line minus its trailing newline. The sink runs on its own thread
//! with a single-threaded tokio runtime; ctrl-c flips the shared
//! running flag so the decode loop can wind down at its next line.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};

use iridium_core::types::{IridiumError, Result};

/// Buffered records per subscriber before slow clients start losing
/// messages.
const CHANNEL_CAPACITY: usize = 1024;

pub struct Publisher {
    tx: broadcast::Sender<String>,
    shutdown: Arc<Notify>,
    local_addr: SocketAddr,
    handle: Option<thread::JoinHandle<()>>,
}

impl Publisher {
    /// Bind `addr` and start serving subscribers.
    pub fn start(addr: String, running: Arc<AtomicBool>) -> Result<Publisher> {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let shutdown = Arc::new(Notify::new());
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let thread_tx = tx.clone();
        let thread_shutdown = shutdown.clone();
        let handle = thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            rt.block_on(async move {
                let listener = match TcpListener::bind(addr.as_str()).await {
                    Ok(l) => l,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let local = listener.local_addr().expect("bound listener has an address");
                let _ = ready_tx.send(Ok(local));

                loop {
                    tokio::select! {
                        _ = thread_shutdown.notified() => break,
                        signal = tokio::signal::ctrl_c() => {
                            if signal.is_ok() {
                                running.store(false, Ordering::SeqCst);
                            }
                            break;
                        }
                        accepted = listener.accept() => {
                            let Ok((sock, _peer)) = accepted else { continue };
                            let rx = thread_tx.subscribe();
                            tokio::spawn(serve_subscriber(sock, rx));
                        }
                    }
                }
            });
        });

        let local_addr = ready_rx
            .recv()
            .map_err(|_| IridiumError::Publish("publisher thread died during bind".into()))?
            .map_err(|e| IridiumError::Publish(e.to_string()))?;

        Ok(Publisher {
            tx,
            shutdown,
            local_addr,
            handle: Some(handle),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Queue one record line for all subscribers. Never blocks.
    pub fn send(&self, line: &str) {
        let _ = self.tx.send(line.to_string());
    }

    /// Stop accepting, drop subscribers, and join the sink thread.
    pub fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

async fn serve_subscriber(mut sock: tokio::net::TcpStream, mut rx: broadcast::Receiver<String>) {
    loop {
        match rx.recv().await {
            Ok(msg) => {
                let header = (msg.len() as u32).to_be_bytes();
                if sock.write_all(&header).await.is_err()
                    || sock.write_all(msg.as_bytes()).await.is_err()
                {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::time::Duration;

    #[test]
    fn test_publish_roundtrip() {
        let running = Arc::new(AtomicBool::new(true));
        let publisher =
            Publisher::start("127.0.0.1:0".into(), running.clone()).expect("binds");

        let mut sock = std::net::TcpStream::connect(publisher.local_addr()).expect("connects");
        sock.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        // wait until the accept loop registered the subscription
        for _ in 0..200 {
            if publisher.subscriber_count() > 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(publisher.subscriber_count() > 0, "subscriber registered");

        publisher.send("IDA: test line");

        let mut header = [0u8; 4];
        sock.read_exact(&mut header).expect("frame header");
        let len = u32::from_be_bytes(header) as usize;
        assert_eq!(len, 14);
        let mut payload = vec![0u8; len];
        sock.read_exact(&mut payload).expect("frame payload");
        assert_eq!(payload, b"IDA: test line");

        publisher.shutdown();
        assert!(running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_send_without_subscribers_is_fine() {
        let running = Arc::new(AtomicBool::new(true));
        let publisher = Publisher::start("127.0.0.1:0".into(), running).expect("binds");
        publisher.send("nobody listening");
        publisher.shutdown();
    }

    #[test]
    fn test_bind_failure_reported() {
        let running = Arc::new(AtomicBool::new(true));
        let err = Publisher::start("256.0.0.1:9".into(), running);
        assert!(err.is_err());
    }
}
