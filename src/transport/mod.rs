pub mod client;
pub mod server;

pub use client::BackseatClient;
pub use server::FrontseatServer;

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Largest single read from a socket.
pub const PACKET_SIZE: usize = 1024;
/// Commands waiting to go out. Overflow drops the oldest.
pub const OUTGOING_CAPACITY: usize = 10;
/// Inbound messages waiting to be collected. Overflow drops the oldest.
pub const INCOMING_CAPACITY: usize = 50;

//pump cadences
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(5);
pub(crate) const SEND_SETTLE: Duration = Duration::from_millis(10);
pub(crate) const RECEIVE_TIMEOUT: Duration = Duration::from_millis(10);
pub(crate) const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Fatal transport failures. Any of these stops the owning run loop after
/// cleanup; only the client's initial connect retries.
#[derive(Debug, Error)]
pub enum TransportError{
    #[error("bind to {addr} failed: {source}")]
    Bind{ addr: String, source: io::Error },

    #[error("accept failed: {0}")]
    Accept(io::Error),

    #[error("reconnect to {addr} failed: {source}")]
    Reconnect{ addr: String, source: io::Error },

    #[error("send failed: {0}")]
    Send(io::Error),

    #[error("receive failed: {0}")]
    Receive(io::Error),

    #[error("transport loop is not running")]
    LinkDown,
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::protocol::{encode, Message};
    use std::sync::Arc;
    use std::time::Instant;

    fn wait_for<F: FnMut() -> bool>(mut ready: F, timeout: Duration) -> bool{
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline{
            if ready(){
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        return ready();
    }

    #[test]
    fn test_end_to_end_exchange(){
        let server = Arc::new(FrontseatServer::bind("127.0.0.1", 0).unwrap());
        let port = server.local_addr().unwrap().port();
        let server_handle = Arc::clone(&server).start();

        let client = Arc::new(BackseatClient::connect("127.0.0.1", port));
        let client_handle = Arc::clone(&client).start();

        let sentences: Vec<String> = (0..3)
            .map(|i| encode(&Message::Status{
                timestamp: format!("12000{}.00", i),
                code: 1,
                text: format!("status {}", i),
            }))
            .collect();

        for sentence in &sentences{
            client.send_message(sentence);
        }

        //tcp may coalesce writes into fewer chunks, so compare the stream
        let expected: Vec<u8> = sentences.iter().flat_map(|s| s.bytes()).collect();
        let mut received: Vec<u8> = Vec::new();
        let arrived = wait_for(
            ||{
                for chunk in server.receive_mail(){
                    received.extend_from_slice(&chunk);
                }
                received.len() >= expected.len()
            },
            Duration::from_secs(5),
        );
        assert!(arrived, "server never received the status messages");
        assert_eq!(received, expected, "status messages arrived out of order");

        //response path: the client only polls for mail after it sends, the
        //way the driver's heartbeat keeps mail moving
        let reply = encode(&Message::LogControl{ scope: "ALL".to_string(), enable: true });
        server.send_command(&reply);

        let mut inbound: Vec<u8> = Vec::new();
        let replied = wait_for(
            ||{
                client.send_message(&sentences[0]);
                for chunk in client.receive_mail(){
                    inbound.extend_from_slice(&chunk);
                }
                inbound
                    .windows(reply.len())
                    .any(|window| window == reply.as_bytes())
            },
            Duration::from_secs(5),
        );
        assert!(replied, "client never received the server's reply");

        client.stop();
        server.stop();
        client_handle.join().unwrap().unwrap();
        server_handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_send_never_blocks_on_full_queue(){
        let server = FrontseatServer::bind("127.0.0.1", 0).unwrap();

        //no run loop draining: pushing past capacity must not block
        for i in 0..(OUTGOING_CAPACITY + 5){
            server.send_command(&format!("$BPSTS,000000.00,1,msg {}\r\n", i));
        }
    }
}
