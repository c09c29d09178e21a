use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use super::{
    TransportError, CONNECT_RETRY_INTERVAL, INCOMING_CAPACITY, OUTGOING_CAPACITY,
    PACKET_SIZE, POLL_INTERVAL, RECEIVE_TIMEOUT, SEND_SETTLE,
};
use crate::queue::MailQueue;

/// The initiating side of the link: the back seat.
///
/// Holds one persistent connection to the front seat. Construction blocks
/// until the first connect succeeds; after that one thread pumps the
/// queues and nobody else touches the socket.
pub struct BackseatClient{
    host: String,
    port: u16,
    stream: Mutex<Option<TcpStream>>,
    outgoing: MailQueue<Vec<u8>>,
    incoming: MailQueue<Vec<u8>>,
    //one-way: once stopped, there is no restart
    stopping: AtomicBool,
}

impl BackseatClient{
    /// Connect to the front seat, retrying at a fixed interval until it
    /// answers.
    pub fn connect(host: &str, port: u16) -> Self{
        let stream = loop{
            match Self::open(host, port){
                Ok(stream) => break stream,
                Err(err) =>{
                    info!("waiting to connect to front seat at {}:{} ({})", host, port, err);
                    thread::sleep(CONNECT_RETRY_INTERVAL);
                }
            }
        };
        info!("connected to front seat at {}:{}", host, port);

        BackseatClient{
            host: host.to_string(),
            port,
            stream: Mutex::new(Some(stream)),
            outgoing: MailQueue::new(OUTGOING_CAPACITY),
            incoming: MailQueue::new(INCOMING_CAPACITY),
            stopping: AtomicBool::new(false),
        }
    }

    fn open(host: &str, port: u16) -> io::Result<TcpStream>{
        let stream = TcpStream::connect((host, port))?;
        //bounded wait so the receive step cannot stall the pump
        stream.set_read_timeout(Some(RECEIVE_TIMEOUT))?;
        return Ok(stream);
    }

    /// Queue a sentence for the front seat. Never blocks; on overflow the
    /// oldest queued sentence is dropped, never this one.
    pub fn send_message(&self, sentence: &str){
        if let Some(dropped) = self.outgoing.push(sentence.as_bytes().to_vec()){
            warn!(
                "outgoing queue full, dropped oldest message: {}",
                String::from_utf8_lossy(&dropped).trim_end(),
            );
        }
    }

    /// Everything received since the last call, in arrival order. Never
    /// blocks; empty when nothing arrived.
    pub fn receive_mail(&self) -> Vec<Vec<u8>>{
        return self.incoming.drain();
    }

    /// Ask the run loop to wind down after its current cycle.
    pub fn stop(&self){
        self.stopping.store(true, Ordering::SeqCst);
    }

    /// Run the pump on its own thread.
    pub fn start(self: Arc<Self>) -> JoinHandle<Result<(), TransportError>>{
        return thread::spawn(move || self.run());
    }

    /// The pump. Each cycle sends at most one queued message, then polls
    /// once for inbound data. Returns when [`stop`](Self::stop) is called
    /// or on the first fatal I/O error; the socket is closed either way.
    pub fn run(&self) -> Result<(), TransportError>{
        let result = self.pump();
        self.cleanup();

        if let Err(ref err) = result{
            warn!("back seat client stopped: {}", err);
        }
        return result;
    }

    fn pump(&self) -> Result<(), TransportError>{
        while !self.stopping.load(Ordering::SeqCst){
            if let Some(msg) = self.outgoing.pop(){
                self.send_one(&msg)?;
                thread::sleep(SEND_SETTLE);
                self.poll_receive()?;
            }
            thread::sleep(POLL_INTERVAL);
        }
        return Ok(());
    }

    fn send_one(&self, msg: &[u8]) -> Result<(), TransportError>{
        let mut guard = self.stream.lock().unwrap();

        //the peer may have gone away since the last cycle; one reconnect
        //attempt, and its failure is fatal like any other send failure
        if guard.is_none(){
            let addr = format!("{}:{}", self.host, self.port);
            let stream = Self::open(&self.host, self.port)
                .map_err(|source| TransportError::Reconnect{ addr, source })?;
            info!("reconnected to front seat at {}:{}", self.host, self.port);
            *guard = Some(stream);
        }

        let stream = guard.as_mut().ok_or(TransportError::LinkDown)?;
        debug!("to frontseat: {}", String::from_utf8_lossy(msg).trim_end());
        return stream.write_all(msg).map_err(TransportError::Send);
    }

    fn poll_receive(&self) -> Result<(), TransportError>{
        let mut guard = self.stream.lock().unwrap();
        let Some(stream) = guard.as_mut() else{
            return Ok(());
        };

        let mut buf = [0u8; PACKET_SIZE];
        match stream.read(&mut buf){
            Ok(0) =>{
                //front seat closed; drop the stream so the next send
                //attempts a reconnect
                info!("front seat closed the connection");
                *guard = None;
            }
            Ok(n) =>{
                debug!(
                    "from frontseat: {}",
                    String::from_utf8_lossy(&buf[..n]).trim_end(),
                );
                if let Some(dropped) = self.incoming.push(buf[..n].to_vec()){
                    warn!("incoming queue full, dropped oldest {} bytes", dropped.len());
                }
            }
            Err(ref err)
                if err.kind() == ErrorKind::WouldBlock
                    || err.kind() == ErrorKind::TimedOut => {}
            Err(err) => return Err(TransportError::Receive(err)),
        }
        return Ok(());
    }

    fn cleanup(&self){
        if let Some(stream) = self.stream.lock().unwrap().take(){
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.stopping.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::transport::FrontseatServer;
    use std::time::{Duration, Instant};

    #[test]
    fn test_connect_and_stop(){
        let server = Arc::new(FrontseatServer::bind("127.0.0.1", 0).unwrap());
        let port = server.local_addr().unwrap().port();
        let server_handle = Arc::clone(&server).start();

        let client = Arc::new(BackseatClient::connect("127.0.0.1", port));
        let client_handle = Arc::clone(&client).start();

        std::thread::sleep(Duration::from_millis(50));
        client.stop();
        client_handle.join().unwrap().unwrap();

        server.stop();
        server_handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_one_message_per_cycle(){
        let server = Arc::new(FrontseatServer::bind("127.0.0.1", 0).unwrap());
        let port = server.local_addr().unwrap().port();
        let server_handle = Arc::clone(&server).start();

        let client = Arc::new(BackseatClient::connect("127.0.0.1", port));

        //queued before the pump starts, all must still arrive in order
        client.send_message("$BPSTS,000001.00,1,first\r\n");
        client.send_message("$BPSTS,000002.00,1,second\r\n");
        let client_handle = Arc::clone(&client).start();

        let mut received = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && !received.ends_with(b"second\r\n"){
            for chunk in server.receive_mail(){
                received.extend_from_slice(&chunk);
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let text = String::from_utf8_lossy(&received).into_owned();
        let first = text.find("first").expect("first message missing");
        let second = text.find("second").expect("second message missing");
        assert!(first < second);

        client.stop();
        server.stop();
        client_handle.join().unwrap().unwrap();
        server_handle.join().unwrap().unwrap();
    }
}
