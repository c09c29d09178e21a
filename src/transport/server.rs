use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use super::{
    TransportError, INCOMING_CAPACITY, OUTGOING_CAPACITY, PACKET_SIZE, POLL_INTERVAL,
};
use crate::queue::MailQueue;

struct Connection{
    stream: TcpStream,
    peer: SocketAddr,
    //a peer becomes eligible for queued commands once it has sent something
    writable: bool,
    open: bool,
}

/// The accepting side of the link: the (usually simulated) front seat.
///
/// One thread runs the multiplexing loop over a nonblocking listener and
/// however many back-seat connections show up; everyone else talks to the
/// two bounded queues.
pub struct FrontseatServer{
    listener: TcpListener,
    outgoing: MailQueue<Vec<u8>>,
    incoming: MailQueue<Vec<u8>>,
    //one-way: once stopped, there is no restart
    stopping: AtomicBool,
}

impl FrontseatServer{
    pub fn bind(host: &str, port: u16) -> Result<Self, TransportError>{
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .map_err(|source| TransportError::Bind{ addr, source })?;

        Ok(FrontseatServer{
            listener,
            outgoing: MailQueue::new(OUTGOING_CAPACITY),
            incoming: MailQueue::new(INCOMING_CAPACITY),
            stopping: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr>{
        return self.listener.local_addr();
    }

    /// Queue a command for the back seat. Never blocks; on overflow the
    /// oldest queued command is dropped, never this one.
    pub fn send_command(&self, sentence: &str){
        if let Some(dropped) = self.outgoing.push(sentence.as_bytes().to_vec()){
            warn!(
                "outgoing queue full, dropped oldest command: {}",
                String::from_utf8_lossy(&dropped).trim_end(),
            );
        }
    }

    /// Everything received since the last call, in arrival order. Never
    /// blocks; empty when nothing arrived.
    pub fn receive_mail(&self) -> Vec<Vec<u8>>{
        return self.incoming.drain();
    }

    /// Ask the run loop to wind down after its current pass.
    pub fn stop(&self){
        self.stopping.store(true, Ordering::SeqCst);
    }

    /// Run the multiplexing loop on its own thread.
    pub fn start(self: Arc<Self>) -> JoinHandle<Result<(), TransportError>>{
        return thread::spawn(move || self.run());
    }

    /// The multiplexing loop. Returns when [`stop`](Self::stop) is called
    /// or on the first fatal I/O error; all sockets are closed either way.
    pub fn run(&self) -> Result<(), TransportError>{
        let mut connections: Vec<Connection> = Vec::new();
        let result = self.serve(&mut connections);

        for conn in &connections{
            let _ = conn.stream.shutdown(Shutdown::Both);
        }
        self.stopping.store(true, Ordering::SeqCst);

        if let Err(ref err) = result{
            warn!("front seat server stopped: {}", err);
        }
        return result;
    }

    fn serve(&self, connections: &mut Vec<Connection>) -> Result<(), TransportError>{
        self.listener
            .set_nonblocking(true)
            .map_err(TransportError::Accept)?;

        let mut buf = [0u8; PACKET_SIZE];

        //each pass: accept, then every readable peer, then every writable
        //peer, so reads are never starved by writes
        while !self.stopping.load(Ordering::SeqCst){
            self.accept_pass(connections)?;
            self.read_pass(connections, &mut buf)?;
            self.write_pass(connections)?;
            connections.retain(|conn| conn.open);
            thread::sleep(POLL_INTERVAL);
        }

        return Ok(());
    }

    fn accept_pass(&self, connections: &mut Vec<Connection>) -> Result<(), TransportError>{
        loop{
            match self.listener.accept(){
                Ok((stream, peer)) =>{
                    stream.set_nonblocking(true).map_err(TransportError::Accept)?;
                    info!("new connection from {}", peer);
                    connections.push(Connection{
                        stream,
                        peer,
                        writable: false,
                        open: true,
                    });
                }
                Err(ref err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => return Err(TransportError::Accept(err)),
            }
        }
        return Ok(());
    }

    fn read_pass(
        &self,
        connections: &mut Vec<Connection>,
        buf: &mut [u8],
    ) -> Result<(), TransportError>{
        for conn in connections.iter_mut(){
            match conn.stream.read(buf){
                Ok(0) =>{
                    //peer closed
                    info!("connection from {} closed", conn.peer);
                    conn.open = false;
                    let _ = conn.stream.shutdown(Shutdown::Both);
                }
                Ok(n) =>{
                    debug!(
                        "from backseat ({}): {}",
                        conn.peer,
                        String::from_utf8_lossy(&buf[..n]).trim_end(),
                    );
                    if let Some(dropped) = self.incoming.push(buf[..n].to_vec()){
                        warn!("incoming queue full, dropped oldest {} bytes", dropped.len());
                    }
                    conn.writable = true;
                }
                Err(ref err) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) => return Err(TransportError::Receive(err)),
            }
        }
        return Ok(());
    }

    fn write_pass(&self, connections: &mut Vec<Connection>) -> Result<(), TransportError>{
        for conn in connections.iter_mut(){
            if !conn.writable || !conn.open{
                continue;
            }

            while let Some(msg) = self.outgoing.pop(){
                debug!(
                    "to backseat ({}): {}",
                    conn.peer,
                    String::from_utf8_lossy(&msg).trim_end(),
                );
                conn.stream.write_all(&msg).map_err(TransportError::Send)?;
            }
        }
        return Ok(());
    }
}
