use crate::messages::shared_messages::{NetworkMessage, Shutdown};
use crate::network::tcp_receiver::TCPReceiver;
use crate::network::tcp_sender::TCPSender;
use actix::prelude::*;
use std::net::SocketAddr;
use tokio::io::split;
use tokio::net::TcpStream;

/// Both halves of a peer connection: a sender actor for outgoing lines and a
/// receiver actor feeding incoming messages to `A`.
pub struct Communicator<A>
where
    A: Actor<Context = Context<A>> + Handler<NetworkMessage>,
{
    pub remote_addr: SocketAddr,
    pub sender: Addr<TCPSender>,
    pub receiver: Addr<TCPReceiver<A>>,
}

impl<A> Communicator<A>
where
    A: Actor<Context = Context<A>> + Handler<NetworkMessage>,
{
    pub fn new(tcp_stream: TcpStream, remote_addr: SocketAddr, destination: Addr<A>) -> Self {
        let (read_half, write_half) = split(tcp_stream);
        Self {
            remote_addr,
            sender: TCPSender::new(write_half).start(),
            receiver: TCPReceiver::new(read_half, remote_addr, destination).start(),
        }
    }

    pub fn send(&self, msg: NetworkMessage) {
        self.sender.do_send(msg);
    }

    pub fn shutdown(&self) {
        self.sender.do_send(Shutdown);
        self.receiver.do_send(Shutdown);
    }
}
