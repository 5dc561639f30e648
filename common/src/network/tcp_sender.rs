use crate::logger::Logger;
use crate::messages::shared_messages::{NetworkMessage, Shutdown};
use actix::prelude::*;
use colored::Color;
use std::collections::VecDeque;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, WriteHalf};
use tokio::net::TcpStream;

/// Serializes [`NetworkMessage`]s as JSON lines and writes them in order.
///
/// Messages queue up while a write is in flight; a failed write drops the
/// writer and the pending queue.
pub struct TCPSender<W = WriteHalf<TcpStream>>
where
    W: AsyncWrite + Unpin + 'static,
{
    writer: Option<BufWriter<W>>,
    queue: VecDeque<NetworkMessage>,
    logger: Logger,
}

impl<W> TCPSender<W>
where
    W: AsyncWrite + Unpin + 'static,
{
    pub fn new(write_half: W) -> Self {
        Self {
            writer: Some(BufWriter::new(write_half)),
            queue: VecDeque::new(),
            logger: Logger::new("TCP Sender", Color::BrightBlack),
        }
    }
}

impl<W> Actor for TCPSender<W>
where
    W: AsyncWrite + Unpin + 'static,
{
    type Context = Context<Self>;
}

struct ProcessQueue;

impl Message for ProcessQueue {
    type Result = ();
}

impl<W> Handler<NetworkMessage> for TCPSender<W>
where
    W: AsyncWrite + Unpin + 'static,
{
    type Result = ();

    fn handle(&mut self, msg: NetworkMessage, ctx: &mut Self::Context) {
        if self.writer.is_none() && self.queue.is_empty() {
            self.logger
                .warn("Dropping outgoing message: connection is closed");
            return;
        }
        self.queue.push_back(msg);
        if self.queue.len() == 1 {
            ctx.notify(ProcessQueue);
        }
    }
}

impl<W> Handler<ProcessQueue> for TCPSender<W>
where
    W: AsyncWrite + Unpin + 'static,
{
    type Result = ResponseActFuture<Self, ()>;

    fn handle(&mut self, _msg: ProcessQueue, _ctx: &mut Self::Context) -> Self::Result {
        let (Some(mut writer), Some(msg)) = (self.writer.take(), self.queue.front().cloned())
        else {
            return Box::pin(async {}.into_actor(self));
        };

        let fut = async move {
            let mut line = serde_json::to_string(&msg)
                .map_err(|e| format!("Error serializing message: {e}"))?;
            line.push('\n');
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| format!("Error writing to socket: {e}"))?;
            writer
                .flush()
                .await
                .map_err(|e| format!("Error flushing socket: {e}"))?;
            Ok::<_, String>(writer)
        };

        Box::pin(fut.into_actor(self).map(|res, act, ctx| match res {
            Ok(writer) => {
                act.writer = Some(writer);
                act.queue.pop_front();
                if !act.queue.is_empty() {
                    ctx.notify(ProcessQueue);
                }
            }
            Err(err_msg) => {
                act.queue.clear();
                act.logger.error(err_msg);
            }
        }))
    }
}

impl<W> Handler<Shutdown> for TCPSender<W>
where
    W: AsyncWrite + Unpin + 'static,
{
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) {
        self.writer = None;
        self.queue.clear();
        ctx.stop();
    }
}
