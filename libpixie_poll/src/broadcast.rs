use byteorder::{LittleEndian, WriteBytesExt};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use super::error::SinkError;
use super::spill::Spill;

/// Size of a spill notification: run number, spill index, word count
pub const PACKET_SIZE: usize = 4 + 8 + 4;

/// SpillBroadcaster announces every written spill to live monitors over UDP.
///
/// The socket is non-blocking; a monitor that is not listening never stalls the
/// acquisition.
#[derive(Debug)]
pub struct SpillBroadcaster {
    socket: UdpSocket,
    target: SocketAddr,
    run_number: u32,
}

impl SpillBroadcaster {
    pub fn new(address: &str, run_number: u32) -> Result<Self, SinkError> {
        let target = address
            .to_socket_addrs()
            .map_err(|_| SinkError::BadAddress(address.to_string()))?
            .next()
            .ok_or_else(|| SinkError::BadAddress(address.to_string()))?;
        let bind_addr = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            target,
            run_number,
        })
    }

    pub fn notify(&self, spill: &Spill) -> Result<(), std::io::Error> {
        let packet = build_packet(self.run_number, spill)?;
        self.socket.send_to(&packet, self.target)?;
        Ok(())
    }
}

/// Encode a spill notification, little-endian
pub fn build_packet(run_number: u32, spill: &Spill) -> Result<Vec<u8>, std::io::Error> {
    let mut packet = Vec::with_capacity(PACKET_SIZE);
    packet.write_u32::<LittleEndian>(run_number)?;
    packet.write_u64::<LittleEndian>(spill.index)?;
    packet.write_u32::<LittleEndian>(spill.word_count() as u32)?;
    Ok(packet)
}
