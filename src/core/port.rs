use std::net::{Ipv4Addr, TcpListener};
use std::ops::Range;

use rand::Rng;

use crate::error::Error;
use crate::Result;

/// Ports handed out to php-fpm pools and node backends.
pub const PORT_RANGE: Range<u16> = 8081..9000;

const MAX_ATTEMPTS: usize = 64;

/// A random port from [`PORT_RANGE`] that nothing is listening on right now.
pub fn random_tcp_port() -> Result<u16> {
    let mut rng = rand::rng();
    for _ in 0..MAX_ATTEMPTS {
        let port = rng.random_range(PORT_RANGE);
        if is_free(port) {
            log::debug!("Selected free port {}", port);
            return Ok(port);
        }
    }

    Err(Error::internal_unexpected(format!(
        "no free TCP port in {}..{} after {} attempts",
        PORT_RANGE.start, PORT_RANGE.end, MAX_ATTEMPTS
    )))
}

/// Two distinct free ports, for hosts that run both php-fpm and node.
pub fn random_port_pair() -> Result<(u16, u16)> {
    let first = random_tcp_port()?;
    loop {
        let second = random_tcp_port()?;
        if second != first {
            return Ok((first, second));
        }
    }
}

pub fn is_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}
