//! Swarm (BitTorrent) engine seam
//!
//! Swarm fetch jobs drive an external peer-to-peer engine through the
//! [`SwarmEngine`] trait: register a magnet, poll its status, wait for
//! completion, release it.
//!
//! - [`RqbitEngine`]: librqbit-backed engine (cargo feature `torrent`)
//! - [`NoSwarmEngine`]: stub that refuses every magnet

mod noop;
#[cfg(feature = "torrent")]
mod rqbit;
mod traits;

pub use noop::NoSwarmEngine;
#[cfg(feature = "torrent")]
pub use rqbit::RqbitEngine;
pub use traits::{SwarmEngine, SwarmStatus, SwarmTorrent};
