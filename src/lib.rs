//! `motor-link`: stop-and-wait motor commands over UDP.
//!
//! A controller node samples button input and sends one command at a time to
//! a motors node, which applies each command exactly once and acknowledges it.
//!
//! # Architecture
//!
//! ```text
//!  ┌────────────┐  intents  ┌────────────────┐   CMD seq=b   ┌─────────────────┐
//!  │ InputSource│──────────▶│   Controller   │──────────────▶│ CommandReceiver │
//!  └────────────┘ debounced │ (ReliableSender│◀──────────────│ (SequenceTracker│
//!                           │  stop-and-wait)│   ACK seq=b   │  + MotorDriver) │
//!                           └───────┬────────┘               └────────┬────────┘
//!                                   │ raw datagrams                   │
//!                           ┌───────▼─────────────────────────────────▼────────┐
//!                           │   Transport: UdpTransport / MemoryTransport      │
//!                           │              (optionally wrapped by Simulator)   │
//!                           └──────────────────────────────────────────────────┘
//! ```
//!
//! Modules:
//! - [`packet`]     10-byte header wire codec
//! - [`sequence`]   alternating-bit sequence and duplicate tracker
//! - [`command`]    direction intents and flag validation
//! - [`sender`]     bounded reliable send loop
//! - [`state`]      send-loop phases
//! - [`receiver`]   exactly-once command dispatch
//! - [`controller`] input polling loop on the controller node
//! - [`input`]      input sources and debouncing
//! - [`motor`]      motor driver interface
//! - [`config`]     node settings and validation
//! - [`socket`]     async datagram transports
//! - [`simulator`]  lossy network layer for testing

pub mod command;
pub mod config;
pub mod controller;
pub mod input;
pub mod motor;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod sequence;
pub mod simulator;
pub mod socket;
pub mod state;
