// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! # Onyx Network
//!
//! The broadcast side of the consensus engine. The engine hands payloads to a
//! [`ConsensusBroadcaster`] without blocking; [`Outbox`] buffers them with a
//! drop-oldest policy, and [`LocalHub`] wires several in-process nodes
//! together for tests and the demo node.

pub mod hub;
pub mod outbox;

pub use hub::{DeliveryFilter, HubPort, LocalHub, PayloadSink};
pub use outbox::{ConsensusBroadcaster, Outbox};
