//! Scripted meter and recording sink shared by the poller tests.

#![allow(dead_code)]

use async_trait::async_trait;
use meterlink_common::StateDefinition;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use zenoh_bridge_eastron::catalog::{DeviceModel, RegisterDescriptor, RegisterFunction};
use zenoh_bridge_eastron::publisher::{PublishError, StatePublisher};
use zenoh_bridge_eastron::transport::{ReadError, Transport};

/// Everything the poller did, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ReadStarted { address: u16, at: Instant },
    ReadFinished { address: u16, at: Instant },
    Define(String),
    Publish { state_id: String, value: f64, ack: bool },
    Connectivity(bool),
    Disconnect,
}

/// Shared, ordered event log.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Addresses of every started read.
    pub fn reads(&self) -> Vec<u16> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::ReadStarted { address, .. } => Some(address),
                _ => None,
            })
            .collect()
    }

    pub fn publishes(&self) -> Vec<(String, f64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Publish { state_id, value, .. } => Some((state_id, value)),
                _ => None,
            })
            .collect()
    }

    pub fn connectivity(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Connectivity(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn definitions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Define(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

/// How the scripted meter answers a read.
#[derive(Debug, Clone)]
pub enum Reply {
    Value(f32),
    Bytes(Vec<u8>),
    /// No answer; the read takes the full timeout.
    Timeout,
    Exception(String),
}

/// A meter that answers from a script instead of a serial line.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    log: EventLog,
    steady: HashMap<u16, Reply>,
    queued: HashMap<u16, VecDeque<Reply>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// Answer every read of `address` with `reply`.
    pub fn steady(mut self, address: u16, reply: Reply) -> Self {
        self.steady.insert(address, reply);
        self
    }

    /// Answer the next read of `address` with `reply`, then fall back.
    pub fn once(mut self, address: u16, reply: Reply) -> Self {
        self.queued.entry(address).or_default().push_back(reply);
        self
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn next_reply(&mut self, address: u16) -> Reply {
        self.queued
            .get_mut(&address)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.steady.get(&address).cloned())
            .unwrap_or_else(|| Reply::Exception(format!("illegal data address {}", address)))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn read_registers(
        &mut self,
        _function: RegisterFunction,
        address: u16,
        word_count: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, ReadError> {
        assert_eq!(word_count, 2);
        self.log.push(Event::ReadStarted {
            address,
            at: Instant::now(),
        });

        let reply = self.next_reply(address);
        let result = match reply {
            Reply::Timeout => {
                tokio::time::sleep(timeout).await;
                Err(ReadError::Timeout(timeout))
            }
            reply => {
                if !self.latency.is_zero() {
                    tokio::time::sleep(self.latency).await;
                }
                match reply {
                    Reply::Value(v) => Ok(v.to_be_bytes().to_vec()),
                    Reply::Bytes(bytes) => Ok(bytes),
                    Reply::Exception(detail) => Err(ReadError::Protocol(detail)),
                    Reply::Timeout => unreachable!(),
                }
            }
        };

        self.log.push(Event::ReadFinished {
            address,
            at: Instant::now(),
        });
        result
    }

    async fn disconnect(&mut self) {
        self.log.push(Event::Disconnect);
    }
}

/// A sink that records into the event log.
///
/// Failure modes let tests exercise a flaky state store.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    log: EventLog,
    defined: HashSet<String>,
    failing_definitions: usize,
    reject_values: bool,
    hang_on_disconnected: bool,
}

impl RecordingPublisher {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// Reject the next `count` definition writes.
    pub fn failing_definitions(mut self, count: usize) -> Self {
        self.failing_definitions = count;
        self
    }

    /// Reject every value write.
    pub fn rejecting_values(mut self) -> Self {
        self.reject_values = true;
        self
    }

    /// Never complete a `connected = false` write.
    pub fn hanging_on_disconnected(mut self) -> Self {
        self.hang_on_disconnected = true;
        self
    }
}

fn store_down(key: &str) -> PublishError {
    PublishError::Put {
        key: key.to_string(),
        message: "state store unavailable".to_string(),
    }
}

#[async_trait]
impl StatePublisher for RecordingPublisher {
    async fn ensure_state_definition(
        &mut self,
        definition: &StateDefinition,
    ) -> Result<(), PublishError> {
        if self.defined.contains(&definition.id) {
            return Ok(());
        }
        if self.failing_definitions > 0 {
            self.failing_definitions -= 1;
            return Err(store_down(&definition.id));
        }

        self.defined.insert(definition.id.clone());
        self.log.push(Event::Define(definition.id.clone()));
        Ok(())
    }

    async fn publish(
        &mut self,
        state_id: &str,
        value: f64,
        acknowledged: bool,
    ) -> Result<(), PublishError> {
        if self.reject_values {
            return Err(store_down(state_id));
        }

        self.log.push(Event::Publish {
            state_id: state_id.to_string(),
            value,
            ack: acknowledged,
        });
        Ok(())
    }

    async fn publish_connectivity(&mut self, connected: bool) -> Result<(), PublishError> {
        if !connected && self.hang_on_disconnected {
            std::future::pending::<()>().await;
        }

        self.log.push(Event::Connectivity(connected));
        Ok(())
    }
}

/// Five SDM120-style registers at addresses 0, 6, 12, 30 and 70.
pub fn five_register_model() -> DeviceModel {
    DeviceModel::new(
        "TEST5",
        vec![
            RegisterDescriptor::new(0, "voltage", "V"),
            RegisterDescriptor::new(6, "current", "A"),
            RegisterDescriptor::new(12, "active_power", "W"),
            RegisterDescriptor::new(30, "power_factor", ""),
            RegisterDescriptor::new(70, "frequency", "Hz"),
        ],
    )
    .unwrap()
}

pub fn single_register_model() -> DeviceModel {
    DeviceModel::new("TEST1", vec![RegisterDescriptor::new(0, "voltage", "V")]).unwrap()
}

/// A transport answering 230.0 on every register of the five-register model.
pub fn healthy_meter(log: &EventLog) -> ScriptedTransport {
    [0, 6, 12, 30, 70]
        .into_iter()
        .fold(ScriptedTransport::new(log.clone()), |t, address| {
            t.steady(address, Reply::Value(230.0))
        })
}
