//! SNMP v2c counter source.
//!
//! Interface tables are read with GETBULK walks; custom OIDs with one GET
//! each. Transport failures are retried a fixed number of times before being
//! reported to the collector.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use snmp::{SyncSession, Value};
use tracing::{debug, trace};

use crate::collector::traits::{CounterSource, PollError};
use crate::mib::{self, CounterKind};

fn snmp_error(e: snmp::SnmpError) -> PollError {
    match e {
        snmp::SnmpError::SendError
        | snmp::SnmpError::ReceiveError
        | snmp::SnmpError::RequestIdMismatch => PollError::Transport(format!("{:?}", e)),
        other => PollError::Protocol(format!("{:?}", other)),
    }
}

/// Owned copy of a varbind value, detached from the session's receive buffer.
#[derive(Debug, Clone, PartialEq)]
enum SnmpValue {
    Unsigned(u64),
    Signed(i64),
    Octets(Vec<u8>),
    /// No varbind came back for the requested OID.
    Missing,
    Other,
}

impl SnmpValue {
    fn from_value(value: &Value<'_>) -> Self {
        match *value {
            Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => {
                SnmpValue::Unsigned(n as u64)
            }
            Value::Counter64(n) => SnmpValue::Unsigned(n),
            Value::Integer(n) => SnmpValue::Signed(n),
            Value::OctetString(bytes) => SnmpValue::Octets(bytes.to_vec()),
            _ => SnmpValue::Other,
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            SnmpValue::Unsigned(n) => Some(*n),
            SnmpValue::Signed(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            SnmpValue::Unsigned(n) => Some(*n as f64),
            SnmpValue::Signed(n) => Some(*n as f64),
            SnmpValue::Octets(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Appends the standard SNMP port unless the target already names one.
fn with_default_port(target: &str) -> String {
    if target.parse::<SocketAddr>().is_ok() {
        return target.to_string();
    }
    if let Ok(IpAddr::V6(ip)) = target.parse::<IpAddr>() {
        return format!("[{}]:{}", ip, SnmpSource::DEFAULT_PORT);
    }
    match target.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => target.to_string(),
        _ => format!("{}:{}", target, SnmpSource::DEFAULT_PORT),
    }
}

/// Interface index encoded as the last arc of a table row OID.
fn row_index(oid: &[u32]) -> Option<u64> {
    oid.last().map(|&arc| arc as u64)
}

/// Counter source backed by an SNMP v2c agent.
pub struct SnmpSource {
    session: SyncSession,
    target: String,
    retries: u32,
}

impl SnmpSource {
    pub const DEFAULT_PORT: u16 = 161;
    /// Per-request timeout.
    pub const TIMEOUT: Duration = Duration::from_secs(2);
    /// Additional attempts after a transport failure.
    pub const RETRIES: u32 = 3;
    /// Upper bound for GETBULK max-repetitions.
    const MAX_REPETITIONS: u32 = 50;

    /// Opens a UDP session to `target` (`host` or `host:port`).
    pub fn connect(target: &str, community: &str) -> Result<Self, PollError> {
        let target = with_default_port(target);
        let session = SyncSession::new(
            target.as_str(),
            community.as_bytes(),
            Some(Self::TIMEOUT),
            0,
        )?;
        debug!(target = %target, "snmp session opened");
        Ok(Self {
            session,
            target,
            retries: Self::RETRIES,
        })
    }

    fn with_retries<T>(
        &mut self,
        mut op: impl FnMut(&mut Self) -> Result<T, PollError>,
    ) -> Result<T, PollError> {
        let mut attempt = 0;
        loop {
            match op(self) {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    debug!(target = %self.target, attempt, error = %e, "retrying snmp request");
                }
                result => return result,
            }
        }
    }

    fn get_once(&mut self, oid: &[u32]) -> Result<SnmpValue, PollError> {
        let pdu = self.session.get(oid).map_err(snmp_error)?;
        if pdu.error_status != 0 {
            return Err(PollError::ErrorStatus {
                status: pdu.error_status,
                index: pdu.error_index,
            });
        }
        // noSuchObject, noSuchInstance and endOfMibView are not decoded by the
        // snmp crate; they end the varbind iterator instead.
        let mut varbinds = pdu.varbinds;
        Ok(varbinds
            .next()
            .map(|(_, value)| SnmpValue::from_value(&value))
            .unwrap_or(SnmpValue::Missing))
    }

    fn get(&mut self, oid: &str) -> Result<SnmpValue, PollError> {
        let arcs = mib::parse_oid(oid)?;
        self.with_retries(|s| s.get_once(&arcs))
    }

    fn walk_once(
        &mut self,
        root: &[u32],
        max_repetitions: u32,
    ) -> Result<Vec<(Vec<u32>, SnmpValue)>, PollError> {
        let mut rows = Vec::new();
        let mut cursor = root.to_vec();

        loop {
            let pdu = self
                .session
                .getbulk(&[cursor.as_slice()], 0, max_repetitions)
                .map_err(snmp_error)?;
            if pdu.error_status != 0 {
                return Err(PollError::ErrorStatus {
                    status: pdu.error_status,
                    index: pdu.error_index,
                });
            }

            let mut advanced = false;
            for (name, value) in pdu.varbinds {
                let mut buf = [0u32; 128];
                let oid = name.read_name(&mut buf).map_err(snmp_error)?;
                let value = SnmpValue::from_value(&value);
                // Left the subtree, or the agent stopped making progress.
                if !oid.starts_with(root) || oid <= cursor.as_slice() {
                    return Ok(rows);
                }
                cursor = oid.to_vec();
                rows.push((cursor.clone(), value));
                advanced = true;
            }
            // An exception value (endOfMibView) ends the iterator early.
            if !advanced {
                return Ok(rows);
            }
        }
    }

    /// Walks the subtree under `root`, returning `(oid, value)` rows in order.
    fn walk(&mut self, root: &str, hint: u64) -> Result<Vec<(Vec<u32>, SnmpValue)>, PollError> {
        let arcs = mib::parse_oid(root)?;
        let max_repetitions = match hint {
            0 => Self::MAX_REPETITIONS,
            n => n.min(Self::MAX_REPETITIONS as u64) as u32,
        };
        let rows = self.with_retries(|s| s.walk_once(&arcs, max_repetitions))?;
        trace!(root, rows = rows.len(), "snmp walk completed");
        Ok(rows)
    }

    fn walk_unsigned(&mut self, root: &str, hint: u64) -> Result<BTreeMap<u64, u64>, PollError> {
        self.walk(root, hint)?
            .into_iter()
            .map(|(oid, value)| {
                let index = row_index(&oid);
                match (index, value.as_u64()) {
                    (Some(index), Some(v)) => Ok((index, v)),
                    _ => Err(PollError::UnexpectedType {
                        oid: mib::format_oid(&oid),
                    }),
                }
            })
            .collect()
    }
}

impl CounterSource for SnmpSource {
    fn interface_count(&mut self) -> Result<u64, PollError> {
        match self.get(mib::OID_IF_NUMBER)? {
            SnmpValue::Missing => Err(PollError::NoSuchObject(mib::OID_IF_NUMBER.to_string())),
            value => value.as_u64().ok_or_else(|| PollError::UnexpectedType {
                oid: mib::OID_IF_NUMBER.to_string(),
            }),
        }
    }

    fn interface_names(&mut self, hint: u64) -> Result<BTreeMap<u64, String>, PollError> {
        self.walk(mib::OID_IF_DESCR, hint)?
            .into_iter()
            .map(|(oid, value)| match (row_index(&oid), value) {
                (Some(index), SnmpValue::Octets(bytes)) => {
                    Ok((index, String::from_utf8_lossy(&bytes).into_owned()))
                }
                _ => Err(PollError::UnexpectedType {
                    oid: mib::format_oid(&oid),
                }),
            })
            .collect()
    }

    fn interface_oper_state(&mut self, hint: u64) -> Result<BTreeMap<u64, bool>, PollError> {
        // up(1), down(2), testing(3), ...: only down counts as down
        Ok(self
            .walk_unsigned(mib::OID_IF_OPER_STATUS, hint)?
            .into_iter()
            .map(|(index, status)| (index, status != 2))
            .collect())
    }

    fn counters(
        &mut self,
        kind: CounterKind,
        hint: u64,
    ) -> Result<BTreeMap<u64, u64>, PollError> {
        self.walk_unsigned(kind.oid(), hint)
    }

    fn interface_addresses(&mut self) -> Result<BTreeMap<u64, Vec<String>>, PollError> {
        let root_len = mib::parse_oid(mib::OID_IP_AD_ENT_IF_INDEX)?.len();
        let mut addresses: BTreeMap<u64, Vec<String>> = BTreeMap::new();

        for (oid, value) in self.walk(mib::OID_IP_AD_ENT_IF_INDEX, 0)? {
            // Row index is the address itself: <root>.a.b.c.d
            let octets: Vec<u8> = oid[root_len..]
                .iter()
                .filter_map(|&arc| u8::try_from(arc).ok())
                .collect();
            let [a, b, c, d] = octets[..] else {
                continue;
            };
            if a == 127 {
                continue;
            }
            let if_index = value.as_u64().ok_or_else(|| PollError::UnexpectedType {
                oid: mib::format_oid(&oid),
            })?;
            addresses
                .entry(if_index)
                .or_default()
                .push(format!("{}.{}.{}.{}", a, b, c, d));
        }
        Ok(addresses)
    }

    fn interface_phys_addresses(
        &mut self,
        hint: u64,
    ) -> Result<BTreeMap<u64, String>, PollError> {
        self.walk(mib::OID_IF_PHYS_ADDRESS, hint)?
            .into_iter()
            .map(|(oid, value)| match (row_index(&oid), value) {
                (Some(index), SnmpValue::Octets(bytes)) => {
                    let mac = bytes
                        .iter()
                        .map(|b| format!("{:02x}", b))
                        .collect::<Vec<_>>()
                        .join(":");
                    Ok((index, mac))
                }
                _ => Err(PollError::UnexpectedType {
                    oid: mib::format_oid(&oid),
                }),
            })
            .collect()
    }

    fn values(&mut self, oids: &[String]) -> Result<HashMap<String, f64>, PollError> {
        let mut values = HashMap::with_capacity(oids.len());
        for oid in oids {
            match self.get(oid)? {
                SnmpValue::Missing => debug!(oid = %oid, "custom oid not present on agent"),
                value => {
                    let v = value.as_f64().ok_or_else(|| PollError::UnexpectedType {
                        oid: oid.clone(),
                    })?;
                    values.insert(oid.clone(), v);
                }
            }
        }
        Ok(values)
    }
}
