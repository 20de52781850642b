//! Trace request entries.
//!
//! Requests arrive grouped by protocol layer:
//! `{"trace": {"switch": {"dpid", "in_port"}, "eth": {"dl_vlan"}, "ip": {...}}}`.
//! [`TraceRequest::to_fields`] flattens the sections into [`PacketFields`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TraceError;
use crate::id::{Dpid, PortNo, VlanId};
use crate::packet::PacketFields;

/// A trace request as received from clients and stored on circuits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRequest {
    pub trace: IndexMap<String, IndexMap<String, Value>>,
}

impl TraceRequest {
    /// A request entering `dpid` on `in_port`, optionally tagged.
    pub fn new(dpid: &Dpid, in_port: PortNo, vlan: Option<VlanId>) -> Self {
        let mut switch = IndexMap::new();
        switch.insert("dpid".to_string(), Value::from(dpid.as_str()));
        switch.insert("in_port".to_string(), Value::from(in_port));

        let mut trace = IndexMap::new();
        trace.insert("switch".to_string(), switch);
        if let Some(vlan) = vlan {
            let mut eth = IndexMap::new();
            eth.insert("dl_vlan".to_string(), Value::from(vlan));
            trace.insert("eth".to_string(), eth);
        }
        TraceRequest { trace }
    }

    /// Parses a raw JSON body. Anything that is not the sectioned request
    /// shape is malformed.
    pub fn from_value(value: Value) -> Result<Self, TraceError> {
        serde_json::from_value(value).map_err(|err| TraceError::malformed(err.to_string()))
    }

    /// Flattens every section into one packet description.
    pub fn to_fields(&self) -> Result<PacketFields, TraceError> {
        let flat: IndexMap<&str, &Value> = self
            .trace
            .values()
            .flat_map(|section| section.iter().map(|(k, v)| (k.as_str(), v)))
            .collect();

        let dpid = flat
            .get("dpid")
            .ok_or_else(|| TraceError::malformed("missing dpid"))?
            .as_str()
            .ok_or_else(|| TraceError::malformed("dpid must be a string"))?;
        let in_port = flat
            .get("in_port")
            .ok_or_else(|| TraceError::malformed("missing in_port"))?
            .as_u64()
            .and_then(|port| PortNo::try_from(port).ok())
            .ok_or_else(|| TraceError::malformed("in_port must be a port number"))?;

        let mut fields = PacketFields::new(Dpid::from(dpid), in_port);
        for (name, value) in flat {
            match name {
                "dpid" | "in_port" => {}
                "dl_vlan" | "vlan_vid" => {
                    let vlan = value
                        .as_u64()
                        .and_then(|v| VlanId::try_from(v).ok())
                        .ok_or_else(|| TraceError::malformed(format!("{} must be a vlan id", name)))?;
                    fields.vlan_stack.clear();
                    fields.vlan_stack.push(vlan);
                }
                "nw_src" | "ipv4_src" => fields.ipv4_src = Some(parse_addr(name, value)?),
                "nw_dst" | "ipv4_dst" => fields.ipv4_dst = Some(parse_addr(name, value)?),
                "ipv6_src" => fields.ipv6_src = Some(parse_addr(name, value)?),
                "ipv6_dst" => fields.ipv6_dst = Some(parse_addr(name, value)?),
                other => {
                    fields.other.insert(other.to_string(), value.clone());
                }
            }
        }
        Ok(fields)
    }
}

fn parse_addr<A: std::str::FromStr>(name: &str, value: &Value) -> Result<A, TraceError> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| TraceError::malformed(format!("{} must be an address", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_sections() {
        let request = TraceRequest::from_value(json!({
            "trace": {
                "switch": {"dpid": "00:00:00:00:00:00:00:01", "in_port": 1},
                "eth": {"dl_vlan": 100, "dl_type": 2048},
                "ip": {"nw_src": "10.0.0.1", "nw_proto": 6}
            }
        }))
        .unwrap();

        let fields = request.to_fields().unwrap();
        assert_eq!(fields.dpid.as_str(), "00:00:00:00:00:00:00:01");
        assert_eq!(fields.in_port, 1);
        assert_eq!(fields.vlan_stack.as_slice(), &[100]);
        assert_eq!(fields.ipv4_src, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(fields.other.get("dl_type"), Some(&json!(2048)));
        assert_eq!(fields.other.get("nw_proto"), Some(&json!(6)));
    }

    #[test]
    fn missing_dpid_or_port_is_malformed() {
        let no_dpid = TraceRequest::from_value(json!({
            "trace": {"switch": {"in_port": 1}}
        }))
        .unwrap();
        assert_eq!(no_dpid.to_fields(), Err(TraceError::malformed("missing dpid")));

        let no_port = TraceRequest::from_value(json!({
            "trace": {"switch": {"dpid": "00:00:00:00:00:00:00:01"}}
        }))
        .unwrap();
        assert_eq!(no_port.to_fields(), Err(TraceError::malformed("missing in_port")));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        assert!(matches!(
            TraceRequest::from_value(json!({"dpid": "x"})),
            Err(TraceError::Malformed { .. })
        ));
        let bad_ip = TraceRequest::from_value(json!({
            "trace": {"switch": {"dpid": "s1", "in_port": 1}, "ip": {"nw_dst": "nope"}}
        }))
        .unwrap();
        assert!(matches!(bad_ip.to_fields(), Err(TraceError::Malformed { .. })));
    }

    #[test]
    fn constructed_request_round_trips_to_fields() {
        let request = TraceRequest::new(&Dpid::from("00:00:00:00:00:00:00:02"), 3, Some(10));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"trace": {"switch": {"dpid": "00:00:00:00:00:00:00:02", "in_port": 3}, "eth": {"dl_vlan": 10}}})
        );
        let fields = request.to_fields().unwrap();
        assert_eq!(fields.in_port, 3);
        assert_eq!(fields.current_vlan(), Some(10));
    }
}
