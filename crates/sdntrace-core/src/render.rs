//! Client-facing rendering of trace results.
//!
//! Each rendered hop is the step's `in` record with its `out` record nested
//! under `out`.

use serde::Serialize;

use crate::walker::{StepIn, StepOut, TraceStep};

#[derive(Debug, Clone, Serialize)]
pub struct HopView<'a> {
    #[serde(flatten)]
    pub inbound: &'a StepIn,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<&'a StepOut>,
}

pub fn render_hops(result: &[TraceStep]) -> Vec<HopView<'_>> {
    result
        .iter()
        .map(|step| HopView {
            inbound: &step.inbound,
            out: step.out.as_ref(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Dpid;
    use crate::walker::StepType;
    use serde_json::json;

    #[test]
    fn hops_nest_out_records() {
        let result = vec![
            TraceStep {
                inbound: StepIn {
                    dpid: Dpid::from("00:00:00:00:00:00:00:01"),
                    port: 1,
                    vlan: None,
                    time: "2022-06-01 01:01:01.100000".to_string(),
                    step_type: StepType::Starting,
                },
                out: None,
            },
            TraceStep {
                inbound: StepIn {
                    dpid: Dpid::from("00:00:00:00:00:00:00:03"),
                    port: 3,
                    vlan: Some(100),
                    time: "2022-06-01 01:01:01.100000".to_string(),
                    step_type: StepType::Intermediary,
                },
                out: Some(StepOut {
                    port: 1,
                    vlan: Some(123),
                }),
            },
        ];

        assert_eq!(
            serde_json::to_value(render_hops(&result)).unwrap(),
            json!([
                {
                    "dpid": "00:00:00:00:00:00:00:01",
                    "port": 1,
                    "time": "2022-06-01 01:01:01.100000",
                    "type": "starting"
                },
                {
                    "dpid": "00:00:00:00:00:00:00:03",
                    "port": 3,
                    "time": "2022-06-01 01:01:01.100000",
                    "type": "intermediary",
                    "vlan": 100,
                    "out": {"port": 1, "vlan": 123}
                }
            ])
        );
    }

    #[test]
    fn empty_result_renders_empty() {
        assert!(render_hops(&[]).is_empty());
    }
}
